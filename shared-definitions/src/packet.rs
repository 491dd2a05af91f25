//! Framed command/telemetry codec for the ground link.
//!
//! Frame layout: two sync bytes, one command byte, a big-endian length
//! counting every byte from the first sync byte through the end of the
//! payload, the payload itself, then the rolling checksum low byte first.
//! Any violation drops the in-flight frame and the parser falls back to
//! sync search.

use byteorder::{BigEndian, ByteOrder};
use heapless::Vec;

use crate::checksum;

pub const SYNC_A: u8 = 0x55;
pub const SYNC_B: u8 = 0xAA;

/// Sync + command + length bytes, i.e. the declared length of an empty frame.
pub const HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD: usize = 160;

/// Raw ack byte sent in response to a ping, outside the frame format.
pub const PING_ACK: u8 = 0xE8;

/// Ticks without a byte before an in-flight frame is abandoned. Roughly
/// 50 ms at the 250 Hz loop rate.
pub const FRAME_BYTE_TIMEOUT_TICKS: u16 = 13;

pub struct Commands;
impl Commands {
    pub const TELEMETRY_OFF: u8 = 0x00;
    pub const TELEMETRY_SENSORS: u8 = 0x01;
    pub const TELEMETRY_MOTOR_TEST: u8 = 0x02;
    pub const NUDGE_FIRST: u8 = 0x08; // low three bits select the output
    pub const NUDGE_LAST: u8 = 0x0F;
    pub const GYRO_TEMP_ZERO: u8 = 0x10;
    pub const GYRO_RESET: u8 = 0x11;
    pub const CHANNEL_CAL_RESET: u8 = 0x13;
    pub const ACCEL_TEMP_ZERO: u8 = 0x14;
    pub const ACCEL_RESET: u8 = 0x15;
    pub const QUERY_SETTINGS: u8 = 0x18;
    pub const PUSH_SETTINGS: u8 = 0x19;
    pub const FACTORY_RESET: u8 = 0x1A;
    pub const PING: u8 = 0xFF;
}

/// Command codes of the periodic telemetry frames sent to the host.
pub struct TelemetryIds;
impl TelemetryIds {
    pub const RADIO_BATTERY: u8 = 1;
    pub const RAW_SENSORS: u8 = 2;
    pub const QUATERNION: u8 = 3;
    pub const COMPUTED: u8 = 4;
    pub const MOTORS: u8 = 5;
    pub const DESIRED_QUATERNION: u8 = 6;
    pub const LOOP_TIMING: u8 = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Off,
    Sensors,
    MotorTest,
}

impl TryFrom<u8> for TelemetryMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Commands::TELEMETRY_OFF => Ok(TelemetryMode::Off),
            Commands::TELEMETRY_SENSORS => Ok(TelemetryMode::Sensors),
            Commands::TELEMETRY_MOTOR_TEST => Ok(TelemetryMode::MotorTest),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetTelemetryMode(TelemetryMode),
    NudgeMotor(u8),
    ZeroGyroDrift,
    ResetGyroDrift,
    ResetChannelCalibration,
    ZeroAccelOffset,
    ResetAccelOffset,
    QuerySettings,
    PushSettings,
    FactoryReset,
    Ping,
}

impl Command {
    /// Unknown codes are rejected here, before any payload is consumed.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            Commands::TELEMETRY_OFF..=Commands::TELEMETRY_MOTOR_TEST => {
                Some(Command::SetTelemetryMode(TelemetryMode::try_from(value).ok()?))
            }
            Commands::NUDGE_FIRST..=Commands::NUDGE_LAST => {
                Some(Command::NudgeMotor(value & 0x07))
            }
            Commands::GYRO_TEMP_ZERO => Some(Command::ZeroGyroDrift),
            Commands::GYRO_RESET => Some(Command::ResetGyroDrift),
            Commands::CHANNEL_CAL_RESET => Some(Command::ResetChannelCalibration),
            Commands::ACCEL_TEMP_ZERO => Some(Command::ZeroAccelOffset),
            Commands::ACCEL_RESET => Some(Command::ResetAccelOffset),
            Commands::QUERY_SETTINGS => Some(Command::QuerySettings),
            Commands::PUSH_SETTINGS => Some(Command::PushSettings),
            Commands::FACTORY_RESET => Some(Command::FactoryReset),
            Commands::PING => Some(Command::Ping),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: Command,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    SyncA,
    SyncB,
    Command,
    LengthHigh,
    LengthLow,
    Payload,
    ChecksumLow,
    ChecksumHigh,
}

/// Push parser fed one byte at a time from the serial transport. No state
/// from a violated frame survives; the parser simply hunts for sync again.
pub struct PacketParser {
    state: ParseState,
    command: u8,
    frame_len: usize,
    payload: Vec<u8, MAX_PAYLOAD>,
    running: u16,
    trailer_low: u8,
    idle_ticks: u16,
}

impl PacketParser {
    pub const fn new() -> Self {
        PacketParser {
            state: ParseState::SyncA,
            command: 0,
            frame_len: 0,
            payload: Vec::new(),
            running: 0,
            trailer_low: 0,
            idle_ticks: 0,
        }
    }

    fn reset(&mut self) {
        self.state = ParseState::SyncA;
        self.command = 0;
        self.frame_len = 0;
        self.payload.clear();
        self.running = 0;
        self.trailer_low = 0;
        self.idle_ticks = 0;
    }

    /// Called once per loop tick. An in-flight frame that stops receiving
    /// bytes is abandoned with no side effects.
    pub fn on_tick(&mut self) {
        if self.state == ParseState::SyncA {
            return;
        }
        self.idle_ticks += 1;
        if self.idle_ticks > FRAME_BYTE_TIMEOUT_TICKS {
            self.reset();
        }
    }

    pub fn push(&mut self, byte: u8) -> Option<Packet> {
        self.idle_ticks = 0;
        match self.state {
            ParseState::SyncA => {
                if byte == SYNC_A {
                    self.running = checksum::feed(0, byte);
                    self.state = ParseState::SyncB;
                }
            }
            ParseState::SyncB => {
                if byte == SYNC_B {
                    self.running = checksum::feed(self.running, byte);
                    self.state = ParseState::Command;
                } else if byte == SYNC_A {
                    // Could be the real start of the next frame.
                    self.running = checksum::feed(0, byte);
                } else {
                    self.reset();
                }
            }
            ParseState::Command => match Command::from_byte(byte) {
                Some(_) => {
                    self.command = byte;
                    self.running = checksum::feed(self.running, byte);
                    self.state = ParseState::LengthHigh;
                }
                None => self.reset(),
            },
            ParseState::LengthHigh => {
                self.frame_len = (byte as usize) << 8;
                self.running = checksum::feed(self.running, byte);
                self.state = ParseState::LengthLow;
            }
            ParseState::LengthLow => {
                self.frame_len |= byte as usize;
                if self.frame_len < HEADER_LEN || self.frame_len > HEADER_LEN + MAX_PAYLOAD {
                    self.reset();
                } else {
                    self.running = checksum::feed(self.running, byte);
                    self.state = if self.frame_len == HEADER_LEN {
                        ParseState::ChecksumLow
                    } else {
                        ParseState::Payload
                    };
                }
            }
            ParseState::Payload => {
                self.running = checksum::feed(self.running, byte);
                // Capacity is guaranteed by the length range check.
                let _ = self.payload.push(byte);
                if self.payload.len() == self.frame_len - HEADER_LEN {
                    self.state = ParseState::ChecksumLow;
                }
            }
            ParseState::ChecksumLow => {
                self.trailer_low = byte;
                self.state = ParseState::ChecksumHigh;
            }
            ParseState::ChecksumHigh => {
                let received = u16::from_le_bytes([self.trailer_low, byte]);
                let packet = if received == self.running {
                    Command::from_byte(self.command).map(|command| Packet {
                        command,
                        payload: self.payload.clone(),
                    })
                } else {
                    None
                };
                self.reset();
                return packet;
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Oversize,
}

/// Builds one complete frame into `out`, replacing its previous contents.
pub fn frame_packet<const N: usize>(
    command: u8,
    payload: &[u8],
    out: &mut Vec<u8, N>,
) -> Result<(), FrameError> {
    let total = HEADER_LEN + payload.len();
    out.clear();
    if payload.len() > MAX_PAYLOAD || N < total + 2 {
        return Err(FrameError::Oversize);
    }
    let mut length = [0u8; 2];
    BigEndian::write_u16(&mut length, total as u16);
    let _ = out.push(SYNC_A);
    let _ = out.push(SYNC_B);
    let _ = out.push(command);
    let _ = out.extend_from_slice(&length);
    let _ = out.extend_from_slice(payload);
    let trailer = checksum::compute(out);
    let _ = out.extend_from_slice(&trailer.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut PacketParser, bytes: &[u8]) -> Option<Packet> {
        let mut result = None;
        for &byte in bytes {
            if let Some(packet) = parser.push(byte) {
                result = Some(packet);
            }
        }
        result
    }

    #[test]
    fn accepts_empty_query_frame() {
        let mut parser = PacketParser::new();
        let packet = feed_all(&mut parser, &[0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65])
            .expect("frame should parse");
        assert_eq!(packet.command, Command::QuerySettings);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn rejects_any_checksum_bit_flip() {
        let frame = [0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65];
        for i in 5..7 {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[i] ^= 1 << bit;
                let mut parser = PacketParser::new();
                assert!(feed_all(&mut parser, &corrupted).is_none());
                // Parser must have resynchronized: the same good frame parses next.
                assert!(feed_all(&mut parser, &frame).is_some());
            }
        }
    }

    #[test]
    fn round_trips_payload_frames() {
        let payload = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut frame: Vec<u8, 32> = Vec::new();
        frame_packet(Commands::PUSH_SETTINGS, &payload, &mut frame).unwrap();
        assert_eq!(frame[3], 0);
        assert_eq!(frame[4], (HEADER_LEN + payload.len()) as u8);

        let mut parser = PacketParser::new();
        let packet = feed_all(&mut parser, &frame).expect("frame should parse");
        assert_eq!(packet.command, Command::PushSettings);
        assert_eq!(&packet.payload[..], &payload);
    }

    #[test]
    fn payload_bit_flip_is_rejected() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut frame: Vec<u8, 16> = Vec::new();
        frame_packet(Commands::PUSH_SETTINGS, &payload, &mut frame).unwrap();
        for i in HEADER_LEN..HEADER_LEN + payload.len() {
            let mut corrupted: Vec<u8, 16> = frame.clone();
            corrupted[i] ^= 0x10;
            let mut parser = PacketParser::new();
            assert!(feed_all(&mut parser, &corrupted).is_none());
        }
    }

    #[test]
    fn unknown_command_resynchronizes() {
        let mut parser = PacketParser::new();
        assert!(feed_all(&mut parser, &[0x55, 0xAA, 0x42]).is_none());
        let frame = [0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65];
        assert!(feed_all(&mut parser, &frame).is_some());
    }

    #[test]
    fn length_out_of_range_resynchronizes() {
        let mut parser = PacketParser::new();
        // Declared length below the header size.
        assert!(feed_all(&mut parser, &[0x55, 0xAA, 0x18, 0x00, 0x04]).is_none());
        // Declared length beyond the payload ceiling.
        assert!(feed_all(&mut parser, &[0x55, 0xAA, 0x19, 0x7F, 0xFF]).is_none());
        let frame = [0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65];
        assert!(feed_all(&mut parser, &frame).is_some());
    }

    #[test]
    fn repeated_sync_byte_keeps_hunting() {
        let mut parser = PacketParser::new();
        let mut stream: Vec<u8, 16> = Vec::new();
        stream.push(0x55).unwrap();
        stream
            .extend_from_slice(&[0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65])
            .unwrap();
        assert!(feed_all(&mut parser, &stream).is_some());
    }

    #[test]
    fn stalled_frame_times_out_without_side_effects() {
        let mut parser = PacketParser::new();
        for &byte in &[0x55, 0xAA, 0x19, 0x00, 0x0A, 0x01] {
            assert!(parser.push(byte).is_none());
        }
        for _ in 0..=FRAME_BYTE_TIMEOUT_TICKS {
            parser.on_tick();
        }
        // The stale partial payload must not leak into the next frame.
        let frame = [0x55, 0xAA, 0x18, 0x00, 0x05, 0x00, 0x65];
        let packet = feed_all(&mut parser, &frame).expect("fresh frame should parse");
        assert!(packet.payload.is_empty());
    }
}
