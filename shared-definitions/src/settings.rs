//! Persisted configuration record. The byte layout is fixed: the same
//! encoding is written to flash, sent to the host on a query, and received
//! back on a push. The trailing checksum is the rolling hash over every
//! byte before it.

use bitfield_struct::bitfield;
use byteorder::{ByteOrder, LittleEndian};

use crate::checksum;

pub const CHANNEL_COUNT: usize = 8;

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FeatureFlags {
    pub use_sbus: bool,
    pub use_battery_monitor: bool,
    pub low_voltage_alarm: bool,
    pub disable_motors: bool,
    #[bits(4)]
    __: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub flags: FeatureFlags,
    pub arm_delay: u16,
    pub disarm_delay: u16,
    pub min_throttle: i16,
    pub min_throttle_armed: i16,
    pub max_throttle: i16,
    pub center_throttle: i16,
    pub test_throttle: i16,
    pub low_voltage_threshold: i16,
    pub voltage_offset: i16,
    pub accel_correction_filter: i16,
    pub thrust_correction_scale: i16,
    pub channel_index: [u8; CHANNEL_COUNT],
    pub channel_center: [i16; CHANNEL_COUNT],
    pub channel_scale: [i16; CHANNEL_COUNT],
    pub drift_scale: [i32; 3],
    pub accel_offset: [i32; 3],
    pub mag_scale_ofs: [i32; 6],
    pub roll_correct: [f32; 2],
    pub pitch_correct: [f32; 2],
    pub auto_level_roll_pitch: i16,
    pub auto_level_yaw_rate: i16,
    pub manual_roll_pitch_rate: i16,
    pub manual_yaw_rate: i16,
    pub checksum: u16,
}

pub const SETTINGS_LEN: usize = 137;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    Truncated,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            flags: FeatureFlags::new()
                .with_use_battery_monitor(true)
                .with_low_voltage_alarm(true),
            arm_delay: 250,
            disarm_delay: 250,
            min_throttle: 8000,
            min_throttle_armed: 8600,
            max_throttle: 16000,
            center_throttle: 12000,
            test_throttle: 9500,
            low_voltage_threshold: 1050,
            voltage_offset: 0,
            accel_correction_filter: 16,
            thrust_correction_scale: 256,
            channel_index: [0, 1, 2, 3, 4, 5, 6, 7],
            channel_center: [0; CHANNEL_COUNT],
            channel_scale: [1024; CHANNEL_COUNT],
            drift_scale: [0; 3],
            accel_offset: [0; 3],
            mag_scale_ofs: [0; 6],
            roll_correct: [0.0; 2],
            pitch_correct: [0.0; 2],
            auto_level_roll_pitch: 1024,
            auto_level_yaw_rate: 2048,
            manual_roll_pitch_rate: 2048,
            manual_yaw_rate: 2048,
            checksum: 0,
        }
    }
}

fn put_u8(buf: &mut [u8], off: &mut usize, value: u8) {
    buf[*off] = value;
    *off += 1;
}

fn put_u16(buf: &mut [u8], off: &mut usize, value: u16) {
    LittleEndian::write_u16(&mut buf[*off..*off + 2], value);
    *off += 2;
}

fn put_i16(buf: &mut [u8], off: &mut usize, value: i16) {
    LittleEndian::write_i16(&mut buf[*off..*off + 2], value);
    *off += 2;
}

fn put_i32(buf: &mut [u8], off: &mut usize, value: i32) {
    LittleEndian::write_i32(&mut buf[*off..*off + 4], value);
    *off += 4;
}

fn put_f32(buf: &mut [u8], off: &mut usize, value: f32) {
    LittleEndian::write_f32(&mut buf[*off..*off + 4], value);
    *off += 4;
}

fn get_u8(buf: &[u8], off: &mut usize) -> u8 {
    let value = buf[*off];
    *off += 1;
    value
}

fn get_u16(buf: &[u8], off: &mut usize) -> u16 {
    let value = LittleEndian::read_u16(&buf[*off..*off + 2]);
    *off += 2;
    value
}

fn get_i16(buf: &[u8], off: &mut usize) -> i16 {
    let value = LittleEndian::read_i16(&buf[*off..*off + 2]);
    *off += 2;
    value
}

fn get_i32(buf: &[u8], off: &mut usize) -> i32 {
    let value = LittleEndian::read_i32(&buf[*off..*off + 4]);
    *off += 4;
    value
}

fn get_f32(buf: &[u8], off: &mut usize) -> f32 {
    let value = LittleEndian::read_f32(&buf[*off..*off + 4]);
    *off += 4;
    value
}

impl Settings {
    pub fn encode(&self) -> [u8; SETTINGS_LEN] {
        let mut buf = [0u8; SETTINGS_LEN];
        let off = &mut 0;
        put_u8(&mut buf, off, self.flags.into_bits());
        put_u16(&mut buf, off, self.arm_delay);
        put_u16(&mut buf, off, self.disarm_delay);
        put_i16(&mut buf, off, self.min_throttle);
        put_i16(&mut buf, off, self.min_throttle_armed);
        put_i16(&mut buf, off, self.max_throttle);
        put_i16(&mut buf, off, self.center_throttle);
        put_i16(&mut buf, off, self.test_throttle);
        put_i16(&mut buf, off, self.low_voltage_threshold);
        put_i16(&mut buf, off, self.voltage_offset);
        put_i16(&mut buf, off, self.accel_correction_filter);
        put_i16(&mut buf, off, self.thrust_correction_scale);
        for value in self.channel_index {
            put_u8(&mut buf, off, value);
        }
        for value in self.channel_center {
            put_i16(&mut buf, off, value);
        }
        for value in self.channel_scale {
            put_i16(&mut buf, off, value);
        }
        for value in self.drift_scale {
            put_i32(&mut buf, off, value);
        }
        for value in self.accel_offset {
            put_i32(&mut buf, off, value);
        }
        for value in self.mag_scale_ofs {
            put_i32(&mut buf, off, value);
        }
        for value in self.roll_correct {
            put_f32(&mut buf, off, value);
        }
        for value in self.pitch_correct {
            put_f32(&mut buf, off, value);
        }
        put_i16(&mut buf, off, self.auto_level_roll_pitch);
        put_i16(&mut buf, off, self.auto_level_yaw_rate);
        put_i16(&mut buf, off, self.manual_roll_pitch_rate);
        put_i16(&mut buf, off, self.manual_yaw_rate);
        put_u16(&mut buf, off, self.checksum);
        debug_assert_eq!(*off, SETTINGS_LEN);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Settings, SettingsError> {
        if bytes.len() < SETTINGS_LEN {
            return Err(SettingsError::Truncated);
        }
        let off = &mut 0;
        let flags = FeatureFlags::from_bits(get_u8(bytes, off));
        let arm_delay = get_u16(bytes, off);
        let disarm_delay = get_u16(bytes, off);
        let min_throttle = get_i16(bytes, off);
        let min_throttle_armed = get_i16(bytes, off);
        let max_throttle = get_i16(bytes, off);
        let center_throttle = get_i16(bytes, off);
        let test_throttle = get_i16(bytes, off);
        let low_voltage_threshold = get_i16(bytes, off);
        let voltage_offset = get_i16(bytes, off);
        let accel_correction_filter = get_i16(bytes, off);
        let thrust_correction_scale = get_i16(bytes, off);
        let mut channel_index = [0u8; CHANNEL_COUNT];
        for value in channel_index.iter_mut() {
            *value = get_u8(bytes, off);
        }
        let mut channel_center = [0i16; CHANNEL_COUNT];
        for value in channel_center.iter_mut() {
            *value = get_i16(bytes, off);
        }
        let mut channel_scale = [0i16; CHANNEL_COUNT];
        for value in channel_scale.iter_mut() {
            *value = get_i16(bytes, off);
        }
        let mut drift_scale = [0i32; 3];
        for value in drift_scale.iter_mut() {
            *value = get_i32(bytes, off);
        }
        let mut accel_offset = [0i32; 3];
        for value in accel_offset.iter_mut() {
            *value = get_i32(bytes, off);
        }
        let mut mag_scale_ofs = [0i32; 6];
        for value in mag_scale_ofs.iter_mut() {
            *value = get_i32(bytes, off);
        }
        let mut roll_correct = [0f32; 2];
        for value in roll_correct.iter_mut() {
            *value = get_f32(bytes, off);
        }
        let mut pitch_correct = [0f32; 2];
        for value in pitch_correct.iter_mut() {
            *value = get_f32(bytes, off);
        }
        let auto_level_roll_pitch = get_i16(bytes, off);
        let auto_level_yaw_rate = get_i16(bytes, off);
        let manual_roll_pitch_rate = get_i16(bytes, off);
        let manual_yaw_rate = get_i16(bytes, off);
        let checksum = get_u16(bytes, off);
        Ok(Settings {
            flags,
            arm_delay,
            disarm_delay,
            min_throttle,
            min_throttle_armed,
            max_throttle,
            center_throttle,
            test_throttle,
            low_voltage_threshold,
            voltage_offset,
            accel_correction_filter,
            thrust_correction_scale,
            channel_index,
            channel_center,
            channel_scale,
            drift_scale,
            accel_offset,
            mag_scale_ofs,
            roll_correct,
            pitch_correct,
            auto_level_roll_pitch,
            auto_level_yaw_rate,
            manual_roll_pitch_rate,
            manual_yaw_rate,
            checksum,
        })
    }

    fn body_checksum(&self) -> u16 {
        checksum::compute(&self.encode()[..SETTINGS_LEN - 2])
    }

    /// Stamps the checksum field so the current contents validate.
    pub fn seal(&mut self) {
        self.checksum = self.body_checksum();
    }

    pub fn checksum_valid(&self) -> bool {
        self.checksum == self.body_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_is_byte_exact() {
        let mut settings = Settings::default();
        settings.seal();
        let encoded = settings.encode();
        let decoded = Settings::decode(&encoded).unwrap();
        assert_eq!(decoded, settings);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn sealed_settings_validate() {
        let mut settings = Settings::default();
        assert!(!settings.checksum_valid());
        settings.seal();
        assert!(settings.checksum_valid());
    }

    #[test]
    fn any_payload_bit_flip_invalidates() {
        let mut settings = Settings::default();
        settings.seal();
        let encoded = settings.encode();
        for i in 0..SETTINGS_LEN - 2 {
            let mut corrupted = encoded;
            corrupted[i] ^= 0x01;
            let decoded = Settings::decode(&corrupted).unwrap();
            assert!(!decoded.checksum_valid(), "flip at byte {} accepted", i);
        }
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let settings = Settings::default();
        let encoded = settings.encode();
        assert_eq!(
            Settings::decode(&encoded[..SETTINGS_LEN - 1]),
            Err(SettingsError::Truncated)
        );
    }

    #[test]
    fn mutated_field_survives_round_trip() {
        let mut settings = Settings::default();
        settings.flags.set_use_sbus(true);
        settings.channel_center[2] = -40;
        settings.drift_scale = [11, -22, 33];
        settings.roll_correct = [0.25, -1.5];
        settings.seal();
        let decoded = Settings::decode(&settings.encode()).unwrap();
        assert!(decoded.flags.use_sbus());
        assert_eq!(decoded.channel_center[2], -40);
        assert_eq!(decoded.drift_scale, [11, -22, 33]);
        assert_eq!(decoded.roll_correct, [0.25, -1.5]);
        assert!(decoded.checksum_valid());
    }
}
