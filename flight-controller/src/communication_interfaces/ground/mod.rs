//! Ground link: packet dispatch, per-port watchdog pulses, and the
//! telemetry emitter. Two independent serial ports are serviced; the
//! motor-nudge commands are honored only from the first (wired) one.

pub mod telemetry;

use embedded_hal_nb::serial::{Read, Write};

use shared_definitions::packet::{Command, Commands, Packet, PacketParser, TelemetryMode, PING_ACK};
use shared_definitions::settings::{Settings, SETTINGS_LEN};

use crate::config::constants::TELEMETRY_PULSE_TICKS;
use crate::config::store::{apply_settings, SettingsManager, SettingsStore};
use crate::drivers::{AttitudeEstimator, Beeper, MotorOutput, SensorBus};
use crate::state::FlightState;
use crate::util::ring::ByteRing;

pub const PORT_COUNT: usize = 2;
pub const TX_RING_SIZE: usize = 256;
/// Upper bound on bytes consumed from one port in one tick.
pub const RX_BUDGET_PER_TICK: usize = 64;

pub struct PortLink {
    parser: PacketParser,
    pub pulse: i16,
    pub(crate) tx: ByteRing<TX_RING_SIZE>,
}

impl PortLink {
    fn new() -> Self {
        PortLink {
            parser: PacketParser::new(),
            pulse: 0,
            tx: ByteRing::new(),
        }
    }
}

pub struct GroundLink {
    pub ports: [PortLink; PORT_COUNT],
    pub telemetry_mode: TelemetryMode,
    pending_nudge: Option<u8>,
}

impl GroundLink {
    pub fn new() -> Self {
        GroundLink {
            ports: [PortLink::new(), PortLink::new()],
            telemetry_mode: TelemetryMode::Off,
            pending_nudge: None,
        }
    }

    /// Runs the whole link for one tick: drain and dispatch inbound bytes,
    /// advance the telemetry phase machine, flush outbound rings, apply
    /// any motor nudge.
    #[allow(clippy::too_many_arguments)]
    pub fn poll<P0, P1, E, S, M, Z, ST>(
        &mut self,
        port_usb: &mut P0,
        port_aux: &mut P1,
        state: &mut FlightState,
        settings: &mut Settings,
        manager: &mut SettingsManager<ST>,
        estimator: &mut E,
        sensors: &mut S,
        motors: &mut M,
        beeper: &mut Z,
    ) where
        P0: Read + Write,
        P1: Read + Write,
        E: AttitudeEstimator,
        S: SensorBus,
        M: MotorOutput,
        Z: Beeper,
        ST: SettingsStore,
    {
        self.service_rx(0, port_usb, state, settings, manager, estimator, sensors, beeper);
        self.service_rx(1, port_aux, state, settings, manager, estimator, sensors, beeper);
        self.emit_telemetry(state, estimator);
        flush(&mut self.ports[0].tx, port_usb);
        flush(&mut self.ports[1].tx, port_aux);
        self.handle_nudge(state, settings, motors, beeper);
    }

    #[allow(clippy::too_many_arguments)]
    fn service_rx<P, E, S, Z, ST>(
        &mut self,
        index: usize,
        port: &mut P,
        state: &mut FlightState,
        settings: &mut Settings,
        manager: &mut SettingsManager<ST>,
        estimator: &mut E,
        sensors: &mut S,
        beeper: &mut Z,
    ) where
        P: Read,
        E: AttitudeEstimator,
        S: SensorBus,
        Z: Beeper,
        ST: SettingsStore,
    {
        for _ in 0..RX_BUDGET_PER_TICK {
            let byte = match port.read() {
                Ok(byte) => byte,
                Err(_) => break,
            };
            if let Some(packet) = self.ports[index].parser.push(byte) {
                // Any valid command re-arms this port's watchdog.
                self.ports[index].pulse = TELEMETRY_PULSE_TICKS;
                self.dispatch(
                    index, packet, state, settings, manager, estimator, sensors, beeper,
                );
            }
        }
        self.ports[index].parser.on_tick();
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch<E, S, Z, ST>(
        &mut self,
        index: usize,
        packet: Packet,
        state: &mut FlightState,
        settings: &mut Settings,
        manager: &mut SettingsManager<ST>,
        estimator: &mut E,
        sensors: &mut S,
        beeper: &mut Z,
    ) where
        E: AttitudeEstimator,
        S: SensorBus,
        Z: Beeper,
        ST: SettingsStore,
    {
        match packet.command {
            Command::SetTelemetryMode(mode) => {
                self.telemetry_mode = mode;
                for (i, port) in self.ports.iter_mut().enumerate() {
                    port.pulse = if i == index { TELEMETRY_PULSE_TICKS } else { 0 };
                }
            }
            Command::NudgeMotor(selection) => {
                if index == 0 {
                    self.pending_nudge = Some(selection);
                }
            }
            Command::ZeroGyroDrift => {
                if self.telemetry_mode == TelemetryMode::Sensors {
                    sensors.temp_zero_drift();
                }
            }
            Command::ResetGyroDrift => {
                if self.telemetry_mode == TelemetryMode::Sensors {
                    sensors.reset_drift();
                }
            }
            Command::ResetChannelCalibration => {
                if self.telemetry_mode == TelemetryMode::Sensors {
                    settings.channel_center = [0; 8];
                    settings.channel_scale = [1024; 8];
                    beeper.cue_success();
                    state.reset_loop_timer = true;
                }
            }
            Command::ZeroAccelOffset => {
                if self.telemetry_mode == TelemetryMode::Sensors {
                    sensors.temp_zero_accel_offsets();
                }
            }
            Command::ResetAccelOffset => {
                if self.telemetry_mode == TelemetryMode::Sensors {
                    sensors.reset_accel_offsets();
                }
            }
            Command::QuerySettings => {
                settings.seal();
                telemetry::queue_settings_reply(&mut self.ports[index], settings);
                state.reset_loop_timer = true;
            }
            Command::PushSettings => {
                self.apply_settings_push(
                    &packet, state, settings, manager, estimator, sensors, beeper,
                );
            }
            Command::FactoryReset => {
                if packet.payload.first() == Some(&Commands::FACTORY_RESET) {
                    *settings = Settings::default();
                    match manager.save(settings) {
                        Ok(()) => beeper.cue_disarm(),
                        Err(error) => {
                            log::warn!("{}", error);
                            beeper.cue_failure();
                        }
                    }
                    log::info!("settings wiped to defaults");
                }
                state.reset_loop_timer = true;
            }
            Command::Ping => {
                self.ports[index].tx.push(PING_ACK);
            }
        }
    }

    /// Replaces the active settings only when the pushed image validates;
    /// a bad image leaves everything untouched and sounds the failure cue.
    #[allow(clippy::too_many_arguments)]
    fn apply_settings_push<E, S, Z, ST>(
        &mut self,
        packet: &Packet,
        state: &mut FlightState,
        settings: &mut Settings,
        manager: &mut SettingsManager<ST>,
        estimator: &mut E,
        sensors: &mut S,
        beeper: &mut Z,
    ) where
        E: AttitudeEstimator,
        S: SensorBus,
        Z: Beeper,
        ST: SettingsStore,
    {
        state.reset_loop_timer = true;
        if packet.payload.len() != SETTINGS_LEN {
            beeper.cue_failure();
            return;
        }
        let pushed = match Settings::decode(&packet.payload) {
            Ok(pushed) if pushed.checksum_valid() => pushed,
            _ => {
                log::warn!("settings push rejected");
                beeper.cue_failure();
                return;
            }
        };
        *settings = pushed;
        apply_settings(settings, estimator, sensors);
        let persisted = manager.save(settings).is_ok()
            && manager.reload().map_or(false, |stored| stored == *settings);
        if persisted {
            beeper.alarm_off();
            beeper.cue_success();
            log::info!("settings updated");
        } else {
            log::warn!("settings update not persisted");
            beeper.cue_failure();
        }
    }

    /// Advances the pulse countdowns and queues this tick's telemetry
    /// frame. Each port runs down its own pulse; once the last one expires
    /// the stream stops until a host speaks again. The wired port streams a
    /// phase every tick; the radio port streams on even ticks only.
    fn emit_telemetry<E: AttitudeEstimator>(&mut self, state: &FlightState, estimator: &E) {
        for port in self.ports.iter_mut() {
            if port.pulse > 0 {
                port.pulse -= 1;
            }
        }
        if self.ports.iter().all(|port| port.pulse == 0) {
            self.telemetry_mode = TelemetryMode::Off;
            return;
        }
        if self.telemetry_mode != TelemetryMode::Sensors {
            return;
        }

        let (index, phase) = if self.ports[0].pulse > 0 {
            (0, (state.counter & 7) as u8)
        } else {
            if state.counter & 1 != 0 {
                return;
            }
            (1, ((state.counter >> 1) & 7) as u8)
        };
        telemetry::queue_phase(&mut self.ports[index], phase, state, estimator);
    }

    fn handle_nudge<M: MotorOutput, Z: Beeper>(
        &mut self,
        state: &mut FlightState,
        settings: &Settings,
        motors: &mut M,
        beeper: &mut Z,
    ) {
        let Some(selection) = self.pending_nudge.take() else {
            return;
        };
        match selection {
            0..=3 => motors.set(selection as usize, settings.test_throttle as i32),
            4 => {
                beeper.beep_hz(4500, 50);
                beeper.beep_hz(3500, 50);
            }
            7 => {
                for output in 0..4 {
                    motors.set(output, settings.min_throttle as i32);
                }
            }
            _ => {}
        }
        state.reset_loop_timer = true;
    }
}

fn flush<P: Write, const N: usize>(ring: &mut ByteRing<N>, port: &mut P) {
    while let Some(byte) = ring.peek() {
        match port.write(byte) {
            Ok(()) => {
                ring.pop();
            }
            Err(_) => break,
        }
    }
}
