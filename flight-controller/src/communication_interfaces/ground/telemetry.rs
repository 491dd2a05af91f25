//! Telemetry frame construction. Phases cycle through small fixed payloads
//! so a full picture of the craft costs eight ticks of link time. One phase
//! slot is intentionally vacant to leave headroom in the cycle.

use heapless::Vec;

use shared_definitions::packet::{frame_packet, Commands, TelemetryIds};
use shared_definitions::settings::Settings;

use super::PortLink;
use crate::drivers::AttitudeEstimator;
use crate::state::FlightState;

const MAX_PHASE_PAYLOAD: usize = 24;
const MAX_PHASE_FRAME: usize = MAX_PHASE_PAYLOAD + 7;

pub(crate) fn queue_phase<E: AttitudeEstimator>(
    port: &mut PortLink,
    phase: u8,
    state: &FlightState,
    estimator: &E,
) {
    let mut payload: Vec<u8, MAX_PHASE_PAYLOAD> = Vec::new();
    let command = match phase {
        0 => {
            for channel in state.radio.channels {
                let _ = payload.extend_from_slice(&(channel as i16).to_le_bytes());
            }
            let _ = payload.extend_from_slice(&state.battery_volts.to_le_bytes());
            TelemetryIds::RADIO_BATTERY
        }
        1 => {
            let _ = payload.extend_from_slice(&state.loop_time_us.to_le_bytes());
            let _ = payload.extend_from_slice(&estimator.debug_value().to_le_bytes());
            TelemetryIds::LOOP_TIMING
        }
        2 => {
            let sensors = &state.sensors;
            let words = [
                sensors.temperature,
                sensors.gyro[0],
                sensors.gyro[1],
                sensors.gyro[2],
                sensors.accel[0],
                sensors.accel[1],
                sensors.accel[2],
                sensors.mag[0],
                sensors.mag[1],
                sensors.mag[2],
            ];
            for word in words {
                let _ = payload.extend_from_slice(&(word as i16).to_le_bytes());
            }
            TelemetryIds::RAW_SENSORS
        }
        4 => {
            for component in estimator.quaternion() {
                let _ = payload.extend_from_slice(&component.to_le_bytes());
            }
            TelemetryIds::QUATERNION
        }
        5 => {
            for motor in state.motors {
                let _ = payload.extend_from_slice(&(motor as i16).to_le_bytes());
            }
            TelemetryIds::MOTORS
        }
        6 => {
            let words = [
                state.attitude.pitch,
                state.attitude.roll,
                state.attitude.yaw,
                state.sensors.alt_pressure,
                state.sensors.alt_temperature,
                state.altitude.altitude_estimate,
            ];
            for word in words {
                let _ = payload.extend_from_slice(&word.to_le_bytes());
            }
            TelemetryIds::COMPUTED
        }
        7 => {
            for component in estimator.desired_quaternion() {
                let _ = payload.extend_from_slice(&component.to_le_bytes());
            }
            TelemetryIds::DESIRED_QUATERNION
        }
        _ => return,
    };

    let mut frame: Vec<u8, MAX_PHASE_FRAME> = Vec::new();
    if frame_packet(command, &payload, &mut frame).is_ok() {
        for &byte in frame.iter() {
            port.tx.push(byte);
        }
    }
}

/// The settings snapshot reply to a query, sent through the same framing.
pub(crate) fn queue_settings_reply(port: &mut PortLink, settings: &Settings) {
    let encoded = settings.encode();
    let mut frame: Vec<u8, { shared_definitions::settings::SETTINGS_LEN + 7 }> = Vec::new();
    if frame_packet(Commands::QUERY_SETTINGS, &encoded, &mut frame).is_ok() {
        for &byte in frame.iter() {
            port.tx.push(byte);
        }
    }
}
