//! The whole of the controller's mutable state, grouped by concern and
//! threaded through the loop by reference. Nothing here is shared across
//! tasks; cross-task data moves through the driver interfaces.

use shared_definitions::settings::Settings;

use crate::communication_interfaces::receiver::RadioFrame;
use crate::config::constants::GYRO_FILTER_SEED;
use crate::control::flight_mode::FlightMode;
use crate::drivers::sensors::SensorSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttitudeDeltas {
    pub roll: i32,
    pub pitch: i32,
    pub yaw: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AltitudeState {
    pub altitude_estimate: i32,
    pub ascent_estimate: i32,
    pub desired_altitude: i32,
    pub desired_ascent_rate: i32,
    /// Hover latch. Cleared by every mode change; set only when the
    /// throttle stick sits inside the deadband in Automatic mode.
    pub is_holding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GyroState {
    pub zero: [i32; 3],
    pub roll: i32,
    pub pitch: i32,
    pub yaw: i32,
    pub rp_filter: i32,
    pub yaw_filter: i32,
}

impl Default for GyroState {
    fn default() -> Self {
        GyroState {
            zero: [0; 3],
            roll: 0,
            pitch: 0,
            yaw: 0,
            rp_filter: GYRO_FILTER_SEED,
            yaw_filter: GYRO_FILTER_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArmState {
    pub armed: bool,
    /// Progress through the arm gesture while disarmed, and through the
    /// disarm gesture while armed. Any deviation zeroes it.
    pub arm_step: u16,
    pub compass_step: u16,
}

#[derive(Debug)]
pub struct FlightState {
    pub radio: RadioFrame,
    pub sensors: SensorSnapshot,
    pub attitude: AttitudeDeltas,
    pub altitude: AltitudeState,
    pub gyro: GyroState,
    pub arm: ArmState,
    pub mode: FlightMode,
    pub motors: [i32; 4],
    pub accel_z_smooth: i32,
    pub battery_volts: i16,
    pub led_color: u32,
    pub counter: u32,
    pub loop_time_us: u32,
    pub reset_loop_timer: bool,
}

impl FlightState {
    pub fn new(settings: &Settings) -> Self {
        FlightState {
            radio: RadioFrame::default(),
            sensors: SensorSnapshot::default(),
            attitude: AttitudeDeltas::default(),
            altitude: AltitudeState::default(),
            gyro: GyroState::default(),
            arm: ArmState::default(),
            mode: FlightMode::Assisted,
            motors: [settings.min_throttle as i32; 4],
            accel_z_smooth: 0,
            battery_volts: 0,
            led_color: 0,
            counter: 0,
            loop_time_us: 0,
            reset_loop_timer: false,
        }
    }
}
