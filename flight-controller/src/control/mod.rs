pub mod calibration;
pub mod compass;
pub mod control_loops;
pub mod flight_mode;
pub mod pid;

use crate::config::constants::{
    ALT_HOLD_I, ALT_HOLD_P, ASCENT_P, ROLL_PITCH_D, ROLL_PITCH_P, UPDATE_RATE, YAW_D, YAW_I, YAW_P,
};
use pid::IntPid;

/// The five cascaded controllers, seeded for a stable baseline that
/// in-flight tuning adjusts from.
pub struct PidBank {
    pub roll: IntPid,
    pub pitch: IntPid,
    pub yaw: IntPid,
    pub altitude: IntPid,
    pub ascent: IntPid,
}

impl PidBank {
    pub fn new() -> Self {
        let mut roll = IntPid::new(ROLL_PITCH_P, 0, ROLL_PITCH_D, UPDATE_RATE);
        roll.set_precision(12);
        roll.set_max_output(3000);
        roll.set_pi_max(100);
        roll.set_max_integral(1900);
        roll.set_derivative_filter(128);

        let mut pitch = IntPid::new(ROLL_PITCH_P, 0, ROLL_PITCH_D, UPDATE_RATE);
        pitch.set_precision(12);
        pitch.set_max_output(3000);
        pitch.set_pi_max(100);
        pitch.set_max_integral(1900);
        pitch.set_derivative_filter(128);

        let mut yaw = IntPid::new(YAW_P, YAW_I, YAW_D, UPDATE_RATE);
        yaw.set_precision(12);
        yaw.set_max_output(5000);
        yaw.set_pi_max(100);
        yaw.set_max_integral(2000);
        yaw.set_derivative_filter(192);

        // Feeds climb-rate requests to the ascent controller while holding.
        let mut altitude = IntPid::new(ALT_HOLD_P, ALT_HOLD_I, 0, UPDATE_RATE);
        altitude.set_precision(14);
        altitude.set_max_output(5000);
        altitude.set_pi_max(1000);
        altitude.set_max_integral(4000);

        let mut ascent = IntPid::new(ASCENT_P, 0, 0, UPDATE_RATE);
        ascent.set_precision(12);
        ascent.set_max_output(4000);
        ascent.set_pi_max(500);
        ascent.set_max_integral(2000);

        PidBank {
            roll,
            pitch,
            yaw,
            altitude,
            ascent,
        }
    }
}
