use crate::communication_interfaces::receiver::RadioFrame;
use crate::drivers::sensors::SensorSnapshot;

/// Orientation/altitude estimator running in its own task. The loop hands it
/// a sensor snapshot, continues with other work, and joins it again at
/// `wait_for_completion`. That trigger/wait pair happens twice per tick:
/// once for the state update and once for the control target update.
#[allow(async_fn_in_trait)]
pub trait AttitudeEstimator {
    fn trigger_update(&mut self, sensors: &SensorSnapshot);
    async fn wait_for_completion(&mut self);

    /// Folds the current stick positions into the desired-orientation
    /// target. Manual mode integrates the full orientation; the assisted
    /// modes only steer it.
    fn update_controls(&mut self, radio: &RadioFrame, manual_mode: bool);

    fn pitch_difference(&self) -> i32;
    fn roll_difference(&self) -> i32;
    fn yaw_difference(&self) -> i32;
    fn altitude_estimate(&self) -> i32;
    fn ascent_rate_estimate(&self) -> i32;
    fn thrust_factor(&self) -> i32;
    fn quaternion(&self) -> [f32; 4];
    fn desired_quaternion(&self) -> [f32; 4];
    fn debug_value(&self) -> f32;

    fn reset_desired_orientation(&mut self);
    fn reset_desired_yaw(&mut self);

    fn set_gyro_zero(&mut self, x: i32, y: i32, z: i32);
    fn set_initial_altitude(&mut self, altitude: i32);
    fn set_roll_correction(&mut self, correction: &[f32; 2]);
    fn set_pitch_correction(&mut self, correction: &[f32; 2]);
    fn set_auto_level_rates(&mut self, roll_pitch: i32, yaw: i32);
    fn set_manual_rates(&mut self, roll_pitch: i32, yaw: i32);
}
