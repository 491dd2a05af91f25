// Loop timing
pub const UPDATE_RATE: i32 = 250;
pub const LOOP_PERIOD_US: u64 = 1_000_000 / UPDATE_RATE as u64;

// Stick thresholds
pub const MODE_GEAR_THRESHOLD: i32 = 512;
pub const GESTURE_STICK_THRESHOLD: i32 = 750;
pub const LOW_THROTTLE_CUTOFF: i32 = -800;
pub const COMPASS_GESTURE_TICKS: u16 = 250;

// Throttle shaping. 12000 recenters stick throttle into servo pulse units.
pub const THROTTLE_SERVO_CENTER: i32 = 12000;
pub const ALTI_THROTTLE_DEADBAND: i32 = 100;
pub const MAX_COMMANDED_ASCENT_RATE: i32 = 6000;

// Vertical accelerometer assist. Factor is 0..=64 for 0..=1.0.
pub const ACCEL_ASSIST_Z_FACTOR: i32 = 32;
pub const ONE_G: i32 = 4096;

// Gyro noise damping, 1 (heavy) to 256 (none)
pub const GYRO_FILTER_SEED: i32 = 192;

// PID seedings. Integral and derivative gains are stated per second; the
// controllers divide by the update rate.
pub const ROLL_PITCH_P: i32 = 8000;
pub const ROLL_PITCH_D: i32 = 20_000 * UPDATE_RATE;
pub const YAW_P: i32 = 15_000;
pub const YAW_I: i32 = 200 * UPDATE_RATE;
pub const YAW_D: i32 = 10_000 * UPDATE_RATE;
pub const ALT_HOLD_P: i32 = 600;
pub const ALT_HOLD_I: i32 = 500 * UPDATE_RATE;
pub const ASCENT_P: i32 = 1100;

// Battery measurement
pub const BATTERY_STARTUP_DELAY_TICKS: i16 = ((UPDATE_RATE * 2) & !15) as i16;
pub const BATTERY_VALIDITY_FLOOR: i16 = 200;
pub const BATTERY_ALARM_HZ: u32 = 5000;

// Telemetry watchdog, re-armed by every valid host command
pub const TELEMETRY_PULSE_TICKS: i16 = 500;

pub const LED_COUNT: usize = 2;
