//! Traits for the hardware-owning collaborators. Each peripheral is owned
//! by exactly one driver task; the control loop only ever talks to these
//! interfaces.

pub mod attitude;
pub mod battery;
pub mod beeper;
pub mod indicator;
pub mod motors;
pub mod radio;
pub mod sensors;

pub use attitude::AttitudeEstimator;
pub use battery::BatteryMonitor;
pub use beeper::Beeper;
pub use indicator::IndicatorStrip;
pub use motors::MotorOutput;
pub use radio::RadioSource;
pub use sensors::{SensorBus, SensorSnapshot};
