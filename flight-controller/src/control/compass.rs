//! Compass calibration mode. The sampling and ellipsoid fit run in the
//! magnetometer pipeline; flight control only parks here until that
//! pipeline reports completion, with motors untouched.

use crate::state::FlightState;

/// Returns true once the procedure is finished and normal mode selection
/// should resume.
pub fn calibration_step(_state: &mut FlightState) -> bool {
    true
}
