//! Flight mode selection and the arm/disarm gesture machine. Mode follows
//! the gear channel every tick; arming is a separate state driven by
//! deliberate held stick positions.

use shared_definitions::settings::Settings;

use crate::config::constants::{
    COMPASS_GESTURE_TICKS, GESTURE_STICK_THRESHOLD, MODE_GEAR_THRESHOLD,
};
use crate::drivers::AttitudeEstimator;
use crate::output::leds;
use crate::state::FlightState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    Assisted,
    Manual,
    Automatic,
    CalibrateCompass,
}

pub fn mode_from_gear(gear: i32) -> FlightMode {
    if gear > MODE_GEAR_THRESHOLD {
        FlightMode::Assisted
    } else if gear < -MODE_GEAR_THRESHOLD {
        FlightMode::Manual
    } else {
        FlightMode::Automatic
    }
}

/// Applies the orientation-reference resets a mode change demands. Manual
/// takes a full desired-orientation reset; every other target mode
/// re-synchronizes only the heading. Any change drops the hover latch.
pub fn apply_mode_change<E: AttitudeEstimator>(
    state: &mut FlightState,
    new_mode: FlightMode,
    estimator: &mut E,
) {
    if new_mode == state.mode {
        return;
    }
    if new_mode == FlightMode::Manual {
        estimator.reset_desired_orientation();
    } else {
        estimator.reset_desired_yaw();
    }
    if new_mode == FlightMode::Automatic {
        state.altitude.desired_altitude = state.altitude.altitude_estimate;
    }
    state.altitude.is_holding = false;
    state.mode = new_mode;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmEvent {
    None,
    Armed,
    Disarmed,
    CompassCalibration,
}

/// Disarmed: sticks held down-and-in walk the arm counter up; down with
/// both lateral sticks outboard walks the compass counter instead. Any
/// other combination zeroes both counters outright.
pub fn update_disarmed_gestures(state: &mut FlightState, settings: &Settings) -> ArmEvent {
    let thro = state.radio.thro();
    let aile = state.radio.aile();
    let elev = state.radio.elev();
    let rudd = state.radio.rudd();

    if thro < -GESTURE_STICK_THRESHOLD && elev < -GESTURE_STICK_THRESHOLD {
        if rudd > GESTURE_STICK_THRESHOLD && aile < -GESTURE_STICK_THRESHOLD {
            state.arm.arm_step += 1;
            state.arm.compass_step = 0;
            state.led_color = leds::half(leds::YELLOW);
            if state.arm.arm_step >= settings.arm_delay {
                return ArmEvent::Armed;
            }
        } else if rudd > GESTURE_STICK_THRESHOLD && aile > GESTURE_STICK_THRESHOLD {
            state.arm.compass_step += 1;
            state.arm.arm_step = 0;
            state.led_color = leds::half(leds::BLUE | leds::RED);
            if state.arm.compass_step == COMPASS_GESTURE_TICKS {
                return ArmEvent::CompassCalibration;
            }
        } else {
            state.arm.arm_step = 0;
            state.arm.compass_step = 0;
        }
    } else {
        state.arm.arm_step = 0;
        state.arm.compass_step = 0;
    }
    ArmEvent::None
}

/// Armed: sticks held down-and-outward walk the same counter toward
/// disarm.
pub fn update_armed_gestures(state: &mut FlightState, settings: &Settings) -> ArmEvent {
    let holding_disarm = state.radio.rudd() < -GESTURE_STICK_THRESHOLD
        && state.radio.aile() > GESTURE_STICK_THRESHOLD
        && state.radio.thro() < -GESTURE_STICK_THRESHOLD
        && state.radio.elev() < -GESTURE_STICK_THRESHOLD;

    if holding_disarm {
        state.arm.arm_step += 1;
        state.led_color = leds::half(leds::YELLOW);
        if state.arm.arm_step >= settings.disarm_delay {
            return ArmEvent::Disarmed;
        }
    } else {
        state.arm.arm_step = 0;
    }
    ArmEvent::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication_interfaces::receiver::RadioFrame;

    fn armed_gesture_frame() -> RadioFrame {
        let mut frame = RadioFrame::default();
        frame.channels[RadioFrame::THRO] = -800;
        frame.channels[RadioFrame::ELEV] = -800;
        frame.channels[RadioFrame::RUDD] = 800;
        frame.channels[RadioFrame::AILE] = -800;
        frame
    }

    fn test_state() -> FlightState {
        FlightState::new(&Settings::default())
    }

    #[test]
    fn gear_channel_selects_the_mode() {
        assert_eq!(mode_from_gear(600), FlightMode::Assisted);
        assert_eq!(mode_from_gear(-600), FlightMode::Manual);
        assert_eq!(mode_from_gear(0), FlightMode::Automatic);
        assert_eq!(mode_from_gear(512), FlightMode::Automatic);
        assert_eq!(mode_from_gear(-512), FlightMode::Automatic);
    }

    #[test]
    fn one_tick_short_of_arm_delay_does_not_arm() {
        let settings = Settings::default();
        let mut state = test_state();
        state.radio = armed_gesture_frame();
        for _ in 0..settings.arm_delay - 1 {
            assert_eq!(update_disarmed_gestures(&mut state, &settings), ArmEvent::None);
        }
        // A single-tick deviation resets the counter to zero.
        state.radio.channels[RadioFrame::RUDD] = 0;
        assert_eq!(update_disarmed_gestures(&mut state, &settings), ArmEvent::None);
        assert_eq!(state.arm.arm_step, 0);

        state.radio = armed_gesture_frame();
        for _ in 0..settings.arm_delay - 1 {
            assert_eq!(update_disarmed_gestures(&mut state, &settings), ArmEvent::None);
        }
        assert_eq!(
            update_disarmed_gestures(&mut state, &settings),
            ArmEvent::Armed
        );
    }

    #[test]
    fn compass_gesture_uses_its_own_counter() {
        let settings = Settings::default();
        let mut state = test_state();
        state.radio = armed_gesture_frame();
        state.radio.channels[RadioFrame::AILE] = 800;
        for _ in 0..COMPASS_GESTURE_TICKS - 1 {
            assert_eq!(update_disarmed_gestures(&mut state, &settings), ArmEvent::None);
        }
        assert_eq!(state.arm.arm_step, 0);
        assert_eq!(
            update_disarmed_gestures(&mut state, &settings),
            ArmEvent::CompassCalibration
        );
    }

    #[test]
    fn switching_gestures_resets_the_other_counter() {
        let settings = Settings::default();
        let mut state = test_state();
        state.radio = armed_gesture_frame();
        for _ in 0..10 {
            update_disarmed_gestures(&mut state, &settings);
        }
        assert_eq!(state.arm.arm_step, 10);
        state.radio.channels[RadioFrame::AILE] = 800;
        update_disarmed_gestures(&mut state, &settings);
        assert_eq!(state.arm.arm_step, 0);
        assert_eq!(state.arm.compass_step, 1);
    }

    #[test]
    fn disarm_gesture_counts_and_fires() {
        let settings = Settings::default();
        let mut state = test_state();
        state.arm.armed = true;
        state.radio.channels[RadioFrame::RUDD] = -800;
        state.radio.channels[RadioFrame::AILE] = 800;
        state.radio.channels[RadioFrame::THRO] = -800;
        state.radio.channels[RadioFrame::ELEV] = -800;
        for _ in 0..settings.disarm_delay - 1 {
            assert_eq!(update_armed_gestures(&mut state, &settings), ArmEvent::None);
        }
        assert_eq!(
            update_armed_gestures(&mut state, &settings),
            ArmEvent::Disarmed
        );
    }
}
