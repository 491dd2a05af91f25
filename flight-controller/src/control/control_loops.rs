//! The per-tick control computation and the fixed-period loop around it.
//! `flight_tick` is synchronous and side-effect free outside its
//! parameters; `run_flight_loop` owns the timing, the estimator
//! handshakes, and the slow arm-time calibration.

use embassy_time::{Duration, Instant, Timer};
use embedded_hal_nb::serial::{Read, Write};

use shared_definitions::settings::Settings;

use crate::communication_interfaces::ground::GroundLink;
use crate::config::constants::{
    ACCEL_ASSIST_Z_FACTOR, ALTI_THROTTLE_DEADBAND, LED_COUNT, LOOP_PERIOD_US, LOW_THROTTLE_CUTOFF,
    MAX_COMMANDED_ASCENT_RATE, ONE_G, THROTTLE_SERVO_CENTER, UPDATE_RATE,
};
use crate::config::store::{apply_settings, SettingsManager, SettingsStore};
use crate::control::flight_mode::{self, ArmEvent, FlightMode};
use crate::control::{calibration, compass, PidBank};
use crate::drivers::{
    AttitudeEstimator, BatteryMonitor, Beeper, IndicatorStrip, MotorOutput, RadioSource, SensorBus,
};
use crate::output::{leds, mixer};
use crate::safety::{self, BatteryGovernor};
use crate::state::FlightState;

/// Follow-up work a tick asks the outer loop to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickCommand {
    None,
    Arm,
    Disarmed,
    StartCompassCalibration,
}

pub fn select_flight_mode<E: AttitudeEstimator>(state: &mut FlightState, estimator: &mut E) {
    let new_mode = flight_mode::mode_from_gear(state.radio.gear());
    flight_mode::apply_mode_change(state, new_mode, estimator);
}

/// One armed-or-disarmed control step: gestures, rate filtering, the PID
/// cascade, mixing, and motor writes. The disarm path returns without
/// touching the control stack so the motors stay exactly at minimum.
pub fn flight_tick<E, M>(
    state: &mut FlightState,
    pids: &mut PidBank,
    settings: &Settings,
    estimator: &mut E,
    motors: &mut M,
) -> TickCommand
where
    E: AttitudeEstimator,
    M: MotorOutput,
{
    state.led_color = leds::flight_color(
        state.mode,
        state.arm.armed,
        state.altitude.is_holding,
        state.counter,
        safety::low_battery(state, settings),
    );

    if !state.arm.armed {
        return match flight_mode::update_disarmed_gestures(state, settings) {
            ArmEvent::Armed => TickCommand::Arm,
            ArmEvent::CompassCalibration => TickCommand::StartCompassCalibration,
            _ => TickCommand::None,
        };
    }

    if update_armed_gestures_and_maybe_disarm(state, settings, motors) {
        return TickCommand::Disarmed;
    }

    // Bias-corrected body rates, low-pass filtered against gyro noise.
    let rate_roll = state.sensors.gyro[1] - state.gyro.zero[1];
    let rate_pitch = -(state.sensors.gyro[0] - state.gyro.zero[0]);
    let rate_yaw = -(state.sensors.gyro[2] - state.gyro.zero[2]);
    state.gyro.roll += ((rate_roll - state.gyro.roll) * state.gyro.rp_filter) >> 8;
    state.gyro.pitch += ((rate_pitch - state.gyro.pitch) * state.gyro.rp_filter) >> 8;
    state.gyro.yaw += ((rate_yaw - state.gyro.yaw) * state.gyro.yaw_filter) >> 8;

    let integrate = if state.radio.thro() < LOW_THROTTLE_CUTOFF {
        // Sitting at idle: hold the integrals and keep the orientation
        // target synced so nothing winds up before liftoff.
        if state.mode == FlightMode::Manual {
            estimator.reset_desired_orientation();
        } else {
            estimator.reset_desired_yaw();
        }
        false
    } else {
        true
    };

    let roll_out = pids
        .roll
        .calculate(state.attitude.roll, state.gyro.roll, integrate);
    let pitch_out = pids
        .pitch
        .calculate(state.attitude.pitch, state.gyro.pitch, integrate);
    let yaw_out = pids
        .yaw
        .calculate(state.attitude.yaw, state.gyro.yaw, integrate);

    let authority = mixer::throttle_mix(state.radio.thro());
    let mut thro_out = (state.radio.thro() << 2) + THROTTLE_SERVO_CENTER;

    if state.mode != FlightMode::Manual {
        if state.mode == FlightMode::Automatic {
            thro_out = altitude_cascade(state, pids, settings, integrate);
        }

        if ACCEL_ASSIST_Z_FACTOR > 0
            && state.radio.aile().abs() < 300
            && state.radio.elev().abs() < 300
            && authority > 32
        {
            // Damps the altitude bobble that pitch/roll inputs induce.
            thro_out -= (state.accel_z_smooth - ONE_G) * ACCEL_ASSIST_Z_FACTOR / 64;
        }

        if settings.thrust_correction_scale > 0 {
            // Tilted props lose vertical thrust; scale throttle back up,
            // bounded so a bad estimate cannot run the throttle away.
            let multiplier = (256
                + (estimator.thrust_factor() - 256) * settings.thrust_correction_scale as i32
                    / 256)
                .clamp(256, 384);
            thro_out = settings.min_throttle as i32
                + (((thro_out - settings.min_throttle as i32) * multiplier) >> 8);
        }
    }

    state.motors = mixer::mix(
        thro_out,
        roll_out,
        pitch_out,
        yaw_out,
        authority,
        settings.min_throttle_armed as i32,
        settings.max_throttle as i32,
    );

    if !settings.flags.disable_motors() {
        for (output, value) in state.motors.iter().enumerate() {
            motors.set(output, *value);
        }
    }

    TickCommand::None
}

fn update_armed_gestures_and_maybe_disarm<M: MotorOutput>(
    state: &mut FlightState,
    settings: &Settings,
    motors: &mut M,
) -> bool {
    if flight_mode::update_armed_gestures(state, settings) != ArmEvent::Disarmed {
        return false;
    }
    force_minimum_throttle(state, settings, motors);
    state.arm.armed = false;
    state.arm.arm_step = 0;
    state.arm.compass_step = 0;
    state.reset_loop_timer = true;
    true
}

pub fn force_minimum_throttle<M: MotorOutput>(
    state: &mut FlightState,
    settings: &Settings,
    motors: &mut M,
) {
    state.motors = [settings.min_throttle as i32; 4];
    for (output, value) in state.motors.iter().enumerate() {
        motors.set(output, *value);
    }
}

/// Automatic-mode vertical control: direct climb-rate command outside the
/// stick deadband, altitude hold inside it, then the ascent-rate
/// controller turns the request into a throttle trim.
fn altitude_cascade(
    state: &mut FlightState,
    pids: &mut PidBank,
    settings: &Settings,
    integrate: bool,
) -> i32 {
    let thro = state.radio.thro();
    let mut adjusted = 0;

    if thro.abs() > ALTI_THROTTLE_DEADBAND {
        state.altitude.is_holding = false;
        // Remove the deadband width so leaving it doesn't step the command.
        adjusted = if thro > 0 {
            thro - ALTI_THROTTLE_DEADBAND
        } else {
            thro + ALTI_THROTTLE_DEADBAND
        };
        state.altitude.desired_ascent_rate =
            adjusted * MAX_COMMANDED_ASCENT_RATE / (1024 - ALTI_THROTTLE_DEADBAND);
    } else {
        if !state.altitude.is_holding {
            // Deadband just entered: hold right here.
            state.altitude.is_holding = true;
            state.altitude.desired_altitude = state.altitude.altitude_estimate;
            pids.altitude.reset_integral();
        }
        state.altitude.desired_ascent_rate = pids.altitude.calculate(
            state.altitude.desired_altitude,
            state.altitude.altitude_estimate,
            integrate,
        );
    }

    // The ascent controller's P and I ride the aux knobs for in-flight
    // tuning, refreshed every tick.
    pids.ascent.set_p_gain(1024 + state.radio.aux2());
    pids.ascent
        .set_i_gain((1024 + state.radio.aux3()) * UPDATE_RATE);

    let trim = pids.ascent.calculate(
        state.altitude.desired_ascent_rate,
        state.altitude.ascent_estimate,
        integrate,
    );

    // A taste of direct stick keeps manual throttle response crisp.
    settings.center_throttle as i32 + trim + adjusted
}

/// The hard real-time loop. The deadline accumulates by a constant each
/// iteration and the wait targets that absolute instant, so timing error
/// never compounds.
#[allow(clippy::too_many_arguments)]
pub async fn run_flight_loop<E, R, S, M, B, Z, L, P0, P1, ST>(
    mut estimator: E,
    receiver: R,
    mut sensors: S,
    mut motors: M,
    mut battery: B,
    mut beeper: Z,
    mut indicator: L,
    mut port_usb: P0,
    mut port_aux: P1,
    mut manager: SettingsManager<ST>,
) -> !
where
    E: AttitudeEstimator,
    R: RadioSource,
    S: SensorBus,
    M: MotorOutput,
    B: BatteryMonitor,
    Z: Beeper,
    L: IndicatorStrip,
    P0: Read + Write,
    P1: Read + Write,
    ST: SettingsStore,
{
    let mut settings = manager.load_or_default();
    let mut state = FlightState::new(&settings);
    let mut pids = PidBank::new();
    let mut governor = BatteryGovernor::new();
    let mut link = GroundLink::new();

    apply_settings(&settings, &mut estimator, &mut sensors);

    state.sensors = sensors.snapshot();
    estimator.set_initial_altitude(state.sensors.alt_pressure);

    for output in 0..4 {
        motors.set(output, settings.min_throttle as i32);
    }

    indicator.set_all(&[leds::half(leds::RED); LED_COUNT]);
    let zero = calibration::find_gyro_zero(&mut sensors, &mut beeper).await;
    state.gyro.zero = zero.bias;
    estimator.set_gyro_zero(zero.bias[0], zero.bias[1], zero.bias[2]);

    let mut loop_target = Instant::now();
    loop {
        let cycle_start = Instant::now();

        state.sensors = sensors.snapshot();
        estimator.trigger_update(&state.sensors);

        state.accel_z_smooth += (state.sensors.accel[2] - state.accel_z_smooth)
            * settings.accel_correction_filter as i32
            / 256;

        state.radio.update_from(&receiver, &settings);

        let command = if state.mode == FlightMode::CalibrateCompass {
            if compass::calibration_step(&mut state) {
                flight_mode::apply_mode_change(&mut state, FlightMode::Assisted, &mut estimator);
            }
            TickCommand::None
        } else {
            select_flight_mode(&mut state, &mut estimator);
            flight_tick(&mut state, &mut pids, &settings, &mut estimator, &mut motors)
        };

        let settling = governor.update(&settings, &mut battery, &mut state);
        if settling {
            state.led_color = leds::half(leds::BLUE);
        }
        safety::update_alarm(&state, &settings, &mut beeper);

        indicator.set_all(&[state.led_color; LED_COUNT]);

        estimator.wait_for_completion().await;
        estimator.update_controls(&state.radio, state.mode == FlightMode::Manual);
        estimator.wait_for_completion().await;

        state.attitude.pitch = estimator.pitch_difference();
        state.attitude.roll = estimator.roll_difference();
        state.attitude.yaw = -estimator.yaw_difference();
        state.altitude.altitude_estimate = estimator.altitude_estimate();
        state.altitude.ascent_estimate = estimator.ascent_rate_estimate();

        match command {
            TickCommand::Arm => {
                state.arm.armed = true;
                state.arm.arm_step = 0;
                state.arm.compass_step = 0;
                beeper.cue_success();
                indicator.set_all(&[leds::half(leds::RED); LED_COUNT]);

                let zero = calibration::find_gyro_zero(&mut sensors, &mut beeper).await;
                state.gyro.zero = zero.bias;
                estimator.set_gyro_zero(zero.bias[0], zero.bias[1], zero.bias[2]);

                indicator.set_all(&[leds::half(leds::BLUE); LED_COUNT]);
                beeper.cue_tune();
                state.altitude.desired_altitude = state.altitude.altitude_estimate;
                state.reset_loop_timer = true;
                log::info!("armed");
            }
            TickCommand::Disarmed => {
                beeper.cue_disarm();
                indicator.set_all(&[leds::half(leds::GREEN); LED_COUNT]);
                log::info!("disarmed");
            }
            TickCommand::StartCompassCalibration => {
                flight_mode::apply_mode_change(
                    &mut state,
                    FlightMode::CalibrateCompass,
                    &mut estimator,
                );
                state.arm.arm_step = 0;
                state.arm.compass_step = 0;
            }
            TickCommand::None => {}
        }

        link.poll(
            &mut port_usb,
            &mut port_aux,
            &mut state,
            &mut settings,
            &mut manager,
            &mut estimator,
            &mut sensors,
            &mut motors,
            &mut beeper,
        );

        state.loop_time_us = cycle_start.elapsed().as_micros() as u32;
        state.counter = state.counter.wrapping_add(1);

        if state.reset_loop_timer {
            // A slow operation ran this tick; restart the deadline chain
            // rather than sprinting to catch up.
            state.reset_loop_timer = false;
            loop_target = Instant::now();
        }
        loop_target += Duration::from_micros(LOOP_PERIOD_US);
        Timer::at(loop_target).await;
    }
}
