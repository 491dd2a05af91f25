//! Battery measurement and the low-voltage alarm. The measurement is a
//! capacitor charge-time sequence spread across a fixed phase pattern of
//! loop ticks; the alarm is periodic and never alters flight behavior.

use libm::expf;

use shared_definitions::settings::Settings;

use crate::config::constants::{
    BATTERY_ALARM_HZ, BATTERY_STARTUP_DELAY_TICKS, BATTERY_VALIDITY_FLOOR,
};
use crate::drivers::{BatteryMonitor, Beeper};
use crate::state::FlightState;

// Measurement cell constants: input threshold volts, divider ratio, and
// the cell's RC time constant in charge-time counts.
const SENSE_THRESHOLD_VOLTS: f32 = 1.65;
const DIVIDER_RATIO: f32 = 5.0;
const CHARGE_RC_COUNTS: f32 = 1000.0;

pub struct BatteryGovernor {
    startup_delay: i16,
}

impl BatteryGovernor {
    pub fn new() -> Self {
        BatteryGovernor {
            // The charge/discharge switching upsets freshly powered ESCs,
            // so hold off for two seconds, aligned to the phase pattern.
            startup_delay: BATTERY_STARTUP_DELAY_TICKS,
        }
    }

    /// One tick of the measurement sequence. Returns true while still in
    /// the post-boot settling window.
    pub fn update<B: BatteryMonitor>(
        &mut self,
        settings: &Settings,
        battery: &mut B,
        state: &mut FlightState,
    ) -> bool {
        if !settings.flags.use_battery_monitor() {
            return false;
        }
        if self.startup_delay > 0 {
            self.startup_delay -= 1;
            return true;
        }
        match state.counter & 15 {
            0 => battery.start_discharge(),
            2 => battery.start_charge(),
            15 => {
                state.battery_volts =
                    compute_voltage(battery.read_charge_time()) + settings.voltage_offset;
            }
            _ => {}
        }
        false
    }
}

/// A reading only counts as low when it is also above the validity floor;
/// a disconnected sense line reads near zero and must not alarm.
pub fn low_battery(state: &FlightState, settings: &Settings) -> bool {
    settings.flags.use_battery_monitor()
        && state.battery_volts < settings.low_voltage_threshold
        && state.battery_volts > BATTERY_VALIDITY_FLOOR
}

pub fn update_alarm<Z: Beeper>(state: &FlightState, settings: &Settings, beeper: &mut Z) {
    if !settings.flags.use_battery_monitor() || !settings.flags.low_voltage_alarm() {
        return;
    }
    if low_battery(state, settings) && state.counter & 63 == 0 {
        log::warn!("battery low: {} cV", state.battery_volts);
        beeper.alarm_on(BATTERY_ALARM_HZ);
    } else if state.counter & 63 > 32 {
        beeper.alarm_off();
    }
}

/// Inverts the RC charge curve: the emptier the pack, the longer the cap
/// takes to reach the sense threshold. Result in centivolts.
fn compute_voltage(charge_time: i32) -> i16 {
    if charge_time <= 0 {
        return 0;
    }
    let t = charge_time as f32;
    let fraction = 1.0 - expf(-t / CHARGE_RC_COUNTS);
    if fraction <= 0.0 {
        return 0;
    }
    let volts = DIVIDER_RATIO * SENSE_THRESHOLD_VOLTS / fraction;
    (volts * 100.0).clamp(0.0, 3000.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_definitions::settings::Settings;

    struct MockBattery {
        discharges: u32,
        charges: u32,
        reads: u32,
        charge_time: i32,
    }

    impl MockBattery {
        fn new(charge_time: i32) -> Self {
            MockBattery {
                discharges: 0,
                charges: 0,
                reads: 0,
                charge_time,
            }
        }
    }

    impl BatteryMonitor for MockBattery {
        fn start_discharge(&mut self) {
            self.discharges += 1;
        }

        fn start_charge(&mut self) {
            self.charges += 1;
        }

        fn read_charge_time(&mut self) -> i32 {
            self.reads += 1;
            self.charge_time
        }
    }

    fn run_ticks(
        governor: &mut BatteryGovernor,
        settings: &Settings,
        battery: &mut MockBattery,
        state: &mut FlightState,
        ticks: u32,
    ) {
        for _ in 0..ticks {
            governor.update(settings, battery, state);
            state.counter = state.counter.wrapping_add(1);
        }
    }

    #[test]
    fn waits_out_the_startup_delay() {
        let settings = Settings::default();
        let mut governor = BatteryGovernor::new();
        let mut battery = MockBattery::new(800);
        let mut state = FlightState::new(&settings);
        run_ticks(
            &mut governor,
            &settings,
            &mut battery,
            &mut state,
            BATTERY_STARTUP_DELAY_TICKS as u32,
        );
        assert_eq!(battery.discharges, 0);
        assert_eq!(battery.reads, 0);
    }

    #[test]
    fn phases_fire_in_sequence_after_the_delay() {
        let settings = Settings::default();
        let mut governor = BatteryGovernor::new();
        let mut battery = MockBattery::new(800);
        let mut state = FlightState::new(&settings);
        let total = BATTERY_STARTUP_DELAY_TICKS as u32 + 32;
        run_ticks(&mut governor, &settings, &mut battery, &mut state, total);
        assert_eq!(battery.discharges, 2);
        assert_eq!(battery.charges, 2);
        assert_eq!(battery.reads, 2);
        assert!(state.battery_volts > 0);
    }

    #[test]
    fn longer_charge_time_reads_as_lower_voltage() {
        let healthy = compute_voltage(400);
        let tired = compute_voltage(1400);
        assert!(healthy > tired);
        assert!(tired > 0);
    }

    #[test]
    fn zeroed_sensor_never_alarms() {
        let settings = Settings::default();
        let mut state = FlightState::new(&settings);
        state.battery_volts = 0;
        assert!(!low_battery(&state, &settings));
        state.battery_volts = settings.low_voltage_threshold - 1;
        assert!(low_battery(&state, &settings));
        state.battery_volts = settings.low_voltage_threshold;
        assert!(!low_battery(&state, &settings));
    }
}
