/// Charge-time battery measurement. The governor sequences the discharge
/// and charge phases across ticks and converts the resulting count into a
/// voltage.
pub trait BatteryMonitor {
    fn start_discharge(&mut self);
    fn start_charge(&mut self);
    fn read_charge_time(&mut self) -> i32;
}
