/// Status LEDs, written once per tick as packed 0xRRGGBB values. The LED
/// hardware is clocked out by the sensor task.
pub trait IndicatorStrip {
    fn set_all(&mut self, colors: &[u32]);
}
