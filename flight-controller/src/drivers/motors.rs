/// Pulse output for one ESC channel. Values are in the output driver's
/// pulse-width units; the mixer guarantees they are already clamped.
pub trait MotorOutput {
    fn set(&mut self, output: usize, value: i32);
}
