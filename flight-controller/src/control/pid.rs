//! Fixed-point PID controller. Gains carry `precision` fractional bits so
//! the whole stack stays in integer arithmetic; every term is clamped, so
//! the output is always a bounded value and never an error.

pub struct IntPid {
    p_gain: i32,
    i_gain: i32,
    d_gain: i32,
    sample_rate: i32,
    precision: u32,
    round_offset: i64,
    max_output: i32,
    pi_max: i32,
    max_integral: i32,
    derivative_filter: i64,
    integral: i64,
    prev_error: i64,
    filtered_delta: i64,
}

impl IntPid {
    /// Integral and derivative gains are stated per second and divided down
    /// by the sample rate here, so seedings read in real units.
    pub fn new(p_gain: i32, i_gain: i32, d_gain: i32, sample_rate: i32) -> Self {
        let precision = 16;
        IntPid {
            p_gain,
            i_gain: i_gain / sample_rate,
            d_gain: d_gain / sample_rate,
            sample_rate,
            precision,
            round_offset: 1 << (precision - 1),
            max_output: i32::MAX,
            pi_max: i32::MAX,
            max_integral: i32::MAX,
            derivative_filter: 256,
            integral: 0,
            prev_error: 0,
            filtered_delta: 0,
        }
    }

    pub fn set_precision(&mut self, bits: u32) {
        self.precision = bits;
        self.round_offset = 1 << (bits - 1);
    }

    pub fn set_max_output(&mut self, max: i32) {
        self.max_output = max;
    }

    pub fn set_pi_max(&mut self, max: i32) {
        self.pi_max = max;
    }

    pub fn set_max_integral(&mut self, max: i32) {
        self.max_integral = max;
    }

    /// 1 = heavy smoothing of the error rate, 256 = none.
    pub fn set_derivative_filter(&mut self, filter: i32) {
        self.derivative_filter = filter as i64;
    }

    pub fn set_p_gain(&mut self, gain: i32) {
        self.p_gain = gain;
    }

    pub fn set_i_gain(&mut self, gain: i32) {
        self.i_gain = gain / self.sample_rate;
    }

    pub fn set_d_gain(&mut self, gain: i32) {
        self.d_gain = gain / self.sample_rate;
    }

    pub fn reset_integral(&mut self) {
        self.integral = 0;
    }

    /// Accumulated integral in output units.
    pub fn integral(&self) -> i32 {
        (self.integral >> self.precision) as i32
    }

    /// One controller step. With `integrate` false the integral is frozen
    /// in place, not cleared, so control authority returns instantly when
    /// integration is re-enabled.
    pub fn calculate(&mut self, setpoint: i32, measured: i32, integrate: bool) -> i32 {
        let error = (setpoint - measured) as i64;

        if integrate {
            self.integral += error * self.i_gain as i64;
            let limit = (self.max_integral as i64) << self.precision;
            self.integral = self.integral.clamp(-limit, limit);
        }

        let delta = error - self.prev_error;
        self.prev_error = error;
        // Exponentially smoothed error rate keeps gyro noise out of the
        // derivative term.
        self.filtered_delta += ((delta - self.filtered_delta) * self.derivative_filter) >> 8;

        let p = error * self.p_gain as i64;
        let pi = ((p + self.integral + self.round_offset) >> self.precision)
            .clamp(-(self.pi_max as i64), self.pi_max as i64);
        let d = (self.filtered_delta * self.d_gain as i64 + self.round_offset) >> self.precision;

        (pi + d).clamp(-(self.max_output as i64), self.max_output as i64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pid() -> IntPid {
        let mut pid = IntPid::new(8000, 4000 * 250, 0, 250);
        pid.set_precision(12);
        pid.set_max_output(3000);
        pid.set_pi_max(2500);
        pid.set_max_integral(1900);
        pid.set_derivative_filter(128);
        pid
    }

    #[test]
    fn output_stays_bounded_for_wild_inputs() {
        let mut pid = test_pid();
        pid.set_d_gain(20_000 * 250);
        let inputs = [
            (1_000_000, -1_000_000),
            (-1_000_000, 1_000_000),
            (0, 500_000),
            (123_456, -654_321),
            (5, -5),
        ];
        for _ in 0..200 {
            for (setpoint, measured) in inputs {
                let out = pid.calculate(setpoint, measured, true);
                assert!(out.abs() <= 3000, "output {} exceeded the clamp", out);
                assert!(pid.integral().abs() <= 1900);
            }
        }
    }

    #[test]
    fn integral_freezes_without_resetting() {
        let mut pid = test_pid();
        for _ in 0..50 {
            pid.calculate(1000, 0, true);
        }
        let wound_up = pid.integral();
        assert!(wound_up > 0);

        // Frozen: repeated opposing error must not move the accumulator.
        for _ in 0..50 {
            pid.calculate(-1000, 0, false);
        }
        assert_eq!(pid.integral(), wound_up);

        // Re-enabled: it moves again from where it left off.
        pid.calculate(-1000, 0, true);
        assert!(pid.integral() < wound_up);
    }

    #[test]
    fn explicit_reset_zeroes_the_integral() {
        let mut pid = test_pid();
        for _ in 0..20 {
            pid.calculate(500, 0, true);
        }
        assert!(pid.integral() != 0);
        pid.reset_integral();
        assert_eq!(pid.integral(), 0);
    }

    #[test]
    fn proportional_only_tracks_error_sign() {
        let mut pid = IntPid::new(4096, 0, 0, 250);
        pid.set_precision(12);
        pid.set_max_output(5000);
        pid.set_pi_max(5000);
        assert!(pid.calculate(100, 0, true) > 0);
        assert!(pid.calculate(-100, 0, true) < 0);
        assert_eq!(pid.calculate(0, 0, true), 0);
    }

    #[test]
    fn pi_sum_respects_its_own_clamp() {
        let mut pid = IntPid::new(8000, 0, 0, 250);
        pid.set_precision(12);
        pid.set_max_output(3000);
        pid.set_pi_max(100);
        // A large pure-P response must be held to the P+I ceiling.
        let out = pid.calculate(100_000, 0, true);
        assert_eq!(out, 100);
    }

    #[test]
    fn derivative_filter_damps_single_tick_spikes() {
        let mut filtered = IntPid::new(0, 0, 10_000 * 250, 250);
        filtered.set_precision(12);
        filtered.set_max_output(30_000);
        filtered.set_pi_max(30_000);
        filtered.set_derivative_filter(32);

        let mut raw = IntPid::new(0, 0, 10_000 * 250, 250);
        raw.set_precision(12);
        raw.set_max_output(30_000);
        raw.set_pi_max(30_000);
        raw.set_derivative_filter(256);

        // Settle both, then hit them with the same one-tick error spike.
        for _ in 0..10 {
            filtered.calculate(0, 0, true);
            raw.calculate(0, 0, true);
        }
        let spike_filtered = filtered.calculate(1000, 0, true);
        let spike_raw = raw.calculate(1000, 0, true);
        assert!(spike_filtered.abs() < spike_raw.abs());
    }

    #[test]
    fn runtime_gain_changes_take_effect_immediately() {
        let mut pid = IntPid::new(1024, 0, 0, 250);
        pid.set_precision(10);
        pid.set_max_output(10_000);
        pid.set_pi_max(10_000);
        let before = pid.calculate(100, 0, true);
        pid.set_p_gain(2048);
        let after = pid.calculate(100, 0, true);
        assert_eq!(after, before * 2);
    }
}
