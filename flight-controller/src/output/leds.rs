//! Status LED color selection. Colors are packed 0xRRGGBB; the strip is
//! bulk-written once per tick.

use crate::control::flight_mode::FlightMode;

pub const RED: u32 = 0xFF_00_00;
pub const GREEN: u32 = 0x00_FF_00;
pub const BLUE: u32 = 0x00_00_FF;
pub const YELLOW: u32 = RED | GREEN;
pub const CYAN: u32 = GREEN | BLUE;
pub const VIOLET: u32 = RED | BLUE;
pub const WHITE: u32 = RED | GREEN | BLUE;

pub fn half(color: u32) -> u32 {
    (color >> 1) & 0x7F_7F_7F
}

fn mode_color(mode: FlightMode) -> u32 {
    match mode {
        FlightMode::Assisted => CYAN,
        FlightMode::Automatic => WHITE,
        FlightMode::Manual => YELLOW,
        FlightMode::CalibrateCompass => VIOLET,
    }
}

/// Alternates between the mode color and the arm-state color on a slow
/// cycle; a low battery swaps the arm-state slot for a fast orange flash.
pub fn flight_color(
    mode: FlightMode,
    armed: bool,
    is_holding: bool,
    counter: u32,
    low_battery: bool,
) -> u32 {
    if low_battery {
        if (counter >> 3) & 7 < 4 {
            mode_color(mode)
        } else {
            RED | half(YELLOW)
        }
    } else {
        let index = (counter >> 3) & 15;
        if index < 3 || is_holding {
            mode_color(mode)
        } else if armed {
            RED
        } else {
            GREEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_cycle_shows_green() {
        let color = flight_color(FlightMode::Assisted, false, false, 8 * 4, false);
        assert_eq!(color, GREEN);
    }

    #[test]
    fn armed_cycle_shows_red() {
        let color = flight_color(FlightMode::Assisted, true, false, 8 * 4, false);
        assert_eq!(color, RED);
    }

    #[test]
    fn holding_pins_the_mode_color() {
        let color = flight_color(FlightMode::Automatic, true, true, 8 * 4, false);
        assert_eq!(color, WHITE);
    }
}
