//! Receiver channel normalization. Raw channel readings are recentered and
//! rescaled through the calibration tables every tick, so the rest of the
//! controller always works in the same signed ±1024 stick range no matter
//! which receiver is fitted.

use shared_definitions::settings::Settings;

use crate::drivers::RadioSource;

pub const CHANNEL_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioFrame {
    pub channels: [i32; CHANNEL_COUNT],
}

impl RadioFrame {
    pub const THRO: usize = 0;
    pub const AILE: usize = 1;
    pub const ELEV: usize = 2;
    pub const RUDD: usize = 3;
    pub const GEAR: usize = 4;
    pub const AUX1: usize = 5;
    pub const AUX2: usize = 6;
    pub const AUX3: usize = 7;

    pub fn thro(&self) -> i32 {
        self.channels[Self::THRO]
    }

    pub fn aile(&self) -> i32 {
        self.channels[Self::AILE]
    }

    pub fn elev(&self) -> i32 {
        self.channels[Self::ELEV]
    }

    pub fn rudd(&self) -> i32 {
        self.channels[Self::RUDD]
    }

    pub fn gear(&self) -> i32 {
        self.channels[Self::GEAR]
    }

    pub fn aux1(&self) -> i32 {
        self.channels[Self::AUX1]
    }

    pub fn aux2(&self) -> i32 {
        self.channels[Self::AUX2]
    }

    pub fn aux3(&self) -> i32 {
        self.channels[Self::AUX3]
    }

    pub fn update_from<R: RadioSource>(&mut self, source: &R, settings: &Settings) {
        for (slot, value) in self.channels.iter_mut().enumerate() {
            let raw = source.get_channel(settings.channel_index[slot]);
            *value =
                (raw - settings.channel_center[slot] as i32) * settings.channel_scale[slot] as i32
                    / 1024;
        }
    }
}
