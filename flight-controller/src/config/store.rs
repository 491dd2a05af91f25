//! Settings persistence and application. The storage mechanics live behind
//! `SettingsStore`; this layer owns checksum validation and the
//! defaults fallback so a corrupt image can never reach the control loop.

use shared_definitions::settings::{Settings, SETTINGS_LEN};

use crate::drivers::{AttitudeEstimator, SensorBus};
use crate::util::error::AppError;

pub trait SettingsStore {
    type Error: core::fmt::Debug;

    fn load(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn save(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}

pub struct SettingsManager<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> SettingsManager<S> {
    pub fn new(store: S) -> Self {
        SettingsManager { store }
    }

    /// Loads the stored image, falling back to sealed defaults when the
    /// image is unreadable or fails its checksum.
    pub fn load_or_default(&mut self) -> Settings {
        let mut buf = [0u8; SETTINGS_LEN];
        let stored = match self.store.load(&mut buf) {
            Ok(()) => Settings::decode(&buf).ok().filter(|s| s.checksum_valid()),
            Err(error) => {
                log::warn!("settings load failed: {:?}", error);
                None
            }
        };
        stored.unwrap_or_else(|| {
            log::warn!("using default settings");
            let mut defaults = Settings::default();
            defaults.seal();
            defaults
        })
    }

    pub fn save(&mut self, settings: &mut Settings) -> Result<(), AppError<S::Error>> {
        settings.seal();
        self.store
            .save(&settings.encode())
            .map_err(|error| AppError::new("failed to store settings", error))
    }

    /// Reads the image back after a save. `None` means the stored copy does
    /// not validate.
    pub fn reload(&mut self) -> Option<Settings> {
        let mut buf = [0u8; SETTINGS_LEN];
        self.store.load(&mut buf).ok()?;
        Settings::decode(&buf).ok().filter(|s| s.checksum_valid())
    }
}

/// Pushes every table and rate the collaborators cache out of the settings
/// record. Called at startup and again after an accepted settings update.
pub fn apply_settings<E: AttitudeEstimator, S: SensorBus>(
    settings: &Settings,
    estimator: &mut E,
    sensors: &mut S,
) {
    sensors.set_drift_scale(&settings.drift_scale);
    sensors.set_accel_offsets(&settings.accel_offset);
    sensors.set_mag_scale_offsets(&settings.mag_scale_ofs);

    estimator.set_roll_correction(&settings.roll_correct);
    estimator.set_pitch_correction(&settings.pitch_correct);
    estimator.set_auto_level_rates(
        settings.auto_level_roll_pitch as i32,
        settings.auto_level_yaw_rate as i32,
    );
    estimator.set_manual_rates(
        settings.manual_roll_pitch_rate as i32,
        settings.manual_yaw_rate as i32,
    );
}
