// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings port shared by controller hosts (browser binding, simulator CLI).

use tracing::warn;

use crate::config::{ConfigService, ConfigStore};
use crate::settings::{ActivationSettings, SETTINGS_KEY};

/// Host-facing port for loading/saving controller settings.
pub trait SettingsPort {
    /// Load settings (returns None if missing, unreadable or invalid).
    fn load_settings(&self) -> Option<ActivationSettings>;
    /// Persist settings (best-effort; failures are logged).
    fn save_settings(&self, settings: &ActivationSettings);
}

impl<S> SettingsPort for ConfigService<S>
where
    S: ConfigStore,
{
    fn load_settings(&self) -> Option<ActivationSettings> {
        match self.load::<ActivationSettings>(SETTINGS_KEY) {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => Some(settings),
                Err(err) => {
                    warn!(%err, "stored activation settings rejected");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "failed to load activation settings");
                None
            }
        }
    }

    fn save_settings(&self, settings: &ActivationSettings) {
        if let Err(err) = self.save(SETTINGS_KEY, settings) {
            warn!(%err, "failed to save activation settings");
        }
    }
}
