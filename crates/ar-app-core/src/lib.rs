// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for AR controller hosts (config, settings).
//! Keeps browser and simulator adapters thin and framework-agnostic.

pub mod config;
pub mod config_port;
pub mod settings;

pub use config::{ConfigError, ConfigService, ConfigStore, MemoryConfigStore};
pub use config_port::SettingsPort;
pub use settings::{ActivationSettings, RetapPolicy, WatchdogSettings, SETTINGS_KEY};
