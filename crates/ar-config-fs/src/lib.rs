// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for AR controller hosts (uses platform config dir).

use ar_app_core::config::{ConfigError, ConfigStore};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// One `<key>.json` file per key under a base directory.
#[derive(Debug)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/ar-activation`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "ar-activation")
            .ok_or_else(|| ConfigError::Unavailable("no home directory for the config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at an explicit directory.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base).map_err(|err| ConfigError::io(&base.display().to_string(), err))?;
        Ok(Self { base })
    }

    /// Directory the store writes into.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::Missing {
                key: key.to_owned(),
            }),
            Err(err) => Err(ConfigError::io(key, err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        // Readers never observe a partially written file.
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::create_dir_all(&self.base).map_err(|err| ConfigError::io(key, err))?;
        fs::write(&staging, data).map_err(|err| ConfigError::io(key, err))?;
        fs::rename(&staging, &path).map_err(|err| ConfigError::io(key, err))
    }
}
