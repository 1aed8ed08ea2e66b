// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port for the activation controller's hosts.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// Where settings blobs live: a directory, browser storage, memory.
///
/// Stores move opaque bytes by key and report a missing key as
/// [`ConfigError::Missing`]; encoding is the service's business.
pub trait ConfigStore {
    /// Bytes stored under `key`.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replace whatever is stored under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failure reading, decoding or validating stored settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key.
    #[error("no config stored under `{key}`")]
    Missing {
        /// Requested key.
        key: String,
    },
    /// The backing store failed.
    #[error("config store failed for `{key}`: {source}")]
    Io {
        /// Key being read or written.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The blob is not valid JSON for the requested type.
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A value deserialized but violates a constraint.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Offending field path.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// No store can be opened on this host.
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

impl ConfigError {
    /// I/O failure on `key`.
    pub fn io(key: &str, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_owned(),
            source,
        }
    }
}

/// JSON codec in front of a [`ConfigStore`].
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Decode the value under `key`.
    ///
    /// A missing key or an empty blob (a store that was cleared) is `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let bytes = match self.store.load_raw(key) {
            Err(ConfigError::Missing { .. }) => return Ok(None),
            other => other?,
        };
        if bytes.is_empty() {
            debug!(key, "empty config blob");
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Encode `value` as pretty JSON under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)?;
        debug!(key, bytes = data.len(), "config saved");
        Ok(())
    }
}

/// In-memory `ConfigStore` for hosts without persistent storage (and tests).
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blobs: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.blobs
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Missing {
                key: key.to_owned(),
            })
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.blobs.borrow_mut().insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}
