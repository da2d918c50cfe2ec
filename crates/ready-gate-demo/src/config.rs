// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Demo configuration: the records the database serves and how long it
//! takes to come up.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error type for config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid config JSON.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// What the demo database holds once initialised.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Milliseconds before the database becomes ready.
    pub init_delay_ms: u64,
    /// Keys that resolve to a value.
    pub records: BTreeMap<String, String>,
    /// Keys whose lookup fails, with the failure message.
    pub failing: BTreeMap<String, String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            init_delay_ms: 300,
            records: BTreeMap::from([
                ("foo".to_owned(), "foo".to_owned()),
                ("bar".to_owned(), "bar".to_owned()),
            ]),
            failing: BTreeMap::from([("exploder".to_owned(), "kaboom!".to_owned())]),
        }
    }
}

impl DemoConfig {
    /// Parse config JSON. Empty input yields the defaults; missing fields
    /// fall back to their defaults.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load config from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_slice(&fs::read(path)?),
            None => Ok(Self::default()),
        }
    }

    /// Delay before the database is ready.
    pub fn init_delay(&self) -> Duration {
        Duration::from_millis(self.init_delay_ms)
    }

    /// Every configured key, sorted, records first then failing keys.
    pub fn keys(&self) -> Vec<String> {
        self.records
            .keys()
            .chain(self.failing.keys())
            .cloned()
            .collect()
    }
}
