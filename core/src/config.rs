// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device configuration

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{encoder::Format, Error};

/// Device configuration, loadable from JSON
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for persistent device state
    pub storage_root: PathBuf,

    /// Maximum PIN attempts before factory reset
    pub max_pin_attempts: u32,

    /// Timeout for user confirmations in seconds
    pub user_timeout: u64,

    /// Maximum number of bytes returned by `getrandom`
    pub max_random_bytes: usize,

    /// Requested transport part length
    pub part_len: usize,

    /// Directory for chunk codec staging files
    pub staging_dir: Option<PathBuf>,

    /// Label reported when none has been set
    pub default_label: String,

    /// Transport format for responses
    pub format: Format,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./qrsign"),
            max_pin_attempts: 10,
            user_timeout: 60,
            max_random_bytes: 1000,
            part_len: 300,
            staging_dir: None,
            default_label: "QRSign-DIY".to_string(),
            format: Format::Base64,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON string, missing fields take defaults
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let c: Self = serde_json::from_str(s).map_err(|e| Error::Configuration(e.to_string()))?;
        c.validate()?;
        Ok(c)
    }

    /// Check configuration values are usable
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_pin_attempts == 0 {
            return Err(Error::Configuration("max_pin_attempts must be non-zero".into()));
        }
        if self.part_len == 0 {
            return Err(Error::Configuration("part_len must be non-zero".into()));
        }
        Ok(())
    }

    /// User confirmation timeout
    pub fn user_timeout(&self) -> Duration {
        Duration::from_secs(self.user_timeout)
    }

    /// Directory used for codec staging, defaults to `<storage_root>/tmp`
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.storage_root.join("tmp"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let c = Config::from_json(r#"{"storage_root": "/tmp/x", "part_len": 120}"#).unwrap();

        assert_eq!(c.storage_root, PathBuf::from("/tmp/x"));
        assert_eq!(c.part_len, 120);
        assert_eq!(c.max_pin_attempts, 10);
        assert_eq!(c.staging_dir(), PathBuf::from("/tmp/x/tmp"));
    }

    #[test]
    fn reject_zero_attempts() {
        let r = Config::from_json(r#"{"max_pin_attempts": 0}"#);
        assert!(matches!(r, Err(Error::Configuration(_))));
    }
}
