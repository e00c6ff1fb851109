// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for a compilation unit.
///
/// Loaded from TOML; missing keys take their defaults:
///
/// ```toml
/// initial_code_capacity = 64
/// initial_label_capacity = 8
/// allow_fallback = true
/// # max_code_len = 100000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Instructions reserved up front in the stream
    pub initial_code_capacity: usize,
    /// Labels reserved up front in the label table
    pub initial_label_capacity: usize,
    /// Whether unsupported constructs may degrade to the tree-walking
    /// interpreter at the outermost level
    pub allow_fallback: bool,
    /// Hard cap on instructions per unit; reaching it is an out-of-memory
    /// failure
    pub max_code_len: Option<usize>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            initial_code_capacity: 64,
            initial_label_capacity: 8,
            allow_fallback: true,
            max_code_len: None,
        }
    }
}

/// Errors loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl CompilerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded compiler config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_file() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert!(config.allow_fallback);
        assert_eq!(config.max_code_len, None);
    }

    #[test]
    fn test_partial_override() {
        let config =
            CompilerConfig::from_toml_str("allow_fallback = false\nmax_code_len = 128\n").unwrap();
        assert!(!config.allow_fallback);
        assert_eq!(config.max_code_len, Some(128));
        assert_eq!(config.initial_code_capacity, 64);
    }

    #[test]
    fn test_invalid_toml() {
        let err = CompilerConfig::from_toml_str("allow_fallback = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CompilerConfig::load(Path::new("/nonexistent/spacey-jsc.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
