//! Compiler configuration.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration:
//!
//! ```yaml
//! expansion_limit: 10000
//! record_trace: false
//! module_root: ./lib
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, SableError};

/// Default ceiling on transformer applications per module.
pub const DEFAULT_EXPANSION_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Transformer applications allowed while compiling one module.
    pub expansion_limit: usize,
    /// Keep every expansion step for later inspection.
    pub record_trace: bool,
    /// Base directory for file requires from sources that are not files.
    pub module_root: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            expansion_limit: DEFAULT_EXPANSION_LIMIT,
            record_trace: false,
            module_root: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, SableError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).map_err(|e| {
            SableError::new(ErrorKind::Config {
                message: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, SableError> {
        let text = fs::read_to_string(path).map_err(|e| {
            SableError::new(ErrorKind::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })?;
        Self::from_yaml_str(&text).map_err(|e| e.with_help(format!("in {}", path.display())))
    }

    fn validate(&self) -> Result<(), SableError> {
        if self.expansion_limit == 0 {
            return Err(SableError::new(ErrorKind::Config {
                message: "expansion_limit must be at least 1".into(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(CompilerConfig::from_yaml_str("").unwrap(), CompilerConfig::default());
        assert_eq!(
            CompilerConfig::default().expansion_limit,
            DEFAULT_EXPANSION_LIMIT
        );
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config = CompilerConfig::from_yaml_str("record_trace: true\n").unwrap();
        assert!(config.record_trace);
        assert_eq!(config.expansion_limit, DEFAULT_EXPANSION_LIMIT);
    }

    #[test]
    fn bad_documents_are_config_errors() {
        let err = CompilerConfig::from_yaml_str("expansion_limit: lots\n").unwrap_err();
        assert_eq!(err.code(), "sable::config::config");
        let err = CompilerConfig::from_yaml_str("unknown_key: 1\n").unwrap_err();
        assert_eq!(err.code(), "sable::config::config");
        let err = CompilerConfig::from_yaml_str("expansion_limit: 0\n").unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }
}
