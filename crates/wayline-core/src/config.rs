//! # Stack Configuration
//!
//! Tunables for a `NavigationStack`, loadable from TOML.
//!
//! ```toml
//! label = "main"
//! max_redirects = 8
//! fulfill_on_clear = true
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use crate::types::NavigationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of a navigation stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Name used in log output.
    pub label: Option<String>,
    /// Redirect hop limit. `None` leaves chains unbounded.
    pub max_redirects: Option<usize>,
    /// Whether `clear()` fulfils the removed entities' result channels.
    pub fulfill_on_clear: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            label: None,
            max_redirects: None,
            fulfill_on_clear: true,
        }
    }
}

impl StackConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, NavigationError> {
        let config: Self =
            toml::from_str(text).map_err(|e| NavigationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NavigationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NavigationError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Set the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the redirect hop limit.
    #[must_use]
    pub fn with_max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = Some(limit);
        self
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), NavigationError> {
        if self.max_redirects == Some(0) {
            return Err(NavigationError::Config(
                "max_redirects must be at least 1; omit it for no limit".to_string(),
            ));
        }
        if self.label.as_deref().is_some_and(str::is_empty) {
            return Err(NavigationError::Config("label must not be empty".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
