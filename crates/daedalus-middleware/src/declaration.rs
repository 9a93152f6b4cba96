//! Declarative middleware entries.
//!
//! A [`MiddlewareDecl`] is one entry of a service's `middlewares.client`
//! or `middlewares.server` list in the bootstrap configuration:
//!
//! ```toml
//! [[services.middlewares.server]]
//! type = "timeout"
//! name = "short-timeout"
//! params = { timeout_ms = 250 }
//! ```

use daedalus_core::{RuntimeError, RuntimeResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Type of the middleware that is built after every other entry.
pub const SELECTOR: &str = "selector";

/// One declared middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareDecl {
    /// Middleware type, also the fallback factory key.
    #[serde(rename = "type")]
    pub kind: String,

    /// Instance name, used as the primary factory key and the carrier key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Disabled entries are skipped entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Factory-specific parameters.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

const fn default_enabled() -> bool {
    true
}

impl MiddlewareDecl {
    /// Creates an enabled, unnamed entry of type `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            enabled: true,
            params: serde_json::Value::Null,
        }
    }

    /// Creates an enabled entry with an instance name.
    #[must_use]
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind).with_name(name)
    }

    /// Sets the instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether the entry is enabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Disables the entry.
    #[must_use]
    pub fn disabled(self) -> Self {
        self.with_enabled(false)
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Returns `name` when non-empty, otherwise `type`.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.kind,
        }
    }

    /// Returns `true` for selector entries.
    #[must_use]
    pub fn is_selector(&self) -> bool {
        self.kind == SELECTOR
    }

    /// Parses the parameters into `T`.
    ///
    /// Missing parameters yield `T::default()`.
    pub fn params_as<T: DeserializeOwned + Default>(&self) -> RuntimeResult<T> {
        if self.params.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.params.clone()).map_err(|e| {
            RuntimeError::config_invalid(format!(
                "invalid params for middleware '{}': {e}",
                self.effective_name()
            ))
        })
    }
}

/// Client and server declaration lists of one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareSet {
    /// Outgoing call pipeline.
    #[serde(default)]
    pub client: Vec<MiddlewareDecl>,
    /// Incoming call pipeline.
    #[serde(default)]
    pub server: Vec<MiddlewareDecl>,
}
