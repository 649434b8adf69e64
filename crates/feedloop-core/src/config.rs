//! Loop configuration
//!
//! `SystemConfig` is deliberately small. It names the loop for tracing and
//! controls how effect tasks are scheduled; everything else about a loop is
//! expressed in code (initial state, reducer, feedback sources).

use crate::errors::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix understood by [`SystemConfig::merge_with_env`].
pub const ENV_PREFIX: &str = "FEEDLOOP_";

/// Configuration attached to a running system and visible to every feedback source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Name of the loop, recorded on the driver's tracing span.
    pub label: String,
    /// Emit one `trace!` event per reducer fold.
    pub trace_transitions: bool,
    /// Effect tasks yield once to the scheduler before polling their effect,
    /// so an effect that is started and cancelled in the same turn never runs.
    pub yield_before_effects: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            label: "feedback".to_string(),
            trace_transitions: false,
            yield_before_effects: true,
        }
    }
}

impl SystemConfig {
    /// Create a configuration with the given label and default knobs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Enable or disable per-fold trace logging.
    pub fn with_trace_transitions(mut self, enabled: bool) -> Self {
        self.trace_transitions = enabled;
        self
    }

    /// Enable or disable the scheduler yield before effects start.
    pub fn with_yield_before_effects(mut self, enabled: bool) -> Self {
        self.yield_before_effects = enabled;
        self
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FeedbackError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FeedbackError::config(format!("Invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Merge `FEEDLOOP_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `FEEDLOOP_*` key/value pairs. Unknown keys are ignored.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(field) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match field {
                "LABEL" => self.label = value.to_string(),
                "TRACE_TRANSITIONS" => self.trace_transitions = parse_flag(field, value)?,
                "YIELD_BEFORE_EFFECTS" => self.yield_before_effects = parse_flag(field, value)?,
                other => {
                    tracing::debug!(key = %other, "Ignoring unknown feedloop config variable");
                }
            }
        }
        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(FeedbackError::config("label must not be empty"));
        }
        Ok(())
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FeedbackError::config(format!(
            "{ENV_PREFIX}{field} expects a boolean, got {value:?}"
        ))),
    }
}
