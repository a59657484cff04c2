//! Engine configuration.
//!
//! Behaviors the source material leaves open are explicit configuration
//! here rather than hardcoded: what a denied sensitive tool call does to the
//! run, and how many quality-gate re-attempts a run is allowed.

use crate::error::{ConfigError, ForemanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// What happens to a run when a sensitive tool call is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyPolicy {
    /// The run fails terminally.
    FailRun,
    /// The tool call is skipped and the run continues.
    SkipAndContinue,
}

/// Pluggable classification of tools as sensitive (approval-gated).
pub trait ToolPolicy: Send + Sync {
    /// Whether a tool call must be approved by a human before executing.
    fn is_sensitive(&self, tool: &str) -> bool;
}

/// Default tool classification backed by a configured name set.
#[derive(Debug, Clone)]
pub struct SensitivePolicy {
    tools: HashSet<String>,
}

impl SensitivePolicy {
    /// Classify the given tool names as sensitive.
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for SensitivePolicy {
    fn default() -> Self {
        Self::new(["shell", "git_push", "delete_file"])
    }
}

impl ToolPolicy for SensitivePolicy {
    fn is_sensitive(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }
}

/// Master engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Policy applied when a sensitive tool call is denied.
    pub deny_policy: DenyPolicy,
    /// Re-attempts allowed after a quality-gate failure before the run fails.
    pub quality_gate_retries: u32,
    /// Window without forward progress before a run is flagged stalled.
    pub stall_window: Duration,
    /// Subject prefix for worker dispatch (`<prefix>.<backend>`).
    pub dispatch_prefix: String,
    /// Shared subject for cancellation signals.
    pub cancel_subject: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deny_policy: DenyPolicy::FailRun,
            quality_gate_retries: 2,
            stall_window: Duration::from_secs(600),
            dispatch_prefix: "agents.dispatch".to_string(),
            cancel_subject: "agents.cancel".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deny policy.
    pub fn with_deny_policy(mut self, policy: DenyPolicy) -> Self {
        self.deny_policy = policy;
        self
    }

    /// Set the quality-gate retry budget.
    pub fn with_quality_gate_retries(mut self, retries: u32) -> Self {
        self.quality_gate_retries = retries;
        self
    }

    /// Set the stall detection window.
    pub fn with_stall_window(mut self, window: Duration) -> Self {
        self.stall_window = window;
        self
    }

    /// Set the dispatch subject prefix.
    pub fn with_dispatch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dispatch_prefix = prefix.into();
        self
    }

    /// Create an EngineConfig from environment variables.
    ///
    /// Unset variables fall back to defaults; a set-but-malformed value is a
    /// [`ConfigError::InvalidValue`].
    ///
    /// # Environment Variables
    /// - `FOREMAN_DENY_POLICY`: `fail_run` or `skip_and_continue` (default: fail_run)
    /// - `FOREMAN_QUALITY_GATE_RETRIES`: re-attempts before failing (default: 2)
    /// - `FOREMAN_STALL_WINDOW_SECS`: stall detection window (default: 600)
    /// - `FOREMAN_DISPATCH_PREFIX`: dispatch subject prefix (default: agents.dispatch)
    pub fn from_env() -> ForemanResult<Self> {
        let defaults = Self::default();

        let deny_policy = match std::env::var("FOREMAN_DENY_POLICY").ok() {
            Some(raw) => match raw.as_str() {
                "skip_and_continue" => DenyPolicy::SkipAndContinue,
                "fail_run" => DenyPolicy::FailRun,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "FOREMAN_DENY_POLICY".to_string(),
                        value: raw,
                        reason: "expected fail_run or skip_and_continue".to_string(),
                    }
                    .into())
                }
            },
            None => defaults.deny_policy,
        };

        let quality_gate_retries = parse_env::<u32>("FOREMAN_QUALITY_GATE_RETRIES")?
            .unwrap_or(defaults.quality_gate_retries);

        let stall_window = parse_env::<u64>("FOREMAN_STALL_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.stall_window);

        let dispatch_prefix =
            std::env::var("FOREMAN_DISPATCH_PREFIX").unwrap_or(defaults.dispatch_prefix);

        Ok(Self {
            deny_policy,
            quality_gate_retries,
            stall_window,
            dispatch_prefix,
            cancel_subject: defaults.cancel_subject,
        })
    }
}

fn parse_env<T: std::str::FromStr>(field: &str) -> ForemanResult<Option<T>> {
    match std::env::var(field) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value: raw,
                reason: "expected a non-negative integer".to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// TESTS
// =============================================================================
