use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What a failed population branch does to the rest of the resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure and leave that branch's rows unpopulated. Sibling
    /// branches and the base result are unaffected.
    #[default]
    BestEffort,
    /// Abort the whole resolution with the first branch error.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulateConfig {
    pub errors: ErrorPolicy,
    /// Sort population fetches by `_id` when a reference declares no sort,
    /// so the first match for a `Single` reference is deterministic.
    pub stable_order: bool,
    /// Per-fetch deadline layered on top of the caller's context.
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            errors: ErrorPolicy::BestEffort,
            stable_order: true,
            fetch_timeout_ms: None,
        }
    }
}

impl PopulateConfig {
    pub const ERRORS_VAR: &'static str = "SLATE_POPULATE_ERRORS";
    pub const STABLE_ORDER_VAR: &'static str = "SLATE_POPULATE_STABLE_ORDER";
    pub const FETCH_TIMEOUT_VAR: &'static str = "SLATE_POPULATE_FETCH_TIMEOUT_MS";

    /// Defaults overridden by `SLATE_POPULATE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`. Unparseable
    /// values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ERRORS_VAR) {
            match raw.trim() {
                "best_effort" => config.errors = ErrorPolicy::BestEffort,
                "fail_fast" => config.errors = ErrorPolicy::FailFast,
                other => warn!(var = Self::ERRORS_VAR, value = other, "ignoring unknown error policy"),
            }
        }

        if let Some(raw) = lookup(Self::STABLE_ORDER_VAR) {
            match raw.trim().parse::<bool>() {
                Ok(v) => config.stable_order = v,
                Err(_) => warn!(var = Self::STABLE_ORDER_VAR, value = %raw, "ignoring non-boolean value"),
            }
        }

        if let Some(raw) = lookup(Self::FETCH_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.fetch_timeout_ms = Some(ms),
                Err(_) => warn!(var = Self::FETCH_TIMEOUT_VAR, value = %raw, "ignoring non-numeric timeout"),
            }
        }

        config
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}
