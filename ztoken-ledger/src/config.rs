//! Ledger configuration.

use std::{env, path::PathBuf};

/// Environment variable overriding [`LedgerConfig::max_actions_per_reduce`].
pub const MAX_ACTIONS_PER_REDUCE_ENV: &str = "ZTOKEN_MAX_ACTIONS_PER_REDUCE";
/// Environment variable overriding [`LedgerConfig::max_pending_actions`].
pub const MAX_PENDING_ACTIONS_ENV: &str = "ZTOKEN_MAX_PENDING_ACTIONS";
/// Environment variable selecting the sled state database.
pub const STATE_DB_ENV: &str = "ZTOKEN_STATE_DB";

pub const DEFAULT_MAX_ACTIONS_PER_REDUCE: usize = 10;
pub const DEFAULT_MAX_PENDING_ACTIONS: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on actions settled by one reduction; the rest stay pending.
    pub max_actions_per_reduce: usize,
    /// Action log capacity.
    pub max_pending_actions: usize,
    /// Sled database for the committed state. In-memory when unset.
    pub state_db_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_actions_per_reduce: DEFAULT_MAX_ACTIONS_PER_REDUCE,
            max_pending_actions: DEFAULT_MAX_PENDING_ACTIONS,
            state_db_path: None,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment, falling back to defaults.
    pub fn from_env() -> Self {
        let max_actions_per_reduce = env::var(MAX_ACTIONS_PER_REDUCE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_ACTIONS_PER_REDUCE);

        let max_pending_actions = env::var(MAX_PENDING_ACTIONS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_PENDING_ACTIONS);

        let state_db_path = env::var(STATE_DB_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            max_actions_per_reduce,
            max_pending_actions,
            state_db_path,
        }
    }

    /// A limit of zero is raised to one so a non-empty log can always drain.
    pub fn with_max_actions_per_reduce(mut self, limit: usize) -> Self {
        self.max_actions_per_reduce = limit.max(1);
        self
    }

    pub fn with_max_pending_actions(mut self, capacity: usize) -> Self {
        self.max_pending_actions = capacity;
        self
    }

    pub fn with_state_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_db_path = Some(path.into());
        self
    }
}
