use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent fetch that produced a page or a status.
///
/// Snapshots are never edited in place; the engine swaps in a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub raw_body: String,
    pub online: bool,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Snapshot {
    /// Placeholder held by an engine that has not completed a refresh yet.
    pub fn pending() -> Self {
        Self {
            raw_body: String::new(),
            online: false,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    pub fn online(body: String) -> Self {
        Self {
            raw_body: body,
            online: true,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            raw_body: String::new(),
            online: false,
            fetched_at: Utc::now(),
            error: Some(reason.into()),
        }
    }

    /// The page body, only when it may be used for extraction.
    pub fn body(&self) -> Option<&str> {
        if self.online && !self.raw_body.is_empty() {
            Some(&self.raw_body)
        } else {
            None
        }
    }
}

/// Counters kept by the engine across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub cycles_ok: u64,
    pub cycles_err: u64,
    pub logins: u64,
}

/// Everything readers need after a cycle: the snapshot plus whether the
/// cycle that last ran succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeState {
    pub snapshot: Arc<Snapshot>,
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub stats: RefreshStats,
}

impl BridgeState {
    pub fn initial() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::pending()),
            last_update_success: false,
            last_error: None,
            stats: RefreshStats::default(),
        }
    }

    pub fn available(&self) -> bool {
        self.last_update_success && self.snapshot.online
    }
}
