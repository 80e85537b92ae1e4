use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, Credentials, StatusPolicy};
use crate::session::{DeviceSession, SessionError};
use crate::snapshot::{BridgeState, RefreshStats, Snapshot};

/// Present on every page served to an authenticated session.
pub const LOGGED_IN_MARKER: &str = "<!DOCTYPE html>";

/// Present in the reply to a POST with an accepted PIN.
pub const LOGIN_OK_MARKER: &str = "PIN prawidłowy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Fetching,
    ReAuthenticating,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("error communicating with controller: {0}")]
    Network(String),
    #[error("controller did not answer within {0:?}")]
    Timeout(Duration),
    #[error("controller returned HTTP {0}")]
    BadStatus(u16),
    #[error("still logged out after {attempts} fetch attempts")]
    RetriesExhausted { attempts: u32 },
}

impl RefreshError {
    /// Fetch-side failures, as opposed to a rejected login.
    pub fn is_update_failure(&self) -> bool {
        !matches!(self, RefreshError::LoginFailed(_))
    }
}

pub struct RefreshEngine<S: DeviceSession> {
    session: S,
    credentials: Credentials,
    config: BridgeConfig,
    phase: Phase,
    snapshot: Arc<Snapshot>,
    last_update_success: bool,
    last_error: Option<String>,
    stats: RefreshStats,
    publisher: watch::Sender<BridgeState>,
}

impl<S: DeviceSession> RefreshEngine<S> {
    pub fn new(session: S, credentials: Credentials, config: BridgeConfig) -> Self {
        let (publisher, _) = watch::channel(BridgeState::initial());
        Self {
            session,
            credentials,
            config,
            phase: Phase::Idle,
            snapshot: Arc::new(Snapshot::pending()),
            last_update_success: false,
            last_error: None,
            stats: RefreshStats::default(),
            publisher,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    pub fn state(&self) -> BridgeState {
        BridgeState {
            snapshot: self.snapshot(),
            last_update_success: self.last_update_success,
            last_error: self.last_error.clone(),
            stats: self.stats.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.publisher.subscribe()
    }

    /// Runs one refresh cycle.
    ///
    /// On success the new snapshot replaces the current one. On failure the
    /// current snapshot is left untouched. Either way the resulting state is
    /// published to subscribers.
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>, RefreshError> {
        let result = self.run_cycle().await;
        self.enter(Phase::Idle);

        let outcome = match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot = Arc::clone(&snapshot);
                self.last_update_success = true;
                self.last_error = None;
                self.stats.cycles_ok += 1;
                info!(online = snapshot.online, "refresh complete");
                Ok(snapshot)
            }
            Err(err) => {
                self.last_update_success = false;
                self.last_error = Some(err.to_string());
                self.stats.cycles_err += 1;
                error!(host = %self.credentials.host, %err, "refresh failed");
                Err(err)
            }
        };

        self.publisher.send_replace(self.state());
        outcome
    }

    async fn run_cycle(&mut self) -> Result<Snapshot, RefreshError> {
        let max_attempts = self.config.max_fetch_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.enter(Phase::Fetching);
            let page = bounded(self.config.request_timeout, self.session.fetch_status()).await?;

            if !page.is_ok() {
                return self.non_success(page.status);
            }

            if page.body.contains(LOGGED_IN_MARKER) {
                debug!(attempt, bytes = page.body.len(), "status page received");
                return Ok(Snapshot::online(page.body));
            }

            if attempt == max_attempts {
                break;
            }

            warn!(attempt, "not logged in, trying to login");
            self.authenticate().await?;
            sleep(self.config.login_settle).await;
        }

        Err(RefreshError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    async fn authenticate(&mut self) -> Result<(), RefreshError> {
        self.enter(Phase::ReAuthenticating);
        self.session
            .reset()
            .map_err(|err| RefreshError::Network(err.to_string()))?;
        self.stats.logins += 1;

        let page = bounded(
            self.config.request_timeout,
            self.session.login(&self.credentials.pin),
        )
        .await?;

        if !page.is_ok() {
            return Err(RefreshError::LoginFailed(format!("HTTP {}", page.status)));
        }
        if !page.body.contains(LOGIN_OK_MARKER) {
            return Err(RefreshError::LoginFailed("pin rejected".to_string()));
        }

        info!("login successful");
        Ok(())
    }

    fn non_success(&self, status: u16) -> Result<Snapshot, RefreshError> {
        match self.config.status_policy {
            StatusPolicy::SoftOffline => {
                warn!(status, "controller returned non-success status, marking offline");
                Ok(Snapshot::offline(format!("HTTP {status}")))
            }
            StatusPolicy::Fail => Err(RefreshError::BadStatus(status)),
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "engine phase");
            self.phase = phase;
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, RefreshError> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(SessionError::Timeout)) | Err(_) => Err(RefreshError::Timeout(limit)),
        Ok(Err(err)) => Err(RefreshError::Network(err.to_string())),
    }
}
