use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// What a non-200 status page does to a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusPolicy {
    /// Record an offline snapshot and treat the cycle as successful.
    #[default]
    SoftOffline,
    /// Fail the cycle and keep the previous snapshot.
    Fail,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub update_interval: Duration,
    pub request_timeout: Duration,
    pub login_settle: Duration,
    pub max_fetch_attempts: u32,
    pub status_policy: StatusPolicy,
    pub backoff_max: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            login_settle: Duration::from_secs(5),
            max_fetch_attempts: 5,
            status_policy: StatusPolicy::SoftOffline,
            backoff_max: Duration::from_secs(300),
        }
    }
}

/// Host and PIN of one controller, fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub pin: SecretString,
}

impl Credentials {
    pub fn new(host: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            pin: SecretString::from(pin.into()),
        }
    }
}
