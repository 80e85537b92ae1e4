use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::Credentials;
use crate::session::DeviceSession;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("pin must be exactly four digits")]
    InvalidPin,
    #[error("host must not be empty")]
    InvalidHost,
    #[error("cannot connect to {host}: {reason}")]
    CannotConnect { host: String, reason: String },
    #[error("{0} is already configured")]
    AlreadyConfigured(String),
}

/// Validated user input, ready to become a config entry.
#[derive(Debug, Clone)]
pub struct EntryData {
    pub title: String,
    pub host: String,
    pub pin: SecretString,
}

impl EntryData {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            host: self.host.clone(),
            pin: self.pin.clone(),
        }
    }
}

pub fn validate_pin(pin: &str) -> Result<(), SetupError> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(SetupError::InvalidPin)
    }
}

/// Trims the host and prefixes `http://` when no scheme is given.
pub fn normalize_host(host: &str) -> Result<String, SetupError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(SetupError::InvalidHost);
    }

    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(host.to_string())
    } else {
        Ok(format!("http://{host}"))
    }
}

pub fn validate_input(host: &str, pin: &str) -> Result<EntryData, SetupError> {
    validate_pin(pin)?;
    let host = normalize_host(host)?;
    Ok(EntryData {
        title: format!("SQC ({host})"),
        host,
        pin: SecretString::from(pin.to_string()),
    })
}

/// Checks that something answers HTTP at the entry's host.
///
/// Any status counts as reachable; only transport failures are rejected.
pub async fn probe<S: DeviceSession>(
    session: &mut S,
    data: &EntryData,
    limit: Duration,
) -> Result<(), SetupError> {
    let reason = match timeout(limit, session.probe()).await {
        Ok(Ok(page)) => {
            info!(host = %data.host, status = page.status, "controller reachable");
            return Ok(());
        }
        Ok(Err(err)) => err.to_string(),
        Err(_) => format!("no answer within {limit:?}"),
    };

    error!(host = %data.host, %reason, "error connecting to controller");
    Err(SetupError::CannotConnect {
        host: data.host.clone(),
        reason,
    })
}

#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub data: EntryData,
}

/// In-memory registry of configured controllers, unique by host.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: BTreeMap<String, ConfigEntry>,
    next_id: u64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, data: EntryData) -> Result<&ConfigEntry, SetupError> {
        if self.find_by_host(&data.host).is_some() {
            return Err(SetupError::AlreadyConfigured(data.host));
        }

        self.next_id += 1;
        let entry_id = format!("sqc-{}", self.next_id);
        info!(%entry_id, host = %data.host, "config entry created");
        let entry = ConfigEntry {
            entry_id: entry_id.clone(),
            data,
        };
        Ok(self.entries.entry(entry_id).or_insert(entry))
    }

    pub fn get(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.entries.get(entry_id)
    }

    pub fn find_by_host(&self, host: &str) -> Option<&ConfigEntry> {
        self.entries.values().find(|entry| entry.data.host == host)
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.remove(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
