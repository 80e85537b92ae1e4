use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Notify;

use crate::config::{BridgeConfig, Credentials, StatusPolicy};
use crate::session::{DeviceSession, PageResponse, SessionError};

pub const LOGGED_IN_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>SQC Akwarium</title></head>\
<body>Temperatura = 24.5ºC<br>pH = 6.82 [pH]<br>CO<sub>2</sub> = <b>18.4 ppm</b><br>\
Licznik CO2: 1234.5 godz.<br>Data restartu CO2: 2024-03-01 14:30<br>\
Alarm: <b>Brak</b><br>Sterowanie pH:  <b>ON</b></body></html>";

pub const LOGIN_PAGE: &str = "<html><form method=\"post\"><input name=\"pin\"></form></html>";

pub const LOGIN_OK: &str = "<html>PIN prawidłowy</html>";

pub const LOGIN_REJECTED: &str = "<html>PIN nieprawidłowy</html>";

pub enum Step {
    Page(u16, &'static str),
    Fail(SessionError),
    Hang,
}

/// Scripted session that records every call it receives.
#[derive(Default)]
pub struct FakeSession {
    fetches: VecDeque<Step>,
    logins: VecDeque<Step>,
    calls: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Notify>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(mut self, step: Step) -> Self {
        self.fetches.push_back(step);
        self
    }

    pub fn login(mut self, step: Step) -> Self {
        self.logins.push_back(step);
        self
    }

    /// Makes every fetch wait for a notification first.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn play(step: Option<Step>) -> Result<PageResponse, SessionError> {
        match step {
            Some(Step::Page(status, body)) => Ok(PageResponse::new(status, body)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(SessionError::Request("script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl DeviceSession for FakeSession {
    async fn fetch_status(&mut self) -> Result<PageResponse, SessionError> {
        self.record("fetch".to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Self::play(self.fetches.pop_front()).await
    }

    async fn login(&mut self, pin: &SecretString) -> Result<PageResponse, SessionError> {
        self.record(format!("login:{}", pin.expose_secret()));
        Self::play(self.logins.pop_front()).await
    }

    async fn probe(&mut self) -> Result<PageResponse, SessionError> {
        self.record("probe".to_string());
        Self::play(self.fetches.pop_front()).await
    }

    fn reset(&mut self) -> Result<(), SessionError> {
        self.record("reset".to_string());
        Ok(())
    }
}

pub fn test_config(policy: StatusPolicy) -> BridgeConfig {
    BridgeConfig {
        update_interval: Duration::from_secs(30),
        request_timeout: Duration::from_secs(10),
        login_settle: Duration::ZERO,
        max_fetch_attempts: 5,
        status_policy: policy,
        backoff_max: Duration::from_secs(300),
    }
}

pub fn test_credentials() -> Credentials {
    Credentials::new("http://sqc.local", "1234")
}

pub fn call_log(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    calls.lock().expect("calls lock").clone()
}
