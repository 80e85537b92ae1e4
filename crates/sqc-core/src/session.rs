use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

/// Status code and body of one controller response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timeout")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to build http client: {0}")]
    Build(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SessionError::Timeout
        } else if err.is_connect() {
            SessionError::Connect(err.to_string())
        } else if err.is_builder() {
            SessionError::Build(err.to_string())
        } else {
            SessionError::Request(err.to_string())
        }
    }
}

/// Authenticated connection to one controller.
///
/// Implementations keep their cookies between calls. `reset` throws the
/// current session away so the next `login` starts clean.
#[async_trait]
pub trait DeviceSession: Send {
    async fn fetch_status(&mut self) -> Result<PageResponse, SessionError>;
    async fn login(&mut self, pin: &SecretString) -> Result<PageResponse, SessionError>;
    async fn probe(&mut self) -> Result<PageResponse, SessionError>;
    fn reset(&mut self) -> Result<(), SessionError>;
}

pub struct HttpSession {
    host: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpSession {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, SessionError> {
        let host = host.into().trim_end_matches('/').to_string();
        let http = Self::build_client(timeout)?;
        Ok(Self {
            host,
            timeout,
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_client(timeout: Duration) -> Result<reqwest::Client, SessionError> {
        reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|err| SessionError::Build(err.to_string()))
    }

    async fn read(res: reqwest::Response) -> Result<PageResponse, SessionError> {
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(PageResponse { status, body })
    }
}

#[async_trait]
impl DeviceSession for HttpSession {
    async fn fetch_status(&mut self) -> Result<PageResponse, SessionError> {
        let url = format!("{}/home", self.host);
        debug!(%url, "fetching status page");
        let res = self.http.get(&url).send().await?;
        Self::read(res).await
    }

    async fn login(&mut self, pin: &SecretString) -> Result<PageResponse, SessionError> {
        let url = format!("{}/", self.host);
        debug!(%url, "posting pin");
        let res = self
            .http
            .post(&url)
            .form(&[("pin", pin.expose_secret())])
            .send()
            .await?;
        Self::read(res).await
    }

    async fn probe(&mut self) -> Result<PageResponse, SessionError> {
        let url = format!("{}/", self.host);
        debug!(%url, "probing controller");
        let res = self.http.get(&url).send().await?;
        Self::read(res).await
    }

    fn reset(&mut self) -> Result<(), SessionError> {
        debug!(host = %self.host, "dropping session cookies");
        self.http = Self::build_client(self.timeout)?;
        Ok(())
    }
}
