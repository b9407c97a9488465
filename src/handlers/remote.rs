// src/handlers/remote.rs

//! HTTP seam for handlers that talk to remote services.
//!
//! Handlers only see the [`RemoteClient`] trait. Production uses
//! [`HttpRemote`] (reqwest); tests use the fake from `pollwatch-test-utils`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::dispatch::HandlerError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection, timeout or TLS failure.
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RemoteError {
    /// Whether trying again later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network { .. } | RemoteError::Decode { .. } => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

impl From<RemoteError> for HandlerError {
    fn from(err: RemoteError) -> Self {
        if err.is_transient() {
            HandlerError::Transient(err.to_string())
        } else {
            HandlerError::Fatal(err.to_string())
        }
    }
}

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

pub trait RemoteClient: Send + Sync + fmt::Debug {
    /// GET `url` and parse the body as JSON.
    fn get_json<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Value>;

    /// GET `url` and return the raw body.
    fn get_bytes<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Vec<u8>>;

    /// POST `body` as JSON to `url`, discarding the response body.
    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> RemoteFuture<'a, ()>;
}

/// reqwest-backed [`RemoteClient`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("pollwatch/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, RemoteError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(url, e))?;
        check_status(url, response)
    }
}

impl Default for HttpRemote {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

fn network(url: &str, err: reqwest::Error) -> RemoteError {
    RemoteError::Network {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

impl RemoteClient for HttpRemote {
    fn get_json<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Value> {
        Box::pin(async move {
            let response = self.get(url).await?;
            response.json::<Value>().await.map_err(|e| RemoteError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }

    fn get_bytes<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let response = self.get(url).await?;
            let bytes = response.bytes().await.map_err(|e| network(url, e))?;
            Ok(bytes.to_vec())
        })
    }

    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            debug!(url, "POST");
            let response = self
                .client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| network(url, e))?;
            check_status(url, response)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RemoteError {
        RemoteError::Status {
            url: "https://x.invalid/".into(),
            status: code,
        }
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
    }

    #[test]
    fn converts_into_handler_errors() {
        assert!(HandlerError::from(status(502)).is_transient());
        assert!(!HandlerError::from(status(403)).is_transient());

        let net = RemoteError::Network {
            url: "https://x.invalid/".into(),
            message: "connection refused".into(),
        };
        assert!(HandlerError::from(net).is_transient());
    }
}
