//! HTTP delivery of finalized sessions.
//!
//! Sessions are POSTed as JSON to the configured endpoint. Submission is
//! fire-and-forget: [`HttpDelivery::submit`](et_core::Delivery::submit)
//! validates the endpoint, spawns the request on the tokio runtime and
//! returns. Response bodies are never read and any HTTP status counts as
//! delivered; only transport failures are errors, and those are logged, not
//! retried.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use et_core::{Delivery, DeliveryError, Session};
use reqwest::Url;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// Default request timeout for deliveries.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP delivery errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// No tokio runtime to spawn deliveries on.
    #[error("HTTP delivery requires a tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
    /// The endpoint is not an http(s) URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl From<HttpError> for DeliveryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::InvalidEndpoint { endpoint, reason } => {
                Self::InvalidEndpoint { endpoint, reason }
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Parses and checks a delivery endpoint.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, HttpError> {
    let url = Url::parse(endpoint).map_err(|err| HttpError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(HttpError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme {scheme}"),
        }),
    }
}

/// Delivers sessions with one-shot JSON POSTs.
///
/// In-flight submissions are tracked so a shutting-down process can
/// [`drain`](Self::drain) them instead of dropping them mid-request.
pub struct HttpDelivery {
    http: reqwest::Client,
    runtime: Handle,
    in_flight: Mutex<JoinSet<()>>,
}

impl fmt::Debug for HttpDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDelivery")
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl HttpDelivery {
    /// Creates a delivery bound to the current tokio runtime.
    pub fn new() -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(HttpError::ClientBuild)?;
        Self::with_client(http)
    }

    /// Creates a delivery using a preconfigured HTTP client.
    pub fn with_client(http: reqwest::Client) -> Result<Self, HttpError> {
        let runtime = Handle::try_current().map_err(HttpError::NoRuntime)?;
        Ok(Self {
            http,
            runtime,
            in_flight: Mutex::new(JoinSet::new()),
        })
    }

    /// POSTs a session and waits for the response status.
    pub async fn post(&self, session: &Session, endpoint: &str) -> Result<(), HttpError> {
        let url = parse_endpoint(endpoint)?;
        send(&self.http, url, session).await
    }

    /// Number of submissions not yet completed.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for every in-flight submission to finish.
    pub async fn drain(&self) {
        let mut pending = std::mem::take(
            &mut *self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "draining in-flight deliveries");
        }
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "delivery task panicked or was cancelled");
            }
        }
    }
}

async fn send(http: &reqwest::Client, url: Url, session: &Session) -> Result<(), HttpError> {
    let response = http.post(url).json(session).send().await?;
    let status = response.status();
    if status.is_success() {
        tracing::debug!(%status, contact = %session.contact, "session delivered");
    } else {
        tracing::warn!(%status, contact = %session.contact, "endpoint answered with non-success status");
    }
    Ok(())
}

impl Delivery for HttpDelivery {
    fn submit(&self, session: &Session, endpoint: &str) -> Result<(), DeliveryError> {
        let url = parse_endpoint(endpoint)?;
        let http = self.http.clone();
        let session = session.clone();
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Reap finished submissions so the set does not grow unbounded.
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn_on(
            async move {
                if let Err(err) = send(&http, url, &session).await {
                    tracing::error!(contact = %session.contact, error = %err, "failed to deliver session");
                }
            },
            &self.runtime,
        );
        Ok(())
    }
}
