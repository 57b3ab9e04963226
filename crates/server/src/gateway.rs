//! Outbound HTTP calls to named downstream targets.
//!
//! Every call goes through the target's circuit breaker and a per-call
//! timeout. Whatever goes wrong on the wire reaches callers as
//! `ApplicationError::ExternalCallFailed` naming only the target; the detail
//! is logged here and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use clientele_core::config::AppConfig;
use clientele_core::errors::ApplicationError;
use clientele_core::resilience::{BreakerRegistry, CircuitSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboundMethod {
    Get,
    Post,
}

/// Number of items a response body is expected to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
    /// A JSON object, `null` or an empty body.
    Single,
    /// A JSON array, `null` or an empty body.
    Many,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
    target: String,
    method: OutboundMethod,
    url: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    shape: ResponseShape,
}

impl OutboundRequest {
    pub fn get(target: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: OutboundMethod::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
            shape: ResponseShape::Many,
        }
    }

    pub fn post<B: Serialize>(
        target: impl Into<String>,
        url: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApplicationError> {
        let body = serde_json::to_value(body)
            .map_err(|err| ApplicationError::MalformedInput(format!("request body: {err}")))?;

        Ok(Self {
            target: target.into(),
            method: OutboundMethod::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
            shape: ResponseShape::Single,
        })
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn expect(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> OutboundMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Joins a configured base URL and a fixed resource path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[derive(Debug, Error)]
enum CallFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("undecodable response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

pub struct OutboundGateway {
    client: reqwest::Client,
    breakers: Arc<BreakerRegistry>,
    call_timeout: Duration,
}

impl OutboundGateway {
    pub fn new(
        breakers: Arc<BreakerRegistry>,
        call_timeout: Duration,
    ) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ApplicationError::Configuration(format!("http client: {err}")))?;

        Ok(Self { client, breakers, call_timeout })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let breakers = Arc::new(BreakerRegistry::new(config.circuit_breaker.policy()));
        Self::new(breakers, config.downstream.call_timeout())
    }

    pub fn breakers(&self) -> Arc<BreakerRegistry> {
        Arc::clone(&self.breakers)
    }

    pub fn circuit_snapshots(&self) -> Vec<CircuitSnapshot> {
        self.breakers.snapshots()
    }

    /// Performs one call against `request.target`. No retries.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
    ) -> Result<Vec<T>, ApplicationError> {
        let breaker = self.breakers.for_target(&request.target);
        let pending = &request;
        let admitted = breaker
            .call(move || async move {
                match tokio::time::timeout(self.call_timeout, self.execute(pending)).await {
                    Ok(result) => result,
                    Err(_) => Err(CallFailure::Timeout(self.call_timeout)),
                }
            })
            .await;

        match admitted {
            Ok(Ok(items)) => {
                info!(
                    event_name = "gateway.call.succeeded",
                    target = %request.target,
                    url = %request.url,
                    items = items.len(),
                    "Request to {} succeeded",
                    request.target
                );
                Ok(items)
            }
            Ok(Err(failure)) => {
                error!(
                    event_name = "gateway.call.failed",
                    target = %request.target,
                    url = %request.url,
                    error = %failure,
                    "Request to {} failed",
                    request.target
                );
                Err(ApplicationError::external_call_failed(&request.target))
            }
            Err(rejected) => {
                warn!(
                    event_name = "gateway.call.short_circuited",
                    target = %request.target,
                    url = %request.url,
                    state = ?rejected.state,
                    "Request to {} short-circuited",
                    request.target
                );
                Err(ApplicationError::external_call_failed(&request.target))
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: &OutboundRequest,
    ) -> Result<Vec<T>, CallFailure> {
        let mut builder = match request.method {
            OutboundMethod::Get => self.client.get(&request.url),
            OutboundMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CallFailure::Status(status));
        }

        let body = response.bytes().await?;
        decode_items(&body, request.shape)
    }
}

fn decode_items<T: DeserializeOwned>(
    body: &[u8],
    shape: ResponseShape,
) -> Result<Vec<T>, CallFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let items = match shape {
        ResponseShape::Single => serde_json::from_slice::<Option<T>>(body)?.into_iter().collect(),
        ResponseShape::Many => serde_json::from_slice::<Option<Vec<T>>>(body)?.unwrap_or_default(),
    };
    Ok(items)
}
