//! Accrual service client
//!
//! One `GET {base}/api/orders/{number}` per call. The response is classified
//! into a [`FetchOutcome`]; retry and backoff policy belong to the caller.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::AccrualStatus;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// Connect, timeout or body-read failure
    #[error("accrual request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid accrual service address {0:?}")]
    InvalidBaseUrl(String),
}

/// Decision reported by the accrual service for one order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualDecision {
    /// Order number as echoed by the service
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 200 with a well-formed body
    Resolved(AccrualDecision),
    /// 429; `retry_after` is `None` when the header is missing or unparsable
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    /// 500
    ServerError,
    /// Any other status, or a 200 whose body makes no sense
    Unexpected { status: u16, body: String },
}

/// Source of accrual decisions, abstracted for the reconciliation worker
#[async_trait]
pub trait AccrualSource: Send + Sync {
    async fn fetch(&self, number: &str) -> Result<FetchOutcome, AccrualError>;
}

#[derive(Clone)]
pub struct AccrualClient {
    client: Client,
    base_url: String,
}

impl AccrualClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccrualError> {
        let parsed =
            Url::parse(base_url).map_err(|_| AccrualError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AccrualError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualSource for AccrualClient {
    async fn fetch(&self, number: &str) -> Result<FetchOutcome, AccrualError> {
        let response = self.client.get(self.order_url(number)).send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.text().await?;
                Ok(classify_decision(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let message = response.text().await.unwrap_or_default();
                Ok(FetchOutcome::RateLimited {
                    retry_after,
                    message,
                })
            }
            StatusCode::INTERNAL_SERVER_ERROR => Ok(FetchOutcome::ServerError),
            other => {
                let body = response.text().await.unwrap_or_default();
                Ok(FetchOutcome::Unexpected {
                    status: other.as_u16(),
                    body,
                })
            }
        }
    }
}

fn classify_decision(body: String) -> FetchOutcome {
    match serde_json::from_str::<AccrualDecision>(&body) {
        Ok(decision) if decision.accrual.is_some_and(|a| a.is_sign_negative()) => {
            FetchOutcome::Unexpected { status: 200, body }
        }
        Ok(decision) => FetchOutcome::Resolved(decision),
        Err(_) => FetchOutcome::Unexpected { status: 200, body },
    }
}

/// `Retry-After` in integer seconds
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
