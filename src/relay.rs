use crate::config::Config;
use crate::errors::FailureKind;
use crate::models::{AccessToken, CanonicalResult, LookupRequest};
use crate::reduction;
use crate::token_provider::TokenProvider;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const VALIDATION_MESSAGE: &str =
    "Missing required fields: TaxpayerID and TaxpayerType are required";
pub const TIMEOUT_MESSAGE: &str = "downstream did not respond in time";

/// Relays PIN lookups to the checker API and normalizes the answer.
///
/// Stateless apart from the shared HTTP client; safe to clone across tasks.
#[derive(Clone)]
pub struct LookupRelay {
    client: Client,
    tokens: TokenProvider,
    lookup_url: String,
    deadline: Duration,
}

/// Raw outcome of the lookup call, before reduction.
enum Downstream {
    Responded { status: StatusCode, body: String },
    TimedOut,
    Failed(reqwest::Error),
}

impl LookupRelay {
    pub fn new(
        client: Client,
        tokens: TokenProvider,
        lookup_url: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            tokens,
            lookup_url: lookup_url.into(),
            deadline,
        }
    }

    /// Builds the relay and its token provider from configuration, sharing one HTTP client.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let tokens = TokenProvider::new(
            client.clone(),
            config.token_url.clone(),
            config.credentials.clone(),
            config.token_timeout,
        );
        Ok(Self::new(
            client,
            tokens,
            config.lookup_url.clone(),
            config.lookup_timeout,
        ))
    }

    /// Handles one lookup end to end. Always produces exactly one outcome.
    pub async fn handle(&self, request: &LookupRequest) -> CanonicalResult {
        let taxpayer_id = request.id();

        if !request.is_complete() {
            tracing::info!("Rejecting lookup with missing fields: {:?}", request);
            return CanonicalResult::failure(
                FailureKind::Validation,
                VALIDATION_MESSAGE,
                taxpayer_id,
            );
        }

        tracing::info!(
            "Checking PIN for ID: {}, Type: {}",
            taxpayer_id,
            request.taxpayer_type.as_deref().unwrap_or_default()
        );

        let token = match self.tokens.acquire().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Token acquisition failed: {}", e);
                return CanonicalResult::failure(
                    FailureKind::AuthenticationFailed,
                    e.to_string(),
                    taxpayer_id,
                );
            }
        };

        let result = match self.call(&token, request).await {
            Downstream::Responded { status, body } => {
                tracing::debug!("PIN checker raw response ({}): {}", status, body);
                reduction::reduce(status, &body, request)
            }
            Downstream::TimedOut => {
                tracing::warn!(
                    "PIN checker did not respond within {:?} for ID {}",
                    self.deadline,
                    taxpayer_id
                );
                CanonicalResult::failure(FailureKind::Timeout, TIMEOUT_MESSAGE, taxpayer_id)
            }
            Downstream::Failed(e) => {
                tracing::error!("PIN checker request failed: {}", e);
                CanonicalResult::failure(
                    FailureKind::TransportError,
                    format!("PIN checker request failed: {}", e),
                    taxpayer_id,
                )
            }
        };

        match &result {
            CanonicalResult::Found { .. } => tracing::info!("PIN found for ID {}", taxpayer_id),
            CanonicalResult::NotFound { .. } => {
                tracing::info!("ID {} not found (response data)", taxpayer_id)
            }
            CanonicalResult::Failure { kind, message, .. } => {
                tracing::warn!("Lookup for ID {} failed: {} - {}", taxpayer_id, kind, message)
            }
        }

        result
    }

    /// Sends the lookup and reads its body under one deadline.
    ///
    /// On expiry the in-flight future is dropped, which aborts the request and
    /// releases its connection; nothing it would have produced is observed.
    async fn call(&self, token: &AccessToken, request: &LookupRequest) -> Downstream {
        let exchange = async {
            let response = self
                .client
                .post(&self.lookup_url)
                .bearer_auth(token.value())
                .json(request)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match tokio::time::timeout(self.deadline, exchange).await {
            Ok(Ok((status, body))) => Downstream::Responded { status, body },
            // A connect timeout is a transport fault, not the lookup deadline.
            Ok(Err(e)) if e.is_timeout() && !e.is_connect() => Downstream::TimedOut,
            Ok(Err(e)) => Downstream::Failed(e),
            Err(_) => Downstream::TimedOut,
        }
    }
}
