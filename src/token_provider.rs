use crate::config::Credentials;
use crate::errors::AuthError;
use crate::models::AccessToken;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Exchanges the consumer key/secret for a short-lived bearer token.
///
/// Holds no token state: every call to [`TokenProvider::acquire`] performs a
/// fresh client-credentials exchange.
#[derive(Clone)]
pub struct TokenProvider {
    client: Client,
    token_url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl TokenProvider {
    /// Creates a new `TokenProvider`.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client.
    /// * `token_url` - Full token endpoint URL, grant type included.
    /// * `credentials` - Consumer key and secret.
    /// * `timeout` - Upper bound for the exchange call.
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            credentials,
            timeout,
        }
    }

    /// Performs one credential exchange.
    ///
    /// # Returns
    ///
    /// * `Result<AccessToken, AuthError>` - The bearer token, or why it could not be obtained.
    pub async fn acquire(&self) -> Result<AccessToken, AuthError> {
        if !self.credentials.is_complete() {
            return Err(AuthError::MissingCredentials);
        }

        tracing::debug!("Requesting access token from {}", self.token_url);

        let response = self
            .client
            .get(&self.token_url)
            .basic_auth(
                &self.credentials.consumer_key,
                Some(&self.credentials.consumer_secret),
            )
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Token endpoint returned {}: {}", status, body);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        extract_token(&body)
    }
}

fn extract_token(body: &str) -> Result<AccessToken, AuthError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| AuthError::Malformed(format!("response is not JSON: {}", e)))?;

    data.get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(AccessToken::new)
        .ok_or_else(|| AuthError::Malformed("No access_token returned".to_string()))
}
