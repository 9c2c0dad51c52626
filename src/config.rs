use std::fmt;
use std::time::Duration;

const DEFAULT_TOKEN_URL: &str =
    "https://sbx.kra.go.ke/v1/token/generate?grant_type=client_credentials";
const DEFAULT_LOOKUP_URL: &str = "https://sbx.kra.go.ke/checker/v1/pin";

/// Consumer key/secret pair exchanged for a bearer token.
///
/// Either value may be empty: missing credentials are not fatal at startup,
/// they fail the first lookup instead.
#[derive(Clone, Default)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// True when both the key and the secret are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub credentials: Credentials,
    pub token_url: String,
    pub lookup_url: String,
    /// Upper bound for the credential exchange call.
    pub token_timeout: Duration,
    /// Hard deadline for the PIN lookup call, body included.
    pub lookup_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3007".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            credentials: Credentials::new(
                std::env::var("KRA_CONSUMER_KEY").unwrap_or_default(),
                std::env::var("KRA_CONSUMER_SECRET").unwrap_or_default(),
            ),
            token_url: endpoint_var("KRA_TOKEN_URL", DEFAULT_TOKEN_URL)?,
            lookup_url: endpoint_var("KRA_PIN_CHECKER_URL", DEFAULT_LOOKUP_URL)?,
            token_timeout: seconds_var("TOKEN_TIMEOUT_SECS", 10)?,
            lookup_timeout: seconds_var("LOOKUP_TIMEOUT_SECS", 15)?,
        };

        if !config.credentials.is_complete() {
            tracing::warn!(
                "KRA_CONSUMER_KEY/KRA_CONSUMER_SECRET not set; every lookup will fail authentication"
            );
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Token URL: {}", config.token_url);
        tracing::debug!("PIN checker URL: {}", config.lookup_url);
        tracing::debug!(
            "Timeouts: token {:?}, lookup {:?}",
            config.token_timeout,
            config.lookup_timeout
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn endpoint_var(name: &str, default: &str) -> anyhow::Result<String> {
    let raw = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    validate_endpoint(name, &raw)?;
    Ok(raw)
}

fn validate_endpoint(name: &str, raw: &str) -> anyhow::Result<()> {
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    url::Url::parse(raw).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(())
}

fn seconds_var(name: &str, default: u64) -> anyhow::Result<Duration> {
    let secs = match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", name))?,
        Err(_) => default,
    };
    if secs == 0 {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_values() {
        assert!(Credentials::new("key", "secret").is_complete());
        assert!(!Credentials::new("", "secret").is_complete());
        assert!(!Credentials::new("key", "").is_complete());
        assert!(!Credentials::default().is_complete());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("key", "hunter2"));
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(validate_endpoint("X", "https://sbx.kra.go.ke/checker/v1/pin").is_ok());
        assert!(validate_endpoint("X", "http://127.0.0.1:9000/token?grant_type=x").is_ok());
        assert!(validate_endpoint("X", "ftp://example.com").is_err());
        assert!(validate_endpoint("X", "sbx.kra.go.ke").is_err());
    }
}
