use std::fmt;

/// Reasons a bearer token could not be obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Consumer key or secret is missing or empty.
    MissingCredentials,
    /// Token endpoint answered with a non-success status.
    Rejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Raw response body, kept for diagnostics only.
        body: String,
    },
    /// Success response without a usable `access_token`.
    Malformed(String),
    /// Token endpoint unreachable or too slow.
    Transport(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredentials => {
                write!(f, "Missing KRA API credentials in environment variables")
            }
            // The body stays out of the message; it is logged where it is captured.
            AuthError::Rejected { status, .. } => {
                write!(f, "Token endpoint rejected credentials with status {}", status)
            }
            AuthError::Malformed(msg) => write!(f, "Malformed token response: {}", msg),
            AuthError::Transport(msg) => write!(f, "Token endpoint unreachable: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

/// Classification carried by a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Caller omitted `TaxpayerID` or `TaxpayerType`.
    Validation,
    /// Token acquisition failed for any reason.
    AuthenticationFailed,
    /// Lookup call exceeded its deadline.
    Timeout,
    /// Lookup call failed below HTTP (connect, DNS, reset).
    TransportError,
    /// Lookup endpoint answered 404.
    NotFoundUpstream,
    /// Lookup endpoint answered any other non-2xx status.
    UpstreamError,
}

impl FailureKind {
    /// Caller-facing `error` label.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Validation => "Missing required fields",
            FailureKind::AuthenticationFailed => "Authentication failed",
            FailureKind::Timeout => "Request timeout",
            FailureKind::TransportError => "Transport Error",
            FailureKind::NotFoundUpstream => "Not Found",
            FailureKind::UpstreamError => "API Error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_omits_body() {
        let err = AuthError::Rejected {
            status: 401,
            body: "{\"fault\":\"invalid client secret abc123\"}".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(!msg.contains("abc123"));
    }

    #[test]
    fn test_failure_labels() {
        assert_eq!(FailureKind::NotFoundUpstream.label(), "Not Found");
        assert_eq!(FailureKind::UpstreamError.to_string(), "API Error");
        assert_eq!(FailureKind::Timeout.label(), "Request timeout");
    }
}
