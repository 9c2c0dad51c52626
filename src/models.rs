use crate::errors::FailureKind;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Uninterpreted downstream payload.
pub type RawLookupResponse = Map<String, Value>;

// ============ Inbound ============

/// PIN lookup request, as posted by the front-end and forwarded downstream.
///
/// Both fields are optional at the serde level so that a missing field is
/// reported as a validation failure instead of a JSON rejection. Numeric
/// values are accepted and kept in their decimal text form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    #[serde(rename = "TaxpayerID", default, deserialize_with = "string_or_number")]
    pub taxpayer_id: Option<String>,
    #[serde(rename = "TaxpayerType", default, deserialize_with = "string_or_number")]
    pub taxpayer_type: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

impl LookupRequest {
    pub fn new(taxpayer_id: impl Into<String>, taxpayer_type: impl Into<String>) -> Self {
        Self {
            taxpayer_id: Some(taxpayer_id.into()),
            taxpayer_type: Some(taxpayer_type.into()),
        }
    }

    /// Identifier as supplied, or empty.
    pub fn id(&self) -> &str {
        self.taxpayer_id.as_deref().unwrap_or_default()
    }

    /// True when both fields are present and non-empty. ID format is left to the checker.
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.taxpayer_id) && filled(&self.taxpayer_type)
    }
}

// ============ Token ============

/// Opaque bearer token, valid for a single lookup.
#[derive(Clone, PartialEq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

// ============ Outcome ============

/// Normalized taxpayer record returned on a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxpayerRecord {
    pub pin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxpayer_name: Option<String>,
    pub pin_status: String,
    pub itax_status: String,
    /// Remaining downstream fields, passed through untouched.
    #[serde(flatten)]
    pub extra: RawLookupResponse,
}

/// The single terminal outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalResult {
    Found {
        record: TaxpayerRecord,
        taxpayer_id: String,
    },
    NotFound {
        taxpayer_id: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
        taxpayer_id: String,
        /// The checker's own `error` string, when it sent one.
        upstream_error: Option<String>,
    },
}

impl CanonicalResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>, taxpayer_id: &str) -> Self {
        CanonicalResult::Failure {
            kind,
            message: message.into(),
            taxpayer_id: taxpayer_id.to_string(),
            upstream_error: None,
        }
    }

    /// Attaches the checker's `error` string to a failure. No-op for other outcomes.
    pub fn with_upstream_error(mut self, error: Option<String>) -> Self {
        if let CanonicalResult::Failure { upstream_error, .. } = &mut self {
            *upstream_error = error;
        }
        self
    }

    pub fn taxpayer_id(&self) -> &str {
        match self {
            CanonicalResult::Found { taxpayer_id, .. }
            | CanonicalResult::NotFound { taxpayer_id }
            | CanonicalResult::Failure { taxpayer_id, .. } => taxpayer_id,
        }
    }

    /// Failure kind, if this is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CanonicalResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
