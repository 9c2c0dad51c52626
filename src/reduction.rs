//! Reduces a raw PIN checker response into a [`CanonicalResult`].
//!
//! The checker API is inconsistent about field names and reports "no such
//! taxpayer" with a 200. Each output attribute is resolved through an ordered
//! [`FieldRule`]: the first truthy alias wins, otherwise its fallback applies.

use crate::errors::FailureKind;
use crate::models::{CanonicalResult, LookupRequest, RawLookupResponse, TaxpayerRecord};
use reqwest::StatusCode;
use serde_json::Value;

/// Response code the checker uses for a successful match.
pub const SUCCESS_RESPONSE_CODE: &str = "30000";

/// What to use when none of a rule's aliases are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Leave the attribute unset.
    Absent,
    /// Use a fixed value.
    Literal(&'static str),
    /// Echo the identifier the caller asked about.
    RequestedId,
}

/// Resolution order for one output attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub output: &'static str,
    pub aliases: &'static [&'static str],
    pub fallback: Fallback,
}

pub const PIN: FieldRule = FieldRule {
    output: "pin",
    aliases: &["TaxpayerPIN", "pin"],
    fallback: Fallback::RequestedId,
};

pub const TAXPAYER_NAME: FieldRule = FieldRule {
    output: "taxpayer_name",
    aliases: &["TaxpayerName", "name", "taxpayer_name"],
    fallback: Fallback::Absent,
};

pub const PIN_STATUS: FieldRule = FieldRule {
    output: "pin_status",
    aliases: &["PINStatus", "pin_status"],
    fallback: Fallback::Literal("Active"),
};

pub const ITAX_STATUS: FieldRule = FieldRule {
    output: "itax_status",
    aliases: &["iTaxStatus", "itax_status"],
    fallback: Fallback::Literal("Registered"),
};

/// Every rule, in output order.
pub const RULES: [FieldRule; 4] = [PIN, TAXPAYER_NAME, PIN_STATUS, ITAX_STATUS];

impl FieldRule {
    /// Resolves this attribute against a raw body.
    pub fn resolve(&self, body: &RawLookupResponse, requested_id: &str) -> Option<String> {
        self.aliases
            .iter()
            .filter_map(|alias| body.get(*alias))
            .find(|value| is_truthy(value))
            .map(render)
            .or_else(|| match self.fallback {
                Fallback::Absent => None,
                Fallback::Literal(value) => Some(value.to_string()),
                Fallback::RequestedId => Some(requested_id.to_string()),
            })
    }
}

/// Loose truthiness: null, `false`, zero and `""` count as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a body permissively. Anything that is not a JSON object is empty.
pub fn parse_body(body: &str) -> RawLookupResponse {
    serde_json::from_str(body).unwrap_or_default()
}

/// True when the body carries any of the checker's success markers.
pub fn has_success_indicator(body: &RawLookupResponse) -> bool {
    let string_eq =
        |key: &str, expected: &str| body.get(key).and_then(Value::as_str) == Some(expected);

    string_eq("ResponseCode", SUCCESS_RESPONSE_CODE)
        || body.get("TaxpayerPIN").is_some_and(is_truthy)
        || body.get("pin").is_some_and(is_truthy)
        || string_eq("status", "Success")
}

/// Prefix for raw fields displaced by a canonical field of the same name.
pub const DISPLACED_PREFIX: &str = "raw_";

/// Builds the normalized record from a successful body.
///
/// Raw fields named like a canonical field keep their value under
/// `raw_<name>` when it differs from the resolved one.
pub fn to_record(body: &RawLookupResponse, requested_id: &str) -> TaxpayerRecord {
    let resolved: Vec<(&str, Option<String>)> = RULES
        .iter()
        .map(|rule| (rule.output, rule.resolve(body, requested_id)))
        .collect();

    let mut extra = RawLookupResponse::new();
    for (key, value) in body {
        match resolved.iter().find(|(output, _)| *output == key.as_str()) {
            None => {
                extra.insert(key.clone(), value.clone());
            }
            Some((_, canonical)) => {
                if value.as_str() != canonical.as_deref() {
                    extra.insert(format!("{}{}", DISPLACED_PREFIX, key), value.clone());
                }
            }
        }
    }

    let field = |name: &str| {
        resolved
            .iter()
            .find(|(output, _)| *output == name)
            .and_then(|(_, value)| value.clone())
    };

    TaxpayerRecord {
        pin: field(PIN.output).unwrap_or_default(),
        taxpayer_name: field(TAXPAYER_NAME.output),
        pin_status: field(PIN_STATUS.output).unwrap_or_default(),
        itax_status: field(ITAX_STATUS.output).unwrap_or_default(),
        extra,
    }
}

/// The checker's own `error` string, if it sent a non-empty one.
pub fn upstream_error(body: &RawLookupResponse) -> Option<String> {
    body.get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

/// Reduces a downstream status and body into exactly one outcome.
pub fn reduce(status: StatusCode, body: &str, request: &LookupRequest) -> CanonicalResult {
    let taxpayer_id = request.id();
    let data = parse_body(body);

    if status.is_success() {
        if has_success_indicator(&data) {
            return CanonicalResult::Found {
                record: to_record(&data, taxpayer_id),
                taxpayer_id: taxpayer_id.to_string(),
            };
        }
        return CanonicalResult::NotFound {
            taxpayer_id: taxpayer_id.to_string(),
        };
    }

    if status == StatusCode::NOT_FOUND {
        return CanonicalResult::failure(
            FailureKind::NotFoundUpstream,
            invalid_identifier_message(taxpayer_id),
            taxpayer_id,
        )
        .with_upstream_error(upstream_error(&data));
    }

    let message = data
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("request failed");
    CanonicalResult::failure(FailureKind::UpstreamError, message, taxpayer_id)
        .with_upstream_error(upstream_error(&data))
}

pub fn invalid_identifier_message(taxpayer_id: &str) -> String {
    format!("invalid identifier: {}", taxpayer_id)
}
