//! Error taxonomy and response envelopes.

use std::fmt;

use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Insertion-ordered map of field name to validation message.
///
/// One message per field; inserting again for the same field replaces
/// the message but keeps the original position. Serializes as a plain
/// JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    fields: IndexMap<String, String>,
}

impl FieldErrors {
    /// Creates an empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for a field, replacing any earlier one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.insert(field.into(), message.into());
    }

    /// Returns the message recorded for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Returns `true` when no field has failed.
    ///
    /// Emptiness is the sole success signal of a validation pass.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates over `(field, message)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Renders the map as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, message) in &self.fields {
            map.insert(field.clone(), Value::String(message.clone()));
        }
        Value::Object(map)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, message) in iter {
            errors.insert(field, message);
        }
        errors
    }
}

/// Everything that can go wrong between receiving a request body and
/// producing a handler payload.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The top-level envelope is missing a member or has a wrong shape.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// What was wrong with the envelope.
        message: String,
    },

    /// The requested method is not in the known set.
    #[error("unknown method: {method}")]
    UnknownMethod {
        /// The method name as supplied.
        method: String,
    },

    /// One or more argument fields failed their checks.
    #[error("field validation failed: {errors}")]
    FieldValidationFailed {
        /// Per-field messages, in schema order.
        errors: FieldErrors,
    },

    /// Fields passed individually but no required pair was complete.
    #[error("composite rule failed: {errors}")]
    CompositeRuleFailed {
        /// The single `arguments` entry describing the failure.
        errors: FieldErrors,
    },

    /// The supplied token did not match the expected digest.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Anything unexpected caught at the dispatch boundary.
    #[error("internal error: {message}")]
    Internal {
        /// Operator-facing description, never surfaced to clients.
        message: String,
        /// Underlying cause, when one exists.
        cause: Option<anyhow::Error>,
    },
}

impl ApiError {
    /// Creates a `MalformedRequest` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates an `UnknownMethod` error.
    #[must_use]
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates an `Internal` error without a cause.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an `Internal` error wrapping a cause.
    #[must_use]
    pub fn internal_with_source(message: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Internal {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Maps the error onto its HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest { .. }
            | Self::UnknownMethod { .. }
            | Self::FieldValidationFailed { .. }
            | Self::CompositeRuleFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthenticationFailed => StatusCode::FORBIDDEN,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the failure payload placed under the envelope's `error` key.
    ///
    /// Validation failures carry their field map; authentication and
    /// internal failures deliberately carry no detail.
    #[must_use]
    pub fn error_payload(&self) -> Value {
        match self {
            Self::MalformedRequest { message } => Value::String(message.clone()),
            Self::UnknownMethod { method } => Value::String(format!("Unknown method: {method}")),
            Self::FieldValidationFailed { errors } | Self::CompositeRuleFailed { errors } => {
                errors.to_value()
            }
            Self::AuthenticationFailed => Value::String("Forbidden".to_string()),
            Self::Internal { .. } => Value::String("Internal Server Error".to_string()),
        }
    }
}

/// Wire-level response shape.
///
/// Success renders as `{"response": <payload>, "code": 200}` and
/// failure as `{"error": <message or map>, "code": <status>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Success payload, absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<Value>,
    /// Failure payload, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
    /// HTTP status code, duplicated in the body for clients that do
    /// not inspect the status line.
    code: u16,
}

impl ResponseEnvelope {
    /// Wraps a handler payload in a success envelope.
    #[must_use]
    pub fn success(payload: Value) -> Self {
        Self {
            response: Some(payload),
            error: None,
            code: StatusCode::OK.as_u16(),
        }
    }

    /// Wraps a failure payload in an error envelope.
    #[must_use]
    pub fn failure(payload: Value, code: StatusCode) -> Self {
        Self {
            response: None,
            error: Some(payload),
            code: code.as_u16(),
        }
    }

    /// Builds the failure envelope for an [`ApiError`].
    #[must_use]
    pub fn from_error(error: &ApiError) -> Self {
        Self::failure(error.error_payload(), error.status_code())
    }

    /// The status code carried in the body.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// The success payload, if this is a success envelope.
    #[must_use]
    pub const fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// The failure payload, if this is a failure envelope.
    #[must_use]
    pub const fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    /// Serializes the envelope to its JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":"Internal Server Error","code":500}"#.to_string())
    }
}
