//! Top-level request envelope binding.
//!
//! Binding is structural only: it checks that the five envelope
//! members have the right JSON types and that the mandatory ones are
//! present. Whether the token is valid or the arguments satisfy the
//! method schema is decided later in the pipeline.

use serde_json::{Map, Value};

use crate::error::ApiError;

/// A structurally valid request envelope.
///
/// `account`, `login`, `token` and `arguments` tolerate JSON `null`
/// (treated as absent, empty and empty respectively); `method` does
/// not and must be a non-empty string.
#[derive(Debug, Clone)]
pub struct Envelope {
    account: Option<String>,
    login: String,
    token: String,
    method: String,
    arguments: Map<String, Value>,
}

impl Envelope {
    /// Binds a parsed JSON body into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedRequest`] when the body is not an
    /// object, a mandatory member is absent or any member has the
    /// wrong JSON type.
    pub fn from_body(body: &Value) -> Result<Self, ApiError> {
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::malformed("request body must be a JSON object"))?;

        let account = match object.get("account") {
            None | Some(Value::Null) => None,
            Some(Value::String(account)) => Some(account.clone()),
            Some(_) => return Err(ApiError::malformed("account must be a string")),
        };

        let login = required_text(object, "login")?;
        let token = required_text(object, "token")?;

        let method = match object.get("method") {
            Some(Value::String(method)) if !method.is_empty() => method.clone(),
            Some(Value::String(_)) => {
                return Err(ApiError::malformed("method must be a non-empty string"))
            }
            Some(_) => return Err(ApiError::malformed("method must be a string")),
            None => return Err(ApiError::malformed("method is a mandatory field")),
        };

        let arguments = match object.get("arguments") {
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(Value::Null) => Map::new(),
            Some(_) => return Err(ApiError::malformed("arguments must be an object")),
            None => return Err(ApiError::malformed("arguments is a mandatory field")),
        };

        Ok(Self {
            account,
            login,
            token,
            method,
            arguments,
        })
    }

    /// Caller account name, when supplied.
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Caller login. May be empty when the request sent `null`.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Authentication token as sent. Verified later, never here.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Requested method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Method arguments. Empty when the request sent `null`.
    #[must_use]
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }
}

/// Mandatory string member: `null` binds as the empty string.
fn required_text(object: &Map<String, Value>, name: &str) -> Result<String, ApiError> {
    match object.get(name) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(_) => Err(ApiError::malformed(format!("{name} must be a string"))),
        None => Err(ApiError::malformed(format!("{name} is a mandatory field"))),
    }
}
