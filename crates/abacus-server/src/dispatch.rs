//! Method resolution and request orchestration.

use std::sync::Arc;

use serde_json::Value;

use abacus_core::{ApiError, Envelope, RequestContext, RequestSchema, SchemaViolation};
use abacus_store::Store;

use crate::api::{self, Method};
use crate::auth;

/// Routes bound requests through validation, authentication and the
/// method handlers.
///
/// Built once at startup. Schemas are prebuilt here and shared by
/// every request; the store handle is shared with the transport so it
/// can flush the cache at shutdown.
#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<Store>,
    score_schema: RequestSchema,
    interests_schema: RequestSchema,
}

impl Dispatcher {
    /// Creates a dispatcher over the given store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            score_schema: api::score::schema(),
            interests_schema: api::interests::schema(),
        }
    }

    /// The shared store handle.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Runs one request body through the pipeline.
    ///
    /// Stages run in a fixed order: bind the envelope, resolve the
    /// method, validate the arguments, authenticate, handle. The first
    /// failing stage wins, so a request that is both invalid and
    /// unauthenticated reports the validation errors, and the token is
    /// never inspected for requests that do not validate.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; the transport maps it to an HTTP status via
    /// [`ApiError::status_code`].
    pub fn dispatch(&self, body: &Value, ctx: &mut RequestContext) -> Result<Value, ApiError> {
        let envelope = Envelope::from_body(body)?;

        let method = Method::from_name(envelope.method())
            .ok_or_else(|| ApiError::unknown_method(envelope.method()))?;

        let schema = match method {
            Method::OnlineScore => &self.score_schema,
            Method::ClientsInterests => &self.interests_schema,
        };
        schema
            .validate(envelope.arguments())
            .map_err(|violation| match violation {
                SchemaViolation::Fields(errors) => ApiError::FieldValidationFailed { errors },
                SchemaViolation::Composite(errors) => ApiError::CompositeRuleFailed { errors },
            })?;

        auth::verify(&envelope)?;

        let payload = match method {
            Method::OnlineScore => api::score::handle(&envelope, schema, &self.store, ctx),
            Method::ClientsInterests => api::interests::handle(&envelope, &self.store, ctx),
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abacus_store::{MemoryBackend, StoreConfig};
    use chrono::Utc;
    use http::StatusCode;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let store = Store::new(Arc::new(MemoryBackend::new()), StoreConfig::default());
        Dispatcher::new(Arc::new(store))
    }

    fn request(login: &str, token: &str, method: &str, arguments: Value) -> Value {
        json!({
            "account": "horns&hoofs",
            "login": login,
            "token": token,
            "method": method,
            "arguments": arguments,
        })
    }

    fn token(login: &str) -> String {
        auth::user_digest(Some("horns&hoofs"), login)
    }

    #[test]
    fn test_malformed_body_beats_everything() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();

        for body in [json!("not an object"), json!({})] {
            let error = dispatcher.dispatch(&body, &mut ctx).unwrap_err();
            assert!(matches!(error, ApiError::MalformedRequest { .. }));
        }
    }

    #[test]
    fn test_unknown_method_beats_field_errors() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request("h&f", "bad-token", "horoscope", json!({"phone": "12"}));

        let error = dispatcher.dispatch(&body, &mut ctx).unwrap_err();
        assert!(matches!(error, ApiError::UnknownMethod { .. }));
    }

    #[test]
    fn test_field_errors_beat_authentication() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request("h&f", "bad-token", "online_score", json!({"phone": "12"}));

        let error = dispatcher.dispatch(&body, &mut ctx).unwrap_err();
        assert!(matches!(error, ApiError::FieldValidationFailed { .. }));
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_composite_failure_beats_authentication() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request(
            "h&f",
            "bad-token",
            "online_score",
            json!({"phone": "79175002040"}),
        );

        let error = dispatcher.dispatch(&body, &mut ctx).unwrap_err();
        assert!(matches!(error, ApiError::CompositeRuleFailed { .. }));
    }

    #[test]
    fn test_valid_arguments_still_require_authentication() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request(
            "h&f",
            "bad-token",
            "online_score",
            json!({"phone": "79175002040", "email": "a@b"}),
        );

        let error = dispatcher.dispatch(&body, &mut ctx).unwrap_err();
        assert!(matches!(error, ApiError::AuthenticationFailed));
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_score_request_round_trip() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request(
            "h&f",
            &token("h&f"),
            "online_score",
            json!({"phone": "79175002040", "email": "a@b"}),
        );

        let payload = dispatcher.dispatch(&body, &mut ctx).unwrap();
        let score = payload.get("score").and_then(Value::as_f64).unwrap();
        assert!((score - 3.0).abs() < f64::EPSILON);
        assert_eq!(
            ctx.has(),
            Some(&["email".to_owned(), "phone".to_owned()][..])
        );
    }

    #[test]
    fn test_interests_request_round_trip() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request(
            "h&f",
            &token("h&f"),
            "clients_interests",
            json!({"client_ids": [1, 2]}),
        );

        let payload = dispatcher.dispatch(&body, &mut ctx).unwrap();
        assert_eq!(payload.as_object().unwrap().len(), 2);
        assert_eq!(ctx.nclients(), Some(2));
    }

    #[test]
    fn test_admin_request_round_trip() {
        let dispatcher = dispatcher();
        let mut ctx = RequestContext::new();
        let body = request(
            "admin",
            &auth::admin_digest(Utc::now()),
            "online_score",
            json!({"phone": "79175002040", "email": "a@b"}),
        );

        let payload = dispatcher.dispatch(&body, &mut ctx).unwrap();
        let score = payload.get("score").and_then(Value::as_f64).unwrap();
        assert!((score - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dispatch_is_repeatable() {
        let dispatcher = dispatcher();
        let body = request(
            "h&f",
            &token("h&f"),
            "online_score",
            json!({"gender": 1, "birthday": "01.01.1991"}),
        );

        let first = dispatcher.dispatch(&body, &mut RequestContext::new()).unwrap();
        let second = dispatcher.dispatch(&body, &mut RequestContext::new()).unwrap();
        assert_eq!(first, second);
    }
}
