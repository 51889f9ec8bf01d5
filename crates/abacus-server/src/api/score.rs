//! The `online_score` method.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use abacus_core::field::{normalize_phone, parse_date};
use abacus_core::{CompositeRule, Envelope, FieldSpec, Gender, RequestContext, RequestSchema};
use abacus_store::Store;

use crate::auth;
use crate::scoring;

/// Score returned to the administrative login, bypassing the scorer.
pub const ADMIN_SCORE: f64 = 42.0;

/// Argument schema: six optional nullable fields plus the requirement
/// that at least one identifying pair arrives complete.
#[must_use]
pub fn schema() -> RequestSchema {
    RequestSchema::builder("online_score")
        .field("first_name", FieldSpec::text().nullable())
        .field("last_name", FieldSpec::text().nullable())
        .field("email", FieldSpec::email().nullable())
        .field("phone", FieldSpec::phone().nullable())
        .field("birthday", FieldSpec::birth_date().nullable())
        .field("gender", FieldSpec::gender().nullable())
        .composite(CompositeRule::any_pair([
            ("phone", "email"),
            ("first_name", "last_name"),
            ("gender", "birthday"),
        ]))
        .build()
}

/// Typed view of validated `online_score` arguments.
///
/// Conversion runs after schema validation, so a value that fails to
/// convert here is one the schema allowed through as empty (`""`,
/// `null`); those count as absent for scoring.
#[derive(Debug, Default)]
pub struct ScoreArgs {
    /// First name, when supplied and non-empty.
    pub first_name: Option<String>,
    /// Last name, when supplied and non-empty.
    pub last_name: Option<String>,
    /// Email address, when supplied and non-empty.
    pub email: Option<String>,
    /// Normalized phone number (11 digits), when supplied.
    pub phone: Option<String>,
    /// Parsed birthday, when supplied.
    pub birthday: Option<NaiveDate>,
    /// Gender code, when supplied.
    pub gender: Option<Gender>,
}

impl ScoreArgs {
    /// Extracts the typed argument values.
    #[must_use]
    pub fn from_arguments(arguments: &Map<String, Value>) -> Self {
        Self {
            first_name: non_empty_text(arguments.get("first_name")),
            last_name: non_empty_text(arguments.get("last_name")),
            email: non_empty_text(arguments.get("email")),
            phone: arguments
                .get("phone")
                .and_then(|value| normalize_phone(value).ok()),
            birthday: arguments
                .get("birthday")
                .and_then(|value| parse_date(value).ok()),
            gender: arguments
                .get("gender")
                .and_then(|value| Gender::try_from(value).ok()),
        }
    }
}

/// Handles a validated, authenticated `online_score` request.
///
/// Records the supplied schema fields into the context (`has`), then
/// scores: the administrative login always receives [`ADMIN_SCORE`],
/// everyone else goes through [`scoring::get_score`].
pub fn handle(
    envelope: &Envelope,
    schema: &RequestSchema,
    store: &Store,
    ctx: &mut RequestContext,
) -> Value {
    ctx.set_has(schema.supplied_fields(envelope.arguments()));

    let score = if auth::is_admin(envelope) {
        ADMIN_SCORE
    } else {
        let args = ScoreArgs::from_arguments(envelope.arguments());
        scoring::get_score(
            store,
            args.phone.as_deref(),
            args.email.as_deref(),
            args.birthday,
            args.gender,
            args.first_name.as_deref(),
            args.last_name.as_deref(),
        )
    };

    json!({ "score": score })
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
