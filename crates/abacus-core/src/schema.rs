//! Ordered request schemas and the validation walk.
//!
//! A [`RequestSchema`] is built once per request variant at startup and
//! never mutated afterwards. Validation walks the fields in declaration
//! order, accumulates every failure into a [`FieldErrors`] map and only
//! then consults the optional [`CompositeRule`].

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::FieldErrors;
use crate::field::{is_empty_value, FieldError, FieldSpec};

/// Message recorded under the `arguments` key when no composite pair
/// is fully present.
pub const COMPOSITE_FAILURE: &str = "Invalid arguments list";

/// Cross-field requirement: at least one listed pair must be fully
/// present in the argument map.
///
/// Presence means the key exists, regardless of its value; empty or
/// null members fail earlier, in the per-field walk.
#[derive(Debug, Clone)]
pub struct CompositeRule {
    pairs: Vec<(String, String)>,
}

impl CompositeRule {
    /// Builds a rule over the given field-name pairs.
    pub fn any_pair<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        }
    }

    /// Returns `true` when at least one pair is fully present.
    #[must_use]
    pub fn is_satisfied(&self, arguments: &Map<String, Value>) -> bool {
        self.pairs
            .iter()
            .any(|(a, b)| arguments.contains_key(a) && arguments.contains_key(b))
    }

    /// The configured pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Outcome of a failed validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// One or more fields failed their individual checks.
    Fields(FieldErrors),
    /// Every field passed but no composite pair was fully present.
    Composite(FieldErrors),
}

impl SchemaViolation {
    /// The error map, whichever kind of violation occurred.
    #[must_use]
    pub fn errors(&self) -> &FieldErrors {
        match self {
            Self::Fields(errors) | Self::Composite(errors) => errors,
        }
    }
}

/// Immutable ordered field schema for one request variant.
///
/// # Example
///
/// ```rust
/// use abacus_core::{FieldSpec, RequestSchema};
///
/// let schema = RequestSchema::builder("clients_interests")
///     .field("client_ids", FieldSpec::client_ids().required())
///     .field("date", FieldSpec::date().nullable())
///     .build();
///
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RequestSchema {
    name: String,
    fields: IndexMap<String, FieldSpec>,
    composite: Option<CompositeRule>,
}

impl RequestSchema {
    /// Starts a builder for a schema with the given variant name.
    pub fn builder(name: impl Into<String>) -> RequestSchemaBuilder {
        RequestSchemaBuilder {
            name: name.into(),
            fields: IndexMap::new(),
            composite: None,
        }
    }

    /// The variant name this schema belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Validates an argument map against this schema.
    ///
    /// Walks every declared field and accumulates all failures rather
    /// than stopping at the first one. Per field: a required field that
    /// is absent records a missing error; a present empty value on a
    /// non-nullable field records an empty error; the field rule always
    /// runs on present values, and its error replaces an earlier empty
    /// message for the same field. Keys in `arguments` that no field
    /// declares are ignored.
    ///
    /// The composite rule, when configured, is consulted only if the
    /// per-field walk recorded nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation::Fields`] with the accumulated map, or
    /// [`SchemaViolation::Composite`] when only the composite rule
    /// failed.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), SchemaViolation> {
        let mut errors = FieldErrors::new();

        for (name, spec) in &self.fields {
            match arguments.get(name) {
                None => {
                    if spec.is_required() {
                        errors.insert(name, FieldError::Missing.to_string());
                    }
                }
                Some(value) => {
                    if is_empty_value(value) && !spec.is_nullable() {
                        errors.insert(name, FieldError::Empty.to_string());
                    }
                    if let Err(rule_error) = spec.rule().check(value) {
                        errors.insert(name, rule_error.to_string());
                    }
                }
            }
        }

        for key in arguments.keys() {
            if !self.fields.contains_key(key) {
                tracing::debug!(schema = %self.name, field = %key, "ignoring unknown argument");
            }
        }

        if !errors.is_empty() {
            return Err(SchemaViolation::Fields(errors));
        }

        if let Some(rule) = &self.composite {
            if !rule.is_satisfied(arguments) {
                let mut errors = FieldErrors::new();
                errors.insert("arguments", COMPOSITE_FAILURE);
                return Err(SchemaViolation::Composite(errors));
            }
        }

        Ok(())
    }

    /// Declared fields present in `arguments`, in declaration order.
    ///
    /// Presence is key-based: a field supplied as `0` or `""` counts.
    #[must_use]
    pub fn supplied_fields(&self, arguments: &Map<String, Value>) -> Vec<String> {
        self.fields
            .keys()
            .filter(|name| arguments.contains_key(name.as_str()))
            .cloned()
            .collect()
    }
}

/// Builder for [`RequestSchema`].
#[derive(Debug)]
pub struct RequestSchemaBuilder {
    name: String,
    fields: IndexMap<String, FieldSpec>,
    composite: Option<CompositeRule>,
}

impl RequestSchemaBuilder {
    /// Declares a field. Declaring the same name twice is a programming
    /// error; the first declaration wins.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        debug_assert!(
            !self.fields.contains_key(&name),
            "duplicate field declaration: {name}"
        );
        self.fields.entry(name).or_insert(spec);
        self
    }

    /// Attaches the composite rule.
    #[must_use]
    pub fn composite(mut self, rule: CompositeRule) -> Self {
        self.composite = Some(rule);
        self
    }

    /// Finishes the schema.
    #[must_use]
    pub fn build(self) -> RequestSchema {
        RequestSchema {
            name: self.name,
            fields: self.fields,
            composite: self.composite,
        }
    }
}
