//! Field validation primitives.
//!
//! Every request argument is checked against one of a closed set of
//! [`FieldRule`] kinds. A [`FieldSpec`] pairs a rule with the
//! required/nullable flags that drive the schema walk in
//! [`schema`](crate::schema). Rules are pure functions over borrowed
//! [`serde_json::Value`]s and never mutate anything.

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;

/// Wire format for date-valued fields.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Maximum allowed distance, in calendar years, between a birth date
/// and the current date.
pub const MAX_AGE_YEARS: i32 = 70;

/// Why a single field failed validation.
///
/// The rendered messages are a stable part of the API contract: clients
/// match on them, and the test suite asserts them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A required field was not supplied at all.
    #[error("Mandatory parameter can't be omitted")]
    Missing,
    /// A non-nullable field was supplied with an empty value.
    #[error("The parameter should have a value")]
    Empty,
    /// A text-like field received a non-string value.
    #[error("The value should be a string")]
    NotText,
    /// An arguments field received something other than a JSON object.
    #[error("The value should consist of pairs key:value separated by comma")]
    NotArguments,
    /// An email field received a string without an interior `@`.
    #[error("Entered value is not a valid email")]
    InvalidEmail,
    /// A phone field received anything other than an 11-digit number
    /// starting with 7.
    #[error("Entered value is not a valid phone number in Russia")]
    InvalidPhone,
    /// A date field received a value that does not parse as `DD.MM.YYYY`.
    #[error("Incorrect data format, should be DD.MM.YYYY")]
    InvalidDate,
    /// A birth date lies more than [`MAX_AGE_YEARS`] years in the past.
    #[error("Incorrect birth day")]
    InvalidBirthDate,
    /// A gender field received a value outside the {0, 1, 2} enumeration.
    #[error("Gender value should be equal to 0,1 or 2")]
    InvalidGender,
    /// A client-ids field received something other than a JSON array.
    #[error("Invalid data type, should be an array of digits")]
    NotIdArray,
    /// A client-ids array contains a non-integer element.
    #[error("All elements should be digits")]
    NonDigitId,
}

/// Gender enumeration carried by score requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    /// Gender not disclosed (code 0).
    Unknown,
    /// Male (code 1).
    Male,
    /// Female (code 2).
    Female,
}

impl Gender {
    /// Maps a wire code onto the enumeration.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Male),
            2 => Some(Self::Female),
            _ => None,
        }
    }

    /// Returns the wire code for this gender.
    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::Unknown => 0,
            Self::Male => 1,
            Self::Female => 2,
        }
    }
}

impl TryFrom<&Value> for Gender {
    type Error = FieldError;

    fn try_from(value: &Value) -> Result<Self, FieldError> {
        value
            .as_u64()
            .and_then(Self::from_code)
            .ok_or(FieldError::InvalidGender)
    }
}

/// The closed set of field validator kinds.
///
/// Shared behavior is composed rather than inherited: the email rule
/// applies the text rule first, the birth-date rule applies the date
/// rule first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Any JSON string.
    Text,
    /// A JSON object of key/value pairs.
    Arguments,
    /// A string containing `@` somewhere in the middle.
    Email,
    /// An 11-digit Russian phone number starting with 7.
    Phone,
    /// A `DD.MM.YYYY` date string.
    Date,
    /// A date string at most [`MAX_AGE_YEARS`] years in the past.
    BirthDate,
    /// A gender code (0, 1 or 2).
    Gender,
    /// An array of non-negative integer client ids.
    ClientIds,
}

impl FieldRule {
    /// Checks a value against this rule.
    ///
    /// # Errors
    ///
    /// Returns the rule's [`FieldError`] when the value does not
    /// satisfy it. Every malformed shape is a typed error; there is no
    /// silent failure path.
    pub fn check(self, value: &Value) -> Result<(), FieldError> {
        match self {
            Self::Text => check_text(value).map(|_| ()),
            Self::Arguments => check_arguments(value),
            Self::Email => check_email(value),
            Self::Phone => normalize_phone(value).map(|_| ()),
            Self::Date => parse_date(value).map(|_| ()),
            Self::BirthDate => check_birth_date(value),
            Self::Gender => Gender::try_from(value).map(|_| ()),
            Self::ClientIds => parse_client_ids(value).map(|_| ()),
        }
    }
}

/// A validation rule plus the flags controlling the schema walk.
///
/// Specs start optional and non-nullable; chain [`required`](Self::required)
/// and [`nullable`](Self::nullable) to adjust:
///
/// ```rust
/// use abacus_core::FieldSpec;
///
/// let spec = FieldSpec::client_ids().required();
/// assert!(spec.is_required());
/// assert!(!spec.is_nullable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    rule: FieldRule,
    required: bool,
    nullable: bool,
}

impl FieldSpec {
    /// Creates a spec for the given rule, optional and non-nullable.
    #[must_use]
    pub const fn new(rule: FieldRule) -> Self {
        Self {
            rule,
            required: false,
            nullable: false,
        }
    }

    /// Text field spec.
    #[must_use]
    pub const fn text() -> Self {
        Self::new(FieldRule::Text)
    }

    /// Arguments-map field spec.
    #[must_use]
    pub const fn arguments() -> Self {
        Self::new(FieldRule::Arguments)
    }

    /// Email field spec.
    #[must_use]
    pub const fn email() -> Self {
        Self::new(FieldRule::Email)
    }

    /// Phone field spec.
    #[must_use]
    pub const fn phone() -> Self {
        Self::new(FieldRule::Phone)
    }

    /// Date field spec.
    #[must_use]
    pub const fn date() -> Self {
        Self::new(FieldRule::Date)
    }

    /// Birth-date field spec.
    #[must_use]
    pub const fn birth_date() -> Self {
        Self::new(FieldRule::BirthDate)
    }

    /// Gender field spec.
    #[must_use]
    pub const fn gender() -> Self {
        Self::new(FieldRule::Gender)
    }

    /// Client-ids field spec.
    #[must_use]
    pub const fn client_ids() -> Self {
        Self::new(FieldRule::ClientIds)
    }

    /// Marks the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as accepting empty values.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Returns the validation rule.
    #[must_use]
    pub const fn rule(&self) -> FieldRule {
        self.rule
    }

    /// Returns `true` if the field must be supplied.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns `true` if the field accepts empty values.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Returns `true` for values in the empty set: `null`, `""`, `[]`, `{}`.
///
/// Numbers are never empty; gender code `0` is a real value.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Strips phone separators and returns the normalized digit string.
///
/// Accepts a JSON string or a non-negative JSON integer. The characters
/// `(`, `)`, `-` and space are dropped before checking; the remainder
/// must be exactly 11 ASCII digits starting with `7`.
///
/// # Errors
///
/// Returns [`FieldError::InvalidPhone`] for every malformed shape.
pub fn normalize_phone(value: &Value) -> Result<String, FieldError> {
    let digits: String = match value {
        Value::String(s) => s
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | '-' | ' '))
            .collect(),
        Value::Number(n) => match n.as_u64() {
            Some(n) => n.to_string(),
            None => return Err(FieldError::InvalidPhone),
        },
        _ => return Err(FieldError::InvalidPhone),
    };
    if digits.len() == 11 && digits.starts_with('7') && digits.bytes().all(|b| b.is_ascii_digit())
    {
        Ok(digits)
    } else {
        Err(FieldError::InvalidPhone)
    }
}

/// Parses a `DD.MM.YYYY` date value.
///
/// # Errors
///
/// Returns [`FieldError::InvalidDate`] when the value is not a string
/// or does not parse in the wire format.
pub fn parse_date(value: &Value) -> Result<NaiveDate, FieldError> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
        .ok_or(FieldError::InvalidDate)
}

/// Parses an array of non-negative integer client ids.
///
/// # Errors
///
/// Returns [`FieldError::NotIdArray`] for non-arrays and
/// [`FieldError::NonDigitId`] when any element is not a non-negative
/// integer (strings, bools, negatives and fractions all fail).
pub fn parse_client_ids(value: &Value) -> Result<Vec<u64>, FieldError> {
    let items = value.as_array().ok_or(FieldError::NotIdArray)?;
    items
        .iter()
        .map(|item| item.as_u64().ok_or(FieldError::NonDigitId))
        .collect()
}

fn check_text(value: &Value) -> Result<&str, FieldError> {
    value.as_str().ok_or(FieldError::NotText)
}

fn check_arguments(value: &Value) -> Result<(), FieldError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(FieldError::NotArguments)
    }
}

fn check_email(value: &Value) -> Result<(), FieldError> {
    let s = check_text(value)?;
    if s.contains('@') && !s.starts_with('@') && !s.ends_with('@') {
        Ok(())
    } else {
        Err(FieldError::InvalidEmail)
    }
}

fn check_birth_date(value: &Value) -> Result<(), FieldError> {
    let date = parse_date(value)?;
    if Utc::now().year() - date.year() > MAX_AGE_YEARS {
        Err(FieldError::InvalidBirthDate)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_text_rule() {
        assert!(FieldRule::Text.check(&json!("hello")).is_ok());
        assert!(FieldRule::Text.check(&json!("")).is_ok());
        assert_eq!(FieldRule::Text.check(&json!(1)), Err(FieldError::NotText));
        assert_eq!(
            FieldRule::Text.check(&Value::Null),
            Err(FieldError::NotText)
        );
        assert_eq!(
            FieldRule::Text.check(&json!(["a"])),
            Err(FieldError::NotText)
        );
    }

    #[test]
    fn test_arguments_rule() {
        assert!(FieldRule::Arguments.check(&json!({})).is_ok());
        assert!(FieldRule::Arguments.check(&json!({"a": 1})).is_ok());
        assert_eq!(
            FieldRule::Arguments.check(&json!([])),
            Err(FieldError::NotArguments)
        );
        assert_eq!(
            FieldRule::Arguments.check(&json!("a=1")),
            Err(FieldError::NotArguments)
        );
    }

    #[test]
    fn test_email_rule() {
        assert!(FieldRule::Email.check(&json!("stupnikov@otus.ru")).is_ok());
        assert_eq!(
            FieldRule::Email.check(&json!("stupnikovotus.ru")),
            Err(FieldError::InvalidEmail)
        );
        assert_eq!(
            FieldRule::Email.check(&json!("@otus.ru")),
            Err(FieldError::InvalidEmail)
        );
        assert_eq!(
            FieldRule::Email.check(&json!("stupnikov@")),
            Err(FieldError::InvalidEmail)
        );
        assert_eq!(
            FieldRule::Email.check(&json!(42)),
            Err(FieldError::NotText)
        );
    }

    #[test]
    fn test_phone_rule_accepts_strings_and_integers() {
        assert!(FieldRule::Phone.check(&json!("79175002040")).is_ok());
        assert!(FieldRule::Phone.check(&json!(79_175_002_040_u64)).is_ok());
        assert_eq!(
            normalize_phone(&json!("7(917)500-20-40")).as_deref(),
            Ok("79175002040")
        );
        assert_eq!(
            normalize_phone(&json!(79_175_002_040_u64)).as_deref(),
            Ok("79175002040")
        );
    }

    #[test]
    fn test_phone_rule_rejects_malformed_shapes() {
        for bad in [
            json!("89175002040"),
            json!("791750020401"),
            json!("7917500204"),
            json!("7917500204x"),
            json!(-79_175_002_040_i64),
            json!(1.5),
            Value::Null,
            json!(["79175002040"]),
        ] {
            assert_eq!(
                FieldRule::Phone.check(&bad),
                Err(FieldError::InvalidPhone),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_date_rule() {
        assert!(FieldRule::Date.check(&json!("20.05.2018")).is_ok());
        assert_eq!(
            parse_date(&json!("01.01.2000")),
            Ok(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
        );
        for bad in [
            json!("GGGG"),
            json!("2018.05.20"),
            json!("31.02.2020"),
            json!(20_052_018),
            Value::Null,
        ] {
            assert_eq!(
                FieldRule::Date.check(&bad),
                Err(FieldError::InvalidDate),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_birth_date_rule_age_boundary() {
        let year = Utc::now().year();
        let at_limit = json!(format!("01.01.{}", year - MAX_AGE_YEARS));
        let past_limit = json!(format!("01.01.{}", year - MAX_AGE_YEARS - 1));

        assert!(FieldRule::BirthDate.check(&at_limit).is_ok());
        assert_eq!(
            FieldRule::BirthDate.check(&past_limit),
            Err(FieldError::InvalidBirthDate)
        );
    }

    #[test]
    fn test_birth_date_rule_applies_date_rule_first() {
        assert_eq!(
            FieldRule::BirthDate.check(&json!("XXX")),
            Err(FieldError::InvalidDate)
        );
        assert!(FieldRule::BirthDate.check(&json!("01.01.2000")).is_ok());
    }

    #[test]
    fn test_gender_rule() {
        assert!(FieldRule::Gender.check(&json!(0)).is_ok());
        assert!(FieldRule::Gender.check(&json!(1)).is_ok());
        assert!(FieldRule::Gender.check(&json!(2)).is_ok());
        for bad in [json!(3), json!(-1), json!("1"), json!(true), json!(1.5)] {
            assert_eq!(
                FieldRule::Gender.check(&bad),
                Err(FieldError::InvalidGender),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_gender_codes() {
        assert_eq!(Gender::from_code(0), Some(Gender::Unknown));
        assert_eq!(Gender::from_code(1), Some(Gender::Male));
        assert_eq!(Gender::from_code(2), Some(Gender::Female));
        assert_eq!(Gender::from_code(3), None);
        assert_eq!(Gender::Male.code(), 1);
        assert_eq!(Gender::try_from(&json!(2)), Ok(Gender::Female));
        assert_eq!(Gender::try_from(&json!("2")), Err(FieldError::InvalidGender));
    }

    #[test]
    fn test_client_ids_rule() {
        assert_eq!(parse_client_ids(&json!([1, 2, 3])), Ok(vec![1, 2, 3]));
        assert_eq!(parse_client_ids(&json!([0])), Ok(vec![0]));
        assert_eq!(parse_client_ids(&json!([])), Ok(vec![]));
        assert_eq!(
            parse_client_ids(&json!({"1": 2, "3": 2})),
            Err(FieldError::NotIdArray)
        );
        assert_eq!(
            parse_client_ids(&json!(["1", "2"])),
            Err(FieldError::NonDigitId)
        );
        assert_eq!(
            parse_client_ids(&json!([1, -2])),
            Err(FieldError::NonDigitId)
        );
        assert_eq!(
            parse_client_ids(&json!([1, true])),
            Err(FieldError::NonDigitId)
        );
        assert_eq!(
            parse_client_ids(&json!([1.5])),
            Err(FieldError::NonDigitId)
        );
    }

    #[test]
    fn test_empty_value_set() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));

        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!("x")));
        assert!(!is_empty_value(&json!([0])));
    }

    #[test]
    fn test_field_spec_flags() {
        let spec = FieldSpec::text();
        assert!(!spec.is_required());
        assert!(!spec.is_nullable());
        assert_eq!(spec.rule(), FieldRule::Text);

        let spec = FieldSpec::client_ids().required();
        assert!(spec.is_required());
        assert!(!spec.is_nullable());

        let spec = FieldSpec::date().nullable();
        assert!(!spec.is_required());
        assert!(spec.is_nullable());

        let spec = FieldSpec::phone().required().nullable();
        assert!(spec.is_required());
        assert!(spec.is_nullable());
    }

    #[test]
    fn test_error_messages_are_stable() {
        assert_eq!(
            FieldError::Missing.to_string(),
            "Mandatory parameter can't be omitted"
        );
        assert_eq!(
            FieldError::Empty.to_string(),
            "The parameter should have a value"
        );
        assert_eq!(FieldError::NotText.to_string(), "The value should be a string");
        assert_eq!(
            FieldError::NotArguments.to_string(),
            "The value should consist of pairs key:value separated by comma"
        );
        assert_eq!(
            FieldError::InvalidEmail.to_string(),
            "Entered value is not a valid email"
        );
        assert_eq!(
            FieldError::InvalidPhone.to_string(),
            "Entered value is not a valid phone number in Russia"
        );
        assert_eq!(
            FieldError::InvalidDate.to_string(),
            "Incorrect data format, should be DD.MM.YYYY"
        );
        assert_eq!(FieldError::InvalidBirthDate.to_string(), "Incorrect birth day");
        assert_eq!(
            FieldError::InvalidGender.to_string(),
            "Gender value should be equal to 0,1 or 2"
        );
        assert_eq!(
            FieldError::NotIdArray.to_string(),
            "Invalid data type, should be an array of digits"
        );
        assert_eq!(FieldError::NonDigitId.to_string(), "All elements should be digits");
    }

    proptest! {
        #[test]
        fn prop_phone_accepts_any_leading_seven_11_digits(rest in "[0-9]{10}") {
            let phone = format!("7{rest}");
            prop_assert!(FieldRule::Phone.check(&json!(phone)).is_ok());
        }

        #[test]
        fn prop_phone_rejects_wrong_length(digits in "[0-9]{1,10}|[0-9]{12,20}") {
            prop_assert_eq!(
                FieldRule::Phone.check(&json!(digits)),
                Err(FieldError::InvalidPhone)
            );
        }

        #[test]
        fn prop_phone_rejects_other_prefixes(first in "[0-68-9]", rest in "[0-9]{10}") {
            let phone = format!("{first}{rest}");
            prop_assert_eq!(
                FieldRule::Phone.check(&json!(phone)),
                Err(FieldError::InvalidPhone)
            );
        }

        #[test]
        fn prop_separators_do_not_change_verdict(rest in "[0-9]{10}") {
            let bare = format!("7{rest}");
            let dressed = format!("7 ({}) {}-{}", &rest[0..3], &rest[3..6], &rest[6..10]);
            prop_assert_eq!(
                FieldRule::Phone.check(&json!(bare)),
                FieldRule::Phone.check(&json!(dressed))
            );
        }
    }
}
