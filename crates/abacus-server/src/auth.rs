//! Token authentication.
//!
//! Every request carries a token derived from the caller identity:
//! regular callers hash `account + login + salt`, the administrative
//! login hashes the current UTC hour stamp with its own salt, so admin
//! tokens expire hourly. Tokens are lowercase hex SHA-512 digests.

use abacus_core::{ApiError, Envelope};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Salt appended to user token material.
pub const SALT: &str = "Otus";

/// Login that selects administrative authentication.
pub const ADMIN_LOGIN: &str = "admin";

/// Salt appended to the admin hour stamp.
pub const ADMIN_SALT: &str = "42";

/// Whether the envelope claims the administrative login.
#[must_use]
pub fn is_admin(envelope: &Envelope) -> bool {
    envelope.login() == ADMIN_LOGIN
}

/// Expected admin token at the given moment: SHA-512 of the UTC hour
/// stamp `YYYYMMDDHH` followed by the admin salt.
#[must_use]
pub fn admin_digest(now: DateTime<Utc>) -> String {
    sha512_hex(&format!("{}{}", now.format("%Y%m%d%H"), ADMIN_SALT))
}

/// Expected user token: SHA-512 of account, login and salt. An absent
/// account contributes the empty string.
#[must_use]
pub fn user_digest(account: Option<&str>, login: &str) -> String {
    sha512_hex(&format!("{}{}{}", account.unwrap_or(""), login, SALT))
}

/// Verifies the envelope token against the expected digest.
///
/// The comparison is constant time over the digest bytes.
///
/// # Errors
///
/// Returns [`ApiError::AuthenticationFailed`] when the token does not
/// match. No detail is attached; callers only learn that the request
/// was rejected.
pub fn verify(envelope: &Envelope) -> Result<(), ApiError> {
    let expected = if is_admin(envelope) {
        admin_digest(Utc::now())
    } else {
        user_digest(envelope.account(), envelope.login())
    };

    if digests_match(envelope.token(), &expected) {
        Ok(())
    } else {
        Err(ApiError::AuthenticationFailed)
    }
}

fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

fn digests_match(supplied: &str, expected: &str) -> bool {
    supplied.as_bytes().ct_eq(expected.as_bytes()).into()
}
