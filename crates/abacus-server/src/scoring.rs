//! Scoring and interests collaborators.
//!
//! Both functions are deliberately infallible: scoring works from the
//! supplied fields alone, and interests fall back to a derived list
//! when the store cannot answer. Store outages degrade responses, they
//! never fail them.

use chrono::NaiveDate;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use abacus_core::Gender;
use abacus_store::{Record, Store};

/// Interest pool used when the store holds nothing for a client.
const CHOICES: [&str; 6] = ["books", "tv", "music", "it", "travel", "pets"];

/// Computes the score for the supplied identity fields.
///
/// The score is additive: 1.5 for a phone, 1.5 for an email, 1.5 for
/// birthday and gender together, 0.5 for first and last name together.
/// Results are cached through the store under a key derived from the
/// identifying fields; a cached score is returned as-is.
pub fn get_score(
    store: &Store,
    phone: Option<&str>,
    email: Option<&str>,
    birthday: Option<NaiveDate>,
    gender: Option<Gender>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> f64 {
    let key = score_cache_key(first_name, last_name, phone, birthday);
    if let Some(record) = store.cache_get(&key) {
        if let Some(score) = record.get("score").and_then(Value::as_f64) {
            return score;
        }
    }

    let mut score = 0.0;
    if phone.is_some() {
        score += 1.5;
    }
    if email.is_some() {
        score += 1.5;
    }
    if birthday.is_some() && gender.is_some() {
        score += 1.5;
    }
    if first_name.is_some() && last_name.is_some() {
        score += 0.5;
    }

    let mut record = Record::new();
    record.insert("score".to_owned(), json!(score));
    store.update_cache(&key, record);

    score
}

/// Looks up the interests for one client.
///
/// Reads `i:<client_id>` from the store, expecting a JSON array of
/// strings. On a miss or an unreadable record the interests are
/// derived from the fixed pool instead, so every client id always
/// yields a non-empty two-element list.
pub fn get_interests(store: &Store, client_id: u64) -> Vec<String> {
    let key = format!("i:{client_id}");
    if let Some(raw) = store.get(&key) {
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(interests) => return interests,
            Err(error) => {
                tracing::warn!("Ignoring unreadable interests record {}: {}", key, error);
            }
        }
    }
    derived_interests(client_id)
}

fn score_cache_key(
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
    birthday: Option<NaiveDate>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(first_name.unwrap_or(""));
    hasher.update(last_name.unwrap_or(""));
    hasher.update(phone.unwrap_or(""));
    hasher.update(
        birthday
            .map(|date| date.format("%Y%m%d").to_string())
            .unwrap_or_default(),
    );
    format!("uid:{}", hex::encode(hasher.finalize()))
}

/// Two distinct interests picked from the pool by client id.
fn derived_interests(client_id: u64) -> Vec<String> {
    let first = usize::try_from(client_id % 6).unwrap_or(0);
    let offset = 1 + usize::try_from((client_id / 6) % 5).unwrap_or(0);
    let second = (first + offset) % CHOICES.len();
    vec![CHOICES[first].to_owned(), CHOICES[second].to_owned()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use abacus_store::{Backend, MemoryBackend, StoreConfig};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryBackend>, Store) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::new(backend.clone(), StoreConfig::default());
        (backend, store)
    }

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(1991, 1, 1).unwrap()
    }

    #[test]
    fn test_score_formula() {
        let cases: Vec<(
            Option<&str>,
            Option<&str>,
            Option<NaiveDate>,
            Option<Gender>,
            Option<&str>,
            Option<&str>,
            f64,
        )> = vec![
            (None, None, None, None, None, None, 0.0),
            (Some("79175002040"), None, None, None, None, None, 1.5),
            (None, Some("a@b"), None, None, None, None, 1.5),
            (Some("79175002040"), Some("a@b"), None, None, None, None, 3.0),
            (None, None, Some(birthday()), Some(Gender::Male), None, None, 1.5),
            (None, None, Some(birthday()), None, None, None, 0.0),
            (None, None, None, None, Some("a"), Some("b"), 0.5),
            (None, None, None, None, Some("a"), None, 0.0),
            (
                Some("79175002040"),
                Some("a@b"),
                Some(birthday()),
                Some(Gender::Female),
                Some("a"),
                Some("b"),
                5.0,
            ),
        ];

        for (phone, email, bday, gender, first, last, expected) in cases {
            let (_, store) = store();
            let score = get_score(&store, phone, email, bday, gender, first, last);
            assert!(
                (score - expected).abs() < f64::EPSILON,
                "{phone:?}/{email:?}/{bday:?}/{gender:?}/{first:?}/{last:?}: \
                 got {score}, want {expected}"
            );
        }
    }

    #[test]
    fn test_gender_unknown_counts_as_present() {
        let (_, store) = store();
        let score = get_score(
            &store,
            None,
            None,
            Some(birthday()),
            Some(Gender::Unknown),
            None,
            None,
        );
        assert!((score - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_is_cached() {
        let (_, store) = store();
        get_score(&store, Some("79175002040"), None, None, None, None, None);
        get_score(&store, Some("79175002040"), None, None, None, None, None);
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_cached_score_wins() {
        let (_, store) = store();
        let key = score_cache_key(None, None, Some("79175002040"), None);
        let mut record = Record::new();
        record.insert("score".to_owned(), json!(99.0));
        store.update_cache(&key, record);

        let score = get_score(&store, Some("79175002040"), None, None, None, None, None);
        assert!((score - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_key_depends_on_identity() {
        assert_eq!(
            score_cache_key(Some("a"), Some("b"), Some("7"), None),
            score_cache_key(Some("a"), Some("b"), Some("7"), None)
        );
        assert_ne!(
            score_cache_key(Some("a"), Some("b"), Some("7"), None),
            score_cache_key(Some("a"), Some("b"), Some("8"), None)
        );
        assert_ne!(
            score_cache_key(Some("a"), None, None, Some(birthday())),
            score_cache_key(Some("a"), None, None, None)
        );
    }

    #[test]
    fn test_interests_prefer_stored_records() {
        let (backend, store) = store();
        backend
            .persist("i:1", json!(["cinema", "geek"]).to_string())
            .unwrap();

        assert_eq!(get_interests(&store, 1), vec!["cinema", "geek"]);
    }

    #[test]
    fn test_interests_fall_back_deterministically() {
        let (_, store) = store();
        for client_id in 0..20 {
            let first = get_interests(&store, client_id);
            let second = get_interests(&store, client_id);
            assert_eq!(first, second);
            assert_eq!(first.len(), 2);
            assert_ne!(first[0], first[1]);
            for interest in &first {
                assert!(CHOICES.contains(&interest.as_str()));
            }
        }
    }

    #[test]
    fn test_interests_fallback_varies_with_client() {
        let (_, store) = store();
        assert_ne!(get_interests(&store, 0), get_interests(&store, 1));
    }

    #[test]
    fn test_interests_ignore_unreadable_records() {
        let (backend, store) = store();
        backend.persist("i:7", "not-json".to_owned()).unwrap();
        assert_eq!(get_interests(&store, 7), derived_interests(7));
    }
}
