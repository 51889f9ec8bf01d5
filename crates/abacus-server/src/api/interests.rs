//! The `clients_interests` method.

use serde_json::{json, Map, Value};

use abacus_core::field::parse_client_ids;
use abacus_core::{Envelope, FieldSpec, RequestContext, RequestSchema};
use abacus_store::Store;

use crate::scoring;

/// Argument schema: a required id list and an optional date.
#[must_use]
pub fn schema() -> RequestSchema {
    RequestSchema::builder("clients_interests")
        .field("client_ids", FieldSpec::client_ids().required())
        .field("date", FieldSpec::date().nullable())
        .build()
}

/// Handles a validated, authenticated `clients_interests` request.
///
/// Looks up interests per client id in the order given and keys the
/// response object by each id's decimal string. Records the id count
/// into the context (`nclients`).
pub fn handle(envelope: &Envelope, store: &Store, ctx: &mut RequestContext) -> Value {
    let client_ids = envelope
        .arguments()
        .get("client_ids")
        .and_then(|value| parse_client_ids(value).ok())
        .unwrap_or_default();

    ctx.set_nclients(client_ids.len());

    let mut response = Map::new();
    for client_id in client_ids {
        let interests = scoring::get_interests(store, client_id);
        response.insert(client_id.to_string(), json!(interests));
    }
    Value::Object(response)
}
