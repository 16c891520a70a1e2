//! The entity types of the API and their store access.
//!
//! Every entity is stored as one document. The `*Doc` structs define the
//! document layout and are (de)serialized with `serde_json`; the public types
//! pair such a document with its store key.

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    api::err::{ApiResult, internal_server_error},
    model::Key,
    store::{Document, Fields},
};

pub(crate) mod client;
pub(crate) mod project;
pub(crate) mod user;


/// Deserializes the fields of a stored document.
fn decode<T: DeserializeOwned>(doc: Document) -> ApiResult<(Key, T)> {
    let fields = serde_json::from_value(serde_json::Value::Object(doc.fields))?;
    Ok((doc.key, fields))
}

/// Serializes `value` into the fields of a document. Fields that are `None`
/// are left out if the type says so via `skip_serializing_if`.
fn encode<T: Serialize>(value: &T) -> ApiResult<Fields> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(internal_server_error!("document serialized to non-object: {other}")),
    }
}
