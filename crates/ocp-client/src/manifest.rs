//! Manifest loading
//!
//! Turns fetched YAML (single objects, multi-document streams or `kind: List`
//! wrappers) into dynamic objects ready to be created on a cluster.

use crate::error::ClientError;
use kube::api::DynamicObject;
use serde::Deserialize;

/// Parse every object in a YAML manifest, flattening `List` wrappers.
pub fn parse_objects(text: &str) -> Result<Vec<DynamicObject>, ClientError> {
    let mut objects = Vec::new();

    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_json::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        collect(value, &mut objects)?;
    }

    Ok(objects)
}

/// Parse a manifest that must contain exactly one object (e.g. a template).
pub fn parse_single(text: &str) -> Result<DynamicObject, ClientError> {
    let mut objects = parse_objects(text)?;
    match objects.len() {
        1 => Ok(objects.remove(0)),
        n => Err(ClientError::Api(format!("expected a single object in manifest, found {}", n))),
    }
}

/// Split an `apiVersion` into `(group, version)`; the core group is `""`.
pub fn group_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

fn collect(value: serde_json::Value, objects: &mut Vec<DynamicObject>) -> Result<(), ClientError> {
    let is_list = value
        .get("kind")
        .and_then(|kind| kind.as_str())
        .is_some_and(|kind| kind.ends_with("List"));

    if is_list {
        if let Some(items) = value.get("items").and_then(|items| items.as_array()) {
            for item in items {
                collect(item.clone(), objects)?;
            }
        }
        return Ok(());
    }

    let object: DynamicObject = serde_json::from_value(value)?;
    if object.types.is_none() {
        return Err(ClientError::Api(format!(
            "manifest object {} has no apiVersion/kind",
            object.metadata.name.as_deref().unwrap_or("<unknown>")
        )));
    }
    objects.push(object);
    Ok(())
}
