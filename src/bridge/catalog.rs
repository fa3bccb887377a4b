//! Tool schema catalog.
//!
//! Maps remote tool descriptors into the model-facing schema shape and
//! keeps the last successful snapshot. Descriptors vary across service
//! versions, so field resolution is tolerant: the input schema may arrive
//! as `inputSchema` or `input_schema`, and entries without a usable name
//! are dropped rather than failing the whole list.

use crate::models::ToolSchema;
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::warn;

use super::first_present;

pub struct ToolCatalog {
    cached: RwLock<Option<Vec<ToolSchema>>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
        }
    }

    /// Map raw descriptors and replace the cached snapshot.
    pub async fn refresh_from(&self, descriptors: &[Value]) -> Vec<ToolSchema> {
        let schemas = schemas_from_descriptors(descriptors);
        *self.cached.write().await = Some(schemas.clone());
        schemas
    }

    /// Last successful snapshot, if any.
    pub async fn snapshot(&self) -> Option<Vec<ToolSchema>> {
        self.cached.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a list of descriptors, skipping unusable ones and duplicate names.
pub fn schemas_from_descriptors(descriptors: &[Value]) -> Vec<ToolSchema> {
    let mut schemas: Vec<ToolSchema> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for descriptor in descriptors {
        let Some(schema) = map_descriptor(descriptor) else {
            warn!(descriptor = %descriptor, "Skipping tool descriptor without a usable name");
            continue;
        };
        if !seen.insert(schema.name.clone()) {
            warn!(tool = %schema.name, "Skipping duplicate tool name in catalog");
            continue;
        }
        schemas.push(schema);
    }

    schemas
}

/// Map one remote descriptor to a model-facing schema.
/// `None` when the descriptor has no non-empty string name.
pub fn map_descriptor(descriptor: &Value) -> Option<ToolSchema> {
    let name = descriptor
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let description = descriptor
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let input_schema = first_present(descriptor, &["inputSchema", "input_schema"])
        .cloned()
        .unwrap_or_else(|| json!({}));

    Some(ToolSchema {
        name,
        description,
        input_schema,
    })
}
