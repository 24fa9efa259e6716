//! Turns endpoint JSON payloads into batches.
//!
//! Shapers are looked up by endpoint name once, when the source is built;
//! endpoints without a dedicated shaper use [`shape_default`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use lakeshore_core::{Batch, Value};
use serde_json::{Map, Value as Json};

use crate::IngestError;

pub type ShapeFn = fn(&Json) -> Result<Batch, IngestError>;

#[derive(Clone)]
pub struct ShaperRegistry {
    shapers: HashMap<String, ShapeFn>,
}

impl Default for ShaperRegistry {
    fn default() -> Self {
        let mut registry = Self {
            shapers: HashMap::new(),
        };
        registry.register("products", shape_products);
        registry.register("categories", shape_categories);
        registry
    }
}

impl ShaperRegistry {
    pub fn register(&mut self, endpoint: &str, shaper: ShapeFn) {
        self.shapers.insert(endpoint.to_string(), shaper);
    }

    pub fn resolve(&self, endpoint: &str) -> ShapeFn {
        self.shapers.get(endpoint).copied().unwrap_or(shape_default)
    }
}

/// Add `ingested_at` and `data_source = api_<endpoint>` to every row.
pub fn annotate(batch: Batch, endpoint: &str, ingested_at: DateTime<Utc>) -> Batch {
    batch
        .with_constant_column("ingested_at", Value::Text(ingested_at.to_rfc3339()))
        .with_constant_column("data_source", Value::Text(format!("api_{endpoint}")))
}

/// Rows from JSON objects; columns in first-seen key order.
fn rows_from_objects<'a>(
    objects: impl IntoIterator<Item = &'a Map<String, Json>> + Clone,
) -> Result<Batch, IngestError> {
    let mut columns: IndexSet<String> = IndexSet::new();
    for obj in objects.clone() {
        columns.extend(obj.keys().cloned());
    }
    let mut batch = Batch::new(columns.iter().cloned().collect());
    for obj in objects {
        let row = columns
            .iter()
            .map(|c| obj.get(c).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        batch
            .push_row(row)
            .map_err(|e| IngestError::MalformedResponse(e.to_string()))?;
    }
    Ok(batch)
}

fn as_objects<'a>(items: &'a [Json], what: &str) -> Result<Vec<&'a Map<String, Json>>, IngestError> {
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| IngestError::MalformedResponse(format!("{what}: expected objects, got {item}")))
        })
        .collect()
}

/// List of objects → rows; a single object → one row.
pub fn shape_default(payload: &Json) -> Result<Batch, IngestError> {
    match payload {
        Json::Array(items) => rows_from_objects(as_objects(items, "list")?),
        Json::Object(obj) => rows_from_objects([obj]),
        other => Err(IngestError::MalformedResponse(format!(
            "expected list or object, got {other}"
        ))),
    }
}

/// `{"products": [...]}` with list-valued `tags` and `images` flattened.
pub fn shape_products(payload: &Json) -> Result<Batch, IngestError> {
    let items = payload
        .get("products")
        .and_then(Json::as_array)
        .ok_or_else(|| IngestError::MalformedResponse("no 'products' array in response".into()))?;

    let mut products = Vec::with_capacity(items.len());
    for product in as_objects(items, "products")? {
        let mut product = product.clone();
        if let Some(Json::Array(tags)) = product.get("tags") {
            let joined = tags
                .iter()
                .map(|t| t.as_str().map(str::to_string).unwrap_or_else(|| t.to_string()))
                .collect::<Vec<_>>()
                .join(",");
            product.insert("tags".into(), Json::String(joined));
        }
        if let Some(Json::Array(images)) = product.get("images") {
            let primary = images.first().cloned().unwrap_or(Json::Null);
            let count = images.len();
            product.insert("primary_image".into(), primary);
            product.insert("image_count".into(), Json::from(count));
        }
        products.push(product);
    }
    rows_from_objects(products.iter())
}

/// A list of category names or category objects, one row each.
pub fn shape_categories(payload: &Json) -> Result<Batch, IngestError> {
    let items = payload
        .as_array()
        .ok_or_else(|| IngestError::MalformedResponse("expected a list of categories".into()))?;

    let mut categories = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Json::String(name) => {
                let mut obj = Map::new();
                obj.insert("category".into(), Json::String(name.clone()));
                categories.push(obj);
            }
            Json::Object(obj) => categories.push(obj.clone()),
            other => {
                return Err(IngestError::MalformedResponse(format!(
                    "unexpected category entry {other}"
                )))
            }
        }
    }
    rows_from_objects(categories.iter())
}
