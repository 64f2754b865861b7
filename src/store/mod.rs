//! Embedded document store
//!
//! An in-process, thread-safe document store: named collections of JSON
//! documents with unique-field enforcement and [`QuerySpec`] execution
//! (filter → sort → project → paginate, in that order). The store is the
//! sole arbiter of write ordering for concurrent writes to the same
//! record; no coordination happens above it.

mod document;

pub use document::{
    condition_matches, document_id, new_document_id, project, sort_documents, value_order,
    Document, ID_FIELD, REV_FIELD,
};

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::query::{FilterCondition, QuerySpec};

/// Errors surfaced by collection operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field already holds the submitted value
    #[error("duplicate value for unique field `{field}`: {value}")]
    Duplicate { field: String, value: String },
}

/// A named set of documents
///
/// Cloning a `Collection` yields another handle onto the same data.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    docs: Arc<RwLock<BTreeMap<Uuid, Document>>>,
    unique_fields: Arc<RwLock<Vec<String>>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field whose value must be unique across the collection
    pub fn ensure_unique(&self, field: &str) {
        let mut fields = self.unique_fields.write().expect("unique index lock");
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    /// Insert a document, assigning an id when absent. Starts the revision
    /// counter at zero.
    pub fn insert(&self, mut doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc).unwrap_or_else(new_document_id);
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(REV_FIELD.to_string(), Value::from(0u64));

        let mut docs = self.docs.write().expect("collection lock");
        self.check_unique(&docs, &doc, Some(&id))?;
        docs.insert(id, doc.clone());
        Ok(doc)
    }

    /// Replace a document wholesale, bumping its revision counter.
    ///
    /// Returns the stored document, or `None` when the id is unknown.
    pub fn replace(&self, id: &Uuid, mut doc: Document) -> Result<Option<Document>, StoreError> {
        let mut docs = self.docs.write().expect("collection lock");
        let Some(previous) = docs.get(id) else {
            return Ok(None);
        };
        let rev = previous
            .get(REV_FIELD)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(REV_FIELD.to_string(), Value::from(rev + 1));
        self.check_unique(&docs, &doc, Some(id))?;
        docs.insert(*id, doc.clone());
        Ok(Some(doc))
    }

    /// Fetch a document by id
    pub fn get(&self, id: &Uuid) -> Option<Document> {
        self.docs.read().expect("collection lock").get(id).cloned()
    }

    /// Remove a document, returning its pre-image
    pub fn remove(&self, id: &Uuid) -> Option<Document> {
        self.docs.write().expect("collection lock").remove(id)
    }

    /// Execute a query spec: filter, sort, project, paginate.
    pub fn find(&self, spec: &QuerySpec) -> Vec<Document> {
        let docs = self.docs.read().expect("collection lock");
        let mut matched: Vec<Document> = docs
            .values()
            .filter(|doc| spec.filter.iter().all(|c| condition_matches(c, doc)))
            .cloned()
            .collect();
        drop(docs);

        sort_documents(&mut matched, &spec.sort_keys);

        matched
            .into_iter()
            .skip(spec.skip() as usize)
            .take(spec.limit as usize)
            .map(|doc| project(&doc, &spec.projection))
            .collect()
    }

    /// First document matching every condition, in natural order
    pub fn find_one(&self, conditions: &[FilterCondition]) -> Option<Document> {
        let docs = self.docs.read().expect("collection lock");
        docs.values()
            .find(|doc| conditions.iter().all(|c| condition_matches(c, doc)))
            .cloned()
    }

    /// Count documents matching every condition
    pub fn count(&self, conditions: &[FilterCondition]) -> u64 {
        let docs = self.docs.read().expect("collection lock");
        docs.values()
            .filter(|doc| conditions.iter().all(|c| condition_matches(c, doc)))
            .count() as u64
    }

    /// Every document, natural order, unprojected
    pub fn scan(&self) -> Vec<Document> {
        self.docs.read().expect("collection lock").values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().expect("collection lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_unique(
        &self,
        docs: &BTreeMap<Uuid, Document>,
        candidate: &Document,
        exclude: Option<&Uuid>,
    ) -> Result<(), StoreError> {
        let fields = self.unique_fields.read().expect("unique index lock");
        for field in fields.iter() {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let taken = docs.iter().any(|(id, doc)| {
                Some(id) != exclude && doc.get(field) == Some(value)
            });
            if taken {
                return Err(StoreError::Duplicate {
                    field: field.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The set of named collections backing the service
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    collections: Arc<DashMap<String, Collection>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto a named collection, created on first use
    pub fn collection(&self, name: &str) -> Collection {
        self.collections
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
