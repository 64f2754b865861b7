//! Typed repositories over document collections
//!
//! A [`Repository<E>`] wraps one [`Collection`] with the entity's
//! serialization, validation, base filters, and lifecycle hooks. The hook
//! ordering is explicit: validation runs first, then the pre-save hook,
//! then the write, then the post-commit hook. Post-commit failures are
//! logged and never propagated; there is no compensation for a multi-step
//! write.

mod error;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::query::{FilterCondition, Projection, QuerySpec};
use crate::store::{condition_matches, Collection, Document};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A persisted record type with a unique id and named fields
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this entity lives in
    const COLLECTION: &'static str;

    /// Human-readable type name used in error context
    const TYPE_NAME: &'static str;

    /// Payload accepted when creating a record
    type Create: DeserializeOwned + Send + 'static;

    /// Partial payload accepted when updating a record
    type Update: Serialize + DeserializeOwned + Send + 'static;

    fn id(&self) -> Uuid;

    /// Build a fresh entity from a create payload, filling defaults.
    /// Required fields left empty here are reported by [`Entity::validate`].
    fn from_create(create: Self::Create) -> Self;

    /// Field-level validation; each violation is one message.
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }

    /// Strip fields that must never leave the service (password hashes,
    /// reset tokens) from an outbound document.
    fn redact(_doc: &mut Document) {}

    /// Resolve related records into an outbound document. Detail reads use
    /// this for eager loading; list reads never do.
    fn resolve_relations(_doc: &mut Document, _store: &crate::store::DocumentStore) {}
}

/// Pre-save hook: runs after validation, before the write.
#[async_trait]
pub trait SaveHook<E>: Send + Sync {
    async fn before_save(&self, entity: &mut E, is_new: bool) -> RepositoryResult<()>;
}

/// What a committed write changed
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub operation: RepositoryOperation,
    pub collection: &'static str,
    /// Post-image for create/update, pre-image for delete
    pub document: Document,
}

/// Post-commit hook: runs after a successful write. Failures are logged by
/// the repository and never propagated to the caller.
#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn after_commit(&self, event: &ChangeEvent) -> RepositoryResult<()>;
}

/// Typed CRUD over one collection
#[derive(Clone)]
pub struct Repository<E: Entity> {
    collection: Collection,
    base_filter: Vec<FilterCondition>,
    save_hook: Option<Arc<dyn SaveHook<E>>>,
    commit_hook: Option<Arc<dyn CommitHook>>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            base_filter: Vec::new(),
            save_hook: None,
            commit_hook: None,
            _entity: PhantomData,
        }
    }

    /// Constrain every read this repository performs
    #[must_use]
    pub fn with_base_filter(mut self, condition: FilterCondition) -> Self {
        self.base_filter.push(condition);
        self
    }

    #[must_use]
    pub fn with_save_hook(mut self, hook: Arc<dyn SaveHook<E>>) -> Self {
        self.save_hook = Some(hook);
        self
    }

    #[must_use]
    pub fn with_commit_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.commit_hook = Some(hook);
        self
    }

    /// Raw collection handle, for hooks and aggregates
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Execute a query spec, returning outbound documents (projected and
    /// redacted). This is the read path behind list endpoints.
    pub async fn find_docs(&self, spec: &QuerySpec) -> RepositoryResult<Vec<Document>> {
        let spec = self.scoped(spec.clone());
        let mut docs = self.collection.find(&spec);
        for doc in &mut docs {
            E::redact(doc);
        }
        Ok(docs)
    }

    /// Execute a query spec, returning typed entities. Projection is forced
    /// to the default so deserialization always sees complete records.
    pub async fn find_entities(&self, spec: &QuerySpec) -> RepositoryResult<Vec<E>> {
        let mut spec = self.scoped(spec.clone());
        spec.projection = Projection::DefaultDenyList;
        self.collection
            .find(&spec)
            .into_iter()
            .map(|doc| deserialize_entity::<E>(doc, RepositoryOperation::FindAll))
            .collect()
    }

    /// Every entity passing the base filter, in natural order
    pub async fn all(&self) -> RepositoryResult<Vec<E>> {
        self.collection
            .scan()
            .into_iter()
            .filter(|doc| self.passes_base_filter(doc))
            .map(|doc| deserialize_entity::<E>(doc, RepositoryOperation::FindAll))
            .collect()
    }

    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<E>> {
        match self.get_doc(id) {
            Some(doc) => Ok(Some(deserialize_entity::<E>(
                doc,
                RepositoryOperation::FindById,
            )?)),
            None => Ok(None),
        }
    }

    /// Outbound document for a single record, or `None` when missing
    pub async fn find_doc_by_id(&self, id: &Uuid) -> RepositoryResult<Option<Document>> {
        Ok(self.get_doc(id).map(|mut doc| {
            doc.remove(crate::store::REV_FIELD);
            E::redact(&mut doc);
            doc
        }))
    }

    /// First entity matching every condition (plus the base filter)
    pub async fn find_one(&self, conditions: &[FilterCondition]) -> RepositoryResult<Option<E>> {
        let mut all = self.base_filter.clone();
        all.extend_from_slice(conditions);
        match self.collection.find_one(&all) {
            Some(doc) => Ok(Some(deserialize_entity::<E>(
                doc,
                RepositoryOperation::FindAll,
            )?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self, conditions: &[FilterCondition]) -> RepositoryResult<u64> {
        let mut all = self.base_filter.clone();
        all.extend_from_slice(conditions);
        Ok(self.collection.count(&all))
    }

    /// Validate, run the pre-save hook, write, run the post-commit hook.
    pub async fn create(&self, mut entity: E) -> RepositoryResult<E> {
        self.validate(&entity, RepositoryOperation::Create)?;
        if let Some(hook) = &self.save_hook {
            hook.before_save(&mut entity, true)
                .await
                .map_err(|e| e.with_operation(RepositoryOperation::Create))?;
        }

        let doc = serialize_entity(&entity, RepositoryOperation::Create)?;
        let stored = self
            .collection
            .insert(doc)
            .map_err(RepositoryError::from)?;

        self.notify(RepositoryOperation::Create, stored.clone()).await;
        deserialize_entity::<E>(stored, RepositoryOperation::Create)
    }

    /// Merge a partial patch into the stored document, revalidate the
    /// merged state, and write it back. Returns `None` when the id is
    /// unknown (or hidden by the base filter).
    pub async fn update(&self, id: &Uuid, patch: Document) -> RepositoryResult<Option<E>> {
        let Some(mut doc) = self.get_doc(id) else {
            return Ok(None);
        };
        for (field, value) in patch {
            doc.insert(field, value);
        }

        let mut entity = deserialize_entity::<E>(doc, RepositoryOperation::Update)
            .map_err(|e| {
                // A patch that breaks the entity's shape is the caller's
                // doing, not a corrupt store.
                RepositoryError::validation_failed(e.message)
                    .with_operation(RepositoryOperation::Update)
            })?;
        self.validate(&entity, RepositoryOperation::Update)?;
        if let Some(hook) = &self.save_hook {
            hook.before_save(&mut entity, false)
                .await
                .map_err(|e| e.with_operation(RepositoryOperation::Update))?;
        }

        let doc = serialize_entity(&entity, RepositoryOperation::Update)?;
        let stored = self
            .collection
            .replace(id, doc)
            .map_err(RepositoryError::from)?;
        match stored {
            Some(stored) => {
                self.notify(RepositoryOperation::Update, stored.clone()).await;
                Ok(Some(deserialize_entity::<E>(
                    stored,
                    RepositoryOperation::Update,
                )?))
            }
            None => Ok(None),
        }
    }

    /// Remove a record. Returns `false` when the id was unknown; the two
    /// outcomes are not distinguished at the HTTP surface.
    pub async fn delete(&self, id: &Uuid) -> RepositoryResult<bool> {
        match self.collection.remove(id) {
            Some(pre_image) => {
                self.notify(RepositoryOperation::Delete, pre_image).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn validate(&self, entity: &E, operation: RepositoryOperation) -> RepositoryResult<()> {
        entity.validate().map_err(|violations| {
            RepositoryError::validation_failed(violations.join(". ")).with_operation(operation)
        })
    }

    fn scoped(&self, mut spec: QuerySpec) -> QuerySpec {
        for condition in self.base_filter.iter().rev() {
            spec = spec.with_scope(condition.clone());
        }
        spec
    }

    fn passes_base_filter(&self, doc: &Document) -> bool {
        self.base_filter.iter().all(|c| condition_matches(c, doc))
    }

    fn get_doc(&self, id: &Uuid) -> Option<Document> {
        self.collection
            .get(id)
            .filter(|doc| self.passes_base_filter(doc))
    }

    async fn notify(&self, operation: RepositoryOperation, document: Document) {
        if let Some(hook) = &self.commit_hook {
            let event = ChangeEvent {
                operation,
                collection: E::COLLECTION,
                document,
            };
            if let Err(err) = hook.after_commit(&event).await {
                tracing::error!(
                    collection = E::COLLECTION,
                    operation = %event.operation,
                    "post-commit hook failed: {err}"
                );
            }
        }
    }
}

/// Serialize an entity into its outbound document shape (no `rev`,
/// private fields stripped).
pub fn to_outbound_document<E: Entity>(entity: &E) -> RepositoryResult<Document> {
    let mut doc = serialize_entity(entity, RepositoryOperation::Create)?;
    doc.remove(crate::store::REV_FIELD);
    E::redact(&mut doc);
    Ok(doc)
}

fn serialize_entity<E: Entity>(
    entity: &E,
    operation: RepositoryOperation,
) -> RepositoryResult<Document> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RepositoryError::serialization(
            operation,
            format!("{} did not serialize to an object", E::TYPE_NAME),
        )),
        Err(e) => Err(RepositoryError::serialization(operation, e.to_string())),
    }
}

fn deserialize_entity<E: Entity>(
    doc: Document,
    operation: RepositoryOperation,
) -> RepositoryResult<E> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| RepositoryError::serialization(operation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryOptions;
    use crate::store::DocumentStore;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Widget {
        id: Uuid,
        name: String,
        #[serde(default)]
        price: f64,
        #[serde(default)]
        hidden: bool,
        created_at: DateTime<Utc>,
    }

    #[derive(Debug, Deserialize)]
    struct CreateWidget {
        name: Option<String>,
        price: Option<f64>,
    }

    #[derive(Debug, Serialize, Deserialize, Default)]
    struct UpdateWidget {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
    }

    impl Entity for Widget {
        const COLLECTION: &'static str = "widgets";
        const TYPE_NAME: &'static str = "Widget";
        type Create = CreateWidget;
        type Update = UpdateWidget;

        fn id(&self) -> Uuid {
            self.id
        }

        fn from_create(create: Self::Create) -> Self {
            Self {
                id: crate::store::new_document_id(),
                name: create.name.unwrap_or_default(),
                price: create.price.unwrap_or_default(),
                hidden: false,
                created_at: Utc::now(),
            }
        }

        fn validate(&self) -> Result<(), Vec<String>> {
            let mut violations = Vec::new();
            if self.name.is_empty() {
                violations.push("A widget must have a name".to_string());
            }
            if self.price <= 0.0 {
                violations.push("A widget must have a price".to_string());
            }
            if violations.is_empty() {
                Ok(())
            } else {
                Err(violations)
            }
        }
    }

    struct UpcaseHook;

    #[async_trait]
    impl SaveHook<Widget> for UpcaseHook {
        async fn before_save(&self, entity: &mut Widget, _is_new: bool) -> RepositoryResult<()> {
            entity.name = entity.name.to_uppercase();
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingHook {
        commits: AtomicUsize,
    }

    #[async_trait]
    impl CommitHook for CountingHook {
        async fn after_commit(&self, _event: &ChangeEvent) -> RepositoryResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn repo() -> Repository<Widget> {
        Repository::new(DocumentStore::new().collection(Widget::COLLECTION))
    }

    fn widget(name: &str, price: f64) -> Widget {
        Widget::from_create(CreateWidget {
            name: Some(name.to_string()),
            price: Some(price),
        })
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let repo = repo();
        let created = repo.create(widget("compass", 20.0)).await.unwrap();
        let found = repo.find_by_id(&created.id()).await.unwrap().unwrap();
        assert_eq!(found.name, "compass");
        assert_eq!(found.price, 20.0);
    }

    #[tokio::test]
    async fn validation_lists_every_violation() {
        let repo = repo();
        let err = repo
            .create(Widget::from_create(CreateWidget {
                name: None,
                price: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(
            err.message,
            "A widget must have a name. A widget must have a price"
        );
    }

    #[tokio::test]
    async fn update_merges_and_revalidates() {
        let repo = repo();
        let created = repo.create(widget("compass", 20.0)).await.unwrap();

        let patch = serde_json::to_value(UpdateWidget {
            price: Some(25.0),
            ..Default::default()
        })
        .unwrap();
        let updated = repo
            .update(&created.id(), patch.as_object().unwrap().clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, 25.0);
        assert_eq!(updated.name, "compass");

        // A patch that breaks validation is rejected
        let patch = serde_json::json!({"price": -1.0});
        let err = repo
            .update(&created.id(), patch.as_object().unwrap().clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn update_unknown_id_is_none() {
        let repo = repo();
        let result = repo
            .update(&crate::store::new_document_id(), Document::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let repo = repo();
        let created = repo.create(widget("compass", 20.0)).await.unwrap();
        assert!(repo.delete(&created.id()).await.unwrap());
        assert!(!repo.delete(&created.id()).await.unwrap());
    }

    #[tokio::test]
    async fn base_filter_hides_records_from_every_read() {
        let repo = repo().with_base_filter(FilterCondition::ne("hidden", true));
        let visible = repo.create(widget("visible", 10.0)).await.unwrap();
        let mut hidden = widget("hidden", 10.0);
        hidden.hidden = true;
        let hidden = repo.create(hidden).await.unwrap();

        assert!(repo.find_by_id(&visible.id()).await.unwrap().is_some());
        assert!(repo.find_by_id(&hidden.id()).await.unwrap().is_none());

        let docs = repo.find_docs(&QuerySpec::default()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(repo.count(&[]).await.unwrap(), 1);
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_hook_runs_before_the_write() {
        let repo = repo().with_save_hook(Arc::new(UpcaseHook));
        let created = repo.create(widget("compass", 20.0)).await.unwrap();
        assert_eq!(created.name, "COMPASS");
    }

    #[tokio::test]
    async fn commit_hook_fires_on_create_update_delete() {
        let hook = Arc::new(CountingHook::default());
        let repo = repo().with_commit_hook(hook.clone());

        let created = repo.create(widget("compass", 20.0)).await.unwrap();
        let patch = serde_json::json!({"price": 30.0});
        repo.update(&created.id(), patch.as_object().unwrap().clone())
            .await
            .unwrap();
        repo.delete(&created.id()).await.unwrap();

        assert_eq!(hook.commits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn find_docs_executes_the_query_pipeline() {
        let repo = repo();
        for (name, price) in [("a", 50.0), ("b", 120.0), ("c", 200.0), ("d", 90.0), ("e", 300.0)] {
            repo.create(widget(name, price)).await.unwrap();
        }
        let spec = QueryOptions::from_pairs(vec![
            ("price[gte]".into(), "100".into()),
            ("sort".into(), "-price".into()),
            ("limit".into(), "2".into()),
        ])
        .into_spec();
        let docs = repo.find_docs(&spec).await.unwrap();
        let prices: Vec<_> = docs.iter().map(|d| d["price"].as_f64().unwrap()).collect();
        assert_eq!(prices, vec![300.0, 200.0]);
    }
}
