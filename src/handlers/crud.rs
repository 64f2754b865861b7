//! Generic CRUD handler factory
//!
//! Five request handlers parameterized over an entity type. Each extracts
//! its inputs, calls the entity's repository, and shapes the uniform
//! envelope; every failure propagates untouched to centralized error
//! normalization. List handlers build the read through the query-spec
//! pipeline; an optional scope constraint supports parent-nested routes.
//!
//! Two behaviors here are deliberate and covered by tests: reading a
//! missing id answers `200` with `data: null`, and deleting a missing id
//! answers the same `204` as a real delete.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::handlers::envelope::{Created, Envelope, NoContent};
use crate::query::{FilterCondition, QueryOptions};
use crate::repository::{to_outbound_document, Entity, Repository};
use crate::state::{AppState, HasRepository};
use crate::store::Document;

/// Parse a path segment into a document id, surfacing the
/// malformed-reference failure kind on bad input.
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::MalformedReference(raw.to_string()))
}

/// Shared list path: run the pipeline, apply scope constraints ahead of the
/// client filter, execute, envelope.
pub async fn list_documents<E: Entity>(
    repository: &Repository<E>,
    options: QueryOptions,
    scope: Vec<FilterCondition>,
) -> Result<Envelope<Vec<Document>>> {
    let mut spec = options.into_spec();
    for condition in scope.into_iter().rev() {
        spec = spec.with_scope(condition);
    }
    let docs = repository.find_docs(&spec).await?;
    Ok(Envelope::collection(docs))
}

/// GET `/` — list records matching the request's query parameters
pub async fn get_all<E>(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope<Vec<Document>>>>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    let repository: &Repository<E> = state.repository();
    let envelope = list_documents(repository, QueryOptions::from_pairs(pairs), Vec::new()).await?;
    Ok(Json(envelope))
}

/// GET `/{id}` — single record, with related records resolved
pub async fn get_one<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Document>>>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    let id = parse_id(&id)?;
    let repository: &Repository<E> = state.repository();
    let doc = repository.find_doc_by_id(&id).await?.map(|mut doc| {
        E::resolve_relations(&mut doc, state.store());
        doc
    });
    Ok(Json(Envelope::item(doc)))
}

/// POST `/` — create a record from the full field set in the body
pub async fn create_one<E>(
    State(state): State<AppState>,
    Json(payload): Json<E::Create>,
) -> Result<Created<Document>>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    let repository: &Repository<E> = state.repository();
    let created = repository.create(E::from_create(payload)).await?;
    let doc = to_outbound_document(&created)?;
    Ok(Created(Envelope::item(Some(doc))))
}

/// PATCH `/{id}` — merge a partial field set into a record
pub async fn update_one<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<E::Update>,
) -> Result<Json<Envelope<Document>>>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    let id = parse_id(&id)?;
    let patch = patch_document::<E>(&payload)?;
    let repository: &Repository<E> = state.repository();
    let updated = repository
        .update(&id, patch)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No {} found with id {id}", E::TYPE_NAME)))?;
    let doc = to_outbound_document(&updated)?;
    Ok(Json(Envelope::item(Some(doc))))
}

/// DELETE `/{id}` — remove a record; missing ids answer the same 204
pub async fn delete_one<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<NoContent>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    let id = parse_id(&id)?;
    let repository: &Repository<E> = state.repository();
    repository.delete(&id).await?;
    Ok(NoContent)
}

/// Router carrying the five generated handlers for one entity
pub fn crud_router<E>() -> Router<AppState>
where
    E: Entity,
    AppState: HasRepository<E>,
{
    Router::new()
        .route("/", get(get_all::<E>).post(create_one::<E>))
        .route(
            "/{id}",
            get(get_one::<E>)
                .patch(update_one::<E>)
                .delete(delete_one::<E>),
        )
}

/// Serialize a partial update payload into a patch document. Fields the
/// client omitted are absent, so the merge leaves them untouched.
pub fn patch_document<E: Entity>(payload: &E::Update) -> Result<Document> {
    match serde_json::to_value(payload)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(Error::Internal(format!(
            "{} update payload did not serialize to an object",
            E::TYPE_NAME
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_malformed_references() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, Error::MalformedReference(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let id = crate::store::new_document_id();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
