//! Uniform response envelope for the JSON API
//!
//! Every success body is `{status, data, results?}`. `results` is present
//! only on collection responses and equals the number of items returned
//! after pagination, not the total matching count. `data` is always
//! serialized on item responses so a missing record reads as an explicit
//! `null`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Envelope status discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// The uniform response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: EnvelopeStatus,

    /// Returned item count, collection responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    /// The payload; `null` when a single record was not found
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Envelope for a single record, `data: null` when absent
    pub fn item(data: Option<T>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            results: None,
            data,
        }
    }
}

impl<T> Envelope<Vec<T>> {
    /// Envelope for a collection; `results` equals the returned length
    pub fn collection(items: Vec<T>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            results: Some(items.len()),
            data: Some(items),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// HTTP 201 Created wrapper around an envelope
#[derive(Debug)]
pub struct Created<T>(pub Envelope<T>);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// HTTP 204 No Content response
#[derive(Debug, Clone, Copy)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_envelope_serializes_null_data() {
        let envelope: Envelope<serde_json::Value> = Envelope::item(None);
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["status"], "success");
        assert!(body["data"].is_null());
        assert!(body.get("results").is_none());
    }

    #[test]
    fn collection_envelope_counts_returned_items() {
        let envelope = Envelope::collection(vec![json!({"a": 1}), json!({"a": 2})]);
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_collection_still_reports_results() {
        let envelope: Envelope<Vec<serde_json::Value>> = Envelope::collection(vec![]);
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["results"], 0);
        assert_eq!(body["data"], json!([]));
    }
}
