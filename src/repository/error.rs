//! Repository error types

use std::fmt;

use crate::error::Error;
use crate::store::StoreError;

/// Repository operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single entity by ID
    FindById,
    /// Finding entities by query
    FindAll,
    /// Counting entities
    Count,
    /// Creating a new entity
    Create,
    /// Updating an existing entity
    Update,
    /// Deleting an entity
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindById => write!(f, "find_by_id"),
            Self::FindAll => write!(f, "find_all"),
            Self::Count => write!(f, "count"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// A unique field already holds the submitted value
    Duplicate,
    /// Entity failed field-level validation
    ValidationFailed,
    /// Entity could not be serialized or deserialized
    Serialization,
    /// Other/unexpected error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Serialization => write!(f, "serialization"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Tour")
    pub entity_type: Option<String>,
    /// The id of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self {
            operation: RepositoryOperation::FindById,
            kind: RepositoryErrorKind::NotFound,
            message: "Entity not found".to_string(),
            entity_type: Some(entity_type),
            entity_id: Some(entity_id),
        }
    }

    /// Create a validation failure; the message carries every violation
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Create,
            RepositoryErrorKind::ValidationFailed,
            message,
        )
    }

    /// Create a serialization failure
    pub fn serialization(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Serialization, message)
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{entity_type}: {entity_id}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, value } => Self {
                operation: RepositoryOperation::Create,
                kind: RepositoryErrorKind::Duplicate,
                message: format!("duplicate value for unique field `{field}`"),
                entity_type: Some(field),
                entity_id: Some(value),
            },
        }
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err.kind {
            RepositoryErrorKind::NotFound => {
                let entity = err.entity_type.as_deref().unwrap_or("Document");
                let id = err.entity_id.as_deref().unwrap_or("<unknown>");
                Error::NotFound(format!("No {entity} found with id {id}"))
            }
            RepositoryErrorKind::Duplicate => Error::Duplicate {
                // Entity context carries the offending field and value here.
                field: err.entity_type.unwrap_or_else(|| "field".to_string()),
                value: err.entity_id.unwrap_or_default(),
            },
            RepositoryErrorKind::ValidationFailed => Error::Validation(err.message),
            RepositoryErrorKind::Serialization | RepositoryErrorKind::Other => {
                Error::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_carries_entity_context() {
        let err = RepositoryError::not_found("Tour", "abc");
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.entity_type.as_deref(), Some("Tour"));
        let display = err.to_string();
        assert!(display.contains("not_found"));
        assert!(display.contains("[Tour: abc]"));
    }

    #[test]
    fn store_duplicate_maps_through_to_400() {
        let store_err = StoreError::Duplicate {
            field: "email".into(),
            value: "a@b.c".into(),
        };
        let repo_err = RepositoryError::from(store_err);
        assert_eq!(repo_err.kind, RepositoryErrorKind::Duplicate);

        let err = Error::from(repo_err);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("email"));
        assert!(err.public_message().contains("a@b.c"));
    }

    #[test]
    fn validation_keeps_its_message() {
        let repo_err = RepositoryError::validation_failed("A tour must have a name");
        let err = Error::from(repo_err);
        assert_eq!(err.public_message(), "A tour must have a name");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn serialization_collapses_to_internal() {
        let repo_err =
            RepositoryError::serialization(RepositoryOperation::FindAll, "bad document");
        let err = Error::from(repo_err);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Something went wrong");
    }
}
