//! Review entity and rating aggregation
//!
//! Every committed review write triggers [`RatingsHook`], which recomputes
//! the owning tour's rating average and count. The hook is registered on
//! the review repository explicitly; it is the one cross-record side
//! effect in the system and runs fire-and-forget after the commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::query::FilterCondition;
use crate::repository::{ChangeEvent, CommitHook, Entity, RepositoryResult};
use crate::store::{new_document_id, Collection, Document, DocumentStore, REV_FIELD};

use super::tour::default_rating;
use super::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub rating: f64,
    pub tour: Uuid,
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReview {
    pub text: Option<String>,
    pub rating: Option<f64>,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Entity for Review {
    const COLLECTION: &'static str = "reviews";
    const TYPE_NAME: &'static str = "Review";
    type Create = CreateReview;
    type Update = UpdateReview;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(create: Self::Create) -> Self {
        Self {
            id: new_document_id(),
            text: create.text.unwrap_or_default(),
            // Ratings keep one decimal of precision
            rating: (create.rating.unwrap_or_default() * 10.0).round() / 10.0,
            tour: create.tour.unwrap_or(Uuid::nil()),
            user: create.user.unwrap_or(Uuid::nil()),
            created_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if self.text.is_empty() {
            violations.push("Review cannot be empty".to_string());
        }
        if !(1.0..=5.0).contains(&self.rating) {
            violations.push("Rating must be between 1 and 5".to_string());
        }
        if self.tour.is_nil() {
            violations.push("Review must belong to a tour".to_string());
        }
        if self.user.is_nil() {
            violations.push("Review must belong to a user".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Detail reads resolve the reviewer's public profile.
    fn resolve_relations(doc: &mut Document, store: &DocumentStore) {
        let users = store.collection(User::COLLECTION);
        let resolved = doc
            .get("user")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .and_then(|id| users.get(&id));
        if let Some(mut profile) = resolved {
            profile.remove(REV_FIELD);
            User::redact(&mut profile);
            profile.retain(|key, _| matches!(key.as_str(), "id" | "name" | "photo"));
            doc.insert("user".to_string(), Value::Object(profile));
        }
    }
}

/// Post-commit hook keeping tour rating aggregates in step with reviews
pub struct RatingsHook {
    reviews: Collection,
    tours: Collection,
}

impl RatingsHook {
    pub fn new(reviews: Collection, tours: Collection) -> Self {
        Self { reviews, tours }
    }

    /// Recompute and persist the aggregate for one tour. A tour with no
    /// reviews falls back to the schema defaults.
    fn recompute(&self, tour_id: &Uuid) -> RepositoryResult<()> {
        let tour_key = tour_id.to_string();
        let ratings: Vec<f64> = self
            .reviews
            .scan()
            .into_iter()
            .filter(|doc| doc.get("tour").and_then(Value::as_str) == Some(tour_key.as_str()))
            .filter_map(|doc| doc.get("rating").and_then(Value::as_f64))
            .collect();

        let (average, quantity) = if ratings.is_empty() {
            (default_rating(), 0)
        } else {
            let sum: f64 = ratings.iter().sum();
            (sum / ratings.len() as f64, ratings.len() as u64)
        };

        let Some(mut tour) = self.tours.get(tour_id) else {
            // The owning tour may have been deleted out from under its
            // reviews; nothing to aggregate onto.
            return Ok(());
        };
        tour.insert("ratings_average".to_string(), Value::from(average));
        tour.insert("ratings_quantity".to_string(), Value::from(quantity));
        self.tours
            .replace(tour_id, tour)
            .map_err(crate::repository::RepositoryError::from)?;
        Ok(())
    }
}

#[async_trait]
impl CommitHook for RatingsHook {
    async fn after_commit(&self, event: &ChangeEvent) -> RepositoryResult<()> {
        let Some(tour_id) = event
            .document
            .get("tour")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            return Ok(());
        };
        self.recompute(&tour_id)
    }
}

/// Scope constraint for reviews nested under a tour
pub fn tour_scope(tour_id: &Uuid) -> FilterCondition {
    FilterCondition::eq("tour", tour_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(rating: f64) -> CreateReview {
        CreateReview {
            text: Some("Lovely walk".to_string()),
            rating: Some(rating),
            tour: Some(new_document_id()),
            user: Some(new_document_id()),
        }
    }

    #[test]
    fn rating_is_rounded_to_one_decimal() {
        let review = Review::from_create(create(4.26));
        assert!((review.rating - 4.3).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_requires_text_rating_and_owners() {
        let review = Review::from_create(CreateReview::default());
        let violations = review.validate().unwrap_err();
        assert_eq!(violations.len(), 4);

        assert!(Review::from_create(create(4.0)).validate().is_ok());
        assert!(Review::from_create(create(5.5)).validate().is_err());
        assert!(Review::from_create(create(0.5)).validate().is_err());
    }

    #[test]
    fn tour_scope_builds_an_equality_constraint() {
        let id = new_document_id();
        let condition = tour_scope(&id);
        assert_eq!(condition.field, "tour");
    }
}
