//! Tour entity
//!
//! Field rules: name 10-40 characters, price and duration required and
//! positive, rating clamped to the 1-5 scale, difficulty one of
//! easy/medium/difficult. The slug derives from the name in a pre-save
//! hook; secret tours are hidden from every read by the repository's base
//! filter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::repository::{Entity, RepositoryResult, SaveHook};
use crate::store::{new_document_id, Document, DocumentStore, REV_FIELD};

use super::user::User;

/// Tour difficulty scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Difficult,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Difficult => write!(f, "difficult"),
        }
    }
}

/// A geographic point with optional annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude, latitude
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GeoPoint {
    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// A stop on the tour itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStop {
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub duration: u32,
    #[serde(default = "default_group_size")]
    pub max_group_size: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_rating")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<TourStop>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
    #[serde(default)]
    pub secret_tour: bool,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    /// Duration expressed in weeks, a derived convenience value
    pub fn duration_in_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTour {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<u32>,
    pub max_group_size: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<TourStop>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
    pub secret_tour: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTour {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_group_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<TourStop>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guides: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_tour: Option<bool>,
}

impl Entity for Tour {
    const COLLECTION: &'static str = "tours";
    const TYPE_NAME: &'static str = "Tour";
    type Create = CreateTour;
    type Update = UpdateTour;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(create: Self::Create) -> Self {
        let name = create.name.unwrap_or_default();
        Self {
            id: new_document_id(),
            slug: slugify(&name),
            name,
            price: create.price.unwrap_or_default(),
            duration: create.duration.unwrap_or_default(),
            max_group_size: create.max_group_size.unwrap_or_else(default_group_size),
            difficulty: create.difficulty.unwrap_or_default(),
            ratings_average: default_rating(),
            ratings_quantity: 0,
            summary: create.summary.unwrap_or_default(),
            description: create.description.unwrap_or_default(),
            image_cover: create.image_cover.unwrap_or_default(),
            images: create.images,
            start_dates: create.start_dates,
            start_location: create.start_location,
            locations: create.locations,
            guides: create.guides,
            secret_tour: create.secret_tour.unwrap_or(false),
            created_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if self.name.is_empty() {
            violations.push("A tour must have a name".to_string());
        } else {
            let length = self.name.chars().count();
            if length < 10 {
                violations.push("Tour name must be at least 10 characters".to_string());
            }
            if length > 40 {
                violations.push("Tour name must be at most 40 characters".to_string());
            }
        }
        if self.price <= 0.0 {
            violations.push("A tour must have a price".to_string());
        }
        if self.duration == 0 {
            violations.push("A tour must have a duration".to_string());
        }
        if !(1.0..=5.0).contains(&self.ratings_average) {
            violations.push("Rating must be between 1 and 5".to_string());
        }
        if self.description.is_empty() {
            violations.push("A tour must have a description".to_string());
        }
        if self.image_cover.is_empty() {
            violations.push("A tour must have a cover image".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Detail reads carry resolved guide profiles and the tour's reviews.
    fn resolve_relations(doc: &mut Document, store: &DocumentStore) {
        let users = store.collection(User::COLLECTION);
        if let Some(Value::Array(guide_ids)) = doc.get(GUIDES_FIELD).cloned() {
            let resolved: Vec<Value> = guide_ids
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|raw| Uuid::parse_str(raw).ok())
                .filter_map(|id| users.get(&id))
                .map(|mut guide| {
                    guide.remove(REV_FIELD);
                    User::redact(&mut guide);
                    Value::Object(guide)
                })
                .collect();
            doc.insert(GUIDES_FIELD.to_string(), Value::Array(resolved));
        }

        if let Some(id) = doc.get("id").cloned() {
            let reviews = store.collection(super::review::Review::COLLECTION);
            let attached: Vec<Value> = reviews
                .scan()
                .into_iter()
                .filter(|review| review.get("tour") == Some(&id))
                .map(|mut review| {
                    review.remove(REV_FIELD);
                    Value::Object(review)
                })
                .collect();
            doc.insert("reviews".to_string(), Value::Array(attached));
        }
    }
}

const GUIDES_FIELD: &str = "guides";

/// Recompute the slug from the name on every save
pub struct SlugHook;

#[async_trait]
impl SaveHook<Tour> for SlugHook {
    async fn before_save(&self, tour: &mut Tour, _is_new: bool) -> RepositoryResult<()> {
        tour.slug = slugify(&tour.name);
        Ok(())
    }
}

/// Lowercase a name into a URL-safe slug
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn default_group_size() -> u32 {
    5
}

pub(crate) fn default_rating() -> f64 {
    4.5
}
