//! Booking entity
//!
//! A booking records a paid (or comped) seat on a tour. Bookings are
//! created by the checkout webhook once the payment session settles, and
//! by admins directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::Entity;
use crate::store::new_document_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tour: Uuid,
    pub user: Uuid,
    pub price: f64,
    #[serde(default = "default_true")]
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBooking {
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBooking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
}

impl Entity for Booking {
    const COLLECTION: &'static str = "bookings";
    const TYPE_NAME: &'static str = "Booking";
    type Create = CreateBooking;
    type Update = UpdateBooking;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(create: Self::Create) -> Self {
        Self {
            id: new_document_id(),
            tour: create.tour.unwrap_or(Uuid::nil()),
            user: create.user.unwrap_or(Uuid::nil()),
            price: create.price.unwrap_or_default(),
            paid: create.paid.unwrap_or(true),
            created_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if self.tour.is_nil() {
            violations.push("Booking must belong to a tour".to_string());
        }
        if self.user.is_nil() {
            violations.push("Booking must belong to a user".to_string());
        }
        if self.price <= 0.0 {
            violations.push("Booking must have a price".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn default_true() -> bool {
    true
}
