//! Payment-session collaborator
//!
//! The service only asks the gateway for a checkout session and verifies
//! webhook signatures; everything between those two points is the
//! gateway's business. [`LocalGateway`] is the deterministic in-process
//! implementation used for development and tests: sessions resolve to a
//! local URL and webhook payloads are signed with a BLAKE3 keyed hash of
//! the configured secret.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, PaymentConfig};
use crate::domain::{Tour, User};
use crate::error::{Error, Result};

/// Signature header on webhook requests
pub const SIGNATURE_HEADER: &str = "trailhead-signature";

/// A created checkout session, handed back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub client_reference_id: String,
    pub customer_email: String,
    pub amount: f64,
    pub currency: String,
}

/// The settled-checkout event a webhook delivers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutEvent {
    pub tour: Uuid,
    pub user: Uuid,
    pub price: f64,
}

/// Gateway contract: create a session, verify a webhook.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        tour: &Tour,
        user: &User,
    ) -> Result<CheckoutSession>;

    /// Check the payload signature and decode the settled event
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<CheckoutEvent>;
}

/// Deterministic in-process gateway
pub struct LocalGateway {
    key: [u8; 32],
    currency: String,
    base_url: String,
}

impl LocalGateway {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(&config.payments, &config.service.base_url)
    }

    pub fn with_parts(payments: &PaymentConfig, base_url: &str) -> Self {
        Self {
            key: *blake3::hash(payments.signing_secret.as_bytes()).as_bytes(),
            currency: payments.currency.clone(),
            base_url: base_url.to_string(),
        }
    }

    /// Sign a payload the way the webhook check expects it
    pub fn signature(&self, payload: &[u8]) -> String {
        blake3::keyed_hash(&self.key, payload).to_hex().to_string()
    }
}

#[async_trait]
impl PaymentGateway for LocalGateway {
    async fn create_checkout_session(
        &self,
        tour: &Tour,
        user: &User,
    ) -> Result<CheckoutSession> {
        let id = format!("cs_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("{}/checkout/{id}", self.base_url),
            id,
            client_reference_id: tour.id.to_string(),
            customer_email: user.email.clone(),
            amount: tour.price,
            currency: self.currency.clone(),
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<CheckoutEvent> {
        let expected = blake3::keyed_hash(&self.key, payload);
        let provided = blake3::Hash::from_hex(signature)
            .map_err(|_| Error::Payment("malformed webhook signature".to_string()))?;
        // blake3::Hash equality is constant-time
        if expected != provided {
            return Err(Error::Payment("webhook signature mismatch".to_string()));
        }
        serde_json::from_slice(payload)
            .map_err(|e| Error::Payment(format!("undecodable webhook payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTour, CreateUser};
    use crate::repository::Entity;

    fn gateway() -> LocalGateway {
        LocalGateway::with_parts(&PaymentConfig::default(), "http://localhost:3000")
    }

    fn tour() -> Tour {
        Tour::from_create(CreateTour {
            name: Some("The Forest Hiker".to_string()),
            price: Some(397.0),
            duration: Some(5),
            description: Some("Forest walk".to_string()),
            image_cover: Some("cover.jpg".to_string()),
            ..Default::default()
        })
    }

    fn user() -> User {
        User::from_create(CreateUser {
            name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            password: Some("password123".to_string()),
            password_confirm: Some("password123".to_string()),
        })
    }

    #[tokio::test]
    async fn session_reflects_tour_and_user() {
        let session = gateway()
            .create_checkout_session(&tour(), &user())
            .await
            .unwrap();
        assert!(session.id.starts_with("cs_"));
        assert!(session.url.contains(&session.id));
        assert_eq!(session.amount, 397.0);
        assert_eq!(session.customer_email, "alice@example.com");
    }

    #[test]
    fn webhook_roundtrip_verifies() {
        let gateway = gateway();
        let event = CheckoutEvent {
            tour: Uuid::now_v7(),
            user: Uuid::now_v7(),
            price: 397.0,
        };
        let payload = serde_json::to_vec(&event).unwrap();
        let signature = gateway.signature(&payload);

        let decoded = gateway.verify_webhook(&payload, &signature).unwrap();
        assert_eq!(decoded.tour, event.tour);
        assert_eq!(decoded.price, event.price);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let gateway = gateway();
        let payload = br#"{"tour":"x","user":"y","price":1.0}"#;
        let signature = gateway.signature(payload);

        let mut tampered = payload.to_vec();
        let last = tampered.len() - 4;
        tampered[last] = b'9';
        assert!(matches!(
            gateway.verify_webhook(&tampered, &signature),
            Err(Error::Payment(_))
        ));

        assert!(matches!(
            gateway.verify_webhook(payload, "not-hex"),
            Err(Error::Payment(_))
        ));
    }

    #[test]
    fn different_secrets_do_not_cross_verify() {
        let a = gateway();
        let b = LocalGateway::with_parts(
            &PaymentConfig {
                signing_secret: "other".to_string(),
                currency: "usd".to_string(),
            },
            "http://localhost:3000",
        );
        let payload = b"{}";
        let signature = a.signature(payload);
        assert!(b.verify_webhook(payload, &signature).is_err());
    }
}
