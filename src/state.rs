//! Shared application state
//!
//! One `AppState` is built at startup from configuration and cloned into
//! every handler. It owns the document store, the typed repositories with
//! their hooks and base filters, and the external collaborators (mailer,
//! payment gateway, image sink). Tests swap collaborators through the
//! builder.

use std::sync::Arc;

use crate::auth::{PasswordConfig, PasswordHasher, TokenKeys};
use crate::config::Config;
use crate::domain::{Booking, PasswordHook, RatingsHook, Review, SlugHook, Tour, User};
use crate::error::Result;
use crate::mail::{EmailComposer, LogMailer, Mailer};
use crate::middleware::ClientRateLimit;
use crate::payments::{LocalGateway, PaymentGateway};
use crate::query::FilterCondition;
use crate::repository::{Entity, Repository};
use crate::store::DocumentStore;
use crate::uploads::{DiskImageSink, ImageSink};

/// Access to the repository for a given entity type
///
/// The generic CRUD handlers are parameterized over this, so one handler
/// body serves every entity the state can produce a repository for.
pub trait HasRepository<E: Entity> {
    fn repository(&self) -> &Repository<E>;
}

struct AppStateInner {
    config: Config,
    store: DocumentStore,
    tours: Repository<Tour>,
    users: Repository<User>,
    reviews: Repository<Review>,
    bookings: Repository<Booking>,
    hasher: PasswordHasher,
    tokens: TokenKeys,
    composer: EmailComposer,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
    images: Arc<dyn ImageSink>,
    rate_limit: ClientRateLimit,
}

/// Cloneable handle on the application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    /// State with the default collaborators for the given configuration
    pub fn new(config: Config) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    pub fn tours(&self) -> &Repository<Tour> {
        &self.inner.tours
    }

    pub fn users(&self) -> &Repository<User> {
        &self.inner.users
    }

    pub fn reviews(&self) -> &Repository<Review> {
        &self.inner.reviews
    }

    pub fn bookings(&self) -> &Repository<Booking> {
        &self.inner.bookings
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.inner.hasher
    }

    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    pub fn composer(&self) -> &EmailComposer {
        &self.inner.composer
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }

    pub fn images(&self) -> &dyn ImageSink {
        self.inner.images.as_ref()
    }

    pub fn rate_limit(&self) -> &ClientRateLimit {
        &self.inner.rate_limit
    }
}

impl HasRepository<Tour> for AppState {
    fn repository(&self) -> &Repository<Tour> {
        &self.inner.tours
    }
}

impl HasRepository<User> for AppState {
    fn repository(&self) -> &Repository<User> {
        &self.inner.users
    }
}

impl HasRepository<Review> for AppState {
    fn repository(&self) -> &Repository<Review> {
        &self.inner.reviews
    }
}

impl HasRepository<Booking> for AppState {
    fn repository(&self) -> &Repository<Booking> {
        &self.inner.bookings
    }
}

/// Builder for [`AppState`], with collaborator overrides for tests
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    mailer: Option<Arc<dyn Mailer>>,
    payments: Option<Arc<dyn PaymentGateway>>,
    images: Option<Arc<dyn ImageSink>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(payments);
        self
    }

    #[must_use]
    pub fn images(mut self, images: Arc<dyn ImageSink>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();
        let store = DocumentStore::new();

        let tours_collection = store.collection(Tour::COLLECTION);
        let users_collection = store.collection(User::COLLECTION);
        let reviews_collection = store.collection(Review::COLLECTION);
        let bookings_collection = store.collection(Booking::COLLECTION);
        users_collection.ensure_unique("email");

        let hasher = PasswordHasher::new(PasswordConfig::from(&config.auth));
        let tokens = TokenKeys::from_config(&config.auth);

        // Hidden tours and deactivated users never resolve through reads.
        let tours = Repository::new(tours_collection.clone())
            .with_base_filter(FilterCondition::ne("secret_tour", true))
            .with_save_hook(Arc::new(SlugHook));
        let users = Repository::new(users_collection)
            .with_base_filter(FilterCondition::ne("active", false))
            .with_save_hook(Arc::new(PasswordHook::new(hasher.clone())));
        let reviews = Repository::new(reviews_collection.clone()).with_commit_hook(Arc::new(
            RatingsHook::new(reviews_collection, tours_collection),
        ));
        let bookings = Repository::new(bookings_collection);

        let composer = EmailComposer::new(&config.mail);
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer));
        let payments = self
            .payments
            .unwrap_or_else(|| Arc::new(LocalGateway::new(&config)));
        let images = self
            .images
            .unwrap_or_else(|| Arc::new(DiskImageSink::new(config.uploads.dir.clone())));
        let rate_limit = ClientRateLimit::new(&config.rate_limit);

        Ok(AppState {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tours,
                users,
                reviews,
                bookings,
                hasher,
                tokens,
                composer,
                mailer,
                payments,
                images,
                rate_limit,
            }),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_state;
    use crate::domain::{CreateUser, User};
    use crate::query::FilterCondition;
    use crate::repository::Entity;

    #[tokio::test]
    async fn users_get_hashed_passwords_and_unique_emails() {
        let state = test_state();
        let user = state
            .users()
            .create(User::from_create(CreateUser {
                name: Some("Alice".to_string()),
                email: Some("alice@example.com".to_string()),
                password: Some("password123".to_string()),
                password_confirm: Some("password123".to_string()),
            }))
            .await
            .unwrap();
        assert!(user.password.starts_with("$argon2id$"));

        let err = state
            .users()
            .create(User::from_create(CreateUser {
                name: Some("Alice Again".to_string()),
                email: Some("alice@example.com".to_string()),
                password: Some("password123".to_string()),
                password_confirm: Some("password123".to_string()),
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[tokio::test]
    async fn deactivated_users_stop_resolving() {
        let state = test_state();
        let user = state
            .users()
            .create(User::from_create(CreateUser {
                name: Some("Bob".to_string()),
                email: Some("bob@example.com".to_string()),
                password: Some("password123".to_string()),
                password_confirm: Some("password123".to_string()),
            }))
            .await
            .unwrap();

        let patch = serde_json::json!({"active": false});
        state
            .users()
            .update(&user.id, patch.as_object().cloned().unwrap())
            .await
            .unwrap();

        assert!(state.users().find_by_id(&user.id).await.unwrap().is_none());
        assert!(state
            .users()
            .find_one(&[FilterCondition::eq("email", "bob@example.com")])
            .await
            .unwrap()
            .is_none());
    }
}
