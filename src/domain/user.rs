//! User entity
//!
//! The stored document carries the Argon2id password hash and the reset
//! token state; none of those fields ever leave the service. Deactivated
//! users are hidden from every read by the repository's base filter, so a
//! "deleted" account simply stops resolving.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::PasswordHasher;
use crate::repository::{Entity, RepositoryError, RepositoryResult, SaveHook};
use crate::store::{new_document_id, Document};

/// Authorization roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    #[default]
    User,
    LeadGuide,
    Guide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Argon2id hash in PHC string format; plaintext only transits through
    /// the pre-save hook
    pub password: String,
    #[serde(default)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_reset_token: Option<String>,
    #[serde(default)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether a token issued at `issued_at` predates a later password
    /// change and must be rejected.
    pub fn changed_password_after(&self, issued_at: DateTime<Utc>) -> bool {
        match self.password_changed_at {
            Some(changed_at) => issued_at < changed_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const TYPE_NAME: &'static str = "User";
    type Create = CreateUser;
    type Update = UpdateUser;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(create: Self::Create) -> Self {
        Self {
            id: new_document_id(),
            name: create.name.unwrap_or_default(),
            email: create.email.unwrap_or_default().to_lowercase(),
            photo: None,
            role: Role::User,
            password: create.password.unwrap_or_default(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if self.name.is_empty() {
            violations.push("Please tell us your name".to_string());
        }
        if !is_plausible_email(&self.email) {
            violations.push("Please provide a valid email".to_string());
        }
        if self.password.is_empty() {
            violations.push("Please provide a password".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn redact(doc: &mut Document) {
        doc.remove("password");
        doc.remove("password_reset_token");
        doc.remove("password_reset_expires");
    }
}

/// What the API returns for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Hash the password whenever a plaintext one is about to be persisted.
///
/// On updates the change timestamp is backdated by a second so a token
/// minted in the same instant still fails the changed-after check.
pub struct PasswordHook {
    hasher: PasswordHasher,
}

impl PasswordHook {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self { hasher }
    }
}

#[async_trait]
impl SaveHook<User> for PasswordHook {
    async fn before_save(&self, user: &mut User, is_new: bool) -> RepositoryResult<()> {
        if user.password.starts_with("$argon2") {
            return Ok(());
        }
        let hash = self
            .hasher
            .hash(&user.password)
            .map_err(|e| RepositoryError::validation_failed(e.public_message()))?;
        user.password = hash;
        if !is_new {
            user.password_changed_at = Some(Utc::now() - Duration::seconds(1));
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, host)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordConfig;

    fn create(name: &str, email: &str, password: &str) -> CreateUser {
        CreateUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            password_confirm: Some(password.to_string()),
        }
    }

    #[test]
    fn email_is_lowercased_on_create() {
        let user = User::from_create(create("Alice", "Alice@Example.COM", "password123"));
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::User);
        assert!(user.active);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn validation_collects_violations() {
        let user = User::from_create(CreateUser::default());
        let violations = user.validate().unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations[0].contains("name"));
        assert!(violations[1].contains("email"));
        assert!(violations[2].contains("password"));
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("missing-at.example.com"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("a@nodot"));
        assert!(!is_plausible_email("a@.com"));
    }

    #[test]
    fn changed_password_after_compares_timestamps() {
        let mut user = User::from_create(create("Alice", "a@b.co", "password123"));
        let issued_at = Utc::now();
        assert!(!user.changed_password_after(issued_at));

        user.password_changed_at = Some(issued_at + Duration::seconds(5));
        assert!(user.changed_password_after(issued_at));

        user.password_changed_at = Some(issued_at - Duration::seconds(5));
        assert!(!user.changed_password_after(issued_at));
    }

    #[test]
    fn role_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Role::LeadGuide).unwrap(),
            "\"lead-guide\""
        );
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }

    #[test]
    fn redact_strips_credentials() {
        let user = User::from_create(create("Alice", "a@b.co", "password123"));
        let mut doc = serde_json::to_value(&user)
            .unwrap()
            .as_object()
            .unwrap()
            .clone();
        User::redact(&mut doc);
        assert!(doc.get("password").is_none());
        assert!(doc.get("password_reset_token").is_none());
        assert!(doc.get("name").is_some());
    }

    #[tokio::test]
    async fn password_hook_hashes_plaintext_once() {
        let hasher = PasswordHasher::new(PasswordConfig::fast_for_tests());
        let hook = PasswordHook::new(hasher.clone());
        let mut user = User::from_create(create("Alice", "a@b.co", "password123"));

        hook.before_save(&mut user, true).await.unwrap();
        assert!(user.password.starts_with("$argon2id$"));
        assert!(user.password_changed_at.is_none());
        assert!(hasher.verify("password123", &user.password).unwrap());

        // Already-hashed passwords pass through untouched
        let hashed = user.password.clone();
        hook.before_save(&mut user, false).await.unwrap();
        assert_eq!(user.password, hashed);
        assert!(user.password_changed_at.is_none());
    }

    #[tokio::test]
    async fn password_hook_stamps_change_time_on_update() {
        let hook = PasswordHook::new(PasswordHasher::new(PasswordConfig::fast_for_tests()));
        let mut user = User::from_create(create("Alice", "a@b.co", "password123"));
        user.password = "new-password-42".to_string();

        hook.before_save(&mut user, false).await.unwrap();
        assert!(user.password_changed_at.is_some());
    }

    #[tokio::test]
    async fn password_hook_rejects_short_passwords() {
        let hook = PasswordHook::new(PasswordHasher::new(PasswordConfig::fast_for_tests()));
        let mut user = User::from_create(create("Alice", "a@b.co", "short"));
        let err = hook.before_save(&mut user, true).await.unwrap_err();
        assert!(err.message.contains("at least 8 characters"));
    }
}
