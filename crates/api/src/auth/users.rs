//! User registration and credential verification
//!
//! [`CredentialStore`] owns the registration and login rules. Persistence sits
//! behind the [`UserStore`] port so the same rules run against Postgres in
//! production and an in-memory map in tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::password::{self, PasswordError, MAX_PASSWORD_BYTES};

pub const MAX_USERNAME_CHARS: usize = 64;

/// Registered account
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Unique, compared case-sensitively
    pub username: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("username already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence port for user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Must fail with [`UserStoreError::Duplicate`] when the
    /// username is taken, atomically with the insert.
    async fn insert(&self, user: &User) -> Result<(), UserStoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError>;
}

/// Postgres-backed store; uniqueness comes from the `users_username_key` constraint
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> Result<(), UserStoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// A unique violation on insert means the username is taken
fn insert_error(err: sqlx::Error) -> UserStoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => UserStoreError::Duplicate,
        other => UserStoreError::Database(other),
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), UserStoreError> {
        let mut users = self.users.lock().await;
        match users.entry(user.username.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => Err(UserStoreError::Duplicate),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.lock().await.get(username).cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("username already exists")]
    DuplicateUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    InvalidInput(String),
    #[error("user store failure: {0}")]
    Store(UserStoreError),
    #[error("password hashing failure: {0}")]
    Hashing(String),
}

impl From<UserStoreError> for CredentialError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Duplicate => CredentialError::DuplicateUser,
            other => CredentialError::Store(other),
        }
    }
}

impl From<PasswordError> for CredentialError {
    fn from(err: PasswordError) -> Self {
        CredentialError::Hashing(err.to_string())
    }
}

/// Registration and login rules over a [`UserStore`]
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryUserStore::new()))
    }

    /// Register a new user, returning its id
    pub async fn register(&self, username: &str, password: &str) -> Result<Uuid, CredentialError> {
        validate_username(username)?;
        validate_password(password)?;

        let password_hash = hash_blocking(password.to_string()).await?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            created_at: OffsetDateTime::now_utc(),
        };

        self.store.insert(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.id)
    }

    /// Return the user when the username exists and the password matches.
    ///
    /// Unknown username and wrong password both yield
    /// [`CredentialError::InvalidCredentials`] after the same hashing work.
    pub async fn verify(&self, username: &str, password: &str) -> Result<User, CredentialError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(CredentialError::InvalidCredentials);
        }

        let user = self.store.find_by_username(username).await?;
        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => dummy_hash()?,
        };

        let matches = verify_blocking(password.to_string(), stored_hash).await?;
        match user {
            Some(user) if matches => Ok(user),
            _ => Err(CredentialError::InvalidCredentials),
        }
    }
}

fn validate_username(username: &str) -> Result<(), CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::InvalidInput("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(CredentialError::InvalidInput(format!(
            "Username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.trim() != username || username.chars().any(char::is_control) {
        return Err(CredentialError::InvalidInput(
            "Username must not contain control characters or surrounding whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Err(CredentialError::InvalidInput("Password is required".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CredentialError::InvalidInput(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Hash compared against when the username is unknown
fn dummy_hash() -> Result<String, CredentialError> {
    password::generate_impossible_hash()
        .map(str::to_string)
        .ok_or_else(|| CredentialError::Hashing("dummy hash unavailable".into()))
}

async fn hash_blocking(password: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
        .map_err(CredentialError::from)
}

async fn verify_blocking(password: String, stored_hash: String) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || {
        password::verify_password(&password, &stored_hash)
    })
    .await
    .map_err(|e| CredentialError::Hashing(e.to_string()))?
    .map_err(CredentialError::from)
}
