//! Credential validation.
//!
//! [`MemoryDirectory`] keeps users in memory with Argon2id password hashes
//! (PHC strings) and accepts HS256 bearer tokens signed with a configured secret.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use futures::future::BoxFuture;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{Principal, UserId};

/// Credentials extracted from an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Validates credentials and resolves them to a [`Principal`].
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` means the credentials were well-formed but rejected.
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, StoreResult<Option<Principal>>>;
}

/// Claims carried by bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

struct UserRecord {
    principal: Principal,
    password_hash: String,
}

/// Hash a plaintext password with Argon2id and a random salt, as a PHC string.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> StoreResult<bool> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Verified for unknown usernames in place of a stored hash.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("lyra-unknown-user").ok());

/// In-memory user directory.
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    token_secret: Option<Vec<u8>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Directory accepting Basic credentials only.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            token_secret: None,
        }
    }

    /// Also accept bearer tokens signed with `secret`.
    #[must_use]
    pub fn with_token_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.token_secret = Some(secret.into());
        self
    }

    /// Register (or replace) a user.
    pub fn add_user(
        &self,
        id: UserId,
        username: &str,
        password: &str,
        admin: bool,
    ) -> StoreResult<Principal> {
        let password_hash = hash_password(password)?;
        let principal = Principal {
            id,
            username: username.to_string(),
            admin,
        };
        self.users.write().insert(
            username.to_string(),
            UserRecord {
                principal: principal.clone(),
                password_hash,
            },
        );
        Ok(principal)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Issue a bearer token for `username`, valid for `ttl`.
    pub fn issue_token(&self, username: &str, ttl: Duration) -> StoreResult<String> {
        let secret = self
            .token_secret
            .as_deref()
            .ok_or_else(|| StoreError::invalid("bearer tokens are not enabled"))?;
        if !self.users.read().contains_key(username) {
            return Err(StoreError::not_found(format!("user {username}")));
        }
        let exp = SystemTime::now()
            .checked_add(ttl)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
        let claims = TokenClaims {
            sub: username.to_string(),
            exp,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )?)
    }

    fn check_password(&self, username: &str, password: &str) -> StoreResult<Option<Principal>> {
        let stored = self
            .users
            .read()
            .get(username)
            .map(|record| (record.principal.clone(), record.password_hash.clone()));
        let Some((principal, hash)) = stored else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(password, dummy)?;
            }
            debug!(user = %username, "Rejected unknown user");
            return Ok(None);
        };
        Ok(verify_password(password, &hash)?.then_some(principal))
    }

    fn check_token(&self, token: &str) -> Option<Principal> {
        let secret = self.token_secret.as_deref()?;
        let claims = match jsonwebtoken::decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(secret),
            &Validation::new(Algorithm::HS256),
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                return None;
            }
        };
        self.users
            .read()
            .get(&claims.sub)
            .map(|record| record.principal.clone())
    }
}

impl Authenticator for MemoryDirectory {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, StoreResult<Option<Principal>>> {
        Box::pin(async move {
            match credentials {
                Credentials::Basic { username, password } => {
                    self.check_password(username, password)
                }
                Credentials::Bearer(token) => Ok(self.check_token(token)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(username: &str, password: &str) -> Credentials {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_basic_credentials() {
        let dir = MemoryDirectory::new();
        dir.add_user(UserId(1), "alice", "secret", false).unwrap();

        let principal = dir.authenticate(&basic("alice", "secret")).await.unwrap();
        assert_eq!(principal.map(|p| p.id), Some(UserId(1)));

        assert!(dir.authenticate(&basic("alice", "wrong")).await.unwrap().is_none());
        assert!(dir.authenticate(&basic("bob", "secret")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bearer_tokens() {
        let dir = MemoryDirectory::new().with_token_secret("sekrit");
        dir.add_user(UserId(2), "bob", "pw", true).unwrap();

        let token = dir.issue_token("bob", Duration::from_secs(600)).unwrap();
        let principal = dir
            .authenticate(&Credentials::Bearer(token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(principal.username, "bob");
        assert!(principal.admin);

        let forged = Credentials::Bearer("not.a.token".into());
        assert!(dir.authenticate(&forged).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bearer_disabled_without_secret() {
        let dir = MemoryDirectory::new();
        dir.add_user(UserId(3), "carol", "pw", false).unwrap();
        assert!(dir.issue_token("carol", Duration::from_secs(60)).is_err());
        let creds = Credentials::Bearer("anything".into());
        assert!(dir.authenticate(&creds).await.unwrap().is_none());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2id$"), "expected argon2id PHC prefix");
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("wrong-horse", &hash).unwrap());
        assert!(verify_password("x", "not a phc string").is_err());
    }

    #[test]
    fn test_salts_differ_per_hash() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_user_still_verifies_dummy_hash() {
        assert!(DUMMY_HASH.is_some());
        let dir = MemoryDirectory::new();
        dir.add_user(UserId(4), "dave", "pw", false).unwrap();
        assert!(dir.authenticate(&basic("nobody", "pw")).await.unwrap().is_none());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", basic("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
