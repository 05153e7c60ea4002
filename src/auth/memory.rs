//! In-process stores for tests and local experiments.
//!
//! Each store guards its map with a single lock so compound operations such
//! as [`RefreshTokenStore::rotate`] are atomic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::auth::refresh_store::{RefreshTokenRecord, RefreshTokenStore, hash_token};
use crate::auth::users::{CredentialStore, User};
use crate::auth::{AuthError, AuthResult};

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user, as an external account deletion would.
    pub fn remove(&self, id: Uuid) -> Option<User> {
        self.users.lock().remove(&id)
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> AuthResult<User> {
        let mut users = self.users.lock();
        if users.values().any(|user| user.username == username) {
            return Err(AuthError::UsernameTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.lock().get(&id).cloned())
    }
}

#[derive(Debug, Clone)]
struct StoredToken {
    token_hash: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<Uuid, StoredToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

fn stored(record: &RefreshTokenRecord) -> StoredToken {
    StoredToken {
        token_hash: hash_token(&record.token),
        expires_at: record.expires_at,
    }
}

#[rocket::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn replace(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        self.tokens.lock().insert(record.user_id, stored(record));
        Ok(())
    }

    async fn rotate(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
    ) -> AuthResult<bool> {
        let mut tokens = self.tokens.lock();
        let live = tokens.get(&replacement.user_id).is_some_and(|current| {
            current.token_hash == hash_token(presented) && current.expires_at > Utc::now()
        });
        if live {
            tokens.insert(replacement.user_id, stored(replacement));
        }
        Ok(live)
    }

    async fn contains(&self, user_id: Uuid, token: &str) -> AuthResult<bool> {
        Ok(self.tokens.lock().get(&user_id).is_some_and(|current| {
            current.token_hash == hash_token(token) && current.expires_at > Utc::now()
        }))
    }

    async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.tokens.lock().remove(&user_id).map_or(0, |_| 1))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(user_id: Uuid, token: &str, ttl: Duration) -> RefreshTokenRecord {
        RefreshTokenRecord {
            user_id,
            token: token.to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = MemoryCredentialStore::new();
        store.create_user("alice", "hash").await.expect("first insert");
        let err = store.create_user("alice", "hash").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn replace_keeps_only_latest_token() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace(&record(user_id, "first", Duration::minutes(5)))
            .await
            .expect("replace");
        store
            .replace(&record(user_id, "second", Duration::minutes(5)))
            .await
            .expect("replace");

        assert!(!store.contains(user_id, "first").await.expect("contains"));
        assert!(store.contains(user_id, "second").await.expect("contains"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn rotate_consumes_exactly_once() {
        let store = MemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace(&record(user_id, "old", Duration::minutes(5)))
            .await
            .expect("replace");

        let next = record(user_id, "new", Duration::minutes(5));
        assert!(store.rotate("old", &next).await.expect("rotate"));
        assert!(!store.rotate("old", &next).await.expect("rotate"));
        assert!(store.contains(user_id, "new").await.expect("contains"));
    }

    #[tokio::test]
    async fn purge_drops_expired_rows() {
        let store = MemoryRefreshTokenStore::new();
        store
            .replace(&record(Uuid::new_v4(), "stale", Duration::minutes(-1)))
            .await
            .expect("replace");
        store
            .replace(&record(Uuid::new_v4(), "fresh", Duration::minutes(5)))
            .await
            .expect("replace");

        assert_eq!(store.purge_expired(Utc::now()).await.expect("purge"), 1);
        assert_eq!(store.len(), 1);
    }
}
