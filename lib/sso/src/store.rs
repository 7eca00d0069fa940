//! Collaborators the flow depends on: the user store and the session signer.

use crate::error::StoreError;
use crate::user::LocalUser;
use async_trait::async_trait;
use fedgate_core::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persistence for local accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up the account linked to an external identifier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no account is linked, `Backend` otherwise.
    async fn get_user_by_sso_id(&self, sso_id: &str) -> Result<LocalUser, StoreError>;

    /// Persists a new account.
    ///
    /// # Errors
    ///
    /// Returns `UsernameTaken` when the username collides with an existing
    /// account, `SsoIdTaken` when another account is already linked to the
    /// same non-empty external identifier, `Backend` for any other failure.
    async fn create_user(&self, user: &LocalUser) -> Result<(), StoreError>;
}

/// Mints session tokens for local accounts.
#[async_trait]
pub trait SessionSigner: Send + Sync {
    /// Issues a token the host service will accept as a login.
    ///
    /// # Errors
    ///
    /// Returns `Backend` when the token cannot be issued.
    async fn generate_token(&self, user: &LocalUser) -> Result<String, StoreError>;
}

/// In-memory user store with unique usernames and linked identifiers.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<LocalUser>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `users`.
    #[must_use]
    pub fn with_users(users: Vec<LocalUser>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }

    /// Returns the number of stored accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the account with the given username, if any.
    #[must_use]
    pub fn find_by_username(&self, username: &str) -> Option<LocalUser> {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|u| u.username() == username)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user_by_sso_id(&self, sso_id: &str) -> Result<LocalUser, StoreError> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .iter()
            .find(|u| !u.sso_id().is_empty() && u.sso_id() == sso_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound.into())
    }

    async fn create_user(&self, user: &LocalUser) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.iter().any(|u| u.username() == user.username()) {
            return Err(StoreError::UsernameTaken {
                username: user.username().to_string(),
            }
            .into());
        }
        if !user.sso_id().is_empty() && users.iter().any(|u| u.sso_id() == user.sso_id()) {
            return Err(StoreError::SsoIdTaken {
                sso_id: user.sso_id().to_string(),
            }
            .into());
        }
        users.push(user.clone());
        Ok(())
    }
}

/// Session signer that keeps issued tokens in memory.
#[derive(Debug, Default)]
pub struct MemorySessionSigner {
    issued: Mutex<HashMap<String, fedgate_core::UserId>>,
}

impl MemorySessionSigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account a token was issued to.
    #[must_use]
    pub fn user_for(&self, token: &str) -> Option<fedgate_core::UserId> {
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .copied()
    }

    /// Returns how many tokens have been issued.
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl SessionSigner for MemorySessionSigner {
    async fn generate_token(&self, user: &LocalUser) -> Result<String, StoreError> {
        let token = fedgate_core::SessionId::new().to_string();
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), user.id());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, sso_id: &str) -> LocalUser {
        LocalUser::new(
            username.to_string(),
            "placeholder".to_string(),
            0,
            "/".to_string(),
            sso_id.to_string(),
        )
    }

    #[tokio::test]
    async fn lookup_by_sso_id() {
        let store = MemoryUserStore::with_users(vec![user("alice", "ext1")]);
        let found = store.get_user_by_sso_id("ext1").await.expect("found");
        assert_eq!(found.username(), "alice");
    }

    #[tokio::test]
    async fn missing_sso_id_is_not_found() {
        let store = MemoryUserStore::with_users(vec![user("admin", "")]);
        for id in ["ext1", ""] {
            let err = store.get_user_by_sso_id(id).await.unwrap_err();
            assert_eq!(err.current_context(), &StoreError::NotFound);
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryUserStore::new();
        store.create_user(&user("alice", "ext1")).await.expect("first");
        let err = store.create_user(&user("alice", "ext2")).await.unwrap_err();
        assert_eq!(
            err.current_context(),
            &StoreError::UsernameTaken {
                username: "alice".to_string()
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_sso_id_is_rejected() {
        let store = MemoryUserStore::new();
        store.create_user(&user("alice", "ext1")).await.expect("first");
        let err = store
            .create_user(&user("alice_ext1", "ext1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &StoreError::SsoIdTaken {
                sso_id: "ext1".to_string()
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unlinked_accounts_may_share_empty_sso_id() {
        let store = MemoryUserStore::new();
        store.create_user(&user("admin", "")).await.expect("admin");
        store.create_user(&user("guest", "")).await.expect("guest");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn signer_tracks_issued_tokens() {
        let signer = MemorySessionSigner::new();
        let alice = user("alice", "ext1");
        let token = signer.generate_token(&alice).await.expect("token");
        assert_eq!(signer.user_for(&token), Some(alice.id()));
        assert_eq!(signer.issued_count(), 1);
    }
}
