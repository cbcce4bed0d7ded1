//! An in-memory implementation of `RememberTokenStore`.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::TokenNotFound,
    remember_token::{unix_now, RememberToken},
    token_store::RememberTokenStore,
    Result,
};

/// An ephemeral store, useful for testing and demonstration purposes.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, RememberToken>>>,
}

impl MemoryStore {
    /// Creates a new memory store.
    ///
    /// ```rust
    /// use std::{collections::HashMap, sync::Arc};
    ///
    /// use axum_principal::memory_store::MemoryStore;
    /// use tokio::sync::RwLock;
    ///
    /// let inner = Arc::new(RwLock::new(HashMap::new()));
    /// let memory_store = MemoryStore::new(&inner);
    /// ```
    pub fn new(inner: &Arc<RwLock<HashMap<String, RememberToken>>>) -> Self {
        Self {
            inner: inner.clone(),
        }
    }
}

#[async_trait]
impl RememberTokenStore for MemoryStore {
    async fn retrieve(&self, id: &str) -> Result<RememberToken> {
        self.inner
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TokenNotFound::new(id).into())
    }

    async fn store(&self, token: &RememberToken) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(token.id().to_owned(), token.clone());
        Ok(())
    }

    async fn remove(&self, token: &RememberToken) -> Result<()> {
        self.inner.write().await.remove(token.id());
        Ok(())
    }

    async fn clean_expired(&self) -> Result<usize> {
        let now = unix_now();
        let mut tokens = self.inner.write().await;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired_at(now));
        Ok(before - tokens.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn stores_retrieves_and_removes() {
        let inner = Arc::new(RwLock::new(HashMap::new()));
        let store = MemoryStore::new(&inner);
        let token = RememberToken::new("aa", "alice", "hash", i64::MAX);

        assert!(matches!(store.retrieve("aa").await, Err(Error::TokenNotFound(_))));

        store.store(&token).await.unwrap();
        assert_eq!(store.retrieve("aa").await.unwrap(), token);
        assert_eq!(inner.read().await.len(), 1);

        store.remove(&token).await.unwrap();
        store.remove(&token).await.unwrap();
        assert!(inner.read().await.is_empty());
    }

    #[tokio::test]
    async fn retrieval_does_not_check_expiry() {
        let store = MemoryStore::default();
        let expired = RememberToken::new("aa", "alice", "hash", 0);
        store.store(&expired).await.unwrap();

        assert_eq!(store.retrieve("aa").await.unwrap(), expired);
    }

    #[tokio::test]
    async fn cleans_expired_tokens_only() {
        let store = MemoryStore::default();
        store
            .store(&RememberToken::new("aa", "alice", "hash", 0))
            .await
            .unwrap();
        store
            .store(&RememberToken::new("bb", "bob", "hash", i64::MAX))
            .await
            .unwrap();

        assert_eq!(store.clean_expired().await.unwrap(), 1);
        assert!(store.retrieve("aa").await.is_err());
        assert!(store.retrieve("bb").await.is_ok());
    }
}
