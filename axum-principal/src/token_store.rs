use async_trait::async_trait;

use crate::{remember_token::RememberToken, Result};

/// A trait which defines how remember tokens are persisted.
///
/// Stores are dumb key-value layers keyed by token id. Validation of the
/// validator hash and of the expiry date is performed by
/// [`RememberTokenAuthenticator`](crate::RememberTokenAuthenticator), never
/// by the store.
///
/// Operations on different ids must not interfere. Operations on the same id
/// should be serialized by the implementation.
#[async_trait]
pub trait RememberTokenStore: Clone + Send + Sync + 'static {
    /// Loads a token by id.
    ///
    /// Fails with [`Error::TokenNotFound`](crate::Error::TokenNotFound) when
    /// no record exists. Expired records are still returned.
    async fn retrieve(&self, id: &str) -> Result<RememberToken>;

    /// Persists a token.
    async fn store(&self, token: &RememberToken) -> Result<()>;

    /// Deletes a token. Removing a missing token is not an error.
    async fn remove(&self, token: &RememberToken) -> Result<()>;

    /// Deletes every expired token, returning how many were removed.
    ///
    /// A housekeeping sweep meant to run periodically, outside the request
    /// path.
    async fn clean_expired(&self) -> Result<usize>;
}
