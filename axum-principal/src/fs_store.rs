//! A filesystem implementation of `RememberTokenStore`.

use std::{io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::fs;

use crate::{
    error::TokenNotFound,
    remember_token::{unix_now, RememberToken},
    token_store::RememberTokenStore,
    Error, Result,
};

/// Stores remember tokens as files in a local directory.
///
/// Each token lives in a file named after its id, holding the identity
/// subject, the hashed validator and the expiry timestamp on three lines.
///
/// Good enough for low traffic applications deployed on a single server.
/// Horizontally scaled deployments want a shared store instead.
///
/// Writes are not atomic and nothing serializes operations on the same id, so
/// a logout racing [`clean_expired`](RememberTokenStore::clean_expired) may
/// observe a half-written or vanished file.
#[derive(Clone, Debug)]
pub struct LocalFsStore {
    directory: Arc<PathBuf>,
}

impl LocalFsStore {
    /// Opens a store rooted at `directory`, creating it if needed.
    pub async fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;

        Ok(Self {
            directory: Arc::new(directory),
        })
    }

    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }

    // Ids come from client cookies; anything but hex could escape the
    // directory.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        is_token_id(id).then(|| self.directory.join(id))
    }
}

fn is_token_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_hexdigit())
}

fn encode(token: &RememberToken) -> Result<String> {
    if token.identity_subject().contains('\n') {
        return Err(Error::CorruptToken(token.id().to_owned()));
    }

    Ok(format!(
        "{}\n{}\n{}",
        token.identity_subject(),
        token.hashed_validator(),
        token.expires_at()
    ))
}

fn decode(id: &str, contents: &str) -> Result<RememberToken> {
    let corrupt = || Error::CorruptToken(id.to_owned());

    let mut fields = contents.splitn(3, '\n');
    let (Some(subject), Some(hashed_validator), Some(expires_at)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(corrupt());
    };
    let expires_at = expires_at.trim().parse().map_err(|_| corrupt())?;

    Ok(RememberToken::new(id, subject, hashed_validator, expires_at))
}

#[async_trait]
impl RememberTokenStore for LocalFsStore {
    async fn retrieve(&self, id: &str) -> Result<RememberToken> {
        let path = self.path_for(id).ok_or_else(|| TokenNotFound::new(id))?;

        match fs::read_to_string(&path).await {
            Ok(contents) => decode(id, &contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(TokenNotFound::new(id).into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, token: &RememberToken) -> Result<()> {
        let path = self
            .path_for(token.id())
            .ok_or_else(|| Error::CorruptToken(token.id().to_owned()))?;
        fs::write(path, encode(token)?).await?;

        Ok(())
    }

    async fn remove(&self, token: &RememberToken) -> Result<()> {
        let Some(path) = self.path_for(token.id()) else {
            return Ok(());
        };

        match fs::remove_file(path).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    async fn clean_expired(&self) -> Result<usize> {
        let now = unix_now();
        let mut removed = 0;

        let mut entries = fs::read_dir(&*self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(id) = entry.file_name().into_string().ok().filter(|id| is_token_id(id)) else {
                continue;
            };

            let token = match self.retrieve(&id).await {
                Ok(token) => token,
                Err(Error::TokenNotFound(_)) => continue,
                Err(err) => {
                    tracing::warn!(token.id = %id, "skipping unreadable remember token: {}", err);
                    continue;
                }
            };

            if token.is_expired_at(now) {
                self.remove(&token).await?;
                removed += 1;
            }
        }

        tracing::debug!(removed, "cleaned expired remember tokens");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn store() -> (tempfile::TempDir, LocalFsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path().join("tokens")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn writes_one_file_per_token() {
        let (_dir, store) = store().await;
        let (token, _) = RememberToken::generate("alice", Duration::from_secs(60)).unwrap();

        store.store(&token).await.unwrap();

        let contents = std::fs::read_to_string(store.directory().join(token.id())).unwrap();
        assert_eq!(
            contents,
            format!(
                "alice\n{}\n{}",
                token.hashed_validator(),
                token.expires_at()
            )
        );
        assert_eq!(store.retrieve(token.id()).await.unwrap(), token);
    }

    #[tokio::test]
    async fn missing_and_hostile_ids_are_not_found() {
        let (_dir, store) = store().await;

        for id in ["abcdef", "../tokens", "", "/etc/passwd"] {
            assert!(
                matches!(store.retrieve(id).await, Err(Error::TokenNotFound(_))),
                "{id}"
            );
        }
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let (_dir, store) = store().await;
        let (token, _) = RememberToken::generate("alice", Duration::from_secs(60)).unwrap();

        store.store(&token).await.unwrap();
        store.remove(&token).await.unwrap();
        store.remove(&token).await.unwrap();

        assert!(matches!(
            store.retrieve(token.id()).await,
            Err(Error::TokenNotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_records_are_reported() {
        let (_dir, store) = store().await;
        std::fs::write(store.directory().join("abcd"), "alice\nhash").unwrap();

        assert!(matches!(
            store.retrieve("abcd").await,
            Err(Error::CorruptToken(_))
        ));
        assert!(store
            .store(&RememberToken::new("abcd", "al\nice", "hash", 0))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn cleans_expired_tokens_only() {
        let (_dir, store) = store().await;
        let expired = RememberToken::new("0a", "alice", "hash", 0);
        let (fresh, _) = RememberToken::generate("bob", Duration::from_secs(60)).unwrap();
        store.store(&expired).await.unwrap();
        store.store(&fresh).await.unwrap();
        std::fs::write(store.directory().join("README"), "not a token").unwrap();

        assert_eq!(store.clean_expired().await.unwrap(), 1);
        assert!(store.retrieve("0a").await.is_err());
        assert_eq!(store.retrieve(fresh.id()).await.unwrap(), fresh);
        assert!(store.directory().join("README").exists());
    }
}
