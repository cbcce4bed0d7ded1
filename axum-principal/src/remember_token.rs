//! The server-side half of a remember-me token.

use std::time::Duration;

use cookie::time::OffsetDateTime;
use ring::{
    constant_time,
    digest::{self, SHA256},
    rand::{SecureRandom, SystemRandom},
};

use crate::{Error, Result};

const TOKEN_BYTES: usize = 16;

/// A persisted remember token.
///
/// The `id` is the storage key and is not secret. Only the SHA-256 hash of
/// the validator is kept; the raw validator is handed to the client once, at
/// generation time, and never stored. Records are immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberToken {
    id: String,
    identity_subject: String,
    hashed_validator: String,
    expires_at: i64,
}

impl RememberToken {
    pub fn new(
        id: impl Into<String>,
        identity_subject: impl Into<String>,
        hashed_validator: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            identity_subject: identity_subject.into(),
            hashed_validator: hashed_validator.into(),
            expires_at,
        }
    }

    /// Generates a token for the subject, returning the record and the raw
    /// validator to deliver to the client.
    ///
    /// Fails with [`Error::Entropy`] if the system random source cannot
    /// supply bytes.
    pub fn generate(identity_subject: impl Into<String>, ttl: Duration) -> Result<(Self, String)> {
        Self::generate_at(identity_subject, ttl, unix_now())
    }

    /// Like [`generate`](Self::generate) with an explicit current time.
    pub fn generate_at(
        identity_subject: impl Into<String>,
        ttl: Duration,
        now: i64,
    ) -> Result<(Self, String)> {
        let rng = SystemRandom::new();
        let id = random_hex(&rng)?;
        let validator = random_hex(&rng)?;
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        let token = Self {
            id,
            identity_subject: identity_subject.into(),
            hashed_validator: hash_validator(&validator),
            expires_at: now.saturating_add(ttl),
        };

        Ok((token, validator))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity_subject(&self) -> &str {
        &self.identity_subject
    }

    pub fn hashed_validator(&self) -> &str {
        &self.hashed_validator
    }

    /// Expiry as a Unix timestamp, in seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Checks the presented validator against the stored hash in constant
    /// time.
    pub fn is_valid(&self, validator: &str) -> bool {
        let presented = hash_validator(validator);
        constant_time::verify_slices_are_equal(presented.as_bytes(), self.hashed_validator.as_bytes())
            .is_ok()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn random_hex(rng: &SystemRandom) -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|_| Error::Entropy)?;
    Ok(hex::encode(bytes))
}

fn hash_validator(validator: &str) -> String {
    hex::encode(digest::digest(&SHA256, validator.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn generated_token_validates_its_validator() {
        let (token, validator) = RememberToken::generate("12345", HOUR).unwrap();

        assert_eq!(validator.len(), 32);
        assert_eq!(token.id().len(), 32);
        assert_eq!(token.identity_subject(), "12345");
        assert!(token.is_valid(&validator));
    }

    #[test]
    fn raw_validator_is_not_stored() {
        let (token, validator) = RememberToken::generate("12345", HOUR).unwrap();

        assert_ne!(token.hashed_validator(), validator);
        assert_eq!(token.hashed_validator().len(), 64);
        assert_ne!(token.id(), validator);
    }

    #[test]
    fn other_validators_are_rejected() {
        let (token, validator) = RememberToken::generate("12345", HOUR).unwrap();
        let (_, other) = RememberToken::generate("12345", HOUR).unwrap();

        assert!(!token.is_valid(&other));
        assert!(!token.is_valid(""));
        assert!(!token.is_valid(&validator.to_uppercase()));
        assert!(!token.is_valid(token.hashed_validator()));
    }

    #[test]
    fn expires_once_clock_passes_expiry() {
        for ttl in [1, 60, 3600 * 24 * 7] {
            let now = 1_700_000_000;
            let (token, _) =
                RememberToken::generate_at("12345", Duration::from_secs(ttl), now).unwrap();

            assert!(!token.is_expired_at(now));
            assert!(!token.is_expired_at(token.expires_at()));
            assert!(token.is_expired_at(token.expires_at() + 1));
        }

        let (token, _) = RememberToken::generate("12345", HOUR).unwrap();
        assert!(!token.is_expired());
    }

    #[test]
    fn clock_is_unix_seconds() {
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let now = unix_now();

        assert!(now >= before && now <= before + 1);

        let (token, _) = RememberToken::generate("12345", HOUR).unwrap();
        assert!((token.expires_at() - now - 3600).abs() <= 1);
    }

    #[test]
    fn known_hash() {
        let token = RememberToken::new(
            "id",
            "subject",
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            0,
        );
        assert!(token.is_valid("hello"));
        assert!(token.is_expired());
    }
}
