//! Extractors for credentials carried by the `Authorization` header.

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;

use crate::{
    credentials::{BasicAuth, BearerToken, CredentialExtractor, Credentials},
    error::MissingCredentials,
    request::AuthRequest,
    Result,
};

fn authorization<'a>(request: &'a AuthRequest, scheme: &str) -> Result<&'a str, MissingCredentials> {
    let header = request
        .header(AUTHORIZATION)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| MissingCredentials::new("authorization header is not present"))?;

    header
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| {
            MissingCredentials::new(format!(
                "authorization header does not carry {scheme} credentials"
            ))
        })
}

/// Extracts [`BasicAuth`] from `Authorization: Basic <base64>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthExtractor;

#[async_trait]
impl CredentialExtractor for BasicAuthExtractor {
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let encoded = authorization(request, "Basic")?;
        Ok(Credentials::BasicAuth(BasicAuth::parse(encoded)?))
    }

    fn name(&self) -> &str {
        "basic"
    }
}

/// Extracts a [`BearerToken`] from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenExtractor;

#[async_trait]
impl CredentialExtractor for BearerTokenExtractor {
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let token = authorization(request, "Bearer")?;
        Ok(Credentials::BearerToken(BearerToken::new(token)))
    }

    fn name(&self) -> &str {
        "bearer"
    }
}
