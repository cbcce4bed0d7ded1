//! Axum extractors for what [`AuthLayer`](crate::AuthLayer) attaches to
//! requests.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::{principal::Principal, request::AuthRequest};

const AUTH_LAYER_MISSING: &str = "Auth extension missing. Is the auth layer installed?";

#[async_trait]
impl<State> FromRequestParts<State> for Principal
where
    State: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &State) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            tracing::error!("{}", AUTH_LAYER_MISSING);
            (StatusCode::INTERNAL_SERVER_ERROR, AUTH_LAYER_MISSING)
        })
    }
}

/// Hands handlers the request view, e.g. to pass on to
/// [`WebLoginAuthenticator::login`](crate::WebLoginAuthenticator::login).
#[async_trait]
impl<State> FromRequestParts<State> for AuthRequest
where
    State: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &State) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthRequest>().cloned().ok_or_else(|| {
            tracing::error!("{}", AUTH_LAYER_MISSING);
            (StatusCode::INTERNAL_SERVER_ERROR, AUTH_LAYER_MISSING)
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, Request};

    use super::*;
    use crate::{
        credentials::{BearerToken, Credentials},
        identity::Identity,
    };

    #[tokio::test]
    async fn extracts_attached_values() {
        let (mut parts, _) = Request::builder()
            .uri("/me")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(Principal::new(
            Identity::Subject("ferris".into()),
            Credentials::BearerToken(BearerToken::new("s3cr3t")),
        ));
        parts
            .extensions
            .insert(AuthRequest::new(Method::GET, "/me"));

        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(principal.identity().canonical(), "ferris");

        let request = AuthRequest::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(request.path(), "/me");
    }

    #[tokio::test]
    async fn rejects_without_auth_layer() {
        let (mut parts, _) = Request::new(()).into_parts();

        let rejection = Principal::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(AuthRequest::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }
}
