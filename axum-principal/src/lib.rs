//! Credential extraction and identity resolution for Axum.
//!
//! This crate provides a Tower middleware which answers, for every request,
//! "who is making this request and how do we know". The answer is a
//! [`Principal`]: the [`Credentials`] the client presented together with the
//! [`Identity`] they resolved to. A principal is always attached, possibly
//! with [`Credentials::Void`] and [`Identity::Anonymous`], so handlers decide
//! for themselves what an anonymous visitor may do.
//!
//! Resolution is split into two composable kinds of strategies:
//!
//! 1. A [`CredentialExtractor`] pulls credentials out of a request: an
//!    `Authorization` header, a submitted login form, the session or a
//!    remember-me cookie. [`ChainCredentialsExtractor`] tries several in
//!    order.
//! 2. An [`IdentityProvider`] maps credentials to an identity: typically an
//!    account lookup supplied by the application. [`ChainIdentityProvider`]
//!    tries several in order.
//!
//! # Web login
//!
//! [`WebLoginAuthenticator`] combines login forms, sessions and remember-me
//! cookies for browser users. Its [`login`](WebLoginAuthenticator::login)
//! writes the session and optionally issues a remember token, while
//! [`logout`](WebLoginAuthenticator::logout) clears the session, revokes the
//! token and expires the cookie.
//!
//! Sessions are provided via [`axum-sessions`](axum_sessions). The session
//! layer must be installed before the authentication layer.
//!
//! # Remember tokens
//!
//! Remember-me cookies carry a token id and a random validator. Only the
//! SHA-256 hash of the validator is persisted, through a
//! [`RememberTokenStore`]. [`MemoryStore`](memory_store::MemoryStore) and
//! [`LocalFsStore`] are provided.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//!
//! use axum::{
//!     http::StatusCode,
//!     response::{IntoResponse, Response},
//!     routing::{get, post},
//!     Extension, Router,
//! };
//! use axum_principal::{
//!     axum_sessions::{async_session::MemoryStore as SessionMemoryStore, SessionLayer},
//!     memory_store::MemoryStore,
//!     secrecy::ExposeSecret,
//!     AuthLayer, AuthRequest, Credentials, Identity, IdentityProvider, InvalidCredentials,
//!     Principal, RequireAuthenticationLayer, WebLoginAuthenticator,
//! };
//! use rand::Rng;
//!
//! struct Accounts;
//!
//! #[async_trait::async_trait]
//! impl IdentityProvider for Accounts {
//!     async fn resolve(&self, credentials: &Credentials) -> axum_principal::Result<Identity> {
//!         match credentials {
//!             Credentials::LoginForm(form) if form.password().expose_secret() == "hunter42" => {
//!                 Ok(Identity::Subject(form.identifier().to_owned()))
//!             }
//!             _ => Err(InvalidCredentials::new("unknown account").into()),
//!         }
//!     }
//! }
//!
//! type Authenticator = Arc<WebLoginAuthenticator<Accounts, MemoryStore>>;
//!
//! #[tokio::main]
//! async fn main() {
//!     let secret = rand::thread_rng().gen::<[u8; 64]>();
//!     let session_layer = SessionLayer::new(SessionMemoryStore::new(), &secret);
//!
//!     let authenticator = Arc::new(WebLoginAuthenticator::new(Accounts, MemoryStore::default()));
//!     let auth_layer = AuthLayer::new(authenticator.clone(), authenticator.clone());
//!
//!     async fn login_handler(
//!         Extension(authenticator): Extension<Authenticator>,
//!         request: AuthRequest,
//!         principal: Principal,
//!     ) -> Result<Response, StatusCode> {
//!         let identity = principal.web_login().ok_or(StatusCode::UNAUTHORIZED)?;
//!         authenticator
//!             .login(&request, identity, "Welcome!".into_response())
//!             .await
//!             .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
//!     }
//!
//!     async fn logout_handler(
//!         Extension(authenticator): Extension<Authenticator>,
//!         request: AuthRequest,
//!         principal: Principal,
//!     ) -> Result<Response, StatusCode> {
//!         authenticator
//!             .logout(&request, principal.identity(), "Bye!".into_response())
//!             .await
//!             .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
//!     }
//!
//!     async fn protected_handler(principal: Principal) -> impl IntoResponse {
//!         format!("Logged in as: {}", principal.identity().canonical())
//!     }
//!
//!     let app = Router::new()
//!         .route("/", get(protected_handler))
//!         .route_layer(RequireAuthenticationLayer::login())
//!         .route("/login", post(login_handler))
//!         .route("/logout", post(logout_handler))
//!         .layer(auth_layer)
//!         .layer(Extension(authenticator))
//!         .layer(session_layer);
//!
//!     axum::Server::bind(&"0.0.0.0:3000".parse().unwrap())
//!         .serve(app.into_make_service_with_connect_info::<SocketAddr>())
//!         .await
//!         .unwrap();
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod auth;
mod credentials;
mod error;
pub mod extractors;
mod fs_store;
mod header_auth;
mod identity;
mod login_form;
pub mod memory_store;
mod principal;
mod remember;
mod remember_token;
mod request;
mod session;
mod token_store;
mod user_agent;
mod web_login;

pub use auth::{AuthLayer, AuthService, RequireAuthenticationLayer, RequireLogin};
pub use axum_sessions;
pub use credentials::{
    BasicAuth, BearerToken, ChainCredentialsExtractor, ClientRememberToken, CredentialExtractor,
    Credentials, LoginForm, SessionInfo,
};
pub use error::{Error, InvalidCredentials, MissingCredentials, TokenNotFound};
pub use fs_store::LocalFsStore;
pub use header_auth::{BasicAuthExtractor, BearerTokenExtractor};
pub use identity::{ChainIdentityProvider, Identity, IdentityProvider};
pub use login_form::{LoginFormConfig, LoginFormExtractor};
pub use principal::Principal;
pub use remember::{RememberCookieConfig, RememberTokenAuthenticator};
pub use remember_token::RememberToken;
pub use request::AuthRequest;
pub use secrecy;
pub use session::SessionAuthenticator;
pub use token_store::RememberTokenStore;
pub use user_agent::{UnknownUserAgent, UserAgent, UserAgentParser};
pub use web_login::{WebLoginAuthenticator, WebLoginIdentity};

/// The result type used throughout this crate.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;
