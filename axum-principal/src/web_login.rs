//! Web sign-in: login forms, sessions and remember-me cookies working
//! together.

use async_trait::async_trait;
use axum::http::{Method, Response};

use crate::{
    credentials::{CredentialExtractor, Credentials},
    error::{InvalidCredentials, MissingCredentials},
    identity::{Identity, IdentityProvider},
    login_form::{LoginFormConfig, LoginFormExtractor},
    remember::{RememberCookieConfig, RememberTokenAuthenticator},
    remember_token::RememberToken,
    request::AuthRequest,
    session::SessionAuthenticator,
    token_store::RememberTokenStore,
    Error, Result,
};

/// An identity resolved by [`WebLoginAuthenticator`], together with the
/// credentials that produced it.
///
/// Pass it back to [`WebLoginAuthenticator::login`] to persist a fresh login.
#[derive(Debug, Clone)]
pub struct WebLoginIdentity {
    identity: Box<Identity>,
    credentials: Credentials,
}

impl WebLoginIdentity {
    pub fn new(identity: Identity, credentials: Credentials) -> Self {
        Self {
            identity: Box::new(identity),
            credentials,
        }
    }

    /// The identity the winning provider resolved.
    pub fn inner(&self) -> &Identity {
        &self.identity
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Authenticates browser users.
///
/// Credentials are looked for in a submitted login form first, then in the
/// session, then in the remember-me cookie. Login form credentials are
/// checked by the application's `Provider`; session and remember-me
/// credentials are resolved here.
///
/// Unlike [`ChainIdentityProvider`](crate::ChainIdentityProvider), every
/// provider is consulted and the *last* success wins, so a session or a
/// remember token overrides whatever the application provider returned.
#[derive(Debug, Clone)]
pub struct WebLoginAuthenticator<Provider, Store> {
    provider: Provider,
    login_form: LoginFormExtractor,
    session: SessionAuthenticator,
    remember: RememberTokenAuthenticator<Store>,
}

impl<Provider, Store> WebLoginAuthenticator<Provider, Store>
where
    Provider: IdentityProvider,
    Store: RememberTokenStore,
{
    /// Creates an authenticator checking login forms against `provider` and
    /// keeping remember tokens in `store`.
    pub fn new(provider: Provider, store: Store) -> Self {
        Self {
            provider,
            login_form: LoginFormExtractor::default(),
            session: SessionAuthenticator::default(),
            remember: RememberTokenAuthenticator::new(store),
        }
    }

    pub fn with_login_form(mut self, config: LoginFormConfig) -> Self {
        self.login_form = LoginFormExtractor::new(config);
        self
    }

    pub fn with_session(mut self, session: SessionAuthenticator) -> Self {
        self.session = session;
        self
    }

    pub fn with_remember_cookie(mut self, config: RememberCookieConfig) -> Self {
        let store = self.remember.store().clone();
        self.remember = RememberTokenAuthenticator::with_config(store, config);
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn session(&self) -> &SessionAuthenticator {
        &self.session
    }

    pub fn remember(&self) -> &RememberTokenAuthenticator<Store> {
        &self.remember
    }

    /// Completes a login.
    ///
    /// Only has an effect when `identity` was resolved from login form
    /// credentials: the identity is written to the session, and a remember
    /// token is issued when the form asked for it.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(identity = %identity.inner().canonical()),
        err
    )]
    pub async fn login<B>(
        &self,
        request: &AuthRequest,
        identity: &WebLoginIdentity,
        response: Response<B>,
    ) -> Result<Response<B>>
    where
        B: Send,
    {
        let Credentials::LoginForm(form) = identity.credentials() else {
            tracing::debug!("not a login form submission; nothing to do");
            return Ok(response);
        };

        self.session
            .store_identity_in_session(request, identity.inner())
            .await?;
        self.remember
            .inject_remember_cookie(response, form, identity.inner())
            .await
    }

    /// Logs the client out.
    ///
    /// The session attribute is always cleared and the response always
    /// expires the remember-me cookie. The remember token behind `identity`,
    /// or else the one presented by the request, is revoked if it resolves.
    #[tracing::instrument(level = "debug", skip_all, fields(identity = %identity.canonical()), err)]
    pub async fn logout<B>(
        &self,
        request: &AuthRequest,
        identity: &Identity,
        response: Response<B>,
    ) -> Result<Response<B>>
    where
        B: Send,
    {
        self.session.remove_session_attribute(request).await;

        let token = match identity.resolved() {
            Identity::RememberToken(token) => Some(token.clone()),
            _ => self.presented_token(request).await?,
        };

        self.remember
            .remove_remember_cookie(response, token.as_ref())
            .await
    }

    async fn presented_token(&self, request: &AuthRequest) -> Result<Option<RememberToken>> {
        let resolved = match self.remember.extract(request).await {
            Ok(credentials) => self.remember.resolve(&credentials).await,
            Err(err) => Err(err),
        };

        match resolved {
            Ok(Identity::RememberToken(token)) => Ok(Some(token)),
            Ok(_) => Ok(None),
            Err(err) if err.is_recoverable() => {
                tracing::debug!(reason = %err, "no remember token to revoke");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl<Provider, Store> CredentialExtractor for WebLoginAuthenticator<Provider, Store>
where
    Provider: IdentityProvider,
    Store: RememberTokenStore,
{
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let extractors: [&dyn CredentialExtractor; 3] =
            [&self.login_form, &self.session, &self.remember];

        let mut tried = Vec::with_capacity(extractors.len());
        for extractor in extractors {
            match extractor.extract(request).await {
                Ok(credentials) => return Ok(credentials),
                Err(Error::MissingCredentials(err)) => {
                    tracing::debug!(extractor = extractor.name(), reason = %err, "credentials not found");
                    tried.push(extractor.name());
                }
                Err(err) => return Err(err),
            }
        }

        Err(MissingCredentials::new(format!("credentials not found: tried {}", tried.join(", "))).into())
    }

    fn name(&self) -> &str {
        "web_login"
    }

    fn reads_form(&self, method: &Method, path: &str) -> bool {
        self.login_form.reads_form(method, path)
    }
}

#[async_trait]
impl<Provider, Store> IdentityProvider for WebLoginAuthenticator<Provider, Store>
where
    Provider: IdentityProvider,
    Store: RememberTokenStore,
{
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity> {
        let providers: [&dyn IdentityProvider; 3] =
            [&self.provider, &self.session, &self.remember];

        let mut resolved = None;
        let mut tried = Vec::with_capacity(providers.len());
        for provider in providers {
            match provider.resolve(credentials).await {
                Ok(identity) => resolved = Some(identity),
                Err(Error::InvalidCredentials(err)) => {
                    tracing::debug!(provider = provider.name(), reason = %err, "identity not resolved");
                    tried.push(provider.name());
                }
                Err(err) => return Err(err),
            }
        }

        match resolved {
            Some(identity) => Ok(Identity::WebLogin(WebLoginIdentity::new(
                identity,
                credentials.clone(),
            ))),
            None => Err(InvalidCredentials::new(format!(
                "identity not found: tried {}",
                tried.join(", ")
            ))
            .into()),
        }
    }

    fn name(&self) -> &str {
        "web_login"
    }
}
