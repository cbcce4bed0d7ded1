//! Verified subjects and the strategies that resolve them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    credentials::{Credentials, SessionInfo},
    error::InvalidCredentials,
    remember_token::RememberToken,
    web_login::WebLoginIdentity,
    Error, Result,
};

/// A verified subject resolved from [`Credentials`].
#[derive(Debug, Clone)]
pub enum Identity {
    /// No provider could resolve the credentials; carries the reason.
    Anonymous(InvalidCredentials),
    /// An identity resolved by an application provider, e.g. an account
    /// lookup, named by its subject.
    Subject(String),
    /// The remembered principal behind a valid remember token.
    RememberToken(RememberToken),
    /// The identity stored in the session.
    SessionInfo(SessionInfo),
    /// An identity resolved by [`WebLoginAuthenticator`](crate::WebLoginAuthenticator).
    WebLogin(WebLoginIdentity),
}

impl Identity {
    pub(crate) const ANONYMOUS: &'static str = "anonymous";

    /// The canonical string form of this identity, i.e. its subject.
    ///
    /// This is what gets written to the session on login and what remember
    /// tokens are issued for.
    pub fn canonical(&self) -> String {
        match self {
            Identity::Anonymous(_) => Self::ANONYMOUS.to_owned(),
            Identity::Subject(subject) => subject.clone(),
            Identity::RememberToken(token) => token.identity_subject().to_owned(),
            Identity::SessionInfo(info) => info.auth_id().to_owned(),
            Identity::WebLogin(web_login) => web_login.inner().canonical(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.resolved(), Identity::Anonymous(_))
    }

    /// Peels off any [`Identity::WebLogin`] wrapping.
    pub fn resolved(&self) -> &Identity {
        match self {
            Identity::WebLogin(web_login) => web_login.inner().resolved(),
            identity => identity,
        }
    }
}

/// A strategy for mapping [`Credentials`] to an [`Identity`].
///
/// Providers fail with [`Error::InvalidCredentials`] when they do not handle
/// the given credentials or cannot validate them. Any other error aborts the
/// request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves the identity behind the credentials.
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity>;

    /// A name identifying this strategy in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<T> IdentityProvider for Arc<T>
where
    T: IdentityProvider + ?Sized,
{
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity> {
        (**self).resolve(credentials).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Tries providers in insertion order; the first success wins.
#[derive(Default)]
pub struct ChainIdentityProvider {
    providers: Vec<Box<dyn IdentityProvider>>,
}

impl ChainIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider, returning the chain.
    pub fn with(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.push(provider);
        self
    }

    /// Appends a provider at runtime.
    pub fn push(&mut self, provider: impl IdentityProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

#[async_trait]
impl IdentityProvider for ChainIdentityProvider {
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity> {
        let mut tried = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.resolve(credentials).await {
                Ok(identity) => return Ok(identity),
                Err(Error::InvalidCredentials(err)) => {
                    tracing::debug!(provider = provider.name(), reason = %err, "identity not resolved");
                    tried.push(provider.name());
                }
                Err(err) => return Err(err),
            }
        }

        Err(InvalidCredentials::new(format!("identity not found: tried {}", tried.join(", "))).into())
    }

    fn name(&self) -> &str {
        "chain"
    }
}
