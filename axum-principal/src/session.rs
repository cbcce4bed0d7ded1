use std::{borrow::Cow, fmt, sync::Arc};

use async_trait::async_trait;
use axum::http::header::USER_AGENT;

use crate::{
    credentials::{CredentialExtractor, Credentials, SessionInfo},
    error::{InvalidCredentials, MissingCredentials},
    identity::{Identity, IdentityProvider},
    request::AuthRequest,
    user_agent::{UnknownUserAgent, UserAgentParser},
    Error, Result,
};

/// Reads and writes the authenticated identity in the request session.
///
/// As an extractor it yields [`SessionInfo`] built from the session attribute
/// and the client's address and user agent. As a provider it trusts that
/// information unchanged: the session was only written after a successful
/// login.
///
/// No user agent parsing ships with this crate: unless a parser is set with
/// [`with_user_agent_parser`](Self::with_user_agent_parser), the device,
/// browser and OS of every [`SessionInfo`] are reported as `"Other"`. The
/// client IP is always filled in.
///
/// Sessions come from `axum-sessions`; install its `SessionLayer` outside
/// [`AuthLayer`](crate::AuthLayer).
#[derive(Clone)]
pub struct SessionAuthenticator {
    attribute: Cow<'static, str>,
    parser: Arc<dyn UserAgentParser>,
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

impl Default for SessionAuthenticator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTRIBUTE)
    }
}

impl SessionAuthenticator {
    /// The session key the identity is stored under unless configured.
    pub const DEFAULT_ATTRIBUTE: &'static str = "auth_identity";

    pub fn new(attribute: impl Into<Cow<'static, str>>) -> Self {
        Self {
            attribute: attribute.into(),
            parser: Arc::new(UnknownUserAgent),
        }
    }

    /// Replaces the user agent parser used to describe clients.
    pub fn with_user_agent_parser(mut self, parser: impl UserAgentParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Writes the identity's canonical string into the session.
    ///
    /// Fails with [`Error::NoSession`] when the request carries no session.
    #[tracing::instrument(level = "debug", skip_all, fields(identity = %identity.canonical()), err)]
    pub async fn store_identity_in_session(
        &self,
        request: &AuthRequest,
        identity: &Identity,
    ) -> Result<()> {
        let session = request.session().ok_or(Error::NoSession)?;
        session
            .write()
            .await
            .insert(&self.attribute, identity.canonical())?;

        Ok(())
    }

    /// Clears the identity from the session, if there is one.
    pub async fn remove_session_attribute(&self, request: &AuthRequest) {
        match request.session() {
            Some(session) => session.write().await.remove(&self.attribute),
            None => tracing::debug!("no session to clear"),
        }
    }
}

#[async_trait]
impl CredentialExtractor for SessionAuthenticator {
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let session = request
            .session()
            .ok_or_else(|| MissingCredentials::new("no session found in the request"))?;

        let auth_id = session
            .read()
            .await
            .get::<String>(&self.attribute)
            .ok_or_else(|| {
                MissingCredentials::new(format!(
                    "session attribute `{}` is not set",
                    self.attribute
                ))
            })?;

        let user_agent = self
            .parser
            .parse(request.header(USER_AGENT).unwrap_or_default())?;

        Ok(Credentials::SessionInfo(SessionInfo::new(
            auth_id,
            request.client_ip(),
            user_agent.device,
            user_agent.browser,
            user_agent.os,
        )))
    }

    fn name(&self) -> &str {
        "session"
    }
}

#[async_trait]
impl IdentityProvider for SessionAuthenticator {
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity> {
        match credentials {
            Credentials::SessionInfo(info) => Ok(Identity::SessionInfo(info.clone())),
            _ => Err(InvalidCredentials::new("session info credentials expected").into()),
        }
    }

    fn name(&self) -> &str {
        "session"
    }
}
