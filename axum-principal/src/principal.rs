use crate::{credentials::Credentials, identity::Identity, web_login::WebLoginIdentity};

/// Who is making a request, and how we know.
///
/// Built once per request by [`AuthLayer`](crate::AuthLayer) and inserted
/// into the request extensions. A principal always exists: failed extraction
/// shows up as [`Credentials::Void`] and failed resolution as
/// [`Identity::Anonymous`].
#[derive(Debug, Clone)]
pub struct Principal {
    identity: Identity,
    credentials: Credentials,
}

impl Principal {
    pub fn new(identity: Identity, credentials: Credentials) -> Self {
        Self {
            identity,
            credentials,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns `true` unless the identity is anonymous.
    pub fn is_authenticated(&self) -> bool {
        !self.identity.is_anonymous()
    }

    /// The web login identity, when resolved by a
    /// [`WebLoginAuthenticator`](crate::WebLoginAuthenticator).
    pub fn web_login(&self) -> Option<&WebLoginIdentity> {
        match &self.identity {
            Identity::WebLogin(web_login) => Some(web_login),
            _ => None,
        }
    }
}
