use std::borrow::Cow;

/// A credential extraction strategy could not find what it needs in the
/// request.
///
/// This is the recoverable outcome of [`CredentialExtractor`]: chains move on
/// to the next strategy and the auth layer turns a terminal miss into
/// [`Credentials::Void`].
///
/// [`CredentialExtractor`]: crate::CredentialExtractor
/// [`Credentials::Void`]: crate::Credentials::Void
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct MissingCredentials {
    reason: Cow<'static, str>,
}

impl MissingCredentials {
    /// Creates a new error with the given reason.
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the credentials were not found.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A remember token lookup missed in the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remember token `{id}` does not exist")]
pub struct TokenNotFound {
    id: String,
}

impl TokenNotFound {
    /// Creates a new error for the given token id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The id that was looked up.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// An identity provider could not validate the credentials it was given.
///
/// This is the recoverable outcome of [`IdentityProvider`]: the auth layer
/// turns a terminal failure into [`Identity::Anonymous`].
///
/// [`IdentityProvider`]: crate::IdentityProvider
/// [`Identity::Anonymous`]: crate::Identity::Anonymous
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct InvalidCredentials {
    reason: Cow<'static, str>,
    #[source]
    source: Option<TokenNotFound>,
}

impl InvalidCredentials {
    /// Creates a new error with the given reason.
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    /// Attaches the store miss that caused this failure.
    pub fn with_source(mut self, source: TokenNotFound) -> Self {
        self.source = Some(source);
        self
    }

    /// Why the credentials were rejected.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The store miss behind this failure, if any.
    pub fn token_not_found(&self) -> Option<&TokenNotFound> {
        self.source.as_ref()
    }
}

/// Errors produced by this crate.
///
/// [`MissingCredentials`] and [`InvalidCredentials`] are ordinary,
/// recoverable outcomes. Every other variant is an environment failure that
/// aborts the operation in progress.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// See [`MissingCredentials`].
    #[error(transparent)]
    MissingCredentials(#[from] MissingCredentials),

    /// See [`InvalidCredentials`].
    #[error(transparent)]
    InvalidCredentials(#[from] InvalidCredentials),

    /// See [`TokenNotFound`].
    #[error(transparent)]
    TokenNotFound(#[from] TokenNotFound),

    /// The system random source could not supply bytes.
    #[error("not enough entropy to generate a remember token")]
    Entropy,

    /// The request carries no session. Is the session layer installed?
    #[error("session extension missing; is the session layer installed?")]
    NoSession,

    /// A session value could not be encoded or decoded.
    #[error(transparent)]
    Session(#[from] serde_json::Error),

    /// A token store could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored remember token record could not be parsed.
    #[error("remember token record `{0}` is malformed")]
    CorruptToken(String),

    /// The user agent parser could not run.
    #[error("user agent could not be parsed: {0}")]
    UserAgent(String),

    /// A cookie could not be encoded into a header.
    #[error(transparent)]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

impl Error {
    /// Returns `true` for the outcomes chains are allowed to fall through on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MissingCredentials(_) | Error::InvalidCredentials(_)
        )
    }

    pub(crate) fn into_missing(self) -> Result<MissingCredentials, Error> {
        match self {
            Error::MissingCredentials(err) => Ok(err),
            Error::InvalidCredentials(err) => Ok(MissingCredentials::new(err.reason.into_owned())),
            err => Err(err),
        }
    }

    pub(crate) fn into_invalid(self) -> Result<InvalidCredentials, Error> {
        match self {
            Error::InvalidCredentials(err) => Ok(err),
            Error::MissingCredentials(err) => Ok(InvalidCredentials::new(err.reason.into_owned())),
            err => Err(err),
        }
    }
}
