//! What a client presents to assert who it is.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use secrecy::{ExposeSecret, SecretString};

use crate::{error::MissingCredentials, request::AuthRequest, Error, Result};

/// Credentials presented by a client, not yet verified.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No extractor found credentials; carries the reason.
    Void(MissingCredentials),
    /// HTTP Basic credentials.
    BasicAuth(BasicAuth),
    /// An opaque bearer token.
    BearerToken(BearerToken),
    /// A submitted web login form.
    LoginForm(LoginForm),
    /// A remember-me cookie.
    ClientRememberToken(ClientRememberToken),
    /// An identity already stored in the session.
    SessionInfo(SessionInfo),
}

impl Credentials {
    pub(crate) const VOID: &'static str = "void";

    /// The canonical string form of these credentials.
    ///
    /// Note this exposes secrets for `BasicAuth` and `LoginForm`.
    pub fn canonical(&self) -> String {
        match self {
            Credentials::Void(_) => Self::VOID.to_owned(),
            Credentials::BasicAuth(basic) => basic.canonical(),
            Credentials::BearerToken(bearer) => bearer.token().to_owned(),
            Credentials::LoginForm(form) => form.canonical(),
            Credentials::ClientRememberToken(token) => token.canonical(),
            Credentials::SessionInfo(info) => info.auth_id().to_owned(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Credentials::Void(_))
    }
}

/// Username and password sent through `Authorization: Basic`.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: SecretString,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Decodes the base64 `username:password` payload of a Basic header.
    pub fn parse(encoded: &str) -> Result<Self, MissingCredentials> {
        let decoded = base64::decode(encoded.trim())
            .map_err(|_| MissingCredentials::new("invalid base64 in basic credentials"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| MissingCredentials::new("basic credentials are not valid UTF-8"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| MissingCredentials::new("basic credentials lack a `:` separator"))?;

        Ok(Self::new(username, password))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    fn canonical(&self) -> String {
        base64::encode(format!(
            "{}:{}",
            self.username,
            self.password.expose_secret()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Credentials obtained through a web sign-in form.
#[derive(Debug, Clone)]
pub struct LoginForm {
    identifier: String,
    password: SecretString,
    remember: bool,
}

impl LoginForm {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>, remember: bool) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::new(password.into()),
            remember,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Whether the user asked to be remembered on this device.
    pub fn should_remember(&self) -> bool {
        self.remember
    }

    fn canonical(&self) -> String {
        format!("{}:{}", self.identifier, self.password.expose_secret())
    }
}

/// The remember token a client sent back in its cookie.
///
/// The cookie value is the token id immediately followed by the validator,
/// each the hex encoding of 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRememberToken {
    token_id: String,
    validator: String,
}

impl ClientRememberToken {
    /// Length of each hex segment of the cookie value.
    pub const SEGMENT_LEN: usize = 32;

    pub fn new(token_id: impl Into<String>, validator: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            validator: validator.into(),
        }
    }

    /// Splits a cookie value into its id and validator segments.
    pub fn parse(value: &str) -> Result<Self, MissingCredentials> {
        if value.len() != 2 * Self::SEGMENT_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MissingCredentials::new("remember token cookie is malformed"));
        }
        let (token_id, validator) = value.split_at(Self::SEGMENT_LEN);

        Ok(Self::new(token_id, validator))
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    pub fn canonical(&self) -> String {
        format!("{}{}", self.token_id, self.validator)
    }
}

/// An identity found in the session, plus what we know about the client.
///
/// This is both credentials and identity: the session was trusted when it was
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    auth_id: String,
    ip: String,
    device: String,
    browser: String,
    os: String,
}

impl SessionInfo {
    pub fn new(
        auth_id: impl Into<String>,
        ip: impl Into<String>,
        device: impl Into<String>,
        browser: impl Into<String>,
        os: impl Into<String>,
    ) -> Self {
        Self {
            auth_id: auth_id.into(),
            ip: ip.into(),
            device: device.into(),
            browser: browser.into(),
            os: os.into(),
        }
    }

    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn browser(&self) -> &str {
        &self.browser
    }

    pub fn os(&self) -> &str {
        &self.os
    }
}

/// A strategy for pulling [`Credentials`] out of a request.
///
/// Extractors fail with [`Error::MissingCredentials`] when their
/// preconditions are not met, which lets chains fall through to the next
/// strategy. Any other error aborts the request.
#[async_trait]
pub trait CredentialExtractor: Send + Sync {
    /// Extracts credentials from the request.
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials>;

    /// A name identifying this strategy in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this strategy reads the body of a form submitted with
    /// `method` to `path`.
    ///
    /// [`AuthLayer`](crate::AuthLayer) only buffers form bodies some
    /// extractor asked for; everywhere else [`AuthRequest::form_field`] sees
    /// an empty form.
    fn reads_form(&self, _method: &Method, _path: &str) -> bool {
        false
    }
}

#[async_trait]
impl<T> CredentialExtractor for Arc<T>
where
    T: CredentialExtractor + ?Sized,
{
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        (**self).extract(request).await
    }

    fn reads_form(&self, method: &Method, path: &str) -> bool {
        (**self).reads_form(method, path)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Tries extractors in insertion order; the first success wins.
///
/// Order defines priority between credential sources that could both match.
#[derive(Default)]
pub struct ChainCredentialsExtractor {
    extractors: Vec<Box<dyn CredentialExtractor>>,
}

impl ChainCredentialsExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extractor, returning the chain.
    pub fn with(mut self, extractor: impl CredentialExtractor + 'static) -> Self {
        self.push(extractor);
        self
    }

    pub fn push(&mut self, extractor: impl CredentialExtractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }
}

#[async_trait]
impl CredentialExtractor for ChainCredentialsExtractor {
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let mut tried = Vec::with_capacity(self.extractors.len());
        for extractor in &self.extractors {
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
        "chain"
    }

    fn reads_form(&self, method: &Method, path: &str) -> bool {
        self.extractors
            .iter()
            .any(|extractor| extractor.reads_form(method, path))
    }
}
