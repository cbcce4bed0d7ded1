use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use axum::http::{header::SET_COOKIE, HeaderValue, Response};
use cookie::{Cookie, SameSite};

use crate::{
    credentials::{ClientRememberToken, CredentialExtractor, Credentials, LoginForm},
    error::{InvalidCredentials, MissingCredentials},
    identity::{Identity, IdentityProvider},
    remember_token::RememberToken,
    request::AuthRequest,
    token_store::RememberTokenStore,
    Error, Result,
};

/// Attributes of the remember-me cookie.
#[derive(Debug, Clone)]
pub struct RememberCookieConfig {
    name: Cow<'static, str>,
    max_age: Duration,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
    path: Cow<'static, str>,
}

impl Default for RememberCookieConfig {
    fn default() -> Self {
        Self {
            name: "lgrem".into(),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            secure: false,
            http_only: true,
            same_site: SameSite::Strict,
            path: "/".into(),
        }
    }
}

impl RememberCookieConfig {
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets both the cookie max age and the lifetime of issued tokens.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn with_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.path = path.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);

        Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .max_age(cookie::time::Duration::seconds(max_age))
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site)
            .build()
    }

    fn expired_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.name.clone(), ""))
            .path(self.path.clone())
            .build();
        cookie.make_removal();
        cookie
    }
}

fn set_cookie<B>(response: &mut Response<B>, cookie: &Cookie<'_>) -> Result<()> {
    let value = HeaderValue::from_str(&cookie.to_string())?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

/// Authenticates clients through a long-lived remember-me cookie.
///
/// The cookie holds a token id and a raw validator. The store keeps only the
/// validator's hash, so a leaked store does not let anyone forge cookies.
#[derive(Debug, Clone)]
pub struct RememberTokenAuthenticator<Store> {
    store: Store,
    config: RememberCookieConfig,
}

impl<Store> RememberTokenAuthenticator<Store>
where
    Store: RememberTokenStore,
{
    pub fn new(store: Store) -> Self {
        Self::with_config(store, RememberCookieConfig::default())
    }

    pub fn with_config(store: Store, config: RememberCookieConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &RememberCookieConfig {
        &self.config
    }

    /// Issues a remember token for the identity when the login form asked for
    /// it, and sets the matching cookie on the response.
    #[tracing::instrument(level = "debug", skip_all, fields(identity = %identity.canonical()), err)]
    pub async fn inject_remember_cookie<B>(
        &self,
        mut response: Response<B>,
        credentials: &LoginForm,
        identity: &Identity,
    ) -> Result<Response<B>>
    where
        B: Send,
    {
        if !credentials.should_remember() {
            return Ok(response);
        }

        let (token, validator) = RememberToken::generate(identity.canonical(), self.config.max_age)?;
        self.store.store(&token).await?;

        let client_token = ClientRememberToken::new(token.id(), validator);
        set_cookie(&mut response, &self.config.cookie(client_token.canonical()))?;

        Ok(response)
    }

    /// Revokes the token, if given, and always expires the cookie.
    pub async fn remove_remember_cookie<B>(
        &self,
        mut response: Response<B>,
        token: Option<&RememberToken>,
    ) -> Result<Response<B>>
    where
        B: Send,
    {
        if let Some(token) = token {
            self.store.remove(token).await?;
            tracing::debug!(token.id = token.id(), "revoked remember token");
        }
        set_cookie(&mut response, &self.config.expired_cookie())?;

        Ok(response)
    }
}

#[async_trait]
impl<Store> CredentialExtractor for RememberTokenAuthenticator<Store>
where
    Store: RememberTokenStore,
{
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let value = request.cookie(self.config.name()).ok_or_else(|| {
            MissingCredentials::new(format!(
                "remember token cookie `{}` is not present",
                self.config.name()
            ))
        })?;

        Ok(Credentials::ClientRememberToken(ClientRememberToken::parse(
            &value,
        )?))
    }

    fn name(&self) -> &str {
        "remember_token"
    }
}

#[async_trait]
impl<Store> IdentityProvider for RememberTokenAuthenticator<Store>
where
    Store: RememberTokenStore,
{
    async fn resolve(&self, credentials: &Credentials) -> Result<Identity> {
        let Credentials::ClientRememberToken(client_token) = credentials else {
            return Err(InvalidCredentials::new("remember token credentials expected").into());
        };

        let token = match self.store.retrieve(client_token.token_id()).await {
            Ok(token) => token,
            Err(Error::TokenNotFound(err)) => {
                return Err(InvalidCredentials::new(format!(
                    "remember token `{}` could not be found",
                    client_token.token_id()
                ))
                .with_source(err)
                .into())
            }
            Err(err) => return Err(err),
        };

        if !token.is_valid(client_token.validator()) {
            return Err(InvalidCredentials::new("remember token found but not valid").into());
        }

        if token.is_expired() {
            self.store.remove(&token).await?;
            tracing::warn!(token.id = token.id(), "removed expired remember token");
            return Err(InvalidCredentials::new("remember token found but expired").into());
        }

        Ok(Identity::RememberToken(token))
    }

    fn name(&self) -> &str {
        "remember_token"
    }
}
