use std::borrow::Cow;

use async_trait::async_trait;
use axum::http::Method;

use crate::{
    credentials::{CredentialExtractor, Credentials, LoginForm},
    error::MissingCredentials,
    request::AuthRequest,
    Result,
};

/// Where the login form is posted and how its fields are named.
#[derive(Debug, Clone)]
pub struct LoginFormConfig {
    method: Method,
    path: Cow<'static, str>,
    identifier_field: Cow<'static, str>,
    password_field: Cow<'static, str>,
    remember_field: Cow<'static, str>,
}

impl Default for LoginFormConfig {
    fn default() -> Self {
        Self {
            method: Method::POST,
            path: "/login".into(),
            identifier_field: "email".into(),
            password_field: "password".into(),
            remember_field: "remember".into(),
        }
    }
}

impl LoginFormConfig {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_identifier_field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.identifier_field = field.into();
        self
    }

    pub fn with_password_field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.password_field = field.into();
        self
    }

    pub fn with_remember_field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.remember_field = field.into();
        self
    }
}

/// Extracts [`LoginForm`] credentials from a submitted sign-in form.
#[derive(Debug, Clone, Default)]
pub struct LoginFormExtractor {
    config: LoginFormConfig,
}

impl LoginFormExtractor {
    pub fn new(config: LoginFormConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoginFormConfig {
        &self.config
    }
}

// Checkboxes post "on"; scripted clients tend to send "true" or "1".
fn is_checked(value: &str) -> bool {
    matches!(value, "on" | "true" | "1")
}

#[async_trait]
impl CredentialExtractor for LoginFormExtractor {
    async fn extract(&self, request: &AuthRequest) -> Result<Credentials> {
        let config = &self.config;
        if !self.reads_form(request.method(), request.path()) {
            return Err(MissingCredentials::new(
                "login form not found: method and path do not match",
            )
            .into());
        }

        let identifier = request.form_field(&config.identifier_field);
        let password = request.form_field(&config.password_field);
        let remember = request
            .form_field(&config.remember_field)
            .map(is_checked)
            .unwrap_or(false);

        match (identifier, password) {
            (Some(identifier), Some(password)) => Ok(Credentials::LoginForm(LoginForm::new(
                identifier, password, remember,
            ))),
            _ => Err(MissingCredentials::new(
                "login form not found: missing identifier or password in request body",
            )
            .into()),
        }
    }

    fn name(&self) -> &str {
        "login_form"
    }

    fn reads_form(&self, method: &Method, path: &str) -> bool {
        *method == self.config.method && path == self.config.path
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::Error;

    fn login(remember: Option<&str>) -> AuthRequest {
        let request = AuthRequest::new(Method::POST, "/login")
            .with_form_field("email", "a@b.com")
            .with_form_field("password", "x");
        match remember {
            Some(value) => request.with_form_field("remember", value),
            None => request,
        }
    }

    async fn extract(request: &AuthRequest) -> Result<LoginForm> {
        match LoginFormExtractor::default().extract(request).await? {
            Credentials::LoginForm(form) => Ok(form),
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extracts_login_form() {
        let form = extract(&login(None)).await.unwrap();

        assert_eq!(form.identifier(), "a@b.com");
        assert_eq!(form.password().expose_secret(), "x");
        assert!(!form.should_remember());
    }

    #[tokio::test]
    async fn coerces_remember_flag() {
        for (value, expected) in [
            ("on", true),
            ("true", true),
            ("1", true),
            ("off", false),
            ("yes", false),
            ("", false),
            ("TRUE", false),
        ] {
            let form = extract(&login(Some(value))).await.unwrap();
            assert_eq!(form.should_remember(), expected, "{value}");
        }
    }

    #[tokio::test]
    async fn requires_method_path_and_fields() {
        let wrong_method = AuthRequest::new(Method::GET, "/login")
            .with_form_field("email", "a@b.com")
            .with_form_field("password", "x");
        let wrong_path = AuthRequest::new(Method::POST, "/signin")
            .with_form_field("email", "a@b.com")
            .with_form_field("password", "x");
        let no_password =
            AuthRequest::new(Method::POST, "/login").with_form_field("email", "a@b.com");

        for request in [wrong_method, wrong_path, no_password] {
            assert!(matches!(
                extract(&request).await,
                Err(Error::MissingCredentials(_))
            ));
        }
    }

    #[tokio::test]
    async fn honours_custom_configuration() {
        let extractor = LoginFormExtractor::new(
            LoginFormConfig::default()
                .with_method(Method::PUT)
                .with_path("/session")
                .with_identifier_field("username")
                .with_password_field("pass")
                .with_remember_field("keep"),
        );
        let request = AuthRequest::new(Method::PUT, "/session")
            .with_form_field("username", "ferris")
            .with_form_field("pass", "hunter42")
            .with_form_field("keep", "1");

        let credentials = extractor.extract(&request).await.unwrap();
        assert!(matches!(
            credentials,
            Credentials::LoginForm(ref form) if form.identifier() == "ferris" && form.should_remember()
        ));
    }
}
