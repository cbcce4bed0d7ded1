use std::{
    borrow::Cow,
    collections::HashMap,
    marker::PhantomData,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::{Bytes, HttpBody},
    http::{
        self,
        header::{CONTENT_LENGTH, LOCATION},
        request::Parts,
        HeaderValue, Request, StatusCode,
    },
    response::Response,
    BoxError,
};
use futures::future::BoxFuture;
use http_body::{LengthLimitError, Limited};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tower::{Layer, Service};
use tower_http::auth::{AsyncAuthorizeRequest, AsyncRequireAuthorizationLayer};

use crate::{
    credentials::{CredentialExtractor, Credentials},
    identity::{Identity, IdentityProvider},
    principal::Principal,
    request::{is_form, parse_form, AuthRequest},
    Result,
};

// from https://github.com/tokio-rs/axum/blob/7219fd8df520d295faa42b59f77e25ca2818b6b1/axum-extra/src/lib.rs#L91
// which in turn is from https://github.com/servo/rust-url/blob/master/url/src/parser.rs
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');
const PATH: &AsciiSet = &FRAGMENT.add(b'#').add(b'?').add(b'{').add(b'}');
const PATH_SEGMENT: &AsciiSet = &PATH.add(b'/').add(b'%');

fn status<B: Default>(status: StatusCode) -> Response<B> {
    let mut response = http::Response::new(B::default());
    *response.status_mut() = status;
    response
}

/// Login forms are small; anything larger is not worth buffering.
const DEFAULT_MAX_FORM_BYTES: usize = 16 * 1024;

#[derive(Clone)]
struct AuthState {
    extractor: Arc<dyn CredentialExtractor>,
    provider: Arc<dyn IdentityProvider>,
    max_form_bytes: usize,
}

impl AuthState {
    fn reads_form(&self, parts: &Parts) -> bool {
        is_form(&parts.headers) && self.extractor.reads_form(&parts.method, parts.uri.path())
    }

    fn declared_too_large(&self, parts: &Parts) -> bool {
        parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(false, |length| length > self.max_form_bytes as u64)
    }

    async fn principal(&self, request: &AuthRequest) -> Result<Principal> {
        let credentials = match self.extractor.extract(request).await {
            Ok(credentials) => credentials,
            Err(err) => Credentials::Void(err.into_missing()?),
        };

        let identity = match self.provider.resolve(&credentials).await {
            Ok(identity) => identity,
            Err(err) => Identity::Anonymous(err.into_invalid()?),
        };

        Ok(Principal::new(identity, credentials))
    }
}

/// Layer that resolves a [`Principal`] for every request.
///
/// Credentials are extracted and resolved with the configured strategies.
/// Extraction misses become [`Credentials::Void`] and resolution failures
/// become [`Identity::Anonymous`], so downstream services always find a
/// `Principal` and an [`AuthRequest`] in the request extensions. Other errors
/// are logged and answered with `500 Internal Server Error`.
///
/// URL-encoded form bodies are buffered so login forms can be read, but only
/// for submissions an extractor claims via
/// [`CredentialExtractor::reads_form`]; the body is handed on to the inner
/// service unchanged. Buffered forms larger than
/// [`with_max_form_bytes`](Self::with_max_form_bytes) (16 KiB by default) are
/// answered with `413 Payload Too Large`.
///
/// Session based strategies need the `axum-sessions` layer installed
/// before this one.
#[derive(Clone)]
pub struct AuthLayer {
    state: AuthState,
}

impl AuthLayer {
    /// Creates a layer from a credential extraction and an identity
    /// resolution strategy.
    pub fn new(
        extractor: impl CredentialExtractor + 'static,
        provider: impl IdentityProvider + 'static,
    ) -> Self {
        let state = AuthState {
            extractor: Arc::new(extractor),
            provider: Arc::new(provider),
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        };

        Self { state }
    }

    /// Caps how many bytes of a form body are buffered.
    pub fn with_max_form_bytes(mut self, max_form_bytes: usize) -> Self {
        self.state.max_form_bytes = max_form_bytes;
        self
    }

    /// Creates a layer from a single value implementing both strategies, such
    /// as [`WebLoginAuthenticator`](crate::WebLoginAuthenticator).
    pub fn from_authenticator<A>(authenticator: A) -> Self
    where
        A: CredentialExtractor + IdentityProvider + 'static,
    {
        let authenticator = Arc::new(authenticator);
        Self::new(Arc::clone(&authenticator), authenticator)
    }

    /// Resolves the principal behind a request outside of a tower stack.
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<Principal> {
        self.state.principal(request).await
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    state: AuthState,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: HttpBody + From<Bytes> + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<BoxError>,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let state = self.state.clone();
        let inner = self.inner.clone();

        let mut inner = std::mem::replace(&mut self.inner, inner);
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let (form, body) = if state.reads_form(&parts) {
                if state.declared_too_large(&parts) {
                    tracing::warn!(limit = state.max_form_bytes, "Form body too large");
                    return Ok(status(StatusCode::PAYLOAD_TOO_LARGE));
                }

                match hyper::body::to_bytes(Limited::new(body, state.max_form_bytes)).await {
                    Ok(bytes) => (parse_form(&bytes), ReqBody::from(bytes)),
                    Err(err) if err.is::<LengthLimitError>() => {
                        tracing::warn!(limit = state.max_form_bytes, "Form body too large");
                        return Ok(status(StatusCode::PAYLOAD_TOO_LARGE));
                    }
                    Err(err) => {
                        tracing::warn!("Could not read form body: {}", err);
                        return Ok(status(StatusCode::BAD_REQUEST));
                    }
                }
            } else {
                (HashMap::new(), body)
            };

            let auth_request = AuthRequest::from_parts(&parts, form);
            match state.principal(&auth_request).await {
                Ok(principal) => {
                    tracing::debug!(
                        identity = %principal.identity().canonical(),
                        void = principal.credentials().is_void(),
                        "resolved principal"
                    );
                    parts.extensions.insert(auth_request);
                    parts.extensions.insert(principal);

                    inner.call(Request::from_parts(parts, body)).await
                }

                Err(err) => {
                    tracing::error!("Could not resolve principal: {}", err);
                    Ok(status(StatusCode::INTERNAL_SERVER_ERROR))
                }
            }
        })
    }
}

/// Type that requires an authenticated principal.
///
/// See [`RequireAuthenticationLayer::login`] for more details.
pub struct RequireLogin<ResBody> {
    login_url: Option<Arc<Cow<'static, str>>>,
    redirect_field_name: Option<Arc<Cow<'static, str>>>,
    _body_type: PhantomData<fn() -> ResBody>,
}

impl<ResBody> Clone for RequireLogin<ResBody> {
    fn clone(&self) -> Self {
        Self {
            login_url: self.login_url.clone(),
            redirect_field_name: self.redirect_field_name.clone(),
            _body_type: PhantomData,
        }
    }
}

impl<ResBody> RequireLogin<ResBody>
where
    ResBody: Default,
{
    fn redirect(login_url: &str, redirect_field_name: Option<&str>, path: &str) -> Response<ResBody> {
        let url: Cow<'_, str> = match redirect_field_name {
            Some(next) => format!(
                "{login_url}?{next}={}",
                utf8_percent_encode(path, PATH_SEGMENT)
            )
            .into(),
            None => login_url.into(),
        };

        match HeaderValue::from_str(&url) {
            Ok(location) => {
                let mut response = status(StatusCode::TEMPORARY_REDIRECT);
                response.headers_mut().insert(LOCATION, location);
                response
            }
            Err(err) => {
                tracing::error!("Invalid login url `{}`: {}", url, err);
                status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl<ReqBody, ResBody> AsyncAuthorizeRequest<ReqBody> for RequireLogin<ResBody>
where
    ResBody: HttpBody + Default,
    ReqBody: Send + 'static,
{
    type RequestBody = ReqBody;
    type ResponseBody = ResBody;
    type Future =
        BoxFuture<'static, std::result::Result<Request<Self::RequestBody>, Response<Self::ResponseBody>>>;

    fn authorize(&mut self, request: Request<ReqBody>) -> Self::Future {
        let login_url = self.login_url.clone();
        let redirect_field_name = self.redirect_field_name.clone();
        Box::pin(async move {
            let authenticated = request
                .extensions()
                .get::<Principal>()
                .map(Principal::is_authenticated)
                .unwrap_or(false);

            if authenticated {
                return Ok(request);
            }

            let response = match login_url {
                Some(ref login_url) => Self::redirect(
                    login_url,
                    redirect_field_name.as_deref().map(|next| &**next),
                    request.uri().path(),
                ),
                None => status(StatusCode::UNAUTHORIZED),
            };

            Err(response)
        })
    }
}

/// A wrapper around [`tower_http::auth::AsyncRequireAuthorizationLayer`] which
/// rejects anonymous principals.
///
/// Requests without a [`Principal`], i.e. not passed through [`AuthLayer`],
/// are treated as anonymous.
pub struct RequireAuthenticationLayer;

impl RequireAuthenticationLayer {
    /// Requires an authenticated principal, otherwise rejects with
    /// [`http::StatusCode::UNAUTHORIZED`].
    pub fn login<ResBody>() -> AsyncRequireAuthorizationLayer<RequireLogin<ResBody>>
    where
        ResBody: HttpBody + Default,
    {
        AsyncRequireAuthorizationLayer::new(RequireLogin {
            login_url: None,
            redirect_field_name: None,
            _body_type: PhantomData,
        })
    }

    /// Requires an authenticated principal, otherwise redirects to the
    /// provided login URL.
    ///
    /// If `redirect_field_name` is set to a value, the login page will receive
    /// the path it was redirected from in the URI query part. For example,
    /// attempting to visit a protected path `/protected` would redirect you
    /// to `/login?next=%2Fprotected`.
    pub fn login_or_redirect<ResBody>(
        login_url: Arc<Cow<'static, str>>,
        redirect_field_name: Option<Arc<Cow<'static, str>>>,
    ) -> AsyncRequireAuthorizationLayer<RequireLogin<ResBody>>
    where
        ResBody: HttpBody + Default,
    {
        AsyncRequireAuthorizationLayer::new(RequireLogin {
            login_url: Some(login_url),
            redirect_field_name,
            _body_type: PhantomData,
        })
    }
}
