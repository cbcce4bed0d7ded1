use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Body,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use axum_principal::{
    axum_sessions::{async_session::MemoryStore as SessionMemoryStore, SessionLayer},
    memory_store::MemoryStore,
    secrecy::ExposeSecret,
    AuthLayer, AuthRequest, BasicAuthExtractor, BearerTokenExtractor, ChainCredentialsExtractor,
    ChainIdentityProvider, Credentials, Identity, IdentityProvider, InvalidCredentials, Principal,
    RememberToken, RequireAuthenticationLayer, WebLoginAuthenticator,
};
use http::{
    header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    Request, StatusCode,
};
use rand::Rng;
use tokio::sync::RwLock;
use tower::ServiceExt;

/// Knows `ferris` with password `hunter42`, by form or by Basic auth.
struct Accounts;

#[async_trait]
impl IdentityProvider for Accounts {
    async fn resolve(&self, credentials: &Credentials) -> axum_principal::Result<Identity> {
        let (user, password) = match credentials {
            Credentials::LoginForm(form) => (form.identifier(), form.password()),
            Credentials::BasicAuth(basic) => (basic.username(), basic.password()),
            _ => return Err(InvalidCredentials::new("password credentials expected").into()),
        };

        if user == "ferris" && password.expose_secret() == "hunter42" {
            Ok(Identity::Subject(user.to_owned()))
        } else {
            Err(InvalidCredentials::new("unknown account").into())
        }
    }

    fn name(&self) -> &str {
        "accounts"
    }
}

/// Knows API keys.
struct ApiKeys;

#[async_trait]
impl IdentityProvider for ApiKeys {
    async fn resolve(&self, credentials: &Credentials) -> axum_principal::Result<Identity> {
        match credentials {
            Credentials::BearerToken(bearer) if bearer.token() == "k-123" => {
                Ok(Identity::Subject("build-bot".into()))
            }
            _ => Err(InvalidCredentials::new("unknown api key").into()),
        }
    }

    fn name(&self) -> &str {
        "api_keys"
    }
}

type Authenticator = Arc<WebLoginAuthenticator<Accounts, MemoryStore>>;

async fn login_handler(
    Extension(authenticator): Extension<Authenticator>,
    request: AuthRequest,
    principal: Principal,
) -> Result<Response, StatusCode> {
    let identity = principal.web_login().ok_or(StatusCode::UNAUTHORIZED)?;
    authenticator
        .login(&request, identity, "Welcome!".into_response())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn logout_handler(
    Extension(authenticator): Extension<Authenticator>,
    request: AuthRequest,
    principal: Principal,
) -> Result<Response, StatusCode> {
    authenticator
        .logout(&request, principal.identity(), "Bye!".into_response())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn protected_handler(principal: Principal) -> impl IntoResponse {
    format!("Logged in as: {}", principal.identity().canonical())
}

/// Returns the `name=value` pairs set by the response, keyed by name.
fn set_cookies(res: &Response) -> HashMap<String, String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            let name = pair.split('=').next().unwrap();
            (name.to_owned(), pair.to_owned())
        })
        .collect()
}

async fn body_string(res: Response) -> String {
    let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get_page(uri: &str, cookies: &[&str]) -> Request<Body> {
    let mut request = Request::get(uri);
    if !cookies.is_empty() {
        request = request.header(COOKIE, cookies.join("; "));
    }
    request.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str, cookies: &[&str]) -> Request<Body> {
    let mut request = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if !cookies.is_empty() {
        request = request.header(COOKIE, cookies.join("; "));
    }
    request.body(Body::from(form.to_owned())).unwrap()
}

#[tokio::test]
async fn web_login_flow() {
    let secret = rand::thread_rng().gen::<[u8; 64]>();
    let session_layer = SessionLayer::new(SessionMemoryStore::new(), &secret);

    let tokens = Arc::new(RwLock::new(HashMap::<String, RememberToken>::new()));
    let authenticator = Arc::new(WebLoginAuthenticator::new(
        Accounts,
        MemoryStore::new(&tokens),
    ));

    let app = Router::new()
        .route("/", get(protected_handler))
        .route_layer(RequireAuthenticationLayer::login())
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .layer(AuthLayer::from_authenticator(Arc::clone(&authenticator)))
        .layer(Extension(authenticator))
        .layer(session_layer);

    // A logged out user is turned away.
    let res = app.clone().oneshot(get_page("/", &[])).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Log in with invalid credentials.
    let res = app
        .clone()
        .oneshot(post_form("/login", "email=ferris&password=bogus", &[]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(tokens.read().await.is_empty());

    // Log in with valid credentials, asking to be remembered.
    let res = app
        .clone()
        .oneshot(post_form(
            "/login",
            "email=ferris&password=hunter42&remember=on",
            &[],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert_eq!(body_string(res).await, "Welcome!");
    assert_eq!(tokens.read().await.len(), 1);

    let remember_cookie = cookies.get("lgrem").unwrap().clone();
    let session_cookie = cookies
        .iter()
        .find(|(name, _)| name.as_str() != "lgrem")
        .map(|(_, pair)| pair.clone())
        .unwrap();

    // The session identifies the user.
    let res = app
        .clone()
        .oneshot(get_page("/", &[&session_cookie]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "Logged in as: ferris");

    // So does the remember cookie, without a session.
    let res = app
        .clone()
        .oneshot(get_page("/", &[&remember_cookie]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "Logged in as: ferris");

    // Log out, revoking the remember token and expiring its cookie.
    let res = app
        .clone()
        .oneshot(post_form(
            "/logout",
            "",
            &[&session_cookie, &remember_cookie],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(set_cookies(&res).get("lgrem").map(String::as_str), Some("lgrem="));
    assert!(tokens.read().await.is_empty());

    // Neither the session nor the remember cookie identify the user anymore.
    for cookie in [&session_cookie, &remember_cookie] {
        let res = app.clone().oneshot(get_page("/", &[cookie])).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn api_credentials_chain() {
    let extractor = ChainCredentialsExtractor::new()
        .with(BearerTokenExtractor)
        .with(BasicAuthExtractor);
    let provider = ChainIdentityProvider::new().with(ApiKeys).with(Accounts);

    let app = Router::new()
        .route("/", get(protected_handler))
        .route_layer(RequireAuthenticationLayer::login())
        .layer(AuthLayer::new(extractor, provider));

    let cases = [
        (None, StatusCode::UNAUTHORIZED, None),
        (Some("Bearer k-123"), StatusCode::OK, Some("build-bot")),
        (Some("Bearer k-999"), StatusCode::UNAUTHORIZED, None),
        (
            Some("Basic ZmVycmlzOmh1bnRlcjQy"),
            StatusCode::OK,
            Some("ferris"),
        ),
        (Some("Basic ZmVycmlzOmJvZ3Vz"), StatusCode::UNAUTHORIZED, None),
    ];

    for (authorization, status, subject) in cases {
        let mut request = Request::get("/");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        let res = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), status, "{authorization:?}");
        if let Some(subject) = subject {
            assert_eq!(body_string(res).await, format!("Logged in as: {subject}"));
        }
    }
}
