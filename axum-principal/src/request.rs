//! The per-request view credential extractors read from.

use std::{collections::HashMap, net::SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{
        header::{self, AsHeaderName, HeaderName, HeaderValue},
        request::Parts,
        HeaderMap, Method,
    },
};
use axum_sessions::SessionHandle;
use cookie::Cookie;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// Proxy headers consulted for the client address, most trusted first.
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_PROXY_USER_IP: &str = "x-proxyuser-ip";
const X_REAL_IP: &str = "x-real-ip";

/// What credential extractors may observe about an inbound request.
///
/// Built once per request by [`AuthLayer`](crate::AuthLayer) and also
/// inserted into the request extensions, so handlers can hand it back to
/// [`WebLoginAuthenticator::login`](crate::WebLoginAuthenticator::login) and
/// [`WebLoginAuthenticator::logout`](crate::WebLoginAuthenticator::logout).
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    form: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
    session: Option<SessionHandle>,
}

impl AuthRequest {
    /// Creates a bare request view, mostly useful in tests.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builds the view from request parts and an already parsed form body.
    ///
    /// The remote address comes from axum's `ConnectInfo<SocketAddr>` and the
    /// session from the `axum-sessions` session handle, when present.
    pub fn from_parts(parts: &Parts, form: HashMap<String, String>) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_owned(),
            headers: parts.headers.clone(),
            form,
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            session: parts.extensions.get::<SessionHandle>().cloned(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the header as a string, if present and visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns a field of the url-encoded request body.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The session handle installed by the session layer, if any.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Returns the value of the named request cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value))
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_owned())
    }

    /// Resolves the client address.
    ///
    /// The first entry of `X-Forwarded-For` wins, then `X-ProxyUser-Ip`, then
    /// `X-Real-Ip`, then the connection address. Empty when none is known.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .header(X_FORWARDED_FOR)
            .and_then(|value| value.split(',').next())
            .map(str::trim);

        [forwarded, self.header(X_PROXY_USER_IP), self.header(X_REAL_IP)]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|ip| !ip.is_empty())
            .map(str::to_owned)
            .or_else(|| self.remote_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_default()
    }
}

pub(crate) fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

pub(crate) fn parse_form(body: &[u8]) -> HashMap<String, String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .map(|fields| fields.into_iter().collect())
        .unwrap_or_default()
}
