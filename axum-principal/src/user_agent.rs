//! User agent parsing used to describe session clients.

use crate::Result;

/// The families a user agent string resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub device: String,
    pub browser: String,
    pub os: String,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            device: OTHER.to_owned(),
            browser: OTHER.to_owned(),
            os: OTHER.to_owned(),
        }
    }
}

const OTHER: &str = "Other";

/// Parses `User-Agent` headers into device, browser and OS families.
///
/// Failing to run at all (e.g. missing parser data) is reported as
/// [`Error::UserAgent`](crate::Error::UserAgent), which aborts the request
/// rather than counting as missing credentials.
pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> Result<UserAgent>;
}

/// Reports every family as `"Other"`.
///
/// Applications that care about client details plug in a real parser via
/// [`SessionAuthenticator::with_user_agent_parser`](crate::SessionAuthenticator::with_user_agent_parser).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownUserAgent;

impl UserAgentParser for UnknownUserAgent {
    fn parse(&self, _user_agent: &str) -> Result<UserAgent> {
        Ok(UserAgent::default())
    }
}
