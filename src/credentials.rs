//! Cloudflare credential selection
//!
//! Picks bearer-token auth when a token is configured, otherwise falls back to
//! the legacy `X-Auth-Email` / `X-Auth-Key` pair.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::Settings;
use crate::error::{DmarcError, Result};

/// Authentication material for the Cloudflare API
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Scoped API token
    ApiToken(String),
    /// Global API key with the account email
    GlobalKey { email: String, api_key: String },
}

impl Credentials {
    /// Select credentials from settings. A token always wins over email + key.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        if let Some(token) = settings.api_token() {
            return Ok(Self::ApiToken(token.to_string()));
        }

        match (settings.email(), settings.api_key()) {
            (Some(email), Some(api_key)) => Ok(Self::GlobalKey {
                email: email.to_string(),
                api_key: api_key.to_string(),
            }),
            _ => Err(DmarcError::MissingCredentials),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiToken(_) => "api token",
            Self::GlobalKey { .. } => "global api key",
        }
    }

    /// Request headers for this auth mode
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self {
            Self::ApiToken(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| DmarcError::InvalidHeader("CLOUDFLARE_API_TOKEN"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Self::GlobalKey { email, api_key } => {
                let email = HeaderValue::from_str(email)
                    .map_err(|_| DmarcError::InvalidHeader("CLOUDFLARE_EMAIL"))?;
                let mut key = HeaderValue::from_str(api_key)
                    .map_err(|_| DmarcError::InvalidHeader("CLOUDFLARE_API_KEY"))?;
                key.set_sensitive(true);
                headers.insert(HeaderName::from_static("x-auth-email"), email);
                headers.insert(HeaderName::from_static("x-auth-key"), key);
            }
        }

        Ok(headers)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken(_) => f.debug_tuple("ApiToken").field(&"<redacted>").finish(),
            Self::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}
