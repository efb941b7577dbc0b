//! OAuth2 client-credentials token management.
//!
//! [`TokenManager`] owns the one piece of shared mutable state in the crate:
//! the cached access token. Callers go through [`TokenSource::access_token`],
//! which returns the cached value while it is fresh and performs a grant
//! request otherwise. [`TokenSource::invalidate`] drops the cache so the next
//! call is forced onto the network, which is how the request gateway reacts
//! to a 401.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::Credentials;
use crate::error::Error;

pub const TOKEN_ENDPOINT: &str = "/v1/security/oauth2/token";

/// Tokens are treated as expired this many seconds early, so a request
/// started near the end of the window never carries a token that dies
/// mid-flight.
const EXPIRY_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn from_grant(value: String, expires_in: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: issued_at + Duration::seconds(expires_in - EXPIRY_BUFFER_SECS),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: i64,
}

/// Where the gateway gets its bearer tokens from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, Error>;
    fn invalidate(&self);
}

pub struct TokenManager {
    http: Client,
    token_url: String,
    credentials: Credentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(http: Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            http,
            token_url: format!("{base_url}{TOKEN_ENDPOINT}"),
            credentials,
            cached: Mutex::new(None),
        }
    }

    async fn request_grant(&self) -> Result<AccessToken, Error> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        Ok(AccessToken::from_grant(
            grant.access_token,
            grant.expires_in,
            Utc::now(),
        ))
    }

    #[cfg(test)]
    fn seed(&self, token: AccessToken) {
        *self.cached.lock().unwrap() = Some(token);
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    /// Returns the cached token while it is fresh; otherwise performs a
    /// client-credentials grant. A failed grant leaves the cache empty.
    async fn access_token(&self) -> Result<String, Error> {
        {
            let cached = self.cached.lock().unwrap();
            if let Some(token) = cached.as_ref() {
                if token.is_fresh(Utc::now()) {
                    return Ok(token.value.clone());
                }
            }
        }

        // TODO: coalesce concurrent first-callers behind one in-flight grant
        // instead of letting each issue its own request.
        let token = self.request_grant().await?;
        debug!(expires_at = %token.expires_at, "cached new access token");
        let value = token.value.clone();
        *self.cached.lock().unwrap() = Some(token);
        Ok(value)
    }

    fn invalidate(&self) {
        self.cached.lock().unwrap().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    /// Port 0 never accepts a connection, so any network attempt errors out
    /// immediately. A test that gets a token back proves no grant was sent.
    fn unreachable_manager() -> TokenManager {
        TokenManager::new(Client::new(), "http://127.0.0.1:0", credentials())
    }

    #[test]
    fn test_expiry_buffer_applied() {
        let now = Utc::now();
        let token = AccessToken::from_grant("t".to_string(), 1800, now);
        assert_eq!(token.expires_at, now + Duration::seconds(1500));
        assert!(token.is_fresh(now + Duration::seconds(1499)));
        assert!(!token.is_fresh(now + Duration::seconds(1500)));
    }

    #[tokio::test]
    async fn test_fresh_cached_token_skips_grant() {
        let manager = unreachable_manager();
        manager.seed(AccessToken {
            value: "cached".to_string(),
            expires_at: Utc::now() + Duration::seconds(600),
        });
        assert_eq!(manager.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_expired_token_forces_grant() {
        let manager = unreachable_manager();
        manager.seed(AccessToken {
            value: "stale".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        });
        assert!(matches!(
            manager.access_token().await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_grant() {
        let manager = unreachable_manager();
        manager.seed(AccessToken {
            value: "cached".to_string(),
            expires_at: Utc::now() + Duration::seconds(600),
        });
        manager.invalidate();
        assert!(matches!(
            manager.access_token().await,
            Err(Error::Auth(_))
        ));
    }
}
