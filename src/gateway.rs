//! Authenticated request gateway.
//!
//! Every outbound API call goes through [`Gateway::get_json`], which attaches
//! a bearer token from the [`TokenSource`] before dispatch. A 401 response on
//! the first attempt invalidates the cached token, fetches a fresh one, and
//! resends the request exactly once; a 401 on the retry is terminal. The
//! attempt state is an explicit enum threaded through the loop rather than a
//! flag on the request itself, so a logical request can never be retried
//! twice.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::TokenSource;
use crate::error::Error;

/// Per-request retry state: `Initial -> (401) -> Retried -> (401) -> failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retried,
}

pub struct Gateway {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl Gateway {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    /// GETs `{base_url}{path}` with the given query pairs and deserializes
    /// the JSON body.
    ///
    /// Non-success statuses other than 401 surface as [`Error::Http`]
    /// unmodified; 401 handling is described in [`send_with_refresh`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = format!("{}{}", self.base_url, path);
        let response = send_with_refresh(self.tokens.as_ref(), |token| {
            let request = self.http.get(&url).query(query).bearer_auth(token);
            async move { request.send().await }
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, %url, "request failed");
            return Err(Error::Http { status });
        }
        Ok(response.json::<T>().await?)
    }
}

/// Dispatches a request with a bearer token, refreshing and retrying once on
/// a 401.
///
/// `dispatch` is called with the token to use and must build and send the
/// request from scratch each time, since a retry needs a freshly built
/// request carrying the new credential. Token acquisition failure aborts the
/// request before dispatch; a second consecutive 401 becomes
/// [`Error::RetryExhausted`] with no third attempt.
pub(crate) async fn send_with_refresh<F, Fut>(
    tokens: &dyn TokenSource,
    mut dispatch: F,
) -> Result<Response, Error>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = Attempt::Initial;
    loop {
        let token = tokens.access_token().await?;
        let response = dispatch(token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        match attempt {
            Attempt::Initial => {
                debug!("received 401, refreshing token and retrying once");
                tokens.invalidate();
                attempt = Attempt::Retried;
            }
            Attempt::Retried => return Err(Error::RetryExhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeTokens {
        grants: AtomicUsize,
        invalidations: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for FakeTokens {
        async fn access_token(&self) -> Result<String, Error> {
            let n = self.grants.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{n}"))
        }

        fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingTokens;

    #[async_trait]
    impl TokenSource for FailingTokens {
        async fn access_token(&self) -> Result<String, Error> {
            Err(Error::Auth("grant refused".to_string()))
        }

        fn invalidate(&self) {}
    }

    fn response(status: u16) -> Response {
        Response::from(http::Response::builder().status(status).body("").unwrap())
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let tokens = FakeTokens::default();
        let sends = AtomicUsize::new(0);
        let result = send_with_refresh(&tokens, |_| {
            sends.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(200)) }
        })
        .await
        .unwrap();
        assert_eq!(result.status(), StatusCode::OK);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let tokens = FakeTokens::default();
        let sends = AtomicUsize::new(0);
        let result = send_with_refresh(&tokens, |_| {
            let n = sends.fetch_add(1, Ordering::SeqCst);
            async move { Ok(response(if n == 0 { 401 } else { 200 })) }
        })
        .await
        .unwrap();
        assert_eq!(result.status(), StatusCode::OK);
        assert_eq!(sends.load(Ordering::SeqCst), 2);
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.grants.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let tokens = FakeTokens::default();
        let sends = AtomicUsize::new(0);
        let result = send_with_refresh(&tokens, |_| {
            sends.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(401)) }
        })
        .await;
        assert!(matches!(result, Err(Error::RetryExhausted)));
        assert_eq!(sends.load(Ordering::SeqCst), 2);
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_statuses_are_not_retried() {
        let tokens = FakeTokens::default();
        let sends = AtomicUsize::new(0);
        let result = send_with_refresh(&tokens, |_| {
            sends.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(500)) }
        })
        .await
        .unwrap();
        assert_eq!(result.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_failure_aborts_before_dispatch() {
        let sends = AtomicUsize::new(0);
        let result = send_with_refresh(&FailingTokens, |_| {
            sends.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(200)) }
        })
        .await;
        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }
}
