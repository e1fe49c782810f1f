//! Bearer-token guard for tool calls.
//!
//! Every tool call must carry `Authorization: Bearer <token>`. The guard always performs the
//! structural check in [`bearer`]. In [`AuthMode::Remote`] it then asks the backend whether the
//! token is valid:
//!
//! - 2xx: the token is accepted
//! - 401/403: `Unauthorized`
//! - any other status, or no answer at all: `UpstreamError`
//!
//! Results are never cached. Tokens can be revoked at any time and the validation call is cheap
//! next to the provider call that follows it.

pub mod bearer;

use axum::http::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{AuthMode, Config};
use crate::errors::{Error, Result};
use crate::http::{TransferError, error_for_status, join_path};
use crate::types::AuthToken;

pub use bearer::extract_bearer;

#[derive(Debug, Clone)]
pub struct Authenticator {
    mode: AuthMode,
    client: Client,
    validate_url: Url,
}

impl Authenticator {
    pub fn new(config: &Config, client: Client) -> anyhow::Result<Self> {
        let validate_url = join_path(&config.api_base_url, &config.auth.validate_path)?;
        Ok(Self {
            mode: config.auth.mode,
            client,
            validate_url,
        })
    }

    /// Gate a request: returns the caller's token or a typed failure.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthToken> {
        let token = extract_bearer(headers)?;

        if self.mode == AuthMode::Local {
            debug!(token = %token, "Token accepted (local mode)");
            return Ok(token);
        }

        let outcome = match self
            .client
            .get(self.validate_url.clone())
            .bearer_auth(token.expose())
            .send()
            .await
        {
            Ok(response) => error_for_status(response).await.map(|_| ()),
            Err(e) => Err(TransferError::from(e)),
        };

        match outcome {
            Ok(()) => {
                debug!(token = %token, "Token validated by backend");
                Ok(token)
            }
            Err(TransferError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                debug!(token = %token, %status, "Backend rejected token");
                Err(Error::unauthorized("invalid or expired token"))
            }
            Err(e) => {
                warn!(token = %token, error = %e, "Token validation call failed");
                Err(Error::upstream(format!("token validation failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::install_crypto_provider;
    use axum::http::{HeaderValue, header::AUTHORIZATION};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        headers
    }

    fn authenticator(server: &MockServer, mode: AuthMode) -> Authenticator {
        install_crypto_provider();
        let mut config = Config::default();
        config.api_base_url = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
        config.auth.mode = mode;
        Authenticator::new(&config, Client::new()).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_remote_accepts_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .and(header("authorization", "Bearer good-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let token = authenticator(&server, AuthMode::Remote)
            .authenticate(&bearer("good-token"))
            .await
            .unwrap();
        assert_eq!(token.expose(), "good-token");
    }

    #[test_log::test(tokio::test)]
    async fn test_remote_rejection_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = authenticator(&server, AuthMode::Remote)
            .authenticate(&bearer("stale"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized: invalid or expired token");
    }

    #[test_log::test(tokio::test)]
    async fn test_remote_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = authenticator(&server, AuthMode::Remote)
            .authenticate(&bearer("tok"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UpstreamError");
        assert!(err.to_string().contains("503"), "{err}");
        assert!(!err.to_string().contains("tok "), "{err}");
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_header_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc"));
        let err = authenticator(&server, AuthMode::Remote).authenticate(&headers).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_local_mode_skips_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(401)).expect(0).mount(&server).await;

        let token = authenticator(&server, AuthMode::Local)
            .authenticate(&bearer("anything"))
            .await
            .unwrap();
        assert_eq!(token.expose(), "anything");
    }
}
