//! Azure AD client-credentials authentication
//!
//! App-only access to Graph: the tenant's client id and secret are
//! exchanged for a bearer token, which is cached in memory until shortly
//! before it expires. Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Mutex;

use crate::config::GraphCredentials;

/// Source of bearer tokens for Graph requests
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token, acquiring a new one if needed
    fn access_token(&self) -> Result<String>;
}

/// A fixed bearer token that never refreshes
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token response from the identity platform
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<i64>,
}

/// Client-credentials token provider for one tenant
pub struct ClientCredentialsAuth {
    credentials: GraphCredentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsAuth {
    /// Scope granting the application permissions configured for the app
    const GRAPH_DEFAULT_SCOPE: &'static str = "https://graph.microsoft.com/.default";

    /// Seconds before expiry at which a cached token is considered stale
    const EXPIRY_BUFFER_SECS: i64 = 300;

    pub fn new(credentials: GraphCredentials) -> Self {
        let token_url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            urlencoding::encode(&credentials.tenant_id)
        );
        Self::with_token_url(credentials, token_url)
    }

    /// Use a non-default token endpoint (sovereign clouds, tests)
    pub fn with_token_url(credentials: GraphCredentials, token_url: impl Into<String>) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            cached: Mutex::new(None),
        }
    }

    fn request_token(&self) -> Result<TokenResponse> {
        let mut response = ureq::post(&self.token_url)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", Self::GRAPH_DEFAULT_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .with_context(|| format!("Failed to request access token from {}", self.token_url))?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
    }

    fn is_fresh(token: &CachedToken) -> bool {
        match token.expires_at {
            Some(expires_at) => {
                expires_at > chrono::Utc::now().timestamp() + Self::EXPIRY_BUFFER_SECS
            }
            None => false,
        }
    }
}

impl TokenProvider for ClientCredentialsAuth {
    fn access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(token) = cached.as_ref()
            && Self::is_fresh(token)
        {
            return Ok(token.access_token.clone());
        }

        let response = self.request_token()?;
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: response
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs as i64),
        };
        *cached = Some(token.clone());
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn credentials() -> GraphCredentials {
        GraphCredentials {
            tenant_id: "contoso.onmicrosoft.com".to_string(),
            client_id: "app-id".to_string(),
            client_secret: "app-secret".to_string(),
        }
    }

    #[test]
    fn test_default_token_url_is_tenant_scoped() {
        let auth = ClientCredentialsAuth::new(credentials());
        assert_eq!(
            auth.token_url,
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_freshness_uses_buffer() {
        let now = chrono::Utc::now().timestamp();
        let fresh = CachedToken {
            access_token: "a".into(),
            expires_at: Some(now + 3600),
        };
        let stale = CachedToken {
            access_token: "b".into(),
            expires_at: Some(now + 60),
        };
        let unknown = CachedToken {
            access_token: "c".into(),
            expires_at: None,
        };
        assert!(ClientCredentialsAuth::is_fresh(&fresh));
        assert!(!ClientCredentialsAuth::is_fresh(&stale));
        assert!(!ClientCredentialsAuth::is_fresh(&unknown));
    }

    #[test]
    fn test_token_is_requested_once_and_cached() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = String::new();
            let mut buf = [0u8; 4096];
            // Drain the whole form so closing the socket does not reset it
            while !request.contains("grant_type=client_credentials") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                request.push_str(&String::from_utf8_lossy(&buf[..read]));
            }
            let body = r#"{"token_type":"Bearer","expires_in":3599,"access_token":"eyJ0eXAi"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        let auth = ClientCredentialsAuth::with_token_url(
            credentials(),
            format!("http://{}/tenant/oauth2/v2.0/token", addr),
        );
        assert_eq!(auth.access_token().unwrap(), "eyJ0eXAi");
        // Served from cache; the server only accepts one connection
        assert_eq!(auth.access_token().unwrap(), "eyJ0eXAi");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /tenant/oauth2/v2.0/token"));
    }
}
