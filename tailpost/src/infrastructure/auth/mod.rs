//! Attaches credentials to outbound sink requests per a configured scheme,
//! and — for the two schemes that support it — authenticates inbound
//! requests so the health server can reuse the same configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio::sync::Mutex;

use tailpost_domain::config::AuthSettings;
use tailpost_domain::TailPostError;

/// Runtime counterpart of [`AuthSettings`]: owns whatever state a scheme
/// needs at request time (a cached bearer token, an OAuth2 token cache)
/// that the pure config value doesn't carry.
#[derive(Clone)]
pub enum AuthAttacher {
    None,
    Basic {
        user: String,
        pass: String,
    },
    Bearer {
        token: String,
    },
    OAuth2(Arc<OAuth2State>),
    CustomHeaders {
        headers: BTreeMap<String, String>,
    },
}

pub struct OAuth2State {
    client_id: String,
    client_secret: String,
    token_url: String,
    scopes: Vec<String>,
    http: reqwest::Client,
    cached: Mutex<Option<(String, Instant)>>,
}

impl AuthAttacher {
    /// Builds the runtime attacher from config, performing the one-time,
    /// construction-only work each scheme requires: reading a bearer token
    /// file once (token rotation needs a restart, matching the core's
    /// documented credential-lifetime behavior).
    pub fn from_settings(settings: &AuthSettings, http: reqwest::Client) -> Result<Self, TailPostError> {
        match settings {
            AuthSettings::None => Ok(AuthAttacher::None),
            AuthSettings::Basic { user, pass } => Ok(AuthAttacher::Basic {
                user: user.clone(),
                pass: pass.clone(),
            }),
            AuthSettings::Bearer { token_file } => {
                let token = std::fs::read_to_string(token_file)
                    .map_err(|e| TailPostError::auth(format!("cannot read token_file {token_file}: {e}")))?;
                Ok(AuthAttacher::Bearer {
                    token: token.trim().to_string(),
                })
            }
            AuthSettings::Oauth2 {
                client_id,
                client_secret,
                token_url,
                scopes,
            } => Ok(AuthAttacher::OAuth2(Arc::new(OAuth2State {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                token_url: token_url.clone(),
                scopes: scopes.clone(),
                http,
                cached: Mutex::new(None),
            }))),
            AuthSettings::CustomHeaders { headers } => Ok(AuthAttacher::CustomHeaders {
                headers: headers.clone(),
            }),
        }
    }

    /// Mutates an outbound request builder to carry this scheme's
    /// credentials.
    pub async fn attach(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, TailPostError> {
        match self {
            AuthAttacher::None => Ok(builder),
            AuthAttacher::Basic { user, pass } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
                Ok(builder.header(AUTHORIZATION, format!("Basic {encoded}")))
            }
            AuthAttacher::Bearer { token } => Ok(builder.header(AUTHORIZATION, format!("Bearer {token}"))),
            AuthAttacher::OAuth2(state) => {
                let token = state.access_token().await?;
                Ok(builder.header(AUTHORIZATION, format!("Bearer {token}")))
            }
            AuthAttacher::CustomHeaders { headers } => {
                let mut builder = builder;
                for (key, value) in headers {
                    let name = HeaderName::from_bytes(key.as_bytes())
                        .map_err(|e| TailPostError::auth(format!("invalid header name {key}: {e}")))?;
                    let value = HeaderValue::from_str(value)
                        .map_err(|e| TailPostError::auth(format!("invalid header value for {key}: {e}")))?;
                    builder = builder.header(name, value);
                }
                Ok(builder)
            }
        }
    }

    /// Authenticates an inbound request, used by the health server's
    /// auth-gate middleware. Only `Basic` and `CustomHeaders` support this;
    /// `OAuth2` reports an error if invoked — OAuth2-protected health
    /// endpoints are deliberately unsupported.
    pub fn authenticate(&self, headers: &reqwest::header::HeaderMap) -> Result<bool, TailPostError> {
        match self {
            AuthAttacher::None => Ok(true),
            AuthAttacher::Basic { user, pass } => {
                let expected = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
                let expected_header = format!("Basic {expected}");
                Ok(headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(|actual| actual == expected_header)
                    .unwrap_or(false))
            }
            AuthAttacher::CustomHeaders { headers: expected } => Ok(expected.iter().all(|(key, value)| {
                headers
                    .get(key.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(|actual| actual == value)
                    .unwrap_or(false)
            })),
            AuthAttacher::Bearer { .. } | AuthAttacher::OAuth2(_) => Err(TailPostError::auth(
                "authenticate() is not supported for this auth scheme".to_string(),
            )),
        }
    }
}

impl OAuth2State {
    /// Obtains an access token via the client-credentials flow, caching it
    /// until a minute before its reported expiry.
    async fn access_token(&self) -> Result<String, TailPostError> {
        {
            let cached = self.cached.lock().await;
            if let Some((token, expires_at)) = cached.as_ref() {
                if Instant::now() < *expires_at {
                    return Ok(token.clone());
                }
            }
        }

        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let scope_string = self.scopes.join(" ");
        if !self.scopes.is_empty() {
            params.push(("scope", scope_string.as_str()));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TailPostError::auth(format!("oauth2 token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TailPostError::auth(format!(
                "oauth2 token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TailPostError::auth(format!("invalid oauth2 token response: {e}")))?;

        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(60).max(1));
        *self.cached.lock().await = Some((body.access_token.clone(), expires_at));
        Ok(body.access_token)
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_attach_sets_expected_header() {
        let attacher = AuthAttacher::Basic {
            user: "u".to_string(),
            pass: "p".to_string(),
        };
        let client = reqwest::Client::new();
        let req = attacher
            .attach(client.post("http://example.test"))
            .await
            .unwrap()
            .build()
            .unwrap();
        let header = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(header, "Basic dTpw");
    }

    #[test]
    fn basic_authenticate_accepts_matching_header_only() {
        let attacher = AuthAttacher::Basic {
            user: "u".to_string(),
            pass: "p".to_string(),
        };
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dTpw"));
        assert!(attacher.authenticate(&headers).unwrap());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic wrong"));
        assert!(!attacher.authenticate(&headers).unwrap());
    }

    #[test]
    fn bearer_authenticate_is_unsupported() {
        let attacher = AuthAttacher::Bearer {
            token: "t".to_string(),
        };
        let headers = reqwest::header::HeaderMap::new();
        assert!(attacher.authenticate(&headers).is_err());
    }
}
