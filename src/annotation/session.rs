use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AnnotationConfig;
use crate::error::ExternalServiceError;

/// An authenticated annotation service session with a fixed lifetime.
///
/// Logging in is slow on the annotation service side, so the token is
/// cached and reused. Each token records its creation time and is
/// replaced once it is older than the configured TTL; there is no other
/// invalidation path.
pub struct ExpiringSession {
    login_url: String,
    username: String,
    password: String,
    ttl: Duration,
    token: Mutex<Option<SessionToken>>,
}

struct SessionToken {
    key: String,
    created: Instant,
}

impl SessionToken {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
}

impl ExpiringSession {
    pub fn new(config: &AnnotationConfig) -> Self {
        Self {
            login_url: format!(
                "{}/api/auth/login",
                config.base_url.trim_end_matches('/')
            ),
            username: config.username.clone(),
            password: config.password.clone(),
            ttl: Duration::from_secs(config.session_ttl_secs),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid session token, logging in again if the cached one
    /// is missing or past its TTL.
    pub async fn token(&self, http: &reqwest::Client) -> Result<String, ExternalServiceError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.is_expired(self.ttl) {
                debug!("Reusing annotation service session");
                return Ok(token.key.clone());
            }
        }

        let key = self.login(http).await?;
        *guard = Some(SessionToken {
            key: key.clone(),
            created: Instant::now(),
        });

        Ok(key)
    }

    async fn login(&self, http: &reqwest::Client) -> Result<String, ExternalServiceError> {
        info!(login_url = %self.login_url, "Logging in to annotation service");

        let response = http
            .post(&self.login_url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::Status {
                operation: "login",
                status: response.status().as_u16(),
            });
        }

        let body: LoginResponse = response.json().await?;
        Ok(body.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let token = SessionToken {
            key: "k".to_string(),
            created: Instant::now(),
        };

        assert!(!token.is_expired(Duration::from_secs(600)));
    }

    #[test]
    fn token_expires_after_ttl() {
        let token = SessionToken {
            key: "k".to_string(),
            created: Instant::now() - Duration::from_secs(601),
        };

        assert!(token.is_expired(Duration::from_secs(600)));
    }

    #[test]
    fn zero_ttl_always_expires() {
        let token = SessionToken {
            key: "k".to_string(),
            created: Instant::now(),
        };

        assert!(token.is_expired(Duration::ZERO));
    }
}
