//! In-memory web sessions.
//!
//! Only the sponsor identity is kept; the directory password never is. Tokens
//! are opaque random values handed to the client, and the store is keyed by
//! their SHA-256 hash.

use crate::model::Sponsor;
use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

pub const SESSION_COOKIE_NAME: &str = "resetdesk_session";

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionConfig {
    /// Default config: 8h TTL, cookies without the `Secure` flag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(8 * 60 * 60),
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct SessionRecord {
    sponsor: Sponsor,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session and return the raw token for the client.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub async fn create(&self, sponsor: Sponsor) -> Result<String> {
        let token = generate_session_token()?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, record| record.expires_at > now);
        sessions.insert(
            hash_session_token(&token),
            SessionRecord {
                sponsor,
                expires_at: now + self.config.ttl,
            },
        );
        Ok(token)
    }

    /// Sponsor for a live token; expired entries are dropped on the way.
    pub async fn lookup(&self, token: &str) -> Option<Sponsor> {
        let key = hash_session_token(token);
        let mut sessions = self.sessions.lock().await;
        match sessions.get(&key) {
            Some(record) if record.expires_at > Instant::now() => Some(record.sponsor.clone()),
            Some(_) => {
                debug!("session expired");
                sessions.remove(&key);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.lock().await.remove(&hash_session_token(token));
    }

    /// Resolve the request's cookie or bearer token into a sponsor.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Option<Sponsor> {
        let token = extract_session_token(headers)?;
        self.lookup(&token).await
    }

    /// `HttpOnly` cookie carrying the session token.
    ///
    /// # Errors
    /// Returns an error if the token is not a valid header value.
    pub fn cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let ttl_seconds = self.config.ttl.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Expired cookie that clears the session on the client.
    ///
    /// # Errors
    /// Returns an error if the header value cannot be built.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Bearer token first, then the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
            .then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
