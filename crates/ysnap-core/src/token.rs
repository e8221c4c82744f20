//! Access token cache with lazy refresh.

use crate::client::VendorApi;
use crate::error::AuthError;
use crate::models::{Credentials, Token};
use chrono::Utc;
use tracing::{debug, info};

/// Holds the current access token and refreshes it once it has expired.
#[derive(Debug, Default)]
pub struct TokenManager {
    current: Option<Token>,
}

/// Token returned by [`TokenManager::ensure_valid_at`] and whether a refresh produced it.
#[derive(Debug, Clone)]
pub struct EnsuredToken {
    pub token: Token,
    pub refreshed: bool,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously issued token, e.g. one persisted by an earlier run.
    pub fn with_token(token: Token) -> Self {
        Self {
            current: Some(token),
        }
    }

    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    pub async fn ensure_valid<A: VendorApi>(
        &mut self,
        api: &A,
        creds: &Credentials,
    ) -> Result<EnsuredToken, AuthError> {
        self.ensure_valid_at(api, creds, Utc::now().timestamp_millis())
            .await
    }

    /// Return the cached token if it is still valid at `now_ms`, otherwise issue a new one.
    ///
    /// A failed refresh drops the stale token so it can never be used past expiry.
    pub async fn ensure_valid_at<A: VendorApi>(
        &mut self,
        api: &A,
        creds: &Credentials,
        now_ms: i64,
    ) -> Result<EnsuredToken, AuthError> {
        if let Some(token) = &self.current
            && token.is_valid_at(now_ms)
        {
            debug!(expires_at_ms = token.expires_at_ms, "reusing cached token");
            return Ok(EnsuredToken {
                token: token.clone(),
                refreshed: false,
            });
        }

        self.current = None;
        let token = api.issue_token(creds).await?;
        if !token.is_valid_at(now_ms) {
            return Err(AuthError::Malformed(format!(
                "issued token already expired at {}",
                token.expires_at_ms
            )));
        }
        info!(expires_at_ms = token.expires_at_ms, "access token refreshed");
        self.current = Some(token.clone());
        Ok(EnsuredToken {
            token,
            refreshed: true,
        })
    }
}
