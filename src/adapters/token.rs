use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::domain::PartnerError;

/// Bearer token as returned by the partner auth endpoint
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Cached bearer credential. Readers share the fast path; refreshes are
/// serialized so concurrent misses trigger a single upstream call.
#[derive(Debug)]
pub struct TokenCache {
    margin: Duration,
    cached: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    /// `margin` is subtracted from every token lifetime
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    async fn current(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|token| Instant::now() < token.expires_at)
            .map(|token| token.value.clone())
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, PartnerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, PartnerError>>,
    {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let issued = refresh().await?;
        let lifetime = issued.expires_in.saturating_sub(self.margin);
        let value = issued.access_token.clone();

        *self.cached.write().await = Some(CachedToken {
            value: issued.access_token,
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(valid_for_secs = lifetime.as_secs(), "partner token refreshed");

        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
