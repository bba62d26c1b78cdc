use std::sync::Arc;

use ferry_core::Depot;

use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    depot: Arc<dyn Depot>,
    rate_limiter: Arc<RateLimiter>,
    admin_key: Option<Arc<str>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        depot: Arc<dyn Depot>,
        rate_limiter: Arc<RateLimiter>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            depot,
            rate_limiter,
            admin_key: None,
            max_upload_bytes,
        }
    }

    /// Enables `/admin-stats` for callers presenting `key`. Without a key the
    /// endpoint always answers 403.
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        let key: String = key.into();
        self.admin_key = (!key.is_empty()).then(|| Arc::from(key));
        self
    }

    pub fn depot(&self) -> &dyn Depot {
        self.depot.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub(crate) fn admin_key_matches(&self, presented: &str) -> bool {
        self.admin_key
            .as_deref()
            .is_some_and(|key| key.as_bytes() == presented.as_bytes())
    }
}
