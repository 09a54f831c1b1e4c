//! One search session: compiler + caches + pacing wired to the host's
//! search collaborators.

use chrono::Utc;
use scour_core::{compile, Document};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{Result, SessionError};
use crate::field_cache::FieldCache;
use crate::field_state::FieldState;
use crate::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::traits::{FieldCapabilitiesProvider, SearchExecutor, SearchPage};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct SearchSession {
    executor: Arc<dyn SearchExecutor>,
    capabilities: Arc<dyn FieldCapabilitiesProvider>,
    cache: FieldCache,
    state: FieldState,
    limiter: RateLimiter,
    index: String,
    max_attempts: u32,
}

impl SearchSession {
    pub fn new(
        index: impl Into<String>,
        executor: Arc<dyn SearchExecutor>,
        capabilities: Arc<dyn FieldCapabilitiesProvider>,
        limiter_config: RateLimiterConfig,
    ) -> Result<Self> {
        Ok(Self {
            executor,
            capabilities,
            cache: FieldCache::new(),
            state: FieldState::new(),
            limiter: RateLimiter::new(limiter_config)?,
            index: index.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Bound the number of throttled attempts per search call.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Compile and execute one search: pace with the rate limiter, retry
    /// on throttling with escalating backoff, reset on success, then feed
    /// the returned documents into the field state and metadata cache.
    pub async fn search(
        &self,
        filters: &[String],
        size: i64,
        timeframe: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchPage> {
        let query = compile(filters, size, timeframe, Utc::now(), &self.cache)?;
        let mut attempts = 0;
        loop {
            self.limiter.wait_for_slot(cancel).await?;
            match self.executor.execute(&self.index, &query).await {
                Ok(page) => {
                    self.limiter.reset();
                    debug!(total = page.total, returned = page.documents.len(), "search succeeded");
                    self.absorb_documents(&page.documents).await;
                    return Ok(page);
                }
                Err(SessionError::Throttled) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return Err(SessionError::RetriesExhausted(attempts));
                    }
                    self.limiter.handle_too_many_requests();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Update discovered fields from a result page and refresh metadata
    /// for fields the cache has not seen. A failed capabilities fetch is
    /// logged and leaves the cache in its prior partial state; per-key
    /// sets keep partial refreshes from corrupting it.
    async fn absorb_documents(&self, documents: &[Document]) {
        self.state.update_from_documents(documents);
        let unknown = documents
            .iter()
            .flat_map(|doc| doc.keys())
            .any(|field| !self.cache.contains(field));
        if !unknown {
            return;
        }
        match self.capabilities.field_caps("*").await {
            Ok(caps) => self.cache.absorb_capabilities(&caps),
            Err(e) => warn!(error = %e, "field capabilities refresh failed"),
        }
    }

    /// Explicit metadata refresh for hosts that want the error.
    pub async fn refresh_capabilities(&self, glob: &str) -> Result<()> {
        let caps = self.capabilities.field_caps(glob).await?;
        self.cache.absorb_capabilities(&caps);
        Ok(())
    }

    /// Discard the per-index caches when the operator switches index.
    /// The rate limiter persists for the life of the session.
    pub fn switch_index(&mut self, index: impl Into<String>) {
        self.index = index.into();
        self.cache = FieldCache::new();
        self.state = FieldState::new();
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn fields(&self) -> &FieldState {
        &self.state
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
