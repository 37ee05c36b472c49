// hive-core/src/runtime/rate_limit.rs
// ============================================================================
// Module: HiveForge Rate Limiter & Cost Tracker
// Description: Per-model sliding-window RPM/TPM budgeting.
// Purpose: Cooperatively throttle collaborator calls instead of rejecting
//          them outright when a model's budget is momentarily exhausted.
// Dependencies: tokio::time, std::time
// ============================================================================

//! ## Overview
//! Each model gets its own sliding one-minute window of request timestamps
//! and token counts. `acquire` blocks (cooperatively, via `tokio::time`)
//! until the window has room rather than failing the caller outright; this
//! keeps the orchestrator's concurrency simple at the cost of latency under
//! load. Budgets are configured per model name; a model with no configured
//! budget falls back to [`RateLimitConfig::CONSERVATIVE_DEFAULT`] rather
//! than running unthrottled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

/// Sliding-window budget for a single model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per rolling 60-second window.
    pub requests_per_minute: u32,
    /// Maximum tokens per rolling 60-second window.
    pub tokens_per_minute: u64,
}

impl RateLimitConfig {
    /// The budget applied to a model with no explicit [`RateLimiter::configure`]
    /// call: conservative enough not to be mistaken for an informed limit.
    pub const CONSERVATIVE_DEFAULT: Self = Self { requests_per_minute: 20, tokens_per_minute: 40_000 };
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::CONSERVATIVE_DEFAULT
    }
}

/// Errors raised while acquiring rate-limiter budget.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The requested token estimate alone exceeds the model's entire
    /// per-minute token budget; no amount of waiting would satisfy it.
    #[error("requested {requested} tokens exceeds model budget of {budget} tokens per minute")]
    RequestExceedsBudget {
        /// Tokens requested in a single call.
        requested: u64,
        /// Configured per-minute token budget.
        budget: u64,
    },
}

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct ModelWindow {
    config: RateLimitConfig,
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, u64)>,
}

impl Default for ModelWindow {
    fn default() -> Self {
        Self { config: RateLimitConfig::default(), requests: VecDeque::new(), tokens: VecDeque::new() }
    }
}

impl ModelWindow {
    fn evict_stale(&mut self, now: Instant) {
        while self.requests.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
            self.requests.pop_front();
        }
        while self.tokens.front().is_some_and(|(t, _)| now.duration_since(*t) >= WINDOW) {
            self.tokens.pop_front();
        }
    }

    fn token_total(&self) -> u64 {
        self.tokens.iter().map(|(_, n)| n).sum()
    }

    /// Returns `None` when the window has room, or `Some(wait)` for how
    /// long the caller should sleep before re-checking.
    fn time_until_room(&self, now: Instant, estimated_tokens: u64) -> Option<Duration> {
        let config = self.config;
        let request_wait = if self.requests.len() as u32 >= config.requests_per_minute {
            self.requests.front().map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
        } else {
            None
        };
        let token_wait = if self.token_total() + estimated_tokens > config.tokens_per_minute {
            self.tokens.front().map(|(oldest, _)| WINDOW.saturating_sub(now.duration_since(*oldest)))
        } else {
            None
        };
        request_wait.into_iter().chain(token_wait).max()
    }
}

/// Per-model sliding-window rate limiter.
#[derive(Default)]
pub struct RateLimiter {
    models: Mutex<HashMap<String, ModelWindow>>,
}

impl RateLimiter {
    /// Creates a limiter with no configured budgets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the budget for a model. Pending history for that
    /// model is preserved.
    pub fn configure(&self, model: &str, config: RateLimitConfig) {
        let mut guard = self.models.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.entry(model.to_string()).or_default().config = config;
    }

    /// Blocks cooperatively until a call estimated at `estimated_tokens`
    /// tokens fits within the model's rolling budget, then records the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::RequestExceedsBudget`] if `estimated_tokens`
    /// alone exceeds the configured per-minute token budget.
    pub async fn acquire(&self, model: &str, estimated_tokens: u64) -> Result<(), RateLimitError> {
        loop {
            let wait = {
                let mut guard = self.models.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let window = guard.entry(model.to_string()).or_default();
                let now = Instant::now();
                window.evict_stale(now);
                if estimated_tokens > window.config.tokens_per_minute {
                    return Err(RateLimitError::RequestExceedsBudget {
                        requested: estimated_tokens,
                        budget: window.config.tokens_per_minute,
                    });
                }
                match window.time_until_room(now, estimated_tokens) {
                    Some(wait) => Some(wait),
                    None => {
                        window.requests.push_back(now);
                        window.tokens.push_back((now, estimated_tokens));
                        None
                    }
                }
            };
            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => return Ok(()),
            }
        }
    }

    /// Records the actual token usage of a call, replacing the estimate
    /// recorded by the most recent [`RateLimiter::acquire`] for this model
    /// if one is pending, or simply adding `actual_tokens` as a fresh entry
    /// otherwise.
    pub fn record_usage(&self, model: &str, actual_tokens: u64) {
        let mut guard = self.models.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = guard.entry(model.to_string()).or_default();
        let now = Instant::now();
        if let Some(last) = window.tokens.back_mut() {
            last.1 = actual_tokens;
        } else {
            window.tokens.push_back((now, actual_tokens));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_call_over_the_default_token_budget_errors_immediately() {
        let limiter = RateLimiter::new();
        let err = limiter.acquire("gpt-unconfigured", 100_000).await;
        assert!(matches!(err, Err(RateLimitError::RequestExceedsBudget { .. })));
    }

    #[test]
    fn unconfigured_model_window_admits_up_to_the_conservative_default_rpm() {
        let mut window = ModelWindow::default();
        let now = Instant::now();
        for _ in 0..RateLimitConfig::CONSERVATIVE_DEFAULT.requests_per_minute {
            assert!(window.time_until_room(now, 100).is_none());
            window.requests.push_back(now);
            window.tokens.push_back((now, 100));
        }
        // The window is now at the default RPM ceiling; one more request
        // must wait rather than be admitted immediately.
        assert!(window.time_until_room(now, 100).is_some());
    }

    #[tokio::test]
    async fn request_exceeding_budget_errors_immediately() {
        let limiter = RateLimiter::new();
        limiter.configure("small-model", RateLimitConfig { requests_per_minute: 10, tokens_per_minute: 100 });
        let err = limiter.acquire("small-model", 1_000).await;
        assert!(matches!(err, Err(RateLimitError::RequestExceedsBudget { .. })));
    }

    #[tokio::test]
    async fn requests_within_budget_do_not_block() {
        let limiter = RateLimiter::new();
        limiter.configure("model-a", RateLimitConfig { requests_per_minute: 5, tokens_per_minute: 1_000 });
        for _ in 0..5 {
            limiter.acquire("model-a", 100).await.expect("acquire");
        }
    }
}
