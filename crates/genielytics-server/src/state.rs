use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use genielytics_core::{analytics::AnalyticsStore, config::Config};

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The analytics store behind its trait seam. Production wires in
    /// `genielytics_postgres::PgBackend`; route tests substitute an
    /// in-memory mock.
    pub analytics: Arc<dyn AnalyticsStore>,

    /// Parsed configuration, loaded once at startup from environment
    /// variables.
    pub config: Arc<Config>,

    /// Per-IP sliding-window rate limiter for POST /api/events.
    ///
    /// Key: IP address string. Value: deque of request timestamps within the
    /// last 60 seconds. Limit: 60 requests per IP per 60-second window.
    rate_limiter: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl AppState {
    pub fn new(analytics: Arc<dyn AnalyticsStore>, config: Config) -> Self {
        Self {
            analytics,
            config: Arc::new(config),
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether `ip` is within the 60 req/min rate limit.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be
    /// rejected with 429. Slides the window on every call.
    pub async fn check_rate_limit(&self, ip: &str) -> bool {
        let mut map = self.rate_limiter.lock().await;
        let window = map.entry(ip.to_string()).or_default();
        let cutoff = Instant::now() - std::time::Duration::from_secs(60);
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
        if window.len() >= 60 {
            return false;
        }
        window.push_back(Instant::now());
        true
    }
}
