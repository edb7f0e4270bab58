//! Mock JWKS transport and manual clock.
//!
//! [`MockJwksFetcher`] serves a swappable document (or failure), counts
//! fetches and can simulate latency. [`ManualClock`] only moves when told.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use sso_auth::auth::{Clock, FetchError, JwksDocument, JwksFetcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory JWKS transport.
pub struct MockJwksFetcher {
    response: Mutex<Result<JwksDocument, FetchError>>,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl MockJwksFetcher {
    /// Serve the given JWKS JSON.
    pub fn serving(document: Value) -> Self {
        Self {
            response: Mutex::new(Ok(parse_document(document))),
            delay: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Fail every fetch with the given error.
    pub fn failing(error: FetchError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            delay: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Serve a new document from the next fetch on (key rotation).
    pub fn set_document(&self, document: Value) {
        *self.response.lock().unwrap() = Ok(parse_document(document));
    }

    /// Fail from the next fetch on (IdP outage).
    pub fn set_failure(&self, error: FetchError) {
        *self.response.lock().unwrap() = Err(error);
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for MockJwksFetcher {
    async fn fetch(&self) -> Result<JwksDocument, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.response.lock().unwrap().clone()
    }
}

fn parse_document(document: Value) -> JwksDocument {
    serde_json::from_value(document).expect("JWKS fixture should deserialize")
}

/// Clock that only moves when the test advances it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at a Unix timestamp.
    pub fn at_timestamp(timestamp: i64) -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(timestamp, 0).unwrap()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    /// Current time as a Unix timestamp.
    pub fn timestamp(&self) -> i64 {
        self.now.lock().unwrap().timestamp()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_fetcher_counts_and_swaps() {
        let fetcher = MockJwksFetcher::serving(json!({"keys": []}));
        assert!(fetcher.fetch().await.is_ok());

        fetcher.set_failure(FetchError::Status(500));
        assert_eq!(fetcher.fetch().await.unwrap_err(), FetchError::Status(500));
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_timestamp(1_000);
        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.timestamp(), 1_061);
        assert_eq!(clock.now().timestamp(), 1_061);
    }
}
