//! JWKS Key Cache for the IdP's public signing keys.
//!
//! The cache fetches the IdP's JWKS document, decodes every usable RS256
//! signing key, and serves lookups by key ID with a time-bounded freshness
//! window (default 24 hours).
//!
//! # State machine
//!
//! ```text
//! Empty --fetch ok--> Populated --ttl elapsed--> Stale --fetch ok--> Populated
//! Empty --fetch failed--> Empty (retried on next lookup)
//! Stale --fetch failed--> Stale (cached keys keep working)
//! ```
//!
//! # Concurrency
//!
//! - The key set is an immutable `Arc<KeySet>` swapped wholesale under a
//!   lock; readers never observe a partially replaced map.
//! - Refreshes are single-flighted: concurrent callers join one in-flight
//!   fetch and share its result.
//! - The fetch runs in its own task, so a caller dropping its request future
//!   never cancels a refresh other callers are waiting on.
//! - Waiting on a refresh is bounded by the fetch timeout (10s).

use crate::auth::clock::Clock;
use crate::auth::keys::{decode_jwk_value, CachedKey};
use crate::observability::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed timeout for one JWKS fetch, and for waiting on an in-flight one.
pub const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client identifier sent with every JWKS request.
pub const JWKS_USER_AGENT: &str = concat!("sso-auth-jwks/", env!("CARGO_PKG_VERSION"));

/// JWKS document as returned by the IdP.
///
/// Entries are kept as raw JSON so one malformed entry can be skipped
/// without failing the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksDocument {
    /// Key entries; `None` when the document has no `keys` member.
    #[serde(default)]
    pub keys: Option<Vec<serde_json::Value>>,
}

/// Errors fetching or interpreting the JWKS document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("JWKS request failed: {0}")]
    Transport(String),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    #[error("JWKS response could not be parsed: {0}")]
    Parse(String),

    #[error("JWKS response contained no valid signing keys")]
    NoValidKeys,

    #[error("JWKS fetch timed out")]
    Timeout,

    #[error("JWKS refresh task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Parse(_) => "parse",
            FetchError::NoValidKeys => "no_valid_keys",
            FetchError::Timeout => "timeout",
            FetchError::Task(_) => "task",
        }
    }
}

/// Errors looking up a key by ID.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyLookupError {
    /// The key ID is not published, even after a forced refresh.
    #[error("Signing key not found")]
    NotFound,

    /// The cache has never been populated and the fetch failed.
    #[error("No signing keys available: {0}")]
    NoKeysAvailable(FetchError),
}

/// Transport used by the cache to retrieve the JWKS document.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetch the current JWKS document.
    async fn fetch(&self) -> Result<JwksDocument, FetchError>;
}

/// HTTP transport for the IdP's JWKS endpoint.
pub struct HttpJwksFetcher {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client with fixed timeout and user agent.
    http_client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// Create a fetcher for the given JWKS URL.
    pub fn new(jwks_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .user_agent(JWKS_USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "sso.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<JwksDocument, FetchError> {
        tracing::debug!(target: "sso.auth.jwks", "Fetching JWKS from IdP");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response.json::<JwksDocument>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Parse(e.to_string())
            }
        })
    }
}

/// A fully populated, immutable set of decoded signing keys.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Arc<CachedKey>>,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl KeySet {
    /// Look up a key by ID.
    pub fn get(&self, kid: &str) -> Option<Arc<CachedKey>> {
        self.keys.get(kid).cloned()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty (never true for a set built from a fetch).
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key IDs in the set, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    /// When the set was fetched.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Stale once `now > fetched_at + ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .map_or(false, |expires_at| now > expires_at)
    }
}

/// Which population attempt a fetch is, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPhase {
    /// No key set has ever been cached.
    Initial,
    /// Replacing an existing (fresh or stale) key set.
    Refresh,
}

impl FetchPhase {
    fn as_str(self) -> &'static str {
        match self {
            FetchPhase::Initial => "initial",
            FetchPhase::Refresh => "refresh",
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Arc<KeySet>, FetchError>>>;

/// State shared between the cache and its spawned refresh tasks.
#[derive(Default)]
struct CacheState {
    /// Current key set; `None` until the first successful fetch.
    key_set: RwLock<Option<Arc<KeySet>>>,

    /// The refresh currently in flight, if any.
    in_flight: Mutex<Option<SharedRefresh>>,
}

/// JWKS Key Cache.
///
/// Construct once at startup and share behind an `Arc`. Call
/// [`JwksCache::warm_up`] after construction for best-effort eager
/// population; lookups populate lazily otherwise.
pub struct JwksCache {
    /// Transport for the JWKS document.
    fetcher: Arc<dyn JwksFetcher>,

    /// Clock for freshness checks.
    clock: Arc<dyn Clock>,

    /// Freshness window for a fetched key set.
    ttl: Duration,

    /// Bound on a single fetch and on waiting for an in-flight one.
    fetch_timeout: Duration,

    state: Arc<CacheState>,
}

impl JwksCache {
    /// Create a cache with the default 24 hour TTL.
    pub fn new(fetcher: Arc<dyn JwksFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(fetcher, clock, DEFAULT_CACHE_TTL)
    }

    /// Create a cache with a custom TTL.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Transport for the JWKS document
    /// * `clock` - Clock used for freshness checks
    /// * `ttl` - How long a fetched key set stays fresh
    pub fn with_ttl(fetcher: Arc<dyn JwksFetcher>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            fetcher,
            clock,
            ttl,
            fetch_timeout: JWKS_FETCH_TIMEOUT,
            state: Arc::new(CacheState::default()),
        }
    }

    /// Override the fetch/wait timeout.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Snapshot of the current key set, fresh or stale.
    pub async fn current(&self) -> Option<Arc<KeySet>> {
        self.state.key_set.read().await.clone()
    }

    /// Whether any key set has been cached.
    pub async fn is_populated(&self) -> bool {
        self.state.key_set.read().await.is_some()
    }

    /// Number of cached keys (0 when empty).
    pub async fn key_count(&self) -> usize {
        self.state
            .key_set
            .read()
            .await
            .as_ref()
            .map_or(0, |set| set.len())
    }

    /// Best-effort startup population.
    ///
    /// A failure is logged and returned; the cache stays empty and the next
    /// lookup retries.
    #[instrument(skip(self))]
    pub async fn warm_up(&self) -> Result<(), FetchError> {
        match self.refresh(false).await {
            Ok(set) => {
                tracing::info!(target: "sso.auth.jwks", key_count = set.len(), "JWKS cache warmed up");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    target: "sso.auth.jwks",
                    error = %e,
                    "JWKS warm-up failed, keys will be fetched on first lookup"
                );
                Err(e)
            }
        }
    }

    /// Get a key by ID.
    ///
    /// 1. Serve from the current set; refresh first if it is stale or empty.
    /// 2. If the key is missing and step 1 did not already attempt a refresh,
    ///    force exactly one refresh and look again.
    ///
    /// A failed refresh of a stale set falls back to the stale set.
    ///
    /// # Errors
    ///
    /// - `KeyLookupError::NoKeysAvailable` if nothing was ever cached and the
    ///   fetch failed
    /// - `KeyLookupError::NotFound` if the key ID is not published
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<CachedKey>, KeyLookupError> {
        let snapshot = self.current().await;
        let now = self.clock.now();

        let (key_set, refresh_attempted) = match snapshot {
            Some(set) if !set.is_stale(now) => (set, false),
            previous => match self.refresh(false).await {
                Ok(set) => (set, true),
                Err(e) => match previous {
                    Some(stale) => {
                        tracing::warn!(
                            target: "sso.auth.jwks",
                            error = %e,
                            "Serving stale JWKS after failed refresh"
                        );
                        (stale, true)
                    }
                    None => return Err(KeyLookupError::NoKeysAvailable(e)),
                },
            },
        };

        if let Some(key) = key_set.get(kid) {
            tracing::debug!(target: "sso.auth.jwks", "JWKS cache hit");
            return Ok(key);
        }

        if refresh_attempted {
            tracing::warn!(target: "sso.auth.jwks", "Key not found in freshly refreshed JWKS");
            return Err(KeyLookupError::NotFound);
        }

        // Unknown key ID: it may have just rotated in
        tracing::debug!(target: "sso.auth.jwks", "Key not found in JWKS cache, forcing refresh");
        match self.refresh(true).await {
            Ok(set) => set.get(kid).ok_or_else(|| {
                tracing::warn!(target: "sso.auth.jwks", "Key not found in JWKS after refresh");
                KeyLookupError::NotFound
            }),
            Err(e) => {
                tracing::warn!(
                    target: "sso.auth.jwks",
                    error = %e,
                    "Forced JWKS refresh failed, treating key as unknown"
                );
                Err(KeyLookupError::NotFound)
            }
        }
    }

    /// Refresh the key set.
    ///
    /// Without `force`, a fresh cached set is returned without fetching.
    /// Concurrent callers share one in-flight fetch. On success the whole key
    /// set is replaced; on failure the previous set is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the `FetchError` of the shared fetch, or `FetchError::Timeout`
    /// if it does not complete within the fetch timeout.
    pub async fn refresh(&self, force: bool) -> Result<Arc<KeySet>, FetchError> {
        if !force {
            if let Some(set) = self.current().await {
                if !set.is_stale(self.clock.now()) {
                    return Ok(set);
                }
            }
        }

        let shared = {
            let mut in_flight = self.state.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(existing) if existing.peek().is_none() => {
                    metrics::record_jwks_refresh_joined();
                    tracing::debug!(target: "sso.auth.jwks", "Joining in-flight JWKS refresh");
                    existing.clone()
                }
                _ => {
                    let refresh = self.spawn_refresh();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        match tokio::time::timeout(self.fetch_timeout, shared).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(target: "sso.auth.jwks", "Timed out waiting for JWKS refresh");
                Err(FetchError::Timeout)
            }
        }
    }

    /// Start a refresh task and return a shareable handle to its result.
    ///
    /// Must be called with the `in_flight` lock held; the task clears the
    /// slot only after it has published its result.
    fn spawn_refresh(&self) -> SharedRefresh {
        let fetcher = Arc::clone(&self.fetcher);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let fetch_timeout = self.fetch_timeout;

        let handle = tokio::spawn(async move {
            let phase = if state.key_set.read().await.is_some() {
                FetchPhase::Refresh
            } else {
                FetchPhase::Initial
            };

            let result =
                fetch_key_set(fetcher.as_ref(), clock.as_ref(), ttl, fetch_timeout, phase).await;

            if let Ok(set) = &result {
                *state.key_set.write().await = Some(Arc::clone(set));
                metrics::set_jwks_cached_keys(set.len());
            }

            state.in_flight.lock().await.take();
            result
        });

        handle
            .map(|joined| joined.unwrap_or_else(|e| Err(FetchError::Task(e.to_string()))))
            .boxed()
            .shared()
    }
}

/// Fetch and decode one key set, recording metrics and logs for the attempt.
async fn fetch_key_set(
    fetcher: &dyn JwksFetcher,
    clock: &dyn Clock,
    ttl: Duration,
    fetch_timeout: Duration,
    phase: FetchPhase,
) -> Result<Arc<KeySet>, FetchError> {
    let start = Instant::now();

    let result = match tokio::time::timeout(fetch_timeout, fetcher.fetch()).await {
        Ok(Ok(document)) => build_key_set(document, clock.now(), ttl).map(Arc::new),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FetchError::Timeout),
    };

    match &result {
        Ok(set) => {
            metrics::record_jwks_fetch("success", phase.as_str(), None, start.elapsed());
            tracing::info!(
                target: "sso.auth.jwks",
                key_count = set.len(),
                kids = ?set.key_ids(),
                phase = phase.as_str(),
                "JWKS cache refreshed"
            );
        }
        Err(e) => {
            metrics::record_jwks_fetch(
                "error",
                phase.as_str(),
                Some(e.error_type()),
                start.elapsed(),
            );
            match phase {
                FetchPhase::Initial => tracing::error!(
                    target: "sso.auth.jwks",
                    error = %e,
                    "JWKS initial population failed, no signing keys cached"
                ),
                FetchPhase::Refresh => tracing::warn!(
                    target: "sso.auth.jwks",
                    error = %e,
                    "JWKS refresh failed, keeping previously cached keys"
                ),
            }
        }
    }

    result
}

/// Decode every usable entry of a JWKS document into a [`KeySet`].
///
/// Foreign entries (non-RSA, non-signature) are skipped silently; broken RSA
/// signing entries are skipped with a warning. The first entry wins on a
/// duplicate key ID.
fn build_key_set(
    document: JwksDocument,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<KeySet, FetchError> {
    let entries = document.keys.ok_or(FetchError::NoValidKeys)?;

    let mut keys: HashMap<String, Arc<CachedKey>> = HashMap::with_capacity(entries.len());
    for entry in &entries {
        match decode_jwk_value(entry) {
            Ok(key) => {
                if keys.contains_key(key.kid()) {
                    tracing::warn!(target: "sso.auth.jwks", kid = %key.kid(), "Duplicate key ID in JWKS, keeping first");
                    continue;
                }
                keys.insert(key.kid().to_string(), Arc::new(key));
            }
            Err(e) if e.is_foreign_key() => {
                tracing::debug!(target: "sso.auth.jwks", reason = %e, "Ignoring non-RSA-signing JWK");
            }
            Err(e) => {
                let kid = entry.get("kid").and_then(|v| v.as_str()).unwrap_or("<none>");
                tracing::warn!(target: "sso.auth.jwks", kid = %kid, error = %e, "Skipping malformed JWK");
            }
        }
    }

    if keys.is_empty() {
        return Err(FetchError::NoValidKeys);
    }

    Ok(KeySet {
        keys,
        fetched_at,
        ttl,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::clock::SystemClock;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MODULUS: &str = "qwcYLetknUd1nvSaJJc5-e9UEdm1_YyanSmyJpsqnu5eyh0agU0j2fPpbEgBLRxydai3y-Qug86wbTCc1Eq9jrzqfDg4fZFJ1KCc1TdgukFSKHSzDhSxQjpn5OsjFS9wxAJDpGaeLpgTPC41IQjFzx-OkJIeuJI3f5uz5xjvpguH7ogZS7a1QdyFigbhjzGW1R97aBDlrDt1dJ0GtVUCcctE-LAXA6gH6xo6x2gYZRaQiSK6CG8BJy0HEnYqcm3spj0yQpp11PDmwAsvWMLhDLUJUsyZ8NAtPnuNdE6Ce3Ex6wPwMil2WaoIJYmYRJkGey0t2bYmFQbRBT8POstH5w";

    fn rsa_entry(kid: &str) -> serde_json::Value {
        json!({"kty": "RSA", "use": "sig", "alg": "RS256", "kid": kid, "n": MODULUS, "e": "AQAB"})
    }

    fn ec_entry(kid: &str) -> serde_json::Value {
        json!({"kty": "EC", "use": "sig", "alg": "ES256", "kid": kid, "crv": "P-256", "x": "AA", "y": "AA"})
    }

    fn document(entries: Vec<serde_json::Value>) -> JwksDocument {
        JwksDocument {
            keys: Some(entries),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Fetcher returning a fixed document and counting calls.
    struct CountingFetcher {
        document: Result<JwksDocument, FetchError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JwksFetcher for CountingFetcher {
        async fn fetch(&self) -> Result<JwksDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document.clone()
        }
    }

    #[test]
    fn test_jwks_document_deserialization() {
        let doc: JwksDocument =
            serde_json::from_str(r#"{"keys": [{"kty": "RSA"}, {"kty": "EC"}]}"#).unwrap();
        assert_eq!(doc.keys.unwrap().len(), 2);

        let doc: JwksDocument = serde_json::from_str(r#"{"other": true}"#).unwrap();
        assert!(doc.keys.is_none());
    }

    #[test]
    fn test_build_key_set_ignores_ec_keys() {
        let set = build_key_set(
            document(vec![rsa_entry("A"), ec_entry("B")]),
            at(1_700_000_000),
            DEFAULT_CACHE_TTL,
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.key_ids(), vec!["A"]);
        assert!(set.get("B").is_none());
    }

    #[test]
    fn test_build_key_set_skips_malformed_entries() {
        let mut broken = rsa_entry("broken");
        broken["n"] = json!("***");

        let set = build_key_set(
            document(vec![broken, json!(17), rsa_entry("good")]),
            at(1_700_000_000),
            DEFAULT_CACHE_TTL,
        )
        .unwrap();

        assert_eq!(set.key_ids(), vec!["good"]);
    }

    #[test]
    fn test_build_key_set_requires_keys_array() {
        let result = build_key_set(JwksDocument::default(), at(0), DEFAULT_CACHE_TTL);
        assert_eq!(result.unwrap_err(), FetchError::NoValidKeys);
    }

    #[test]
    fn test_build_key_set_rejects_set_without_usable_keys() {
        let result = build_key_set(
            document(vec![ec_entry("only-ec")]),
            at(0),
            DEFAULT_CACHE_TTL,
        );
        assert_eq!(result.unwrap_err(), FetchError::NoValidKeys);

        let result = build_key_set(document(vec![]), at(0), DEFAULT_CACHE_TTL);
        assert_eq!(result.unwrap_err(), FetchError::NoValidKeys);
    }

    #[test]
    fn test_build_key_set_keeps_first_duplicate() {
        let set = build_key_set(
            document(vec![rsa_entry("dup"), rsa_entry("dup")]),
            at(0),
            DEFAULT_CACHE_TTL,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_key_set_staleness_boundary() {
        let fetched = 1_700_000_000;
        let set = build_key_set(
            document(vec![rsa_entry("A")]),
            at(fetched),
            Duration::from_secs(60),
        )
        .unwrap();

        assert!(!set.is_stale(at(fetched)));
        assert!(!set.is_stale(at(fetched + 60)));
        assert!(set.is_stale(at(fetched + 61)));
    }

    #[test]
    fn test_fetch_error_types_are_bounded() {
        assert_eq!(FetchError::Transport("x".into()).error_type(), "transport");
        assert_eq!(FetchError::Status(500).error_type(), "status");
        assert_eq!(FetchError::Parse("x".into()).error_type(), "parse");
        assert_eq!(FetchError::NoValidKeys.error_type(), "no_valid_keys");
        assert_eq!(FetchError::Timeout.error_type(), "timeout");
        assert_eq!(FetchError::Task("x".into()).error_type(), "task");
    }

    #[test]
    fn test_fetch_error_no_valid_keys_message() {
        assert_eq!(
            FetchError::NoValidKeys.to_string(),
            "JWKS response contained no valid signing keys"
        );
    }

    #[test]
    fn test_user_agent_identifies_client() {
        assert!(JWKS_USER_AGENT.starts_with("sso-auth-jwks/"));
    }

    #[tokio::test]
    async fn test_get_key_populates_empty_cache() {
        let fetcher = Arc::new(CountingFetcher {
            document: Ok(document(vec![rsa_entry("A")])),
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(fetcher.clone(), Arc::new(SystemClock));

        assert!(!cache.is_populated().await);
        let key = cache.get_key("A").await.unwrap();

        assert_eq!(key.kid(), "A");
        assert_eq!(cache.key_count().await, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_key_on_empty_cache_surfaces_fetch_error() {
        let fetcher = Arc::new(CountingFetcher {
            document: Err(FetchError::Status(503)),
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(fetcher.clone(), Arc::new(SystemClock));

        let err = cache.get_key("A").await.unwrap_err();

        assert_eq!(
            err,
            KeyLookupError::NoKeysAvailable(FetchError::Status(503))
        );
        assert!(!cache.is_populated().await);
        // Populating once already counts as the refresh, no forced retry
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_force_skips_fresh_set() {
        let fetcher = Arc::new(CountingFetcher {
            document: Ok(document(vec![rsa_entry("A")])),
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(fetcher.clone(), Arc::new(SystemClock));

        let first = cache.refresh(false).await.unwrap();
        let second = cache.refresh(false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_replaces_key_set() {
        let fetcher = Arc::new(CountingFetcher {
            document: Ok(document(vec![rsa_entry("A")])),
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(fetcher.clone(), Arc::new(SystemClock));

        let first = cache.refresh(false).await.unwrap();
        let second = cache.refresh(true).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_warm_up_failure_leaves_cache_empty() {
        let fetcher = Arc::new(CountingFetcher {
            document: Ok(JwksDocument::default()),
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(fetcher, Arc::new(SystemClock));

        assert_eq!(cache.warm_up().await.unwrap_err(), FetchError::NoValidKeys);
        assert!(!cache.is_populated().await);
        assert!(cache.current().await.is_none());
    }
}
