//! Exchange-rate table with a TTL and a persisted fallback.
//!
//! The cache is the only writer of the persisted table. Reads go through
//! [`ExchangeRateCache::get`], which never fails: when nothing can be
//! fetched it serves the last persisted table or the built-in one and flags
//! the result as degraded.

use std::{
    collections::HashMap,
    fs,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::domain::ExchangeRateTable;
use crate::infra::rating::ExchangeRateSource;
use crate::util::{clock::Clock, persistence::project_dirs, persistence::RatingConfig};

const CACHE_FILENAME: &str = "exchange_rates.json";

/// Cache TTL: 1 hour.
pub const EXCHANGE_RATE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

/// Persistent home of the exchange-rate table.
pub trait RateStore: Send + Sync {
    fn load(&self) -> Result<Option<ExchangeRateTable>, StoreError>;
    fn save(&self, table: &ExchangeRateTable) -> Result<(), StoreError>;
}

/// On-disk layout: the rates map and its fetch timestamp as two entries.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRates {
    exchange_rates: HashMap<String, f64>,
    exchange_rates_fetched_at: i64,
}

/// JSON file store in the local data directory.
#[derive(Clone, Debug)]
pub struct FileRateStore {
    path: PathBuf,
}

impl FileRateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_data_dir() -> Result<Self, StoreError> {
        let dirs = project_dirs().ok_or(StoreError::StorageUnavailable)?;
        Ok(Self::new(dirs.data_local_dir().join(CACHE_FILENAME)))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl RateStore for FileRateStore {
    fn load(&self) -> Result<Option<ExchangeRateTable>, StoreError> {
        if !self.path.exists() {
            log::debug!("[fx-cache] No exchange-rate cache at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<PersistedRates>(&content) {
            Ok(persisted) => Ok(Some(ExchangeRateTable::new(
                persisted.exchange_rates,
                persisted.exchange_rates_fetched_at,
            ))),
            Err(e) => {
                log::warn!("[fx-cache] Ignoring unreadable exchange-rate cache: {e}");
                Ok(None)
            }
        }
    }

    fn save(&self, table: &ExchangeRateTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let persisted = PersistedRates {
            exchange_rates: table.rates.clone(),
            exchange_rates_fetched_at: table.fetched_at_ms,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&persisted)?)?;
        log::debug!(
            "[fx-cache] Saved {} rates to {}",
            table.rates.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-process store, for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    table: Mutex<Option<ExchangeRateTable>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: ExchangeRateTable) -> Self {
        Self {
            table: Mutex::new(Some(table)),
        }
    }

    pub fn snapshot(&self) -> Option<ExchangeRateTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RateStore for MemoryRateStore {
    fn load(&self) -> Result<Option<ExchangeRateTable>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, table: &ExchangeRateTable) -> Result<(), StoreError> {
        *self.table.lock().unwrap_or_else(|e| e.into_inner()) = Some(table.clone());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fetched just now.
    Fresh,
    /// Persisted table within the TTL.
    Cached,
    /// Fetch failed; last persisted table served regardless of age.
    Stale,
    /// Fetch failed and nothing was persisted; built-in table served.
    Default,
}

#[derive(Clone, Debug)]
pub struct RatesLookup {
    pub table: ExchangeRateTable,
    pub status: CacheStatus,
}

impl RatesLookup {
    /// Rates may be out of date. Only affects price ordering.
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CacheStatus::Stale | CacheStatus::Default)
    }
}

pub struct ExchangeRateCache {
    store: Arc<dyn RateStore>,
    source: Arc<dyn ExchangeRateSource>,
    clock: Arc<dyn Clock>,
    base_currency: String,
    fallback_rates: HashMap<String, f64>,
    ttl: Duration,
}

impl ExchangeRateCache {
    pub fn new(
        store: Arc<dyn RateStore>,
        source: Arc<dyn ExchangeRateSource>,
        clock: Arc<dyn Clock>,
        config: &RatingConfig,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            base_currency: config.base_currency.clone(),
            fallback_rates: config.fallback_rates.clone(),
            ttl: config.exchange_rate_ttl(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub async fn get(&self, force_refresh: bool) -> RatesLookup {
        let persisted = self.load_persisted();

        if !force_refresh {
            if let Some(table) = persisted.as_ref().filter(|table| self.is_fresh(table)) {
                log::debug!(
                    "[fx-cache] Serving cached rates (age: {}s)",
                    table.age_ms(self.clock.now_ms()) / 1000
                );
                return self.lookup(table.clone(), CacheStatus::Cached);
            }
        }

        match self.source.fetch_rates().await {
            Ok(rates) => {
                let table = ExchangeRateTable::new(rates, self.clock.now_ms())
                    .with_base(&self.base_currency);
                if let Err(e) = self.store.save(&table) {
                    log::warn!("[fx-cache] Failed to persist exchange rates: {e}");
                }
                log::info!("[fx-cache] Fetched {} exchange rates", table.rates.len());
                self.lookup(table, CacheStatus::Fresh)
            }
            Err(e) => match persisted {
                Some(table) => {
                    log::warn!(
                        "[fx-cache] Exchange-rate fetch failed: {e}; serving persisted rates, which may be stale"
                    );
                    self.lookup(table, CacheStatus::Stale)
                }
                None => {
                    log::warn!(
                        "[fx-cache] Exchange-rate fetch failed: {e}; serving built-in rates, which may be stale"
                    );
                    let table = ExchangeRateTable::new(self.fallback_rates.clone(), 0);
                    self.lookup(table, CacheStatus::Default)
                }
            },
        }
    }

    fn lookup(&self, table: ExchangeRateTable, status: CacheStatus) -> RatesLookup {
        RatesLookup {
            table: table.with_base(&self.base_currency),
            status,
        }
    }

    fn load_persisted(&self) -> Option<ExchangeRateTable> {
        match self.store.load() {
            Ok(table) => table,
            Err(e) => {
                log::warn!("[fx-cache] Failed to read persisted exchange rates: {e}");
                None
            }
        }
    }

    fn is_fresh(&self, table: &ExchangeRateTable) -> bool {
        let age_ms = table.age_ms(self.clock.now_ms());
        age_ms >= 0 && (age_ms as u128) < self.ttl.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::infra::rating::RatingError;
    use crate::util::clock::ManualClock;

    const NOW_MS: i64 = 1_792_411_200_000;
    const MINUTE_MS: i64 = 60 * 1000;

    struct CountingSource {
        calls: AtomicUsize,
        rates: Option<HashMap<String, f64>>,
    }

    impl CountingSource {
        fn ok(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rates: Some(
                    pairs
                        .iter()
                        .map(|(code, rate)| (code.to_string(), *rate))
                        .collect(),
                ),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rates: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExchangeRateSource for CountingSource {
        async fn fetch_rates(&self) -> Result<HashMap<String, f64>, RatingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .clone()
                .ok_or_else(|| RatingError::api("exchange-rate service unavailable"))
        }
    }

    fn persisted(age_ms: i64) -> ExchangeRateTable {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), 34.0);
        ExchangeRateTable::new(rates, NOW_MS - age_ms)
    }

    fn cache(store: Arc<MemoryRateStore>, source: Arc<CountingSource>) -> ExchangeRateCache {
        ExchangeRateCache::new(
            store,
            source,
            Arc::new(ManualClock::new(NOW_MS)),
            &RatingConfig::default(),
        )
    }

    #[tokio::test]
    async fn serves_table_younger_than_ttl_without_fetching() {
        let store = Arc::new(MemoryRateStore::with_table(persisted(59 * MINUTE_MS)));
        let source = CountingSource::ok(&[("USD", 36.0)]);

        let lookup = cache(store, source.clone()).get(false).await;
        assert_eq!(source.calls(), 0);
        assert_eq!(lookup.status, CacheStatus::Cached);
        assert_eq!(lookup.table.rate("USD"), Some(34.0));
    }

    #[tokio::test]
    async fn refetches_table_older_than_ttl() {
        let store = Arc::new(MemoryRateStore::with_table(persisted(61 * MINUTE_MS)));
        let source = CountingSource::ok(&[("USD", 36.0)]);

        let lookup = cache(store.clone(), source.clone()).get(false).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(lookup.status, CacheStatus::Fresh);
        assert_eq!(lookup.table.rate("USD"), Some(36.0));

        let saved = store.snapshot().unwrap();
        assert_eq!(saved.fetched_at_ms, NOW_MS);
        assert_eq!(saved.rate("USD"), Some(36.0));
    }

    #[tokio::test]
    async fn shorter_ttl_expires_table_sooner() {
        let store = Arc::new(MemoryRateStore::with_table(persisted(30 * MINUTE_MS)));
        let source = CountingSource::ok(&[("USD", 36.0)]);
        let cache = cache(store, source.clone()).with_ttl(Duration::from_secs(10 * 60));

        assert_eq!(cache.base_currency(), "THB");
        assert_eq!(cache.get(false).await.status, CacheStatus::Fresh);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_table() {
        let store = Arc::new(MemoryRateStore::with_table(persisted(MINUTE_MS)));
        let source = CountingSource::ok(&[("USD", 36.0)]);

        let lookup = cache(store, source.clone()).get(true).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(lookup.status, CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn write_is_visible_to_next_read() {
        let store = Arc::new(MemoryRateStore::new());
        let source = CountingSource::ok(&[("USD", 36.0)]);
        let cache = cache(store, source.clone());

        assert_eq!(cache.get(false).await.status, CacheStatus::Fresh);
        assert_eq!(cache.get(false).await.status, CacheStatus::Cached);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_stale_table() {
        let store = Arc::new(MemoryRateStore::with_table(persisted(48 * 60 * MINUTE_MS)));
        let source = CountingSource::failing();

        let lookup = cache(store, source.clone()).get(false).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(lookup.status, CacheStatus::Stale);
        assert!(lookup.is_degraded());
        assert_eq!(lookup.table.rate("USD"), Some(34.0));
    }

    #[tokio::test]
    async fn fetch_failure_without_table_serves_defaults() {
        let store = Arc::new(MemoryRateStore::new());
        let lookup = cache(store.clone(), CountingSource::failing()).get(false).await;

        assert_eq!(lookup.status, CacheStatus::Default);
        assert!(lookup.is_degraded());
        assert_eq!(lookup.table.rate("USD"), Some(35.0));
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn base_currency_is_forced_to_one() {
        let store = Arc::new(MemoryRateStore::new());
        let source = CountingSource::ok(&[("THB", 0.98), ("USD", 36.0)]);

        let lookup = cache(store.clone(), source).get(false).await;
        assert_eq!(lookup.table.convert(250.0, "THB"), Some(250.0));
        assert_eq!(store.snapshot().unwrap().rate("THB"), Some(1.0));
    }

    #[tokio::test]
    async fn file_store_persists_both_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileRateStore::new(dir.path().join("fx").join(CACHE_FILENAME)));
        let cache = ExchangeRateCache::new(
            store.clone(),
            CountingSource::ok(&[("usd", 36.0)]),
            Arc::new(ManualClock::new(NOW_MS)),
            &RatingConfig::default(),
        );

        cache.get(false).await;

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["exchange_rates_fetched_at"], NOW_MS);
        assert_eq!(raw["exchange_rates"]["USD"], 36.0);

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.fetched_at_ms, NOW_MS);
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILENAME);
        fs::write(&path, "garbage").unwrap();

        assert!(FileRateStore::new(path).load().unwrap().is_none());
    }
}
