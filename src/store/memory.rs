use crate::core::cache::KeyValueCollection;
use crate::core::market::{MarketStats, PriceObservation, PriceStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// In-memory collection; entries vanish with the process.
pub struct MemoryCollection {
    inner: Mutex<HashMap<Vec<u8>, CacheValue>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut cache = self.inner.lock().await;
        let key_str = String::from_utf8_lossy(key);
        let now = Instant::now();
        match cache.get(key) {
            Some(entry) if entry.expires_at.is_none_or(|expiry| expiry > now) => {
                debug!("Cache HIT for key: {}", key_str);
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                debug!("Cache entry expired for key: {}", key_str);
                cache.remove(key);
                Ok(None)
            }
            None => {
                debug!("Cache MISS for key: {}", key_str);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let cache_value = CacheValue {
            value: value.to_vec(),
            expires_at,
        };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {}", String::from_utf8_lossy(key));
        cache.insert(key.to_vec(), cache_value);
        Ok(())
    }
}

/// Price store held in memory, keyed by market then week.
#[derive(Default)]
pub struct MemoryPriceStore {
    markets: RwLock<BTreeMap<String, BTreeMap<NaiveDate, PriceObservation>>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the observation for its market and week.
    pub fn insert(&self, observation: PriceObservation) {
        let mut markets = self.markets.write().unwrap_or_else(|e| e.into_inner());
        markets
            .entry(observation.market_name.clone())
            .or_default()
            .insert(observation.week_start_date, observation);
    }

    fn series<T>(
        &self,
        market: &str,
        f: impl FnOnce(&BTreeMap<NaiveDate, PriceObservation>) -> T,
    ) -> Option<T> {
        let markets = self.markets.read().unwrap_or_else(|e| e.into_inner());
        markets.get(market).map(f)
    }
}

impl FromIterator<PriceObservation> for MemoryPriceStore {
    fn from_iter<I: IntoIterator<Item = PriceObservation>>(iter: I) -> Self {
        let store = Self::new();
        for observation in iter {
            store.insert(observation);
        }
        store
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn latest(&self, market: &str) -> Result<Option<PriceObservation>> {
        Ok(self
            .series(market, |series| series.values().next_back().cloned())
            .flatten())
    }

    async fn history(&self, market: &str, weeks: usize) -> Result<Vec<PriceObservation>> {
        Ok(self
            .series(market, |series| {
                series.values().rev().take(weeks).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn markets(&self) -> Result<Vec<String>> {
        let markets = self.markets.read().unwrap_or_else(|e| e.into_inner());
        Ok(markets.keys().cloned().collect())
    }

    async fn stats(&self, market: &str) -> Result<MarketStats> {
        Ok(self
            .series(market, |series| {
                let prices: Vec<f64> = series.values().map(PriceObservation::price).collect();
                MarketStats::from_prices(&prices)
            })
            .unwrap_or_default())
    }
}
