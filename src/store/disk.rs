use crate::core::cache::KeyValueCollection;
use crate::core::market::{MarketStats, PriceObservation, PriceStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<SystemTime>,
}

/// Collection persisted in a fjall partition. Expired entries are dropped on read.
pub struct DiskCollection {
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key_str = String::from_utf8_lossy(key);
        let Some(raw) = self.partition.get(key)? else {
            debug!("Cache MISS for key: {}", key_str);
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        if entry
            .expires_at
            .is_some_and(|expires_at| SystemTime::now() > expires_at)
        {
            debug!("Cache entry expired for key: {}", key_str);
            self.partition.remove(key)?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {}", key_str);
        Ok(Some(entry.value))
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| SystemTime::now() + d);
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at,
        };
        self.partition.insert(key, serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {}", String::from_utf8_lossy(key));
        Ok(())
    }
}

/// Price series persisted in fjall.
///
/// Observations live in the `prices` partition under `market \0 YYYY-MM-DD`,
/// so a prefix scan over a market yields its weeks in date order. The
/// `markets` partition indexes market names.
pub struct FjallPriceStore {
    keyspace: Keyspace,
    prices: PartitionHandle,
    markets: PartitionHandle,
}

impl FjallPriceStore {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let prices = keyspace
            .open_partition("prices", PartitionCreateOptions::default())
            .context("Failed to open prices partition")?;
        let markets = keyspace
            .open_partition("markets", PartitionCreateOptions::default())
            .context("Failed to open markets partition")?;
        Ok(Self {
            keyspace: keyspace.clone(),
            prices,
            markets,
        })
    }

    fn market_prefix(market: &str) -> Vec<u8> {
        let mut prefix = market.as_bytes().to_vec();
        prefix.push(0);
        prefix
    }

    fn observation_key(market: &str, week_start_date: NaiveDate) -> Vec<u8> {
        let mut key = Self::market_prefix(market);
        key.extend_from_slice(week_start_date.format("%Y-%m-%d").to_string().as_bytes());
        key
    }

    /// Inserts or replaces the observation for its market and week.
    pub fn insert(&self, observation: &PriceObservation) -> Result<()> {
        self.prices.insert(
            Self::observation_key(&observation.market_name, observation.week_start_date),
            serde_json::to_vec(observation)?,
        )?;
        self.register_market(&observation.market_name)
    }

    /// Records a week without a price: the market stays listed and any price
    /// stored for that week is removed.
    pub fn clear(&self, market: &str, week_start_date: NaiveDate) -> Result<()> {
        self.prices
            .remove(Self::observation_key(market, week_start_date))?;
        self.register_market(market)
    }

    fn register_market(&self, market: &str) -> Result<()> {
        self.markets.insert(market.as_bytes(), b"")?;
        Ok(())
    }

    /// Flushes pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist price store")
    }

    fn scan(
        &self,
        market: &str,
    ) -> impl DoubleEndedIterator<Item = Result<PriceObservation>> + '_ {
        self.prices
            .prefix(Self::market_prefix(market))
            .map(|item| -> Result<PriceObservation> {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
    }
}

#[async_trait]
impl PriceStore for FjallPriceStore {
    async fn latest(&self, market: &str) -> Result<Option<PriceObservation>> {
        self.scan(market).next_back().transpose()
    }

    async fn history(&self, market: &str, weeks: usize) -> Result<Vec<PriceObservation>> {
        self.scan(market).rev().take(weeks).collect()
    }

    async fn markets(&self) -> Result<Vec<String>> {
        self.markets
            .keys()
            .map(|key| -> Result<String> { Ok(String::from_utf8(key?.to_vec())?) })
            .collect()
    }

    async fn stats(&self, market: &str) -> Result<MarketStats> {
        let prices = self
            .scan(market)
            .map(|obs| obs.map(|o| o.price()))
            .collect::<Result<Vec<f64>>>()?;
        Ok(MarketStats::from_prices(&prices))
    }
}
