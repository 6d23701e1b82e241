use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named byte-oriented key-value collection with optional expiry.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    /// Returns the value for `key` unless it is missing or expired.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()>;
}

/// Hands out collections by name, either persisted on disk or in memory.
pub trait Store: Send + Sync {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
