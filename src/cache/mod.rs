//! Key/value cache contract and the in-memory implementation.
//!
//! # Design Decisions
//! - Components depend on `Arc<dyn Cache>`; backends are swapped by binding
//! - Expiry is checked on access; a background sweep started by the module's
//!   hook reclaims keys nobody reads again

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::contract;
use crate::kernel::{AppBuilder, KernelError};
use crate::lifecycle::Hook;

pub use memory::MemoryCache;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache is closed")]
    Closed,

    #[error("value for key {key:?} is not valid UTF-8")]
    NotUtf8 { key: String },
}

/// Remaining lifetime of a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    Missing,
    /// Present without expiry.
    Persistent,
    Expires(Duration),
}

/// A key/value store with optional per-key expiry.
///
/// An expiration of `None` keeps the key until deleted.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, expiration: Option<Duration>) -> Result<(), CacheError>;

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set_bytes(&self, key: &str, value: Vec<u8>, expiration: Option<Duration>) -> Result<(), CacheError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Set a timeout on an existing key. Returns `false` if the key is missing.
    async fn expire(&self, key: &str, expiration: Duration) -> Result<bool, CacheError>;

    async fn ttl(&self, key: &str) -> Result<Ttl, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn close(&self) -> Result<(), CacheError>;
}
contract!(Cache);

/// Register `MemoryCache` as the `dyn Cache` implementation, with its expiry
/// sweep tied to the application lifecycle.
pub fn module(app: &AppBuilder) -> Result<(), KernelError> {
    app.provide(|(), lifecycle| {
        let cache = MemoryCache::new();
        let (sweeping, closing) = (cache.clone(), cache.clone());
        lifecycle.append(
            Hook::new()
                .on_start(move |_| async move {
                    sweeping.spawn_sweeper(memory::SWEEP_INTERVAL);
                    Ok(())
                })
                .on_stop(move |_| async move {
                    closing.close().await?;
                    Ok(())
                }),
        );
        Ok(cache)
    })?;
    app.bind::<dyn Cache, MemoryCache>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;

    #[tokio::test]
    async fn module_binds_the_contract_and_closes_on_stop() {
        let mut app = TestApp::new(module);
        app.require_start().await;

        let cache = app.get::<dyn Cache>();
        cache.set("greeting", "hello", None).await.unwrap();
        assert_eq!(app.get::<MemoryCache>().len(), 1);

        app.require_stop().await;
        assert_eq!(cache.ping().await.unwrap_err(), CacheError::Closed);
    }
}
