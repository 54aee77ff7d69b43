use bytes::Bytes;
use qstore_common::error::Error;
use std::{sync::Arc, time::Duration};

/// Capability set one replica must expose. Each backend is an independent
/// fault domain: an error from one never says anything about the others, and
/// implementations must be safe for concurrent use.
///
/// Expiration conventions follow the store being fronted: a zero `Duration`
/// on `set`, `lock` and `expire` means "no expiration", and `ttl` reports
/// `None` for a key that exists without one.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Bytes, Error>;

    async fn set(&self, key: &str, data: Bytes, expiration: Duration) -> Result<(), Error>;

    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Three-way outcome: `Err(KeyNotFound)` when the key is missing,
    /// `Ok(None)` when it exists without expiration, `Ok(Some(_))` otherwise.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error>;

    /// Fails with `KeyNotFound` when the key is missing.
    async fn expire(&self, key: &str, expiration: Duration) -> Result<(), Error>;

    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Acquires `key` for the caller identified by `token`. Fails with
    /// `NotAcquired` while another live lock holds the key.
    async fn lock(&self, key: &str, token: Bytes, expiration: Duration) -> Result<(), Error>;

    async fn unlock(&self, key: &str) -> Result<(), Error>;

    async fn flush_db(&self) -> Result<(), Error>;

    /// Stable address of the replica; used for identity and for the
    /// deterministic dispatch order of sequential writes.
    fn address(&self) -> &str;

    /// After a successful close every other method answers `Closed`.
    async fn close(&self) -> Result<(), Error>;
}

pub type SharedBackend = Arc<dyn Backend>;
