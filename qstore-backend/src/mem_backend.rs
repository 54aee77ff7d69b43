use crate::core::Backend;
use bytes::Bytes;
use qstore_common::error::Error;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{sync::RwLock, time::Instant};

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Bytes, expiration: Duration) -> Self {
        Self {
            data,
            expires_at: expires_at(expiration),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map_or(false, |deadline| deadline <= Instant::now())
    }

    fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

fn expires_at(expiration: Duration) -> Option<Instant> {
    if expiration.is_zero() {
        None
    } else {
        Some(Instant::now() + expiration)
    }
}

/// Complete in-process replica. Expiry is lazy: a dead entry is treated as
/// missing on read and swept on the next write touching it.
#[derive(Debug)]
pub struct MemBackend {
    address: String,
    entries: RwLock<HashMap<String, Entry>>,
    closed: AtomicBool,
}

impl MemBackend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::closed())
        } else {
            Ok(())
        }
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| !entry.is_expired())
            .cloned()
    }
}

#[async_trait]
impl Backend for MemBackend {
    async fn get(&self, key: &str) -> Result<Bytes, Error> {
        self.ensure_open()?;
        match self.live_entry(key).await {
            Some(entry) => {
                debug!("GET[{}] found on {}", key, self.address);
                Ok(entry.data)
            }
            None => Err(Error::key_not_found()),
        }
    }

    async fn set(&self, key: &str, data: Bytes, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        debug!("SET[{}] on {}", key, self.address);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry::new(data, expiration));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        self.ensure_open()?;
        match self.live_entry(key).await {
            Some(entry) => Ok(entry.remaining()),
            None => Err(Error::key_not_found()),
        }
    }

    async fn expire(&self, key: &str, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|entry| !entry.is_expired()) {
            Some(entry) => {
                entry.expires_at = expires_at(expiration);
                Ok(())
            }
            None => {
                entries.remove(key);
                Err(Error::key_not_found())
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.ensure_open()?;
        Ok(self.live_entry(key).await.is_some())
    }

    async fn lock(&self, key: &str, token: Bytes, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                debug!("LOCK[{}] contended on {}", key, self.address);
                Err(Error::not_acquired())
            }
            _ => {
                entries.insert(key.to_string(), Entry::new(token, expiration));
                Ok(())
            }
        }
    }

    async fn unlock(&self, key: &str) -> Result<(), Error> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn flush_db(&self) -> Result<(), Error> {
        self.ensure_open()?;
        debug!("FLUSHDB on {}", self.address);
        self.entries.write().await.clear();
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn close(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        self.entries.write().await.clear();
        Ok(())
    }
}
