use crate::core::Backend;
use bytes::Bytes;
use qstore_common::error::Error;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;

const PTTL_NOT_FOUND: i64 = -2;
const PTTL_NO_EXPIRATION: i64 = -1;

/// One replica behind a multiplexed async connection.
pub struct RedisBackend {
    conn: Mutex<MultiplexedConnection>,
    address: String,
    closed: AtomicBool,
}

impl RedisBackend {
    /// Connects to `address` and verifies the replica answers a PING. The
    /// timeout bounds every subsequent command on this connection.
    pub async fn connect(address: &str, operation_timeout: Duration) -> Result<Self, Error> {
        let client = Client::open(format!("redis://{}", address))
            .map_err(|e| Error::backend(format!("failed to configure {}: {}", address, e)))?;

        let mut conn = client
            .get_multiplexed_async_connection_with_timeouts(operation_timeout, operation_timeout)
            .await
            .map_err(|e| Error::backend(format!("failed to connect to {}: {}", address, e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend(format!("ping to {} failed: {}", address, e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            address: address.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::closed())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.address)
            .field("closed", &self.closed)
            .finish()
    }
}

fn convert_error(e: redis::RedisError) -> Error {
    if e.is_timeout() {
        Error::timeout()
    } else {
        Error::backend(e.to_string())
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Bytes, Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(convert_error)?;
        match value {
            Some(data) => Ok(Bytes::from(data)),
            None => Err(Error::key_not_found()),
        }
    }

    async fn set(&self, key: &str, data: Bytes, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(data.as_ref());
        if !expiration.is_zero() {
            cmd.arg("PX").arg(expiration.as_millis() as u64);
        }
        let _: String = cmd.query_async(&mut *conn).await.map_err(convert_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let _: i64 = conn.del(key).await.map_err(convert_error)?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let remaining: i64 = conn.pttl(key).await.map_err(convert_error)?;
        match remaining {
            PTTL_NOT_FOUND => Err(Error::key_not_found()),
            PTTL_NO_EXPIRATION => Ok(None),
            millis => Ok(Some(Duration::from_millis(millis as u64))),
        }
    }

    async fn expire(&self, key: &str, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let applied: bool = if expiration.is_zero() {
            let exists: bool = conn.exists(key).await.map_err(convert_error)?;
            if exists {
                let _: bool = conn.persist(key).await.map_err(convert_error)?;
            }
            exists
        } else {
            conn.pexpire(key, expiration.as_millis() as i64)
                .await
                .map_err(convert_error)?
        };
        if applied {
            Ok(())
        } else {
            Err(Error::key_not_found())
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        conn.exists(key).await.map_err(convert_error)
    }

    async fn lock(&self, key: &str, token: Bytes, expiration: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(token.as_ref()).arg("NX");
        if !expiration.is_zero() {
            cmd.arg("PX").arg(expiration.as_millis() as u64);
        }
        let reply: Option<String> = cmd.query_async(&mut *conn).await.map_err(convert_error)?;
        match reply {
            Some(_) => Ok(()),
            None => Err(Error::not_acquired()),
        }
    }

    async fn unlock(&self, key: &str) -> Result<(), Error> {
        self.ensure_open()?;
        let mut conn = self.conn.lock().await;
        let _: i64 = conn.del(key).await.map_err(convert_error)?;
        Ok(())
    }

    async fn flush_db(&self) -> Result<(), Error> {
        self.ensure_open()?;
        warn!("FLUSHDB on {}", self.address);
        let mut conn = self.conn.lock().await;
        let _: String = redis::cmd("FLUSHDB")
            .query_async(&mut *conn)
            .await
            .map_err(convert_error)?;
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn close(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
