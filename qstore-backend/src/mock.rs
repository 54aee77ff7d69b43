use crate::core::Backend;
use bytes::Bytes;
use mockall::mock;
use qstore_common::error::Error;
use std::time::Duration;

mock! {
    pub Backend {}

    #[async_trait]
    impl Backend for Backend {
        async fn get(&self, key: &str) -> Result<Bytes, Error>;
        async fn set(&self, key: &str, data: Bytes, expiration: Duration) -> Result<(), Error>;
        async fn delete(&self, key: &str) -> Result<(), Error>;
        async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error>;
        async fn expire(&self, key: &str, expiration: Duration) -> Result<(), Error>;
        async fn exists(&self, key: &str) -> Result<bool, Error>;
        async fn lock(&self, key: &str, token: Bytes, expiration: Duration) -> Result<(), Error>;
        async fn unlock(&self, key: &str) -> Result<(), Error>;
        async fn flush_db(&self) -> Result<(), Error>;
        fn address(&self) -> &str;
        async fn close(&self) -> Result<(), Error>;
    }
}
