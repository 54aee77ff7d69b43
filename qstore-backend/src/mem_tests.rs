use crate::core::Backend;
use crate::mem_backend::MemBackend;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::advance;

const KEY: &str = "key";
const KEY2: &str = "key2";
const VALUE: &str = "hello";

fn backend() -> MemBackend {
    MemBackend::new("localhost")
}

fn value() -> Bytes {
    Bytes::from_static(VALUE.as_bytes())
}

const NO_EXPIRATION: Duration = Duration::ZERO;

#[tokio::test]
async fn get_returns_not_found_if_key_does_not_exist() {
    let err = backend().get(KEY).await.unwrap_err();
    assert!(err.is_key_not_found());
}

#[tokio::test]
async fn get_returns_value_if_key_exists() {
    let backend = backend();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    assert_eq!(backend.get(KEY).await.unwrap(), value());
}

#[tokio::test]
async fn set_overwrites_existing_key() {
    let backend = backend();
    backend
        .set(KEY, Bytes::from_static(b"_"), NO_EXPIRATION)
        .await
        .unwrap();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    assert_eq!(backend.get(KEY).await.unwrap(), value());
}

#[tokio::test]
async fn set_without_expiration_employs_no_ttl() {
    let backend = backend();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    assert_eq!(backend.ttl(KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn set_with_expiration_employs_ttl() {
    let backend = backend();
    backend
        .set(KEY, value(), Duration::from_secs(3600))
        .await
        .unwrap();
    let ttl = backend.ttl(KEY).await.unwrap().expect("ttl employed");
    assert!(ttl > Duration::from_secs(59 * 60));
    assert!(ttl <= Duration::from_secs(61 * 60));
}

#[tokio::test(start_paused = true)]
async fn expired_key_is_gone() {
    let backend = backend();
    backend
        .set(KEY, value(), Duration::from_secs(1))
        .await
        .unwrap();
    advance(Duration::from_secs(2)).await;
    assert!(backend.get(KEY).await.unwrap_err().is_key_not_found());
    assert!(!backend.exists(KEY).await.unwrap());
}

#[tokio::test]
async fn ttl_returns_not_found_if_key_does_not_exist() {
    assert!(backend().ttl(KEY).await.unwrap_err().is_key_not_found());
}

#[tokio::test(start_paused = true)]
async fn expire_employs_ttl() {
    let backend = backend();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    backend.expire(KEY, Duration::from_secs(1)).await.unwrap();
    let ttl = backend.ttl(KEY).await.unwrap().expect("ttl employed");
    assert!(ttl > Duration::from_millis(500));
    assert!(ttl <= Duration::from_millis(1500));
}

#[tokio::test]
async fn expire_on_non_existing_key_returns_not_found() {
    let err = backend().expire(KEY, Duration::from_secs(1)).await.unwrap_err();
    assert!(err.is_key_not_found());
}

#[tokio::test(start_paused = true)]
async fn expire_with_zero_duration_clears_ttl() {
    let backend = backend();
    backend
        .set(KEY, value(), Duration::from_secs(60))
        .await
        .unwrap();
    backend.expire(KEY, NO_EXPIRATION).await.unwrap();
    assert_eq!(backend.ttl(KEY).await.unwrap(), None);
}

#[tokio::test]
async fn delete_succeeds_if_key_does_not_exist() {
    backend().delete(KEY).await.unwrap();
}

#[tokio::test]
async fn delete_removes_existing_key() {
    let backend = backend();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    backend.delete(KEY).await.unwrap();
    assert!(!backend.exists(KEY).await.unwrap());
}

#[tokio::test]
async fn flush_db_deletes_all_keys() {
    let backend = backend();
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    backend.set(KEY2, value(), NO_EXPIRATION).await.unwrap();
    backend.flush_db().await.unwrap();
    assert!(!backend.exists(KEY).await.unwrap());
    assert!(!backend.exists(KEY2).await.unwrap());
}

#[tokio::test]
async fn address_returns_configured_address() {
    assert_eq!(backend().address(), "localhost");
}

#[tokio::test]
async fn lock_succeeds_on_clean_database() {
    let backend = backend();
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(backend.exists(KEY).await.unwrap());
}

#[tokio::test]
async fn consecutive_lock_fails() {
    let backend = backend();
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
    let err = backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.is_not_acquired());
}

#[tokio::test]
async fn unlock_releases_previously_locked_key() {
    let backend = backend();
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
    backend.unlock(KEY).await.unwrap();
    assert!(!backend.exists(KEY).await.unwrap());
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn lock_succeeds_after_previous_lock_expired() {
    let backend = backend();
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
    advance(Duration::from_secs(2)).await;
    backend
        .lock(KEY, Bytes::from_static(b"-"), Duration::from_secs(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn exists_reports_key_presence() {
    let backend = backend();
    assert!(!backend.exists(KEY).await.unwrap());
    backend.set(KEY, value(), NO_EXPIRATION).await.unwrap();
    assert!(backend.exists(KEY).await.unwrap());
}

#[tokio::test]
async fn closed_backend_answers_closed_to_everything() {
    let backend = backend();
    backend.close().await.unwrap();
    assert!(backend.get(KEY).await.unwrap_err().is_closed());
    assert!(backend
        .set(KEY, value(), NO_EXPIRATION)
        .await
        .unwrap_err()
        .is_closed());
    assert!(backend.delete(KEY).await.unwrap_err().is_closed());
    assert!(backend.ttl(KEY).await.unwrap_err().is_closed());
    assert!(backend
        .expire(KEY, Duration::from_secs(1))
        .await
        .unwrap_err()
        .is_closed());
    assert!(backend.exists(KEY).await.unwrap_err().is_closed());
    assert!(backend.flush_db().await.unwrap_err().is_closed());
    assert!(backend.close().await.unwrap_err().is_closed());
}
