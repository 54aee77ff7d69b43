use super::*;
use crate::cluster::fixed::FixedCluster;
use crate::cluster::{Cluster, View};
use crate::engine::Engine;
use crate::prelude::*;
use crate::test_utils::{self, mem_fleet};
use bytes::Bytes;
use qstore_backend::MockBackend;
use qstore_common::data::{
    ExistsRequest, ExistsResponse, ExpireRequest, ExpireResponse, GetRequest, GetTtlRequest,
    GetTtlResponse, LockRequest, ReadOptions, SetRequest, UnlockRequest, WriteOptions,
};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const KEY: &str = "key";

fn payload() -> Bytes {
    Bytes::from_static(b"Hello, World!")
}

fn service(backends: Vec<SharedBackend>) -> CoreService {
    test_utils::init_logger();
    CoreService::new(Arc::new(FixedCluster::new(backends)), Engine::new())
}

fn mock(address: &'static str) -> MockBackend {
    let mut mock = MockBackend::new();
    mock.expect_address().return_const(address.to_string());
    mock
}

fn get_request(consistency: ConsistencyLevel) -> GetRequest {
    GetRequest {
        key: KEY.to_string(),
        options: ReadOptions { consistency },
    }
}

fn set_request(consistency: ConsistencyLevel, expiration: Duration) -> SetRequest {
    SetRequest {
        key: KEY.to_string(),
        data: payload(),
        expiration,
        options: WriteOptions { consistency },
    }
}

async fn eventually(mut probe: impl FnMut() -> BoxFuture<'static, bool>) -> bool {
    for _ in 0..200 {
        if probe().await {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    false
}

fn holds_payload(backend: &SharedBackend) -> BoxFuture<'static, bool> {
    let backend = backend.clone();
    async move {
        backend
            .get(KEY)
            .await
            .map(|data| data == payload())
            .unwrap_or(false)
    }
    .boxed()
}

fn misses_key(backend: &SharedBackend) -> BoxFuture<'static, bool> {
    let backend = backend.clone();
    async move {
        matches!(backend.get(KEY).await, Err(ref e) if e.is_key_not_found())
    }
    .boxed()
}

// ======================= GET =================

#[tokio::test]
async fn set_then_get_round_trip_reaches_every_replica() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    let svc = service(backends.clone());

    svc.set(set_request(ConsistencyLevel::All, Duration::ZERO))
        .await
        .unwrap();
    let response = svc.get(get_request(ConsistencyLevel::All)).await.unwrap();

    assert_eq!(response.data, payload());
    for backend in &backends {
        assert_eq!(backend.get(KEY).await.unwrap(), payload());
    }
}

#[tokio::test]
async fn get_with_full_agreement_issues_no_repair_writes() {
    let mut backends: Vec<SharedBackend> = Vec::new();
    for address in ["a:0", "b:0", "c:0"] {
        let mut replica = mock(address);
        replica.expect_get().returning(|_| Ok(payload()));
        replica
            .expect_ttl()
            .returning(|_| Ok(Some(Duration::from_secs(60))));
        replica.expect_set().times(0);
        replica.expect_delete().times(0);
        backends.push(Arc::new(replica));
    }
    let svc = service(backends);

    let response = svc.get(get_request(ConsistencyLevel::All)).await.unwrap();
    assert_eq!(response.data, payload());

    // let the repair round finish before the mocks check their call counts
    sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn get_repairs_a_lagging_replica_under_the_agreed_ttl() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::from_secs(60))
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::from_secs(60))
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .get(get_request(ConsistencyLevel::Majority))
        .await
        .unwrap();
    assert_eq!(response.data, payload());

    let straggler = backends[2].clone();
    assert!(eventually(move || holds_payload(&straggler)).await);
    let ttl = backends[2].ttl(KEY).await.unwrap().expect("ttl repaired");
    assert!(ttl > Duration::from_secs(55));
    assert!(ttl <= Duration::from_secs(60));
}

#[tokio::test]
async fn get_skips_repair_when_the_winners_carry_no_expiration() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .get(get_request(ConsistencyLevel::Majority))
        .await
        .unwrap();
    assert_eq!(response.data, payload());

    sleep(Duration::from_millis(100)).await;
    assert!(backends[2].get(KEY).await.unwrap_err().is_key_not_found());
}

#[tokio::test]
async fn get_surfaces_not_found_from_a_single_replica() {
    let svc = service(mem_fleet(&["a:0"]));
    let err = svc
        .get(get_request(ConsistencyLevel::All))
        .await
        .unwrap_err();
    assert!(err.is_key_not_found());
}

#[tokio::test]
async fn get_clears_stale_values_when_absence_wins() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[2]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    let svc = service(backends.clone());

    let err = svc
        .get(get_request(ConsistencyLevel::Majority))
        .await
        .unwrap_err();
    assert!(err.is_key_not_found());

    let stale = backends[2].clone();
    assert!(eventually(move || misses_key(&stale)).await);
}

// ======================= SET =================

#[tokio::test]
async fn partially_failed_set_rolls_back_the_replicas_that_took_it() {
    let mut flaky = mock("c:0");
    flaky
        .expect_set()
        .returning(|_, _, _| Err(Error::backend("transport error")));
    let backends: Vec<SharedBackend> = vec![
        Arc::new(qstore_backend::MemBackend::new("a:0")),
        Arc::new(qstore_backend::MemBackend::new("b:0")),
        Arc::new(flaky),
    ];
    let svc = service(backends.clone());

    let err = svc
        .set(set_request(ConsistencyLevel::All, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(err.is_consistency());

    let first = backends[0].clone();
    assert!(eventually(move || misses_key(&first)).await);
    let second = backends[1].clone();
    assert!(eventually(move || misses_key(&second)).await);
}

#[tokio::test]
async fn repeating_a_set_is_observationally_idempotent() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    let svc = service(backends.clone());

    let request = set_request(ConsistencyLevel::All, Duration::from_secs(60));
    svc.set(request.clone()).await.unwrap();
    svc.set(request).await.unwrap();

    let response = svc.get(get_request(ConsistencyLevel::All)).await.unwrap();
    assert_eq!(response.data, payload());
    for backend in &backends {
        assert_eq!(backend.get(KEY).await.unwrap(), payload());
    }
}

// ======================= LOCK / UNLOCK =================

#[tokio::test]
async fn lock_dispatches_sequentially_in_address_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut backends: Vec<SharedBackend> = Vec::new();
    for address in ["c:0", "a:0", "b:0"] {
        let mut replica = mock(address);
        let order = order.clone();
        replica.expect_lock().returning(move |_, _, _| {
            order.lock().unwrap().push(address);
            Ok(())
        });
        backends.push(Arc::new(replica));
    }
    let svc = service(backends);

    svc.lock(LockRequest {
        key: KEY.to_string(),
        data: Bytes::from_static(b"-"),
        expiration: Duration::from_secs(1),
        options: WriteOptions {
            consistency: ConsistencyLevel::All,
        },
    })
    .await
    .unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["a:0", "b:0", "c:0"]);
}

#[tokio::test]
async fn contended_lock_unlocks_the_succeeded_prefix_only() {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut first = mock("a:0");
    first.expect_lock().returning(|_, _, _| Ok(()));
    first.expect_unlock().returning(move |_| {
        let _ = tx.send("a:0");
        Ok(())
    });

    let mut contended = mock("b:0");
    contended
        .expect_lock()
        .returning(|_, _, _| Err(Error::not_acquired()));
    contended.expect_unlock().times(0);

    let mut untouched = mock("c:0");
    untouched.expect_lock().times(0);
    untouched.expect_unlock().times(0);

    let backends: Vec<SharedBackend> =
        vec![Arc::new(first), Arc::new(contended), Arc::new(untouched)];
    let svc = service(backends);

    let err = svc
        .lock(LockRequest {
            key: KEY.to_string(),
            data: Bytes::from_static(b"-"),
            expiration: Duration::from_secs(1),
            options: WriteOptions {
                consistency: ConsistencyLevel::All,
            },
        })
        .await
        .unwrap_err();
    assert!(err.is_consistency());

    let unlocked = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("rollback completes in time")
        .expect("rollback unlocks the prefix");
    assert_eq!(unlocked, "a:0");
}

#[tokio::test]
async fn unlock_releases_the_key_on_every_replica() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    let svc = service(backends.clone());

    svc.lock(LockRequest {
        key: KEY.to_string(),
        data: Bytes::from_static(b"-"),
        expiration: Duration::from_secs(30),
        options: WriteOptions {
            consistency: ConsistencyLevel::All,
        },
    })
    .await
    .unwrap();
    for backend in &backends {
        assert!(backend.exists(KEY).await.unwrap());
    }

    svc.unlock(UnlockRequest {
        key: KEY.to_string(),
        options: WriteOptions {
            consistency: ConsistencyLevel::All,
        },
    })
    .await
    .unwrap();
    for backend in &backends {
        assert!(!backend.exists(KEY).await.unwrap());
    }
}

// ======================= EXPIRE / EXISTS =================

#[tokio::test]
async fn expire_reports_exists_false_for_a_missing_key() {
    let svc = service(mem_fleet(&["a:0", "b:0", "c:0"]));
    let response = svc
        .expire(ExpireRequest {
            key: KEY.to_string(),
            expiration: Duration::from_secs(60),
            options: WriteOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, ExpireResponse { exists: false });
}

#[tokio::test]
async fn expire_applies_the_ttl_on_the_quorum() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    for backend in &backends {
        backend.set(KEY, payload(), Duration::ZERO).await.unwrap();
    }
    let svc = service(backends.clone());

    let response = svc
        .expire(ExpireRequest {
            key: KEY.to_string(),
            expiration: Duration::from_secs(60),
            options: WriteOptions {
                consistency: ConsistencyLevel::All,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, ExpireResponse { exists: true });

    for backend in &backends {
        let ttl = backend.ttl(KEY).await.unwrap().expect("ttl employed");
        assert!(ttl > Duration::from_secs(55));
    }
}

#[tokio::test]
async fn expire_repairs_the_replica_that_missed_the_key() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .expire(ExpireRequest {
            key: KEY.to_string(),
            expiration: Duration::from_secs(60),
            options: WriteOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, ExpireResponse { exists: true });

    let straggler = backends[2].clone();
    assert!(eventually(move || holds_payload(&straggler)).await);
    let ttl = backends[2].ttl(KEY).await.unwrap().expect("ttl repaired");
    assert!(ttl > Duration::from_secs(55));
}

#[tokio::test]
async fn exists_reports_false_and_clears_the_stale_minority() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .exists(ExistsRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, ExistsResponse { exists: false });

    let stale = backends[0].clone();
    assert!(eventually(move || misses_key(&stale)).await);
}

#[tokio::test]
async fn exists_reports_true_on_a_quorum() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    let svc = service(backends);

    let response = svc
        .exists(ExistsRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, ExistsResponse { exists: true });
}

// ======================= GETTTL =================

#[tokio::test]
async fn get_ttl_propagates_not_found() {
    let svc = service(mem_fleet(&["a:0", "b:0", "c:0"]));
    let err = svc
        .get_ttl(GetTtlRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap_err();
    assert!(err.is_key_not_found());
}

#[tokio::test]
async fn get_ttl_reports_none_for_a_persistent_key() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    for backend in &backends {
        backend.set(KEY, payload(), Duration::ZERO).await.unwrap();
    }
    let svc = service(backends);

    let response = svc
        .get_ttl(GetTtlRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::All,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, GetTtlResponse { ttl: None });
}

#[tokio::test]
async fn get_ttl_persistent_winner_converges_the_expiring_loser() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::ZERO)
        .await
        .unwrap();
    backends[2]
        .set(KEY, payload(), Duration::from_secs(10))
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .get_ttl(GetTtlRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    assert_eq!(response, GetTtlResponse { ttl: None });

    // the loser is rewritten without an expiration
    let outlier = backends[2].clone();
    assert!(
        eventually(move || {
            let backend = outlier.clone();
            async move { matches!(backend.ttl(KEY).await, Ok(None)) }.boxed()
        })
        .await
    );
    assert_eq!(backends[2].get(KEY).await.unwrap(), payload());
}

#[tokio::test]
async fn get_ttl_agrees_across_countdown_skew_and_repairs_the_outlier() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    backends[0]
        .set(KEY, payload(), Duration::from_secs(60))
        .await
        .unwrap();
    backends[1]
        .set(KEY, payload(), Duration::from_millis(59_500))
        .await
        .unwrap();
    backends[2]
        .set(KEY, payload(), Duration::from_secs(10))
        .await
        .unwrap();
    let svc = service(backends.clone());

    let response = svc
        .get_ttl(GetTtlRequest {
            key: KEY.to_string(),
            options: ReadOptions {
                consistency: ConsistencyLevel::Majority,
            },
        })
        .await
        .unwrap();
    let ttl = response.ttl.expect("agreed ttl");
    assert!(ttl > Duration::from_secs(55));

    let outlier = backends[2].clone();
    assert!(
        eventually(move || {
            let backend = outlier.clone();
            async move {
                matches!(
                    backend.ttl(KEY).await,
                    Ok(Some(remaining)) if remaining > Duration::from_secs(50)
                )
            }
            .boxed()
        })
        .await
    );
}

// ======================= FLUSHDB =================

#[tokio::test]
async fn flush_db_clears_every_replica() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    for backend in &backends {
        backend.set(KEY, payload(), Duration::ZERO).await.unwrap();
    }
    let svc = service(backends.clone());

    svc.flush_db().await.unwrap();
    for backend in &backends {
        assert!(!backend.exists(KEY).await.unwrap());
    }
}

// ======================= Consistency substitution =================

struct ObservingCluster {
    inner: FixedCluster,
    read_levels: Mutex<Vec<ConsistencyLevel>>,
    write_levels: Mutex<Vec<ConsistencyLevel>>,
}

impl ObservingCluster {
    fn new(backends: Vec<SharedBackend>) -> Self {
        Self {
            inner: FixedCluster::new(backends),
            read_levels: Mutex::new(Vec::new()),
            write_levels: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Cluster for ObservingCluster {
    async fn read(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error> {
        self.read_levels.lock().unwrap().push(consistency);
        self.inner.read(key, consistency).await
    }

    async fn write(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error> {
        self.write_levels.lock().unwrap().push(consistency);
        self.inner.write(key, consistency).await
    }

    async fn flush_db(&self) -> Result<View, Error> {
        self.inner.flush_db().await
    }

    async fn close(&self) -> Result<(), Error> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn default_consistency_is_substituted_and_explicit_levels_pass_through() {
    test_utils::init_logger();
    let cluster = Arc::new(ObservingCluster::new(mem_fleet(&["a:0", "b:0", "c:0"])));
    let svc = CoreService::new(cluster.clone(), Engine::new())
        .with_default_read_consistency(ConsistencyLevel::One)
        .with_default_write_consistency(ConsistencyLevel::Majority);

    let _ = svc.get(get_request(ConsistencyLevel::Default)).await;
    let _ = svc.get(get_request(ConsistencyLevel::All)).await;
    assert_eq!(
        *cluster.read_levels.lock().unwrap(),
        vec![ConsistencyLevel::One, ConsistencyLevel::All]
    );

    svc.set(set_request(ConsistencyLevel::Default, Duration::ZERO))
        .await
        .unwrap();
    svc.set(set_request(ConsistencyLevel::One, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(
        *cluster.write_levels.lock().unwrap(),
        vec![ConsistencyLevel::Majority, ConsistencyLevel::One]
    );
}

// ======================= Shutdown =================

#[tokio::test]
async fn close_shuts_the_fleet_down_and_reports_reuse() {
    let backends = mem_fleet(&["a:0", "b:0", "c:0"]);
    let svc = service(backends.clone());

    svc.close().await.unwrap();
    for backend in &backends {
        assert!(backend.get(KEY).await.unwrap_err().is_closed());
    }

    // every vote now fails, so reads starve on consistency
    let err = svc
        .get(get_request(ConsistencyLevel::Majority))
        .await
        .unwrap_err();
    assert!(err.is_consistency());

    assert!(svc.close().await.unwrap_err().is_closed());
}
