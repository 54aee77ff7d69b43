use crate::cluster::{majority, Cluster};
use crate::engine::{
    Engine, OperationMode, ReadOperator, RepairArgs, RepairOperator, RollbackArgs,
    RollbackOperator, VotingMode, WriteOperator,
};
use crate::prelude::*;
use bytes::Bytes;
use qstore_common::{
    configs::Node as NodeConfig,
    data::{
        DeleteRequest, ExistsRequest, ExistsResponse, ExpireRequest, ExpireResponse, GetRequest,
        GetResponse, GetTtlRequest, GetTtlResponse, LockRequest, ReadOptions, SetRequest,
        UnlockRequest, WriteOptions,
    },
    metrics::*,
};

pub mod comparers;

#[cfg(test)]
mod tests;

/// Stable operation contract of the proxy; transports marshal onto this.
#[async_trait]
pub trait Service: Send + Sync {
    async fn set(&self, request: SetRequest) -> Result<(), Error>;

    async fn get(&self, request: GetRequest) -> Result<GetResponse, Error>;

    async fn delete(&self, request: DeleteRequest) -> Result<(), Error>;

    async fn expire(&self, request: ExpireRequest) -> Result<ExpireResponse, Error>;

    async fn exists(&self, request: ExistsRequest) -> Result<ExistsResponse, Error>;

    async fn get_ttl(&self, request: GetTtlRequest) -> Result<GetTtlResponse, Error>;

    async fn lock(&self, request: LockRequest) -> Result<(), Error>;

    async fn unlock(&self, request: UnlockRequest) -> Result<(), Error>;

    async fn flush_db(&self) -> Result<(), Error>;

    async fn close(&self) -> Result<(), Error>;
}

/// Builds per-operation operators, asks the cluster for a view and hands
/// both to the engine. Holds no per-request state; each request owns its
/// operators as closures over the request body.
pub struct CoreService {
    cluster: Arc<dyn Cluster>,
    engine: Engine,
    default_read_consistency: ConsistencyLevel,
    default_write_consistency: ConsistencyLevel,
}

impl CoreService {
    pub fn new(cluster: Arc<dyn Cluster>, engine: Engine) -> Self {
        Self {
            cluster,
            engine,
            default_read_consistency: ConsistencyLevel::Majority,
            default_write_consistency: ConsistencyLevel::All,
        }
    }

    pub fn configured(cluster: Arc<dyn Cluster>, engine: Engine, config: &NodeConfig) -> Self {
        Self::new(cluster, engine)
            .with_default_read_consistency(config.read_consistency())
            .with_default_write_consistency(config.write_consistency())
    }

    pub fn with_default_read_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.default_read_consistency = consistency;
        self
    }

    pub fn with_default_write_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.default_write_consistency = consistency;
        self
    }

    fn read_consistency(&self, options: &ReadOptions) -> ConsistencyLevel {
        if options.consistency == ConsistencyLevel::Default {
            self.default_read_consistency
        } else {
            options.consistency
        }
    }

    fn write_consistency(&self, options: &WriteOptions) -> ConsistencyLevel {
        if options.consistency == ConsistencyLevel::Default {
            self.default_write_consistency
        } else {
            options.consistency
        }
    }

    async fn perform_write(
        &self,
        key: &str,
        consistency: ConsistencyLevel,
        operator: WriteOperator,
        rollback: RollbackOperator,
        mode: OperationMode,
    ) -> Result<(), Error> {
        let view = self.cluster.write(key, consistency).await?;
        let backends = if mode == OperationMode::Sequential {
            sort_backends(view.backends)
        } else {
            view.backends
        };
        self.engine
            .write(&backends, view.required, operator, rollback, mode)
            .await
    }

    async fn perform_read(
        &self,
        key: &str,
        consistency: ConsistencyLevel,
        operator: ReadOperator,
        repair: Option<RepairOperator>,
        comparer: crate::engine::ValueComparer,
    ) -> Result<Value, Error> {
        let view = self.cluster.read(key, consistency).await?;
        self.engine
            .read(
                &view.backends,
                view.required,
                operator,
                repair,
                comparer,
                view.voting_mode,
            )
            .await
    }
}

impl Debug for CoreService {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("CoreService")
            .field("default_read_consistency", &self.default_read_consistency)
            .field("default_write_consistency", &self.default_write_consistency)
            .finish()
    }
}

#[async_trait]
impl Service for CoreService {
    async fn set(&self, request: SetRequest) -> Result<(), Error> {
        counter!(SERVICE_SET_COUNTER, 1);
        let operator = set_operator(&request.key, request.data.clone(), request.expiration);
        let rollback = delete_rollback(self.engine.clone(), request.key.clone());
        let result = self
            .perform_write(
                &request.key,
                self.write_consistency(&request.options),
                operator,
                rollback,
                OperationMode::Concurrent,
            )
            .await;
        count_error(result, SERVICE_SET_ERROR_COUNT_COUNTER)
    }

    async fn get(&self, request: GetRequest) -> Result<GetResponse, Error> {
        counter!(SERVICE_GET_COUNTER, 1);
        let repair = get_repair(self.engine.clone(), request.key.clone());
        let result = self
            .perform_read(
                &request.key,
                self.read_consistency(&request.options),
                get_operator(&request.key),
                Some(repair),
                comparers::bytes,
            )
            .await;
        match count_error(result, SERVICE_GET_ERROR_COUNT_COUNTER)? {
            Value::Bytes(data) => Ok(GetResponse { data }),
            other => {
                error!("GET[{}] produced unexpected shape: {:?}", request.key, other);
                Err(Error::internal())
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), Error> {
        counter!(SERVICE_DELETE_COUNTER, 1);
        // delete already is the intended outcome of its own rollback
        let result = self
            .perform_write(
                &request.key,
                self.write_consistency(&request.options),
                delete_operator(&request.key),
                noop_rollback(),
                OperationMode::Concurrent,
            )
            .await;
        count_error(result, SERVICE_DELETE_ERROR_COUNT_COUNTER)
    }

    async fn expire(&self, request: ExpireRequest) -> Result<ExpireResponse, Error> {
        counter!(SERVICE_EXPIRE_COUNTER, 1);
        let repair = spread_repair(self.engine.clone(), request.key.clone());
        let read_options = ReadOptions {
            consistency: request.options.consistency,
        };
        let result = self
            .perform_read(
                &request.key,
                self.read_consistency(&read_options),
                expire_operator(&request.key, request.expiration),
                Some(repair),
                comparers::boolean,
            )
            .await;
        match result {
            Ok(Value::Flag(exists)) => Ok(ExpireResponse { exists }),
            Ok(other) => {
                counter!(SERVICE_EXPIRE_ERROR_COUNT_COUNTER, 1);
                error!(
                    "EXPIRE[{}] produced unexpected shape: {:?}",
                    request.key, other
                );
                Err(Error::internal())
            }
            Err(e) if e.is_key_not_found() => Ok(ExpireResponse { exists: false }),
            Err(e) => {
                counter!(SERVICE_EXPIRE_ERROR_COUNT_COUNTER, 1);
                Err(e)
            }
        }
    }

    async fn exists(&self, request: ExistsRequest) -> Result<ExistsResponse, Error> {
        counter!(SERVICE_EXISTS_COUNTER, 1);
        let repair = spread_repair(self.engine.clone(), request.key.clone());
        let result = self
            .perform_read(
                &request.key,
                self.read_consistency(&request.options),
                exists_operator(&request.key),
                Some(repair),
                comparers::boolean,
            )
            .await;
        match result {
            Ok(Value::Flag(exists)) => Ok(ExistsResponse { exists }),
            Ok(other) => {
                counter!(SERVICE_EXISTS_ERROR_COUNT_COUNTER, 1);
                error!(
                    "EXISTS[{}] produced unexpected shape: {:?}",
                    request.key, other
                );
                Err(Error::internal())
            }
            Err(e) if e.is_key_not_found() => Ok(ExistsResponse { exists: false }),
            Err(e) => {
                counter!(SERVICE_EXISTS_ERROR_COUNT_COUNTER, 1);
                Err(e)
            }
        }
    }

    async fn get_ttl(&self, request: GetTtlRequest) -> Result<GetTtlResponse, Error> {
        counter!(SERVICE_GET_TTL_COUNTER, 1);
        let repair = get_ttl_repair(self.engine.clone(), request.key.clone());
        let result = self
            .perform_read(
                &request.key,
                self.read_consistency(&request.options),
                ttl_operator(&request.key),
                Some(repair),
                comparers::duration,
            )
            .await;
        match count_error(result, SERVICE_GET_TTL_ERROR_COUNT_COUNTER)? {
            Value::Ttl(ttl) => Ok(GetTtlResponse { ttl }),
            other => {
                error!(
                    "GETTTL[{}] produced unexpected shape: {:?}",
                    request.key, other
                );
                Err(Error::internal())
            }
        }
    }

    async fn lock(&self, request: LockRequest) -> Result<(), Error> {
        counter!(SERVICE_LOCK_COUNTER, 1);
        let operator = lock_operator(&request.key, request.data.clone(), request.expiration);
        let rollback = unlock_rollback(self.engine.clone(), request.key.clone());
        // Ordered dispatch prevents circular wait between clients locking
        // the same keys concurrently.
        let result = self
            .perform_write(
                &request.key,
                self.write_consistency(&request.options),
                operator,
                rollback,
                OperationMode::Sequential,
            )
            .await;
        count_error(result, SERVICE_LOCK_ERROR_COUNT_COUNTER)
    }

    async fn unlock(&self, request: UnlockRequest) -> Result<(), Error> {
        counter!(SERVICE_UNLOCK_COUNTER, 1);
        let result = self
            .perform_write(
                &request.key,
                self.write_consistency(&request.options),
                unlock_operator(&request.key),
                noop_rollback(),
                OperationMode::Concurrent,
            )
            .await;
        count_error(result, SERVICE_UNLOCK_ERROR_COUNT_COUNTER)
    }

    async fn flush_db(&self) -> Result<(), Error> {
        counter!(SERVICE_FLUSH_DB_COUNTER, 1);
        let result = match self.cluster.flush_db().await {
            Ok(view) => {
                self.engine
                    .write(
                        &view.backends,
                        view.required,
                        flush_operator(),
                        noop_rollback(),
                        OperationMode::Concurrent,
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        count_error(result, SERVICE_FLUSH_DB_ERROR_COUNT_COUNTER)
    }

    async fn close(&self) -> Result<(), Error> {
        let mut last_err = self.cluster.close().await.err();
        if let Err(e) = self.engine.close() {
            if let Some(prev) = last_err.take() {
                error!("unexpected error while closing core service: {}", prev);
            }
            last_err = Some(e);
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn count_error<T>(result: Result<T, Error>, counter_name: &'static str) -> Result<T, Error> {
    if result.is_err() {
        counter!(counter_name, 1);
    }
    result
}

fn sort_backends(mut backends: Vec<SharedBackend>) -> Vec<SharedBackend> {
    backends.sort_by(|x, y| x.address().cmp(y.address()));
    backends
}

// ======================= Operators =================

fn get_operator(key: &str) -> ReadOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move { backend.get(&key).await.map(Value::Bytes) }.boxed()
    })
}

fn ttl_operator(key: &str) -> ReadOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move { backend.ttl(&key).await.map(Value::Ttl) }.boxed()
    })
}

fn exists_operator(key: &str) -> ReadOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move {
            // absence travels as the not-found error so that voting and
            // repair share the lookup shape
            match backend.exists(&key).await? {
                true => Ok(Value::Flag(true)),
                false => Err(Error::key_not_found()),
            }
        }
        .boxed()
    })
}

fn expire_operator(key: &str, expiration: Duration) -> ReadOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move {
            backend.expire(&key, expiration).await?;
            Ok(Value::Flag(true))
        }
        .boxed()
    })
}

fn set_operator(key: &str, data: Bytes, expiration: Duration) -> WriteOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        let data = data.clone();
        async move { backend.set(&key, data, expiration).await }.boxed()
    })
}

fn delete_operator(key: &str) -> WriteOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move { backend.delete(&key).await }.boxed()
    })
}

fn lock_operator(key: &str, token: Bytes, expiration: Duration) -> WriteOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        let token = token.clone();
        async move { backend.lock(&key, token, expiration).await }.boxed()
    })
}

fn unlock_operator(key: &str) -> WriteOperator {
    let key = key.to_string();
    Arc::new(move |backend: SharedBackend| {
        let key = key.clone();
        async move { backend.unlock(&key).await }.boxed()
    })
}

fn flush_operator() -> WriteOperator {
    Arc::new(|backend: SharedBackend| async move { backend.flush_db().await }.boxed())
}

fn noop_rollback() -> RollbackOperator {
    Arc::new(|_args: RollbackArgs| async {}.boxed())
}

fn delete_rollback(engine: Engine, key: String) -> RollbackOperator {
    Arc::new(move |args: RollbackArgs| {
        let engine = engine.clone();
        let key = key.clone();
        async move {
            if let Err(e) = engine
                .write(
                    &args.nodes,
                    0,
                    delete_operator(&key),
                    noop_rollback(),
                    OperationMode::Concurrent,
                )
                .await
            {
                error!("unexpected error during SET rollback: {}", e);
            }
        }
        .boxed()
    })
}

fn unlock_rollback(engine: Engine, key: String) -> RollbackOperator {
    Arc::new(move |args: RollbackArgs| {
        let engine = engine.clone();
        let key = key.clone();
        async move {
            if let Err(e) = engine
                .write(
                    &args.nodes,
                    0,
                    unlock_operator(&key),
                    noop_rollback(),
                    OperationMode::Concurrent,
                )
                .await
            {
                error!("unexpected error during LOCK rollback: {}", e);
            }
        }
        .boxed()
    })
}

// ======================= Read repair =================

async fn best_effort(
    engine: &Engine,
    backends: &[SharedBackend],
    operator: WriteOperator,
    rollback: RollbackOperator,
) {
    if let Err(e) = engine
        .write(backends, 0, operator, rollback, OperationMode::Concurrent)
        .await
    {
        error!("unexpected error during read repair: {}", e);
    }
}

/// Expiration agreed on by a majority of the winners. The outer `None` means
/// the evidence could not be read; `Some(None)` means the winners agree the
/// key carries no expiration.
async fn winners_ttl(
    engine: &Engine,
    key: &str,
    winners: &[SharedBackend],
) -> Option<Option<Duration>> {
    let result = engine
        .read(
            winners,
            majority(winners.len()),
            ttl_operator(key),
            None,
            comparers::duration,
            VotingMode::SkipVoteOnNotFound,
        )
        .await;
    match result {
        Ok(value) => value.as_ttl(),
        Err(e) => {
            error!("unexpected error during read repair: {}", e);
            None
        }
    }
}

/// Payload agreed on by a majority of the winners.
async fn winners_value(engine: &Engine, key: &str, winners: &[SharedBackend]) -> Option<Bytes> {
    let result = engine
        .read(
            winners,
            majority(winners.len()),
            get_operator(key),
            None,
            comparers::bytes,
            VotingMode::SkipVoteOnNotFound,
        )
        .await;
    match result {
        Ok(value) => value.as_bytes().cloned(),
        Err(e) => {
            error!("unexpected error during read repair: {}", e);
            None
        }
    }
}

fn won_with_not_found(args: &RepairArgs) -> bool {
    args.err.as_ref().map_or(false, Error::is_key_not_found)
}

/// GET repair: losers of a not-found verdict hold a stale value and are
/// cleared; losers of a value verdict receive the winning value under the
/// winners' agreed TTL. Absent or ambiguous TTL evidence leaves the losers
/// alone.
fn get_repair(engine: Engine, key: String) -> RepairOperator {
    Arc::new(move |args: RepairArgs| {
        let engine = engine.clone();
        let key = key.clone();
        async move {
            if won_with_not_found(&args) {
                best_effort(&engine, &args.losers, delete_operator(&key), noop_rollback()).await;
                return;
            }
            let ttl = match winners_ttl(&engine, &key, &args.winners).await {
                Some(Some(ttl)) if !ttl.is_zero() => ttl,
                _ => return,
            };
            let data = match args.value.as_ref().and_then(Value::as_bytes) {
                Some(data) => data.clone(),
                None => return,
            };
            best_effort(
                &engine,
                &args.losers,
                set_operator(&key, data, ttl),
                delete_rollback(engine.clone(), key.clone()),
            )
            .await;
        }
        .boxed()
    })
}

/// EXPIRE/EXISTS repair: the winning outcome carries no payload, so both the
/// agreed TTL and the agreed value are read back from the winners before the
/// losers are converged. A zero TTL means the key is as good as gone and the
/// losers are cleared instead.
fn spread_repair(engine: Engine, key: String) -> RepairOperator {
    Arc::new(move |args: RepairArgs| {
        let engine = engine.clone();
        let key = key.clone();
        async move {
            if won_with_not_found(&args) {
                best_effort(&engine, &args.losers, delete_operator(&key), noop_rollback()).await;
                return;
            }
            let ttl = match winners_ttl(&engine, &key, &args.winners).await {
                Some(Some(ttl)) => ttl,
                _ => return,
            };
            if ttl.is_zero() {
                best_effort(&engine, &args.losers, delete_operator(&key), noop_rollback()).await;
                return;
            }
            let data = match winners_value(&engine, &key, &args.winners).await {
                Some(data) => data,
                None => return,
            };
            best_effort(
                &engine,
                &args.losers,
                set_operator(&key, data, ttl),
                delete_rollback(engine.clone(), key.clone()),
            )
            .await;
        }
        .boxed()
    })
}

/// GETTTL repair: the winning TTL itself drives the convergence of the
/// losers; only the payload is read back from the winners. A zero winning
/// TTL means the key is as good as gone and clears the losers instead, while
/// a persistent winner still converges them, without an expiration.
fn get_ttl_repair(engine: Engine, key: String) -> RepairOperator {
    Arc::new(move |args: RepairArgs| {
        let engine = engine.clone();
        let key = key.clone();
        async move {
            if won_with_not_found(&args) {
                best_effort(&engine, &args.losers, delete_operator(&key), noop_rollback()).await;
                return;
            }
            let ttl = match args.value.as_ref().and_then(Value::as_ttl) {
                Some(Some(ttl)) if ttl.is_zero() => {
                    best_effort(&engine, &args.losers, delete_operator(&key), noop_rollback())
                        .await;
                    return;
                }
                Some(Some(ttl)) => ttl,
                Some(None) => Duration::ZERO,
                None => return,
            };
            let data = match winners_value(&engine, &key, &args.winners).await {
                Some(data) => data,
                None => return,
            };
            best_effort(
                &engine,
                &args.losers,
                set_operator(&key, data, ttl),
                delete_rollback(engine.clone(), key.clone()),
            )
            .await;
        }
        .boxed()
    })
}
