use crate::prelude::*;
use qstore_common::metrics::{ENGINE_REPAIR_COUNTER, ENGINE_ROLLBACK_COUNTER};

use self::voting::Ballot;

mod voting;


/// Per-backend action of a quorum write.
pub type WriteOperator =
    Arc<dyn Fn(SharedBackend) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Per-backend action of a quorum read.
pub type ReadOperator =
    Arc<dyn Fn(SharedBackend) -> BoxFuture<'static, Result<Value, Error>> + Send + Sync>;

/// Post-decision convergence hook for reads. Runs on a detached task; its
/// outcome never reaches the caller of [`Engine::read`].
pub type RepairOperator = Arc<dyn Fn(RepairArgs) -> BoxFuture<'static, ()> + Send + Sync>;

/// Post-failure undo hook for writes. Runs on a detached task; its outcome
/// never reaches the caller of [`Engine::write`].
pub type RollbackOperator = Arc<dyn Fn(RollbackArgs) -> BoxFuture<'static, ()> + Send + Sync>;

/// Equivalence relation used for voting.
pub type ValueComparer = fn(&Value, &Value) -> bool;

pub struct RepairArgs {
    /// The winning value. `None` when the winning outcome was a missing key.
    pub value: Option<Value>,
    /// Set to the not-found error when that outcome won the vote.
    pub err: Option<Error>,
    /// Backends that voted for the winner.
    pub winners: Vec<SharedBackend>,
    /// Backends that disagreed, or reported the key missing while a value
    /// won. Backends that failed outright appear in neither list.
    pub losers: Vec<SharedBackend>,
}

pub struct RollbackArgs {
    /// Backends whose write succeeded before the overall write was deemed
    /// failed.
    pub nodes: Vec<SharedBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Concurrent,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingMode {
    /// A missing key is a legitimate winning outcome.
    VoteOnNotFound,
    /// Missing keys count neither for nor against the vote.
    SkipVoteOnNotFound,
}

pub(crate) fn addresses(backends: &[SharedBackend]) -> Vec<&str> {
    backends.iter().map(|backend| backend.address()).collect()
}

impl Debug for RepairArgs {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("RepairArgs")
            .field("value", &self.value)
            .field("err", &self.err)
            .field("winners", &addresses(&self.winners))
            .field("losers", &addresses(&self.losers))
            .finish()
    }
}

impl Debug for RollbackArgs {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("RollbackArgs")
            .field("nodes", &addresses(&self.nodes))
            .finish()
    }
}

/// Generic executor behind every service operation. Drives a set of backends
/// through a caller-supplied operator, enforces the acknowledgement or vote
/// threshold, and hands divergence to the caller's repair or rollback hook.
/// The engine owns no state of its own and knows nothing about what an
/// operator does.
#[derive(Debug, Clone, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Applies `operator` to every backend and succeeds once at least
    /// `acknowledge_required` of them succeeded.
    ///
    /// Zero `acknowledge_required` means best effort: the call never fails
    /// and never rolls back. On failure with at least one success, `rollback`
    /// is started on a detached task with the succeeded backends.
    ///
    /// Sequential mode awaits each dispatch before starting the next, in the
    /// exact order given, and stops early once the threshold is out of
    /// reach, so a failed sequence leaves only a prefix touched.
    pub async fn write(
        &self,
        backends: &[SharedBackend],
        acknowledge_required: usize,
        operator: WriteOperator,
        rollback: RollbackOperator,
        mode: OperationMode,
    ) -> Result<(), Error> {
        let outcomes = match mode {
            OperationMode::Concurrent => Self::dispatch_concurrent(backends, &operator).await,
            OperationMode::Sequential => {
                Self::dispatch_sequential(backends, acknowledge_required, &operator).await
            }
        };

        let mut succeeded = Vec::new();
        for (backend, result) in outcomes {
            match result {
                Ok(()) => succeeded.push(backend),
                Err(e) => debug!("write to {} failed: {}", backend.address(), e),
            }
        }

        if acknowledge_required == 0 || succeeded.len() >= acknowledge_required {
            return Ok(());
        }

        warn!(
            "write acknowledged by {} of {} backends, required {}",
            succeeded.len(),
            backends.len(),
            acknowledge_required
        );
        if !succeeded.is_empty() {
            counter!(ENGINE_ROLLBACK_COUNTER, 1);
            tokio::spawn(rollback(RollbackArgs { nodes: succeeded }));
        }
        Err(Error::consistency())
    }

    /// Applies `operator` to every backend in parallel, groups the answers
    /// under `comparer` and returns the value of the first-formed group that
    /// reached `votes_required` with maximal cardinality. A winning
    /// not-found group yields the not-found error; no qualifying group
    /// yields the consistency error.
    ///
    /// When a winner is decided and `repair` is supplied, it is started on a
    /// detached task with the winner/loser partition. The call itself only
    /// returns after every dispatch has completed.
    pub async fn read(
        &self,
        backends: &[SharedBackend],
        votes_required: usize,
        operator: ReadOperator,
        repair: Option<RepairOperator>,
        comparer: ValueComparer,
        mode: VotingMode,
    ) -> Result<Value, Error> {
        let dispatches: FuturesUnordered<_> = backends
            .iter()
            .cloned()
            .map(|backend| {
                let operation = operator(backend.clone());
                async move { (backend, operation.await) }
            })
            .collect();
        let outcomes: Vec<_> = dispatches.collect().await;

        let mut ballot = Ballot::new(comparer);
        for (backend, result) in outcomes {
            ballot.record(backend, result);
        }
        let decision = ballot.decide(votes_required, mode)?;

        if let Some(repair) = repair {
            counter!(ENGINE_REPAIR_COUNTER, 1);
            let args = RepairArgs {
                value: decision.value.clone(),
                err: decision.value.is_none().then(Error::key_not_found),
                winners: decision.winners,
                losers: decision.losers,
            };
            trace!("spawn repair: {:?}", args);
            tokio::spawn(repair(args));
        }

        match decision.value {
            Some(value) => Ok(value),
            None => Err(Error::key_not_found()),
        }
    }

    pub fn close(&self) -> Result<(), Error> {
        // No owned resources; exists for the service shutdown order.
        Ok(())
    }

    async fn dispatch_concurrent(
        backends: &[SharedBackend],
        operator: &WriteOperator,
    ) -> Vec<(SharedBackend, Result<(), Error>)> {
        let dispatches: FuturesUnordered<_> = backends
            .iter()
            .cloned()
            .map(|backend| {
                let operation = operator(backend.clone());
                async move { (backend, operation.await) }
            })
            .collect();
        dispatches.collect().await
    }

    async fn dispatch_sequential(
        backends: &[SharedBackend],
        acknowledge_required: usize,
        operator: &WriteOperator,
    ) -> Vec<(SharedBackend, Result<(), Error>)> {
        let mut outcomes = Vec::with_capacity(backends.len());
        let mut succeeded = 0;
        for (dispatched, backend) in backends.iter().cloned().enumerate() {
            if succeeded + (backends.len() - dispatched) < acknowledge_required {
                debug!(
                    "sequential write cannot reach {} acknowledgements, stopping",
                    acknowledge_required
                );
                break;
            }
            let result = operator(backend.clone()).await;
            if result.is_ok() {
                succeeded += 1;
            }
            outcomes.push((backend, result));
        }
        outcomes
    }
}
