use crate::engine::{addresses, VotingMode};
use crate::prelude::*;

pub mod fixed;


/// Resolution of one request: which backends to consult and how many of them
/// must answer alike. `required` is acknowledgements-required when the view
/// feeds a write and votes-required when it feeds a read.
pub struct View {
    pub backends: Vec<SharedBackend>,
    pub required: usize,
    pub voting_mode: VotingMode,
}

impl View {
    pub fn new(backends: Vec<SharedBackend>, required: usize, voting_mode: VotingMode) -> Self {
        Self {
            backends,
            required,
            voting_mode,
        }
    }
}

impl Debug for View {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("View")
            .field("backends", &addresses(&self.backends))
            .field("required", &self.required)
            .field("voting_mode", &self.voting_mode)
            .finish()
    }
}

/// Maps `(key, consistency)` to a [`View`]. Membership and node-selection
/// policy live behind this trait; the engine treats the resolved view as
/// opaque.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Fails with the consistency error when the known fleet cannot satisfy
    /// the requested level.
    async fn read(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error>;

    async fn write(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error>;

    /// Fleet-wide view for operations that touch every replica.
    async fn flush_db(&self) -> Result<View, Error>;

    async fn close(&self) -> Result<(), Error>;
}

pub fn majority(count: usize) -> usize {
    count / 2 + 1
}
