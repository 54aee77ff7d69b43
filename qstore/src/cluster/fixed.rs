use super::{majority, Cluster, View};
use crate::engine::VotingMode;
use crate::prelude::*;
use rand::seq::SliceRandom;

/// Static-membership resolver: every replica hosts every key, so a view is
/// the whole fleet cut down to the requested threshold. Read-one policies
/// are applied in registration order; the first applicable one wins.
pub struct FixedCluster {
    backends: Vec<SharedBackend>,
    local: Option<SharedBackend>,
    policies: Vec<Policy>,
}

impl FixedCluster {
    pub fn new(backends: Vec<SharedBackend>) -> Self {
        Self {
            backends,
            local: None,
            policies: Vec::new(),
        }
    }

    /// Registers the replica co-located with this proxy; read-one traffic
    /// prefers it under [`Policy::ReadOneLocalOrRandomNode`].
    pub fn with_local(mut self, local: SharedBackend) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_policies(mut self, policies: impl IntoIterator<Item = Policy>) -> Self {
        self.policies.extend(policies);
        self
    }

    fn required(&self, consistency: ConsistencyLevel) -> Result<usize, Error> {
        if self.backends.is_empty() {
            warn!("cluster has no configured backends");
            return Err(Error::consistency());
        }
        let required = match consistency {
            ConsistencyLevel::One => 1,
            ConsistencyLevel::All => self.backends.len(),
            // the service substitutes DEFAULT before resolution; a stray one
            // resolves as majority
            ConsistencyLevel::Majority | ConsistencyLevel::Default => {
                majority(self.backends.len())
            }
        };
        Ok(required)
    }

    fn read_one_view(&self) -> Option<View> {
        for policy in &self.policies {
            match policy {
                Policy::ReadOneLocalOrRandomNode => {
                    let backend = self
                        .local
                        .clone()
                        .or_else(|| self.backends.choose(&mut rand::thread_rng()).cloned());
                    return backend
                        .map(|backend| View::new(vec![backend], 1, VotingMode::VoteOnNotFound));
                }
                Policy::ReadOneFirstAvailable => {
                    return Some(View::new(
                        self.backends.clone(),
                        1,
                        VotingMode::VoteOnNotFound,
                    ));
                }
            }
        }
        None
    }
}

impl Debug for FixedCluster {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("FixedCluster")
            .field("backends", &crate::engine::addresses(&self.backends))
            .field(
                "local",
                &self.local.as_ref().map(|backend| backend.address()),
            )
            .field("policies", &self.policies)
            .finish()
    }
}

#[async_trait]
impl Cluster for FixedCluster {
    async fn read(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error> {
        trace!("resolve read view for [{}]", key);
        let required = self.required(consistency)?;
        if consistency == ConsistencyLevel::One {
            if let Some(view) = self.read_one_view() {
                return Ok(view);
            }
        }
        Ok(View::new(
            self.backends.clone(),
            required,
            VotingMode::VoteOnNotFound,
        ))
    }

    async fn write(&self, key: &str, consistency: ConsistencyLevel) -> Result<View, Error> {
        trace!("resolve write view for [{}]", key);
        let required = self.required(consistency)?;
        Ok(View::new(
            self.backends.clone(),
            required,
            VotingMode::VoteOnNotFound,
        ))
    }

    async fn flush_db(&self) -> Result<View, Error> {
        if self.backends.is_empty() {
            return Err(Error::consistency());
        }
        Ok(View::new(
            self.backends.clone(),
            self.backends.len(),
            VotingMode::VoteOnNotFound,
        ))
    }

    async fn close(&self) -> Result<(), Error> {
        let mut last_err = None;
        for backend in &self.backends {
            if let Err(e) = backend.close().await {
                if last_err.is_none() {
                    last_err = Some(e);
                } else {
                    error!("unexpected error while closing {}: {}", backend.address(), e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
