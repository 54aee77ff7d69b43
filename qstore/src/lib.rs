#![warn(missing_debug_implementations)]

//! Library requires tokio runtime.

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate metrics;

pub mod cluster;
pub mod engine;
pub mod service;

pub use crate::cluster::{fixed::FixedCluster, Cluster, View};
pub use crate::engine::{Engine, OperationMode, VotingMode};
pub use crate::service::{CoreService, Service};
pub use qstore_backend::{Backend, MemBackend, RedisBackend, SharedBackend};
pub use qstore_common::{
    configs::Node as NodeConfig,
    data::{
        ConsistencyLevel, DeleteRequest, ExistsRequest, ExistsResponse, ExpireRequest,
        ExpireResponse, GetRequest, GetResponse, GetTtlRequest, GetTtlResponse, LockRequest,
        Policy, ReadOptions, SetRequest, UnlockRequest, WriteOptions,
    },
    error::Error,
    metrics::init_counters,
};

mod prelude {
    pub use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
    pub use qstore_backend::{Backend, SharedBackend};
    pub use qstore_common::{
        data::{ConsistencyLevel, Policy, Value},
        error::Error,
    };
    pub use std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::Arc,
        time::Duration,
    };
}
