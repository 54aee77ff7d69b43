use bytes::Bytes;
use std::{str::FromStr, time::Duration};

/// Keys are plain strings; the proxy never interprets them.
pub type Key = String;

/// One outcome flowing through the voting engine. Every operation maps its
/// per-backend result into one of these shapes and supplies the matching
/// comparer, so the engine never needs to know what it is counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Stored payload, as returned by a backend `get`.
    Bytes(Bytes),
    /// Remaining time to live. `None` means the key carries no expiration.
    Ttl(Option<Duration>),
    /// Boolean outcome of operations such as expire and exists.
    Flag(bool),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_ttl(&self) -> Option<Option<Duration>> {
        match self {
            Self::Ttl(ttl) => Some(*ttl),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }
}

/// How many replicas must agree before an operation is reported successful.
/// `Default` is substituted with the service-configured level per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    Default,
    One,
    Majority,
    All,
}

impl Default for ConsistencyLevel {
    fn default() -> Self {
        Self::Default
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "one" => Ok(Self::One),
            "majority" => Ok(Self::Majority),
            "all" => Ok(Self::All),
            "default" => Ok(Self::Default),
            other => Err(format!("unrecognized consistency level: {}", other)),
        }
    }
}

/// Node selection policy applied by the cluster when a read arrives with
/// consistency `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Serve from the local replica when one is configured, otherwise from a
    /// single randomly chosen replica.
    ReadOneLocalOrRandomNode,
    /// Fan the read out to the whole fleet with a single vote required, so
    /// the first usable answer wins.
    ReadOneFirstAvailable,
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "readone-localorrandomnode" => Ok(Self::ReadOneLocalOrRandomNode),
            "readone-firstavailable" => Ok(Self::ReadOneFirstAvailable),
            other => Err(format!("unrecognized policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub consistency: ConsistencyLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub consistency: ConsistencyLevel,
}

#[derive(Debug, Clone)]
pub struct SetRequest {
    pub key: Key,
    pub data: Bytes,
    /// Zero means the key never expires.
    pub expiration: Duration,
    pub options: WriteOptions,
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub key: Key,
    pub options: ReadOptions,
}

#[derive(Debug, Clone)]
pub struct GetResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub key: Key,
    pub options: WriteOptions,
}

#[derive(Debug, Clone)]
pub struct ExpireRequest {
    pub key: Key,
    pub expiration: Duration,
    pub options: WriteOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpireResponse {
    pub exists: bool,
}

#[derive(Debug, Clone)]
pub struct ExistsRequest {
    pub key: Key,
    pub options: ReadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Clone)]
pub struct GetTtlRequest {
    pub key: Key,
    pub options: ReadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTtlResponse {
    /// `None` when the key carries no expiration.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LockRequest {
    pub key: Key,
    pub data: Bytes,
    pub expiration: Duration,
    pub options: WriteOptions,
}

#[derive(Debug, Clone)]
pub struct UnlockRequest {
    pub key: Key,
    pub options: WriteOptions,
}
