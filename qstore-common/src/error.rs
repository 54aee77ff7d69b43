use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error as ErrorTrait;
use tonic::Status;

#[derive(Debug, Clone, ErrorTrait)]
pub struct Error {
    ctx: Kind,
}

impl Error {
    fn new(ctx: Kind) -> Self {
        Self { ctx }
    }

    pub fn kind(&self) -> &Kind {
        &self.ctx
    }

    pub fn is_key_not_found(&self) -> bool {
        self.ctx == Kind::KeyNotFound
    }

    pub fn is_consistency(&self) -> bool {
        self.ctx == Kind::Consistency
    }

    pub fn is_not_acquired(&self) -> bool {
        self.ctx == Kind::NotAcquired
    }

    pub fn is_closed(&self) -> bool {
        self.ctx == Kind::Closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx == Kind::Cancelled
    }

    pub fn is_timeout(&self) -> bool {
        self.ctx == Kind::Timeout
    }

    pub fn is_internal(&self) -> bool {
        self.ctx == Kind::Internal
    }

    pub fn key_not_found() -> Self {
        Self::new(Kind::KeyNotFound)
    }

    pub fn consistency() -> Self {
        Self::new(Kind::Consistency)
    }

    pub fn not_acquired() -> Self {
        Self::new(Kind::NotAcquired)
    }

    pub fn closed() -> Self {
        Self::new(Kind::Closed)
    }

    pub fn cancelled() -> Self {
        Self::new(Kind::Cancelled)
    }

    pub fn timeout() -> Self {
        Self::new(Kind::Timeout)
    }

    pub fn backend(cause: impl Into<String>) -> Self {
        Self::new(Kind::Backend(cause.into()))
    }

    pub fn internal() -> Self {
        Self::new(Kind::Internal)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.ctx, f)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::KeyNotFound => write!(f, "key not found"),
            Self::Consistency => write!(f, "too few replicas agreed or acknowledged"),
            Self::NotAcquired => write!(f, "lock is held by another owner"),
            Self::Closed => write!(f, "use after close"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Backend(description) => write!(f, "backend error: {}", description),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        trace!("Error: {}", err);
        match &err.ctx {
            Kind::KeyNotFound => Self::not_found(err.to_string()),
            Kind::Consistency => Self::unavailable(err.to_string()),
            Kind::Cancelled => Self::cancelled(err.to_string()),
            Kind::Timeout => Self::deadline_exceeded(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Kind {
    /// Semantic absence of a key on the deciding quorum.
    KeyNotFound,
    /// Too few replicas agreed on a read or acknowledged a write.
    Consistency,
    /// Lock contention on a single replica.
    NotAcquired,
    /// The backend or service was closed before the call.
    Closed,
    Cancelled,
    Timeout,
    /// A replica failed in a way the proxy cannot interpret.
    Backend(String),
    Internal,
}
