//! Error types for registry setup and diagnostic retrieval
//!
//! Resolution misses are never errors: they degrade to "pass the code
//! through" or "nothing pending". Only setup mistakes and retrieval-time
//! resource/transport failures surface here.

use core::fmt;

use crate::transport::Fault;

/// Result type for exterr operations
pub type ExtResult<T> = Result<T, ExtError>;

/// Errors surfaced to the immediate caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtError {
    /// Registry configuration is inconsistent
    InvalidConfig(&'static str),

    /// The process-wide registry was already built
    AlreadyInitialized,

    /// Destination cannot even hold the terminator
    BufferTooSmall,

    /// Payload buffer could not be allocated
    NoMemory,

    /// A domain formatter reported failure
    FormatFailed { domain: &'static str },

    /// The destination refused the bytes
    Transport(Fault),
}

impl ExtError {
    /// Positive errno equivalent, for callers on the narrow channel.
    pub fn errno(&self) -> i32 {
        match self {
            ExtError::InvalidConfig(_) => libc::EINVAL,
            ExtError::AlreadyInitialized => libc::EALREADY,
            ExtError::BufferTooSmall => libc::EINVAL,
            ExtError::NoMemory => libc::ENOMEM,
            ExtError::FormatFailed { .. } => libc::ENOMEM,
            ExtError::Transport(fault) => fault.errno(),
        }
    }

    /// True if a retry may succeed and the pending diagnostic was kept.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtError::NoMemory | ExtError::FormatFailed { .. } | ExtError::Transport(_)
        )
    }
}

impl fmt::Display for ExtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtError::InvalidConfig(why) => write!(f, "invalid registry config: {}", why),
            ExtError::AlreadyInitialized => write!(f, "error domain registry already initialized"),
            ExtError::BufferTooSmall => write!(f, "destination buffer has zero capacity"),
            ExtError::NoMemory => write!(f, "out of memory while building diagnostic"),
            ExtError::FormatFailed { domain } => {
                write!(f, "domain \"{}\" failed to format extra fields", domain)
            }
            ExtError::Transport(fault) => write!(f, "transport error: {}", fault),
        }
    }
}

impl std::error::Error for ExtError {}

impl From<Fault> for ExtError {
    fn from(fault: Fault) -> Self {
        ExtError::Transport(fault)
    }
}
