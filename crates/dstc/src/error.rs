//! Recoverable and connection-local error taxonomy.
//!
//! Fatal conditions (table capacity exhaustion, reactor add/modify/wait
//! failure, transport init failure) never flow through this type: they go
//! through `dstc_utils::fatal!`, which always panics regardless of build
//! profile. This enum is strictly for conditions the caller can observe and
//! recover from.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DstcError {
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("function name [{0}] exceeds the {1}-byte name limit")]
    NameTooLong(String, usize),

    #[error("runtime is already initialized")]
    Busy,
}
