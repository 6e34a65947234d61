//! Error taxonomy for the probe core.
//!
//! Errors here never abort sibling branches: every validation or cleanup
//! branch catches its own failure at the branch boundary, records it, and
//! lets the cycle continue. Only admin-connection exhaustion aborts a
//! cycle, and that is expressed as a [`CycleOutcome`] variant rather than
//! an escaping error.
//!
//! [`CycleOutcome`]: crate::probe::cycle::CycleOutcome

use thiserror::Error;

use crate::client::DbError;
use crate::probe::connections::ConnectionScope;

/// Errors from pod listing.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("pod listing failed: {0}")]
    Other(String),
}

/// A failed validation branch.
///
/// Collected into the cycle report; never propagated across branches.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The row count did not match the seeded dataset.
    #[error("row count mismatch on {scope}: expected {expected}, found {found}")]
    RowCountMismatch {
        scope: ConnectionScope,
        expected: i64,
        found: i64,
    },

    /// The branch's connection could not be opened.
    #[error("connection unavailable for {scope}")]
    ConnectionUnavailable { scope: ConnectionScope },

    /// A statement on the branch's connection failed.
    #[error("statement failed on {scope}: {source}")]
    Statement {
        scope: ConnectionScope,
        source: DbError,
    },
}

impl ValidationError {
    /// The connection scope the failure occurred on.
    pub fn scope(&self) -> &ConnectionScope {
        match self {
            ValidationError::RowCountMismatch { scope, .. }
            | ValidationError::ConnectionUnavailable { scope }
            | ValidationError::Statement { scope, .. } => scope,
        }
    }
}
