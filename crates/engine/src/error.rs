//! Engine-level error type.

use zonewatch_core::CoreError;

use crate::aggregate::ZoneFailure;
use crate::traits::TransportError;

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain validation or lookup error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An external call failed and the operation fails fast to the
    /// caller (store mirroring, for example — never the polling
    /// loops, which swallow and continue).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every per-zone analysis request in an aggregate run failed.
    #[error("all {total} zone analyses failed")]
    AllAnalysesFailed {
        total: usize,
        /// Per-zone error messages, attributed to zone ids.
        failures: Vec<ZoneFailure>,
    },
}
