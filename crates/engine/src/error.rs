//! Engine error types.

use thiserror::Error;

/// Fatal configuration errors.
///
/// Each of these indicates a driver bug: the engine was asked to run an
/// operation whose preconditions were never established. Steady-state
/// conditions (quorum not met, bandwidth exhausted, empty candidate pool)
/// are not errors; they drive the publication state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An operation that needs the overlay ran before `build_topology`.
    #[error("no topology has been built")]
    TopologyMissing,

    /// `prepare_request` ran with an empty validator set.
    #[error("no validators selected")]
    NoValidators,

    /// Injection ran with an empty seed set.
    #[error("no seed peers available for injection")]
    NoSeeds,
}
