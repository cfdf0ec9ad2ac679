//! Error types raised while setting up or running a battle.

use thiserror::Error;

/// Errors surfaced by the battle engine and its worker pool.
///
/// Steady-state combat has no error path: a miss is a normal outcome and an
/// empty opposing roster simply ends the attacking task. Everything here is
/// either a setup problem or a resource failure at startup.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Setup parameters were rejected before the engine started.
    #[error("invalid battle setup: {reason}")]
    InvalidSetup {
        /// Human-readable description of the rejected parameter.
        reason: String,
    },

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// Work was submitted after the pool's queue was closed.
    #[error("worker pool has been shut down")]
    PoolShutDown,
}

impl BattleError {
    /// Convenience constructor for [`BattleError::InvalidSetup`].
    pub fn invalid_setup(reason: impl Into<String>) -> Self {
        Self::InvalidSetup {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BattleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_setup_message_includes_reason() {
        let err = BattleError::invalid_setup("marine count must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid battle setup: marine count must be at least 1"
        );
    }

    #[test]
    fn io_errors_convert_to_worker_spawn() {
        let io = std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left");
        let err: BattleError = io.into();
        assert!(matches!(err, BattleError::WorkerSpawn(_)));
    }
}
