//! # Skirmish Core
//!
//! Concurrent Marines-vs-Bugs battle engine.
//!
//! Every combatant runs its own attack loop as a task on a bounded worker
//! pool. Attacks land on shared combatants from many threads at once, and a
//! kill is credited to exactly one attacker no matter how many blows race
//! for it. The battle stops the moment one side is wiped out.
//!
//! ## Architecture
//!
//! - **Queue / Pool**: [`queue::BlockingQueue`] feeding a [`pool::WorkerPool`]
//! - **Combatants**: shared fighters with locked vitals and an atomic liveness flag
//! - **State**: packed remaining counts plus the GameOver flag
//! - **Engine**: sweeps that schedule attack tasks until the battle is decided
//! - **Stats**: hit, kill and top-killer totals for the final report
//!
//! ## Usage
//!
//! ```
//! use std::time::Duration;
//! use skirmish_core::{run_battle_with, BattleConfig};
//!
//! let config = BattleConfig::new(3, 3)
//!     .with_pool_size(2)
//!     .with_intervals(Duration::from_millis(1), Duration::from_millis(2));
//! let result = run_battle_with(&config).unwrap();
//! assert_eq!(result.report(result.winner.opponent()).survivors, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod combatant;
pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod queue;
pub mod state;
pub mod stats;

#[cfg(test)]
mod tests;

pub use combatant::{Combatant, CombatantId, CombatantKind, Faction};
pub use config::BattleConfig;
pub use engine::{BattleEngine, FinishedBattle, Rosters};
pub use error::{BattleError, Result};
pub use stats::{AccuracyVerdict, BattleResult, FactionReport, KillRecord};

/// Runs a battle with default pacing and profiles on `pool_size` workers.
///
/// Use [`pool::recommended_pool_size`] to size the pool from the host.
///
/// # Errors
///
/// Returns [`BattleError::InvalidSetup`] if either side is empty or
/// `pool_size` is zero, and [`BattleError::WorkerSpawn`] if the pool cannot
/// start.
pub fn run_battle(marines: usize, bugs: usize, pool_size: usize) -> Result<BattleResult> {
    run_battle_with(&BattleConfig::new(marines, bugs).with_pool_size(pool_size))
}

/// Runs a fully configured battle and aggregates its statistics.
///
/// # Errors
///
/// See [`BattleEngine::new`] and [`BattleEngine::run`].
pub fn run_battle_with(config: &BattleConfig) -> Result<BattleResult> {
    let finished = BattleEngine::new(config)?.run()?;
    Ok(BattleResult::from(&finished))
}
