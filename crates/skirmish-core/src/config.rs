//! Battle setup parameters.
//!
//! [`BattleConfig`] gathers everything the engine needs before it starts:
//! troop counts, the worker budget, pacing, and the per-variant combat
//! profiles. It is `serde`-friendly with per-field defaults, so a partial
//! TOML or JSON document fills in the rest.
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::BattleConfig;
//!
//! let config = BattleConfig::new(5, 8).with_pool_size(2);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.resolved_pool_size(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::combatant::{CombatProfile, CombatantKind, Faction};
use crate::error::{BattleError, Result};
use crate::pool::recommended_pool_size;
use crate::state::MAX_TROOPS;

/// Default pause between two attacks of the same combatant.
pub const DEFAULT_ATTACK_INTERVAL_MS: u64 = 100;

/// Default pause between two scheduling sweeps of the engine.
pub const DEFAULT_COORDINATION_INTERVAL_MS: u64 = 500;

/// Default number of attacks a task makes before yielding its worker.
pub const DEFAULT_ATTACKS_PER_SLICE: u32 = 8;

/// Complete description of a battle to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Size of the Marine roster.
    pub marines: usize,
    /// Size of the Bug roster.
    pub bugs: usize,
    /// Worker thread count. `None` derives it from the host with
    /// [`recommended_pool_size`].
    pub pool_size: Option<usize>,
    /// Pause between two attacks of the same combatant, in milliseconds.
    pub attack_interval_ms: u64,
    /// Pause between two scheduling sweeps, in milliseconds.
    pub coordination_interval_ms: u64,
    /// Attacks an attack task makes before re-queueing itself so waiting
    /// combatants get a worker.
    pub attacks_per_slice: u32,
    /// Profile used for every Marine.
    pub marine_profile: CombatProfile,
    /// Profile used for every Bug.
    pub bug_profile: CombatProfile,
    /// Seed for the per-combatant dice streams. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            marines: 10,
            bugs: 10,
            pool_size: None,
            attack_interval_ms: DEFAULT_ATTACK_INTERVAL_MS,
            coordination_interval_ms: DEFAULT_COORDINATION_INTERVAL_MS,
            attacks_per_slice: DEFAULT_ATTACKS_PER_SLICE,
            marine_profile: CombatantKind::Marine.default_profile(),
            bug_profile: CombatantKind::Bug.default_profile(),
            seed: None,
        }
    }
}

impl BattleConfig {
    /// Creates a config with the given troop counts and default everything
    /// else.
    #[must_use]
    pub fn new(marines: usize, bugs: usize) -> Self {
        Self {
            marines,
            bugs,
            ..Self::default()
        }
    }

    /// Sets an explicit worker count.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Sets both pacing intervals.
    #[must_use]
    pub fn with_intervals(mut self, attack: Duration, coordination: Duration) -> Self {
        self.attack_interval_ms = u64::try_from(attack.as_millis()).unwrap_or(u64::MAX);
        self.coordination_interval_ms =
            u64::try_from(coordination.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Fixes the dice seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Overrides the profile for one faction.
    #[must_use]
    pub fn with_profile(mut self, faction: Faction, profile: CombatProfile) -> Self {
        match faction {
            Faction::Marines => self.marine_profile = profile,
            Faction::Bugs => self.bug_profile = profile,
        }
        self
    }

    /// Profile in effect for `faction`.
    #[must_use]
    pub fn profile_for(&self, faction: Faction) -> CombatProfile {
        match faction {
            Faction::Marines => self.marine_profile,
            Faction::Bugs => self.bug_profile,
        }
    }

    /// Roster size for `faction`.
    #[must_use]
    pub fn troops(&self, faction: Faction) -> usize {
        match faction {
            Faction::Marines => self.marines,
            Faction::Bugs => self.bugs,
        }
    }

    /// Combined size of both rosters.
    #[must_use]
    pub fn total_combatants(&self) -> usize {
        self.marines.saturating_add(self.bugs)
    }

    /// Worker count to use: the explicit one, or the host-derived default.
    #[must_use]
    pub fn resolved_pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(|| recommended_pool_size(self.total_combatants()))
    }

    /// Pause between two attacks of the same combatant.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        Duration::from_millis(self.attack_interval_ms)
    }

    /// Pause between two scheduling sweeps.
    #[must_use]
    pub fn coordination_interval(&self) -> Duration {
        Duration::from_millis(self.coordination_interval_ms)
    }

    /// Rejects setups the engine cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidSetup`] for an empty roster, a troop
    /// count above [`MAX_TROOPS`], an invalid profile, two factions that can never hit, a zero pool size or a zero
    /// slice length.
    pub fn validate(&self) -> Result<()> {
        for faction in [Faction::Marines, Faction::Bugs] {
            let count = self.troops(faction);
            if count == 0 || count > MAX_TROOPS {
                return Err(BattleError::invalid_setup(format!(
                    "{faction} troop count must be between 1 and {MAX_TROOPS}, got {count}"
                )));
            }
            self.profile_for(faction).validate().map_err(|err| match err {
                BattleError::InvalidSetup { reason } => {
                    BattleError::invalid_setup(format!("{faction} profile: {reason}"))
                }
                other => other,
            })?;
        }
        if !self.marine_profile.can_hit() && !self.bug_profile.can_hit() {
            return Err(BattleError::invalid_setup(
                "neither faction can land a hit; the battle would never end",
            ));
        }
        if self.pool_size == Some(0) {
            return Err(BattleError::invalid_setup(
                "worker pool needs at least one thread",
            ));
        }
        if self.attacks_per_slice == 0 {
            return Err(BattleError::invalid_setup(
                "attacks_per_slice must be at least 1",
            ));
        }
        Ok(())
    }
}
