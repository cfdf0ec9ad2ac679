//! Per-variant combat parameters.
//!
//! The two combatant variants differ only in data: how hard they are to
//! miss with, how much they hurt, and whether they carry a one-shot
//! carapace. Those numbers live in a [`CombatProfile`] so tests and config
//! files can override them without a new variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BattleError, Result};

/// Health every combatant starts the battle with.
pub const STARTING_HEALTH: i32 = 100;

/// Highest face of the attack die. Rolls are uniform in `1..=MAX_ROLL`.
pub const MAX_ROLL: u8 = 10;

/// A roll of exactly this value is a critical hit.
pub const CRITICAL_ROLL: u8 = MAX_ROLL;

/// Damage multiplier applied by a critical hit.
pub const CRITICAL_MULTIPLIER: i32 = 2;

/// Health restored when a carapace absorbs a killing blow.
pub const CARAPACE_HEAL: i32 = 50;

/// Accuracy threshold no roll can exceed. Useful for forcing misses.
pub const UNHITTABLE_ACCURACY: u8 = MAX_ROLL + 1;

/// Largest standard-hit damage a profile may carry.
pub const MAX_DAMAGE: i32 = 1_000_000;

/// Combatant variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantKind {
    /// Rifle-armed infantry. Accurate, unarmoured.
    Marine,
    /// Clawed swarm creature. Less accurate, shrugs off one killing blow.
    Bug,
}

impl CombatantKind {
    /// The built-in profile for this variant.
    #[must_use]
    pub const fn default_profile(self) -> CombatProfile {
        match self {
            Self::Marine => CombatProfile {
                accuracy: 7,
                damage: 50,
                carapace: false,
            },
            Self::Bug => CombatProfile {
                accuracy: 8,
                damage: 50,
                carapace: true,
            },
        }
    }
}

impl fmt::Display for CombatantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marine => write!(f, "Marine"),
            Self::Bug => write!(f, "Bug"),
        }
    }
}

/// Attack and defence parameters of a combatant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatProfile {
    /// An attack hits when the roll is strictly greater than this.
    pub accuracy: u8,
    /// Damage of a standard hit. Critical hits deal twice this.
    pub damage: i32,
    /// Whether the combatant starts with a one-shot carapace.
    pub carapace: bool,
}

impl CombatProfile {
    /// Checks that the profile describes a playable combatant.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidSetup`] if the accuracy is above
    /// [`UNHITTABLE_ACCURACY`] or the damage is outside `1..=MAX_DAMAGE`.
    pub fn validate(&self) -> Result<()> {
        if self.accuracy > UNHITTABLE_ACCURACY {
            return Err(BattleError::invalid_setup(format!(
                "accuracy {} is above the maximum of {UNHITTABLE_ACCURACY}",
                self.accuracy
            )));
        }
        if !(1..=MAX_DAMAGE).contains(&self.damage) {
            return Err(BattleError::invalid_setup(format!(
                "damage must be between 1 and {MAX_DAMAGE}, got {}",
                self.damage
            )));
        }
        Ok(())
    }

    /// Returns whether `roll` lands a hit under this profile.
    #[must_use]
    pub const fn hits_on(&self, roll: u8) -> bool {
        roll > self.accuracy
    }

    /// Whether any roll of the die can land a hit.
    #[must_use]
    pub const fn can_hit(&self) -> bool {
        self.accuracy < MAX_ROLL
    }

    /// Damage dealt by a critical hit.
    #[must_use]
    pub const fn critical_damage(&self) -> i32 {
        self.damage.saturating_mul(CRITICAL_MULTIPLIER)
    }
}
