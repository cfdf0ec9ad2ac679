//! Combatants and the attack/defend protocol.
//!
//! This module provides the data and behaviour units of a battle:
//! - [`CombatantId`]: stable display identity (`Marine3`, `Bug12`)
//! - [`Faction`]: which side a combatant fights for
//! - [`Combatant`]: health, liveness and kill record of one fighter
//! - [`AttackOutcome`] / [`DamageOutcome`]: what a single attack did
//! - [`CasualtyLedger`]: hook that admits or refuses a killing blow
//!
//! # Synchronisation contract
//!
//! A combatant is shared by every attack task that may target it, so its
//! mutable state is split by who writes it:
//!
//! | Field     | Writers                         | Protection                  |
//! |-----------|---------------------------------|-----------------------------|
//! | `vitals`  | any attacker                    | per-combatant `Mutex`       |
//! | `alive`   | the attacker landing the kill   | `AtomicBool::swap`          |
//! | `hits`    | the combatant's own attack task | relaxed atomic counter      |
//! | `kills`   | the combatant's own attack task | uncontended `Mutex`         |
//!
//! Liveness is monotone: it only ever goes from `true` to `false`, and the
//! single `swap` that performs the transition is what decides which attacker
//! is credited with the kill. Before that swap the victim's faction ledger
//! gets a veto, which is how a battle that has already been decided refuses
//! further deaths.
//!
//! # Example
//!
//! ```
//! use skirmish_core::combatant::{Combatant, CombatantKind, DamageOutcome, Untracked};
//!
//! let bug = Combatant::new(CombatantKind::Bug, 1);
//! assert_eq!(bug.id().as_str(), "Bug1");
//!
//! // The carapace absorbs the first killing blow.
//! assert!(matches!(
//!     bug.take_damage(100, &Untracked),
//!     DamageOutcome::Shielded { health: 50 }
//! ));
//! assert!(bug.is_alive());
//!
//! // The second one sticks.
//! assert_eq!(bug.take_damage(50, &Untracked), DamageOutcome::Slain);
//! assert!(!bug.is_alive());
//! ```

pub mod profile;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

pub use profile::{
    CombatProfile, CombatantKind, CARAPACE_HEAL, CRITICAL_MULTIPLIER, CRITICAL_ROLL, MAX_DAMAGE,
    MAX_ROLL, STARTING_HEALTH, UNHITTABLE_ACCURACY,
};

/// Stable display identity of a combatant.
///
/// Assigned at creation from the variant name and a 1-based roster index,
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(String);

impl CombatantId {
    /// Creates an id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Side of the battle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Side A.
    Marines,
    /// Side B.
    Bugs,
}

impl Faction {
    /// The side this faction fights against.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Marines => Self::Bugs,
            Self::Bugs => Self::Marines,
        }
    }

    /// The combatant variant fielded by this faction.
    #[must_use]
    pub const fn kind(self) -> CombatantKind {
        match self {
            Self::Marines => CombatantKind::Marine,
            Self::Bugs => CombatantKind::Bug,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marines => write!(f, "Marines"),
            Self::Bugs => write!(f, "Bugs"),
        }
    }
}

impl CombatantKind {
    /// The faction that fields this variant.
    #[must_use]
    pub const fn faction(self) -> Faction {
        match self {
            Self::Marine => Faction::Marines,
            Self::Bug => Faction::Bugs,
        }
    }
}

// =============================================================================
// Casualty ledger
// =============================================================================

/// Gatekeeper consulted before a killing blow lands.
///
/// `admit_death` runs while the victim's vitals are locked and before its
/// liveness flag is cleared. Returning false means the battle has already
/// been decided; the blow is then discarded as if it never happened.
pub trait CasualtyLedger {
    /// Records the death of `victim`, or refuses it.
    fn admit_death(&self, victim: &Combatant) -> bool;
}

/// Ledger that admits every death. For use outside a running battle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untracked;

impl CasualtyLedger for Untracked {
    fn admit_death(&self, _victim: &Combatant) -> bool {
        true
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Effect of a single `take_damage` call on the defender.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Health dropped but stayed positive.
    Wounded {
        /// Health after the hit.
        health: i32,
    },
    /// The hit was lethal but the carapace absorbed it.
    Shielded {
        /// Health after the carapace heal.
        health: i32,
    },
    /// This call flipped liveness from alive to dead. Exactly one call per
    /// combatant ever returns this.
    Slain,
    /// The defender was already dead when this damage landed.
    Overkill,
    /// The blow would have killed, but the ledger had already closed the
    /// battle. Health was left untouched.
    Moot,
}

impl DamageOutcome {
    /// True if this damage was the killing blow.
    #[must_use]
    pub const fn is_kill(&self) -> bool {
        matches!(self, Self::Slain)
    }
}

/// Result of one attack attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackOutcome {
    /// The roll did not beat the attacker's accuracy. Nothing changed.
    Miss {
        /// The die roll.
        roll: u8,
    },
    /// The attack landed.
    Hit {
        /// The die roll.
        roll: u8,
        /// Whether the roll was a critical.
        critical: bool,
        /// Damage applied to the defender.
        damage: i32,
        /// What the damage did.
        result: DamageOutcome,
    },
}

impl AttackOutcome {
    /// True if this attack earned the attacker a kill credit.
    #[must_use]
    pub const fn is_kill(&self) -> bool {
        match self {
            Self::Hit { result, .. } => result.is_kill(),
            Self::Miss { .. } => false,
        }
    }

    /// True if the attack landed.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

// =============================================================================
// Combatant
// =============================================================================

#[derive(Debug)]
struct Vitals {
    health: i32,
    carapace: bool,
}

/// One fighter in a roster.
///
/// Combatants are created once at setup, shared between attack tasks behind
/// an `Arc`, and never removed: a dead combatant stays in its roster so its
/// identity and statistics survive the battle.
#[derive(Debug)]
pub struct Combatant {
    id: CombatantId,
    kind: CombatantKind,
    profile: CombatProfile,
    vitals: Mutex<Vitals>,
    alive: AtomicBool,
    hits: AtomicU32,
    kills: Mutex<Vec<CombatantId>>,
    /// Set while an attack task for this combatant is queued or running.
    engaged: AtomicBool,
}

impl Combatant {
    /// Creates a combatant with the variant's default profile.
    ///
    /// `index` is the 1-based roster position used to build the id.
    #[must_use]
    pub fn new(kind: CombatantKind, index: usize) -> Self {
        Self::with_profile(kind, index, kind.default_profile())
    }

    /// Creates a combatant with an explicit profile.
    #[must_use]
    pub fn with_profile(kind: CombatantKind, index: usize, profile: CombatProfile) -> Self {
        Self {
            id: CombatantId::new(format!("{kind}{index}")),
            kind,
            profile,
            vitals: Mutex::new(Vitals {
                health: STARTING_HEALTH,
                carapace: profile.carapace,
            }),
            alive: AtomicBool::new(true),
            hits: AtomicU32::new(0),
            kills: Mutex::new(Vec::new()),
            engaged: AtomicBool::new(false),
        }
    }

    fn vitals(&self) -> MutexGuard<'_, Vitals> {
        self.vitals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kill_list(&self) -> MutexGuard<'_, Vec<CombatantId>> {
        self.kills.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Display identity.
    #[must_use]
    pub fn id(&self) -> &CombatantId {
        &self.id
    }

    /// Variant of this combatant.
    #[must_use]
    pub fn kind(&self) -> CombatantKind {
        self.kind
    }

    /// Side this combatant fights for.
    #[must_use]
    pub fn faction(&self) -> Faction {
        self.kind.faction()
    }

    /// Combat parameters in effect.
    #[must_use]
    pub fn profile(&self) -> &CombatProfile {
        &self.profile
    }

    /// Current health. May be zero or negative once dead.
    #[must_use]
    pub fn health(&self) -> i32 {
        self.vitals().health
    }

    /// Whether the carapace is still unspent.
    #[must_use]
    pub fn has_carapace(&self) -> bool {
        self.vitals().carapace
    }

    /// Whether the combatant can still act and be targeted.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Number of attacks this combatant has landed.
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Ids of the combatants this one was credited with killing, in order.
    #[must_use]
    pub fn kills(&self) -> Vec<CombatantId> {
        self.kill_list().clone()
    }

    /// Number of kill credits.
    #[must_use]
    pub fn kill_count(&self) -> usize {
        self.kill_list().len()
    }

    /// Rolls the die and attacks `target`.
    pub fn attack<R>(
        &self,
        target: &Combatant,
        rng: &mut R,
        ledger: &dyn CasualtyLedger,
    ) -> AttackOutcome
    where
        R: Rng + ?Sized,
    {
        let roll = rng.gen_range(1..=MAX_ROLL);
        self.resolve_roll(target, roll, ledger)
    }

    /// Resolves an attack against `target` for a given die roll.
    ///
    /// A roll above the accuracy threshold hits: the hit counter increments
    /// and damage is applied, doubled through [`slay`](Self::slay) on a
    /// critical roll. If the hit is the killing blow, the victim's id is
    /// appended to this combatant's kill list.
    pub fn resolve_roll(
        &self,
        target: &Combatant,
        roll: u8,
        ledger: &dyn CasualtyLedger,
    ) -> AttackOutcome {
        if !self.profile.hits_on(roll) {
            trace!(attacker = %self.id, target = %target.id, roll, "miss");
            return AttackOutcome::Miss { roll };
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        let critical = roll == CRITICAL_ROLL;
        let (damage, result) = if critical {
            (self.profile.critical_damage(), self.slay(target, ledger))
        } else {
            (self.profile.damage, self.strike(target, ledger))
        };
        trace!(
            attacker = %self.id,
            target = %target.id,
            roll,
            critical,
            damage,
            ?result,
            "hit"
        );

        if result.is_kill() {
            self.kill_list().push(target.id.clone());
        }

        AttackOutcome::Hit {
            roll,
            critical,
            damage,
            result,
        }
    }

    /// Standard hit.
    fn strike(&self, target: &Combatant, ledger: &dyn CasualtyLedger) -> DamageOutcome {
        target.take_damage(self.profile.damage, ledger)
    }

    /// Critical hit, dealing double damage.
    pub fn slay(&self, target: &Combatant, ledger: &dyn CasualtyLedger) -> DamageOutcome {
        target.take_damage(self.profile.critical_damage(), ledger)
    }

    /// Applies `amount` damage to this combatant.
    ///
    /// Safe to call from many threads at once. Health and the carapace are
    /// updated under this combatant's lock, so no damage is lost and the
    /// carapace is spent at most once. A blow that leaves health at or below
    /// zero with no carapace left is offered to `ledger`; if admitted,
    /// liveness is cleared with a single atomic swap and only the caller
    /// that observed it still `true` gets [`DamageOutcome::Slain`].
    pub fn take_damage(&self, amount: i32, ledger: &dyn CasualtyLedger) -> DamageOutcome {
        let mut vitals = self.vitals();
        let health = vitals.health.saturating_sub(amount);

        if health > 0 {
            vitals.health = health;
            return DamageOutcome::Wounded { health };
        }

        if vitals.carapace {
            vitals.carapace = false;
            // A hit deeper than the heal still leaves the combatant standing
            // on its last point.
            vitals.health = health.saturating_add(CARAPACE_HEAL).max(1);
            trace!(combatant = %self.id, health = vitals.health, "carapace absorbed killing blow");
            return DamageOutcome::Shielded {
                health: vitals.health,
            };
        }

        if !self.is_alive() {
            vitals.health = health;
            return DamageOutcome::Overkill;
        }

        if !ledger.admit_death(self) {
            return DamageOutcome::Moot;
        }

        vitals.health = health;
        if self.alive.swap(false, Ordering::AcqRel) {
            DamageOutcome::Slain
        } else {
            DamageOutcome::Overkill
        }
    }

    /// Marks the combatant as having an attack task in flight.
    ///
    /// Returns false if it already had one.
    pub(crate) fn try_engage(&self) -> bool {
        self.engaged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the engaged flag once the attack task has stopped.
    pub(crate) fn disengage(&self) {
        self.engaged.store(false, Ordering::Release);
    }

    /// Whether an attack task for this combatant is queued or running.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }
}
