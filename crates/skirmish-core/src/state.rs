//! Shared battle state: remaining counts and the GameOver flag.
//!
//! Both remaining counts and the GameOver bit live in one `AtomicU64`, so a
//! casualty is recorded with a single compare-and-swap:
//!
//! ```text
//!  bit 63   bit 62   bits 61..31          bits 30..0
//! [ over ][ unused ][ marines remaining ][ bugs remaining ]
//! ```
//!
//! Packing them together is what rules out a double wipe-out. Once one
//! side's count reaches zero the `over` bit is set in the same CAS, and every
//! later death is refused, so the last Marine and the last Bug can never
//! both fall.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::combatant::{CasualtyLedger, Combatant, Faction};
use crate::error::{BattleError, Result};

const COUNT_BITS: u32 = 31;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;
const OVER_BIT: u64 = 1 << 63;

/// Largest roster the packed counters can hold.
pub const MAX_TROOPS: usize = (1 << COUNT_BITS) - 1;

/// Engine lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattlePhase {
    /// Both sides still have living combatants.
    Running,
    /// One side has been wiped out. Terminal.
    GameOver,
}

fn pack(marines: u64, bugs: u64, over: bool) -> u64 {
    let over = if over { OVER_BIT } else { 0 };
    over | (marines << COUNT_BITS) | bugs
}

fn unpack(word: u64) -> (u64, u64, bool) {
    (
        (word >> COUNT_BITS) & COUNT_MASK,
        word & COUNT_MASK,
        word & OVER_BIT != 0,
    )
}

/// Remaining-count accounting and the cancellation token shared by every
/// attack task.
pub struct BattleState {
    word: AtomicU64,
}

impl BattleState {
    /// Creates a running battle with the given roster sizes.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidSetup`] if either count is zero or above
    /// [`MAX_TROOPS`].
    pub fn new(marines: usize, bugs: usize) -> Result<Self> {
        for (faction, count) in [(Faction::Marines, marines), (Faction::Bugs, bugs)] {
            if count == 0 || count > MAX_TROOPS {
                return Err(BattleError::invalid_setup(format!(
                    "{faction} troop count must be between 1 and {MAX_TROOPS}, got {count}"
                )));
            }
        }
        Ok(Self {
            word: AtomicU64::new(pack(marines as u64, bugs as u64, false)),
        })
    }

    fn snapshot(&self) -> (u64, u64, bool) {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Whether GameOver has been signalled.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.word.load(Ordering::Acquire) & OVER_BIT != 0
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> BattlePhase {
        if self.is_over() {
            BattlePhase::GameOver
        } else {
            BattlePhase::Running
        }
    }

    /// Living combatants left on `faction`, as counted by recorded deaths.
    #[must_use]
    pub fn remaining(&self, faction: Faction) -> usize {
        let (marines, bugs, _) = self.snapshot();
        let count = match faction {
            Faction::Marines => marines,
            Faction::Bugs => bugs,
        };
        // Counts are bounded by MAX_TROOPS.
        usize::try_from(count).unwrap_or(MAX_TROOPS)
    }

    /// The side still standing, once the battle is over.
    #[must_use]
    pub fn winner(&self) -> Option<Faction> {
        let (marines, bugs, over) = self.snapshot();
        match (over, marines, bugs) {
            (false, _, _) => None,
            (true, _, 0) => Some(Faction::Marines),
            (true, 0, _) => Some(Faction::Bugs),
            (true, _, _) => None,
        }
    }

    /// Records one death on `faction`.
    ///
    /// Returns the faction's remaining count, or `None` if the battle was
    /// already over and the death is refused. The decrement that takes a
    /// count to zero also raises GameOver.
    pub fn record_casualty(&self, faction: Faction) -> Option<usize> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let (marines, bugs, over) = unpack(current);
            if over {
                return None;
            }
            let (marines, bugs) = match faction {
                Faction::Marines => (marines.checked_sub(1)?, bugs),
                Faction::Bugs => (marines, bugs.checked_sub(1)?),
            };
            let ends = marines == 0 || bugs == 0;
            let next = pack(marines, bugs, ends);
            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let left = match faction {
                        Faction::Marines => marines,
                        Faction::Bugs => bugs,
                    };
                    if ends {
                        info!(fallen = %faction, "game over");
                    }
                    return Some(usize::try_from(left).unwrap_or(MAX_TROOPS));
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl CasualtyLedger for BattleState {
    fn admit_death(&self, victim: &Combatant) -> bool {
        self.record_casualty(victim.faction()).is_some()
    }
}

impl fmt::Debug for BattleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (marines, bugs, over) = self.snapshot();
        f.debug_struct("BattleState")
            .field("marines_remaining", &marines)
            .field("bugs_remaining", &bugs)
            .field("game_over", &over)
            .finish()
    }
}
