//! Post-battle statistics.
//!
//! Once the pool has been joined nothing mutates a combatant again, so the
//! aggregator reads the final rosters without any coordination and folds
//! them into a serialisable [`BattleResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::combatant::{Combatant, CombatantId, Faction};
use crate::engine::{FinishedBattle, Rosters};

/// Final record of one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRecord {
    /// Who.
    pub id: CombatantId,
    /// Whether it survived the battle.
    pub alive: bool,
    /// Attacks that landed.
    pub hits: u32,
    /// Victims in the order they fell.
    pub victims: Vec<CombatantId>,
}

impl KillRecord {
    /// Snapshots a combatant.
    #[must_use]
    pub fn of(combatant: &Combatant) -> Self {
        Self {
            id: combatant.id().clone(),
            alive: combatant.is_alive(),
            hits: combatant.hits(),
            victims: combatant.kills(),
        }
    }

    /// Number of kills credited.
    #[must_use]
    pub fn kill_count(&self) -> usize {
        self.victims.len()
    }
}

/// Totals for one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Side summarised.
    pub faction: Faction,
    /// Combatants still alive.
    pub survivors: usize,
    /// Sum of hits over the roster.
    pub total_hits: u64,
    /// Sum of kills over the roster.
    pub total_kills: usize,
    /// Highest individual kill count, 0 if nobody killed.
    pub top_kill_count: usize,
    /// Everyone tied at `top_kill_count`, including a count of 0.
    pub top_killers: Vec<CombatantId>,
    /// Per-combatant records in roster order.
    pub records: Vec<KillRecord>,
}

impl FactionReport {
    /// Folds a side's records into totals.
    #[must_use]
    pub fn from_records(faction: Faction, records: Vec<KillRecord>) -> Self {
        let survivors = records.iter().filter(|r| r.alive).count();
        let total_hits = records.iter().map(|r| u64::from(r.hits)).sum();
        let total_kills = records.iter().map(KillRecord::kill_count).sum();
        let (top_kill_count, top_killers) = leaders(&records);
        Self {
            faction,
            survivors,
            total_hits,
            total_kills,
            top_kill_count,
            top_killers,
            records,
        }
    }

    /// Snapshots a live roster.
    #[must_use]
    pub fn tally<'a>(faction: Faction, roster: impl IntoIterator<Item = &'a Combatant>) -> Self {
        Self::from_records(faction, roster.into_iter().map(KillRecord::of).collect())
    }
}

fn leaders(records: &[KillRecord]) -> (usize, Vec<CombatantId>) {
    let top = records.iter().map(KillRecord::kill_count).max().unwrap_or(0);
    let ids = records
        .iter()
        .filter(|r| r.kill_count() == top)
        .map(|r| r.id.clone())
        .collect();
    (top, ids)
}

/// Which side landed more hits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyVerdict {
    /// Marines landed more hits.
    MarinesMoreAccurate,
    /// Bugs landed more hits.
    BugsMoreAccurate,
    /// Both sides landed the same number of hits.
    Even,
}

impl AccuracyVerdict {
    /// Compares hit totals.
    #[must_use]
    pub fn from_hits(marine_hits: u64, bug_hits: u64) -> Self {
        match marine_hits.cmp(&bug_hits) {
            std::cmp::Ordering::Greater => Self::MarinesMoreAccurate,
            std::cmp::Ordering::Less => Self::BugsMoreAccurate,
            std::cmp::Ordering::Equal => Self::Even,
        }
    }
}

impl fmt::Display for AccuracyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarinesMoreAccurate => write!(f, "Marines were more accurate than the Bugs"),
            Self::BugsMoreAccurate => write!(f, "Bugs were more accurate than the Marines"),
            Self::Even => write!(f, "Marines and Bugs were equally accurate"),
        }
    }
}

/// Everything reported about a finished battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResult {
    /// The side left standing.
    pub winner: Faction,
    /// Marine totals.
    pub marines: FactionReport,
    /// Bug totals.
    pub bugs: FactionReport,
    /// Hit comparison between the sides.
    pub accuracy: AccuracyVerdict,
    /// Highest kill count across both sides, 0 if nobody killed.
    pub top_kill_count: usize,
    /// Everyone on either side tied at `top_kill_count`, Marines first.
    pub top_killers: Vec<CombatantId>,
}

impl BattleResult {
    /// Builds the result from the two side reports.
    #[must_use]
    pub fn new(winner: Faction, marines: FactionReport, bugs: FactionReport) -> Self {
        let accuracy = AccuracyVerdict::from_hits(marines.total_hits, bugs.total_hits);
        let top_kill_count = marines.top_kill_count.max(bugs.top_kill_count);
        let top_killers = [&marines, &bugs]
            .into_iter()
            .filter(|r| r.top_kill_count == top_kill_count)
            .flat_map(|r| r.top_killers.iter().cloned())
            .collect();
        Self {
            winner,
            marines,
            bugs,
            accuracy,
            top_kill_count,
            top_killers,
        }
    }

    /// Reads the final rosters.
    #[must_use]
    pub fn from_rosters(winner: Faction, rosters: &Rosters) -> Self {
        let tally = |faction: Faction| {
            FactionReport::tally(faction, rosters.get(faction).iter().map(|c| &**c))
        };
        Self::new(winner, tally(Faction::Marines), tally(Faction::Bugs))
    }

    /// Report for one side.
    #[must_use]
    pub fn report(&self, faction: Faction) -> &FactionReport {
        match faction {
            Faction::Marines => &self.marines,
            Faction::Bugs => &self.bugs,
        }
    }
}

impl From<&FinishedBattle> for BattleResult {
    fn from(finished: &FinishedBattle) -> Self {
        Self::from_rosters(finished.winner, &finished.rosters)
    }
}
