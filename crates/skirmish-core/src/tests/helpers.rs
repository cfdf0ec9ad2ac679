//! Test setup utilities.

use std::collections::HashMap;
use std::time::Duration;

use crate::combatant::{CombatProfile, CombatantId, Faction, UNHITTABLE_ACCURACY};
use crate::config::BattleConfig;
use crate::stats::BattleResult;

// =============================================================================
// Configs
// =============================================================================

/// A seeded config with millisecond pacing so battles finish quickly.
pub fn quick_config(marines: usize, bugs: usize) -> BattleConfig {
    BattleConfig::new(marines, bugs)
        .with_intervals(Duration::from_millis(1), Duration::from_millis(5))
        .with_seed(0x5eed)
}

/// A profile that never lands a hit.
pub fn blind(damage: i32) -> CombatProfile {
    CombatProfile {
        accuracy: UNHITTABLE_ACCURACY,
        damage,
        carapace: false,
    }
}

/// A profile that hits on every roll and kills in one blow.
pub fn executioner() -> CombatProfile {
    CombatProfile {
        accuracy: 0,
        damage: 100,
        carapace: false,
    }
}

// =============================================================================
// Result checks
// =============================================================================

/// Asserts the invariants every finished battle must satisfy:
/// - the loser has no survivors and the winner has at least one
/// - each side's kills equal the other side's deaths
/// - every dead combatant appears in exactly one kill list, and no living
///   one appears in any
pub fn assert_consistent(result: &BattleResult, marines: usize, bugs: usize) {
    let winner = result.report(result.winner);
    let loser = result.report(result.winner.opponent());
    assert_eq!(loser.survivors, 0, "loser still has survivors");
    assert!(winner.survivors > 0, "winner has no survivors");

    assert_eq!(result.marines.records.len(), marines);
    assert_eq!(result.bugs.records.len(), bugs);
    assert_eq!(result.marines.total_kills, bugs - result.bugs.survivors);
    assert_eq!(result.bugs.total_kills, marines - result.marines.survivors);

    let mut credited: HashMap<&CombatantId, usize> = HashMap::new();
    for faction in [Faction::Marines, Faction::Bugs] {
        for record in &result.report(faction).records {
            for victim in &record.victims {
                *credited.entry(victim).or_default() += 1;
            }
        }
    }
    for faction in [Faction::Marines, Faction::Bugs] {
        for record in &result.report(faction).records {
            let times = credited.get(&record.id).copied().unwrap_or(0);
            if record.alive {
                assert_eq!(times, 0, "{} is alive but credited as killed", record.id);
            } else {
                assert_eq!(times, 1, "{} credited {times} times", record.id);
            }
        }
    }
}
