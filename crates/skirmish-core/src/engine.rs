//! Battle engine: the coordination loop and the per-combatant attack task.
//!
//! The engine drives a battle through repeated *sweeps*:
//!
//! 1. **SWEEP**: every living combatant without an attack task in flight gets
//!    one, submitted to the worker pool
//! 2. **PAUSE**: the coordinator sleeps for the coordination interval
//! 3. **CHECK**: if GameOver was raised, stop sweeping; otherwise repeat
//!
//! Each [`AttackTask`] rolls against a randomly chosen living enemy, sleeps
//! the attack interval, and after a fixed number of attacks re-queues itself
//! so that combatants waiting for a worker get their turn even when the pool
//! is much smaller than the rosters.
//!
//! # Cancellation
//!
//! The shared [`BattleState`] is both the casualty ledger and the
//! cancellation token. Tasks check it before every attack and exit as soon
//! as the battle is decided. The pool is shut down (drained and joined)
//! before [`BattleEngine::run`] returns, so no task outlives the battle.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use skirmish_core::config::BattleConfig;
//! use skirmish_core::engine::BattleEngine;
//!
//! let config = BattleConfig::new(2, 2)
//!     .with_pool_size(2)
//!     .with_intervals(Duration::from_millis(1), Duration::from_millis(2))
//!     .with_seed(7);
//! let finished = BattleEngine::new(&config).unwrap().run().unwrap();
//! assert_eq!(finished.rosters.living(finished.winner.opponent()), 0);
//! assert!(finished.rosters.living(finished.winner) > 0);
//! ```

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::combatant::{Combatant, Faction};
use crate::config::BattleConfig;
use crate::error::{BattleError, Result};
use crate::pool::{PoolHandle, WorkerPool};
use crate::state::BattleState;

/// One side's combatants, shared read-only between tasks.
pub type Roster = Arc<[Arc<Combatant>]>;

// =============================================================================
// Rosters
// =============================================================================

/// Both sides of a battle.
#[derive(Debug, Clone)]
pub struct Rosters {
    marines: Roster,
    bugs: Roster,
}

impl Rosters {
    /// Wraps pre-built combatants.
    ///
    /// Useful for battles with hand-tuned individuals. The engine checks the
    /// factions line up when the rosters are handed to it.
    #[must_use]
    pub fn new(marines: Vec<Combatant>, bugs: Vec<Combatant>) -> Self {
        Self {
            marines: marines.into_iter().map(Arc::new).collect(),
            bugs: bugs.into_iter().map(Arc::new).collect(),
        }
    }

    /// Builds both rosters from a config: ids are 1-based (`Marine1`,
    /// `Bug1`, ...) and every combatant gets its faction's profile.
    #[must_use]
    pub fn from_config(config: &BattleConfig) -> Self {
        let build = |faction: Faction| -> Roster {
            let kind = faction.kind();
            let profile = config.profile_for(faction);
            (1..=config.troops(faction))
                .map(|index| Arc::new(Combatant::with_profile(kind, index, profile)))
                .collect()
        };
        Self {
            marines: build(Faction::Marines),
            bugs: build(Faction::Bugs),
        }
    }

    /// Every combatant of `faction`, dead or alive, in roster order.
    #[must_use]
    pub fn get(&self, faction: Faction) -> &[Arc<Combatant>] {
        self.roster(faction)
    }

    /// Roster size of `faction`.
    #[must_use]
    pub fn len(&self, faction: Faction) -> usize {
        self.roster(faction).len()
    }

    /// Whether both rosters are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marines.is_empty() && self.bugs.is_empty()
    }

    /// Living combatants of `faction`, by their own liveness flag.
    #[must_use]
    pub fn living(&self, faction: Faction) -> usize {
        self.roster(faction).iter().filter(|c| c.is_alive()).count()
    }

    fn roster(&self, faction: Faction) -> &Roster {
        match faction {
            Faction::Marines => &self.marines,
            Faction::Bugs => &self.bugs,
        }
    }

    fn check(&self) -> Result<()> {
        for faction in [Faction::Marines, Faction::Bugs] {
            for combatant in self.get(faction) {
                if combatant.faction() != faction {
                    return Err(BattleError::invalid_setup(format!(
                        "{} cannot serve in the {faction} roster",
                        combatant.id()
                    )));
                }
                combatant.profile().validate().map_err(|err| match err {
                    BattleError::InvalidSetup { reason } => {
                        BattleError::invalid_setup(format!("{}: {reason}", combatant.id()))
                    }
                    other => other,
                })?;
            }
        }

        // The battle can only stall once every survivor is blind. That state
        // is reachable when both sides field a blind combatant and either
        // both or neither side fields a hitter.
        let marines = Armament::of(self.get(Faction::Marines));
        let bugs = Armament::of(self.get(Faction::Bugs));
        if marines.blind && bugs.blind && marines.hitter == bugs.hitter {
            return Err(BattleError::invalid_setup(
                "both rosters field combatants that can never hit; \
                 the battle could stall with only them left",
            ));
        }
        Ok(())
    }
}

/// Whether a roster holds combatants that can hit, and ones that cannot.
struct Armament {
    hitter: bool,
    blind: bool,
}

impl Armament {
    fn of(roster: &[Arc<Combatant>]) -> Self {
        Self {
            hitter: roster.iter().any(|c| c.profile().can_hit()),
            blind: roster.iter().any(|c| !c.profile().can_hit()),
        }
    }
}

// =============================================================================
// Pacing
// =============================================================================

#[derive(Debug, Copy, Clone)]
struct Pacing {
    attack_interval: Duration,
    coordination_interval: Duration,
    attacks_per_slice: u32,
}

impl From<&BattleConfig> for Pacing {
    fn from(config: &BattleConfig) -> Self {
        Self {
            attack_interval: config.attack_interval(),
            coordination_interval: config.coordination_interval(),
            attacks_per_slice: config.attacks_per_slice,
        }
    }
}

// =============================================================================
// BattleEngine
// =============================================================================

/// A battle ready to run: rosters, shared state and a worker pool.
pub struct BattleEngine {
    rosters: Rosters,
    state: Arc<BattleState>,
    pool: WorkerPool,
    pacing: Pacing,
    seed: Option<u64>,
    sweeps: u64,
}

/// What [`BattleEngine::run`] leaves behind.
#[derive(Debug)]
pub struct FinishedBattle {
    /// The side with survivors.
    pub winner: Faction,
    /// Both rosters in their final state.
    pub rosters: Rosters,
    /// Coordination sweeps performed.
    pub sweeps: u64,
    /// Attack-task slices the pool ran.
    pub tasks_run: u64,
    /// Wall-clock duration of the battle.
    pub elapsed: Duration,
}

impl BattleEngine {
    /// Validates `config`, builds both rosters and starts the worker pool.
    ///
    /// # Errors
    ///
    /// - [`BattleError::InvalidSetup`] if the config is rejected.
    /// - [`BattleError::WorkerSpawn`] if a worker thread cannot start.
    pub fn new(config: &BattleConfig) -> Result<Self> {
        config.validate()?;
        Self::with_rosters(Rosters::from_config(config), config)
    }

    /// Starts a battle between pre-built rosters.
    ///
    /// Troop counts and profiles in `config` are ignored in favour of the
    /// rosters themselves; pacing, pool size and seed still apply.
    ///
    /// # Errors
    ///
    /// - [`BattleError::InvalidSetup`] if a roster is empty, holds a
    ///   combatant of the wrong faction or with an invalid profile, or the
    ///   pacing is invalid. Rosters are also rejected when the battle could
    ///   end up with only combatants that can never hit: that happens when
    ///   both sides field one and either both or neither side fields a
    ///   combatant that can hit.
    /// - [`BattleError::WorkerSpawn`] if a worker thread cannot start.
    pub fn with_rosters(rosters: Rosters, config: &BattleConfig) -> Result<Self> {
        let sized = BattleConfig {
            marines: rosters.len(Faction::Marines),
            bugs: rosters.len(Faction::Bugs),
            ..config.clone()
        };
        sized.validate()?;
        rosters.check()?;

        let state = BattleState::new(sized.marines, sized.bugs)?;
        let pool = WorkerPool::new(sized.resolved_pool_size())?;

        Ok(Self {
            rosters,
            state: Arc::new(state),
            pool,
            pacing: Pacing::from(&sized),
            seed: sized.seed,
            sweeps: 0,
        })
    }

    /// Shared state, for observing a battle from outside.
    #[must_use]
    pub fn state(&self) -> Arc<BattleState> {
        Arc::clone(&self.state)
    }

    /// The rosters taking part.
    #[must_use]
    pub fn rosters(&self) -> &Rosters {
        &self.rosters
    }

    /// Worker threads backing this battle.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Runs the battle to completion.
    ///
    /// Blocks the calling thread, which acts as the coordinator. Returns once
    /// GameOver has been raised and every worker has been joined.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::PoolShutDown`] if the pool stops accepting work
    /// mid-battle.
    pub fn run(mut self) -> Result<FinishedBattle> {
        let started = Instant::now();
        info!(
            marines = self.rosters.len(Faction::Marines),
            bugs = self.rosters.len(Faction::Bugs),
            workers = self.pool.size(),
            "battle started"
        );

        while !self.state.is_over() {
            self.sweep()?;
            thread::sleep(self.pacing.coordination_interval);
        }

        let Self {
            rosters,
            state,
            pool,
            sweeps,
            ..
        } = self;
        let tasks_run = pool.shutdown();

        let winner = if state.remaining(Faction::Bugs) == 0 {
            Faction::Marines
        } else {
            Faction::Bugs
        };
        let elapsed = started.elapsed();
        info!(
            %winner,
            survivors = state.remaining(winner),
            sweeps,
            tasks_run,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "battle finished"
        );

        Ok(FinishedBattle {
            winner,
            rosters,
            sweeps,
            tasks_run,
            elapsed,
        })
    }

    /// Gives every idle living combatant an attack task.
    fn sweep(&mut self) -> Result<usize> {
        self.sweeps += 1;
        let mut scheduled = 0;
        for faction in [Faction::Marines, Faction::Bugs] {
            for (index, combatant) in self.rosters.get(faction).iter().enumerate() {
                if self.state.is_over() {
                    return Ok(scheduled);
                }
                if !combatant.is_alive() || !combatant.try_engage() {
                    continue;
                }
                let task = AttackTask {
                    attacker: Arc::clone(combatant),
                    enemies: Arc::clone(self.rosters.roster(faction.opponent())),
                    state: Arc::clone(&self.state),
                    pool: self.pool.handle(),
                    rng: self.dice(faction, index),
                    pacing: self.pacing,
                };
                if let Err(err) = self.pool.submit(move || task.run()) {
                    warn!(combatant = %combatant.id(), %err, "could not schedule attack task");
                    return Err(err);
                }
                scheduled += 1;
            }
        }
        debug!(sweep = self.sweeps, scheduled, "sweep complete");
        Ok(scheduled)
    }

    /// Dice stream for one combatant's task in the current sweep.
    ///
    /// With a seed, every (sweep, faction, index) triple gets its own
    /// ChaCha stream; without one, tasks draw from entropy.
    fn dice(&self, faction: Faction, index: usize) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(self.sweeps));
                let side: u64 = match faction {
                    Faction::Marines => 0,
                    Faction::Bugs => 1,
                };
                rng.set_stream((side << 32) | index as u64);
                rng
            }
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

impl fmt::Debug for BattleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BattleEngine")
            .field("marines", &self.rosters.len(Faction::Marines))
            .field("bugs", &self.rosters.len(Faction::Bugs))
            .field("state", &self.state)
            .field("pool", &self.pool)
            .field("sweeps", &self.sweeps)
            .finish()
    }
}

// =============================================================================
// AttackTask
// =============================================================================

/// The attack loop of one combatant, run on a pool worker.
///
/// The attacker's engaged flag is held from submission until the task is
/// dropped, so at most one task per combatant exists at any time. Dropping
/// covers every way a task can stop: finishing, failing to requeue, being
/// discarded by a closed queue, or unwinding out of a panic.
struct AttackTask {
    attacker: Arc<Combatant>,
    enemies: Roster,
    state: Arc<BattleState>,
    pool: PoolHandle,
    rng: ChaCha8Rng,
    pacing: Pacing,
}

impl AttackTask {
    fn run(mut self) {
        for _ in 0..self.pacing.attacks_per_slice {
            if !self.ready() {
                return;
            }
            let Some(target) = self.pick_target() else {
                debug!(attacker = %self.attacker.id(), "no living targets left");
                return;
            };

            let outcome = self.attacker.attack(&target, &mut self.rng, &*self.state);
            if outcome.is_kill() {
                info!(
                    attacker = %self.attacker.id(),
                    victim = %target.id(),
                    remaining = self.state.remaining(target.faction()),
                    "kill"
                );
            }
            thread::sleep(self.pacing.attack_interval);
        }
        self.requeue();
    }

    fn ready(&self) -> bool {
        !self.state.is_over() && self.attacker.is_alive()
    }

    fn pick_target(&mut self) -> Option<Arc<Combatant>> {
        let living: Vec<&Arc<Combatant>> =
            self.enemies.iter().filter(|c| c.is_alive()).collect();
        living.choose(&mut self.rng).map(|&c| Arc::clone(c))
    }

    /// Hands the worker back and continues from the end of the queue.
    fn requeue(self) {
        if !self.ready() {
            return;
        }
        let attacker = Arc::clone(&self.attacker);
        let pool = self.pool.clone();
        if let Err(err) = pool.submit(move || self.run()) {
            debug!(attacker = %attacker.id(), %err, "attack task not requeued");
        }
    }
}

impl Drop for AttackTask {
    fn drop(&mut self) {
        self.attacker.disengage();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{CombatProfile, CombatantKind, UNHITTABLE_ACCURACY};

    fn fast(marines: usize, bugs: usize) -> BattleConfig {
        BattleConfig::new(marines, bugs)
            .with_intervals(Duration::from_millis(1), Duration::from_millis(2))
            .with_seed(99)
    }

    mod roster_tests {
        use super::*;

        #[test]
        fn ids_are_one_based() {
            let rosters = Rosters::from_config(&fast(2, 3));
            let ids: Vec<_> = rosters
                .get(Faction::Bugs)
                .iter()
                .map(|c| c.id().to_string())
                .collect();
            assert_eq!(ids, ["Bug1", "Bug2", "Bug3"]);
            assert_eq!(rosters.get(Faction::Marines)[0].id().as_str(), "Marine1");
        }

        #[test]
        fn profiles_come_from_config() {
            let sharp = CombatProfile {
                accuracy: 2,
                damage: 30,
                carapace: false,
            };
            let config = fast(1, 1).with_profile(Faction::Marines, sharp);
            let rosters = Rosters::from_config(&config);
            assert_eq!(*rosters.get(Faction::Marines)[0].profile(), sharp);
        }

        #[test]
        fn wrong_faction_rejected() {
            let rosters = Rosters::new(
                vec![Combatant::new(CombatantKind::Bug, 1)],
                vec![Combatant::new(CombatantKind::Bug, 2)],
            );
            let err = BattleEngine::with_rosters(rosters, &fast(1, 1)).unwrap_err();
            assert!(err.to_string().contains("Bug1"));
        }

        #[test]
        fn empty_roster_rejected() {
            let rosters = Rosters::new(vec![Combatant::new(CombatantKind::Marine, 1)], vec![]);
            assert!(BattleEngine::with_rosters(rosters, &fast(1, 1)).is_err());
        }

        #[test]
        fn harmless_rosters_rejected() {
            let blind = CombatProfile {
                accuracy: UNHITTABLE_ACCURACY,
                damage: 10,
                carapace: false,
            };
            let rosters = Rosters::new(
                vec![Combatant::with_profile(CombatantKind::Marine, 1, blind)],
                vec![Combatant::with_profile(CombatantKind::Bug, 1, blind)],
            );
            assert!(BattleEngine::with_rosters(rosters, &fast(1, 1)).is_err());
        }

        fn blind() -> CombatProfile {
            CombatProfile {
                accuracy: UNHITTABLE_ACCURACY,
                damage: 10,
                carapace: false,
            }
        }

        #[test]
        fn mixed_rosters_that_could_stall_rejected() {
            let rosters = Rosters::new(
                vec![
                    Combatant::new(CombatantKind::Marine, 1),
                    Combatant::with_profile(CombatantKind::Marine, 2, blind()),
                ],
                vec![
                    Combatant::new(CombatantKind::Bug, 1),
                    Combatant::with_profile(CombatantKind::Bug, 2, blind()),
                ],
            );
            let err = BattleEngine::with_rosters(rosters, &fast(1, 1)).unwrap_err();
            assert!(matches!(err, BattleError::InvalidSetup { .. }));
            assert!(err.to_string().contains("stall"));
        }

        #[test]
        fn blind_side_against_mixed_side_fights_to_the_end() {
            let rosters = Rosters::new(
                vec![
                    Combatant::new(CombatantKind::Marine, 1),
                    Combatant::with_profile(CombatantKind::Marine, 2, blind()),
                ],
                vec![
                    Combatant::with_profile(CombatantKind::Bug, 1, blind()),
                    Combatant::with_profile(CombatantKind::Bug, 2, blind()),
                ],
            );
            let finished = BattleEngine::with_rosters(rosters, &fast(1, 1).with_pool_size(2))
                .unwrap()
                .run()
                .unwrap();
            assert_eq!(finished.winner, Faction::Marines);
            assert_eq!(finished.rosters.living(Faction::Marines), 2);
        }

        #[test]
        fn roster_profiles_are_validated() {
            let overpowered = CombatProfile {
                accuracy: 9,
                damage: i32::MAX,
                carapace: false,
            };
            let rosters = Rosters::new(
                vec![Combatant::with_profile(CombatantKind::Marine, 1, overpowered)],
                vec![Combatant::new(CombatantKind::Bug, 1)],
            );
            let err = BattleEngine::with_rosters(rosters, &fast(1, 1)).unwrap_err();
            assert!(err.to_string().contains("Marine1"));
        }
    }

    mod task_tests {
        use super::*;
        use std::panic::{self, AssertUnwindSafe};

        fn task_for_first_marine(engine: &BattleEngine) -> AttackTask {
            AttackTask {
                attacker: Arc::clone(&engine.rosters.get(Faction::Marines)[0]),
                enemies: Arc::clone(engine.rosters.roster(Faction::Bugs)),
                state: engine.state(),
                pool: engine.pool.handle(),
                rng: engine.dice(Faction::Marines, 0),
                pacing: engine.pacing,
            }
        }

        #[test]
        fn panicking_task_releases_its_attacker() {
            let engine = BattleEngine::new(&fast(1, 1).with_pool_size(1)).unwrap();
            let attacker = Arc::clone(&engine.rosters.get(Faction::Marines)[0]);
            assert!(attacker.try_engage());
            let task = task_for_first_marine(&engine);

            let unwound = panic::catch_unwind(AssertUnwindSafe(move || {
                let _task = task;
                panic!("attack task blew up");
            }));
            assert!(unwound.is_err());
            assert!(!attacker.is_engaged());
            assert!(attacker.try_engage());
        }

        #[test]
        fn requeue_into_closed_pool_releases_its_attacker() {
            let engine = BattleEngine::new(&fast(1, 1).with_pool_size(1)).unwrap();
            let attacker = Arc::clone(&engine.rosters.get(Faction::Marines)[0]);
            assert!(attacker.try_engage());
            let task = task_for_first_marine(&engine);

            let BattleEngine { pool, .. } = engine;
            pool.shutdown();
            task.requeue();
            assert!(!attacker.is_engaged());
        }
    }

    mod run_tests {
        use super::*;

        #[test]
        fn one_side_is_wiped_out() {
            let finished = BattleEngine::new(&fast(3, 3).with_pool_size(2))
                .unwrap()
                .run()
                .unwrap();
            assert_eq!(finished.rosters.living(finished.winner.opponent()), 0);
            assert!(finished.rosters.living(finished.winner) > 0);
            assert!(finished.sweeps >= 1);
        }

        #[test]
        fn no_task_still_engaged_after_run() {
            let finished = BattleEngine::new(&fast(4, 4).with_pool_size(1))
                .unwrap()
                .run()
                .unwrap();
            for faction in [Faction::Marines, Faction::Bugs] {
                assert!(finished
                    .rosters
                    .get(faction)
                    .iter()
                    .all(|c| !c.is_engaged()));
            }
        }

        #[test]
        fn one_sided_accuracy_decides_the_winner() {
            let blind = CombatProfile {
                accuracy: UNHITTABLE_ACCURACY,
                ..CombatantKind::Bug.default_profile()
            };
            let config = fast(2, 3).with_profile(Faction::Bugs, blind);
            let finished = BattleEngine::new(&config).unwrap().run().unwrap();
            assert_eq!(finished.winner, Faction::Marines);
            assert_eq!(finished.rosters.living(Faction::Marines), 2);
        }

        #[test]
        fn state_counts_match_liveness() {
            let engine = BattleEngine::new(&fast(5, 4).with_pool_size(3)).unwrap();
            let state = engine.state();
            let finished = engine.run().unwrap();
            for faction in [Faction::Marines, Faction::Bugs] {
                assert_eq!(state.remaining(faction), finished.rosters.living(faction));
            }
            assert_eq!(state.winner(), Some(finished.winner));
        }
    }

    mod dice_tests {
        use super::*;
        use rand::Rng;

        #[test]
        fn seeded_streams_differ_per_combatant() {
            let engine = BattleEngine::new(&fast(2, 2).with_pool_size(1)).unwrap();
            let mut a = engine.dice(Faction::Marines, 0);
            let mut b = engine.dice(Faction::Marines, 1);
            let mut c = engine.dice(Faction::Bugs, 0);
            let draw = |rng: &mut ChaCha8Rng| -> Vec<u32> { (0..8).map(|_| rng.gen()).collect() };
            let (a, b, c) = (draw(&mut a), draw(&mut b), draw(&mut c));
            assert_ne!(a, b);
            assert_ne!(a, c);
        }

        #[test]
        fn seeded_streams_are_reproducible() {
            let first = BattleEngine::new(&fast(1, 1).with_pool_size(1)).unwrap();
            let second = BattleEngine::new(&fast(1, 1).with_pool_size(1)).unwrap();
            let mut x = first.dice(Faction::Bugs, 0);
            let mut y = second.dice(Faction::Bugs, 0);
            assert_eq!(x.gen::<u64>(), y.gen::<u64>());
        }
    }
}
