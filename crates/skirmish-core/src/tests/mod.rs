//! Whole-battle tests.
//!
//! - `battle.rs`: full battles through the engine and the aggregator
//! - `concurrency.rs`: racing attackers against shared combatants
//! - `helpers.rs`: configs, profiles and result checks shared by both

mod helpers;

pub use helpers::*;
