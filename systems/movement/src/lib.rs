#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic movement system that steers wandering enemies and pursuing
//! friendlies.
//!
//! Enemies wander between random targets. Friendlies chase whichever enemy the
//! provided neighbour query reports as closest, which the world answers by
//! searching only the friendly's own partition cell.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{
    Battlefield, Command, EnemyId, EnemySnapshot, EnemyView, Event, FriendlyId, FriendlyView,
    Vec3, GROUND_HEIGHT,
};

/// Distance an enemy covers per simulated second.
pub const ENEMY_WALK_SPEED: f32 = 5.0;
/// Distance a friendly covers per simulated second.
pub const FRIENDLY_WALK_SPEED: f32 = 2.0;
/// Distance from its target at which a wandering enemy picks a new one.
pub const RETARGET_RADIUS: f32 = 1.0;

/// Configuration parameters required to construct the movement system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    battlefield: Battlefield,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration for the provided battlefield and seed.
    #[must_use]
    pub const fn new(battlefield: Battlefield, rng_seed: u64) -> Self {
        Self {
            battlefield,
            rng_seed,
        }
    }
}

/// Soldier steered by the movement system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mover {
    /// A wandering enemy.
    Enemy(EnemyId),
    /// A pursuing friendly.
    Friendly(FriendlyId),
}

/// How a soldier decides where to walk next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MovementPolicy {
    /// Walk towards a random point, picking a new one on arrival.
    Wander {
        /// Point currently being walked towards.
        current_target: Vec3,
    },
    /// Walk towards the closest enemy reported by the neighbour query.
    Pursue,
}

/// Pure system that reacts to world events and emits movement commands.
#[derive(Debug)]
pub struct Movement {
    battlefield: Battlefield,
    rng: ChaCha8Rng,
    policies: BTreeMap<Mover, MovementPolicy>,
}

impl Movement {
    /// Creates a new movement system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            battlefield: config.battlefield,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            policies: BTreeMap::new(),
        }
    }

    /// Returns the policy currently steering the provided soldier.
    #[must_use]
    pub fn policy(&self, mover: Mover) -> Option<&MovementPolicy> {
        self.policies.get(&mover)
    }

    /// Consumes world events and immutable views to emit movement commands.
    ///
    /// `closest_enemy` answers the neighbour query for a friendly standing at
    /// the given position. Commands are only produced when the events contain
    /// simulated time.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        enemies: &EnemyView,
        friendlies: &FriendlyView,
        closest_enemy: F,
        out: &mut Vec<Command>,
    ) where
        F: Fn(Vec3) -> Option<EnemySnapshot>,
    {
        let mut elapsed = Duration::ZERO;
        for event in events {
            match event {
                Event::BattlefieldConfigured { battlefield } => {
                    self.battlefield = *battlefield;
                    self.policies.clear();
                }
                Event::EnemySpawned { enemy, .. } => {
                    let _ = self.retarget(Mover::Enemy(*enemy));
                }
                Event::FriendlySpawned { friendly, .. } => {
                    let _ = self
                        .policies
                        .insert(Mover::Friendly(*friendly), MovementPolicy::Pursue);
                }
                Event::EnemyDespawned { enemy, .. } => {
                    let _ = self.policies.remove(&Mover::Enemy(*enemy));
                }
                Event::TimeAdvanced { dt } => elapsed = elapsed.saturating_add(*dt),
                _ => {}
            }
        }

        let seconds = elapsed.as_secs_f32();
        if seconds <= 0.0 {
            return;
        }

        for enemy in enemies.iter() {
            self.steer_enemy(enemy, seconds, out);
        }

        for friendly in friendlies.iter() {
            let mover = Mover::Friendly(friendly.id);
            let _ = self.policies.entry(mover).or_insert(MovementPolicy::Pursue);

            match closest_enemy(friendly.position) {
                Some(enemy) => {
                    let next = step_towards(
                        friendly.position,
                        enemy.position,
                        FRIENDLY_WALK_SPEED * seconds,
                    );
                    if next != friendly.position {
                        out.push(Command::MoveFriendly {
                            friendly: friendly.id,
                            position: self.battlefield.clamp(next),
                        });
                    }
                    if friendly.target != Some(enemy.id) {
                        out.push(Command::LockTarget {
                            friendly: friendly.id,
                            enemy: Some(enemy.id),
                        });
                    }
                }
                None => {
                    if friendly.target.is_some() {
                        out.push(Command::LockTarget {
                            friendly: friendly.id,
                            enemy: None,
                        });
                    }
                }
            }
        }
    }

    fn steer_enemy(&mut self, enemy: &EnemySnapshot, seconds: f32, out: &mut Vec<Command>) {
        let mover = Mover::Enemy(enemy.id);
        let target = match self.policies.get(&mover) {
            Some(MovementPolicy::Wander { current_target }) => *current_target,
            _ => self.retarget(mover),
        };

        let next = self
            .battlefield
            .clamp(step_towards(enemy.position, target, ENEMY_WALK_SPEED * seconds));
        out.push(Command::MoveEnemy {
            enemy: enemy.id,
            position: next,
        });

        if next.distance(target) < RETARGET_RADIUS {
            let _ = self.retarget(mover);
        }
    }

    fn retarget(&mut self, mover: Mover) -> Vec3 {
        let current_target = self.random_target();
        let _ = self
            .policies
            .insert(mover, MovementPolicy::Wander { current_target });
        current_target
    }

    fn random_target(&mut self) -> Vec3 {
        let extent = self.battlefield.map_width().max(1) as f32;
        Vec3::new(
            self.rng.gen_range(0.0..extent),
            GROUND_HEIGHT,
            self.rng.gen_range(0.0..extent),
        )
    }
}

/// Walks from `position` towards `target`, covering at most `distance` units.
///
/// The walker never overshoots: when the target is within reach it is
/// returned unchanged.
#[must_use]
pub fn step_towards(position: Vec3, target: Vec3, distance: f32) -> Vec3 {
    let offset = target - position;
    let remaining = offset.length();
    if remaining <= distance || remaining == 0.0 {
        return target;
    }
    position + offset * (distance / remaining)
}
