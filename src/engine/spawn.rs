// Population maintenance: initial fill plus throttled respawn.
//
// Every fill is bounded: `needed * attempts_per_monster` candidates at most,
// so a cramped or crowded region just ends up under target until the next
// attempt.

use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use super::ai::MonsterAi;
use super::combat::CombatResolver;
use super::components::{
    Body, Facing, Health, Monster, MonsterBrain, MonsterBundle, MonsterId, MonsterStats, Transform,
    Velocity,
};
use super::error::ConfigError;
use super::navigation::NavigableRegion;

/// Upper bound on `SpawnConfig::target_count`.
pub const MAX_TARGET_COUNT: usize = 10_000;

fn default_half_extents() -> Vec2 {
    Vec2::splat(16.0)
}

fn default_weight() -> f32 {
    1.0
}

/// One entry of the monster type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTypeConfig {
    pub id: String,
    pub max_hp: u32,
    pub speed: f32,
    #[serde(default = "default_half_extents")]
    pub half_extents: Vec2,
    #[serde(default)]
    pub foot_offset: Vec2,
    #[serde(default)]
    pub walk_buffer: f32,
    #[serde(default)]
    pub stats: MonsterStats,
    /// Relative selection weight; equal weights give a uniform pick.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl MonsterTypeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidMonsterType {
            id: self.id.clone(),
            reason,
        };
        if self.max_hp == 0 {
            return Err(invalid("max_hp must be positive"));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(invalid("speed must be finite and positive"));
        }
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err(invalid("weight must be finite and non-negative"));
        }
        if !(self.walk_buffer.is_finite() && self.walk_buffer >= 0.0) {
            return Err(invalid("walk_buffer must be finite and non-negative"));
        }
        if !self.half_extents.is_finite() || !self.foot_offset.is_finite() {
            return Err(invalid("half_extents and foot_offset must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub target_count: usize,
    /// Minimum seconds between two respawn attempts.
    pub respawn_interval: f32,
    pub monster_types: Vec<MonsterTypeConfig>,
    /// No monster is placed closer than this to the player.
    pub safe_distance: f32,
    /// Candidates are drawn from the Boundary inset by this much.
    pub spawn_margin: f32,
    /// Clearance checked around a candidate's foot anchor.
    pub placement_buffer: f32,
    pub attempts_per_monster: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            target_count: 0,
            respawn_interval: 5.0,
            monster_types: Vec::new(),
            safe_distance: 500.0,
            spawn_margin: 40.0,
            placement_buffer: 8.0,
            attempts_per_monster: 50,
        }
    }
}

impl SpawnConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count > MAX_TARGET_COUNT {
            return Err(ConfigError::InvalidSpawnConfig("target_count must not exceed 10000"));
        }
        if self.target_count > 0 && self.monster_types.is_empty() {
            return Err(ConfigError::InvalidSpawnConfig(
                "monster_types must not be empty when target_count > 0",
            ));
        }
        if !(self.respawn_interval.is_finite() && self.respawn_interval >= 0.0) {
            return Err(ConfigError::InvalidSpawnConfig(
                "respawn_interval must be finite and non-negative",
            ));
        }
        let distances = [self.safe_distance, self.spawn_margin, self.placement_buffer];
        if distances.iter().any(|d| !(d.is_finite() && *d >= 0.0)) {
            return Err(ConfigError::InvalidSpawnConfig(
                "safe_distance, spawn_margin and placement_buffer must be finite and non-negative",
            ));
        }
        if self.attempts_per_monster == 0 {
            return Err(ConfigError::InvalidSpawnConfig("attempts_per_monster must be positive"));
        }
        for kind in &self.monster_types {
            kind.validate()?;
        }
        Ok(())
    }
}

/// Read-only collaborators a spawn needs.
pub struct SpawnContext<'a> {
    pub region: &'a NavigableRegion,
    pub combat: &'a CombatResolver,
    pub ai: &'a MonsterAi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedMonster {
    pub entity: Entity,
    pub id: MonsterId,
    pub kind: String,
    pub position: Vec2,
}

pub struct SpawnDirector {
    config: SpawnConfig,
    weights: Option<WeightedIndex<f32>>,
    last_check: Option<f64>,
    next_id: u64,
}

impl SpawnDirector {
    pub fn new(config: SpawnConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let weights = if config.monster_types.is_empty() {
            None
        } else {
            Some(
                WeightedIndex::new(config.monster_types.iter().map(|t| t.weight)).map_err(|_| {
                    ConfigError::InvalidSpawnConfig("monster type weights must not all be zero")
                })?,
            )
        };
        Ok(Self {
            config,
            weights,
            last_check: None,
            next_id: 1,
        })
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Monsters that are neither dying nor dead.
    pub fn living_count(world: &mut World) -> usize {
        let mut query = world.query::<&MonsterBrain>();
        query.iter(world).filter(|brain| brain.is_alive()).count()
    }

    /// Fill the roster up to `target_count`.
    pub fn spawn_initial<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        ctx: &SpawnContext,
        rng: &mut R,
        player_pos: Vec2,
    ) -> Vec<SpawnedMonster> {
        let spawned = self.fill(world, ctx, rng, player_pos);
        log::info!("initial spawn placed {} monster(s)", spawned.len());
        spawned
    }

    /// Top the roster up again, at most once per `respawn_interval`.
    pub fn maintain_population<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        ctx: &SpawnContext,
        rng: &mut R,
        player_pos: Vec2,
        now: f64,
    ) -> Vec<SpawnedMonster> {
        if let Some(last) = self.last_check {
            if now - last < f64::from(self.config.respawn_interval) {
                return Vec::new();
            }
        }
        self.last_check = Some(now);
        self.fill(world, ctx, rng, player_pos)
    }

    /// Scripted spawn of a named type at `position`. Skips the safe
    /// distance check but not walkability.
    pub fn spawn_at<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        ctx: &SpawnContext,
        rng: &mut R,
        kind: &str,
        position: Vec2,
    ) -> Option<SpawnedMonster> {
        let kind_idx = self.config.monster_types.iter().position(|t| t.id == kind)?;
        let kind_config = &self.config.monster_types[kind_idx];
        if !ctx.region.is_walkable(position + kind_config.foot_offset, kind_config.walk_buffer) {
            log::debug!("refusing to spawn `{}` on unwalkable {:?}", kind, position);
            return None;
        }
        Some(self.spawn_monster(world, ctx, rng, kind_idx, position))
    }

    fn fill<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        ctx: &SpawnContext,
        rng: &mut R,
        player_pos: Vec2,
    ) -> Vec<SpawnedMonster> {
        let needed = self.config.target_count.saturating_sub(Self::living_count(world));
        let Some(weights) = self.weights.clone() else {
            return Vec::new();
        };
        if needed == 0 {
            return Vec::new();
        }

        let budget = needed.saturating_mul(self.config.attempts_per_monster as usize);
        let strategy = ctx.region.preferred_strategy();
        let mut spawned = Vec::with_capacity(needed.min(MAX_TARGET_COUNT));
        let mut attempts = 0;
        while spawned.len() < needed && attempts < budget {
            attempts += 1;
            let kind_idx = weights.sample(rng);
            let kind = &self.config.monster_types[kind_idx];
            let Some(candidate) = ctx.region.sample_candidate(rng, strategy, self.config.spawn_margin)
            else {
                continue;
            };
            let buffer = self.config.placement_buffer.max(kind.walk_buffer);
            if !ctx.region.is_walkable(candidate + kind.foot_offset, buffer) {
                continue;
            }
            if candidate.distance(player_pos) < self.config.safe_distance {
                continue;
            }
            spawned.push(self.spawn_monster(world, ctx, rng, kind_idx, candidate));
        }

        if spawned.len() < needed {
            log::warn!(
                "placed {}/{} monster(s) after {} attempt(s)",
                spawned.len(),
                needed,
                attempts
            );
        }
        spawned
    }

    fn spawn_monster<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        ctx: &SpawnContext,
        rng: &mut R,
        kind_idx: usize,
        position: Vec2,
    ) -> SpawnedMonster {
        let kind = &self.config.monster_types[kind_idx];
        let id = MonsterId(self.next_id);
        self.next_id += 1;

        let counter_damage = ctx.combat.counter_damage_for(kind.stats.strength);
        let entity = world
            .spawn(MonsterBundle {
                transform: Transform::from_position(position),
                velocity: Velocity::default(),
                body: Body {
                    half_extents: kind.half_extents,
                    foot_offset: kind.foot_offset,
                    walk_buffer: kind.walk_buffer,
                    speed: kind.speed,
                    facing: Facing::Idle,
                    moving: false,
                },
                health: Health::full(kind.max_hp),
                monster: Monster {
                    id,
                    kind: kind.id.clone(),
                    stats: kind.stats,
                    spawn_origin: position,
                },
                brain: MonsterBrain::new(ctx.ai.initial_idle(rng), counter_damage),
            })
            .id();

        log::debug!("spawned {} `{}` at {:?}", id, kind.id, position);
        SpawnedMonster {
            entity,
            id,
            kind: kind.id.clone(),
            position,
        }
    }
}
