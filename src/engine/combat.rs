// Damage rolls, hit tests, hit reactions and knockback.
//
// Everything random goes through the caller's RNG so a seeded simulation
// replays exactly.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::components::{BrainMode, Health, InterruptKind, MonsterBrain};
use super::error::ConfigError;

// ============================================================================
// SKILLS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitTest {
    Melee,
    Projectile,
    /// Forward rectangle of length `range` and half-width
    /// `CombatTunables::corridor_half_width`.
    Directional,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable skill description, checked once at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub cooldown: f32,
    pub damage_multiplier: f32,
    #[serde(default)]
    pub dash_speed: Option<f32>,
    /// `None` means the skill never hits anything (pure movement).
    #[serde(default)]
    pub range: Option<f32>,
    pub duration: f32,
    pub hit_test: HitTest,
}

impl SkillDefinition {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidSkill {
            id: self.id.0.clone(),
            reason,
        };
        if self.id.0.is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if !(self.cooldown.is_finite() && self.cooldown >= 0.0) {
            return Err(invalid("cooldown must be finite and non-negative"));
        }
        if !(self.damage_multiplier.is_finite() && self.damage_multiplier >= 0.0) {
            return Err(invalid("damage_multiplier must be finite and non-negative"));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(invalid("duration must be finite and positive"));
        }
        if let Some(range) = self.range {
            if !(range.is_finite() && range > 0.0) {
                return Err(invalid("range must be finite and positive"));
            }
        }
        if let Some(speed) = self.dash_speed {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(invalid("dash_speed must be finite and positive"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TUNABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTunables {
    pub crit_multiplier: f32,
    pub variance_min: f32,
    pub variance_max: f32,
    /// Seconds between the lethal hit and `Dead`.
    pub death_duration: f32,
    pub hit_stun_duration: f32,
    /// Probability that a non-lethal hit opens a counter window.
    pub counter_chance: f32,
    pub counter_window: f32,
    pub counter_cooldown: f32,
    pub counter_range: f32,
    /// Counter damage = floor(strength * scale), fixed at spawn.
    pub counter_strength_scale: f32,
    pub corridor_half_width: f32,
    pub knockback_base: f32,
    pub knockback_crit_bonus: f32,
}

impl Default for CombatTunables {
    fn default() -> Self {
        Self {
            crit_multiplier: 2.0,
            variance_min: 0.9,
            variance_max: 1.1,
            death_duration: 0.5,
            hit_stun_duration: 0.3,
            counter_chance: 0.5,
            counter_window: 0.8,
            counter_cooldown: 3.0,
            counter_range: 90.0,
            counter_strength_scale: 1.5,
            corridor_half_width: 80.0,
            knockback_base: 24.0,
            knockback_crit_bonus: 16.0,
        }
    }
}

impl CombatTunables {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, f32, bool); 12] = [
            ("combat.crit_multiplier", self.crit_multiplier, self.crit_multiplier >= 1.0),
            ("combat.variance_min", self.variance_min, self.variance_min > 0.0),
            ("combat.variance_max", self.variance_max, self.variance_max >= self.variance_min),
            ("combat.death_duration", self.death_duration, self.death_duration > 0.0),
            ("combat.hit_stun_duration", self.hit_stun_duration, self.hit_stun_duration >= 0.0),
            (
                "combat.counter_chance",
                self.counter_chance,
                (0.0..=1.0).contains(&self.counter_chance),
            ),
            ("combat.counter_window", self.counter_window, self.counter_window >= 0.0),
            ("combat.counter_cooldown", self.counter_cooldown, self.counter_cooldown >= 0.0),
            ("combat.counter_range", self.counter_range, self.counter_range >= 0.0),
            (
                "combat.counter_strength_scale",
                self.counter_strength_scale,
                self.counter_strength_scale >= 0.0,
            ),
            (
                "combat.corridor_half_width",
                self.corridor_half_width,
                self.corridor_half_width > 0.0,
            ),
            (
                "combat.knockback",
                self.knockback_base + self.knockback_crit_bonus,
                self.knockback_base >= 0.0 && self.knockback_crit_bonus >= 0.0,
            ),
        ];
        for (name, value, ok) in checks {
            if !value.is_finite() || !ok {
                return Err(ConfigError::InvalidTunable {
                    name,
                    reason: "out of range",
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRoll {
    pub amount: u32,
    pub is_crit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was already dying or dead.
    Ignored,
    Damaged { counter_triggered: bool },
    Killed,
}

#[derive(Debug, Clone)]
pub struct CombatResolver {
    tunables: CombatTunables,
}

impl CombatResolver {
    pub fn new(tunables: CombatTunables) -> Self {
        Self { tunables }
    }

    pub fn tunables(&self) -> &CombatTunables {
        &self.tunables
    }

    /// floor(base * (crit ? multiplier : 1) * uniform(variance_min, variance_max))
    pub fn compute_damage<R: Rng + ?Sized>(&self, rng: &mut R, base: f32, crit_chance: f32) -> DamageRoll {
        let chance = if crit_chance.is_finite() { crit_chance.clamp(0.0, 1.0) } else { 0.0 };
        let is_crit = rng.gen_bool(chance as f64);
        let multiplier = if is_crit { self.tunables.crit_multiplier } else { 1.0 };
        let variance = rng.gen_range(self.tunables.variance_min..=self.tunables.variance_max);
        let raw = (base.max(0.0) * multiplier * variance).floor();
        let amount = if raw.is_finite() { raw as u32 } else { 0 };
        DamageRoll { amount, is_crit }
    }

    /// Subtract `amount` and react: lethal hits start the death timer,
    /// anything else stuns and may open a counter window.
    pub fn apply_damage<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        health: &mut Health,
        brain: &mut MonsterBrain,
        amount: u32,
    ) -> DamageOutcome {
        if !brain.is_alive() {
            return DamageOutcome::Ignored;
        }

        health.hp = health.hp.saturating_sub(amount);
        if health.hp == 0 {
            brain.mode = BrainMode::Dying {
                remaining: self.tunables.death_duration,
                fresh: true,
            };
            brain.move_target = None;
            brain.counter.remaining = 0.0;
            return DamageOutcome::Killed;
        }

        let chance = self.tunables.counter_chance.clamp(0.0, 1.0) as f64;
        let counter = brain.counter.cooldown <= 0.0 && rng.gen_bool(chance);
        if counter {
            brain.counter.remaining = self.tunables.counter_window;
            brain.counter.cooldown = self.tunables.counter_cooldown;
            brain.counter.consumed = false;
            brain.counter.fresh = true;
        }

        let stun = self.tunables.hit_stun_duration;
        let (kind, duration) = if counter {
            (InterruptKind::CounterAttack, stun.max(self.tunables.counter_window))
        } else {
            (InterruptKind::HitStun, stun)
        };
        brain.mode = match brain.mode {
            BrainMode::Active(phase) => BrainMode::Interrupted {
                kind,
                remaining: duration,
                resume: phase,
                fresh: true,
            },
            BrainMode::Interrupted {
                kind: current,
                remaining,
                resume,
                fresh,
            } => BrainMode::Interrupted {
                kind: if counter { kind } else { current },
                remaining: remaining.max(duration),
                resume,
                fresh: fresh || duration >= remaining,
            },
            other => other,
        };
        DamageOutcome::Damaged {
            counter_triggered: counter,
        }
    }

    /// Counter damage dealt to an attacker at `attacker_pos`, or 0.
    ///
    /// A window pays out at most once; the hit consumes it.
    pub fn try_counter_attack(&self, attacker_pos: Vec2, monster_pos: Vec2, brain: &mut MonsterBrain) -> u32 {
        if !brain.is_alive() || !brain.counter.is_open() {
            return 0;
        }
        if attacker_pos.distance(monster_pos) > self.tunables.counter_range {
            return 0;
        }
        brain.counter.consumed = true;
        brain.counter.damage
    }

    pub fn check_skill_hit(
        &self,
        skill: &SkillDefinition,
        attacker_pos: Vec2,
        attacker_facing: Vec2,
        target_pos: Vec2,
    ) -> bool {
        let Some(range) = skill.range else {
            return false;
        };
        let to_target = target_pos - attacker_pos;
        match skill.hit_test {
            HitTest::Melee | HitTest::Projectile => to_target.length() <= range,
            HitTest::Directional => {
                let facing = attacker_facing.normalize_or_zero();
                if facing == Vec2::ZERO {
                    return false;
                }
                let forward = to_target.dot(facing);
                let lateral = facing.perp_dot(to_target).abs();
                forward > 0.0 && forward <= range && lateral < self.tunables.corridor_half_width
            }
        }
    }

    /// Displacement pushing the target straight away from the attacker.
    /// Coincident positions fall back to `fallback_dir`.
    pub fn knockback(&self, attacker_pos: Vec2, target_pos: Vec2, is_crit: bool, fallback_dir: Vec2) -> Vec2 {
        let dir = (target_pos - attacker_pos)
            .try_normalize()
            .or_else(|| fallback_dir.try_normalize())
            .unwrap_or(Vec2::X);
        let force = self.tunables.knockback_base
            + if is_crit { self.tunables.knockback_crit_bonus } else { 0.0 };
        dir * force
    }

    /// Counter damage a monster of the given strength deals.
    pub fn counter_damage_for(&self, strength: f32) -> u32 {
        let raw = (strength.max(0.0) * self.tunables.counter_strength_scale).floor();
        if raw.is_finite() { raw as u32 } else { 0 }
    }
}
