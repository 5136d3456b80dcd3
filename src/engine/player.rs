// The player: movement intent, skill loadout and hit points.
// There is exactly one per simulation, so it lives outside the ECS world
// and reuses the movement components as plain fields.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::combat::{SkillDefinition, SkillId};
use super::components::{Body, Facing, Health, Transform, Velocity};
use super::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Start position; a random walkable point when absent.
    pub spawn_position: Option<Vec2>,
    pub max_hp: u32,
    pub speed: f32,
    pub attack_power: f32,
    pub crit_chance: f32,
    pub half_extents: Vec2,
    pub foot_offset: Vec2,
    pub walk_buffer: f32,
    /// Skill fired by `FrameInput::attack`.
    pub basic_skill: SkillId,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn_position: None,
            max_hp: 100,
            speed: 200.0,
            attack_power: 20.0,
            crit_chance: 0.1,
            half_extents: Vec2::new(14.0, 20.0),
            foot_offset: Vec2::new(0.0, 16.0),
            walk_buffer: 4.0,
            basic_skill: SkillId::new("basic_attack"),
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name, reason| Err(ConfigError::InvalidTunable { name, reason });
        if self.max_hp == 0 {
            return invalid("player.max_hp", "must be positive");
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return invalid("player.speed", "must be finite and positive");
        }
        if !(self.attack_power.is_finite() && self.attack_power >= 0.0) {
            return invalid("player.attack_power", "must be finite and non-negative");
        }
        if !(self.crit_chance.is_finite() && (0.0..=1.0).contains(&self.crit_chance)) {
            return invalid("player.crit_chance", "must be within [0, 1]");
        }
        if !(self.walk_buffer.is_finite() && self.walk_buffer >= 0.0) {
            return invalid("player.walk_buffer", "must be finite and non-negative");
        }
        if self.spawn_position.is_some_and(|p| !p.is_finite()) {
            return invalid("player.spawn_position", "must be finite");
        }
        Ok(())
    }
}

/// Validated skill table keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SkillBook {
    skills: HashMap<SkillId, SkillDefinition>,
}

impl SkillBook {
    pub fn new(definitions: &[SkillDefinition]) -> Result<Self, ConfigError> {
        let mut skills = HashMap::with_capacity(definitions.len());
        for def in definitions {
            def.validate()?;
            if skills.insert(def.id.clone(), def.clone()).is_some() {
                return Err(ConfigError::DuplicateSkill(def.id.0.clone()));
            }
        }
        Ok(Self { skills })
    }

    pub fn get(&self, id: &SkillId) -> Option<&SkillDefinition> {
        self.skills.get(id)
    }

    pub fn contains(&self, id: &SkillId) -> bool {
        self.skills.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dash {
    direction: Vec2,
    speed: f32,
    remaining: f32,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub transform: Transform,
    pub velocity: Velocity,
    pub body: Body,
    pub health: Health,
    pub attack_power: f32,
    pub crit_chance: f32,
    active_skill: Option<SkillId>,
    attack_remaining: f32,
    dash: Option<Dash>,
    cooldowns: HashMap<SkillId, f32>,
    /// Unit vector of the last non-zero movement; skills aim along it.
    aim: Vec2,
    defeated: bool,
}

impl Player {
    pub fn new(config: &PlayerConfig, position: Vec2) -> Self {
        Self {
            transform: Transform::from_position(position),
            velocity: Velocity::default(),
            body: Body {
                half_extents: config.half_extents,
                foot_offset: config.foot_offset,
                walk_buffer: config.walk_buffer,
                speed: config.speed,
                facing: Facing::Down,
                moving: false,
            },
            health: Health::full(config.max_hp),
            attack_power: config.attack_power,
            crit_chance: config.crit_chance,
            active_skill: None,
            attack_remaining: 0.0,
            dash: None,
            cooldowns: HashMap::new(),
            aim: Vec2::Y,
            defeated: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    pub fn aim(&self) -> Vec2 {
        self.aim
    }

    pub fn active_skill(&self) -> Option<&SkillId> {
        self.active_skill.as_ref()
    }

    /// True while the last activated skill's `duration` runs.
    pub fn is_attacking(&self) -> bool {
        self.attack_remaining > 0.0
    }

    pub fn is_dashing(&self) -> bool {
        self.dash.is_some()
    }

    pub fn is_defeated(&self) -> bool {
        self.defeated
    }

    pub fn cooldown_remaining(&self, id: &SkillId) -> f32 {
        self.cooldowns.get(id).copied().unwrap_or(0.0)
    }

    pub fn tick_timers(&mut self, dt: f32) {
        for remaining in self.cooldowns.values_mut() {
            *remaining -= dt;
        }
        self.cooldowns.retain(|_, remaining| *remaining > 0.0);

        if self.attack_remaining > 0.0 {
            self.attack_remaining -= dt;
            if self.attack_remaining <= 0.0 {
                self.attack_remaining = 0.0;
                self.active_skill = None;
            }
        }
        if let Some(dash) = &mut self.dash {
            dash.remaining -= dt;
            if dash.remaining <= 0.0 {
                self.dash = None;
            }
        }
    }

    pub fn can_activate(&self, skill: &SkillDefinition) -> bool {
        !self.defeated && !self.is_attacking() && self.cooldown_remaining(&skill.id) <= 0.0
    }

    /// Start `skill` if it is off cooldown and nothing else is running.
    pub fn activate(&mut self, skill: &SkillDefinition) -> bool {
        if !self.can_activate(skill) {
            return false;
        }
        if skill.cooldown > 0.0 {
            self.cooldowns.insert(skill.id.clone(), skill.cooldown);
        }
        self.active_skill = Some(skill.id.clone());
        self.attack_remaining = skill.duration;
        if let Some(speed) = skill.dash_speed {
            self.dash = Some(Dash {
                direction: self.aim,
                speed,
                remaining: skill.duration,
            });
        }
        log::debug!("player used `{}`", skill.id);
        true
    }

    /// Velocity the player wants this frame. A running dash overrides the
    /// movement input.
    pub fn desired_velocity(&mut self, movement: Vec2) -> Vec2 {
        if self.defeated {
            self.body.moving = false;
            return Vec2::ZERO;
        }
        if let Some(dash) = self.dash {
            self.body.moving = true;
            return dash.direction * dash.speed;
        }
        self.steer(movement);
        self.body.moving = movement != Vec2::ZERO;
        movement * self.body.speed
    }

    /// Turn toward `movement`. Ignored while dashing or for a zero input.
    pub fn steer(&mut self, movement: Vec2) {
        if self.defeated || self.dash.is_some() {
            return;
        }
        if let Some(dir) = movement.try_normalize() {
            self.aim = dir;
            self.body.facing = Facing::from_vector(dir);
        }
    }

    /// Returns true if this hit is the one that defeated the player.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.defeated {
            return false;
        }
        self.health.hp = self.health.hp.saturating_sub(amount);
        if self.health.is_depleted() {
            self.defeated = true;
            self.dash = None;
            self.velocity.linear = Vec2::ZERO;
            self.body.moving = false;
            return true;
        }
        false
    }
}
