// Core ECS components for the simulation.
// Monsters are bevy_ecs entities built from these; the player reuses the
// movement components as plain fields.

use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position of an entity in 2D world space (y grows downwards).
///
/// `last_valid` is the most recent position that passed the walkability
/// and finiteness checks; it is where the entity is put back when a
/// frame produces garbage.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec2,
    pub last_valid: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec2::ZERO)
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            last_valid: position,
        }
    }
}

/// Velocity of an entity (units per second).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec2,
}

impl Velocity {
    pub fn new(linear: Vec2) -> Self {
        Self { linear }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    #[default]
    Idle,
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Dominant axis of `v`; ties go to the vertical axis.
    pub fn from_vector(v: Vec2) -> Self {
        if !v.is_finite() || v.length_squared() < 1e-8 {
            Facing::Idle
        } else if v.x.abs() > v.y.abs() {
            if v.x > 0.0 { Facing::Right } else { Facing::Left }
        } else if v.y > 0.0 {
            Facing::Down
        } else {
            Facing::Up
        }
    }

    pub fn to_vector(self) -> Vec2 {
        match self {
            Facing::Idle => Vec2::ZERO,
            Facing::Up => Vec2::NEG_Y,
            Facing::Down => Vec2::Y,
            Facing::Left => Vec2::NEG_X,
            Facing::Right => Vec2::X,
        }
    }
}

/// Physical shape and locomotion parameters.
///
/// `foot_offset` moves the collision anchor away from the render
/// position (usually down to the feet). `walk_buffer` is the clearance
/// the anchor needs from any non-walkable edge.
#[derive(Component, Debug, Clone, Copy)]
pub struct Body {
    pub half_extents: Vec2,
    pub foot_offset: Vec2,
    pub walk_buffer: f32,
    pub speed: f32,
    pub facing: Facing,
    pub moving: bool,
}

impl Body {
    #[inline]
    pub fn anchor(&self, position: Vec2) -> Vec2 {
        position + self.foot_offset
    }

    /// Circle used by the separation pass.
    pub fn radius(&self) -> f32 {
        self.half_extents.x.max(self.half_extents.y)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub hp: u32,
    pub max_hp: u32,
}

impl Health {
    pub fn full(max_hp: u32) -> Self {
        Self { hp: max_hp, max_hp }
    }

    pub fn is_depleted(&self) -> bool {
        self.hp == 0
    }
}

/// The five monster attributes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterStats {
    pub strength: f32,
    pub agility: f32,
    pub vitality: f32,
    pub intelligence: f32,
    pub luck: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonsterId(pub u64);

impl std::fmt::Display for MonsterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a monster. `spawn_origin` never changes after spawn.
#[derive(Component, Debug, Clone)]
pub struct Monster {
    pub id: MonsterId,
    pub kind: String,
    pub stats: MonsterStats,
    pub spawn_origin: Vec2,
}

// ============================================================================
// AI STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    Idle,
    Wander,
    Wait,
    Return,
}

/// A primary AI state and its countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub state: AiState,
    pub timer: f32,
}

impl Phase {
    pub fn new(state: AiState, timer: f32) -> Self {
        Self { state, timer }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    HitStun,
    CounterAttack,
}

/// What the brain is doing this frame.
///
/// `Interrupted` freezes `resume` untouched until `remaining` runs out;
/// `Dying` overrides everything and always ends in `Dead`.
///
/// `fresh` marks a timer armed during the current frame: the AI pass of
/// that frame clears it instead of counting the frame's `dt` against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrainMode {
    Active(Phase),
    Interrupted {
        kind: InterruptKind,
        remaining: f32,
        resume: Phase,
        fresh: bool,
    },
    Dying {
        remaining: f32,
        fresh: bool,
    },
    Dead,
}

/// Retaliation bookkeeping. `damage` is fixed at spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterWindow {
    pub remaining: f32,
    pub cooldown: f32,
    pub consumed: bool,
    pub damage: u32,
    /// Opened this frame; `remaining` and `cooldown` skip one tick.
    pub fresh: bool,
}

impl CounterWindow {
    pub fn is_open(&self) -> bool {
        self.remaining > 0.0 && !self.consumed
    }
}

#[derive(Component, Debug, Clone)]
pub struct MonsterBrain {
    pub mode: BrainMode,
    pub move_target: Option<Vec2>,
    pub counter: CounterWindow,
}

impl MonsterBrain {
    pub fn new(idle_timer: f32, counter_damage: u32) -> Self {
        Self {
            mode: BrainMode::Active(Phase::new(AiState::Idle, idle_timer)),
            move_target: None,
            counter: CounterWindow {
                remaining: 0.0,
                cooldown: 0.0,
                consumed: false,
                damage: counter_damage,
                fresh: false,
            },
        }
    }

    /// Alive means neither dying nor dead.
    pub fn is_alive(&self) -> bool {
        matches!(self.mode, BrainMode::Active(_) | BrainMode::Interrupted { .. })
    }

    pub fn is_dead(&self) -> bool {
        self.mode == BrainMode::Dead
    }

    /// Let every running timer count from the next tick on. Used for
    /// damage that lands between frames.
    pub fn settle(&mut self) {
        match &mut self.mode {
            BrainMode::Interrupted { fresh, .. } | BrainMode::Dying { fresh, .. } => *fresh = false,
            BrainMode::Active(_) | BrainMode::Dead => {}
        }
        self.counter.fresh = false;
    }

    pub fn state_label(&self) -> &'static str {
        match self.mode {
            BrainMode::Active(phase) => match phase.state {
                AiState::Idle => "idle",
                AiState::Wander => "wander",
                AiState::Wait => "wait",
                AiState::Return => "return",
            },
            BrainMode::Interrupted { kind: InterruptKind::HitStun, .. } => "hit_stun",
            BrainMode::Interrupted { kind: InterruptKind::CounterAttack, .. } => "counter_attack",
            BrainMode::Dying { .. } => "dying",
            BrainMode::Dead => "dead",
        }
    }
}

/// Everything a freshly spawned monster carries.
#[derive(Bundle)]
pub struct MonsterBundle {
    pub transform: Transform,
    pub velocity: Velocity,
    pub body: Body,
    pub health: Health,
    pub monster: Monster,
    pub brain: MonsterBrain,
}
