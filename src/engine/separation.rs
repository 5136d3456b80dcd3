// Overlap resolution between bodies.
//
// Pushes are computed from a snapshot of every position and only then
// applied, so the result does not depend on roster order. Applying goes
// through `MotionController::push`, which drops any axis that would leave
// walkable ground.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Below this distance two bodies count as coincident.
const COINCIDENT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Fraction of a monster pair's overlap resolved per frame, split
    /// evenly between the two.
    pub push_strength: f32,
    /// Fraction of the player overlap resolved per frame. Only the
    /// monster moves.
    pub player_push_strength: f32,
    /// Upper bound on one body's displacement per frame.
    pub max_push: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            push_strength: 0.5,
            player_push_strength: 1.0,
            max_push: 12.0,
        }
    }
}

impl SeparationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [self.push_strength, self.player_push_strength];
        if fractions.iter().any(|f| !(f.is_finite() && (0.0..=1.0).contains(f))) {
            return Err(ConfigError::InvalidTunable {
                name: "separation.push_strength",
                reason: "must be within [0, 1]",
            });
        }
        if !(self.max_push.is_finite() && self.max_push >= 0.0) {
            return Err(ConfigError::InvalidTunable {
                name: "separation.max_push",
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// One participant of the pass. Inactive bodies (dying, dead) neither
/// push nor get pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationBody {
    pub position: Vec2,
    pub radius: f32,
    pub active: bool,
}

/// Direction from `from` to `to`, or a fixed axis when they coincide.
fn push_direction(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).try_normalize().unwrap_or(Vec2::X)
}

fn cap(delta: Vec2, max_push: f32) -> Vec2 {
    delta.clamp_length_max(max_push)
}

/// O(n²) monster-monster pass. Returns one displacement per input body.
pub fn pairwise_deltas(bodies: &[SeparationBody], config: &SeparationConfig) -> Vec<Vec2> {
    let mut deltas = vec![Vec2::ZERO; bodies.len()];
    for i in 0..bodies.len() {
        let a = bodies[i];
        if !a.active || !a.position.is_finite() {
            continue;
        }
        for j in (i + 1)..bodies.len() {
            let b = bodies[j];
            if !b.active || !b.position.is_finite() {
                continue;
            }
            let min_dist = a.radius + b.radius;
            let dist = a.position.distance(b.position);
            if dist >= min_dist {
                continue;
            }
            let dir = if dist < COINCIDENT_EPSILON {
                Vec2::X
            } else {
                push_direction(a.position, b.position)
            };
            let share = (min_dist - dist) * config.push_strength * 0.5;
            deltas[i] -= dir * share;
            deltas[j] += dir * share;
        }
    }
    deltas.into_iter().map(|d| cap(d, config.max_push)).collect()
}

/// Player-vs-monster pass: overlapping monsters are pushed straight away
/// from the player.
pub fn player_deltas(
    player_position: Vec2,
    player_radius: f32,
    bodies: &[SeparationBody],
    config: &SeparationConfig,
) -> Vec<Vec2> {
    bodies
        .iter()
        .map(|body| {
            if !body.active || !body.position.is_finite() || !player_position.is_finite() {
                return Vec2::ZERO;
            }
            let min_dist = player_radius + body.radius;
            let dist = player_position.distance(body.position);
            if dist >= min_dist {
                return Vec2::ZERO;
            }
            let dir = push_direction(player_position, body.position);
            cap(dir * (min_dist - dist) * config.player_push_strength, config.max_push)
        })
        .collect()
}
