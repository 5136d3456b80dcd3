// Per-frame input intent.
// The host polls its devices and hands the simulation one of these per
// update; nothing in the engine reads hardware.

use glam::Vec2;

use super::combat::SkillId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Desired movement direction. Longer than 1 is normalized, non-finite
    /// is ignored.
    pub movement: Vec2,
    /// Use the basic attack this frame.
    pub attack: bool,
    /// Use a named skill this frame.
    pub skill: Option<SkillId>,
}

impl FrameInput {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn moving(direction: Vec2) -> Self {
        Self {
            movement: direction,
            ..Self::default()
        }
    }

    pub fn with_attack(mut self) -> Self {
        self.attack = true;
        self
    }

    pub fn with_skill(mut self, id: impl Into<String>) -> Self {
        self.skill = Some(SkillId::new(id));
        self
    }

    pub fn normalized_movement(&self) -> Vec2 {
        if !self.movement.is_finite() {
            return Vec2::ZERO;
        }
        if self.movement.length_squared() > 1.0 {
            self.movement.normalize()
        } else {
            self.movement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_is_normalized_and_sanitized() {
        assert_eq!(FrameInput::moving(Vec2::new(3.0, 4.0)).normalized_movement(), Vec2::new(0.6, 0.8));
        assert_eq!(FrameInput::moving(Vec2::new(0.5, 0.0)).normalized_movement(), Vec2::new(0.5, 0.0));
        assert_eq!(FrameInput::moving(Vec2::new(f32::NAN, 1.0)).normalized_movement(), Vec2::ZERO);
    }

    #[test]
    fn builders_set_actions() {
        let input = FrameInput::idle().with_attack().with_skill("dash");
        assert!(input.attack);
        assert_eq!(input.skill, Some(SkillId::new("dash")));
    }
}
