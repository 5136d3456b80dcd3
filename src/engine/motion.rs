// Collision-aware motion integration.
//
// A step tries the full displacement first, then slides: X alone, then Y
// from wherever X left the entity. A blocked axis loses its velocity for
// the frame. Walkability is always tested at the body's collision anchor
// with the body's walk buffer, so a step never moves an entity onto
// ground it could not legally stand on.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::components::{Body, Transform, Velocity};
use super::error::ConfigError;
use super::navigation::NavigableRegion;

/// Eight probe directions for the stuck-escape routine.
const ESCAPE_PROBES: [Vec2; 8] = [
    Vec2::new(1.0, 0.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, -1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, 1.0),
    Vec2::new(1.0, -1.0),
    Vec2::new(-1.0, -1.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Inset from the Boundary used by the final clamp.
    pub boundary_margin: f32,
    /// Distance of each stuck-escape probe.
    pub stuck_probe_step: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            boundary_margin: 8.0,
            stuck_probe_step: 16.0,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.boundary_margin.is_finite() && self.boundary_margin >= 0.0) {
            return Err(ConfigError::InvalidTunable {
                name: "motion.boundary_margin",
                reason: "must be finite and non-negative",
            });
        }
        if !(self.stuck_probe_step.is_finite() && self.stuck_probe_step > 0.0) {
            return Err(ConfigError::InvalidTunable {
                name: "motion.stuck_probe_step",
                reason: "must be finite and positive",
            });
        }
        Ok(())
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionReport {
    pub position: Vec2,
    pub blocked_x: bool,
    pub blocked_y: bool,
    /// The entity started off walkable ground and was relocated.
    pub escaped: bool,
    /// Non-finite input; the entity was put back at its last valid position.
    pub recovered: bool,
}

#[derive(Debug, Clone)]
pub struct MotionController {
    config: MotionConfig,
}

impl MotionController {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// True if `body` may stand at `position`.
    #[inline]
    pub fn fits(&self, region: &NavigableRegion, body: &Body, position: Vec2) -> bool {
        region.is_walkable(body.anchor(position), body.walk_buffer)
    }

    /// Integrate `desired` velocity over `dt` and write the new position.
    pub fn step(
        &self,
        transform: &mut Transform,
        velocity: &mut Velocity,
        body: &Body,
        desired: Vec2,
        dt: f32,
        region: &NavigableRegion,
    ) -> MotionReport {
        velocity.linear = desired;
        if !transform.position.is_finite() || !desired.is_finite() || !dt.is_finite() {
            return self.recover(transform, velocity);
        }

        let mut report = MotionReport::default();
        if !self.fits(region, body, transform.position) {
            report.escaped = self.escape_stuck(transform, body, region);
        }

        let start = transform.position;
        let d = desired * dt;
        let mut pos = start;
        if d != Vec2::ZERO {
            let combined = start + d;
            if self.fits(region, body, combined) {
                pos = combined;
            } else {
                let x_only = Vec2::new(start.x + d.x, start.y);
                if d.x != 0.0 && self.fits(region, body, x_only) {
                    pos = x_only;
                } else {
                    report.blocked_x = d.x != 0.0;
                    velocity.linear.x = 0.0;
                }
                let y_only = Vec2::new(pos.x, pos.y + d.y);
                if d.y != 0.0 && self.fits(region, body, y_only) {
                    pos = y_only;
                } else {
                    report.blocked_y = d.y != 0.0;
                    velocity.linear.y = 0.0;
                }
            }
        }

        // Last-resort clamp; skipped if it would land on bad ground.
        let clamped = region
            .boundary()
            .shrink(self.config.boundary_margin)
            .clamp(pos);
        if clamped != pos && self.fits(region, body, clamped) {
            pos = clamped;
        }

        if !pos.is_finite() {
            return self.recover(transform, velocity);
        }
        transform.position = pos;
        if self.fits(region, body, pos) {
            transform.last_valid = pos;
        }
        report.position = pos;
        report
    }

    /// Displace by `delta` one axis at a time; an axis that would leave
    /// walkable ground is dropped on its own. Used for knockback and
    /// separation.
    pub fn push(
        &self,
        transform: &mut Transform,
        body: &Body,
        delta: Vec2,
        region: &NavigableRegion,
    ) -> Vec2 {
        if !delta.is_finite() || !transform.position.is_finite() {
            return transform.position;
        }
        let mut pos = transform.position;
        let x_only = Vec2::new(pos.x + delta.x, pos.y);
        if delta.x != 0.0 && self.fits(region, body, x_only) {
            pos = x_only;
        }
        let y_only = Vec2::new(pos.x, pos.y + delta.y);
        if delta.y != 0.0 && self.fits(region, body, y_only) {
            pos = y_only;
        }
        transform.position = pos;
        if self.fits(region, body, pos) {
            transform.last_valid = pos;
        }
        pos
    }

    /// Probe eight neighbours at a fixed step and move to the first
    /// walkable one. Leaves the position alone if none is.
    pub fn escape_stuck(&self, transform: &mut Transform, body: &Body, region: &NavigableRegion) -> bool {
        let step = self.config.stuck_probe_step;
        for dir in ESCAPE_PROBES {
            let candidate = transform.position + dir * step;
            if self.fits(region, body, candidate) {
                log::debug!("stuck at {:?}, escaped to {:?}", transform.position, candidate);
                transform.position = candidate;
                transform.last_valid = candidate;
                return true;
            }
        }
        false
    }

    /// Put the entity back at its last valid position if where it stands
    /// now is non-finite or not walkable. Returns true if it reverted.
    pub fn revert_if_invalid(
        &self,
        transform: &mut Transform,
        velocity: &mut Velocity,
        body: &Body,
        region: &NavigableRegion,
    ) -> bool {
        if transform.position.is_finite() && self.fits(region, body, transform.position) {
            return false;
        }
        if transform.position == transform.last_valid {
            return false;
        }
        transform.position = transform.last_valid;
        velocity.linear = Vec2::ZERO;
        true
    }

    fn recover(&self, transform: &mut Transform, velocity: &mut Velocity) -> MotionReport {
        log::warn!(
            "non-finite motion input at {:?}, restoring {:?}",
            transform.position,
            transform.last_valid
        );
        transform.position = transform.last_valid;
        velocity.linear = Vec2::ZERO;
        MotionReport {
            position: transform.position,
            recovered: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::Facing;
    use crate::engine::navigation::{Boundary, PolygonRing, RegionData};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn body(buffer: f32) -> Body {
        Body {
            half_extents: Vec2::splat(8.0),
            foot_offset: Vec2::ZERO,
            walk_buffer: buffer,
            speed: 100.0,
            facing: Facing::Idle,
            moving: false,
        }
    }

    /// 200x200 room with a wall block at x in [100, 120], y in [0, 150].
    fn room() -> NavigableRegion {
        let data = RegionData {
            walkable: vec![PolygonRing::rect(Vec2::ZERO, Vec2::splat(200.0))],
            obstacles: vec![PolygonRing::rect(Vec2::new(100.0, 0.0), Vec2::new(120.0, 150.0))],
            boundary: Some(Boundary::new(0.0, 200.0, 0.0, 200.0).unwrap()),
        };
        NavigableRegion::build(&data, 10.0).unwrap()
    }

    fn controller() -> MotionController {
        MotionController::new(MotionConfig::default())
    }

    #[test]
    fn free_step_moves_full_displacement() {
        let region = room();
        let mut t = Transform::from_position(Vec2::new(50.0, 50.0));
        let mut v = Velocity::default();
        let report = controller().step(&mut t, &mut v, &body(0.0), Vec2::new(100.0, 0.0), 0.1, &region);
        assert_eq!(report.position, Vec2::new(60.0, 50.0));
        assert_eq!(t.last_valid, t.position);
        assert!(!report.blocked_x && !report.blocked_y);
    }

    #[test]
    fn slides_along_wall() {
        let region = room();
        let mut t = Transform::from_position(Vec2::new(95.0, 50.0));
        let mut v = Velocity::default();
        let report =
            controller().step(&mut t, &mut v, &body(0.0), Vec2::new(100.0, 100.0), 0.1, &region);
        assert!(report.blocked_x);
        assert!(!report.blocked_y);
        assert_eq!(t.position, Vec2::new(95.0, 60.0));
        assert_eq!(v.linear, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn nan_input_restores_last_valid() {
        let region = room();
        let mut t = Transform::from_position(Vec2::new(50.0, 50.0));
        let mut v = Velocity::default();
        let report =
            controller().step(&mut t, &mut v, &body(0.0), Vec2::new(f32::NAN, 0.0), 0.1, &region);
        assert!(report.recovered);
        assert_eq!(t.position, Vec2::new(50.0, 50.0));
        assert_eq!(v.linear, Vec2::ZERO);

        t.position = Vec2::new(f32::INFINITY, 3.0);
        controller().step(&mut t, &mut v, &body(0.0), Vec2::X, 0.1, &region);
        assert_eq!(t.position, Vec2::new(50.0, 50.0));
    }

    #[test]
    fn escapes_when_teleported_into_wall() {
        let region = room();
        let mut t = Transform::from_position(Vec2::new(105.0, 50.0));
        let mut v = Velocity::default();
        let report = controller().step(&mut t, &mut v, &body(0.0), Vec2::ZERO, 0.1, &region);
        assert!(report.escaped);
        assert_eq!(t.position, Vec2::new(121.0, 50.0));
    }

    #[test]
    fn stays_put_when_no_escape_exists() {
        let region = room();
        let ctl = MotionController::new(MotionConfig {
            stuck_probe_step: 4.0,
            ..MotionConfig::default()
        });
        let mut t = Transform::from_position(Vec2::new(110.0, 50.0));
        let mut v = Velocity::default();
        let report = ctl.step(&mut t, &mut v, &body(0.0), Vec2::ZERO, 0.1, &region);
        assert!(!report.escaped);
        assert_eq!(t.position, Vec2::new(110.0, 50.0));
    }

    #[test]
    fn push_drops_blocked_axis_only() {
        let region = room();
        let mut t = Transform::from_position(Vec2::new(95.0, 50.0));
        let pos = controller().push(&mut t, &body(0.0), Vec2::new(10.0, -10.0), &region);
        assert_eq!(pos, Vec2::new(95.0, 40.0));
    }

    #[test]
    fn step_never_lands_on_unwalkable_ground() {
        let region = room();
        let ctl = controller();
        let b = body(4.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mut t = Transform::from_position(Vec2::new(50.0, 180.0));
        let mut v = Velocity::default();
        for _ in 0..2_000 {
            let before = t.position;
            let desired = Vec2::new(rng.gen_range(-400.0..400.0), rng.gen_range(-400.0..400.0));
            let report = ctl.step(&mut t, &mut v, &b, desired, 1.0 / 30.0, &region);
            assert!(
                region.is_walkable(report.position, b.walk_buffer) || report.position == before,
                "left walkable ground at {:?}",
                report.position
            );
        }
    }

    #[test]
    fn revert_uses_last_valid() {
        let region = room();
        let ctl = controller();
        let mut t = Transform::from_position(Vec2::new(50.0, 50.0));
        let mut v = Velocity::new(Vec2::ONE);
        t.position = Vec2::new(110.0, 50.0);
        assert!(ctl.revert_if_invalid(&mut t, &mut v, &body(0.0), &region));
        assert_eq!(t.position, Vec2::new(50.0, 50.0));
        assert_eq!(v.linear, Vec2::ZERO);
    }
}
