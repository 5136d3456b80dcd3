// Monster behaviour: a timer-driven loop around the spawn origin.
//
//   idle --(timer)--> wander --(arrive | timeout)--> wait --(timer)--> return
//    ^                                                                   |
//    +--------------------------(arrive | timeout)----------------------+
//
// Hit-stun and counter-attack are overlays (`BrainMode::Interrupted`): the
// primary phase is parked in `resume` and continues unchanged once the
// overlay expires. Dying overrides everything and always ends in Dead.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::components::{AiState, Body, BrainMode, Facing, MonsterBrain, Phase, Transform, Velocity};
use super::error::ConfigError;
use super::motion::MotionController;
use super::navigation::NavigableRegion;

/// Slack for float accumulation when a countdown should land on zero.
pub const TIMER_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTunables {
    /// Wander targets are drawn from a disc of this radius around the spawn origin.
    pub wander_radius: f32,
    /// Wander targets are clamped into the Boundary inset by this much.
    pub wander_margin: f32,
    pub arrival_threshold: f32,
    pub idle_min: f32,
    pub idle_max: f32,
    /// Idle time after a rejected wander target.
    pub idle_retry: f32,
    pub wait_min: f32,
    pub wait_max: f32,
    pub max_wander_duration: f32,
    pub max_return_duration: f32,
}

impl Default for AiTunables {
    fn default() -> Self {
        Self {
            wander_radius: 160.0,
            wander_margin: 40.0,
            arrival_threshold: 4.0,
            idle_min: 1.0,
            idle_max: 3.0,
            idle_retry: 0.5,
            wait_min: 0.5,
            wait_max: 1.5,
            max_wander_duration: 4.0,
            max_return_duration: 6.0,
        }
    }
}

impl AiTunables {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            self.wander_radius,
            self.wander_margin,
            self.arrival_threshold,
            self.idle_min,
            self.wait_min,
        ];
        let positive = [self.idle_retry, self.max_wander_duration, self.max_return_duration];
        let ordered = self.idle_max >= self.idle_min && self.wait_max >= self.wait_min;
        let ok = non_negative.iter().all(|v| v.is_finite() && *v >= 0.0)
            && positive.iter().all(|v| v.is_finite() && *v > 0.0)
            && self.idle_max.is_finite()
            && self.wait_max.is_finite()
            && ordered;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidTunable {
                name: "ai",
                reason: "timers and radii must be finite, non-negative and min <= max",
            })
        }
    }
}

fn roll<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min { rng.gen_range(min..=max) } else { min }
}

fn halt(velocity: &mut Velocity, body: &mut Body) {
    velocity.linear = Vec2::ZERO;
    body.moving = false;
}

#[derive(Debug, Clone)]
pub struct MonsterAi {
    tunables: AiTunables,
}

impl MonsterAi {
    pub fn new(tunables: AiTunables) -> Self {
        Self { tunables }
    }

    pub fn tunables(&self) -> &AiTunables {
        &self.tunables
    }

    /// Random idle duration for a freshly spawned monster.
    pub fn initial_idle<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        roll(rng, self.tunables.idle_min, self.tunables.idle_max)
    }

    /// Advance one monster by `dt` seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        brain: &mut MonsterBrain,
        transform: &mut Transform,
        velocity: &mut Velocity,
        body: &mut Body,
        spawn_origin: Vec2,
        dt: f32,
        region: &NavigableRegion,
        motion: &MotionController,
    ) {
        if !(dt > 0.0) {
            brain.settle();
            return;
        }

        // Counter timers run in every mode. A window opened this frame
        // starts counting next frame.
        if brain.counter.fresh {
            brain.counter.fresh = false;
        } else {
            brain.counter.remaining = (brain.counter.remaining - dt).max(0.0);
            brain.counter.cooldown = (brain.counter.cooldown - dt).max(0.0);
        }

        match brain.mode {
            BrainMode::Dead => halt(velocity, body),
            BrainMode::Dying { remaining, fresh } => {
                halt(velocity, body);
                let left = if fresh { remaining } else { remaining - dt };
                brain.mode = if left <= TIMER_EPSILON {
                    BrainMode::Dead
                } else {
                    BrainMode::Dying { remaining: left, fresh: false }
                };
            }
            BrainMode::Interrupted { kind, remaining, resume, fresh } => {
                halt(velocity, body);
                let left = if fresh { remaining } else { remaining - dt };
                brain.mode = if left <= TIMER_EPSILON {
                    log::trace!("interrupt {:?} over, resuming {:?}", kind, resume.state);
                    BrainMode::Active(resume)
                } else {
                    BrainMode::Interrupted {
                        kind,
                        remaining: left,
                        resume,
                        fresh: false,
                    }
                };
            }
            BrainMode::Active(mut phase) => {
                phase.timer -= dt;
                if phase.timer <= TIMER_EPSILON {
                    phase = self.advance(rng, phase.state, brain, body, spawn_origin, region, motion);
                    if !matches!(phase.state, AiState::Wander | AiState::Return) {
                        halt(velocity, body);
                    }
                } else if matches!(phase.state, AiState::Wander | AiState::Return) {
                    self.move_toward_target(brain, &mut phase, transform, velocity, body, dt, region, motion);
                }
                brain.mode = BrainMode::Active(phase);
            }
        }
    }

    /// The state after `state`'s timer ran out.
    #[allow(clippy::too_many_arguments)]
    fn advance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        state: AiState,
        brain: &mut MonsterBrain,
        body: &mut Body,
        spawn_origin: Vec2,
        region: &NavigableRegion,
        motion: &MotionController,
    ) -> Phase {
        let t = &self.tunables;
        let next = match state {
            AiState::Idle => match self.pick_wander_target(rng, body, spawn_origin, region, motion) {
                Some(target) => {
                    brain.move_target = Some(target);
                    body.moving = true;
                    Phase::new(AiState::Wander, t.max_wander_duration)
                }
                None => Phase::new(AiState::Idle, t.idle_retry),
            },
            AiState::Wander => {
                brain.move_target = None;
                Phase::new(AiState::Wait, roll(rng, t.wait_min, t.wait_max))
            }
            AiState::Wait => {
                brain.move_target = Some(spawn_origin);
                body.moving = true;
                Phase::new(AiState::Return, t.max_return_duration)
            }
            AiState::Return => {
                brain.move_target = None;
                Phase::new(AiState::Idle, roll(rng, t.idle_min, t.idle_max))
            }
        };
        log::trace!("ai {:?} -> {:?}", state, next.state);
        next
    }

    /// A point within `wander_radius` of the spawn origin, clamped into the
    /// Boundary margin and checked at the body's foot anchor.
    pub fn pick_wander_target<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        body: &Body,
        spawn_origin: Vec2,
        region: &NavigableRegion,
        motion: &MotionController,
    ) -> Option<Vec2> {
        let angle = rng.gen_range(0.0..TAU);
        let distance = self.tunables.wander_radius * rng.gen_range(0.0f32..=1.0).sqrt();
        let raw = spawn_origin + Vec2::from_angle(angle) * distance;
        let target = region.boundary().shrink(self.tunables.wander_margin).clamp(raw);
        motion.fits(region, body, target).then_some(target)
    }

    #[allow(clippy::too_many_arguments)]
    fn move_toward_target(
        &self,
        brain: &mut MonsterBrain,
        phase: &mut Phase,
        transform: &mut Transform,
        velocity: &mut Velocity,
        body: &mut Body,
        dt: f32,
        region: &NavigableRegion,
        motion: &MotionController,
    ) {
        let Some(target) = brain.move_target else {
            halt(velocity, body);
            return;
        };

        let to_target = target - transform.position;
        let remaining = to_target.length();
        if remaining <= self.tunables.arrival_threshold {
            if motion.fits(region, body, target) {
                transform.position = target;
                transform.last_valid = target;
            }
            brain.move_target = None;
            // Zero timer: the state's own expiry branch runs next tick.
            phase.timer = 0.0;
            halt(velocity, body);
            return;
        }

        let dir = to_target / remaining;
        let step = (body.speed * dt).min(remaining);
        body.facing = Facing::from_vector(dir);
        body.moving = true;
        motion.step(transform, velocity, body, dir * (step / dt), dt, region);
        motion.revert_if_invalid(transform, velocity, body, region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::InterruptKind;
    use crate::engine::motion::MotionConfig;
    use crate::engine::navigation::{Boundary, RegionData};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Rig {
        ai: MonsterAi,
        motion: MotionController,
        region: NavigableRegion,
        rng: StdRng,
        brain: MonsterBrain,
        transform: Transform,
        velocity: Velocity,
        body: Body,
        origin: Vec2,
    }

    impl Rig {
        fn new(origin: Vec2) -> Self {
            let region = NavigableRegion::build(
                &RegionData::rectangle(Boundary::new(0.0, 1000.0, 0.0, 1000.0).unwrap()),
                50.0,
            )
            .unwrap();
            Self {
                ai: MonsterAi::new(AiTunables::default()),
                motion: MotionController::new(MotionConfig::default()),
                region,
                rng: StdRng::seed_from_u64(9),
                brain: MonsterBrain::new(0.05, 5),
                transform: Transform::from_position(origin),
                velocity: Velocity::default(),
                body: Body {
                    half_extents: Vec2::splat(10.0),
                    foot_offset: Vec2::new(0.0, 8.0),
                    walk_buffer: 2.0,
                    speed: 120.0,
                    facing: Facing::Idle,
                    moving: false,
                },
                origin,
            }
        }

        fn tick(&mut self, dt: f32) {
            self.ai.tick(
                &mut self.rng,
                &mut self.brain,
                &mut self.transform,
                &mut self.velocity,
                &mut self.body,
                self.origin,
                dt,
                &self.region,
                &self.motion,
            );
        }

        fn phase(&self) -> Phase {
            match self.brain.mode {
                BrainMode::Active(phase) => phase,
                other => panic!("expected active brain, got {other:?}"),
            }
        }
    }

    #[test]
    fn idle_expiry_picks_target_near_origin() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.transform = Transform::from_position(Vec2::new(800.0, 800.0));
        rig.tick(0.1);
        assert_eq!(rig.phase().state, AiState::Wander);
        let target = rig.brain.move_target.unwrap();
        assert!(target.distance(rig.origin) <= 160.0 + 1e-3);
        assert!(rig.body.moving);
    }

    #[test]
    fn rejected_target_retries_from_idle() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.body.walk_buffer = 5_000.0;
        rig.tick(0.1);
        assert_eq!(rig.phase(), Phase::new(AiState::Idle, 0.5));
        assert!(rig.brain.move_target.is_none());
    }

    #[test]
    fn full_loop_returns_home() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        let mut seen = vec![AiState::Idle];
        for _ in 0..(60 * 20) {
            rig.tick(1.0 / 60.0);
            let state = rig.phase().state;
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            if seen.len() >= 5 {
                break;
            }
        }
        assert_eq!(
            &seen[..5],
            &[AiState::Idle, AiState::Wander, AiState::Wait, AiState::Return, AiState::Idle]
        );
        assert!(rig.transform.position.distance(rig.origin) < 1e-3);
    }

    #[test]
    fn interrupt_freezes_and_resumes() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.brain.move_target = Some(Vec2::new(600.0, 500.0));
        let parked = Phase::new(AiState::Wander, 2.0);
        rig.brain.mode = BrainMode::Interrupted {
            kind: InterruptKind::HitStun,
            remaining: 0.3,
            resume: parked,
            fresh: false,
        };
        let before = rig.transform.position;
        rig.tick(0.1);
        rig.tick(0.1);
        assert_eq!(rig.transform.position, before);
        assert_eq!(rig.brain.state_label(), "hit_stun");
        rig.tick(0.1);
        assert_eq!(rig.brain.mode, BrainMode::Active(parked));
        assert_eq!(rig.brain.move_target, Some(Vec2::new(600.0, 500.0)));

        rig.tick(0.1);
        assert!(rig.transform.position.x > before.x);
    }

    #[test]
    fn dying_becomes_dead_after_duration() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.brain.mode = BrainMode::Dying { remaining: 0.5, fresh: false };
        rig.tick(0.25);
        assert_eq!(rig.brain.state_label(), "dying");
        rig.tick(0.25);
        assert!(rig.brain.is_dead());
    }

    #[test]
    fn timers_armed_this_frame_skip_one_tick() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.brain.mode = BrainMode::Dying { remaining: 0.5, fresh: true };
        rig.brain.counter.remaining = 0.8;
        rig.brain.counter.cooldown = 3.0;
        rig.brain.counter.fresh = true;

        rig.tick(0.1);
        assert_eq!(rig.brain.mode, BrainMode::Dying { remaining: 0.5, fresh: false });
        assert_eq!(rig.brain.counter.remaining, 0.8);
        assert_eq!(rig.brain.counter.cooldown, 3.0);
        assert!(!rig.brain.counter.fresh);

        for _ in 0..4 {
            rig.tick(0.1);
        }
        assert_eq!(rig.brain.state_label(), "dying");
        rig.tick(0.1);
        assert!(rig.brain.is_dead());
    }

    #[test]
    fn zero_dt_settles_fresh_timers() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        let parked = Phase::new(AiState::Idle, 1.0);
        rig.brain.mode = BrainMode::Interrupted {
            kind: InterruptKind::HitStun,
            remaining: 0.3,
            resume: parked,
            fresh: true,
        };
        rig.tick(0.0);
        assert!(matches!(rig.brain.mode, BrainMode::Interrupted { fresh: false, .. }));
        rig.tick(0.3);
        assert_eq!(rig.brain.mode, BrainMode::Active(parked));
    }

    #[test]
    fn arrival_snaps_and_zeroes_timer() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.brain.mode = BrainMode::Active(Phase::new(AiState::Wander, 3.0));
        rig.brain.move_target = Some(Vec2::new(503.0, 500.0));
        rig.tick(0.1);
        assert_eq!(rig.transform.position, Vec2::new(503.0, 500.0));
        assert!(rig.brain.move_target.is_none());
        assert_eq!(rig.phase(), Phase::new(AiState::Wander, 0.0));
        rig.tick(0.1);
        assert_eq!(rig.phase().state, AiState::Wait);
    }

    #[test]
    fn counter_timers_tick_while_stunned() {
        let mut rig = Rig::new(Vec2::splat(500.0));
        rig.brain.counter.remaining = 0.2;
        rig.brain.counter.cooldown = 1.0;
        rig.brain.mode = BrainMode::Interrupted {
            kind: InterruptKind::CounterAttack,
            remaining: 1.0,
            resume: Phase::new(AiState::Idle, 1.0),
            fresh: false,
        };
        rig.tick(0.25);
        assert_eq!(rig.brain.counter.remaining, 0.0);
        assert!((rig.brain.counter.cooldown - 0.75).abs() < 1e-6);
    }
}
