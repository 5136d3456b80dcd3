// Per-frame passes over the monster roster.
// Each pass walks the world once; the orchestrator runs them in a fixed
// order so no pass observes a half-applied write from another.

use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;

use super::ai::MonsterAi;
use super::combat::CombatResolver;
use super::components::*;
use super::motion::MotionController;
use super::navigation::NavigableRegion;
use super::separation::{SeparationBody, SeparationConfig, pairwise_deltas, player_deltas};

/// A monster removed from the roster this frame.
#[derive(Debug, Clone)]
pub struct Reaped {
    pub id: MonsterId,
    pub kind: String,
    pub position: Vec2,
}

/// Counter damage owed to the player by every open window in range.
/// Each window pays out at most once.
pub fn counter_attack_system(
    world: &mut World,
    combat: &CombatResolver,
    player_position: Vec2,
) -> Vec<(MonsterId, u32)> {
    let mut query = world.query::<(&Monster, &Transform, &mut MonsterBrain)>();
    let mut hits: Vec<(MonsterId, u32)> = query
        .iter_mut(world)
        .filter_map(|(monster, transform, mut brain)| {
            let damage = combat.try_counter_attack(player_position, transform.position, &mut brain);
            (damage > 0).then_some((monster.id, damage))
        })
        .collect();
    hits.sort_by_key(|(id, _)| *id);
    hits
}

/// Advance every monster's brain, timers and movement by `dt`.
pub fn monster_ai_system<R: Rng + ?Sized>(
    world: &mut World,
    rng: &mut R,
    ai: &MonsterAi,
    motion: &MotionController,
    region: &NavigableRegion,
    dt: f32,
) {
    let mut query = world.query::<(
        &Monster,
        &mut MonsterBrain,
        &mut Transform,
        &mut Velocity,
        &mut Body,
    )>();
    for (monster, mut brain, mut transform, mut velocity, mut body) in query.iter_mut(world) {
        ai.tick(
            rng,
            &mut brain,
            &mut transform,
            &mut velocity,
            &mut body,
            monster.spawn_origin,
            dt,
            region,
            motion,
        );
    }
}

/// Monster-monster and player-vs-monster overlap resolution, computed from
/// one position snapshot and then applied through walkability-gated pushes.
pub fn separation_system(
    world: &mut World,
    motion: &MotionController,
    region: &NavigableRegion,
    config: &SeparationConfig,
    player_position: Vec2,
    player_radius: f32,
) {
    let mut query = world.query::<(Entity, &Monster, &Transform, &Body, &MonsterBrain)>();
    let mut roster: Vec<(MonsterId, Entity, SeparationBody)> = query
        .iter(world)
        .map(|(entity, monster, transform, body, brain)| {
            (
                monster.id,
                entity,
                SeparationBody {
                    position: transform.position,
                    radius: body.radius(),
                    active: brain.is_alive(),
                },
            )
        })
        .collect();
    if roster.is_empty() {
        return;
    }
    roster.sort_by_key(|(id, _, _)| *id);

    let bodies: Vec<SeparationBody> = roster.iter().map(|(_, _, b)| *b).collect();
    let pairwise = pairwise_deltas(&bodies, config);
    let from_player = player_deltas(player_position, player_radius, &bodies, config);

    for (i, (_, entity, _)) in roster.iter().enumerate() {
        let delta = pairwise[i] + from_player[i];
        if delta == Vec2::ZERO {
            continue;
        }
        let Some(body) = world.get::<Body>(*entity).copied() else {
            continue;
        };
        if let Some(mut transform) = world.get_mut::<Transform>(*entity) {
            motion.push(&mut transform, &body, delta, region);
        }
    }
}

/// Despawn every monster whose death has latched.
pub fn reap_system(world: &mut World) -> Vec<Reaped> {
    let mut query = world.query::<(Entity, &Monster, &Transform, &MonsterBrain)>();
    let mut dead: Vec<(Entity, Reaped)> = query
        .iter(world)
        .filter(|(_, _, _, brain)| brain.is_dead())
        .map(|(entity, monster, transform, _)| {
            (
                entity,
                Reaped {
                    id: monster.id,
                    kind: monster.kind.clone(),
                    position: transform.position,
                },
            )
        })
        .collect();
    dead.sort_by_key(|(_, r)| r.id);

    dead.into_iter()
        .filter_map(|(entity, reaped)| {
            world.despawn(entity).then(|| {
                log::debug!("reaped monster {} at {:?}", reaped.id, reaped.position);
                reaped
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combat::CombatTunables;
    use crate::engine::motion::MotionConfig;
    use crate::engine::navigation::{Boundary, RegionData};

    fn region() -> NavigableRegion {
        NavigableRegion::build(
            &RegionData::rectangle(Boundary::new(0.0, 500.0, 0.0, 500.0).unwrap()),
            25.0,
        )
        .unwrap()
    }

    fn spawn(world: &mut World, id: u64, position: Vec2) -> Entity {
        world
            .spawn(MonsterBundle {
                transform: Transform::from_position(position),
                velocity: Velocity::default(),
                body: Body {
                    half_extents: Vec2::splat(10.0),
                    foot_offset: Vec2::ZERO,
                    walk_buffer: 0.0,
                    speed: 50.0,
                    facing: Facing::Idle,
                    moving: false,
                },
                health: Health::full(30),
                monster: Monster {
                    id: MonsterId(id),
                    kind: "slime".into(),
                    stats: MonsterStats::default(),
                    spawn_origin: position,
                },
                brain: MonsterBrain::new(2.0, 7),
            })
            .id()
    }

    #[test]
    fn counter_window_pays_once() {
        let mut world = World::new();
        let combat = CombatResolver::new(CombatTunables::default());
        let e = spawn(&mut world, 1, Vec2::new(100.0, 100.0));
        {
            let mut brain = world.get_mut::<MonsterBrain>(e).unwrap();
            brain.counter.remaining = 0.8;
        }
        let player = Vec2::new(150.0, 100.0);
        assert_eq!(counter_attack_system(&mut world, &combat, player), vec![(MonsterId(1), 7)]);
        assert!(counter_attack_system(&mut world, &combat, player).is_empty());
    }

    #[test]
    fn separation_pushes_overlapping_monsters_apart() {
        let mut world = World::new();
        let motion = MotionController::new(MotionConfig::default());
        let region = region();
        let a = spawn(&mut world, 1, Vec2::new(200.0, 200.0));
        let b = spawn(&mut world, 2, Vec2::new(210.0, 200.0));

        separation_system(
            &mut world,
            &motion,
            &region,
            &SeparationConfig::default(),
            Vec2::new(450.0, 450.0),
            10.0,
        );
        let pa = world.get::<Transform>(a).unwrap().position;
        let pb = world.get::<Transform>(b).unwrap().position;
        assert!(pa.x < 200.0 && pb.x > 210.0);
        assert_eq!(pa.y, 200.0);
    }

    #[test]
    fn player_push_respects_walls() {
        let mut world = World::new();
        let motion = MotionController::new(MotionConfig::default());
        let region = region();
        let e = spawn(&mut world, 1, Vec2::new(499.0, 250.0));

        separation_system(
            &mut world,
            &motion,
            &region,
            &SeparationConfig::default(),
            Vec2::new(490.0, 250.0),
            10.0,
        );
        // pushed toward +x, which would leave the boundary
        assert_eq!(world.get::<Transform>(e).unwrap().position, Vec2::new(499.0, 250.0));
    }

    #[test]
    fn reap_removes_only_dead_monsters() {
        let mut world = World::new();
        let dead = spawn(&mut world, 1, Vec2::new(50.0, 60.0));
        let dying = spawn(&mut world, 2, Vec2::new(80.0, 60.0));
        spawn(&mut world, 3, Vec2::new(120.0, 60.0));
        world.get_mut::<MonsterBrain>(dead).unwrap().mode = BrainMode::Dead;
        world.get_mut::<MonsterBrain>(dying).unwrap().mode = BrainMode::Dying { remaining: 0.2, fresh: false };

        let reaped = reap_system(&mut world);
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, MonsterId(1));
        assert_eq!(reaped[0].position, Vec2::new(50.0, 60.0));
        assert!(world.get::<Monster>(dead).is_none());
        assert!(reap_system(&mut world).is_empty());
    }
}
