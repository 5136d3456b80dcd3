// Frame driver.
//
// `update` runs the same fixed sequence every frame:
//   1. player movement and skills
//   2. counter-attack damage to the player
//   3. monster AI, timers and movement
//   4. separation (monster-monster, player-monster)
//   5. reap dead monsters, one loot drop each
//   6. population top-up
// Steps share position writes, so they never run out of order.

use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::ai::MonsterAi;
use super::combat::{CombatResolver, DamageOutcome, SkillDefinition, SkillId};
use super::components::{Body, Health, Monster, MonsterBrain, MonsterId, Transform};
use super::config::SimulationConfig;
use super::error::ConfigError;
use super::events::{LootSource, SequentialLoot, SimEvent};
use super::input::FrameInput;
use super::motion::MotionController;
use super::navigation::NavigableRegion;
use super::player::{Player, SkillBook};
use super::separation::SeparationConfig;
use super::snapshot::{FrameSnapshot, MonsterSnapshot, PlayerSnapshot};
use super::spawn::{SpawnContext, SpawnDirector, SpawnedMonster};
use super::systems::{counter_attack_system, monster_ai_system, reap_system, separation_system};

pub struct Simulation {
    world: World,
    region: NavigableRegion,
    motion: MotionController,
    combat: CombatResolver,
    ai: MonsterAi,
    spawner: SpawnDirector,
    skills: SkillBook,
    basic_skill: SkillId,
    separation: SeparationConfig,
    player: Player,
    rng: StdRng,
    loot: Box<dyn LootSource>,
    events: Vec<SimEvent>,
    max_frame_dt: f32,
    frame: u64,
    /// Simulated seconds. Kept in f64 so long sessions keep advancing.
    elapsed: f64,
}

impl Simulation {
    /// Validate `config`, build the region index and place the player and
    /// the initial population.
    pub fn new(config: SimulationConfig, loot: Box<dyn LootSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let region_data = config.region.as_ref().ok_or(ConfigError::MissingRegion)?;
        let spawn_config = config.spawn.clone().ok_or(ConfigError::MissingSpawnConfig)?;

        let region = NavigableRegion::build(region_data, config.grid_cell_size)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = match config.player.spawn_position {
            Some(p) => p,
            None => region.random_walkable_point(&mut rng, spawn_config.spawn_margin, None),
        };

        let mut sim = Self {
            world: World::new(),
            motion: MotionController::new(config.motion),
            combat: CombatResolver::new(config.combat),
            ai: MonsterAi::new(config.ai),
            spawner: SpawnDirector::new(spawn_config)?,
            skills: SkillBook::new(&config.skills)?,
            basic_skill: config.player.basic_skill.clone(),
            separation: config.separation,
            player: Player::new(&config.player, start),
            rng,
            loot,
            events: Vec::new(),
            max_frame_dt: config.max_frame_dt,
            frame: 0,
            elapsed: 0.0,
            region,
        };

        let ctx = SpawnContext {
            region: &sim.region,
            combat: &sim.combat,
            ai: &sim.ai,
        };
        let spawned = sim
            .spawner
            .spawn_initial(&mut sim.world, &ctx, &mut sim.rng, sim.player.position());
        sim.record_spawns(spawned);

        log::info!(
            "simulation ready: player at {:?}, {} skill(s), {} monster(s)",
            start,
            sim.skills.len(),
            SpawnDirector::living_count(&mut sim.world)
        );
        Ok(sim)
    }

    /// Same as `new` with a loot source that hands out sequential handles.
    pub fn with_default_loot(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::new(config, Box::new(SequentialLoot::default()))
    }

    /// Advance the whole simulation by `dt` seconds.
    ///
    /// Non-finite or negative `dt` counts as 0; long frames are clamped to
    /// `max_frame_dt`.
    pub fn update(&mut self, dt: f32, input: &FrameInput) {
        let dt = self.sanitize_dt(dt);
        self.frame += 1;
        self.elapsed += f64::from(dt);
        log::trace!("frame {} dt {:.4}", self.frame, dt);

        self.update_player(dt, input);
        self.apply_counter_attacks();
        monster_ai_system(&mut self.world, &mut self.rng, &self.ai, &self.motion, &self.region, dt);
        separation_system(
            &mut self.world,
            &self.motion,
            &self.region,
            &self.separation,
            self.player.position(),
            self.player.body.radius(),
        );
        self.reap();
        self.maintain_population();
    }

    fn sanitize_dt(&self, dt: f32) -> f32 {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("ignoring invalid frame delta {}", dt);
            return 0.0;
        }
        dt.min(self.max_frame_dt)
    }

    fn update_player(&mut self, dt: f32, input: &FrameInput) {
        self.player.tick_timers(dt);
        let movement = input.normalized_movement();
        self.player.steer(movement);

        let requested = input
            .skill
            .clone()
            .or_else(|| input.attack.then(|| self.basic_skill.clone()));
        if let Some(id) = requested {
            match self.skills.get(&id).cloned() {
                Some(skill) => {
                    if self.player.activate(&skill) {
                        self.resolve_skill(&skill);
                    }
                }
                None => log::debug!("ignoring unknown skill `{}`", id),
            }
        }

        let desired = self.player.desired_velocity(movement);
        self.motion.step(
            &mut self.player.transform,
            &mut self.player.velocity,
            &self.player.body,
            desired,
            dt,
            &self.region,
        );
    }

    /// Hit every living monster the skill reaches, in id order.
    fn resolve_skill(&mut self, skill: &SkillDefinition) {
        if skill.range.is_none() {
            return;
        }
        let origin = self.player.position();
        let aim = self.player.aim();

        let mut candidates = self.world.query::<(Entity, &Monster, &Transform, &MonsterBrain)>();
        let mut targets: Vec<(MonsterId, Entity)> = candidates
            .iter(&self.world)
            .filter(|(_, _, transform, brain)| {
                brain.is_alive() && self.combat.check_skill_hit(skill, origin, aim, transform.position)
            })
            .map(|(entity, monster, _, _)| (monster.id, entity))
            .collect();
        targets.sort_by_key(|(id, _)| *id);

        let base = self.player.attack_power * skill.damage_multiplier;
        let mut victims =
            self.world.query::<(&mut Health, &mut MonsterBrain, &mut Transform, &Body)>();
        for (id, entity) in targets {
            let Ok((mut health, mut brain, mut transform, body)) = victims.get_mut(&mut self.world, entity)
            else {
                continue;
            };
            let roll = self.combat.compute_damage(&mut self.rng, base, self.player.crit_chance);
            let outcome = self.combat.apply_damage(&mut self.rng, &mut health, &mut brain, roll.amount);
            if outcome == DamageOutcome::Ignored {
                continue;
            }
            let push = self.combat.knockback(origin, transform.position, roll.is_crit, aim);
            self.motion.push(&mut transform, body, push, &self.region);

            self.events.push(SimEvent::MonsterDamaged {
                id,
                amount: roll.amount,
                is_crit: roll.is_crit,
                position: transform.position,
                skill: Some(skill.id.clone()),
            });
            if outcome == DamageOutcome::Killed {
                log::debug!("monster {} killed by `{}`", id, skill.id);
                self.events.push(SimEvent::MonsterKilled {
                    id,
                    position: transform.position,
                });
            }
        }
    }

    fn apply_counter_attacks(&mut self) {
        if self.player.is_defeated() {
            return;
        }
        let hits = counter_attack_system(&mut self.world, &self.combat, self.player.position());
        for (source, amount) in hits {
            if self.player.is_defeated() {
                break;
            }
            let defeated = self.player.take_damage(amount);
            self.events.push(SimEvent::PlayerDamaged {
                source,
                amount,
                remaining_hp: self.player.health.hp,
            });
            if defeated {
                log::info!("player defeated by counter-attack from {}", source);
                self.events.push(SimEvent::PlayerDefeated {
                    position: self.player.position(),
                });
            }
        }
    }

    fn reap(&mut self) {
        for reaped in reap_system(&mut self.world) {
            let handle = self.loot.request_drop(&reaped.kind, reaped.position);
            self.events.push(SimEvent::LootDropped {
                id: reaped.id,
                position: reaped.position,
                handle,
            });
        }
    }

    fn maintain_population(&mut self) {
        let ctx = SpawnContext {
            region: &self.region,
            combat: &self.combat,
            ai: &self.ai,
        };
        let spawned = self.spawner.maintain_population(
            &mut self.world,
            &ctx,
            &mut self.rng,
            self.player.position(),
            self.elapsed,
        );
        self.record_spawns(spawned);
    }

    fn record_spawns(&mut self, spawned: Vec<SpawnedMonster>) {
        self.events.extend(spawned.into_iter().map(|m| SimEvent::MonsterSpawned {
            id: m.id,
            kind: m.kind,
            position: m.position,
        }));
    }

    fn find_monster(&mut self, id: MonsterId) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &Monster)>();
        query
            .iter(&self.world)
            .find(|(_, monster)| monster.id == id)
            .map(|(entity, _)| entity)
    }

    /// Damage from outside the skill system (scripted hazards, host-side
    /// projectiles). Returns `None` for an unknown id.
    ///
    /// The hit lands between frames, so the next `update` counts its whole
    /// `dt` against the timers it starts.
    pub fn apply_damage_to_monster(&mut self, id: MonsterId, amount: u32) -> Option<DamageOutcome> {
        let entity = self.find_monster(id)?;
        let mut query = self.world.query::<(&mut Health, &mut MonsterBrain, &Transform)>();
        let (mut health, mut brain, transform) = query.get_mut(&mut self.world, entity).ok()?;
        let outcome = self.combat.apply_damage(&mut self.rng, &mut health, &mut brain, amount);
        brain.settle();
        let position = transform.position;
        match outcome {
            DamageOutcome::Ignored => {}
            DamageOutcome::Damaged { .. } => self.events.push(SimEvent::MonsterDamaged {
                id,
                amount,
                is_crit: false,
                position,
                skill: None,
            }),
            DamageOutcome::Killed => {
                self.events.push(SimEvent::MonsterDamaged {
                    id,
                    amount,
                    is_crit: false,
                    position,
                    skill: None,
                });
                self.events.push(SimEvent::MonsterKilled { id, position });
            }
        }
        Some(outcome)
    }

    /// Spawn a configured monster type at an exact spot.
    pub fn spawn_monster_at(&mut self, kind: &str, position: Vec2) -> Option<MonsterId> {
        let ctx = SpawnContext {
            region: &self.region,
            combat: &self.combat,
            ai: &self.ai,
        };
        let spawned = self
            .spawner
            .spawn_at(&mut self.world, &ctx, &mut self.rng, kind, position)?;
        let id = spawned.id;
        self.record_spawns(vec![spawned]);
        Some(id)
    }

    pub fn snapshot(&mut self) -> FrameSnapshot {
        let mut query = self
            .world
            .query::<(&Monster, &Transform, &Body, &Health, &MonsterBrain)>();
        let mut monsters: Vec<MonsterSnapshot> = query
            .iter(&self.world)
            .map(|(monster, transform, body, health, brain)| MonsterSnapshot {
                id: monster.id,
                kind: monster.kind.clone(),
                position: transform.position,
                facing: body.facing,
                moving: body.moving,
                state: brain.state_label(),
                hp: health.hp,
                max_hp: health.max_hp,
            })
            .collect();
        monsters.sort_by_key(|m| m.id);

        let player = &self.player;
        FrameSnapshot {
            frame: self.frame,
            elapsed: self.elapsed,
            player: PlayerSnapshot {
                position: player.position(),
                facing: player.body.facing,
                moving: player.body.moving,
                hp: player.health.hp,
                max_hp: player.health.max_hp,
                active_skill: player.active_skill().cloned(),
                attacking: player.is_attacking(),
                defeated: player.is_defeated(),
            },
            monsters,
        }
    }

    /// Events raised since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every monster in the roster, including dying ones.
    pub fn monster_count(&mut self) -> usize {
        let mut query = self.world.query::<&Monster>();
        query.iter(&self.world).count()
    }

    pub fn living_monster_count(&mut self) -> usize {
        SpawnDirector::living_count(&mut self.world)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Direct access for hosts that teleport or heal the player.
    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn region(&self) -> &NavigableRegion {
        &self.region
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combat::CombatTunables;
    use crate::engine::navigation::{Boundary, RegionData};
    use crate::engine::spawn::{MonsterTypeConfig, SpawnConfig};
    use crate::engine::components::MonsterStats;

    fn config(target_count: usize) -> SimulationConfig {
        let mut config = SimulationConfig {
            seed: Some(3),
            region: Some(RegionData::rectangle(Boundary::new(0.0, 1200.0, 0.0, 1200.0).unwrap())),
            spawn: Some(SpawnConfig {
                target_count,
                monster_types: vec![MonsterTypeConfig {
                    id: "slime".into(),
                    max_hp: 100,
                    speed: 60.0,
                    half_extents: Vec2::splat(12.0),
                    foot_offset: Vec2::ZERO,
                    walk_buffer: 0.0,
                    stats: MonsterStats {
                        strength: 10.0,
                        ..MonsterStats::default()
                    },
                    weight: 1.0,
                }],
                ..SpawnConfig::default()
            }),
            ..SimulationConfig::default()
        };
        config.player.spawn_position = Some(Vec2::new(100.0, 100.0));
        config
    }

    #[test]
    fn invalid_dt_is_ignored_and_long_frames_clamped() {
        let mut sim = Simulation::with_default_loot(config(0)).unwrap();
        sim.update(f32::NAN, &FrameInput::idle());
        sim.update(-1.0, &FrameInput::idle());
        assert_eq!(sim.elapsed(), 0.0);
        sim.update(5.0, &FrameInput::idle());
        assert!((sim.elapsed() - 0.1).abs() < 1e-6);
        assert_eq!(sim.frame(), 3);
    }

    #[test]
    fn player_walks_and_stops_at_boundary() {
        let mut sim = Simulation::with_default_loot(config(0)).unwrap();
        for _ in 0..10 {
            sim.update(0.05, &FrameInput::moving(Vec2::X));
        }
        assert!((sim.player().position().x - 200.0).abs() < 1e-3);

        for _ in 0..200 {
            sim.update(0.05, &FrameInput::moving(Vec2::NEG_Y));
        }
        let p = sim.player().position();
        assert!(p.is_finite());
        assert!(sim.region().is_walkable(p + Vec2::new(0.0, 16.0), 4.0));
    }

    #[test]
    fn basic_attack_damages_monster_in_reach() {
        let mut sim = Simulation::with_default_loot(config(0)).unwrap();
        let id = sim.spawn_monster_at("slime", Vec2::new(100.0, 150.0)).unwrap();
        sim.drain_events();

        sim.update(0.016, &FrameInput::idle().with_attack());
        let events = sim.drain_events();
        let damage = events.iter().find_map(|e| match e {
            SimEvent::MonsterDamaged { id: hit, amount, skill, .. } if *hit == id => {
                Some((*amount, skill.clone()))
            }
            _ => None,
        });
        let (amount, skill) = damage.expect("monster in reach was not hit");
        assert!(amount >= 18);
        assert_eq!(skill, Some(SkillId::new("basic_attack")));

        let snap = sim.snapshot();
        let monster = snap.monster(id).unwrap();
        assert_eq!(monster.hp, 100 - amount);
        assert!(monster.state == "hit_stun" || monster.state == "counter_attack");
        // knocked straight down, away from the player
        assert!(monster.position.y > 150.0);
        assert!(snap.player.attacking);
    }

    #[test]
    fn dash_moves_along_facing_without_hitting() {
        let mut sim = Simulation::with_default_loot(config(0)).unwrap();
        let id = sim.spawn_monster_at("slime", Vec2::new(130.0, 100.0)).unwrap();
        sim.drain_events();

        sim.update(0.016, &FrameInput::moving(Vec2::X).with_skill("dash"));
        assert!(sim.player().is_dashing());
        // 600 units/s for one frame
        assert!(sim.player().position().x > 109.0);
        assert!(
            !sim.drain_events()
                .iter()
                .any(|e| matches!(e, SimEvent::MonsterDamaged { .. }))
        );
        assert_eq!(sim.snapshot().monster(id).unwrap().hp, 100);
    }

    #[test]
    fn counter_attack_hits_player_once_per_window() {
        let mut config = config(0);
        config.combat = CombatTunables {
            counter_chance: 1.0,
            ..CombatTunables::default()
        };
        let mut sim = Simulation::with_default_loot(config).unwrap();
        let id = sim.spawn_monster_at("slime", Vec2::new(100.0, 140.0)).unwrap();
        assert!(matches!(
            sim.apply_damage_to_monster(id, 10),
            Some(DamageOutcome::Damaged { counter_triggered: true })
        ));
        sim.drain_events();

        for _ in 0..10 {
            sim.update(0.016, &FrameInput::idle());
        }
        let hits: Vec<u32> = sim
            .drain_events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::PlayerDamaged { amount, source, .. } if *source == id => Some(*amount),
                _ => None,
            })
            .collect();
        assert_eq!(hits, vec![15]);
        assert_eq!(sim.player().health.hp, 85);
    }

    #[test]
    fn unknown_monster_id_is_none() {
        let mut sim = Simulation::with_default_loot(config(0)).unwrap();
        assert_eq!(sim.apply_damage_to_monster(MonsterId(99), 5), None);
    }
}
