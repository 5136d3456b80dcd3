// Headless demo: builds an arena, plays a scripted session and logs what
// happened. Pass a JSON config path to run your own world instead.
//
//   RUST_LOG=debug cargo run -- arena.json

use std::process::ExitCode;

use emberfield::engine::components::MonsterStats;
use emberfield::engine::region_bake::{PixelClass, RasterMask, bake_region};
use emberfield::engine::spawn::{MonsterTypeConfig, SpawnConfig};
use emberfield::{FrameInput, SimEvent, Simulation, SimulationConfig};
use glam::Vec2;

const FRAME_DT: f32 = 1.0 / 60.0;
const SESSION_SECONDS: f32 = 60.0;

// ============================================================================
// BUILT-IN ARENA
// ============================================================================

/// 1600x1200 elliptical clearing with three boulders, baked from a raster.
fn default_config() -> SimulationConfig {
    let pixel = 20.0;
    let (w, h) = (80u32, 60u32);
    let center = Vec2::new(w as f32, h as f32) * 0.5;
    let boulders = [Vec2::new(25.0, 20.0), Vec2::new(55.0, 38.0), Vec2::new(40.0, 45.0)];

    let mask = RasterMask::from_fn(w, h, Vec2::ZERO, pixel, |x, y| {
        let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
        let d = (p - center) / (center - Vec2::splat(2.0));
        if d.length_squared() > 1.0 {
            PixelClass::Other
        } else if boulders.iter().any(|b| b.distance(p) < 3.5) {
            PixelClass::Obstacle
        } else {
            PixelClass::Walkable
        }
    });

    let monster = |id: &str, max_hp, speed, strength, weight| MonsterTypeConfig {
        id: id.to_string(),
        max_hp,
        speed,
        half_extents: Vec2::new(14.0, 12.0),
        foot_offset: Vec2::new(0.0, 10.0),
        walk_buffer: 4.0,
        stats: MonsterStats {
            strength,
            ..MonsterStats::default()
        },
        weight,
    };

    SimulationConfig {
        seed: Some(2024),
        region: Some(bake_region(&mask, pixel * 1.5)),
        spawn: Some(SpawnConfig {
            target_count: 8,
            safe_distance: 300.0,
            monster_types: vec![
                monster("slime", 40, 50.0, 6.0, 3.0),
                monster("boar", 90, 80.0, 12.0, 1.0),
            ],
            ..SpawnConfig::default()
        }),
        ..SimulationConfig::default()
    }
}

// ============================================================================
// SCRIPTED SESSION
// ============================================================================

/// Walk a slow square, swing constantly and dash now and then.
fn scripted_input(t: f32) -> FrameInput {
    let leg = (t / 2.5) as u32 % 4;
    let dir = match leg {
        0 => Vec2::X,
        1 => Vec2::Y,
        2 => Vec2::NEG_X,
        _ => Vec2::NEG_Y,
    };
    let mut input = FrameInput::moving(dir).with_attack();
    if (t % 7.0) < FRAME_DT {
        input = input.with_skill("dash");
    } else if (t % 4.0) < FRAME_DT {
        input = input.with_skill("piercing_thrust");
    }
    input
}

#[derive(Debug, Default)]
struct Tally {
    spawned: usize,
    hits: usize,
    crits: usize,
    kills: usize,
    loot: usize,
    damage_taken: u32,
    defeated: bool,
}

impl Tally {
    fn record(&mut self, event: &SimEvent) {
        match event {
            SimEvent::MonsterSpawned { .. } => self.spawned += 1,
            SimEvent::MonsterDamaged { is_crit, .. } => {
                self.hits += 1;
                self.crits += usize::from(*is_crit);
            }
            SimEvent::MonsterKilled { .. } => self.kills += 1,
            SimEvent::LootDropped { handle, position, .. } => {
                self.loot += 1;
                log::debug!("loot {:?} dropped at {:?}", handle, position);
            }
            SimEvent::PlayerDamaged { amount, .. } => self.damage_taken += amount,
            SimEvent::PlayerDefeated { .. } => self.defeated = true,
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> ExitCode {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match SimulationConfig::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => default_config(),
    };

    let mut sim = match Simulation::with_default_loot(config) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("cannot start simulation: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut tally = Tally::default();
    let frames = (SESSION_SECONDS / FRAME_DT) as u32;
    for frame in 0..frames {
        let t = frame as f32 * FRAME_DT;
        sim.update(FRAME_DT, &scripted_input(t));
        for event in sim.drain_events() {
            tally.record(&event);
        }
        if frame % 600 == 0 {
            let snap = sim.snapshot();
            log::info!(
                "t={:>5.1}s player {:?} hp {}/{} | monsters {}",
                snap.elapsed,
                snap.player.position,
                snap.player.hp,
                snap.player.max_hp,
                snap.monsters.len()
            );
        }
        if tally.defeated {
            log::info!("player defeated at t={:.1}s", sim.elapsed());
            break;
        }
    }

    let snap = sim.snapshot();
    println!(
        "{} frames | spawned {} | hits {} ({} crit) | kills {} | loot {} | damage taken {} | hp {}/{} | monsters alive {}",
        snap.frame,
        tally.spawned,
        tally.hits,
        tally.crits,
        tally.kills,
        tally.loot,
        tally.damage_taken,
        snap.player.hp,
        snap.player.max_hp,
        sim.living_monster_count()
    );
    ExitCode::SUCCESS
}
