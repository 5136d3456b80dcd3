#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use emberfield::engine::components::MonsterStats;
use emberfield::engine::spawn::{MonsterTypeConfig, SpawnConfig};
use emberfield::{Boundary, LootHandle, LootSource, PolygonRing, RegionData, SimulationConfig};
use glam::Vec2;

pub fn monster_type(id: &str, max_hp: u32) -> MonsterTypeConfig {
    MonsterTypeConfig {
        id: id.to_string(),
        max_hp,
        speed: 70.0,
        half_extents: Vec2::new(14.0, 12.0),
        foot_offset: Vec2::new(0.0, 10.0),
        walk_buffer: 4.0,
        stats: MonsterStats {
            strength: 10.0,
            ..MonsterStats::default()
        },
        weight: 1.0,
    }
}

/// Square world of `size` with one walkable ring covering all of it.
pub fn square_world(size: f32, target_count: usize, max_hp: u32) -> SimulationConfig {
    SimulationConfig {
        seed: Some(11),
        region: Some(RegionData {
            walkable: vec![PolygonRing::rect(Vec2::ZERO, Vec2::splat(size))],
            obstacles: Vec::new(),
            boundary: Some(Boundary::new(0.0, size, 0.0, size).unwrap()),
        }),
        spawn: Some(SpawnConfig {
            target_count,
            safe_distance: 500.0,
            monster_types: vec![monster_type("slime", max_hp)],
            ..SpawnConfig::default()
        }),
        ..SimulationConfig::default()
    }
}

/// Loot source that remembers every request.
#[derive(Clone, Default)]
pub struct RecordingLoot {
    pub requests: Rc<RefCell<Vec<(String, Vec2)>>>,
}

impl LootSource for RecordingLoot {
    fn request_drop(&mut self, monster_kind: &str, position: Vec2) -> LootHandle {
        let mut requests = self.requests.borrow_mut();
        requests.push((monster_kind.to_string(), position));
        LootHandle(requests.len() as u64)
    }
}
