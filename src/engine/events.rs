// Events raised during a frame, plus the loot seam.
// The caller drains the queue after each update and forwards entries to
// rendering, HUD text and inventory.

use glam::Vec2;

use super::combat::SkillId;
use super::components::MonsterId;

/// Opaque item-drop token handed back by the loot system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LootHandle(pub u64);

/// Supplies loot for reaped monsters. Called exactly once per reap.
pub trait LootSource {
    fn request_drop(&mut self, monster_kind: &str, position: Vec2) -> LootHandle;
}

/// Hands out sequential handles and remembers nothing else.
#[derive(Debug, Default)]
pub struct SequentialLoot {
    next: u64,
}

impl LootSource for SequentialLoot {
    fn request_drop(&mut self, _monster_kind: &str, _position: Vec2) -> LootHandle {
        self.next += 1;
        LootHandle(self.next)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    MonsterSpawned {
        id: MonsterId,
        kind: String,
        position: Vec2,
    },
    /// Floating combat text request.
    MonsterDamaged {
        id: MonsterId,
        amount: u32,
        is_crit: bool,
        position: Vec2,
        skill: Option<SkillId>,
    },
    PlayerDamaged {
        source: MonsterId,
        amount: u32,
        remaining_hp: u32,
    },
    MonsterKilled {
        id: MonsterId,
        position: Vec2,
    },
    LootDropped {
        id: MonsterId,
        position: Vec2,
        handle: LootHandle,
    },
    PlayerDefeated {
        position: Vec2,
    },
}
