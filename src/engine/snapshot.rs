// Read-only view of one frame for presentation (rendering, camera follow,
// minimap, HUD).

use glam::Vec2;
use serde::Serialize;

use super::combat::SkillId;
use super::components::{Facing, MonsterId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub position: Vec2,
    pub facing: Facing,
    pub moving: bool,
    pub hp: u32,
    pub max_hp: u32,
    pub active_skill: Option<SkillId>,
    pub attacking: bool,
    pub defeated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonsterSnapshot {
    #[serde(serialize_with = "serialize_id")]
    pub id: MonsterId,
    pub kind: String,
    pub position: Vec2,
    pub facing: Facing,
    pub moving: bool,
    /// `idle`, `wander`, `wait`, `return`, `hit_stun`, `counter_attack`,
    /// `dying` or `dead`.
    pub state: &'static str,
    pub hp: u32,
    pub max_hp: u32,
}

fn serialize_id<S: serde::Serializer>(id: &MonsterId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(id.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub elapsed: f64,
    pub player: PlayerSnapshot,
    /// Sorted by id.
    pub monsters: Vec<MonsterSnapshot>,
}

impl FrameSnapshot {
    pub fn monster(&self, id: MonsterId) -> Option<&MonsterSnapshot> {
        self.monsters.iter().find(|m| m.id == id)
    }
}
