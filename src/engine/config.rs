// Simulation configuration.
//
// One serde document carries every tunable. Each section is handed to the
// component that owns it when the simulation is built; nothing reads
// configuration globally afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ai::AiTunables;
use super::combat::{CombatTunables, HitTest, SkillDefinition, SkillId};
use super::error::ConfigError;
use super::motion::MotionConfig;
use super::navigation::{DEFAULT_CELL_SIZE, RegionData};
use super::player::{PlayerConfig, SkillBook};
use super::separation::SeparationConfig;
use super::spawn::SpawnConfig;

pub const DEFAULT_MAX_FRAME_DT: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// RNG seed. Absent means seeded from entropy.
    pub seed: Option<u64>,
    pub grid_cell_size: f32,
    /// Longer frames are clamped to this.
    pub max_frame_dt: f32,
    pub motion: MotionConfig,
    pub combat: CombatTunables,
    pub ai: AiTunables,
    pub separation: SeparationConfig,
    pub player: PlayerConfig,
    pub skills: Vec<SkillDefinition>,
    pub spawn: Option<SpawnConfig>,
    pub region: Option<RegionData>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            grid_cell_size: DEFAULT_CELL_SIZE,
            max_frame_dt: DEFAULT_MAX_FRAME_DT,
            motion: MotionConfig::default(),
            combat: CombatTunables::default(),
            ai: AiTunables::default(),
            separation: SeparationConfig::default(),
            player: PlayerConfig::default(),
            skills: default_skills(),
            spawn: None,
            region: None,
        }
    }
}

/// Basic attack, a directional thrust and a dash.
pub fn default_skills() -> Vec<SkillDefinition> {
    vec![
        SkillDefinition {
            id: SkillId::new("basic_attack"),
            cooldown: 0.4,
            damage_multiplier: 1.0,
            dash_speed: None,
            range: Some(80.0),
            duration: 0.25,
            hit_test: HitTest::Melee,
        },
        SkillDefinition {
            id: SkillId::new("piercing_thrust"),
            cooldown: 2.0,
            damage_multiplier: 1.8,
            dash_speed: None,
            range: Some(300.0),
            duration: 0.35,
            hit_test: HitTest::Directional,
        },
        SkillDefinition {
            id: SkillId::new("dash"),
            cooldown: 1.5,
            damage_multiplier: 0.0,
            dash_speed: Some(600.0),
            range: None,
            duration: 0.15,
            hit_test: HitTest::Melee,
        },
    ]
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Everything a `Simulation` needs before it can start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = self.region.as_ref().ok_or(ConfigError::MissingRegion)?;
        let spawn = self.spawn.as_ref().ok_or(ConfigError::MissingSpawnConfig)?;

        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.grid_cell_size));
        }
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt > 0.0) {
            return Err(ConfigError::InvalidTunable {
                name: "max_frame_dt",
                reason: "must be finite and positive",
            });
        }
        if let Some(boundary) = &region.boundary {
            boundary.validate()?;
        }

        self.motion.validate()?;
        self.combat.validate()?;
        self.ai.validate()?;
        self.separation.validate()?;
        self.player.validate()?;
        spawn.validate()?;

        let book = SkillBook::new(&self.skills)?;
        if !book.contains(&self.player.basic_skill) {
            return Err(ConfigError::UnknownBasicSkill(self.player.basic_skill.0.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::navigation::Boundary;

    const MINIMAL: &str = r#"{
        "seed": 7,
        "region": { "boundary": { "min_x": 0, "max_x": 800, "min_y": 0, "max_y": 600 } },
        "spawn": {
            "target_count": 2,
            "monster_types": [
                { "id": "slime", "max_hp": 40, "speed": 60, "stats": { "strength": 6 } }
            ]
        }
    }"#;

    #[test]
    fn minimal_json_fills_defaults() {
        let config = SimulationConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.grid_cell_size, DEFAULT_CELL_SIZE);
        assert_eq!(config.combat, CombatTunables::default());
        assert_eq!(config.skills.len(), 3);

        let spawn = config.spawn.unwrap();
        assert_eq!(spawn.respawn_interval, 5.0);
        assert_eq!(spawn.monster_types[0].weight, 1.0);
        assert_eq!(spawn.monster_types[0].stats.strength, 6.0);
        assert_eq!(
            config.region.unwrap().boundary,
            Some(Boundary::new(0.0, 800.0, 0.0, 600.0).unwrap())
        );
    }

    #[test]
    fn missing_sections_are_fatal() {
        assert!(matches!(
            SimulationConfig::default().validate(),
            Err(ConfigError::MissingRegion)
        ));
        let no_spawn = SimulationConfig {
            region: Some(RegionData::rectangle(Boundary::new(0.0, 10.0, 0.0, 10.0).unwrap())),
            ..SimulationConfig::default()
        };
        assert!(matches!(no_spawn.validate(), Err(ConfigError::MissingSpawnConfig)));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(
            SimulationConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));

        let mut config = SimulationConfig::from_json_str(MINIMAL).unwrap();
        config.player.basic_skill = SkillId::new("fireball");
        assert!(matches!(config.validate(), Err(ConfigError::UnknownBasicSkill(id)) if id == "fireball"));

        let mut config = SimulationConfig::from_json_str(MINIMAL).unwrap();
        config.skills[1].cooldown = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSkill { .. })));

        let inverted = MINIMAL.replace("\"max_x\": 800", "\"max_x\": -5");
        assert!(matches!(
            SimulationConfig::from_json_str(&inverted),
            Err(ConfigError::InvalidBoundary { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            SimulationConfig::from_path("/nonexistent/emberfield.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
