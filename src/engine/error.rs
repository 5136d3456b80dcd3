// Configuration errors.
//
// Everything here is raised while a simulation is being built. Once a
// `Simulation` exists, `update()` handles numeric and placement problems
// internally and never returns an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no region data was supplied")]
    MissingRegion,

    #[error("no spawn configuration was supplied")]
    MissingSpawnConfig,

    /// Neither a boundary nor any usable walkable ring was given.
    #[error("region has no boundary and no usable walkable rings")]
    EmptyRegion,

    #[error("invalid boundary [{min_x}, {max_x}] x [{min_y}, {max_y}]")]
    InvalidBoundary {
        min_x: f32,
        max_x: f32,
        min_y: f32,
        max_y: f32,
    },

    #[error("grid cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),

    #[error("skill `{id}`: {reason}")]
    InvalidSkill { id: String, reason: &'static str },

    #[error("skill `{0}` is defined more than once")]
    DuplicateSkill(String),

    #[error("basic attack skill `{0}` is not defined")]
    UnknownBasicSkill(String),

    #[error("monster type `{id}`: {reason}")]
    InvalidMonsterType { id: String, reason: &'static str },

    #[error("spawn config: {0}")]
    InvalidSpawnConfig(&'static str),

    #[error("invalid tunable `{name}`: {reason}")]
    InvalidTunable {
        name: &'static str,
        reason: &'static str,
    },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
