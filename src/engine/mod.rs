// Engine module - simulation core for the 2D action world
// Leaf modules first: region index, motion, combat, AI, spawning, then the
// per-frame systems and the orchestrator that sequences them.

pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod motion;
pub mod navigation;
pub mod player;
pub mod region_bake;
pub mod separation;
pub mod simulation;
pub mod snapshot;
pub mod spawn;
pub mod systems;

// Re-export commonly used items
pub use components::*;
pub use config::SimulationConfig;
pub use error::ConfigError;
pub use events::{LootHandle, LootSource, SequentialLoot, SimEvent};
pub use input::FrameInput;
pub use navigation::{Boundary, NavigableRegion, PolygonRing, RegionData};
pub use simulation::Simulation;
pub use snapshot::FrameSnapshot;
