// Emberfield - frame-driven simulation core for a 2D open-world action game.
// The host owns rendering, input devices and loot tables; this crate owns
// where everything is and what happens to it each frame.

pub mod engine;

pub use engine::{
    Boundary, ConfigError, FrameInput, FrameSnapshot, LootHandle, LootSource, NavigableRegion,
    PolygonRing, RegionData, SequentialLoot, SimEvent, Simulation, SimulationConfig,
};
