pub mod accumulator;
pub mod applicator;
pub mod engine;
pub mod runner;

pub use accumulator::{EngagementState, FadeAccumulator, TickOutcome};
pub use applicator::{ApplyReport, FadeApplicator, FadeParams, VideoSurface, DEFAULT_PLAYBACK_RATE};
pub use engine::{EngineStats, FadeEngine, TickReport};
pub use runner::spawn_engine;
