pub mod error;
pub mod frame;
pub mod handle;
pub mod sampler;
pub mod selector;
pub mod stimulation;

pub use error::CaptureError;
pub use frame::{Frame, FrameSample, SAMPLE_HEIGHT, SAMPLE_WIDTH};
pub use handle::{PlaybackState, VideoHandle};
pub use sampler::{FrameSampler, FrameSource};
pub use selector::{PageContext, Rect, ShortVideoSelector, VideoCandidate, VideoSelector};
pub use stimulation::{Activity, Estimate, StimulationEstimator};
