use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Video has zero dimension: {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("Frame not decoded yet")]
    NotDecoded,
    #[error("Frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
    #[error("Host capture failed: {0}")]
    Host(String),
}
