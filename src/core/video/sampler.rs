use super::error::CaptureError;
use super::frame::{check_rgba, Frame, FrameSample, SAMPLE_HEIGHT, SAMPLE_WIDTH};
use super::handle::PlaybackState;
use log::debug;

/// 宿主侧的帧抓取接口
pub trait FrameSource {
    /// Draws the current frame as RGBA into `rgba`, ideally already scaled to
    /// `width`x`height`. Returns the dimensions actually written; the sampler
    /// rescales when they differ.
    fn draw_frame(
        &self,
        width: u32,
        height: u32,
        rgba: &mut Vec<u8>,
    ) -> Result<(u32, u32), CaptureError>;
}

/// 固定分辨率采样器，复用同一个抓取缓冲区
pub struct FrameSampler {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    captured: u64,
    failed: u64,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::with_resolution(SAMPLE_WIDTH, SAMPLE_HEIGHT)
    }

    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            buffer: Vec::with_capacity((width.max(1) * height.max(1) * 4) as usize),
            captured: 0,
            failed: 0,
        }
    }

    /// Returns `None` for paused, ended or disabled playback and for failed
    /// captures; static or absent content never produces a sample.
    pub fn capture<S: FrameSource + ?Sized>(
        &mut self,
        source: &S,
        state: PlaybackState,
        enabled: bool,
    ) -> Option<FrameSample> {
        if !enabled || state != PlaybackState::Playing {
            return None;
        }

        match self.try_capture(source) {
            Ok(sample) => {
                self.captured += 1;
                Some(sample)
            }
            Err(e) => {
                self.failed += 1;
                debug!("Frame capture skipped: {}", e);
                None
            }
        }
    }

    fn try_capture<S: FrameSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<FrameSample, CaptureError> {
        self.buffer.clear();
        let (width, height) = source.draw_frame(self.width, self.height, &mut self.buffer)?;

        if width == self.width && height == self.height {
            return FrameSample::from_rgba(width, height, &self.buffer);
        }

        // 先校验再交出缓冲区，坏帧不会让复用的缓冲区丢失容量
        check_rgba(width, height, &self.buffer)?;
        let frame = Frame::new(width, height, std::mem::take(&mut self.buffer))?;
        let resized = frame.resize_to(self.width, self.height);
        self.buffer = frame.data;
        FrameSample::from_frame(&resized?)
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn captured_count(&self) -> u64 {
        self.captured
    }

    pub fn failed_count(&self) -> u64 {
        self.failed
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}
