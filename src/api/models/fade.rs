use crate::core::fade::VideoSurface;
use crate::core::video::{CaptureError, FrameSample, FrameSource, PlaybackState, VideoHandle};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 宿主在每个 tick 传入的视频元素快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostVideoFrame {
    /// 宿主侧元素标识，同一个元素在不同 tick 之间保持不变
    pub id: String,
    pub src: Option<String>,
    pub paused: bool,
    pub ended: bool,
    pub playback_rate: f64,
    /// RGBA8，`width * height * 4` 字节
    pub rgba: Option<Vec<u8>>,
    /// 相机/解码器直出的亮度平面，`width * height` 字节
    pub y_plane: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// 宿主本次需要写回视频元素的属性，`None` 表示保持不变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFade {
    /// 目标元素；空闲 tick 时是上一次的视频
    pub video_id: Option<String>,
    pub filter: Option<String>,
    pub playback_rate: Option<f64>,
    pub preserves_pitch: Option<bool>,
    pub fade_level: f64,
}

#[derive(Debug, Default)]
struct SurfaceWrites {
    filter: Option<String>,
    playback_rate: Option<f64>,
    preserves_pitch: Option<bool>,
}

struct HostVideoInner {
    frame: HostVideoFrame,
    /// 快照中的速率或本 tick 写入的速率；写入被取走后宿主可能已重置，视为未知
    rate: Option<f64>,
    writes: SurfaceWrites,
}

/// 引擎看到的视频句柄：读取快照，记录写入，由桥接层在 tick 结束后取走
#[derive(Clone)]
pub struct HostVideo {
    inner: Arc<Mutex<HostVideoInner>>,
}

impl HostVideo {
    pub fn new(frame: HostVideoFrame) -> Self {
        let rate = Some(frame.playback_rate).filter(|r| r.is_finite());
        Self {
            inner: Arc::new(Mutex::new(HostVideoInner {
                frame,
                rate,
                writes: SurfaceWrites::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostVideoInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().frame.id.clone()
    }

    /// Drains the writes recorded since the last call.
    pub fn take_applied(&self, fade_level: f64) -> AppliedFade {
        let mut inner = self.lock();
        let writes = std::mem::take(&mut inner.writes);
        inner.rate = None;
        AppliedFade {
            video_id: Some(inner.frame.id.clone()),
            filter: writes.filter,
            playback_rate: writes.playback_rate,
            preserves_pitch: writes.preserves_pitch,
            fade_level,
        }
    }
}

impl VideoHandle for HostVideo {
    fn same_element(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.id() == other.id()
    }

    fn current_src(&self) -> Option<String> {
        self.lock().frame.src.clone()
    }

    fn playback_state(&self) -> PlaybackState {
        let inner = self.lock();
        if inner.frame.ended {
            PlaybackState::Ended
        } else if inner.frame.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }
}

impl FrameSource for HostVideo {
    fn draw_frame(
        &self,
        width: u32,
        height: u32,
        rgba: &mut Vec<u8>,
    ) -> Result<(u32, u32), CaptureError> {
        let inner = self.lock();
        let frame = &inner.frame;
        if frame.width == 0 || frame.height == 0 {
            return Err(CaptureError::ZeroDimension {
                width: frame.width,
                height: frame.height,
            });
        }

        if let Some(data) = &frame.rgba {
            rgba.extend_from_slice(data);
            return Ok((frame.width, frame.height));
        }

        // 亮度平面先按块下采样，再展开成灰度 RGBA
        let y_plane = frame.y_plane.as_deref().ok_or(CaptureError::NotDecoded)?;
        let sample = FrameSample::from_y_plane(y_plane, frame.width, frame.height, width, height)?;
        rgba.reserve(sample.luma().len() * 4);
        for &y in sample.luma() {
            let v = y.round().clamp(0.0, 255.0) as u8;
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
        Ok((width, height))
    }
}

impl VideoSurface for HostVideo {
    fn set_filter(&self, filter: &str) {
        self.lock().writes.filter = Some(filter.to_string());
    }

    fn playback_rate(&self) -> Option<f64> {
        self.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut inner = self.lock();
        inner.rate = Some(rate);
        inner.writes.playback_rate = Some(rate);
    }

    fn set_preserves_pitch(&self, preserve: bool) {
        self.lock().writes.preserves_pitch = Some(preserve);
    }
}
