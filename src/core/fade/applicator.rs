//! 淡化参数映射与应用
//!
//! 宿主页面会不断重置内联样式和播放速率，所以每个 tick 都要重新写入。

use crate::core::config::EngineConfig;
use serde::{Deserialize, Serialize};

/// 与当前速率差距不超过该值时不再写入，避免触发宿主的 ratechange 处理
pub const RATE_EPSILON: f64 = 0.01;
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeParams {
    pub grayscale_pct: f64,
    pub contrast_pct: f64,
    pub playback_rate: f64,
}

impl FadeParams {
    pub fn identity() -> Self {
        Self {
            grayscale_pct: 0.0,
            contrast_pct: 100.0,
            playback_rate: DEFAULT_PLAYBACK_RATE,
        }
    }

    pub fn for_level(level: f64, config: &EngineConfig) -> Self {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            grayscale_pct: level * config.max_grayscale_pct,
            contrast_pct: 100.0 - level * config.max_contrast_drop_pct,
            playback_rate: DEFAULT_PLAYBACK_RATE
                - level * (DEFAULT_PLAYBACK_RATE - config.min_playback_rate),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn css_filter(&self) -> String {
        format!(
            "grayscale({}%) contrast({}%)",
            self.grayscale_pct, self.contrast_pct
        )
    }
}

/// 宿主视频元素上可写的视觉/音频属性
pub trait VideoSurface {
    /// An empty string clears the filter.
    fn set_filter(&self, filter: &str);

    /// `None` when the live rate is not known; the target rate is then
    /// always written.
    fn playback_rate(&self) -> Option<f64>;

    fn set_playback_rate(&self, rate: f64);

    fn supports_preserves_pitch(&self) -> bool {
        true
    }

    fn set_preserves_pitch(&self, preserve: bool);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyReport {
    pub params: FadeParams,
    pub rate_changed: bool,
}

pub struct FadeApplicator {
    rate_epsilon: f64,
}

impl FadeApplicator {
    pub fn new() -> Self {
        Self {
            rate_epsilon: RATE_EPSILON,
        }
    }

    pub fn apply<S: VideoSurface + ?Sized>(
        &self,
        surface: &S,
        level: f64,
        config: &EngineConfig,
    ) -> ApplyReport {
        let params = FadeParams::for_level(level, config);

        surface.set_filter(&params.css_filter());

        if !params.is_identity() && surface.supports_preserves_pitch() {
            surface.set_preserves_pitch(false);
        }

        let rate_changed = surface
            .playback_rate()
            .map_or(true, |current| (current - params.playback_rate).abs() > self.rate_epsilon);
        if rate_changed {
            surface.set_playback_rate(params.playback_rate);
        }

        ApplyReport {
            params,
            rate_changed,
        }
    }

    pub fn reset<S: VideoSurface + ?Sized>(&self, surface: &S) {
        surface.set_filter("");
        surface.set_playback_rate(DEFAULT_PLAYBACK_RATE);
        if surface.supports_preserves_pitch() {
            surface.set_preserves_pitch(true);
        }
    }
}

impl Default for FadeApplicator {
    fn default() -> Self {
        Self::new()
    }
}
