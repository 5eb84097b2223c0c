//! 引擎配置
//!
//! 配置存储中只有三个键由用户写入（`enabled` / `sensitivity` / `baseFadeTimeMs`），
//! 其余视觉上限为固定常量。每个键独立解析，缺失或类型错误只影响该键本身。

pub mod error;
pub mod settings;
pub mod store;

pub use error::ConfigError;
pub use settings::FadeSettings;
pub use store::{ConfigFeed, ConfigStore, MemoryConfigStore, StorageChange, StorageChanges};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_SENSITIVITY: &str = "sensitivity";
pub const KEY_BASE_FADE_TIME_MS: &str = "baseFadeTimeMs";
pub const KEY_FADED_VIDEOS_COUNT: &str = "fadedVideosCount";

/// Keys the engine reads at startup and listens to afterwards.
pub const ENGINE_KEYS: [&str; 3] = [KEY_ENABLED, KEY_SENSITIVITY, KEY_BASE_FADE_TIME_MS];

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_SENSITIVITY: i32 = 50;
pub const DEFAULT_BASE_FADE_TIME_MS: f64 = 30_000.0;
pub const DEFAULT_MAX_GRAYSCALE_PCT: f64 = 100.0;
pub const DEFAULT_MAX_CONTRAST_DROP_PCT: f64 = 30.0;
pub const DEFAULT_MIN_PLAYBACK_RATE: f64 = 0.5;

/// Sensitivity at which stimulation is counted as measured.
pub const NEUTRAL_SENSITIVITY: f64 = 50.0;

/// 0 关闭刺激贡献，50 为 1 倍，100 翻倍；超出范围时按比例外推
pub fn sensitivity_multiplier(sensitivity: i32) -> f64 {
    sensitivity as f64 / NEUTRAL_SENSITIVITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub enabled: bool,
    /// 0-100，50 为中性，0 关闭刺激贡献，100 翻倍
    pub sensitivity: i32,
    pub max_grayscale_pct: f64,
    /// 100 - 该值 = 完全淡化时的对比度
    pub max_contrast_drop_pct: f64,
    /// (0, 1]
    pub min_playback_rate: f64,
    /// 纯时间驱动下达到完全淡化所需的播放时长
    pub base_fade_time_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            sensitivity: DEFAULT_SENSITIVITY,
            max_grayscale_pct: DEFAULT_MAX_GRAYSCALE_PCT,
            max_contrast_drop_pct: DEFAULT_MAX_CONTRAST_DROP_PCT,
            min_playback_rate: DEFAULT_MIN_PLAYBACK_RATE,
            base_fade_time_ms: DEFAULT_BASE_FADE_TIME_MS,
        }
    }
}

impl EngineConfig {
    /// Builds a config from the values returned by `ConfigStore::get`,
    /// falling back to the default of each key that is missing or unusable.
    pub fn from_stored(values: &HashMap<String, Value>) -> Self {
        let mut config = Self::default();
        config.apply_patch(&ConfigPatch::from_values(
            values.iter().map(|(key, value)| (key.as_str(), value)),
        ));
        config
    }

    /// Returns true when any field actually changed.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> bool {
        let before = self.clone();

        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(sensitivity) = patch.sensitivity {
            self.sensitivity = sensitivity;
        }
        if let Some(base_fade_time_ms) = patch.base_fade_time_ms {
            self.base_fade_time_ms = base_fade_time_ms;
        }

        *self != before
    }
}

/// 字段级配置增量，来自存储的变更通知
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub sensitivity: Option<i32>,
    pub base_fade_time_ms: Option<f64>,
}

impl ConfigPatch {
    pub fn from_values<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut patch = Self::default();
        for (key, value) in entries {
            match key {
                KEY_ENABLED => patch.enabled = parse_enabled(value),
                KEY_SENSITIVITY => patch.sensitivity = parse_sensitivity(value),
                KEY_BASE_FADE_TIME_MS => patch.base_fade_time_ms = parse_base_fade_time(value),
                _ => {}
            }
        }
        patch
    }

    /// Keys removed from the store (no `newValue`) leave the current value in place.
    pub fn from_changes(changes: &StorageChanges) -> Self {
        Self::from_values(changes.iter().filter_map(|(key, change)| {
            change.new_value.as_ref().map(|value| (key.as_str(), value))
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.sensitivity.is_none() && self.base_fade_time_ms.is_none()
    }
}

fn parse_enabled(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(enabled) => Some(*enabled),
        other => {
            warn!("⚠️ Ignoring non-boolean {}: {}", KEY_ENABLED, other);
            None
        }
    }
}

fn parse_sensitivity(value: &Value) -> Option<i32> {
    match value {
        Value::Null => None,
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Some(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            } else {
                n.as_f64()
                    .map(|v| v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
            }
        }
        other => {
            warn!("⚠️ Ignoring non-numeric {}: {}", KEY_SENSITIVITY, other);
            None
        }
    }
}

fn parse_base_fade_time(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => match n.as_f64() {
            Some(ms) if ms.is_finite() && ms > 0.0 => Some(ms),
            _ => {
                warn!("⚠️ Ignoring non-positive {}: {}", KEY_BASE_FADE_TIME_MS, n);
                None
            }
        },
        other => {
            warn!("⚠️ Ignoring non-numeric {}: {}", KEY_BASE_FADE_TIME_MS, other);
            None
        }
    }
}
