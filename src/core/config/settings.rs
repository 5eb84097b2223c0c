use super::{
    ConfigStore, DEFAULT_BASE_FADE_TIME_MS, DEFAULT_ENABLED, DEFAULT_SENSITIVITY, ENGINE_KEYS,
    KEY_BASE_FADE_TIME_MS, KEY_ENABLED, KEY_SENSITIVITY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// 设置面板看到的配置，淡化时长以整秒展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeSettings {
    pub enabled: bool,
    pub sensitivity: i32,
    pub fade_time_secs: u32,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            sensitivity: DEFAULT_SENSITIVITY,
            fade_time_secs: (DEFAULT_BASE_FADE_TIME_MS / 1000.0) as u32,
        }
    }
}

impl FadeSettings {
    pub fn load(store: &dyn ConfigStore) -> Self {
        Self::from_values(&store.get(&ENGINE_KEYS))
    }

    pub fn from_values(values: &HashMap<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: values
                .get(KEY_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enabled),
            sensitivity: values
                .get(KEY_SENSITIVITY)
                .and_then(Value::as_f64)
                .map(|v| v.round() as i32)
                .unwrap_or(defaults.sensitivity),
            fade_time_secs: values
                .get(KEY_BASE_FADE_TIME_MS)
                .and_then(Value::as_f64)
                .filter(|ms| *ms > 0.0)
                .map(|ms| (ms / 1000.0).round() as u32)
                .unwrap_or(defaults.fade_time_secs),
        }
    }

    pub fn to_values(&self) -> HashMap<String, Value> {
        HashMap::from([
            (KEY_ENABLED.to_string(), json!(self.enabled)),
            (KEY_SENSITIVITY.to_string(), json!(self.sensitivity)),
            (
                KEY_BASE_FADE_TIME_MS.to_string(),
                json!(u64::from(self.fade_time_secs) * 1000),
            ),
        ])
    }

    pub fn save(&self, store: &dyn ConfigStore) {
        store.set(self.to_values());
    }
}
