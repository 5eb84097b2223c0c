//! 配置存储 - 键值存储 + 变更通知

use super::{
    ConfigError, ConfigPatch, EngineConfig, DEFAULT_BASE_FADE_TIME_MS, DEFAULT_ENABLED,
    DEFAULT_SENSITIVITY, ENGINE_KEYS, KEY_BASE_FADE_TIME_MS, KEY_ENABLED, KEY_SENSITIVITY,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 单个键的变更，`newValue` 缺失表示键被删除
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

pub type StorageChanges = HashMap<String, StorageChange>;

pub type ChangeListener = Box<dyn Fn(&StorageChanges) + Send + Sync>;

pub trait ConfigStore: Send + Sync {
    /// Missing keys are simply absent from the result.
    fn get(&self, keys: &[&str]) -> HashMap<String, Value>;

    fn set(&self, values: HashMap<String, Value>);

    fn on_change(&self, listener: ChangeListener);
}

/// In-memory store with the same change semantics as the browser's local storage area.
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, Value>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Seeds the store from a JSON5 settings document such as
    /// `{ enabled: true, sensitivity: 70 }`.
    pub fn from_json5(document: &str) -> Result<Self, ConfigError> {
        let parsed: Value = json5::from_str(document)?;
        let Value::Object(map) = parsed else {
            return Err(ConfigError::NotAnObject);
        };

        let store = Self::new();
        store.lock_values().extend(map);
        Ok(store)
    }

    /// 安装时写入默认值，已有的键保持不变
    pub fn install_defaults(&self) {
        let defaults = [
            (KEY_ENABLED, json!(DEFAULT_ENABLED)),
            (KEY_SENSITIVITY, json!(DEFAULT_SENSITIVITY)),
            (KEY_BASE_FADE_TIME_MS, json!(DEFAULT_BASE_FADE_TIME_MS as u64)),
        ];

        let missing: HashMap<String, Value> = {
            let values = self.lock_values();
            defaults
                .into_iter()
                .filter(|(key, _)| !values.contains_key(*key))
                .map(|(key, value)| (key.to_string(), value))
                .collect()
        };

        if !missing.is_empty() {
            info!("📦 Installing {} default setting(s)", missing.len());
            self.set(missing);
        }
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.lock_values().clone()
    }

    fn lock_values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, keys: &[&str]) -> HashMap<String, Value> {
        let values = self.lock_values();
        keys.iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    fn set(&self, values: HashMap<String, Value>) {
        let changes: StorageChanges = {
            let mut current = self.lock_values();
            let mut changes = StorageChanges::new();
            for (key, value) in values {
                let old_value = current.insert(key.clone(), value.clone());
                if old_value.as_ref() != Some(&value) {
                    changes.insert(
                        key,
                        StorageChange {
                            old_value,
                            new_value: Some(value),
                        },
                    );
                }
            }
            changes
        };

        if changes.is_empty() {
            return;
        }

        debug!("Store changed: {:?}", changes.keys().collect::<Vec<_>>());
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&changes);
        }
    }

    fn on_change(&self, listener: ChangeListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

/// 将存储的变更通知转为配置增量，由 tick 循环在每次 tick 前统一应用
pub struct ConfigFeed {
    rx: Receiver<ConfigPatch>,
}

impl ConfigFeed {
    /// Registers on the store, then reads the startup values. Returns the
    /// initial config together with the feed for later changes.
    pub fn subscribe(store: &dyn ConfigStore) -> (EngineConfig, Self) {
        let (tx, rx) = mpsc::channel::<ConfigPatch>();
        store.on_change(Box::new(move |changes: &StorageChanges| {
            let patch = ConfigPatch::from_changes(changes);
            if !patch.is_empty() {
                // receiver gone means the engine was dropped
                let _ = tx.send(patch);
            }
        }));

        let config = EngineConfig::from_stored(&store.get(&ENGINE_KEYS));
        (config, Self { rx })
    }

    /// Applies every pending patch in arrival order. Returns true when the
    /// config changed.
    pub fn apply_pending(&self, config: &mut EngineConfig) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok(patch) => changed |= config.apply_patch(&patch),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changed
    }
}
