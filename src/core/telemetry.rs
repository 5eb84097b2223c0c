//! 淡化事件上报（无确认、无投递保证）

use crate::core::config::{ConfigStore, KEY_FADED_VIDEOS_COUNT};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    #[serde(rename = "FADE_EVENT")]
    FadeEvent,
}

pub trait TelemetrySink: Send {
    fn emit(&self, event: EngineEvent);
}

pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: EngineEvent) {}
}

/// Forwards events to another thread; a dropped receiver silently discards them.
pub struct ChannelTelemetry {
    tx: Sender<EngineEvent>,
}

impl ChannelTelemetry {
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// 在配置存储中累计被淡化的视频数
pub struct FadeEventCounter {
    store: Arc<dyn ConfigStore>,
}

impl FadeEventCounter {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn count(&self) -> u64 {
        read_count(&self.store.get(&[KEY_FADED_VIDEOS_COUNT]))
    }
}

impl TelemetrySink for FadeEventCounter {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::FadeEvent => {
                let count = self.count() + 1;
                debug!("Faded videos: {}", count);
                self.store.set(HashMap::from([(
                    KEY_FADED_VIDEOS_COUNT.to_string(),
                    json!(count),
                )]));
            }
        }
    }
}

fn read_count(values: &HashMap<String, Value>) -> u64 {
    values
        .get(KEY_FADED_VIDEOS_COUNT)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}
