//! 短视频淡化引擎

use crate::api::models::fade::{AppliedFade, HostVideo, HostVideoFrame};
use crate::core::config::{ConfigError, FadeSettings, MemoryConfigStore};
use crate::core::fade::{EngineStats, FadeEngine, DEFAULT_PLAYBACK_RATE};
use crate::core::scheduler::tick_period;
use crate::core::telemetry::FadeEventCounter;
use flutter_rust_bridge::frb;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FadeApiError {
    #[error("Invalid settings document: {0}")]
    Config(#[from] ConfigError),
    #[error("Sensitivity must be within 0-100, got {0}")]
    Sensitivity(i32),
    #[error("Fade time must be at least one second")]
    FadeTime,
}

/// 淡化引擎 - 宿主以 5Hz 调用 `tick`，把返回的属性写回视频元素
///
/// ```dart
/// final fade = NeuroFade.create(settingsJson5: null);
/// final applied = fade.tick(frame: snapshot);
/// video.style.filter = applied.filter;
/// ```
#[frb(opaque)]
pub struct NeuroFade {
    store: Arc<MemoryConfigStore>,
    counter: FadeEventCounter,
    engine: Mutex<FadeEngine<HostVideo>>,
}

impl NeuroFade {
    /// 创建引擎，可选的 JSON5 文档作为已保存的设置
    #[frb(sync)]
    pub fn create(settings_json5: Option<String>) -> Result<Self, FadeApiError> {
        let store = match settings_json5 {
            Some(document) => MemoryConfigStore::from_json5(&document)?,
            None => MemoryConfigStore::new(),
        };
        store.install_defaults();
        let store = Arc::new(store);

        let engine = FadeEngine::with_store(store.as_ref())
            .with_telemetry(Box::new(FadeEventCounter::new(store.clone())));
        info!("🎬 NeuroFade: created");

        Ok(Self {
            counter: FadeEventCounter::new(store.clone()),
            store,
            engine: Mutex::new(engine),
        })
    }

    /// 推进一个 tick，`frame` 为空表示当前页面没有符合条件的视频
    #[frb(sync)]
    pub fn tick(&self, frame: Option<HostVideoFrame>) -> AppliedFade {
        let mut engine = self.lock_engine();
        let dt_ms = tick_period().as_secs_f64() * 1000.0;
        engine.tick(frame.map(HostVideo::new), dt_ms);
        collect_applied(&engine)
    }

    /// 清零淡化并返回默认属性
    #[frb(sync)]
    pub fn reset(&self) -> AppliedFade {
        let mut engine = self.lock_engine();
        engine.reset();
        let video_id = collect_applied(&engine).video_id;
        AppliedFade {
            video_id,
            filter: Some(String::new()),
            playback_rate: Some(DEFAULT_PLAYBACK_RATE),
            preserves_pitch: Some(true),
            fade_level: engine.fade_level(),
        }
    }

    #[frb(sync, getter)]
    pub fn settings(&self) -> FadeSettings {
        FadeSettings::load(self.store.as_ref())
    }

    /// 写入存储，引擎在下一个 tick 开始时生效
    #[frb(sync)]
    pub fn update_settings(&self, settings: FadeSettings) -> Result<(), FadeApiError> {
        if !(0..=100).contains(&settings.sensitivity) {
            return Err(FadeApiError::Sensitivity(settings.sensitivity));
        }
        if settings.fade_time_secs == 0 {
            return Err(FadeApiError::FadeTime);
        }
        info!("⚙️ NeuroFade: settings updated {:?}", settings);
        settings.save(self.store.as_ref());
        Ok(())
    }

    #[frb(sync, getter)]
    pub fn faded_videos_count(&self) -> u64 {
        self.counter.count()
    }

    #[frb(sync, getter)]
    pub fn fade_level(&self) -> f64 {
        self.lock_engine().fade_level()
    }

    /// 获取运行统计
    #[frb(sync, getter)]
    pub fn stats(&self) -> EngineStats {
        self.lock_engine().stats()
    }

    fn lock_engine(&self) -> MutexGuard<'_, FadeEngine<HostVideo>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NeuroFade {
    fn drop(&mut self) {
        info!("🗑️ NeuroFade: released");
    }
}

/// 引擎写入的目标总是它记住的那个视频（包括空闲 tick 的补写）
fn collect_applied(engine: &FadeEngine<HostVideo>) -> AppliedFade {
    let fade_level = engine.fade_level();
    match engine.current_video() {
        Some(video) => video.take_applied(fade_level),
        None => AppliedFade {
            video_id: None,
            filter: None,
            playback_rate: None,
            preserves_pitch: None,
            fade_level,
        },
    }
}
