//! 淡化引擎 - 每个 tick 依次执行 采样 → 估计 → 累加 → 应用
//!
//! 引擎独占参与状态和上一帧缓存，配置变更在 tick 开始时统一应用。

use super::accumulator::{EngagementState, FadeAccumulator, TickOutcome};
use super::applicator::{ApplyReport, FadeApplicator, FadeParams, VideoSurface};
use crate::core::config::{ConfigFeed, ConfigPatch, ConfigStore, EngineConfig};
use crate::core::telemetry::{EngineEvent, NoopTelemetry, TelemetrySink};
use crate::core::video::{
    Estimate, FrameSampler, FrameSource, PageContext, StimulationEstimator, VideoHandle,
    VideoSelector,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickReport {
    /// Disabled or no qualifying video. `reapplied` is true when the last
    /// known video had its fade re-asserted.
    Idle { reapplied: bool },
    Active {
        swapped: bool,
        playing: bool,
        estimate: Option<Estimate>,
        outcome: TickOutcome,
        apply: ApplyReport,
    },
}

/// 引擎运行统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub fade_level: f64,
    pub saturated: bool,
    pub playing_ticks: u64,
    pub captured_frames: u64,
    pub failed_captures: u64,
    pub scene_cuts: u64,
    pub has_baseline: bool,
    pub sample_width: u32,
    pub sample_height: u32,
}

pub struct FadeEngine<H> {
    config: EngineConfig,
    feed: Option<ConfigFeed>,
    sampler: FrameSampler,
    estimator: StimulationEstimator,
    accumulator: FadeAccumulator,
    applicator: FadeApplicator,
    telemetry: Box<dyn TelemetrySink>,
    current: Option<H>,
    /// 句柄指向同一个元素时，换源只能靠上次记录的 src 发现
    current_src: Option<String>,
    /// 当前视频是否已上报过 FADE_EVENT
    announced: bool,
}

impl<H> FadeEngine<H>
where
    H: VideoHandle + FrameSource + VideoSurface,
{
    pub fn new(config: EngineConfig) -> Self {
        info!(
            "🎬 FadeEngine: created (enabled={}, sensitivity={}, base fade {}ms)",
            config.enabled, config.sensitivity, config.base_fade_time_ms
        );
        Self {
            config,
            feed: None,
            sampler: FrameSampler::new(),
            estimator: StimulationEstimator::new(),
            accumulator: FadeAccumulator::new(),
            applicator: FadeApplicator::new(),
            telemetry: Box::new(NoopTelemetry),
            current: None,
            current_src: None,
            announced: false,
        }
    }

    /// Reads the startup values from `store` and follows its change
    /// notifications from then on.
    pub fn with_store(store: &dyn ConfigStore) -> Self {
        let (config, feed) = ConfigFeed::subscribe(store);
        let mut engine = Self::new(config);
        engine.feed = Some(feed);
        engine
    }

    pub fn with_telemetry(mut self, telemetry: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn apply_config_patch(&mut self, patch: &ConfigPatch) {
        let was_enabled = self.config.enabled;
        if self.config.apply_patch(patch) {
            self.on_config_changed(was_enabled);
        }
    }

    fn sync_config(&mut self) {
        let was_enabled = self.config.enabled;
        let changed = match &self.feed {
            Some(feed) => feed.apply_pending(&mut self.config),
            None => false,
        };
        if changed {
            self.on_config_changed(was_enabled);
        }
    }

    fn on_config_changed(&mut self, was_enabled: bool) {
        debug!("Config updated: {:?}", self.config);
        if was_enabled && !self.config.enabled {
            info!("⏸️ FadeEngine: disabled, resetting fade");
            self.reset();
        }
    }

    pub fn tick_page<S>(&mut self, selector: &S, page: &PageContext<H>, dt_ms: f64) -> TickReport
    where
        S: VideoSelector<H> + ?Sized,
    {
        let active = selector.select(page);
        self.tick(active, dt_ms)
    }

    pub fn tick(&mut self, active: Option<H>, dt_ms: f64) -> TickReport {
        self.sync_config();

        let active = match active {
            Some(video) if self.config.enabled => video,
            _ => return self.idle_tick(),
        };

        let src = active.current_src();
        let swapped = match &self.current {
            Some(current) => !current.same_element(&active) || self.current_src != src,
            None => true,
        };
        if swapped {
            info!(
                "🔄 FadeEngine: now watching {:?} (fade level kept at {:.3})",
                src,
                self.accumulator.fade_level()
            );
            self.announced = false;
        }

        let playback = active.playback_state();
        let playing = active.is_playing();

        let estimate = self
            .sampler
            .capture(&active, playback, self.config.enabled)
            .map(|sample| self.estimator.observe(sample, self.config.sensitivity));
        if let Some(estimate) = &estimate {
            self.accumulator.add_stimulation(estimate.contribution);
        }

        let outcome = self.accumulator.tick(playing, dt_ms, &self.config);
        let fade_level = self.accumulator.fade_level();
        let apply = self.applicator.apply(&active, fade_level, &self.config);

        if !self.announced && fade_level > 0.0 {
            self.announced = true;
            self.telemetry.emit(EngineEvent::FadeEvent);
        }

        debug!(
            "tick: playing={} fade={:.4} estimate={:?}",
            playing, fade_level, estimate
        );

        self.current = Some(active);
        self.current_src = src;
        TickReport::Active {
            swapped,
            playing,
            estimate,
            outcome,
            apply,
        }
    }

    fn idle_tick(&mut self) -> TickReport {
        let reapplied = match &self.current {
            Some(video) if self.config.enabled => {
                self.applicator
                    .apply(video, self.accumulator.fade_level(), &self.config);
                true
            }
            _ => false,
        };
        TickReport::Idle { reapplied }
    }

    /// 唯一能降低淡化等级的路径：恢复默认视觉参数并清零状态
    pub fn reset(&mut self) {
        if let Some(video) = &self.current {
            self.applicator.reset(video);
        }
        self.accumulator.reset();
        self.estimator.reset();
        self.announced = false;
        info!("↩️ FadeEngine: reset");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngagementState {
        self.accumulator.state()
    }

    pub fn fade_level(&self) -> f64 {
        self.accumulator.fade_level()
    }

    pub fn fade_params(&self) -> FadeParams {
        FadeParams::for_level(self.accumulator.fade_level(), &self.config)
    }

    pub fn current_video(&self) -> Option<&H> {
        self.current.as_ref()
    }

    pub fn scene_cut_count(&self) -> u64 {
        self.estimator.scene_cut_count()
    }

    pub fn stats(&self) -> EngineStats {
        let (sample_width, sample_height) = self.sampler.resolution();
        EngineStats {
            fade_level: self.accumulator.fade_level(),
            saturated: self.accumulator.state().is_saturated(),
            playing_ticks: self.accumulator.playing_ticks(),
            captured_frames: self.sampler.captured_count(),
            failed_captures: self.sampler.failed_count(),
            scene_cuts: self.estimator.scene_cut_count(),
            has_baseline: self.estimator.has_baseline(),
            sample_width,
            sample_height,
        }
    }
}

impl<H> Drop for FadeEngine<H> {
    fn drop(&mut self) {
        info!("🗑️ FadeEngine: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MemoryConfigStore, KEY_ENABLED, KEY_SENSITIVITY};
    use crate::core::telemetry::ChannelTelemetry;
    use crate::core::video::{Activity, CaptureError, PlaybackState};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    const TICK_MS: f64 = 200.0;

    struct FakeElement {
        src: RefCell<String>,
        state: Cell<PlaybackState>,
        fill: Cell<Option<u8>>,
        filter: RefCell<String>,
        rate: Cell<f64>,
        preserves_pitch: Cell<bool>,
    }

    #[derive(Clone)]
    struct FakeVideo {
        id: u32,
        el: Rc<FakeElement>,
    }

    impl FakeVideo {
        fn new(id: u32, fill: u8) -> Self {
            Self {
                id,
                el: Rc::new(FakeElement {
                    src: RefCell::new(format!("blob:video-{}", id)),
                    state: Cell::new(PlaybackState::Playing),
                    fill: Cell::new(Some(fill)),
                    filter: RefCell::new(String::new()),
                    rate: Cell::new(1.0),
                    preserves_pitch: Cell::new(true),
                }),
            }
        }

        fn set_fill(&self, fill: Option<u8>) {
            self.el.fill.set(fill);
        }

        fn set_state(&self, state: PlaybackState) {
            self.el.state.set(state);
        }

        fn filter(&self) -> String {
            self.el.filter.borrow().clone()
        }
    }

    impl VideoHandle for FakeVideo {
        fn same_element(&self, other: &Self) -> bool {
            self.id == other.id
        }

        fn current_src(&self) -> Option<String> {
            Some(self.el.src.borrow().clone())
        }

        fn playback_state(&self) -> PlaybackState {
            self.el.state.get()
        }
    }

    impl FrameSource for FakeVideo {
        fn draw_frame(
            &self,
            width: u32,
            height: u32,
            rgba: &mut Vec<u8>,
        ) -> Result<(u32, u32), CaptureError> {
            let fill = self.el.fill.get().ok_or(CaptureError::NotDecoded)?;
            rgba.resize((width * height * 4) as usize, fill);
            Ok((width, height))
        }
    }

    impl VideoSurface for FakeVideo {
        fn set_filter(&self, filter: &str) {
            *self.el.filter.borrow_mut() = filter.to_string();
        }

        fn playback_rate(&self) -> Option<f64> {
            Some(self.el.rate.get())
        }

        fn set_playback_rate(&self, rate: f64) {
            self.el.rate.set(rate);
        }

        fn set_preserves_pitch(&self, preserve: bool) {
            self.el.preserves_pitch.set(preserve);
        }
    }

    fn engine() -> FadeEngine<FakeVideo> {
        FadeEngine::new(EngineConfig::default())
    }

    #[test]
    fn test_ten_static_ticks() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 120);

        for _ in 0..10 {
            engine.tick(Some(video.clone()), TICK_MS);
        }

        assert!((engine.fade_level() - 10.0 * 200.0 / 30_000.0).abs() < 1e-9);
        assert_eq!(engine.state().stimulation_score(), 0.0);
        assert!(video.filter().starts_with("grayscale("));
        assert!(!video.el.preserves_pitch.get());
    }

    #[test]
    fn test_scene_cut_accelerates_fade() {
        let mut engine = engine();
        engine.apply_config_patch(&ConfigPatch {
            sensitivity: Some(100),
            ..Default::default()
        });
        let video = FakeVideo::new(1, 0);

        engine.tick(Some(video.clone()), TICK_MS);
        let before = engine.fade_level();

        video.set_fill(Some(80));
        let report = engine.tick(Some(video.clone()), TICK_MS);

        match report {
            TickReport::Active {
                estimate: Some(estimate),
                outcome:
                    TickOutcome::Advanced {
                        stimulation_increment,
                        ..
                    },
                ..
            } => {
                assert_eq!(estimate.activity, Activity::SceneCut);
                assert!((estimate.contribution - 30.0).abs() < 1e-9);
                assert!((stimulation_increment - 0.0015).abs() < 1e-12);
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert!((engine.fade_level() - before - (200.0 / 30_000.0 + 0.0015)).abs() < 1e-9);
        assert_eq!(engine.scene_cut_count(), 1);
    }

    #[test]
    fn test_paused_video_freezes_but_reapplies() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 50);
        for _ in 0..5 {
            engine.tick(Some(video.clone()), TICK_MS);
        }
        let state = *engine.state();

        video.set_state(PlaybackState::Paused);
        video.set_fill(Some(250));
        video.set_filter("");
        for _ in 0..5 {
            let report = engine.tick(Some(video.clone()), TICK_MS);
            assert!(matches!(
                report,
                TickReport::Active {
                    playing: false,
                    estimate: None,
                    outcome: TickOutcome::Frozen,
                    ..
                }
            ));
        }

        assert_eq!(*engine.state(), state);
        assert!(video.filter().starts_with("grayscale("));
    }

    #[test]
    fn test_absent_video_reapplies_to_last_handle() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 50);
        for _ in 0..20 {
            engine.tick(Some(video.clone()), TICK_MS);
        }
        let state = *engine.state();
        let expected_filter = video.filter();

        // 宿主重置了样式和速率
        video.set_filter("");
        video.set_playback_rate(1.0);

        let report = engine.tick(None, TICK_MS);
        assert_eq!(report, TickReport::Idle { reapplied: true });
        assert_eq!(*engine.state(), state);
        assert_eq!(video.filter(), expected_filter);
        assert!(video.el.rate.get() < 1.0);
    }

    #[test]
    fn test_swap_keeps_fade() {
        let mut engine = engine();
        let first = FakeVideo::new(1, 50);
        for _ in 0..30 {
            engine.tick(Some(first.clone()), TICK_MS);
        }
        let level = engine.fade_level();

        let second = FakeVideo::new(2, 50);
        let report = engine.tick(Some(second.clone()), TICK_MS);

        assert!(matches!(report, TickReport::Active { swapped: true, .. }));
        assert!(engine.fade_level() >= level);
        assert!(engine.current_video().unwrap().same_element(&second));
        assert_eq!(second.filter(), engine.fade_params().css_filter());
    }

    #[test]
    fn test_same_element_new_source_is_swap() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 50);
        engine.tick(Some(video.clone()), TICK_MS);

        *video.el.src.borrow_mut() = "blob:next".to_string();
        let report = engine.tick(Some(video.clone()), TICK_MS);
        assert!(matches!(report, TickReport::Active { swapped: true, .. }));

        let report = engine.tick(Some(video.clone()), TICK_MS);
        assert!(matches!(report, TickReport::Active { swapped: false, .. }));
    }

    #[test]
    fn test_fade_event_once_per_video() {
        let (sink, events) = ChannelTelemetry::new();
        let mut engine = engine().with_telemetry(Box::new(sink));
        let first = FakeVideo::new(1, 50);
        let second = FakeVideo::new(2, 50);

        for _ in 0..5 {
            engine.tick(Some(first.clone()), TICK_MS);
        }
        for _ in 0..5 {
            engine.tick(Some(second.clone()), TICK_MS);
        }

        assert_eq!(events.try_iter().count(), 2);
    }

    #[test]
    fn test_capture_failure_keeps_previous_sample() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 0);
        engine.tick(Some(video.clone()), TICK_MS);

        video.set_fill(None);
        let report = engine.tick(Some(video.clone()), TICK_MS);
        assert!(matches!(
            report,
            TickReport::Active {
                estimate: None,
                outcome: TickOutcome::Advanced { .. },
                ..
            }
        ));

        video.set_fill(Some(90));
        let report = engine.tick(Some(video.clone()), TICK_MS);
        match report {
            TickReport::Active {
                estimate: Some(estimate),
                ..
            } => assert_eq!(estimate.activity, Activity::SceneCut),
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_stats_track_ticks_and_captures() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 0);

        engine.tick(Some(video.clone()), TICK_MS);
        video.set_fill(Some(200));
        engine.tick(Some(video.clone()), TICK_MS);
        video.set_fill(None);
        engine.tick(Some(video.clone()), TICK_MS);
        video.set_state(PlaybackState::Paused);
        engine.tick(Some(video.clone()), TICK_MS);

        let stats = engine.stats();
        assert_eq!(stats.playing_ticks, 3);
        assert_eq!(stats.captured_frames, 2);
        assert_eq!(stats.failed_captures, 1);
        assert_eq!(stats.scene_cuts, 1);
        assert!(stats.has_baseline);
        assert!(!stats.saturated);
        assert_eq!((stats.sample_width, stats.sample_height), (64, 64));
        assert_eq!(stats.fade_level, engine.fade_level());

        engine.reset();
        let stats = engine.stats();
        assert_eq!(stats.playing_ticks, 0);
        assert!(!stats.has_baseline);
    }

    #[test]
    fn test_reset_restores_everything_at_once() {
        let mut engine = engine();
        let video = FakeVideo::new(1, 0);
        for i in 0..20u8 {
            video.set_fill(Some(i * 10));
            engine.tick(Some(video.clone()), TICK_MS);
        }
        assert!(engine.fade_level() > 0.0);

        engine.reset();

        assert_eq!(*engine.state(), EngagementState::new());
        assert_eq!(video.filter(), "");
        assert_eq!(video.el.rate.get(), 1.0);
        assert!(video.el.preserves_pitch.get());

        // 重置后第一帧只建立基线
        video.set_fill(Some(255));
        match engine.tick(Some(video.clone()), TICK_MS) {
            TickReport::Active {
                estimate: Some(estimate),
                ..
            } => assert_eq!(estimate.activity, Activity::Baseline),
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn test_store_changes_apply_before_next_tick() {
        let store = MemoryConfigStore::new();
        store.install_defaults();
        let mut engine: FadeEngine<FakeVideo> = FadeEngine::with_store(&store);
        let video = FakeVideo::new(1, 0);
        engine.tick(Some(video.clone()), TICK_MS);

        store.set(HashMap::from([(KEY_SENSITIVITY.to_string(), json!(0))]));
        video.set_fill(Some(200));
        match engine.tick(Some(video.clone()), TICK_MS) {
            TickReport::Active {
                estimate: Some(estimate),
                ..
            } => assert_eq!(estimate.contribution, 0.0),
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(engine.config().sensitivity, 0);
    }

    #[test]
    fn test_disable_resets_and_goes_idle() {
        let store = MemoryConfigStore::new();
        let mut engine: FadeEngine<FakeVideo> = FadeEngine::with_store(&store);
        let video = FakeVideo::new(1, 40);
        for _ in 0..10 {
            engine.tick(Some(video.clone()), TICK_MS);
        }

        store.set(HashMap::from([(KEY_ENABLED.to_string(), json!(false))]));
        let report = engine.tick(Some(video.clone()), TICK_MS);

        assert_eq!(report, TickReport::Idle { reapplied: false });
        assert_eq!(engine.fade_level(), 0.0);
        assert_eq!(video.filter(), "");

        for _ in 0..5 {
            engine.tick(Some(video.clone()), TICK_MS);
        }
        assert_eq!(engine.fade_level(), 0.0);
    }

    #[test]
    fn test_selector_driven_tick() {
        use crate::core::video::{PageContext, Rect, ShortVideoSelector, VideoCandidate};

        let mut engine = engine();
        let selector = ShortVideoSelector::new();
        let video = FakeVideo::new(7, 10);
        let page = PageContext {
            url: "https://www.youtube.com/shorts/abc".to_string(),
            candidates: vec![VideoCandidate {
                handle: video.clone(),
                rect: Rect {
                    width: 400.0,
                    height: 700.0,
                },
            }],
        };

        let report = engine.tick_page(&selector, &page, TICK_MS);
        assert!(matches!(report, TickReport::Active { swapped: true, .. }));

        let elsewhere = PageContext {
            url: "https://www.youtube.com/".to_string(),
            ..page
        };
        let report = engine.tick_page(&selector, &elsewhere, TICK_MS);
        assert_eq!(report, TickReport::Idle { reapplied: true });
    }
}
