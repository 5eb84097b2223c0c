//! 在独立线程上以固定频率驱动引擎

use super::applicator::VideoSurface;
use super::engine::FadeEngine;
use crate::core::scheduler::{spawn_periodic, tick_period, TaskHandle};
use crate::core::video::{FrameSource, PageContext, VideoHandle, VideoSelector};
use std::io;

pub const TICK_THREAD_NAME: &str = "neuro-fade-tick";

/// Moves `engine` onto the tick thread. Each tick asks `page` for a fresh
/// snapshot of the page and lets `selector` pick the active video.
/// Dropping the returned handle stops the loop and releases the engine.
pub fn spawn_engine<H, S, P>(
    mut engine: FadeEngine<H>,
    selector: S,
    mut page: P,
) -> io::Result<TaskHandle>
where
    H: VideoHandle + FrameSource + VideoSurface + Send + 'static,
    S: VideoSelector<H> + Send + 'static,
    P: FnMut() -> PageContext<H> + Send + 'static,
{
    spawn_periodic(TICK_THREAD_NAME, tick_period(), move |dt| {
        let snapshot = page();
        engine.tick_page(&selector, &snapshot, dt.as_secs_f64() * 1000.0);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::video::{CaptureError, PlaybackState, Rect, ShortVideoSelector, VideoCandidate};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct SharedVideo {
        filter: Arc<Mutex<String>>,
        rate: Arc<Mutex<f64>>,
    }

    impl VideoHandle for SharedVideo {
        fn same_element(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.filter, &other.filter)
        }

        fn current_src(&self) -> Option<String> {
            Some("blob:shared".to_string())
        }

        fn playback_state(&self) -> PlaybackState {
            PlaybackState::Playing
        }
    }

    impl FrameSource for SharedVideo {
        fn draw_frame(
            &self,
            width: u32,
            height: u32,
            rgba: &mut Vec<u8>,
        ) -> Result<(u32, u32), CaptureError> {
            rgba.resize((width * height * 4) as usize, 90);
            Ok((width, height))
        }
    }

    impl VideoSurface for SharedVideo {
        fn set_filter(&self, filter: &str) {
            *self.filter.lock().unwrap() = filter.to_string();
        }

        fn playback_rate(&self) -> Option<f64> {
            Some(*self.rate.lock().unwrap())
        }

        fn set_playback_rate(&self, rate: f64) {
            *self.rate.lock().unwrap() = rate;
        }

        fn set_preserves_pitch(&self, _preserve: bool) {}
    }

    #[test]
    fn test_engine_runs_on_tick_thread() {
        let video = SharedVideo::default();
        *video.rate.lock().unwrap() = 1.0;
        let engine = FadeEngine::new(EngineConfig::default());
        let page_video = video.clone();

        let mut handle = spawn_engine(engine, ShortVideoSelector::new(), move || PageContext {
            url: "https://www.tiktok.com/@someone/video/1".to_string(),
            candidates: vec![VideoCandidate {
                handle: page_video.clone(),
                rect: Rect {
                    width: 360.0,
                    height: 640.0,
                },
            }],
        })
        .unwrap();
        assert_eq!(handle.name(), TICK_THREAD_NAME);

        let waited = Instant::now();
        while video.filter.lock().unwrap().is_empty() && waited.elapsed() < Duration::from_secs(5)
        {
            thread::sleep(Duration::from_millis(20));
        }
        handle.stop();

        assert!(video.filter.lock().unwrap().starts_with("grayscale("));
    }
}
