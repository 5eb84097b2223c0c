use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
}

/// 宿主视频元素的句柄（类似 DOM 引用，克隆开销很小）
pub trait VideoHandle: Clone {
    /// Whether both handles point at the same host element.
    fn same_element(&self, other: &Self) -> bool;

    fn current_src(&self) -> Option<String>;

    fn playback_state(&self) -> PlaybackState;

    fn is_playing(&self) -> bool {
        self.playback_state() == PlaybackState::Playing
    }
}
