//! 当前短视频选择
//!
//! 只在短视频页面上工作；优先正在播放的候选，否则取面积最大的竖屏视频。

use super::handle::VideoHandle;
use once_cell::sync::Lazy;
use regex::Regex;

static SHORT_FORM_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(shorts|reels)/").expect("short-form path pattern"));

static URL_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:[^@/?#]*@)?([^/:?#]+)").expect("url host pattern")
});

const SHORT_FORM_HOST: &str = "tiktok.com";

/// Layout box of a candidate in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct VideoCandidate<H> {
    pub handle: H,
    pub rect: Rect,
}

/// 宿主页面快照
#[derive(Debug, Clone)]
pub struct PageContext<H> {
    pub url: String,
    pub candidates: Vec<VideoCandidate<H>>,
}

pub trait VideoSelector<H> {
    fn select(&self, page: &PageContext<H>) -> Option<H>;
}

pub struct ShortVideoSelector {
    min_area: f64,
    portrait_tolerance: f64,
}

impl ShortVideoSelector {
    pub fn new() -> Self {
        Self {
            min_area: 50_000.0,
            portrait_tolerance: 50.0,
        }
    }

    pub fn is_short_form_url(url: &str) -> bool {
        if SHORT_FORM_PATH.is_match(url) {
            return true;
        }
        URL_HOST
            .captures(url)
            .and_then(|cap| cap.get(1))
            .map(|host| host.as_str().to_ascii_lowercase().contains(SHORT_FORM_HOST))
            .unwrap_or(false)
    }

    fn qualifies(&self, rect: &Rect) -> bool {
        rect.is_visible()
            && rect.area() > self.min_area
            && rect.height >= rect.width - self.portrait_tolerance
    }
}

impl Default for ShortVideoSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: VideoHandle> VideoSelector<H> for ShortVideoSelector {
    fn select(&self, page: &PageContext<H>) -> Option<H> {
        if !Self::is_short_form_url(&page.url) {
            return None;
        }

        let mut best: Option<&VideoCandidate<H>> = None;
        for candidate in page.candidates.iter().filter(|c| self.qualifies(&c.rect)) {
            if candidate.handle.is_playing() {
                return Some(candidate.handle.clone());
            }
            if best.map_or(true, |b| candidate.rect.area() > b.rect.area()) {
                best = Some(candidate);
            }
        }

        best.map(|c| c.handle.clone())
    }
}
