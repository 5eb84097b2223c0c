//! 刺激度估计 - 相邻采样帧的平均亮度差
//!
//! 大于阈值视为剪辑切换，记固定峰值；否则按连续运动线性计分。
//! 结果再按灵敏度缩放（50 为中性）。

use super::frame::FrameSample;
use crate::core::config::sensitivity_multiplier;
use log::debug;

/// 平均亮度差超过该值视为整屏切换
pub const SCENE_CUT_THRESHOLD: f64 = 50.0;
pub const SCENE_CUT_SPIKE: f64 = 15.0;
pub const MOTION_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// No previous sample to compare against.
    Baseline,
    Motion,
    SceneCut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub activity: Activity,
    pub avg_diff: f64,
    /// Sensitivity-scaled; negative only when sensitivity is negative.
    pub contribution: f64,
}

impl Estimate {
    pub fn baseline() -> Self {
        Self {
            activity: Activity::Baseline,
            avg_diff: 0.0,
            contribution: 0.0,
        }
    }
}

pub fn estimate(prev: Option<&FrameSample>, curr: &FrameSample, sensitivity: i32) -> Estimate {
    let Some(prev) = prev else {
        return Estimate::baseline();
    };
    let Some(avg_diff) = curr.mean_abs_diff(prev) else {
        debug!(
            "Sample size changed ({}x{} -> {}x{}), treating as baseline",
            prev.width(),
            prev.height(),
            curr.width(),
            curr.height()
        );
        return Estimate::baseline();
    };

    let (activity, raw) = if avg_diff > SCENE_CUT_THRESHOLD {
        (Activity::SceneCut, SCENE_CUT_SPIKE)
    } else {
        (Activity::Motion, avg_diff * MOTION_WEIGHT)
    };

    Estimate {
        activity,
        avg_diff,
        contribution: raw * sensitivity_multiplier(sensitivity),
    }
}

/// 只保留上一帧，不保存更早的历史
pub struct StimulationEstimator {
    previous: Option<FrameSample>,
    scene_cuts: u64,
}

impl StimulationEstimator {
    pub fn new() -> Self {
        Self {
            previous: None,
            scene_cuts: 0,
        }
    }

    /// Compares `curr` against the retained sample, then keeps `curr` as the
    /// next baseline.
    pub fn observe(&mut self, curr: FrameSample, sensitivity: i32) -> Estimate {
        let result = estimate(self.previous.as_ref(), &curr, sensitivity);

        if result.activity == Activity::SceneCut {
            self.scene_cuts += 1;
            debug!("✂️ Scene cut detected (avg diff {:.1})", result.avg_diff);
        }

        self.previous = Some(curr);
        result
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    pub fn scene_cut_count(&self) -> u64 {
        self.scene_cuts
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.scene_cuts = 0;
    }
}

impl Default for StimulationEstimator {
    fn default() -> Self {
        Self::new()
    }
}
