use crate::core::config::EngineConfig;
use serde::{Deserialize, Serialize};

/// 刺激分每 100 分额外推进 0.005 的淡化
pub const STIMULATION_SCALE: f64 = 100.0;
pub const STIMULATION_FADE_WEIGHT: f64 = 0.005;

pub const MAX_FADE_LEVEL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementState {
    fade_level: f64,
    stimulation_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing: neither the score nor the fade level moved.
    Frozen,
    Advanced {
        base_increment: f64,
        stimulation_increment: f64,
    },
}

impl EngagementState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fade_level(&self) -> f64 {
        self.fade_level
    }

    pub fn stimulation_score(&self) -> f64 {
        self.stimulation_score
    }

    pub fn is_saturated(&self) -> bool {
        self.fade_level >= MAX_FADE_LEVEL
    }

    /// Negative or non-finite contributions are dropped so the score never goes below 0.
    pub fn with_stimulation(self, contribution: f64) -> Self {
        if !contribution.is_finite() || contribution <= 0.0 {
            return self;
        }
        Self {
            stimulation_score: self.stimulation_score + contribution,
            ..self
        }
    }

    pub fn tick(&self, playing: bool, dt_ms: f64, config: &EngineConfig) -> (Self, TickOutcome) {
        if !playing {
            return (*self, TickOutcome::Frozen);
        }

        let base_increment = if dt_ms > 0.0 && config.base_fade_time_ms > 0.0 {
            dt_ms / config.base_fade_time_ms
        } else {
            0.0
        };
        let stimulation_increment =
            (self.stimulation_score / STIMULATION_SCALE) * STIMULATION_FADE_WEIGHT;

        let step = base_increment + stimulation_increment;
        let step = if step.is_finite() { step.max(0.0) } else { MAX_FADE_LEVEL };

        (
            Self {
                fade_level: (self.fade_level + step).min(MAX_FADE_LEVEL),
                stimulation_score: 0.0,
            },
            TickOutcome::Advanced {
                base_increment,
                stimulation_increment,
            },
        )
    }
}

/// 淡化累加器，只能通过 reset 回退
pub struct FadeAccumulator {
    state: EngagementState,
    playing_ticks: u64,
}

impl FadeAccumulator {
    pub fn new() -> Self {
        Self {
            state: EngagementState::new(),
            playing_ticks: 0,
        }
    }

    pub fn add_stimulation(&mut self, contribution: f64) {
        self.state = self.state.with_stimulation(contribution);
    }

    pub fn tick(&mut self, playing: bool, dt_ms: f64, config: &EngineConfig) -> TickOutcome {
        let (new_state, outcome) = self.state.tick(playing, dt_ms, config);
        self.state = new_state;
        if matches!(outcome, TickOutcome::Advanced { .. }) {
            self.playing_ticks += 1;
        }
        outcome
    }

    pub fn state(&self) -> &EngagementState {
        &self.state
    }

    pub fn fade_level(&self) -> f64 {
        self.state.fade_level()
    }

    pub fn playing_ticks(&self) -> u64 {
        self.playing_ticks
    }

    pub fn reset(&mut self) {
        self.state = EngagementState::new();
        self.playing_ticks = 0;
    }
}

impl Default for FadeAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
