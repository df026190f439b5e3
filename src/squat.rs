// src/squat.rs - Squat rep counting state machine
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::feedback::{Cue, FeedbackSet};
use crate::landmarks::LandmarkFrame;
use crate::rules::{FormThresholds, RuleEvaluator};

/// When the rep frame counter goes back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterReset {
    /// Only after a completed rep; the first rep is timed from the start of
    /// the clip.
    OnRepComplete,
    /// Also when a descent begins, so every rep is timed on its own.
    OnDescent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquatTrackerConfig {
    /// Depth that starts a descent.
    pub descent_trigger: f64,
    /// Depth below which a descent turns into an ascent.
    pub ascent_trigger: f64,
    /// Depth below which the lifter counts as standing tall.
    pub full_extension: f64,
    /// Frames that must pass before a phase change is accepted.
    pub min_frames_per_rep: u32,
    pub counter_reset: CounterReset,
    /// Sets shorter than this get a "do more reps" suggestion.
    pub target_reps: u32,
}

impl Default for SquatTrackerConfig {
    fn default() -> Self {
        Self {
            descent_trigger: 0.03,
            ascent_trigger: 0.03,
            full_extension: -0.05,
            min_frames_per_rep: 15,
            counter_reset: CounterReset::OnRepComplete,
            target_reps: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SquatPhase {
    Standing,
    Descending { deepest: f64 },
    Ascending { deepest: f64 },
}

impl SquatPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SquatPhase::Standing => "standing",
            SquatPhase::Descending { .. } => "descending",
            SquatPhase::Ascending { .. } => "ascending",
        }
    }
}

/// Result of feeding one depth sample to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Hold(SquatPhase),
    BeginDescent(SquatPhase),
    BeginAscent(SquatPhase),
    Complete { deepest: f64 },
}

/// Pure transition function. `frame_counter` is the count after the current
/// frame has been counted.
pub fn step(
    phase: SquatPhase,
    depth: f64,
    frame_counter: u32,
    config: &SquatTrackerConfig,
) -> Step {
    let timed_out = frame_counter > config.min_frames_per_rep;
    match phase {
        SquatPhase::Standing if depth > config.descent_trigger => {
            Step::BeginDescent(SquatPhase::Descending { deepest: depth })
        }
        SquatPhase::Standing => Step::Hold(phase),
        SquatPhase::Descending { deepest } => {
            let deepest = deepest.max(depth);
            if depth < config.ascent_trigger && timed_out {
                Step::BeginAscent(SquatPhase::Ascending { deepest })
            } else {
                Step::Hold(SquatPhase::Descending { deepest })
            }
        }
        SquatPhase::Ascending { deepest } => {
            if depth < config.full_extension && timed_out {
                Step::Complete { deepest }
            } else {
                Step::Hold(phase)
            }
        }
    }
}

/// A finished rep and the feedback it earned.
#[derive(Debug, Clone, PartialEq)]
pub struct RepOutcome {
    pub rep: u32,
    pub deepest: f64,
    pub feedback: FeedbackSet,
}

/// Per-run owner of the phase machine. Feed it only frames that had a
/// detection, in video order.
#[derive(Debug, Clone)]
pub struct SquatTracker {
    config: SquatTrackerConfig,
    rules: RuleEvaluator,
    phase: SquatPhase,
    reps: u32,
    frame_counter: u32,
}

impl SquatTracker {
    pub fn new(config: SquatTrackerConfig, thresholds: FormThresholds) -> Self {
        Self {
            config,
            rules: RuleEvaluator::new(thresholds),
            phase: SquatPhase::Standing,
            reps: 0,
            frame_counter: 0,
        }
    }

    pub fn phase(&self) -> SquatPhase {
        self.phase
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn config(&self) -> &SquatTrackerConfig {
        &self.config
    }

    pub fn push(&mut self, frame: &LandmarkFrame) -> Option<RepOutcome> {
        self.frame_counter += 1;
        let depth = frame.squat_depth();

        match step(self.phase, depth, self.frame_counter, &self.config) {
            Step::Hold(phase) => {
                self.phase = phase;
                None
            }
            Step::BeginDescent(phase) => {
                debug!("descent started at depth {:.3}, frame {}", depth, self.frame_counter);
                if self.config.counter_reset == CounterReset::OnDescent {
                    self.frame_counter = 0;
                }
                self.phase = phase;
                None
            }
            Step::BeginAscent(phase) => {
                debug!("ascent started at depth {:.3}, frame {}", depth, self.frame_counter);
                self.phase = phase;
                None
            }
            Step::Complete { deepest } => {
                self.reps += 1;
                self.phase = SquatPhase::Standing;
                self.frame_counter = 0;
                info!("squat rep {} complete, deepest {:.3}", self.reps, deepest);
                Some(RepOutcome {
                    rep: self.reps,
                    deepest,
                    feedback: self.rep_feedback(deepest, depth, frame),
                })
            }
        }
    }

    fn rep_feedback(&self, deepest: f64, depth: f64, frame: &LandmarkFrame) -> FeedbackSet {
        let thresholds = self.rules.thresholds();
        let mut feedback = FeedbackSet::new();

        if deepest > thresholds.deep_depth {
            feedback.insert(Cue::SquatDepthExcellent);
        } else if deepest >= thresholds.shallow_depth {
            feedback.insert(Cue::SquatDepthModerate);
        } else {
            feedback.insert(Cue::IncreaseSquatDepth);
        }

        if self.rules.knees_drifting(frame) {
            feedback.insert(Cue::KneesDrifting);
        }
        if depth < self.config.full_extension {
            feedback.insert(Cue::FullExtension);
        }

        feedback.resolve_depth_conflicts();
        feedback
    }
}


#[cfg(test)]
mod tests {
    use super::sequences::rep;
    use super::*;
    use crate::landmarks::fixtures::at_depth;
    use crate::landmarks::Joint;

    fn tracker() -> SquatTracker {
        SquatTracker::new(SquatTrackerConfig::default(), FormThresholds::default())
    }

    #[test]
    fn test_single_rep_after_warm_up() {
        let mut tracker = tracker();
        for _ in 0..16 {
            assert!(tracker.push(&at_depth(0.0)).is_none());
        }

        let depths = [0.0, 0.0, 0.04, 0.05, 0.06, 0.05, 0.02, 0.01, -0.06];
        let outcomes: Vec<_> = depths.iter().map(|d| tracker.push(&at_depth(*d))).collect();

        assert!(outcomes[..8].iter().all(Option::is_none));
        let last = outcomes[8].as_ref().unwrap();
        assert_eq!(last.rep, 1);
        assert!(!last.feedback.is_empty());
        assert!((last.deepest - 0.06).abs() < 1e-9);
        assert!(last.feedback.contains(Cue::SquatDepthModerate));
        assert_eq!(tracker.reps(), 1);
        assert_eq!(tracker.phase(), SquatPhase::Standing);
        assert_eq!(tracker.frame_counter(), 0);
    }

    #[test]
    fn test_frame_gate_blocks_fast_reps() {
        let mut tracker = tracker();
        for depth in [0.0, 0.0, 0.04, 0.05, 0.06, 0.05, 0.02, 0.01, -0.06] {
            assert!(tracker.push(&at_depth(depth)).is_none());
        }
        assert_eq!(tracker.reps(), 0);
        assert!(matches!(tracker.phase(), SquatPhase::Descending { .. }));
    }

    #[test]
    fn test_gate_disabled() {
        let config = SquatTrackerConfig {
            min_frames_per_rep: 0,
            ..SquatTrackerConfig::default()
        };
        let mut tracker = SquatTracker::new(config, FormThresholds::default());
        let reps = [0.0, 0.0, 0.04, 0.05, 0.06, 0.05, 0.02, 0.01, -0.06]
            .iter()
            .filter_map(|d| tracker.push(&at_depth(*d)))
            .count();
        assert_eq!(reps, 1);
    }

    #[test]
    fn test_counter_reset_on_descent() {
        let config = SquatTrackerConfig {
            counter_reset: CounterReset::OnDescent,
            ..SquatTrackerConfig::default()
        };
        let mut tracker = SquatTracker::new(config, FormThresholds::default());
        for _ in 0..30 {
            tracker.push(&at_depth(0.0));
        }
        tracker.push(&at_depth(0.05));
        assert_eq!(tracker.frame_counter(), 0);

        // the descent is timed from zero, so an early climb is not accepted
        tracker.push(&at_depth(0.01));
        assert!(matches!(tracker.phase(), SquatPhase::Descending { .. }));
    }

    #[test]
    fn test_three_deep_reps() {
        let mut tracker = tracker();
        let mut outcomes = Vec::new();
        for _ in 0..3 {
            for depth in rep(0.09) {
                outcomes.extend(tracker.push(&at_depth(depth)));
            }
        }
        assert_eq!(tracker.reps(), 3);
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.feedback.contains(Cue::SquatDepthExcellent));
            assert!(outcome.feedback.contains(Cue::FullExtension));
            assert!(!outcome.feedback.contains(Cue::IncreaseSquatDepth));
            assert!(!outcome.feedback.contains(Cue::KneesDrifting));
        }
    }

    #[test]
    fn test_shallow_rep_and_knee_drift() {
        let mut tracker = tracker();
        let mut outcome = None;
        for depth in rep(0.04) {
            let mut frame = at_depth(depth);
            if depth < -0.05 {
                frame = frame.with(Joint::LeftKnee, 0.80, 0.70);
            }
            outcome = outcome.or(tracker.push(&frame));
        }
        let outcome = outcome.unwrap();
        assert!(outcome.feedback.contains(Cue::IncreaseSquatDepth));
        assert!(outcome.feedback.contains(Cue::KneesDrifting));
    }

    #[test]
    fn test_step_is_pure() {
        let config = SquatTrackerConfig::default();
        let phase = SquatPhase::Descending { deepest: 0.05 };
        assert_eq!(
            step(phase, 0.07, 3, &config),
            Step::Hold(SquatPhase::Descending { deepest: 0.07 })
        );
        assert_eq!(
            step(phase, 0.01, 16, &config),
            Step::BeginAscent(SquatPhase::Ascending { deepest: 0.05 })
        );
        assert_eq!(step(SquatPhase::Standing, 0.02, 40, &config), Step::Hold(SquatPhase::Standing));
    }
}
