// src/rules.rs - Single-frame form checks for each exercise
use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseType;
use crate::feedback::{Cue, FeedbackSet};
use crate::landmarks::LandmarkFrame;

/// Thresholds in normalized image units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormThresholds {
    /// Below this depth the lifter is asked to go lower.
    pub shallow_depth: f64,
    /// Above this depth the depth is praised.
    pub deep_depth: f64,
    /// Max horizontal knee-to-ankle offset before knees count as drifting.
    pub knee_drift: f64,
    /// How far shoulders may sit below hips before the back counts as rounded.
    pub back_rounding: f64,
    pub snatch_bar_offset: f64,
    pub rack_tolerance: f64,
    pub deadlift_hip_band: f64,
    pub deadlift_bar_offset: f64,
}

impl Default for FormThresholds {
    fn default() -> Self {
        Self {
            shallow_depth: 0.05,
            deep_depth: 0.08,
            knee_drift: 0.25,
            back_rounding: 0.1,
            snatch_bar_offset: 0.15,
            rack_tolerance: 0.1,
            deadlift_hip_band: 0.15,
            deadlift_bar_offset: 0.2,
        }
    }
}

/// Stateless per-frame evaluator. Every call builds a fresh feedback set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator {
    thresholds: FormThresholds,
}

impl RuleEvaluator {
    pub fn new(thresholds: FormThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FormThresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, exercise: ExerciseType, frame: &LandmarkFrame) -> FeedbackSet {
        let mut feedback = FeedbackSet::new();
        match exercise {
            ExerciseType::Squat => self.check_squat(frame, &mut feedback),
            ExerciseType::SquatSnatch => self.check_squat_snatch(frame, &mut feedback),
            ExerciseType::SquatClean => self.check_squat_clean(frame, &mut feedback),
            ExerciseType::Deadlift => self.check_deadlift(frame, &mut feedback),
        }

        if feedback.is_empty() {
            feedback.insert(Cue::GoodForm(exercise));
        }
        feedback
    }

    /// Picks the shallow or deep cue for a depth value; the band in between
    /// produces nothing.
    fn depth_cue(&self, depth: f64, shallow: Cue, deep: Cue) -> Option<Cue> {
        if depth < self.thresholds.shallow_depth {
            Some(shallow)
        } else if depth > self.thresholds.deep_depth {
            Some(deep)
        } else {
            None
        }
    }

    pub(crate) fn knees_drifting(&self, frame: &LandmarkFrame) -> bool {
        let knees = frame.knees();
        let ankles = frame.ankles();
        (knees.left.x - ankles.left.x).abs() > self.thresholds.knee_drift
            || (knees.right.x - ankles.right.x).abs() > self.thresholds.knee_drift
    }

    fn back_rounded(&self, frame: &LandmarkFrame) -> bool {
        frame.shoulders().mean().y > frame.hips().mean().y + self.thresholds.back_rounding
    }

    fn shoulders_off_bar(&self, frame: &LandmarkFrame, limit: f64) -> bool {
        (frame.shoulders().mean().x - frame.ankles().mean().x).abs() > limit
    }

    fn check_squat(&self, frame: &LandmarkFrame, feedback: &mut FeedbackSet) {
        let depth = frame.squat_depth();
        if let Some(cue) = self.depth_cue(depth, Cue::IncreaseSquatDepth, Cue::SquatDepthExcellent) {
            feedback.insert(cue);
        }
        if self.knees_drifting(frame) {
            feedback.insert(Cue::KneesDrifting);
        }
        if self.back_rounded(frame) {
            feedback.insert(Cue::BackRounded);
        }
    }

    fn check_squat_snatch(&self, frame: &LandmarkFrame, feedback: &mut FeedbackSet) {
        let depth = frame.squat_depth();
        if let Some(cue) = self.depth_cue(depth, Cue::SnatchDropDeeper, Cue::SnatchStableCatch) {
            feedback.insert(cue);
        }

        if !frame.wrists().both_with(&frame.elbows(), |wrist, elbow| wrist.y < elbow.y) {
            feedback.insert(Cue::LockElbowsOverhead);
        }

        if self.shoulders_off_bar(frame, self.thresholds.snatch_bar_offset) {
            feedback.insert(Cue::ShouldersOverBar);
        }
    }

    fn check_squat_clean(&self, frame: &LandmarkFrame, feedback: &mut FeedbackSet) {
        let depth = frame.squat_depth();
        if let Some(cue) = self.depth_cue(depth, Cue::CleanDropDeeper, Cue::CleanSolidCatch) {
            feedback.insert(cue);
        }

        let shoulders = frame.shoulders();
        let wrists = frame.wrists();
        let tolerance = self.thresholds.rack_tolerance;
        if !wrists.both_with(&shoulders, |wrist, shoulder| (wrist.y - shoulder.y).abs() < tolerance) {
            feedback.insert(Cue::RackOnShoulders);
        }

        let shoulder_y = shoulders.mean().y;
        if !frame.elbows().both(|elbow| elbow.y < shoulder_y) {
            feedback.insert(Cue::LiftElbows);
        }
    }

    fn check_deadlift(&self, frame: &LandmarkFrame, feedback: &mut FeedbackSet) {
        if self.back_rounded(frame) {
            feedback.insert(Cue::KeepBackFlat);
        }

        let band = self.thresholds.deadlift_hip_band;
        let hips = frame.hips();
        let knees = frame.knees();
        let hips_out_of_band = hips
            .sides()
            .into_iter()
            .zip(knees.sides())
            .any(|(hip, knee)| hip.y < knee.y - band || hip.y > knee.y + band);
        if hips_out_of_band {
            feedback.insert(Cue::AdjustHips);
        }

        if self.shoulders_off_bar(frame, self.thresholds.deadlift_bar_offset) {
            feedback.insert(Cue::PullShouldersBack);
        }
    }
}
