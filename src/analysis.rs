// src/analysis.rs - Drives one analysis run from frames to the final result
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::exercise::ExerciseType;
use crate::feedback::{Cue, FeedbackSet};
use crate::landmarks::LandmarkFrame;
use crate::pose_bridge::DetectorFactory;
use crate::rules::{FormThresholds, RuleEvaluator};
use crate::squat::{SquatPhase, SquatTracker, SquatTrackerConfig};
use crate::video::{self, VideoFrames, VideoSettings};

/// What a run hands back to the caller. `reps` is only set for squats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub feedback: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
}

impl AnalysisResult {
    pub fn invalid_exercise() -> Self {
        Self {
            feedback: vec![Cue::InvalidExercise.to_string()],
            reps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisConfig {
    pub thresholds: FormThresholds,
    pub squat: SquatTrackerConfig,
}

/// Per-frame report, mostly for tracing a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub index: usize,
    pub detected: bool,
    pub depth: Option<f64>,
    pub phase: Option<SquatPhase>,
    pub reps: u32,
    pub rep_completed: bool,
}

enum Evaluator {
    Squat(SquatTracker),
    Rules(RuleEvaluator),
}

/// State for a single run. Frames must be pushed in video order.
pub struct AnalysisSession {
    exercise: ExerciseType,
    evaluator: Evaluator,
    feedback: FeedbackSet,
    frames_seen: usize,
    frames_detected: usize,
}

impl AnalysisSession {
    pub fn new(exercise: ExerciseType, config: &AnalysisConfig) -> Self {
        let evaluator = match exercise {
            ExerciseType::Squat => Evaluator::Squat(SquatTracker::new(config.squat, config.thresholds)),
            _ => Evaluator::Rules(RuleEvaluator::new(config.thresholds)),
        };
        Self {
            exercise,
            evaluator,
            feedback: FeedbackSet::new(),
            frames_seen: 0,
            frames_detected: 0,
        }
    }

    /// Feeds one frame. `None` means the detector found nobody; such frames
    /// leave every piece of state untouched.
    pub fn push(&mut self, landmarks: Option<&LandmarkFrame>) -> FrameOutcome {
        let index = self.frames_seen;
        self.frames_seen += 1;

        let Some(frame) = landmarks else {
            return FrameOutcome {
                index,
                detected: false,
                depth: None,
                phase: self.phase(),
                reps: self.reps(),
                rep_completed: false,
            };
        };
        self.frames_detected += 1;

        let mut rep_completed = false;
        match &mut self.evaluator {
            Evaluator::Squat(tracker) => {
                if let Some(outcome) = tracker.push(frame) {
                    self.feedback.union(&outcome.feedback);
                    rep_completed = true;
                }
            }
            Evaluator::Rules(rules) => {
                self.feedback.union(&rules.evaluate(self.exercise, frame));
            }
        }

        FrameOutcome {
            index,
            detected: true,
            depth: Some(frame.squat_depth()),
            phase: self.phase(),
            reps: self.reps(),
            rep_completed,
        }
    }

    pub fn finish(self) -> AnalysisResult {
        let mut feedback = self.feedback;
        let reps = match &self.evaluator {
            Evaluator::Squat(tracker) => {
                let reps = tracker.reps();
                let target = tracker.config().target_reps;
                if reps == 0 {
                    feedback.insert(Cue::NoCompleteSquats);
                } else {
                    feedback.insert(Cue::RepSummary(reps));
                    if reps < target {
                        feedback.insert(Cue::MoreReps { target });
                    }
                }
                feedback.resolve_depth_conflicts();
                Some(reps)
            }
            Evaluator::Rules(_) => {
                if feedback.is_empty() {
                    feedback.insert(Cue::GoodForm(self.exercise));
                }
                None
            }
        };

        info!(
            "{} analysis finished: {} frames, {} with landmarks, {} cues",
            self.exercise,
            self.frames_seen,
            self.frames_detected,
            feedback.len()
        );
        AnalysisResult {
            feedback: feedback.messages(),
            reps,
        }
    }

    fn phase(&self) -> Option<SquatPhase> {
        match &self.evaluator {
            Evaluator::Squat(tracker) => Some(tracker.phase()),
            Evaluator::Rules(_) => None,
        }
    }

    fn reps(&self) -> u32 {
        match &self.evaluator {
            Evaluator::Squat(tracker) => tracker.reps(),
            Evaluator::Rules(_) => 0,
        }
    }
}

/// Runs a whole landmark sequence through a fresh session.
pub fn analyze_landmarks<I>(exercise: ExerciseType, frames: I, config: &AnalysisConfig) -> AnalysisResult
where
    I: IntoIterator<Item = Option<LandmarkFrame>>,
{
    let mut session = AnalysisSession::new(exercise, config);
    for frame in frames {
        session.push(frame.as_ref());
    }
    session.finish()
}

/// Video-file front end: decodes frames, asks the pose model for landmarks
/// and feeds them to a session.
#[derive(Clone)]
pub struct VideoAnalyzer {
    config: AnalysisConfig,
    video: VideoSettings,
    detectors: Arc<dyn DetectorFactory>,
}

impl VideoAnalyzer {
    pub fn new(config: AnalysisConfig, video: VideoSettings, detectors: Arc<dyn DetectorFactory>) -> Self {
        Self {
            config,
            video,
            detectors,
        }
    }

    pub fn analyze(&self, path: &Path, selector: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_traced(path, selector, |_| {})
    }

    /// Like [`analyze`](Self::analyze) but reports every frame to `observe`.
    pub fn analyze_traced(
        &self,
        path: &Path,
        selector: &str,
        mut observe: impl FnMut(&FrameOutcome),
    ) -> Result<AnalysisResult, AnalysisError> {
        let Some(exercise) = ExerciseType::from_selector(selector) else {
            info!("rejecting unknown exercise selector {:?}", selector);
            return Ok(AnalysisResult::invalid_exercise());
        };

        let mut detector = self.detectors.open().map_err(AnalysisError::Detector)?;
        let mut session = AnalysisSession::new(exercise, &self.config);
        info!("analyzing {} as {}", path.display(), exercise);

        match video::probe(path, &self.video) {
            Ok(info) => debug!(
                "video {}x{} at {:.2} fps, {:?} frames",
                info.width, info.height, info.fps, info.frame_count
            ),
            Err(e) => warn!("could not probe {}: {:#}", path.display(), e),
        }

        match VideoFrames::extract(path, &self.video) {
            Ok(frames) if frames.is_empty() => {
                warn!("ffmpeg produced no frames for {}", path.display())
            }
            Ok(frames) => {
                info!("running pose detection on {} frames", frames.len());
                for frame in frames.iter() {
                    let landmarks = match detector.detect(&frame) {
                        Ok(landmarks) => landmarks,
                        Err(e) => {
                            warn!("skipping frame {}: {:#}", frame.index, e);
                            None
                        }
                    };
                    observe(&session.push(landmarks.as_ref()));
                }
            }
            Err(e) => warn!("no frames decoded from {}: {:#}", path.display(), e),
        }

        Ok(session.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::fixtures::at_depth;
    use crate::landmarks::Joint;
    use crate::pose_bridge::stubs::{NeverOpened, NobodyInFrame};
    use crate::squat::sequences::rep;

    fn squat_frames(deepest: f64, reps: usize) -> Vec<Option<LandmarkFrame>> {
        (0..reps)
            .flat_map(|_| rep(deepest))
            .map(|d| Some(at_depth(d)))
            .collect()
    }

    #[test]
    fn test_three_clean_reps() {
        let result = analyze_landmarks(
            ExerciseType::Squat,
            squat_frames(0.09, 3),
            &AnalysisConfig::default(),
        );
        assert_eq!(result.reps, Some(3));
        assert!(result.feedback.contains(&"Excellent squat depth!".to_string()));
        assert!(result.feedback.contains(&"Completed 3 squat reps.".to_string()));
        assert!(!result.feedback.iter().any(|f| f.starts_with("Increase squat depth")));
        assert!(!result
            .feedback
            .contains(&Cue::MoreReps { target: 3 }.to_string()));
    }

    #[test]
    fn test_no_detections_means_no_squats() {
        let result = analyze_landmarks(
            ExerciseType::Squat,
            vec![None; 40],
            &AnalysisConfig::default(),
        );
        assert_eq!(
            result,
            AnalysisResult {
                feedback: vec![
                    "No complete squats detected. Please ensure proper squat form and depth."
                        .to_string()
                ],
                reps: Some(0),
            }
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["reps"], 0);
    }

    #[test]
    fn test_missing_frames_do_not_disturb_tracker() {
        let mut frames = Vec::new();
        for frame in squat_frames(0.09, 1) {
            frames.push(frame);
            frames.push(None);
        }
        let result = analyze_landmarks(ExerciseType::Squat, frames, &AnalysisConfig::default());
        assert_eq!(result.reps, Some(1));
    }

    #[test]
    fn test_short_set_suggests_more_reps() {
        let result = analyze_landmarks(
            ExerciseType::Squat,
            squat_frames(0.06, 2),
            &AnalysisConfig::default(),
        );
        assert_eq!(result.reps, Some(2));
        assert!(result.feedback.contains(&Cue::RepSummary(2).to_string()));
        assert!(result.feedback.contains(&Cue::MoreReps { target: 3 }.to_string()));
        assert!(result.feedback.contains(&Cue::SquatDepthModerate.to_string()));
    }

    #[test]
    fn test_positive_depth_wins_across_reps() {
        let mut frames = squat_frames(0.04, 1);
        frames.extend(squat_frames(0.09, 1));
        let result = analyze_landmarks(ExerciseType::Squat, frames, &AnalysisConfig::default());
        assert_eq!(result.reps, Some(2));
        assert!(result.feedback.contains(&Cue::SquatDepthExcellent.to_string()));
        assert!(!result.feedback.contains(&Cue::IncreaseSquatDepth.to_string()));
    }

    #[test]
    fn test_other_exercises_union_frame_feedback() {
        let hanging_arms = at_depth(0.09);
        let shoulders_forward = at_depth(0.09)
            .with(Joint::LeftShoulder, 0.75, 0.54)
            .with(Joint::RightShoulder, 0.85, 0.54);
        let result = analyze_landmarks(
            ExerciseType::SquatSnatch,
            vec![Some(hanging_arms.clone()), None, Some(shoulders_forward), Some(hanging_arms)],
            &AnalysisConfig::default(),
        );
        assert_eq!(result.reps, None);
        assert!(result.feedback.contains(&Cue::LockElbowsOverhead.to_string()));
        assert!(result.feedback.contains(&Cue::ShouldersOverBar.to_string()));
        assert!(result.feedback.contains(&Cue::SnatchStableCatch.to_string()));
        assert_eq!(result.feedback.len(), 3);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("reps").is_none());
    }

    #[test]
    fn test_other_exercise_without_frames_gets_default() {
        let result = analyze_landmarks(ExerciseType::Deadlift, Vec::new(), &AnalysisConfig::default());
        assert_eq!(result.feedback, vec!["Good Deadlift form detected!".to_string()]);
        assert_eq!(result.reps, None);
    }

    #[test]
    fn test_frame_outcomes() {
        let mut session = AnalysisSession::new(ExerciseType::Squat, &AnalysisConfig::default());
        let missing = session.push(None);
        assert!(!missing.detected);
        assert_eq!(missing.phase, Some(SquatPhase::Standing));

        let seen = session.push(Some(&at_depth(0.05)));
        assert_eq!(seen.index, 1);
        assert!(seen.detected);
        assert!(matches!(seen.phase, Some(SquatPhase::Descending { .. })));
    }

    #[test]
    fn test_invalid_selector_skips_everything() {
        let analyzer = VideoAnalyzer::new(
            AnalysisConfig::default(),
            VideoSettings::default(),
            Arc::new(NeverOpened),
        );
        let mut frames = 0;
        let result = analyzer
            .analyze_traced(Path::new("/nonexistent/clip.mp4"), "99", |_| frames += 1)
            .unwrap();
        assert_eq!(result, AnalysisResult::invalid_exercise());
        assert_eq!(frames, 0);
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"feedback":["Invalid exercise type!"]}"#
        );
    }

    #[test]
    fn test_unreadable_video_falls_through() {
        let analyzer = VideoAnalyzer::new(
            AnalysisConfig::default(),
            VideoSettings {
                ffmpeg: "/nonexistent/ffmpeg".to_string(),
                ffprobe: "/nonexistent/ffprobe".to_string(),
                ..VideoSettings::default()
            },
            Arc::new(NobodyInFrame),
        );
        let result = analyzer.analyze(Path::new("/nonexistent/clip.mp4"), "1").unwrap();
        assert_eq!(result.reps, Some(0));
        assert_eq!(result.feedback, vec![Cue::NoCompleteSquats.to_string()]);
    }

    #[test]
    fn test_detector_failure_is_an_error() {
        let analyzer = VideoAnalyzer::new(
            AnalysisConfig::default(),
            VideoSettings::default(),
            Arc::new(NeverOpened),
        );
        let result = analyzer.analyze(Path::new("/nonexistent/clip.mp4"), "squat");
        assert!(matches!(result, Err(AnalysisError::Detector(_))));
    }
}
