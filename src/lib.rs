// src/lib.rs - Barbell lift form analysis
pub mod analysis;
pub mod config;
pub mod error;
pub mod exercise;
pub mod feedback;
pub mod landmarks;
pub mod pose_bridge;
pub mod rules;
pub mod server;
pub mod squat;
pub mod trace;
pub mod video;

pub use analysis::{analyze_landmarks, AnalysisConfig, AnalysisResult, AnalysisSession, VideoAnalyzer};
pub use error::{AnalysisError, ApiError, ServerError};
pub use exercise::ExerciseType;
pub use feedback::{Cue, FeedbackSet};
pub use landmarks::{Joint, LandmarkFrame};
pub use pose_bridge::{DetectorFactory, LandmarkSource, PoseSettings};
pub use squat::{SquatPhase, SquatTracker};
