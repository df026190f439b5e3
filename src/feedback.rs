// src/feedback.rs - Coaching cues and the deduplicated set they collect into
use std::collections::BTreeSet;
use std::fmt;

use crate::exercise::ExerciseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueCategory {
    DepthPositive,
    DepthNegative,
    Other,
}

/// One piece of coaching feedback. Each cue renders to a fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cue {
    // Squat
    SquatDepthExcellent,
    SquatDepthModerate,
    IncreaseSquatDepth,
    KneesDrifting,
    BackRounded,
    FullExtension,
    RepSummary(u32),
    MoreReps { target: u32 },
    NoCompleteSquats,

    // Squat snatch
    SnatchDropDeeper,
    SnatchStableCatch,
    LockElbowsOverhead,
    ShouldersOverBar,

    // Squat clean
    CleanDropDeeper,
    CleanSolidCatch,
    RackOnShoulders,
    LiftElbows,

    // Deadlift
    KeepBackFlat,
    AdjustHips,
    PullShouldersBack,

    GoodForm(ExerciseType),
    InvalidExercise,
}

impl Cue {
    pub fn category(self) -> CueCategory {
        match self {
            Cue::SquatDepthExcellent | Cue::SquatDepthModerate => CueCategory::DepthPositive,
            Cue::IncreaseSquatDepth => CueCategory::DepthNegative,
            _ => CueCategory::Other,
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::SquatDepthExcellent => f.write_str("Excellent squat depth!"),
            Cue::SquatDepthModerate => {
                f.write_str("Good squat depth. Sink a little lower for a full range of motion.")
            }
            Cue::IncreaseSquatDepth => {
                f.write_str("Increase squat depth: hips should go lower than knees.")
            }
            Cue::KneesDrifting => {
                f.write_str("Keep your knees tracking over your toes; they are drifting sideways.")
            }
            Cue::BackRounded => f.write_str("Keep your chest up; your back is too rounded."),
            Cue::FullExtension => f.write_str("Good lockout: you stood all the way up."),
            Cue::RepSummary(1) => f.write_str("Completed 1 squat rep."),
            Cue::RepSummary(reps) => write!(f, "Completed {reps} squat reps."),
            Cue::MoreReps { target } => {
                write!(f, "Try to complete at least {target} reps for a full set.")
            }
            Cue::NoCompleteSquats => f.write_str(
                "No complete squats detected. Please ensure proper squat form and depth.",
            ),
            Cue::SnatchDropDeeper => {
                f.write_str("Drop deeper into the catch: hips should go below the knees.")
            }
            Cue::SnatchStableCatch => {
                f.write_str("Good catch depth. Maintain stability in the bottom position.")
            }
            Cue::LockElbowsOverhead => f.write_str("Lock your elbows out overhead."),
            Cue::ShouldersOverBar => f.write_str("Keep your shoulders over the bar."),
            Cue::CleanDropDeeper => {
                f.write_str("Sit deeper into the front squat when receiving the bar.")
            }
            Cue::CleanSolidCatch => f.write_str("Solid receiving depth. Drive up out of the hole."),
            Cue::RackOnShoulders => f.write_str("Rack the bar on your shoulders."),
            Cue::LiftElbows => f.write_str("Lift your elbows higher in the front rack."),
            Cue::KeepBackFlat => f.write_str("Keep your back flat throughout the pull."),
            Cue::AdjustHips => {
                f.write_str("Adjust your hip position: start with hips close to knee height.")
            }
            Cue::PullShouldersBack => f.write_str("Pull your shoulders back over the bar."),
            Cue::GoodForm(exercise) => write!(f, "Good {exercise} form detected!"),
            Cue::InvalidExercise => f.write_str("Invalid exercise type!"),
        }
    }
}

/// Cues collected over one frame or one whole run, deduplicated by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackSet {
    cues: BTreeSet<Cue>,
}

impl FeedbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(cue: Cue) -> Self {
        let mut set = Self::new();
        set.insert(cue);
        set
    }

    pub fn insert(&mut self, cue: Cue) {
        self.cues.insert(cue);
    }

    pub fn union(&mut self, other: &FeedbackSet) {
        self.cues.extend(other.iter());
    }

    pub fn contains(&self, cue: Cue) -> bool {
        self.cues.contains(&cue)
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Cue> + '_ {
        self.cues.iter().copied()
    }

    /// A positive depth cue wins over a request to squat deeper.
    pub fn resolve_depth_conflicts(&mut self) {
        let has_positive = self
            .iter()
            .any(|c| c.category() == CueCategory::DepthPositive);
        if has_positive {
            self.cues.retain(|c| c.category() != CueCategory::DepthNegative);
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.iter().map(|cue| cue.to_string()).collect()
    }
}

impl FromIterator<Cue> for FeedbackSet {
    fn from_iter<I: IntoIterator<Item = Cue>>(iter: I) -> Self {
        Self {
            cues: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_depth_overrides_increase_depth() {
        let mut set: FeedbackSet = [Cue::IncreaseSquatDepth, Cue::SquatDepthModerate, Cue::KneesDrifting]
            .into_iter()
            .collect();
        set.resolve_depth_conflicts();
        assert!(!set.contains(Cue::IncreaseSquatDepth));
        assert!(set.contains(Cue::SquatDepthModerate));
        assert!(set.contains(Cue::KneesDrifting));
    }

    #[test]
    fn test_increase_depth_kept_without_positive() {
        let mut set: FeedbackSet = [Cue::IncreaseSquatDepth, Cue::SnatchStableCatch]
            .into_iter()
            .collect();
        set.resolve_depth_conflicts();
        assert!(set.contains(Cue::IncreaseSquatDepth));
    }

    #[test]
    fn test_dedup_by_value() {
        let mut set = FeedbackSet::single(Cue::KeepBackFlat);
        set.union(&FeedbackSet::single(Cue::KeepBackFlat));
        set.insert(Cue::RepSummary(2));
        set.insert(Cue::RepSummary(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_messages() {
        assert_eq!(Cue::RepSummary(3).to_string(), "Completed 3 squat reps.");
        assert_eq!(Cue::InvalidExercise.to_string(), "Invalid exercise type!");
        assert_eq!(
            Cue::GoodForm(ExerciseType::SquatSnatch).to_string(),
            "Good Squat Snatch form detected!"
        );
    }
}
