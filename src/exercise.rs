// src/exercise.rs
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExerciseType {
    Squat,
    SquatSnatch,
    SquatClean,
    Deadlift,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 4] = [
        ExerciseType::Squat,
        ExerciseType::SquatSnatch,
        ExerciseType::SquatClean,
        ExerciseType::Deadlift,
    ];

    /// Numeric id used by the upload form.
    pub fn id(self) -> u32 {
        match self {
            ExerciseType::Squat => 1,
            ExerciseType::SquatSnatch => 2,
            ExerciseType::SquatClean => 3,
            ExerciseType::Deadlift => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == id)
    }

    /// Parses a form selector: either the numeric id or a name such as
    /// `"Squat Snatch"`, `"squat_snatch"` or `"squatsnatch"`.
    pub fn from_selector(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if let Ok(id) = selector.parse::<u32>() {
            return Self::from_id(id);
        }

        let folded: String = selector
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "squat" | "backsquat" => Some(ExerciseType::Squat),
            "squatsnatch" => Some(ExerciseType::SquatSnatch),
            "squatclean" => Some(ExerciseType::SquatClean),
            "deadlift" => Some(ExerciseType::Deadlift),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ExerciseType::Squat => "Squat",
            ExerciseType::SquatSnatch => "Squat Snatch",
            ExerciseType::SquatClean => "Squat Clean",
            ExerciseType::Deadlift => "Deadlift",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
