// src/landmarks.rs - Body joints used by the form rules
use nalgebra::Point2;
use tracing::debug;

/// Joints the exercise rules look at, tagged with their MediaPipe pose index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const COUNT: usize = 12;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    /// Index of this joint in MediaPipe's 33-point pose output.
    pub fn mediapipe_index(self) -> usize {
        match self {
            Joint::LeftShoulder => 11,
            Joint::RightShoulder => 12,
            Joint::LeftElbow => 13,
            Joint::RightElbow => 14,
            Joint::LeftWrist => 15,
            Joint::RightWrist => 16,
            Joint::LeftHip => 23,
            Joint::RightHip => 24,
            Joint::LeftKnee => 25,
            Joint::RightKnee => 26,
            Joint::LeftAnkle => 27,
            Joint::RightAnkle => 28,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// A left/right pair of the same joint, read out of one frame.
#[derive(Debug, Clone, Copy)]
pub struct Pair {
    pub left: Point2<f64>,
    pub right: Point2<f64>,
}

impl Pair {
    pub fn mean(&self) -> Point2<f64> {
        nalgebra::center(&self.left, &self.right)
    }

    pub fn both(&self, mut check: impl FnMut(&Point2<f64>) -> bool) -> bool {
        check(&self.left) && check(&self.right)
    }

    /// Like [`both`](Self::both) but compares each side with the same side
    /// of `other`.
    pub fn both_with(
        &self,
        other: &Pair,
        mut check: impl FnMut(&Point2<f64>, &Point2<f64>) -> bool,
    ) -> bool {
        check(&self.left, &other.left) && check(&self.right, &other.right)
    }

    pub fn sides(&self) -> [&Point2<f64>; 2] {
        [&self.left, &self.right]
    }
}

/// Every tracked joint's normalized position for one video frame.
///
/// Coordinates are in [0, 1] image space with y growing downward, so a larger
/// y means lower in the picture. A frame is only ever built with all joints
/// present.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [Point2<f64>; Joint::COUNT],
}

impl LandmarkFrame {
    pub fn new(points: [Point2<f64>; Joint::COUNT]) -> Self {
        Self { points }
    }

    /// Builds a frame from a 33-point MediaPipe pose. Returns `None` when the
    /// pose is too short to contain every required joint.
    pub fn from_mediapipe(pose: &[[f64; 2]]) -> Option<Self> {
        let mut points = [Point2::origin(); Joint::COUNT];
        for joint in Joint::ALL {
            let Some(&[x, y]) = pose.get(joint.mediapipe_index()) else {
                debug!("pose has no {}", joint.name());
                return None;
            };
            if !x.is_finite() || !y.is_finite() {
                debug!("pose has a non-finite {}", joint.name());
                return None;
            }
            points[joint.slot()] = Point2::new(x, y);
        }
        Some(Self { points })
    }

    pub fn get(&self, joint: Joint) -> Point2<f64> {
        self.points[joint.slot()]
    }

    pub fn with(mut self, joint: Joint, x: f64, y: f64) -> Self {
        self.points[joint.slot()] = Point2::new(x, y);
        self
    }

    pub fn shoulders(&self) -> Pair {
        self.pair(Joint::LeftShoulder, Joint::RightShoulder)
    }

    pub fn elbows(&self) -> Pair {
        self.pair(Joint::LeftElbow, Joint::RightElbow)
    }

    pub fn wrists(&self) -> Pair {
        self.pair(Joint::LeftWrist, Joint::RightWrist)
    }

    pub fn hips(&self) -> Pair {
        self.pair(Joint::LeftHip, Joint::RightHip)
    }

    pub fn knees(&self) -> Pair {
        self.pair(Joint::LeftKnee, Joint::RightKnee)
    }

    pub fn ankles(&self) -> Pair {
        self.pair(Joint::LeftAnkle, Joint::RightAnkle)
    }

    /// Averaged hip y minus averaged knee y. Positive once the hips sit
    /// below the knees.
    pub fn squat_depth(&self) -> f64 {
        self.hips().mean().y - self.knees().mean().y
    }

    fn pair(&self, left: Joint, right: Joint) -> Pair {
        Pair {
            left: self.get(left),
            right: self.get(right),
        }
    }
}
