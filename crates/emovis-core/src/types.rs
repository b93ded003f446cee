use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of facial landmarks produced by the 68-point predictor.
pub const LANDMARK_COUNT: usize = 68;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle handed to the landmark predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning a whole `width`×`height` image, i.e. corners
    /// `(0, 0)` and `(width - 1, height - 1)` inclusive.
    pub fn covering(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// Exactly [`LANDMARK_COUNT`] points in predictor order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks(Vec<Point>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongLandmarkCount(pub usize);

impl fmt::Display for WrongLandmarkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {LANDMARK_COUNT} landmarks, got {}", self.0)
    }
}

impl std::error::Error for WrongLandmarkCount {}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = WrongLandmarkCount;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.len() != LANDMARK_COUNT {
            return Err(WrongLandmarkCount(points.len()));
        }
        Ok(Self(points))
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.0
    }
}

impl Landmarks {
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

impl std::ops::Index<usize> for Landmarks {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

/// The seven basic emotions, in the network's output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

/// Coarse two-class emotional state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionState {
    Neutral,
    Positive,
}

impl EmotionState {
    pub const ALL: [EmotionState; 2] = [EmotionState::Neutral, EmotionState::Positive];

    pub fn name(self) -> &'static str {
        match self {
            EmotionState::Neutral => "neutral",
            EmotionState::Positive => "positive",
        }
    }
}

/// Label vocabulary of a classifier's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSet {
    /// Seven basic emotions.
    Emotions,
    /// Neutral / positive.
    States,
}

impl LabelSet {
    /// Infer the label set from the length of a score vector.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            7 => Some(LabelSet::Emotions),
            2 => Some(LabelSet::States),
            _ => None,
        }
    }

    pub fn class_count(self) -> usize {
        match self {
            LabelSet::Emotions => Emotion::ALL.len(),
            LabelSet::States => EmotionState::ALL.len(),
        }
    }

    pub fn label(self, index: usize) -> Option<&'static str> {
        match self {
            LabelSet::Emotions => Emotion::ALL.get(index).map(|e| e.name()),
            LabelSet::States => EmotionState::ALL.get(index).map(|s| s.name()),
        }
    }

    pub fn labels(self) -> Vec<&'static str> {
        (0..self.class_count()).filter_map(|i| self.label(i)).collect()
    }
}

/// Index of the first maximum element. `None` for an empty slice.
///
/// Ties resolve to the earliest index; NaN never replaces a current maximum.
pub fn arg_max(values: &[f32]) -> Option<usize> {
    let (&first, rest) = values.split_first()?;
    let mut max_value = first;
    let mut max_index = 0;
    for (i, &v) in rest.iter().enumerate() {
        if max_value < v {
            max_value = v;
            max_index = i + 1;
        }
    }
    Some(max_index)
}

/// Per-class scores for one face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionPrediction {
    pub scores: Vec<f32>,
    pub label_set: LabelSet,
}

impl EmotionPrediction {
    /// Highest-scoring label and its score.
    pub fn top(&self) -> Option<(&'static str, f32)> {
        let idx = arg_max(&self.scores)?;
        Some((self.label_set.label(idx)?, self.scores[idx]))
    }

    /// Scores paired with their labels, in output order.
    pub fn labelled(&self) -> Vec<(&'static str, f32)> {
        self.scores
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| self.label_set.label(i).map(|l| (l, s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_covering_box_is_inclusive() {
        let b = BoundingBox::covering(48, 48);
        assert_eq!(b, BoundingBox::new(0.0, 0.0, 48.0, 48.0));
    }

    #[test]
    fn test_landmarks_reject_wrong_count() {
        let err = Landmarks::try_from(vec![Point::default(); 67]).unwrap_err();
        assert_eq!(err, WrongLandmarkCount(67));
        assert!(Landmarks::try_from(vec![Point::default(); LANDMARK_COUNT]).is_ok());
    }

    #[test]
    fn test_landmarks_deserialize_enforces_count() {
        let short = serde_json::json!([{ "x": 1.0, "y": 2.0 }]);
        assert!(serde_json::from_value::<Landmarks>(short).is_err());

        let full = serde_json::Value::Array(
            (0..LANDMARK_COUNT).map(|i| serde_json::json!({ "x": i, "y": 0 })).collect(),
        );
        let lm: Landmarks = serde_json::from_value(full).unwrap();
        assert_eq!(lm[67], Point::new(67.0, 0.0));
    }

    #[test]
    fn test_arg_max_first_wins_on_tie() {
        assert_eq!(arg_max(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(arg_max(&[0.9]), Some(0));
        assert_eq!(arg_max(&[]), None);
    }

    #[test]
    fn test_arg_max_ignores_nan() {
        assert_eq!(arg_max(&[0.2, f32::NAN, 0.5]), Some(2));
    }

    #[test]
    fn test_label_set_from_len() {
        assert_eq!(LabelSet::from_len(7), Some(LabelSet::Emotions));
        assert_eq!(LabelSet::from_len(2), Some(LabelSet::States));
        assert_eq!(LabelSet::from_len(5), None);
        for set in [LabelSet::Emotions, LabelSet::States] {
            assert_eq!(LabelSet::from_len(set.class_count()), Some(set));
        }
    }

    #[test]
    fn test_emotion_label_order() {
        assert_eq!(
            LabelSet::Emotions.labels(),
            vec!["anger", "disgust", "fear", "happy", "sad", "surprise", "neutral"]
        );
        assert_eq!(LabelSet::States.labels(), vec!["neutral", "positive"]);
    }

    #[test]
    fn test_prediction_top() {
        let p = EmotionPrediction {
            scores: vec![0.05, 0.0, 0.05, 0.6, 0.1, 0.1, 0.1],
            label_set: LabelSet::Emotions,
        };
        let (label, score) = p.top().unwrap();
        assert_eq!(label, "happy");
        assert!((score - 0.6).abs() < 1e-6);
    }
}
