//! emovis-core: facial emotion recognition building blocks.
//!
//! Normalizes face crops to 48×48 grayscale, locates 68 facial landmarks,
//! derives centroid distance/angle features and runs an emotion network,
//! with both models executed via ONNX Runtime.

pub mod classifier;
pub mod features;
pub mod landmarks;
pub mod normalize;
pub mod pipeline;
pub mod types;

pub use classifier::{EmotionModel, ModelVariant, OnnxEmotionModel};
pub use features::{FaceFeatures, GeometricFeatures};
pub use landmarks::{LandmarkPredictor, OnnxLandmarkPredictor};
pub use pipeline::{recognize_emotion, RecognizeError};
pub use types::{arg_max, BoundingBox, Emotion, EmotionPrediction, EmotionState, LabelSet, Landmarks, Point};

use std::path::PathBuf;

/// Default directory for ONNX model files: `$XDG_DATA_HOME/emovis/models`,
/// falling back to `~/.local/share/emovis/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("emovis")
        .join("models")
}
