use emovis_core::ModelVariant;
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Input assembly expected by the emotion model.
    pub variant: ModelVariant,
    /// Emotion model file name, relative to `model_dir` unless absolute.
    /// `None` picks the file matching `variant`.
    pub emotion_model: Option<String>,
    /// Landmark model file name, relative to `model_dir` unless absolute.
    pub landmark_model: String,
}

impl Config {
    /// Load configuration from `EMOVIS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = get("EMOVIS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(emovis_core::default_model_dir);

        let variant = match get("EMOVIS_MODEL_VARIANT") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring EMOVIS_MODEL_VARIANT");
                ModelVariant::default()
            }),
            None => ModelVariant::default(),
        };

        Self {
            model_dir,
            variant,
            emotion_model: get("EMOVIS_EMOTION_MODEL"),
            landmark_model: get("EMOVIS_LANDMARK_MODEL").unwrap_or_else(|| "landmarks_68.onnx".to_string()),
        }
    }

    /// Path to the emotion classification model.
    pub fn emotion_model_path(&self) -> String {
        match &self.emotion_model {
            Some(file) => self.resolve(file),
            None => self.resolve(default_emotion_model(self.variant)),
        }
    }

    /// Path to the 68-point landmark model.
    pub fn landmark_model_path(&self) -> String {
        self.resolve(&self.landmark_model)
    }

    fn resolve(&self, file: &str) -> String {
        self.model_dir.join(file).to_string_lossy().into_owned()
    }
}

fn default_emotion_model(variant: ModelVariant) -> &'static str {
    match variant {
        ModelVariant::Geometric => "emotion_ava.onnx",
        ModelVariant::PixelsOnly => "emotion_ava_ii.onnx",
    }
}
