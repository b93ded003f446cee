use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emovis_core::{pipeline, EmotionModel, LabelSet, ModelVariant, OnnxEmotionModel, OnnxLandmarkPredictor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "emovis", about = "Facial landmark features and emotion classification")]
struct Cli {
    /// Directory containing the ONNX models (overrides EMOVIS_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print landmark geometry for a face image as JSON
    Features {
        /// Face crop image file
        image: PathBuf,
        /// Print raw values instead of values divided by the normalization divisor
        #[arg(long)]
        raw: bool,
    },
    /// Classify the emotion of one or more face crops
    Classify {
        /// Face crop image files
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Model variant: "ava" (pixels + geometry) or "ava-ii" (pixels only)
        #[arg(long)]
        variant: Option<String>,
    },
    /// List the label sets a model may output
    Labels,
}

#[derive(Serialize)]
struct LabelScore {
    label: &'static str,
    score: f32,
}

#[derive(Serialize)]
struct ClassifyReport {
    image: String,
    label: Option<&'static str>,
    score: Option<f32>,
    label_set: LabelSet,
    scores: Vec<LabelScore>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Features { image, raw } => features(&config, &image, raw),
        Commands::Classify { images, variant } => {
            if let Some(v) = variant {
                config.variant = v.parse::<ModelVariant>()?;
            }
            classify(&config, &images)
        }
        Commands::Labels => {
            for set in [LabelSet::Emotions, LabelSet::States] {
                println!("{}: {}", serde_json::to_string(&set)?, set.labels().join(", "));
            }
            Ok(())
        }
    }
}

fn load_face(path: &Path) -> Result<image::GrayImage> {
    let decoded = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let face = emovis_core::normalize::normalize_dynamic(&decoded)
        .with_context(|| format!("failed to normalize {}", path.display()))?;
    Ok(face)
}

fn features(config: &Config, image: &Path, raw: bool) -> Result<()> {
    let mut predictor = OnnxLandmarkPredictor::load(&config.landmark_model_path())?;
    let face = load_face(image)?;

    let features = emovis_core::FaceFeatures::with_geometry(&face, &mut predictor)?;
    let geometry = features
        .geometry
        .context("landmark geometry missing after prediction")?;
    let geometry = if raw { geometry } else { geometry.scaled() };

    println!("{}", serde_json::to_string_pretty(&geometry)?);
    Ok(())
}

fn classify(config: &Config, images: &[PathBuf]) -> Result<()> {
    let mut model = OnnxEmotionModel::load(&config.emotion_model_path(), config.variant)?;
    tracing::info!(variant = %model.variant(), count = images.len(), "classifying");

    let mut predictor = if config.variant.needs_geometry() {
        Some(OnnxLandmarkPredictor::load(&config.landmark_model_path())?)
    } else {
        None
    };

    let normalized = images
        .iter()
        .map(|path| load_face(path))
        .collect::<Result<Vec<_>>>()?;
    let faces = match predictor.as_mut() {
        Some(p) => pipeline::prepare_batch(&normalized, p, config.variant)?,
        None => normalized.iter().map(emovis_core::FaceFeatures::pixels_only).collect(),
    };

    let predictions = pipeline::classify(&mut model, &faces)?;

    for (path, prediction) in images.iter().zip(predictions) {
        let top = prediction.top();
        let report = ClassifyReport {
            image: path.display().to_string(),
            label: top.map(|(l, _)| l),
            score: top.map(|(_, s)| s),
            label_set: prediction.label_set,
            scores: prediction
                .labelled()
                .into_iter()
                .map(|(label, score)| LabelScore { label, score })
                .collect(),
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}
