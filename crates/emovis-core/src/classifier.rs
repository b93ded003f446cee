//! Emotion classifier via ONNX Runtime.
//!
//! Two network variants exist: one consumes only the 48×48 face pixels, the
//! other additionally consumes the scaled landmark geometry. The variant is a
//! configuration choice and decides how inputs are assembled.

use crate::features::FaceFeatures;
use crate::normalize::FACE_SIZE;
use crate::types::LANDMARK_COUNT;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const SIDE: usize = FACE_SIZE as usize;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("emotion model not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("{variant} model expects {expected} inputs, found {actual}")]
    InputMismatch {
        variant: ModelVariant,
        expected: usize,
        actual: usize,
    },
    #[error("face {0} has no landmark geometry but the model requires it")]
    MissingGeometry(usize),
    #[error("empty batch")]
    EmptyBatch,
    #[error("no label set has {0} classes")]
    UnknownLabelSet(usize),
    #[error("unknown model variant: {0:?} (expected \"ava\" or \"ava-ii\")")]
    UnknownVariant(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Which input assembly the loaded network expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Pixels plus landmark points, distances and angles.
    #[default]
    #[serde(rename = "ava")]
    Geometric,
    /// Pixels only.
    #[serde(rename = "ava-ii")]
    PixelsOnly,
}

impl ModelVariant {
    /// Number of network inputs for this variant.
    pub fn input_count(self) -> usize {
        match self {
            ModelVariant::Geometric => 4,
            ModelVariant::PixelsOnly => 1,
        }
    }

    pub fn needs_geometry(self) -> bool {
        matches!(self, ModelVariant::Geometric)
    }

    /// Factor applied to `0..=255` pixels. Only the geometric network was
    /// trained on `[0, 1]` input.
    pub fn pixel_scale(self) -> f32 {
        match self {
            ModelVariant::Geometric => 1.0 / 255.0,
            ModelVariant::PixelsOnly => 1.0,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelVariant::Geometric => "ava",
            ModelVariant::PixelsOnly => "ava-ii",
        })
    }
}

impl FromStr for ModelVariant {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ava" | "geometric" => Ok(ModelVariant::Geometric),
            "ava-ii" | "pixels" | "pixels-only" => Ok(ModelVariant::PixelsOnly),
            _ => Err(ClassifierError::UnknownVariant(s.to_string())),
        }
    }
}

/// Landmark-derived tensors, already divided by the normalization divisor.
#[derive(Debug, Clone)]
pub struct GeometryTensors {
    /// `N×1×68×2`
    pub landmarks: Array4<f32>,
    /// `N×1×68×1`
    pub distances: Array4<f32>,
    /// `N×1×68×1`
    pub angles: Array4<f32>,
}

/// A batch of network inputs.
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// `N×48×48×1`, scaled by [`ModelVariant::pixel_scale`].
    pub pixels: Array4<f32>,
    pub geometry: Option<GeometryTensors>,
}

impl ModelInputs {
    pub fn batch_size(&self) -> usize {
        self.pixels.shape()[0]
    }
}

/// Build the input tensors for `variant` from a batch of faces.
pub fn assemble_inputs(
    variant: ModelVariant,
    faces: &[FaceFeatures],
) -> Result<ModelInputs, ClassifierError> {
    if faces.is_empty() {
        return Err(ClassifierError::EmptyBatch);
    }
    let n = faces.len();

    let scale = variant.pixel_scale();
    let mut pixels = Array4::<f32>::zeros((n, SIDE, SIDE, 1));
    for (i, face) in faces.iter().enumerate() {
        for ((y, x), &v) in face.pixels.indexed_iter() {
            if y < SIDE && x < SIDE {
                pixels[[i, y, x, 0]] = v * scale;
            }
        }
    }

    if !variant.needs_geometry() {
        return Ok(ModelInputs { pixels, geometry: None });
    }

    let mut landmarks = Array4::<f32>::zeros((n, 1, LANDMARK_COUNT, 2));
    let mut distances = Array4::<f32>::zeros((n, 1, LANDMARK_COUNT, 1));
    let mut angles = Array4::<f32>::zeros((n, 1, LANDMARK_COUNT, 1));

    for (i, face) in faces.iter().enumerate() {
        let geometry = face
            .geometry
            .as_ref()
            .ok_or(ClassifierError::MissingGeometry(i))?
            .scaled();
        for (j, p) in geometry.points.iter().take(LANDMARK_COUNT).enumerate() {
            landmarks[[i, 0, j, 0]] = p.x;
            landmarks[[i, 0, j, 1]] = p.y;
            distances[[i, 0, j, 0]] = geometry.distances[j];
            angles[[i, 0, j, 0]] = geometry.angles[j];
        }
    }

    Ok(ModelInputs {
        pixels,
        geometry: Some(GeometryTensors {
            landmarks,
            distances,
            angles,
        }),
    })
}

/// A network mapping a batch of inputs to per-class scores, one row per face.
pub trait EmotionModel {
    fn variant(&self) -> ModelVariant;
    fn predict(&mut self, inputs: &ModelInputs) -> Result<Vec<Vec<f32>>, ClassifierError>;
}

/// Emotion network loaded from an ONNX file.
pub struct OnnxEmotionModel {
    session: Session,
    variant: ModelVariant,
}

impl OnnxEmotionModel {
    /// Load the emotion ONNX model and check its input arity against `variant`.
    pub fn load(model_path: &str, variant: ModelVariant) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let actual = session.inputs().len();
        tracing::info!(
            path = model_path,
            %variant,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        if actual != variant.input_count() {
            return Err(ClassifierError::InputMismatch {
                variant,
                expected: variant.input_count(),
                actual,
            });
        }

        Ok(Self { session, variant })
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn predict(&mut self, inputs: &ModelInputs) -> Result<Vec<Vec<f32>>, ClassifierError> {
        let batch = inputs.batch_size();

        let raw: Vec<f32> = match (self.variant, inputs.geometry.as_ref()) {
            (ModelVariant::Geometric, Some(g)) => {
                let outputs = self.session.run(ort::inputs![
                    TensorRef::from_array_view(inputs.pixels.view())?,
                    TensorRef::from_array_view(g.landmarks.view())?,
                    TensorRef::from_array_view(g.distances.view())?,
                    TensorRef::from_array_view(g.angles.view())?,
                ])?;
                let (_, data) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ClassifierError::InferenceFailed(format!("scores: {e}")))?;
                data.to_vec()
            }
            (ModelVariant::Geometric, None) => return Err(ClassifierError::MissingGeometry(0)),
            (ModelVariant::PixelsOnly, _) => {
                let outputs = self
                    .session
                    .run(ort::inputs![TensorRef::from_array_view(inputs.pixels.view())?])?;
                let (_, data) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ClassifierError::InferenceFailed(format!("scores: {e}")))?;
                data.to_vec()
            }
        };

        split_scores(raw, batch)
    }
}

/// Split a flat `N×C` score buffer into `N` rows.
fn split_scores(raw: Vec<f32>, batch: usize) -> Result<Vec<Vec<f32>>, ClassifierError> {
    if batch == 0 || raw.is_empty() || raw.len() % batch != 0 {
        return Err(ClassifierError::InferenceFailed(format!(
            "cannot split {} scores into {batch} rows",
            raw.len()
        )));
    }
    let classes = raw.len() / batch;
    Ok(raw.chunks_exact(classes).map(<[f32]>::to_vec).collect())
}
