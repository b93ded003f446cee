//! 68-point facial landmark location.
//!
//! The predictor itself is an external model behind [`LandmarkPredictor`];
//! this module only fixes the contract around it. [`OnnxLandmarkPredictor`]
//! runs a PFLD-style regression network through ONNX Runtime.

use crate::features;
use crate::normalize::FACE_SIZE;
use crate::types::{BoundingBox, Landmarks, Point, LANDMARK_COUNT};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const PFLD_INPUT_SIZE: usize = 112;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("landmark model not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("predictor returned {0} points, expected {LANDMARK_COUNT}")]
    WrongPointCount(usize),
    #[error("face must be {FACE_SIZE}x{FACE_SIZE}, got {width}x{height}")]
    UnexpectedSize { width: u32, height: u32 },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A facial landmark predictor: grayscale image plus face rectangle in,
/// ordered landmark points out.
pub trait LandmarkPredictor {
    fn predict(&mut self, image: &GrayImage, face: &BoundingBox) -> Result<Vec<Point>, LandmarkError>;
}

/// Locate the 68 landmarks of a normalized 48×48 face.
///
/// The whole image is treated as the face rectangle.
pub fn locate<P>(face: &GrayImage, predictor: &mut P) -> Result<Landmarks, LandmarkError>
where
    P: LandmarkPredictor + ?Sized,
{
    let (width, height) = face.dimensions();
    if width != FACE_SIZE || height != FACE_SIZE {
        return Err(LandmarkError::UnexpectedSize { width, height });
    }

    let points = predictor.predict(face, &BoundingBox::covering(width, height))?;
    Landmarks::try_from(points).map_err(|e| LandmarkError::WrongPointCount(e.0))
}

/// Locate landmarks for a batch of faces, returning each face's landmarks
/// together with its centroid.
pub fn locate_batch<P>(
    faces: &[GrayImage],
    predictor: &mut P,
) -> Result<Vec<(Landmarks, Point)>, LandmarkError>
where
    P: LandmarkPredictor + ?Sized,
{
    faces
        .iter()
        .map(|face| {
            let lm = locate(face, predictor)?;
            let c = features::centroid(lm.points());
            Ok((lm, c))
        })
        .collect()
}

/// 68-point landmark regressor via ONNX Runtime.
pub struct OnnxLandmarkPredictor {
    session: Session,
}

impl OnnxLandmarkPredictor {
    /// Load the landmark ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, LandmarkError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded landmark model"
        );

        Ok(Self { session })
    }

    /// Crop `face` out of `image`, resize to the network input and build a
    /// NCHW tensor in `[0, 1]` with the gray value replicated over 3 channels.
    fn preprocess(image: &GrayImage, face: &BoundingBox) -> Array4<f32> {
        let (iw, ih) = image.dimensions();
        let x = (face.x.max(0.0) as u32).min(iw.saturating_sub(1));
        let y = (face.y.max(0.0) as u32).min(ih.saturating_sub(1));
        let w = (face.width.max(1.0) as u32).min(iw - x);
        let h = (face.height.max(1.0) as u32).min(ih - y);

        let crop = image::imageops::crop_imm(image, x, y, w, h).to_image();
        let size = PFLD_INPUT_SIZE as u32;
        let resized = image::imageops::resize(&crop, size, size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, PFLD_INPUT_SIZE, PFLD_INPUT_SIZE));
        for (px, py, pixel) in resized.enumerate_pixels() {
            let v = pixel.0[0] as f32 / 255.0;
            let (px, py) = (px as usize, py as usize);
            tensor[[0, 0, py, px]] = v;
            tensor[[0, 1, py, px]] = v;
            tensor[[0, 2, py, px]] = v;
        }
        tensor
    }
}

/// Map box-relative `[x0, y0, x1, y1, ...]` network output back to image
/// coordinates.
fn decode_points(raw: &[f32], face: &BoundingBox) -> Vec<Point> {
    raw.chunks_exact(2)
        .map(|xy| Point::new(face.x + xy[0] * face.width, face.y + xy[1] * face.height))
        .collect()
}

impl LandmarkPredictor for OnnxLandmarkPredictor {
    fn predict(&mut self, image: &GrayImage, face: &BoundingBox) -> Result<Vec<Point>, LandmarkError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(LandmarkError::UnexpectedSize {
                width: image.width(),
                height: image.height(),
            });
        }

        let input = Self::preprocess(image, face);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmark extraction: {e}")))?;

        if raw.len() != LANDMARK_COUNT * 2 {
            return Err(LandmarkError::InferenceFailed(format!(
                "expected {} landmark coordinates, got {}",
                LANDMARK_COUNT * 2,
                raw.len()
            )));
        }

        let points = decode_points(raw, face);
        tracing::trace!(count = points.len(), "landmarks predicted");
        Ok(points)
    }
}
