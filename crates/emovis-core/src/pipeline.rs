//! Face crop → emotion scores.

use crate::classifier::{self, ClassifierError, EmotionModel, ModelVariant};
use crate::features::{FaceFeatures, FeatureError, GeometricFeatures};
use crate::landmarks::{self, LandmarkPredictor};
use crate::normalize::{self, NormalizeError};
use crate::types::{EmotionPrediction, LabelSet};
use image::GrayImage;
use ndarray::ArrayViewD;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("features: {0}")]
    Features(#[from] FeatureError),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Compute the features `variant` needs for one raw face crop.
///
/// Landmarks are only predicted when the variant consumes geometry.
pub fn prepare<P>(
    face: ArrayViewD<'_, u8>,
    predictor: &mut P,
    variant: ModelVariant,
) -> Result<FaceFeatures, RecognizeError>
where
    P: LandmarkPredictor + ?Sized,
{
    let normalized = normalize::normalize(face)?;
    prepare_normalized(&normalized, predictor, variant)
}

/// Like [`prepare`], for a face that is already 48×48 grayscale.
pub fn prepare_normalized<P>(
    face: &GrayImage,
    predictor: &mut P,
    variant: ModelVariant,
) -> Result<FaceFeatures, RecognizeError>
where
    P: LandmarkPredictor + ?Sized,
{
    let features = if variant.needs_geometry() {
        FaceFeatures::with_geometry(face, predictor)?
    } else {
        FaceFeatures::pixels_only(face)
    };
    Ok(features)
}

/// Like [`prepare_normalized`] for a batch; landmarks for the whole batch are
/// located before any geometry is computed.
pub fn prepare_batch<P>(
    faces: &[GrayImage],
    predictor: &mut P,
    variant: ModelVariant,
) -> Result<Vec<FaceFeatures>, RecognizeError>
where
    P: LandmarkPredictor + ?Sized,
{
    if !variant.needs_geometry() {
        return Ok(faces.iter().map(FaceFeatures::pixels_only).collect());
    }

    let located = landmarks::locate_batch(faces, predictor).map_err(FeatureError::from)?;
    Ok(faces
        .iter()
        .zip(located)
        .map(|(face, (lm, center))| FaceFeatures {
            pixels: normalize::to_pixels(face),
            geometry: Some(GeometricFeatures::around(&lm, center)),
        })
        .collect())
}

/// Classify a batch of prepared faces.
pub fn classify<M>(model: &mut M, faces: &[FaceFeatures]) -> Result<Vec<EmotionPrediction>, RecognizeError>
where
    M: EmotionModel + ?Sized,
{
    let inputs = classifier::assemble_inputs(model.variant(), faces)?;
    let rows = model.predict(&inputs)?;

    if rows.len() != faces.len() {
        return Err(ClassifierError::InferenceFailed(format!(
            "expected {} score rows, got {}",
            faces.len(),
            rows.len()
        ))
        .into());
    }

    rows.into_iter()
        .map(|scores| -> Result<EmotionPrediction, RecognizeError> {
            let label_set =
                LabelSet::from_len(scores.len()).ok_or(ClassifierError::UnknownLabelSet(scores.len()))?;
            Ok(EmotionPrediction { scores, label_set })
        })
        .collect()
}

/// Recognize the emotion of a single face crop.
pub fn recognize_emotion<M, P>(
    model: &mut M,
    predictor: &mut P,
    face: ArrayViewD<'_, u8>,
) -> Result<EmotionPrediction, RecognizeError>
where
    M: EmotionModel + ?Sized,
    P: LandmarkPredictor + ?Sized,
{
    let features = prepare(face, predictor, model.variant())?;
    let mut predictions = classify(model, std::slice::from_ref(&features))?;
    let prediction = predictions
        .pop()
        .ok_or_else(|| ClassifierError::InferenceFailed("no prediction returned".into()))?;

    if let Some((label, score)) = prediction.top() {
        tracing::debug!(label, score, variant = %model.variant(), "emotion recognized");
    }
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ModelInputs;
    use crate::landmarks::LandmarkError;
    use crate::types::{BoundingBox, Point, LANDMARK_COUNT};
    use ndarray::{ArrayD, IxDyn};

    struct StubModel {
        variant: ModelVariant,
        scores: Vec<f32>,
        seen_geometry: Option<bool>,
    }

    impl EmotionModel for StubModel {
        fn variant(&self) -> ModelVariant {
            self.variant
        }

        fn predict(&mut self, inputs: &ModelInputs) -> Result<Vec<Vec<f32>>, ClassifierError> {
            self.seen_geometry = Some(inputs.geometry.is_some());
            Ok(vec![self.scores.clone(); inputs.batch_size()])
        }
    }

    struct StubPredictor {
        calls: usize,
    }

    impl LandmarkPredictor for StubPredictor {
        fn predict(&mut self, _image: &GrayImage, _face: &BoundingBox) -> Result<Vec<Point>, LandmarkError> {
            self.calls += 1;
            Ok((0..LANDMARK_COUNT).map(|i| Point::new(i as f32 % 48.0, 24.0)).collect())
        }
    }

    fn crop() -> ArrayD<u8> {
        ArrayD::from_elem(IxDyn(&[120, 100, 3]), 77)
    }

    #[test]
    fn test_recognize_geometric_variant() {
        let mut model = StubModel {
            variant: ModelVariant::Geometric,
            scores: vec![0.0, 0.0, 0.1, 0.7, 0.1, 0.0, 0.1],
            seen_geometry: None,
        };
        let mut predictor = StubPredictor { calls: 0 };

        let prediction = recognize_emotion(&mut model, &mut predictor, crop().view()).unwrap();
        assert_eq!(prediction.label_set, LabelSet::Emotions);
        assert_eq!(prediction.top().unwrap().0, "happy");
        assert_eq!(predictor.calls, 1);
        assert_eq!(model.seen_geometry, Some(true));
    }

    #[test]
    fn test_recognize_pixels_only_skips_landmarks() {
        let mut model = StubModel {
            variant: ModelVariant::PixelsOnly,
            scores: vec![0.2, 0.8],
            seen_geometry: None,
        };
        let mut predictor = StubPredictor { calls: 0 };

        let prediction = recognize_emotion(&mut model, &mut predictor, crop().view()).unwrap();
        assert_eq!(prediction.label_set, LabelSet::States);
        assert_eq!(prediction.top().unwrap().0, "positive");
        assert_eq!(predictor.calls, 0);
        assert_eq!(model.seen_geometry, Some(false));
    }

    #[test]
    fn test_unknown_label_set() {
        let mut model = StubModel {
            variant: ModelVariant::PixelsOnly,
            scores: vec![0.2, 0.3, 0.5],
            seen_geometry: None,
        };
        let mut predictor = StubPredictor { calls: 0 };
        let err = recognize_emotion(&mut model, &mut predictor, crop().view()).unwrap_err();
        assert!(matches!(err, RecognizeError::Classifier(ClassifierError::UnknownLabelSet(3))));
    }

    #[test]
    fn test_invalid_crop_rejected_before_inference() {
        let mut model = StubModel {
            variant: ModelVariant::Geometric,
            scores: vec![1.0; 7],
            seen_geometry: None,
        };
        let mut predictor = StubPredictor { calls: 0 };
        let bad = ArrayD::<u8>::zeros(IxDyn(&[2, 2, 2, 2]));
        let err = recognize_emotion(&mut model, &mut predictor, bad.view()).unwrap_err();
        assert!(matches!(err, RecognizeError::Normalize(NormalizeError::InvalidDimensions(4))));
        assert!(model.seen_geometry.is_none());
    }

    #[test]
    fn test_classify_batch() {
        let mut model = StubModel {
            variant: ModelVariant::Geometric,
            scores: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            seen_geometry: None,
        };
        let mut predictor = StubPredictor { calls: 0 };
        let faces: Vec<FaceFeatures> = (0..3)
            .map(|_| prepare(crop().view(), &mut predictor, ModelVariant::Geometric).unwrap())
            .collect();
        let predictions = classify(&mut model, &faces).unwrap();
        assert_eq!(predictions.len(), 3);
        assert!(predictions.iter().all(|p| p.top().unwrap().0 == "anger"));
    }

    #[test]
    fn test_prepare_batch_matches_single_faces() {
        let faces: Vec<GrayImage> = (0..2u8)
            .map(|i| GrayImage::from_pixel(48, 48, image::Luma([40 + i * 100])))
            .collect();
        let mut predictor = StubPredictor { calls: 0 };

        let batch = prepare_batch(&faces, &mut predictor, ModelVariant::Geometric).unwrap();
        assert_eq!(predictor.calls, 2);
        for (face, prepared) in faces.iter().zip(&batch) {
            let single = prepare_normalized(face, &mut predictor, ModelVariant::Geometric).unwrap();
            assert_eq!(prepared.pixels, single.pixels);
            assert_eq!(prepared.geometry, single.geometry);
        }
    }

    #[test]
    fn test_prepare_batch_pixels_only_skips_landmarks() {
        let faces = vec![GrayImage::new(48, 48); 3];
        let mut predictor = StubPredictor { calls: 0 };
        let batch = prepare_batch(&faces, &mut predictor, ModelVariant::PixelsOnly).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(predictor.calls, 0);
        assert!(batch.iter().all(|f| f.geometry.is_none()));
    }

    #[test]
    fn test_prepare_batch_rejects_unnormalized_face() {
        let faces = vec![GrayImage::new(48, 48), GrayImage::new(64, 64)];
        let mut predictor = StubPredictor { calls: 0 };
        let err = prepare_batch(&faces, &mut predictor, ModelVariant::Geometric).unwrap_err();
        assert!(matches!(
            err,
            RecognizeError::Features(FeatureError::Landmarks(LandmarkError::UnexpectedSize { width: 64, height: 64 }))
        ));
    }
}
