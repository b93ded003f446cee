//! Landmark geometry used as auxiliary classifier input.
//!
//! For each of the 68 landmarks the classifier receives the point itself, its
//! Euclidean distance from the landmark centroid, and a clockwise angle
//! between the point and the centroid. The angle is the difference of the two
//! vectors' own angles measured from the image origin, not the direction of
//! the point as seen from the centroid; trained networks expect exactly this
//! quantity, so it must not be "corrected".

use crate::landmarks::{self, LandmarkError, LandmarkPredictor};
use crate::normalize::{self, NormalizeError};
use crate::types::{Landmarks, Point};
use image::GrayImage;
use ndarray::{Array2, ArrayViewD};
use serde::Serialize;
use std::f32::consts::TAU;
use thiserror::Error;

/// Divisor applied to coordinates, distances and angles before inference.
pub const NORMALIZATION_DIVISOR: f32 = 50.0;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("landmarks: {0}")]
    Landmarks(#[from] LandmarkError),
}

/// Arithmetic mean of a set of points. Returns the origin for an empty set.
///
/// Accumulates in `f64` so that a set of identical points yields that point
/// exactly.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let (sx, sy) = points.iter().fold((0.0f64, 0.0f64), |(sx, sy), p| {
        (sx + p.x as f64, sy + p.y as f64)
    });
    let n = points.len() as f64;
    Point::new((sx / n) as f32, (sy / n) as f32)
}

/// Clockwise angle from `p2` to `p1`, both taken as vectors from the origin:
/// `(atan2(p1) - atan2(p2)) mod 2π`, always in `[0, 2π)`.
pub fn angle_between(p1: Point, p2: Point) -> f32 {
    let ang1 = p1.y.atan2(p1.x);
    let ang2 = p2.y.atan2(p2.x);
    wrap_angle(ang1 - ang2)
}

fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid of a tiny negative value can round up to exactly TAU.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Distance of every point from `center`, in input order.
pub fn distances(points: &[Point], center: Point) -> Vec<f32> {
    points.iter().map(|p| p.distance(&center)).collect()
}

/// [`angle_between`] every point and `center`, in input order.
pub fn angles(points: &[Point], center: Point) -> Vec<f32> {
    points.iter().map(|&p| angle_between(p, center)).collect()
}

/// Per-landmark geometry for one face. The three vectors are parallel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometricFeatures {
    pub centroid: Point,
    pub points: Vec<Point>,
    pub distances: Vec<f32>,
    pub angles: Vec<f32>,
}

impl GeometricFeatures {
    /// Compute raw (unscaled) geometry from a landmark set.
    pub fn compute(landmarks: &Landmarks) -> Self {
        Self::around(landmarks, centroid(landmarks.points()))
    }

    /// Raw geometry relative to an already known centroid.
    pub fn around(landmarks: &Landmarks, center: Point) -> Self {
        let points = landmarks.points().to_vec();
        Self {
            centroid: center,
            distances: distances(&points, center),
            angles: angles(&points, center),
            points,
        }
    }

    /// Divide every quantity by [`NORMALIZATION_DIVISOR`].
    pub fn scaled(&self) -> Self {
        let s = |v: f32| v / NORMALIZATION_DIVISOR;
        Self {
            centroid: Point::new(s(self.centroid.x), s(self.centroid.y)),
            points: self.points.iter().map(|p| Point::new(s(p.x), s(p.y))).collect(),
            distances: self.distances.iter().copied().map(s).collect(),
            angles: self.angles.iter().copied().map(s).collect(),
        }
    }
}

/// Everything the classifier can consume for one face.
#[derive(Debug, Clone)]
pub struct FaceFeatures {
    /// Normalized 48×48 pixels as `0..=255` floats; scaling is up to the model variant.
    pub pixels: Array2<f32>,
    /// Raw landmark geometry; absent when only pixels were requested.
    pub geometry: Option<GeometricFeatures>,
}

impl FaceFeatures {
    /// Pixels only; no landmark prediction.
    pub fn pixels_only(face: &GrayImage) -> Self {
        Self {
            pixels: normalize::to_pixels(face),
            geometry: None,
        }
    }

    /// Pixels plus landmark geometry from an already normalized face.
    pub fn with_geometry<P>(face: &GrayImage, predictor: &mut P) -> Result<Self, FeatureError>
    where
        P: LandmarkPredictor + ?Sized,
    {
        let lm = landmarks::locate(face, predictor)?;
        Ok(Self {
            pixels: normalize::to_pixels(face),
            geometry: Some(GeometricFeatures::compute(&lm)),
        })
    }

    /// Normalize a raw face array, then compute pixels and geometry.
    pub fn extract<P>(face: ArrayViewD<'_, u8>, predictor: &mut P) -> Result<Self, FeatureError>
    where
        P: LandmarkPredictor + ?Sized,
    {
        let normalized = normalize::normalize(face)?;
        Self::with_geometry(&normalized, predictor)
    }
}
