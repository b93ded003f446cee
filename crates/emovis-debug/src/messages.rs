//! Wire types for the image and detected-faces streams.
//!
//! One JSON object per line, tagged by `topic`.

use emovis_core::Point;
use image::{Rgb, RgbImage};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("{encoding} image is empty ({width}x{height})")]
    Empty {
        encoding: Encoding,
        width: u32,
        height: u32,
    },
    #[error("{encoding} image {width}x{height} needs {expected} bytes, got {actual}")]
    BadLength {
        encoding: Encoding,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "topic", rename_all = "lowercase")]
pub enum Message {
    Image(ImageMessage),
    Faces(FacesMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Bgr8,
    Rgb8,
    Mono8,
}

impl Encoding {
    fn channels(self) -> usize {
        match self {
            Encoding::Bgr8 | Encoding::Rgb8 => 3,
            Encoding::Mono8 => 1,
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Encoding::Bgr8 => "bgr8",
            Encoding::Rgb8 => "rgb8",
            Encoding::Mono8 => "mono8",
        })
    }
}

/// A raw camera frame or face crop.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageMessage {
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
    pub data: Vec<u8>,
}

impl ImageMessage {
    /// Decode into an RGB image.
    pub fn to_rgb(&self) -> Result<RgbImage, MessageError> {
        if self.width == 0 || self.height == 0 {
            return Err(MessageError::Empty {
                encoding: self.encoding,
                width: self.width,
                height: self.height,
            });
        }
        let channels = self.encoding.channels();
        let expected = self.width as usize * self.height as usize * channels;
        if self.data.len() < expected {
            return Err(MessageError::BadLength {
                encoding: self.encoding,
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }

        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * self.width as usize + x as usize) * channels;
            match self.encoding {
                Encoding::Bgr8 => Rgb([self.data[i + 2], self.data[i + 1], self.data[i]]),
                Encoding::Rgb8 => Rgb([self.data[i], self.data[i + 1], self.data[i + 2]]),
                Encoding::Mono8 => Rgb([self.data[i]; 3]),
            }
        }))
    }
}

/// Face center `(x, y)` in frame pixels; `z` is the detected face size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Face {
    pub position: Position,
    pub certainty: f32,
    #[serde(default)]
    pub crop: Option<ImageMessage>,
    /// Landmark points relative to the crop.
    #[serde(default)]
    pub shapes: Vec<Point>,
    /// Per-emotion scores in label order.
    #[serde(default)]
    pub emotions: Vec<f32>,
    #[serde(default)]
    pub eyes_closed: Vec<f32>,
    #[serde(default)]
    pub face_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacesMessage {
    pub faces: Vec<Face>,
}
