//! Where rendered frames go.

use crate::overlay::Label;
use image::{ImageFormat, RgbImage};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("encode: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait FrameSink {
    fn present(&mut self, frame: &RgbImage, labels: &[Label]) -> Result<(), SinkError>;
}

/// Overwrites a PNG file with the latest frame, for headless runs.
///
/// Frames are written to a sibling temp file and renamed into place so image
/// viewers that auto-reload never see a partial file. Text labels need a
/// font and are only logged.
pub struct PngSink {
    path: PathBuf,
    tmp: PathBuf,
}

impl PngSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self { path, tmp: PathBuf::from(tmp) }
    }
}

impl FrameSink for PngSink {
    fn present(&mut self, frame: &RgbImage, labels: &[Label]) -> Result<(), SinkError> {
        if !labels.is_empty() {
            tracing::trace!(labels = ?labels.iter().map(|l| l.text.as_str()).collect::<Vec<_>>(), "frame labels");
        }
        frame.save_with_format(&self.tmp, ImageFormat::Png)?;
        std::fs::rename(&self.tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_png_sink_writes_and_replaces() {
        let dir = std::env::temp_dir().join(format!("emovis-sink-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        let mut sink = PngSink::new(&path);

        sink.present(&RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])), &[]).unwrap();
        sink.present(&RgbImage::from_pixel(5, 2, Rgb([7, 8, 9])), &[]).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (5, 2));
        assert_eq!(back.get_pixel(0, 0), &Rgb([7, 8, 9]));
        assert!(!dir.join("frame.png.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
