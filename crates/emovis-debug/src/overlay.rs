//! Debug overlay drawing.
//!
//! The frame is recolored and blurred so annotations stand out, then each
//! face gets its crop pasted in place, a center marker, its landmarks, an
//! emotion bar chart to the left of the crop and eye-closed bars along the top.
//! Text (certainty, emotion names, face id) is laid out separately by
//! [`labels`] so the display can draw it with its own fonts.

use crate::messages::Face;
use emovis_core::LabelSet;
use image::{Rgb, RgbImage};

const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const SHAPE_COLOR: Rgb<u8> = Rgb([100, 100, 100]);

const CENTER_RADIUS: i32 = 10;
const BLUR_SIGMA: f32 = 2.5;
/// Landmarks are drawn slightly spread out so they stay visible over the crop.
const LANDMARK_SPREAD: f32 = 1.1;
const BAR_HEIGHT: i32 = 20;
const BAR_MAX_LEN: f32 = 80.0;
const EYE_BAR_WIDTH: i32 = 20;
const EMOTION_LABEL_OFFSET: i32 = 100;
const FACE_ID_MAX_CHARS: usize = 15;
/// Coordinates are clamped to this magnitude so offsets never overflow.
const COORD_LIMIT: f32 = 1.0e6;

/// A text annotation anchored at its bottom-left corner, in frame pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Rgb<u8>,
}

fn coord(v: f32) -> i32 {
    v.clamp(-COORD_LIMIT, COORD_LIMIT) as i32
}

/// Crop side length drawn for a face of detected size `z`, never larger than
/// the frame's longer side.
fn crop_size(z: f32, (width, height): (u32, u32)) -> i32 {
    coord(z * 4.0).clamp(0, width.max(height) as i32)
}

/// Top-left corner and side length of a face's crop square.
fn crop_origin(face: &Face, dims: (u32, u32)) -> (i32, i32, i32) {
    let size = crop_size(face.position.z, dims);
    let px = coord(face.position.x - size as f32 / 2.0);
    let py = coord(face.position.y - size as f32 / 2.0);
    (px, py, size)
}

/// Blend weight for the pasted crop; above 1 the crop is exaggerated.
fn crop_alpha(certainty: f32) -> f32 {
    (0.5 + certainty * 2.0).min(1.5)
}

/// Blue-to-white ramp for the background frame.
fn ocean(t: f32) -> Rgb<u8> {
    let r = ((t - 2.0 / 3.0) * 3.0).clamp(0.0, 1.0);
    let g = ((t - 1.0 / 3.0) * 1.5).clamp(0.0, 1.0);
    let b = t.clamp(0.0, 1.0);
    to_rgb(r, g, b)
}

/// Gray ramp with a cool tint, used for face crops.
fn bone(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let r = 0.875 * t + 0.125 * (3.0 * t - 2.0).clamp(0.0, 1.0);
    let g = 0.875 * t + 0.125 * (3.0 * t - 1.0).clamp(0.0, 1.0);
    let b = 0.875 * t + 0.125 * (3.0 * t).clamp(0.0, 1.0);
    to_rgb(r, g, b)
}

fn to_rgb(r: f32, g: f32, b: f32) -> Rgb<u8> {
    let c = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([c(r), c(g), c(b)])
}

fn luma(p: &Rgb<u8>) -> f32 {
    (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32) / 255.0
}

fn apply_colormap(image: &RgbImage, map: fn(f32) -> Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| map(luma(image.get_pixel(x, y))))
}

/// `dst = src * alpha + dst * (1 - alpha)`, saturating.
fn blend_into(dst: &mut RgbImage, src: &RgbImage, alpha: f32) {
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        for c in 0..3 {
            let v = s.0[c] as f32 * alpha + d.0[c] as f32 * (1.0 - alpha);
            d.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Filled rectangle between two opposite corners (inclusive), clipped.
pub fn fill_rect(image: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: Rgb<u8>) {
    let (xa, xb) = (x0.min(x1).max(0), x0.max(x1).min(image.width() as i32 - 1));
    let (ya, yb) = (y0.min(y1).max(0), y0.max(y1).min(image.height() as i32 - 1));
    for y in ya..=yb {
        for x in xa..=xb {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// One-pixel circle outline (midpoint algorithm), clipped.
pub fn draw_circle(image: &mut RgbImage, (cx, cy): (i32, i32), radius: i32, color: Rgb<u8>) {
    if radius <= 0 {
        put(image, cx, cy, color);
        return;
    }
    let (mut x, mut y, mut err) = (radius, 0, 1 - radius);
    while x >= y {
        for (dx, dy) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
            put(image, cx + dx, cy + dy, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Emotion scores paired with labels, ascending by `(score, label)`.
///
/// Scores beyond the seven emotion labels are ignored.
pub fn emotion_bars(scores: &[f32]) -> Vec<(&'static str, f32)> {
    let mut bars: Vec<(&'static str, f32)> = scores
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| LabelSet::Emotions.label(i).map(|l| (l, s)))
        .collect();
    bars.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    bars
}

/// Render the overlay for one frame.
pub fn draw(image: &RgbImage, faces: &[Face]) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let mut frame = image::imageops::blur(&apply_colormap(image, ocean), BLUR_SIGMA);
    let mut overlay = frame.clone();

    for face in faces {
        let (px, py, size) = crop_origin(face, image.dimensions());

        if let Some(crop) = face.crop.as_ref().filter(|_| size > 0) {
            match crop.to_rgb() {
                Ok(rgb) => {
                    let resized = image::imageops::resize(
                        &rgb,
                        size as u32,
                        size as u32,
                        image::imageops::FilterType::Triangle,
                    );
                    let tinted = apply_colormap(&resized, bone);
                    image::imageops::replace(&mut overlay, &tinted, px as i64, py as i64);
                }
                Err(e) => tracing::debug!(error = %e, "skipping face crop"),
            }
        }
        blend_into(&mut frame, &overlay, crop_alpha(face.certainty));

        draw_circle(
            &mut frame,
            (coord(face.position.x), coord(face.position.y)),
            CENTER_RADIUS,
            CENTER_COLOR,
        );

        for p in &face.shapes {
            let lx = px + coord(p.x * LANDMARK_SPREAD);
            let ly = py + coord(p.y * LANDMARK_SPREAD);
            draw_circle(&mut frame, (lx, ly), 1, SHAPE_COLOR);
        }

        if !face.emotions.is_empty() {
            let bars = emotion_bars(&face.emotions);
            let top = bars_top(py, size, bars.len());
            for (i, (_, score)) in bars.iter().enumerate() {
                let y = top + i as i32 * BAR_HEIGHT;
                let len = coord(score * BAR_MAX_LEN);
                fill_rect(&mut frame, (px, y), (px - len, y + BAR_HEIGHT), TEXT_COLOR);
            }
        }

        for (i, &eye) in face.eyes_closed.iter().enumerate() {
            let x = px + i as i32 * EYE_BAR_WIDTH;
            let len = coord(eye * BAR_MAX_LEN);
            fill_rect(&mut frame, (x, py + len), (x + EYE_BAR_WIDTH, py), SHAPE_COLOR);
        }
    }

    frame
}

fn bars_top(py: i32, size: i32, count: usize) -> i32 {
    py + size - count as i32 * BAR_HEIGHT
}

/// Text annotations for the faces drawn by [`draw`] on a frame of `dims`.
pub fn labels(faces: &[Face], dims: (u32, u32)) -> Vec<Label> {
    let mut out = Vec::new();
    for face in faces {
        let (px, py, size) = crop_origin(face, dims);

        out.push(Label {
            text: format!("{:.2}", face.certainty),
            x: px + 10,
            y: py - 25,
            color: TEXT_COLOR,
        });

        if !face.emotions.is_empty() {
            let bars = emotion_bars(&face.emotions);
            let top = bars_top(py, size, bars.len());
            for (i, (name, _)) in bars.iter().enumerate() {
                out.push(Label {
                    text: name.to_string(),
                    x: px - EMOTION_LABEL_OFFSET,
                    y: top + i as i32 * BAR_HEIGHT + 15,
                    color: CENTER_COLOR,
                });
            }
        }

        if let Some(id) = &face.face_id {
            out.push(Label {
                text: id.chars().take(FACE_ID_MAX_CHARS).collect(),
                x: px + 10,
                y: py - 5,
                color: TEXT_COLOR,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Encoding, ImageMessage, Position};

    fn face_at(x: f32, y: f32, z: f32) -> Face {
        Face {
            position: Position { x, y, z },
            certainty: 0.25,
            crop: None,
            shapes: vec![],
            emotions: vec![],
            eyes_closed: vec![],
            face_id: None,
        }
    }

    #[test]
    fn test_draw_keeps_frame_size() {
        let img = RgbImage::from_pixel(64, 48, Rgb([30, 60, 90]));
        let out = draw(&img, &[face_at(32.0, 24.0, 5.0)]);
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn test_draw_faces_off_frame_do_not_panic() {
        let img = RgbImage::new(32, 32);
        let mut f = face_at(-50.0, 200.0, 40.0);
        f.crop = Some(ImageMessage { width: 2, height: 2, encoding: Encoding::Mono8, data: vec![255; 4] });
        f.shapes = vec![emovis_core::Point::new(1000.0, -1000.0)];
        f.emotions = vec![1.0; 7];
        f.eyes_closed = vec![1.0, 1.0];
        let out = draw(&img, &[f]);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn test_center_marker_drawn() {
        let img = RgbImage::new(64, 64);
        let out = draw(&img, &[face_at(32.0, 32.0, 0.0)]);
        assert_eq!(out.get_pixel(32 + CENTER_RADIUS as u32, 32), &CENTER_COLOR);
        assert_eq!(out.get_pixel(32, 32 - CENTER_RADIUS as u32), &CENTER_COLOR);
    }

    #[test]
    fn test_emotion_bars_sorted_ascending() {
        let bars = emotion_bars(&[0.3, 0.05, 0.05, 0.4, 0.1, 0.05, 0.05]);
        let labels: Vec<&str> = bars.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec!["disgust", "fear", "neutral", "surprise", "sad", "anger", "happy"]
        );
    }

    #[test]
    fn test_emotion_bars_ignore_extra_scores() {
        assert_eq!(emotion_bars(&[0.5; 9]).len(), 7);
    }

    #[test]
    fn test_emotion_bar_length() {
        let img = RgbImage::new(200, 200);
        let mut f = face_at(150.0, 100.0, 10.0);
        f.emotions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let out = draw(&img, &[f]);
        // size = 40, px = 130, py = 80; happy sorts last: rows 100..=120.
        assert_eq!(out.get_pixel(130 - 80, 110), &TEXT_COLOR);
        assert_ne!(out.get_pixel(130 - 81, 110), &TEXT_COLOR);
    }

    #[test]
    fn test_eye_bars_hang_from_crop_top() {
        let img = RgbImage::new(200, 200);
        let mut f = face_at(100.0, 100.0, 10.0);
        f.eyes_closed = vec![0.5, 1.0];
        let out = draw(&img, &[f]);
        // size = 40, px = py = 80; first bar spans x 80..=100, y 80..=120.
        assert_eq!(out.get_pixel(85, 95), &SHAPE_COLOR);
        assert_eq!(out.get_pixel(85, 120), &SHAPE_COLOR);
        assert_ne!(out.get_pixel(85, 121), &SHAPE_COLOR);
        // Second bar is twice as long, starting 20 pixels to the right.
        assert_eq!(out.get_pixel(115, 160), &SHAPE_COLOR);
        assert_ne!(out.get_pixel(115, 161), &SHAPE_COLOR);
        assert_ne!(out.get_pixel(125, 95), &SHAPE_COLOR);
    }

    #[test]
    fn test_landmarks_spread_from_crop_corner() {
        let img = RgbImage::new(200, 200);
        let mut f = face_at(100.0, 100.0, 10.0);
        f.shapes = vec![emovis_core::Point::new(10.0, 20.0)];
        let out = draw(&img, &[f]);
        // (80 + 10 * 1.1, 80 + 20 * 1.1) = (91, 102), drawn as a radius-1 ring.
        for (x, y) in [(92, 102), (90, 102), (91, 101), (91, 103)] {
            assert_eq!(out.get_pixel(x, y), &SHAPE_COLOR, "({x}, {y})");
        }
        assert_ne!(out.get_pixel(91, 102), &SHAPE_COLOR);
        // Unspread position stays untouched.
        assert_ne!(out.get_pixel(91, 100), &SHAPE_COLOR);
    }

    #[test]
    fn test_crop_size_clamped_to_frame() {
        assert_eq!(crop_size(10.0, (64, 48)), 40);
        assert_eq!(crop_size(1.0e9, (64, 48)), 64);
        assert_eq!(crop_size(-3.0, (64, 48)), 0);
        assert_eq!(crop_size(f32::NAN, (64, 48)), 0);
    }

    #[test]
    fn test_huge_face_with_crop_is_bounded() {
        let img = RgbImage::new(32, 24);
        let mut f = face_at(f32::MAX, 12.0, 1.0e12);
        f.crop = Some(ImageMessage { width: 1, height: 1, encoding: Encoding::Mono8, data: vec![200] });
        f.shapes = vec![emovis_core::Point::new(f32::MAX, f32::MIN)];
        f.emotions = vec![f32::MAX; 7];
        f.eyes_closed = vec![f32::MIN];
        assert_eq!(draw(&img, &[f]).dimensions(), (32, 24));
    }

    #[test]
    fn test_empty_frame_returned_unchanged() {
        let img = RgbImage::new(0, 0);
        assert_eq!(draw(&img, &[face_at(0.0, 0.0, 5.0)]).dimensions(), (0, 0));
    }

    #[test]
    fn test_labels_layout() {
        let mut f = face_at(150.0, 100.0, 10.0);
        f.certainty = 0.876;
        f.emotions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        f.face_id = Some("a-very-long-identifier".into());
        let labels = labels(&[f], (200, 200));

        // certainty, seven emotion names, face id
        assert_eq!(labels.len(), 9);
        assert_eq!(labels[0], Label { text: "0.88".into(), x: 140, y: 55, color: TEXT_COLOR });
        // size = 40, px = 130, py = 80; bars start at 80 + 40 - 140 = -20.
        assert_eq!(labels[1].text, "anger");
        assert_eq!((labels[1].x, labels[1].y), (30, -5));
        assert_eq!(labels[7].text, "happy");
        assert_eq!(labels[7].y, -20 + 6 * 20 + 15);
        assert_eq!(labels[8].text, "a-very-long-ide");
        assert_eq!((labels[8].x, labels[8].y), (140, 75));
    }

    #[test]
    fn test_labels_without_scores_or_id() {
        let labels = labels(&[face_at(10.0, 10.0, 1.0)], (50, 50));
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "0.25");
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut img = RgbImage::new(10, 10);
        fill_rect(&mut img, (-5, -5), (3, 3), TEXT_COLOR);
        assert_eq!(img.get_pixel(0, 0), &TEXT_COLOR);
        assert_eq!(img.get_pixel(3, 3), &TEXT_COLOR);
        assert_ne!(img.get_pixel(4, 4), &TEXT_COLOR);
        fill_rect(&mut img, (20, 20), (30, 30), SHAPE_COLOR);
    }

    #[test]
    fn test_crop_alpha_capped() {
        assert!((crop_alpha(0.0) - 0.5).abs() < 1e-6);
        assert!((crop_alpha(0.25) - 1.0).abs() < 1e-6);
        assert!((crop_alpha(1.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(ocean(0.0), Rgb([0, 0, 0]));
        assert_eq!(ocean(1.0), Rgb([255, 255, 255]));
        assert_eq!(bone(0.0), Rgb([0, 0, 0]));
        assert_eq!(bone(1.0), Rgb([255, 255, 255]));
    }
}
