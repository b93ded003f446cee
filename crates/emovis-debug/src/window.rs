//! On-screen display of rendered frames.
//!
//! The renderer keeps ticking on the tokio runtime and hands each frame to a
//! [`WindowSink`]; the egui app on the main thread only shows the latest one
//! and draws the text labels on top of it.

use crate::overlay::Label;
use crate::renderer;
use crate::sink::{FrameSink, SinkError};
use crate::state::SceneState;
use eframe::egui;
use image::{Rgb, RgbImage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

const LABEL_FONT_SIZE: f32 = 13.0;

/// One presented frame with its annotations.
#[derive(Debug)]
pub struct Presented {
    pub frame: RgbImage,
    pub labels: Vec<Label>,
}

type Latest = Option<Arc<Presented>>;

/// Publishes frames to the window and wakes it up.
pub struct WindowSink {
    tx: watch::Sender<Latest>,
    ctx: egui::Context,
}

impl WindowSink {
    pub fn new(ctx: egui::Context) -> (Self, watch::Receiver<Latest>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx, ctx }, rx)
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: &RgbImage, labels: &[Label]) -> Result<(), SinkError> {
        self.tx.send_replace(Some(Arc::new(Presented {
            frame: frame.clone(),
            labels: labels.to_vec(),
        })));
        self.ctx.request_repaint();
        Ok(())
    }
}

fn color32(c: Rgb<u8>) -> egui::Color32 {
    egui::Color32::from_rgb(c.0[0], c.0[1], c.0[2])
}

fn color_image(frame: &RgbImage) -> egui::ColorImage {
    let size = [frame.width() as usize, frame.height() as usize];
    egui::ColorImage::from_rgb(size, frame.as_raw())
}

/// Uniform scale that fits `frame` inside `available`.
fn fit_scale(frame: egui::Vec2, available: egui::Vec2) -> f32 {
    if frame.x <= 0.0 || frame.y <= 0.0 {
        return 1.0;
    }
    (available.x / frame.x).min(available.y / frame.y).max(0.0)
}

struct DebugWindow {
    rx: watch::Receiver<Latest>,
    texture: Option<egui::TextureHandle>,
    shown: Latest,
}

impl DebugWindow {
    fn new(rx: watch::Receiver<Latest>) -> Self {
        Self {
            rx,
            texture: None,
            shown: None,
        }
    }

    fn refresh(&mut self, ctx: &egui::Context) {
        if !self.rx.has_changed().unwrap_or(false) {
            return;
        }
        let Some(latest) = self.rx.borrow_and_update().clone() else {
            return;
        };

        let image = color_image(&latest.frame);
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::default()),
            None => {
                self.texture = Some(ctx.load_texture("emovis_frame", image, egui::TextureOptions::default()));
            }
        }
        self.shown = Some(latest);
    }
}

impl eframe::App for DebugWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.key_pressed(egui::Key::Q)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.refresh(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let (Some(texture), Some(shown)) = (&self.texture, &self.shown) else {
                ui.centered_and_justified(|ui| {
                    ui.heading("Waiting for image and faces messages");
                });
                return;
            };

            let scale = fit_scale(texture.size_vec2(), ui.available_size());
            let (rect, _) = ui.allocate_exact_size(texture.size_vec2() * scale, egui::Sense::hover());
            let painter = ui.painter_at(rect);
            painter.image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );

            for label in &shown.labels {
                let pos = rect.min + egui::vec2(label.x as f32, label.y as f32) * scale;
                painter.text(
                    pos,
                    egui::Align2::LEFT_BOTTOM,
                    &label.text,
                    egui::FontId::proportional(LABEL_FONT_SIZE),
                    color32(label.color),
                );
            }
        });
    }
}

/// Open the display window and block until it is closed, either by the user
/// or because `shutdown` resolved and the renderer stopped.
pub fn show<F>(runtime: &Handle, scene: Arc<SceneState>, period: Duration, shutdown: F) -> Result<(), eframe::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let runtime = runtime.clone();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };

    eframe::run_native(
        "emovis-debug",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let (mut sink, rx) = WindowSink::new(ctx.clone());
            runtime.spawn(async move {
                let rendered = renderer::run(&scene, &mut sink, period, shutdown).await;
                tracing::info!(rendered, "renderer stopped");
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                ctx.request_repaint();
            });
            Ok(Box::new(DebugWindow::new(rx)))
        }),
    )
}
