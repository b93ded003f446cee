//! Latest-wins scene state shared between the message task and the render tick.
//!
//! Each slot holds an immutable snapshot behind an `Arc`. The message task
//! swaps in a new snapshot; the render tick clones the current `Arc`. No
//! ordering is guaranteed between an update and the next tick.

use crate::messages::Face;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything one render tick needs.
#[derive(Clone)]
pub struct Snapshot {
    pub image: Arc<RgbImage>,
    pub faces: Arc<Vec<Face>>,
}

pub struct SceneState {
    image: watch::Sender<Option<Arc<RgbImage>>>,
    faces: watch::Sender<Option<Arc<Vec<Face>>>>,
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneState {
    pub fn new() -> Self {
        let (image, _) = watch::channel(None);
        let (faces, _) = watch::channel(None);
        Self { image, faces }
    }

    pub fn publish_image(&self, image: RgbImage) {
        self.image.send_replace(Some(Arc::new(image)));
    }

    pub fn publish_faces(&self, faces: Vec<Face>) {
        self.faces.send_replace(Some(Arc::new(faces)));
    }

    /// Current image and faces, or `None` until both have arrived.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let image = self.image.borrow().clone()?;
        let faces = self.faces.borrow().clone()?;
        Some(Snapshot { image, faces })
    }
}
