//! Message intake: newline-delimited JSON into the scene state.

use crate::messages::Message;
use crate::state::SceneState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Counters for one intake run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeStats {
    pub images: usize,
    pub faces: usize,
    pub rejected: usize,
}

/// Read messages until EOF, publishing each into `state`.
///
/// Malformed lines are logged and skipped; only I/O errors end the run early.
pub async fn pump<R>(reader: R, state: &SceneState) -> std::io::Result<IntakeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = IntakeStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Message>(line) {
            Ok(Message::Image(msg)) => match msg.to_rgb() {
                Ok(image) => {
                    tracing::trace!(line = line_no, width = image.width(), height = image.height(), "image");
                    state.publish_image(image);
                    stats.images += 1;
                }
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "bad image message");
                    stats.rejected += 1;
                }
            },
            Ok(Message::Faces(msg)) => {
                tracing::trace!(line = line_no, count = msg.faces.len(), "faces");
                state.publish_faces(msg.faces);
                stats.faces += 1;
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "unparseable message");
                stats.rejected += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pump_publishes_latest() {
        let input = concat!(
            r#"{"topic":"image","width":1,"height":1,"encoding":"mono8","data":[5]}"#, "\n",
            "\n",
            r#"{"topic":"faces","faces":[]}"#, "\n",
            r#"{"topic":"image","width":2,"height":1,"encoding":"mono8","data":[1,2]}"#, "\n",
        );
        let state = SceneState::new();
        let stats = pump(input.as_bytes(), &state).await.unwrap();

        assert_eq!(stats, IntakeStats { images: 2, faces: 1, rejected: 0 });
        let snap = state.snapshot().unwrap();
        assert_eq!(snap.image.dimensions(), (2, 1));
        assert!(snap.faces.is_empty());
    }

    #[tokio::test]
    async fn test_pump_skips_bad_lines() {
        let input = concat!(
            "not json\n",
            r#"{"topic":"image","width":4,"height":4,"encoding":"bgr8","data":[1]}"#, "\n",
            r#"{"topic":"faces","faces":[{"position":{"x":1,"y":1,"z":1},"certainty":0.9}]}"#, "\n",
        );
        let state = SceneState::new();
        let stats = pump(input.as_bytes(), &state).await.unwrap();

        assert_eq!(stats, IntakeStats { images: 0, faces: 1, rejected: 2 });
        // No valid image yet, so nothing to render.
        assert!(state.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_pump_rejects_empty_frame() {
        let input = concat!(
            r#"{"topic":"image","width":3,"height":1,"encoding":"mono8","data":[1,2,3]}"#, "\n",
            r#"{"topic":"image","width":0,"height":0,"encoding":"mono8","data":[]}"#, "\n",
            r#"{"topic":"faces","faces":[]}"#, "\n",
        );
        let state = SceneState::new();
        let stats = pump(input.as_bytes(), &state).await.unwrap();

        assert_eq!(stats, IntakeStats { images: 1, faces: 1, rejected: 1 });
        // The earlier valid frame is still the one rendered.
        assert_eq!(state.snapshot().unwrap().image.dimensions(), (3, 1));
    }
}
