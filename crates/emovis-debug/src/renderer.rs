use crate::overlay;
use crate::sink::{FrameSink, SinkError};
use crate::state::SceneState;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Draw and present one frame. Returns `false` (and draws nothing) until both
/// an image and a faces message have been received.
pub fn render_tick<S>(state: &SceneState, sink: &mut S) -> Result<bool, SinkError>
where
    S: FrameSink + ?Sized,
{
    let Some(snapshot) = state.snapshot() else {
        return Ok(false);
    };
    let frame = overlay::draw(&snapshot.image, &snapshot.faces);
    let labels = overlay::labels(&snapshot.faces, snapshot.image.dimensions());
    sink.present(&frame, &labels)?;
    Ok(true)
}

/// Render at a fixed interval until `shutdown` resolves.
///
/// Late ticks are skipped rather than bunched; sink failures are logged and
/// the loop carries on.
pub async fn run<S, F>(state: &SceneState, sink: &mut S, period: Duration, shutdown: F) -> u64
where
    S: FrameSink + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut rendered = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => match render_tick(state, sink) {
                Ok(true) => rendered += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to present frame"),
            },
        }
    }
    rendered
}
