use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing_subscriber::EnvFilter;

mod config;
mod messages;
mod overlay;
mod renderer;
mod sink;
mod source;
mod state;
mod window;

use config::Config;
use sink::PngSink;
use state::SceneState;

type Input = Box<dyn AsyncBufRead + Unpin + Send>;

#[derive(Parser)]
#[command(
    name = "emovis-debug",
    about = "Display faces, landmarks and emotion scores from a message stream over its camera frames"
)]
struct Args {
    /// NDJSON message file; reads stdin when omitted (overrides EMOVIS_DEBUG_INPUT)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Write each frame to this PNG file instead of opening a window (overrides EMOVIS_DEBUG_OUTPUT)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Render rate in frames per second (overrides EMOVIS_DEBUG_FPS)
    #[arg(long)]
    fps: Option<f32>,
}

async fn open_input(config: &Config) -> Result<Input> {
    Ok(match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

async fn intake(reader: Input, scene: Arc<SceneState>) {
    match source::pump(reader, &scene).await {
        Ok(stats) => tracing::info!(
            images = stats.images,
            faces = stats.faces,
            rejected = stats.rejected,
            "message stream ended"
        ),
        Err(e) => tracing::error!(error = %e, "message stream failed"),
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if args.input.is_some() {
        config.input = args.input;
    }
    if args.output.is_some() {
        config.output = args.output;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }

    tracing::info!(
        input = ?config.input,
        output = ?config.output,
        fps = config.fps,
        "emovis-debug starting"
    );

    // The window has to own the main thread, so the runtime is built by hand
    // and carries intake and rendering in the background.
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let scene = Arc::new(SceneState::new());
    let reader = runtime.block_on(open_input(&config))?;
    runtime.spawn(intake(reader, Arc::clone(&scene)));

    let result = match &config.output {
        Some(path) => {
            let mut sink = PngSink::new(path);
            // The last frame stays on disk after the stream ends, until interrupted.
            let rendered = runtime.block_on(renderer::run(&scene, &mut sink, config.period(), ctrl_c()));
            tracing::info!(rendered, "emovis-debug shutting down");
            Ok(())
        }
        None => window::show(runtime.handle(), scene, config.period(), ctrl_c())
            .map(|()| tracing::info!("emovis-debug window closed"))
            .map_err(|e| anyhow::anyhow!("display window failed: {e}")),
    };

    // A pending stdin read would block a regular drop.
    runtime.shutdown_background();
    result
}
