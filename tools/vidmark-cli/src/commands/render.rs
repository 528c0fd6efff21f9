//! Render an image over a video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use vidmark_common::config::AppConfig;
use vidmark_common::error::VidmarkError;
use vidmark_overlay_model::{OverlayPosition, ProgressStatistics, RenderRequest};
use vidmark_render_engine::{
    ChannelCallbacks, FfmpegEngine, FileSystemStorage, RenderEvent, RenderOrchestrator,
    RenderSettings,
};

pub async fn run(
    config: AppConfig,
    video: PathBuf,
    image: PathBuf,
    position: String,
    name: Option<String>,
    storage_root: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let position: OverlayPosition = position.parse()?;
    for path in [&video, &image] {
        if !path.is_file() {
            return Err(VidmarkError::FileNotFound { path: path.clone() }.into());
        }
    }

    let storage = FileSystemStorage::new(
        storage_root.unwrap_or_else(|| config.storage.root.clone()),
        config.storage.folder.clone(),
    );
    let engine = FfmpegEngine::new(config.engine.binary.clone());
    let (callbacks, mut events) = ChannelCallbacks::new();

    let orchestrator = RenderOrchestrator::new(
        Arc::new(engine),
        Arc::new(storage.clone()),
        Arc::new(callbacks),
        RenderSettings::from(&config.render),
    )?;

    let mut builder = RenderRequest::builder()
        .source_video_path(&video)
        .overlay_image_path(&image)
        .position(position);
    if let Some(name) = name {
        builder = builder.output_naming_hint(name);
    }
    let request = builder.build()?;

    if !json {
        println!("Rendering {} over {}", image.display(), video.display());
        println!("  Position: {position}");
        println!("  Storage: {}", storage.output_dir().display());
    }

    let execution_id = orchestrator.start(request)?;
    tracing::debug!(execution_id, "Render started");

    let mut cancel_sent = false;
    let last = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break None;
                };
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    print_event(&event);
                }
                if event.is_terminal() {
                    break Some(event);
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                if !json {
                    println!("\n  Cancelling...");
                }
                orchestrator.cancel();
            }
        }
    };

    match last {
        Some(RenderEvent::Success { output }) => {
            if !json {
                println!("\nRender complete: {output}");
            }
            Ok(())
        }
        Some(RenderEvent::Cancelled) => Err(anyhow::anyhow!("Render cancelled")),
        _ => Err(anyhow::anyhow!("Render failed, rerun with --verbose for engine output")),
    }
}

fn print_event(event: &RenderEvent) {
    match event {
        RenderEvent::Progress(stats) => {
            print!("\r  {}  ", progress_line(stats));
            let _ = std::io::stdout().flush();
        }
        RenderEvent::Failure => println!("\n  Engine reported failure"),
        _ => {}
    }
}

fn progress_line(stats: &ProgressStatistics) -> String {
    format!(
        "frame {} | {:.1} fps | {:.1}s | {:.1} kbits/s | {:.2}x",
        stats.frame_number,
        stats.fps,
        f64::from(stats.elapsed_time_ms) / 1000.0,
        stats.bitrate,
        stats.speed
    )
}
