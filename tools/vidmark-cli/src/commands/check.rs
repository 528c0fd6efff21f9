//! Check the engine binary and configuration.

use vidmark_common::config::AppConfig;
use vidmark_render_engine::{FfmpegEngine, MediaEngine};

pub fn run(config: &AppConfig, write_config: bool) -> anyhow::Result<()> {
    println!("Vidmark System Check");
    println!("{}", "=".repeat(50));

    let engine = FfmpegEngine::new(&config.engine.binary);
    let available = engine.is_available();
    if available {
        println!("[OK] Engine: {} ({})", engine.name(), engine.binary());
    } else {
        println!(
            "[FAIL] Engine: {} not found or not runnable",
            engine.binary()
        );
    }

    let storage_dir = config.storage.root.join(&config.storage.folder);
    println!("[OK] Renders stored in: {}", storage_dir.display());
    println!("[OK] Temp files in: {}", config.render.temp_dir.display());

    println!();
    println!("Config file: {}", AppConfig::path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    if write_config {
        config.save()?;
        println!("[OK] Config written to {}", AppConfig::path().display());
    }

    println!();
    if available {
        println!("Vidmark is ready.");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Install ffmpeg or set engine.binary in {}",
            AppConfig::path().display()
        ))
    }
}
