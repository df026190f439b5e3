// src/main.rs
use std::path::PathBuf;

use anyhow::Result;
use lift_coach::config::Settings;
use lift_coach::server;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_max_level(settings.max_level())
        .init();

    tracing::info!(
        "Starting lift coach (pose command `{}`, ffmpeg `{}`)",
        settings.pose.command,
        settings.video.ffmpeg
    );
    server::serve(settings).await?;
    Ok(())
}
