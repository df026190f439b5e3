// src/bin/analyze_clip.rs - Analyze one video file without the HTTP server
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use lift_coach::config::Settings;
use lift_coach::trace::TraceExporter;
use lift_coach::VideoAnalyzer;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (video, selector, trace_dir) = match args.as_slice() {
        [video, selector] => (video, selector, None),
        [video, selector, trace_dir] => (video, selector, Some(PathBuf::from(trace_dir))),
        _ => bail!("usage: analyze_clip <video> <exercise> [trace-dir]"),
    };

    let settings = Settings::load(None)?;
    tracing_subscriber::fmt()
        .with_max_level(settings.max_level())
        .with_writer(std::io::stderr)
        .init();

    let analyzer = VideoAnalyzer::new(
        settings.analysis_config(),
        settings.video.clone(),
        Arc::new(settings.pose.clone()),
    );

    let result = match trace_dir {
        Some(dir) => {
            let mut exporter = TraceExporter::new(dir, None);
            let result = analyzer.analyze_traced(Path::new(video), selector, |o| exporter.record(o))?;
            if exporter.is_empty() {
                eprintln!("No frames to trace");
            } else {
                let path = exporter.export_csv()?;
                eprintln!("Wrote {} frames to {}", exporter.len(), path.display());
            }
            result
        }
        None => analyzer.analyze(Path::new(video), selector)?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
