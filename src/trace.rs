// src/trace.rs - Per-frame CSV trace of an analysis run
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;

use crate::analysis::FrameOutcome;

#[derive(Debug, Serialize)]
struct TraceRecord {
    frame: usize,
    detected: bool,
    depth: Option<f64>,
    phase: Option<&'static str>,
    reps: u32,
    rep_completed: bool,
}

impl From<&FrameOutcome> for TraceRecord {
    fn from(outcome: &FrameOutcome) -> Self {
        Self {
            frame: outcome.index,
            detected: outcome.detected,
            depth: outcome.depth,
            phase: outcome.phase.map(|p| p.name()),
            reps: outcome.reps,
            rep_completed: outcome.rep_completed,
        }
    }
}

/// Collects frame outcomes and writes them out once the run is over.
pub struct TraceExporter {
    output_dir: PathBuf,
    session_name: String,
    outcomes: Vec<FrameOutcome>,
}

impl TraceExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            outcomes: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn record(&mut self, outcome: &FrameOutcome) {
        self.outcomes.push(outcome.clone());
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Writes `<output_dir>/<session>/trace.csv` and returns its path.
    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.output_dir.join(&self.session_name).join("trace.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for outcome in &self.outcomes {
            writer.serialize(TraceRecord::from(outcome))?;
        }
        writer.flush()?;

        Ok(csv_path)
    }
}
