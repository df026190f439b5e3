// src/pose_bridge.rs - Bridge to the external pose model
//
// The model runs as a sidecar process. For every frame we write the frame's
// image path on one line of its stdin and read back one JSON line:
//
//   null                                   no person found
//   {"landmarks": null}                    no person found
//   {"landmarks": [[x, y, ...], ...]}      MediaPipe's 33-point pose order
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::landmarks::LandmarkFrame;
use crate::video::VideoFrame;

/// Anything that can turn a decoded frame into landmarks.
pub trait LandmarkSource {
    /// `Ok(None)` means the frame had no detectable person.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkFrame>>;
}

/// Hands out one detector per analysis run so runs never share model state.
pub trait DetectorFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn LandmarkSource + Send>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSettings {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for PoseSettings {
    fn default() -> Self {
        Self {
            command: "lift-coach-pose".to_string(),
            args: Vec::new(),
        }
    }
}

impl DetectorFactory for PoseSettings {
    fn open(&self) -> Result<Box<dyn LandmarkSource + Send>> {
        Ok(Box::new(SidecarDetector::spawn(self)?))
    }
}

pub struct SidecarDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SidecarDetector {
    pub fn spawn(settings: &PoseSettings) -> Result<Self> {
        debug!("starting pose sidecar: {} {:?}", settings.command, settings.args);
        let mut child = Command::new(&settings.command)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start pose sidecar `{}`", settings.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Pose sidecar stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Pose sidecar stdout unavailable"))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl LandmarkSource for SidecarDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkFrame>> {
        writeln!(self.stdin, "{}", frame.path.display())
            .context("Failed to send frame to pose sidecar")?;
        self.stdin.flush()?;

        self.line.clear();
        let read = self
            .stdout
            .read_line(&mut self.line)
            .context("Failed to read pose sidecar reply")?;
        if read == 0 {
            bail!("Pose sidecar exited before answering frame {}", frame.index);
        }
        parse_reply(&self.line)
    }
}

impl Drop for SidecarDetector {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("pose sidecar already gone: {}", e);
        }
        if let Err(e) = self.child.wait() {
            warn!("failed to reap pose sidecar: {}", e);
        }
    }
}

#[derive(Debug, Deserialize)]
struct SidecarReply {
    landmarks: Option<Vec<Vec<f64>>>,
}

/// Turns one sidecar reply line into a landmark frame. Poses missing any
/// required joint count as no detection.
pub fn parse_reply(line: &str) -> Result<Option<LandmarkFrame>> {
    let reply: Option<SidecarReply> = serde_json::from_str(line.trim())
        .with_context(|| format!("Malformed pose sidecar reply: {}", line.trim()))?;

    let Some(points) = reply.and_then(|r| r.landmarks) else {
        return Ok(None);
    };

    let pose: Option<Vec<[f64; 2]>> = points
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Some([*x, *y]),
            _ => None,
        })
        .collect();

    Ok(pose.and_then(|pose| LandmarkFrame::from_mediapipe(&pose)))
}
