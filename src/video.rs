// src/video.rs - Video file decoding through ffmpeg
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Frames are scaled to this width before pose detection.
    pub scale_width: u32,
    /// Upper bound on decoded frames per video, 0 for no limit. Every frame
    /// is staged as a PNG, so this also bounds temp disk use.
    pub max_frames: usize,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            scale_width: 640,
            max_frames: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub frame_count: Option<usize>,
}

/// One decoded frame on disk, in video order.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub index: usize,
    pub path: PathBuf,
}

/// Reads stream dimensions and frame rate with ffprobe.
pub fn probe(path: &Path, settings: &VideoSettings) -> Result<VideoInfo> {
    let output = Command::new(&settings.ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,nb_frames",
            "-of", "csv=p=0",
        ])
        .arg(path)
        .output()
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        bail!(
            "ffprobe rejected {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(info: &str) -> Result<VideoInfo> {
    let parts: Vec<&str> = info.trim().split(',').collect();
    if parts.len() < 3 {
        return Err(anyhow!("Invalid video format or corrupted file"));
    }

    let width = parts[0].parse().map_err(|_| anyhow!("Invalid video width"))?;
    let height = parts[1].parse().map_err(|_| anyhow!("Invalid video height"))?;
    let fps = parse_frame_rate(parts[2]).ok_or_else(|| anyhow!("Invalid frame rate format"))?;
    // nb_frames is "N/A" for some containers
    let frame_count = parts.get(3).and_then(|n| n.parse().ok());

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.parse().ok()?;
            let den: f32 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

/// Frames extracted into a private temp directory. The directory is removed
/// when this value is dropped.
pub struct VideoFrames {
    dir: PathBuf,
    frames: Vec<PathBuf>,
}

impl VideoFrames {
    pub fn extract(path: &Path, settings: &VideoSettings) -> Result<Self> {
        if !path.exists() {
            bail!("Video file does not exist: {}", path.display());
        }

        let dir = std::env::temp_dir().join(format!("lift_coach_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create frame directory {}", dir.display()))?;
        let mut frames = Self {
            dir,
            frames: Vec::new(),
        };

        debug!("extracting frames from {} into {}", path.display(), frames.dir.display());
        let output = extract_command(path, &frames.dir, settings)
            .output()
            .context("Failed to extract frames with ffmpeg")?;

        if !output.status.success() {
            bail!(
                "FFmpeg frame extraction failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        frames.frames = fs::read_dir(&frames.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        frames.frames.sort();

        debug!("extracted {} frames", frames.len());
        if settings.max_frames > 0 && frames.len() >= settings.max_frames {
            warn!(
                "{} reached the {} frame limit, the rest of the video is ignored",
                path.display(),
                settings.max_frames
            );
        }
        Ok(frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VideoFrame> + '_ {
        self.frames.iter().enumerate().map(|(index, path)| VideoFrame {
            index,
            path: path.clone(),
        })
    }
}

fn extract_command(path: &Path, dir: &Path, settings: &VideoSettings) -> Command {
    let mut command = Command::new(&settings.ffmpeg);
    command
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(path)
        .args(["-vf", &format!("scale={}:-2", settings.scale_width)]);
    if settings.max_frames > 0 {
        command.args(["-frames:v", &settings.max_frames.to_string()]);
    }
    command.arg(dir.join("frame_%05d.png"));
    command
}

impl Drop for VideoFrames {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!("failed to clean up frames in {}: {}", self.dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output("1920,1080,30/1,240\n").unwrap();
        assert_eq!(
            info,
            VideoInfo {
                width: 1920,
                height: 1080,
                fps: 30.0,
                frame_count: Some(240),
            }
        );

        let info = parse_probe_output("640,480,25/1,N/A").unwrap();
        assert_eq!(info.frame_count, None);

        assert!(parse_probe_output("").is_err());
    }

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_extract_command_caps_frames() {
        let settings = VideoSettings::default();
        let command = extract_command(Path::new("clip.mp4"), Path::new("/tmp/frames"), &settings);
        assert_eq!(command.get_program(), "ffmpeg");
        assert_eq!(
            args(&command),
            [
                "-v", "error", "-nostdin", "-i", "clip.mp4", "-vf", "scale=640:-2",
                "-frames:v", "3600", "/tmp/frames/frame_%05d.png",
            ]
        );

        let unlimited = VideoSettings {
            max_frames: 0,
            ..VideoSettings::default()
        };
        let command = extract_command(Path::new("clip.mp4"), Path::new("/tmp/frames"), &unlimited);
        assert!(!args(&command).iter().any(|a| a == "-frames:v"));
    }

    #[test]
    fn test_extract_missing_file() {
        let result = VideoFrames::extract(
            Path::new("/nonexistent/clip.mp4"),
            &VideoSettings::default(),
        );
        assert!(result.is_err());
    }
}
