//! Technical metadata via ffprobe.
//!
//! The probe is a trait so catalog scans still work on hosts without
//! ffprobe installed; every failure degrades to "no technical metadata".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Container and stream facts for a video file, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalMetadata {
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub fps: Option<f64>,
}

#[async_trait::async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Option<TechnicalMetadata>;
}

/// Shells out to ffprobe.
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl VideoProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Option<TechnicalMetadata> {
        let output = match tokio::process::Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ffprobe spawn failed");
                return None;
            }
        };

        if !output.status.success() {
            debug!(path = %path.display(), "ffprobe returned non-zero status");
            return None;
        }

        let raw: serde_json::Value = match serde_json::from_slice(&output.stdout) {
            Ok(v) => v,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ffprobe output was not JSON");
                return None;
            }
        };

        Some(parse_probe_output(&raw))
    }
}

fn parse_probe_output(raw: &serde_json::Value) -> TechnicalMetadata {
    let format = raw.get("format");

    let duration_secs = format
        .and_then(|f| f.get("duration"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());

    let bitrate_kbps = format
        .and_then(|f| f.get("bit_rate"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .map(|b| (b / 1000) as u32);

    let video = raw
        .get("streams")
        .and_then(|v| v.as_array())
        .and_then(|ss| {
            ss.iter()
                .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"))
        });

    let width = video
        .and_then(|s| s.get("width"))
        .and_then(|v| v.as_u64())
        .map(|w| w as u32);
    let height = video
        .and_then(|s| s.get("height"))
        .and_then(|v| v.as_u64())
        .map(|h| h as u32);
    let codec = video
        .and_then(|s| s.get("codec_name"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let fps = video
        .and_then(|s| s.get("r_frame_rate"))
        .and_then(|v| v.as_str())
        .and_then(parse_fraction);

    TechnicalMetadata {
        duration_secs,
        bitrate_kbps,
        width,
        height,
        codec,
        fps,
    }
}

fn parse_fraction(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d > 0.0 { Some(n / d) } else { None }
    } else {
        s.parse().ok()
    }
}
