//! Container probe provider (ffprobe). Grounded on `ffprobe` invocation in the source
//! tree's `metadata::ffprobe`, reshaped to implement `MetadataProvider`.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::{ReelVaultError, Result};
use crate::tools;

use super::{MediaInfo, MetadataProvider};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Option<Vec<ProbeStream>>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    format_name: Option<String>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    creation_time: Option<String>,
    major_brand: Option<String>,
}

pub struct ContainerProbeProvider;

impl MetadataProvider for ContainerProbeProvider {
    fn name(&self) -> &'static str {
        "container-probe"
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(tools::ffprobe_path())
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| ReelVaultError::Metadata(format!("spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelVaultError::Metadata(format!(
                "ffprobe exited non-zero: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ReelVaultError::Metadata(format!("parse ffprobe json: {e}")))?;

        let mut info = MediaInfo::default();

        if let Some(streams) = parsed.streams {
            for stream in streams {
                if stream.codec_type.as_deref() == Some("video") {
                    info.codec = stream.codec_name;
                    info.width = stream.width;
                    info.height = stream.height;
                    info.frame_rate = parse_frame_rate(stream.r_frame_rate.as_deref());
                    if info.duration_ms.is_none() {
                        info.duration_ms = parse_duration_ms(stream.duration.as_deref());
                    }
                }
            }
        }

        if let Some(format) = parsed.format {
            if info.duration_ms.is_none() {
                info.duration_ms = parse_duration_ms(format.duration.as_deref());
            }
            info.bitrate = format.bit_rate.as_ref().and_then(|s| s.parse().ok());
            info.container = format.format_name;
            if let Some(tags) = format.tags {
                info.recorded_at = tags.creation_time;
                info.major_brand = tags.major_brand;
            }
        }

        Ok(info)
    }

    fn raw_json(&self, path: &Path) -> Result<Option<String>> {
        let output = Command::new(tools::ffprobe_path())
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| ReelVaultError::Metadata(format!("spawn ffprobe: {e}")))?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    }
}

fn parse_frame_rate(rate: Option<&str>) -> Option<f64> {
    let rate = rate?;
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    rate.parse().ok()
}

fn parse_duration_ms(duration: Option<&str>) -> Option<i64> {
    let seconds: f64 = duration?.parse().ok()?;
    Some((seconds * 1000.0) as i64)
}

pub fn is_available() -> bool {
    tools::is_tool_available("ffprobe")
}
