//! EXIF-like tag reader provider (exiftool). Grounded on the source tree's
//! `metadata::exiftool`, reshaped to implement `MetadataProvider`.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::{ReelVaultError, Result};
use crate::tools;

use super::{MediaInfo, MetadataProvider};

#[derive(Debug, Deserialize, Default)]
struct ExifToolOutput {
    #[serde(rename = "DateTimeOriginal")]
    date_time_original: Option<String>,
    #[serde(rename = "CreateDate")]
    create_date: Option<String>,
    #[serde(rename = "MediaCreateDate")]
    media_create_date: Option<String>,
    #[serde(rename = "Make")]
    make: Option<String>,
    #[serde(rename = "Model")]
    model: Option<String>,
    #[serde(rename = "LensModel")]
    lens_model: Option<String>,
    #[serde(rename = "GPSLatitude")]
    gps_latitude: Option<String>,
    #[serde(rename = "GPSLongitude")]
    gps_longitude: Option<String>,
}

pub struct ExifProvider;

impl MetadataProvider for ExifProvider {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = run_exiftool(path)?;
        let parsed: Vec<ExifToolOutput> = serde_json::from_slice(&output)
            .map_err(|e| ReelVaultError::Metadata(format!("parse exiftool json: {e}")))?;
        let exif = parsed.into_iter().next().unwrap_or_default();

        let raw_date = exif.date_time_original.or(exif.create_date).or(exif.media_create_date);
        let gps = match (exif.gps_latitude, exif.gps_longitude) {
            (Some(lat), Some(lon)) => match (parse_gps_coord(&lat), parse_gps_coord(&lon)) {
                (Some(lat), Some(lon)) => Some((lat, lon)),
                _ => None,
            },
            _ => None,
        };

        Ok(MediaInfo {
            make: exif.make,
            model: exif.model,
            lens: exif.lens_model,
            recorded_at: raw_date.and_then(|d| parse_exif_date(&d)),
            gps,
            ..Default::default()
        })
    }

    fn raw_json(&self, path: &Path) -> Result<Option<String>> {
        let output = run_exiftool(path)?;
        Ok(Some(String::from_utf8_lossy(&output).to_string()))
    }
}

fn run_exiftool(path: &Path) -> Result<Vec<u8>> {
    let output = Command::new(tools::exiftool_path())
        .args([
            "-j",
            "-DateTimeOriginal",
            "-CreateDate",
            "-MediaCreateDate",
            "-Make",
            "-Model",
            "-LensModel",
            "-GPSLatitude",
            "-GPSLongitude",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelVaultError::Metadata(format!("spawn exiftool: {e}")))?;

    if !output.status.success() {
        return Err(ReelVaultError::Metadata(format!(
            "exiftool exited non-zero: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output.stdout)
}

/// "2019:07:04 12:30:45" -> "2019-07-04T12:30:45Z"
fn parse_exif_date(date_str: &str) -> Option<String> {
    let parts: Vec<&str> = date_str.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let date_part = parts[0].replace(':', "-");
    let time_part = parts[1];
    Some(format!("{date_part}T{time_part}Z"))
}

/// ExifTool may return "34 deg 3' 30.00\" N" or an already-decimal string.
fn parse_gps_coord(coord_str: &str) -> Option<f64> {
    if let Ok(val) = coord_str.parse::<f64>() {
        return Some(val);
    }
    let re = regex::Regex::new(r#"(\d+)\s*deg\s*(\d+)'\s*([\d.]+)"?\s*([NSEW])?"#).ok()?;
    let caps = re.captures(coord_str)?;
    let deg: f64 = caps.get(1)?.as_str().parse().ok()?;
    let min: f64 = caps.get(2)?.as_str().parse().ok()?;
    let sec: f64 = caps.get(3)?.as_str().parse().ok()?;
    let dir = caps.get(4).map(|m| m.as_str()).unwrap_or("N");
    let mut decimal = deg + min / 60.0 + sec / 3600.0;
    if dir == "S" || dir == "W" {
        decimal = -decimal;
    }
    Some(decimal)
}

pub fn is_available() -> bool {
    tools::is_tool_available("exiftool")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exif_date() {
        assert_eq!(
            parse_exif_date("2019:07:04 12:30:45"),
            Some("2019-07-04T12:30:45Z".to_string())
        );
    }

    #[test]
    fn parses_decimal_gps_coord() {
        assert_eq!(parse_gps_coord("34.0583"), Some(34.0583));
    }
}
