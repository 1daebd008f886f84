//! Metadata provider set.
//!
//! A provider is a small capability trait, not a hardcoded call chain: the camera
//! identifier consults an ordered `Vec<Box<dyn MetadataProvider>>` built from
//! `Config`, so new extractors can be added without touching the identification logic.
//! The probe/tag-reader pairing merges results by preferring the tag reader's dates.

pub mod binary_sidecar;
pub mod exif;
pub mod probe;
pub mod signature;
pub mod xml_sidecar;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a provider can tell us about a file. All fields are optional because any single
/// provider may only cover part of this; the core tolerates partial information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens: Option<String>,
    pub recorded_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub frame_rate: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
    pub container: Option<String>,
    pub major_brand: Option<String>,
    pub gps: Option<(f64, f64)>,
}

impl MediaInfo {
    /// Fill any field left `None` in `self` from `other`, preferring `self`'s values.
    pub fn merge_missing(mut self, other: MediaInfo) -> Self {
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = other.$field;
                }
            };
        }
        fill!(make);
        fill!(model);
        fill!(lens);
        fill!(recorded_at);
        fill!(duration_ms);
        fill!(width);
        fill!(height);
        fill!(frame_rate);
        fill!(codec);
        fill!(bitrate);
        fill!(container);
        fill!(major_brand);
        fill!(gps);
        self
    }
}

/// The capability interface every metadata extractor implements. Providers may fail
/// individually without aborting the pipeline; callers degrade to partial information
/// and continue.
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn probe(&self, path: &Path) -> Result<MediaInfo>;
    fn raw_json(&self, path: &Path) -> Result<Option<String>>;
}

/// Run every provider in the configured order, merging results so an earlier provider's
/// fields win and a later provider only fills gaps. Individual provider failures are
/// swallowed here; the caller never sees which provider failed, only the merged result.
pub fn probe_all(providers: &[Box<dyn MetadataProvider>], path: &Path) -> MediaInfo {
    let mut merged = MediaInfo::default();
    for provider in providers {
        if let Ok(info) = provider.probe(path) {
            merged = merged.merge_missing(info);
        }
    }
    merged
}

/// Looks up the raw exiftool and ffprobe JSON blobs for a path by name, independent of
/// provider order, so callers can persist the untouched provider output alongside the
/// merged `MediaInfo` without re-running every provider.
pub fn raw_blobs(providers: &[Box<dyn MetadataProvider>], path: &Path) -> (Option<String>, Option<String>) {
    let raw_exif = providers
        .iter()
        .find(|p| p.name() == "exif")
        .and_then(|p| p.raw_json(path).ok().flatten());
    let raw_probe = providers
        .iter()
        .find(|p| p.name() == "container-probe")
        .and_then(|p| p.raw_json(path).ok().flatten());
    (raw_exif, raw_probe)
}

/// Build the provider chain in priority order: tag readers first (most specific and
/// cheapest to trust), sidecar formats next, magic-byte sniffing last as the fallback
/// when nothing else could say anything about the file.
pub fn default_providers() -> Vec<Box<dyn MetadataProvider>> {
    vec![
        Box::new(exif::ExifProvider),
        Box::new(probe::ContainerProbeProvider),
        Box::new(xml_sidecar::XmlSidecarProvider),
        Box::new(binary_sidecar::BinarySidecarProvider::default()),
        Box::new(signature::SignatureProvider),
    ]
}

pub fn detect_media_type(extension: &str) -> &'static str {
    let ext = extension.to_lowercase();
    if crate::constants::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        "video"
    } else if crate::constants::AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        "audio"
    } else if crate::constants::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        "image"
    } else {
        "video"
    }
}

/// Parse a folder name like "2019-07-04" or "2019-07-04 Ceremony" into an RFC3339
/// midnight-UTC timestamp. The middle rung of the `TIMESTAMP_PRECEDENCE` chain.
pub fn parse_folder_date(folder_name: &str) -> Option<String> {
    if let Ok(date) = chrono::NaiveDate::parse_from_str(folder_name, "%Y-%m-%d") {
        return Some(format!("{date}T00:00:00Z"));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(folder_name, "%Y%m%d") {
        return Some(format!("{date}T00:00:00Z"));
    }
    let re = regex::Regex::new(r"(\d{4})-(\d{2})-(\d{2})").ok()?;
    let caps = re.captures(folder_name)?;
    Some(format!(
        "{}-{}-{}T00:00:00Z",
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_missing_prefers_self() {
        let a = MediaInfo { make: Some("Sony".into()), ..Default::default() };
        let b = MediaInfo {
            make: Some("Canon".into()),
            model: Some("EOS".into()),
            ..Default::default()
        };
        let merged = a.merge_missing(b);
        assert_eq!(merged.make.as_deref(), Some("Sony"));
        assert_eq!(merged.model.as_deref(), Some("EOS"));
    }

    #[test]
    fn folder_date_parses_dashed_form() {
        assert_eq!(parse_folder_date("2019-07-04"), Some("2019-07-04T00:00:00Z".to_string()));
    }

    #[test]
    fn folder_date_parses_embedded_form() {
        assert_eq!(
            parse_folder_date("2019-07-04 Ceremony"),
            Some("2019-07-04T00:00:00Z".to_string())
        );
    }
}
