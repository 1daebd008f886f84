//! Binary sidecar provider, for camcorder families that drop a companion thumbnail or
//! low-res proxy file next to the clip (`.thm`, `.lrf`) carrying its own embedded tags.
//! These are themselves valid image/video files, so the provider simply points the
//! EXIF tag reader at the sidecar instead of the primary media file -- grounded on the
//! same `exiftool` invocation as `metadata::exif`, just against a different path.

use std::path::{Path, PathBuf};

use crate::constants::SIDECAR_EXTENSIONS;
use crate::error::Result;

use super::exif::ExifProvider;
use super::{MediaInfo, MetadataProvider};

const BINARY_SIDECAR_EXTENSIONS: [&str; 2] = ["thm", "lrf"];

pub struct BinarySidecarProvider {
    inner: ExifProvider,
}

impl Default for BinarySidecarProvider {
    fn default() -> Self {
        Self { inner: ExifProvider }
    }
}

impl MetadataProvider for BinarySidecarProvider {
    fn name(&self) -> &'static str {
        "binary-sidecar"
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        match find_binary_sidecar(path) {
            Some(sidecar) => self.inner.probe(&sidecar),
            None => Ok(MediaInfo::default()),
        }
    }

    fn raw_json(&self, path: &Path) -> Result<Option<String>> {
        match find_binary_sidecar(path) {
            Some(sidecar) => self.inner.raw_json(&sidecar),
            None => Ok(None),
        }
    }
}

fn find_binary_sidecar(media_path: &Path) -> Option<PathBuf> {
    for ext in BINARY_SIDECAR_EXTENSIONS {
        debug_assert!(SIDECAR_EXTENSIONS.contains(&ext));
        let candidate = media_path.with_extension(ext);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
