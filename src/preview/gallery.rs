//! Gallery stills: three poster frames per video, taken at 25/50/75% of its duration, so a
//! viewer can judge a clip from more than one frame without opening the proxy. Grounded on
//! `preview::thumb`'s single-frame ffmpeg invocation, generalized to a fixed set of seek
//! percentages instead of one.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::constants::GALLERY_PERCENTILES;
use crate::preview::thumb::{self, ThumbOptions};

/// Generate the gallery stills for a video into `output_dir`, named
/// `<fingerprint>_<percent>.jpg`. Each frame reuses `thumb::generate_thumbnail` with the
/// seek percentage swapped in; a still is skipped (not retried) if ffmpeg can't produce it,
/// since a partial gallery is still useful and shouldn't block the rest of finalization.
pub fn generate_gallery(
    source_path: &Path,
    output_dir: &Path,
    fingerprint: &str,
    duration_ms: Option<i64>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut produced = Vec::with_capacity(GALLERY_PERCENTILES.len());
    let mut last_err = None;
    for pct in GALLERY_PERCENTILES {
        let output_path = output_dir.join(format!("{fingerprint}_{pct}.jpg"));
        let options = ThumbOptions {
            seek_percent: pct as f64 / 100.0,
            ..ThumbOptions::default()
        };
        match thumb::generate_thumbnail(source_path, &output_path, duration_ms, &options) {
            Ok(()) => produced.push(output_path),
            Err(e) => {
                log::warn!("gallery still at {pct}% failed for {}: {e}", source_path.display());
                last_err = Some(e);
            }
        }
    }

    if produced.is_empty() {
        return Err(last_err.unwrap_or_else(|| anyhow!("no gallery stills produced")));
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_match_output_naming() {
        assert_eq!(GALLERY_PERCENTILES, [25, 50, 75]);
    }
}
