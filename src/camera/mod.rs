//! Camera identification. Matches a scanned file to a camera record using a fixed
//! seven-rank priority cascade, stopping at the first rank that produces a match, rather
//! than a weighted-average-of-rules score.

use std::path::Path;

use regex::Regex;

use crate::metadata::MediaInfo;
use crate::model::Medium;
use crate::repository::{slugify, CameraRecord};
use crate::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRank {
    ExifMakeModel,
    ExifModelOnly,
    FilenameGlob,
    FolderGlob,
    ExifMakeOnly,
    RawSignature,
    DefaultForMedium,
}

impl MatchRank {
    pub fn confidence(&self) -> f64 {
        match self {
            MatchRank::ExifMakeModel => 0.95,
            MatchRank::ExifModelOnly => 0.85,
            MatchRank::FilenameGlob => 0.75,
            MatchRank::FolderGlob => 0.70,
            MatchRank::ExifMakeOnly => 0.60,
            MatchRank::RawSignature => 0.50,
            MatchRank::DefaultForMedium => 0.10,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchRank::ExifMakeModel => "exif_make_model",
            MatchRank::ExifModelOnly => "exif_model",
            MatchRank::FilenameGlob => "filename_glob",
            MatchRank::FolderGlob => "folder_glob",
            MatchRank::ExifMakeOnly => "exif_make",
            MatchRank::RawSignature => "raw_signature",
            MatchRank::DefaultForMedium => "default_fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraMatch {
    pub camera_id: Option<i64>,
    pub camera_name: String,
    pub medium: Medium,
    pub rank: MatchRank,
    pub confidence: f64,
}

/// Internal camera codenames -> marketing names. Applied before comparison so
/// codenamed pre-release firmware and retail units land on the same camera record.
const MODEL_REWRITES: &[(&str, &str)] = &[
    ("ILCE-7M3", "Sony A7 III"),
    ("ILCE-7RM4", "Sony A7R IV"),
    ("HDR-CX405", "Sony Handycam CX405"),
    ("EOS R5", "Canon EOS R5"),
];

pub fn normalize_model_name(raw: &str) -> String {
    for (codename, marketing) in MODEL_REWRITES {
        if raw.eq_ignore_ascii_case(codename) {
            return marketing.to_string();
        }
    }
    raw.to_string()
}

/// Identify a camera for one scanned file. `filename`/`folder` are the basename and
/// immediate parent folder name of the source path; `extension` is lowercased, no dot;
/// `path` is the full source path, consulted only by the rank-6 raw-signature fallback.
pub fn identify(
    cameras: &[CameraRecord],
    metadata: &MediaInfo,
    filename: &str,
    folder: &str,
    extension: &str,
    path: &Path,
) -> CameraMatch {
    if let Some(m) = match_exif_make_model(cameras, metadata) {
        return m;
    }
    if let Some(m) = match_exif_model_only(cameras, metadata) {
        return m;
    }
    if let Some(m) = match_filename_glob(cameras, filename) {
        return m;
    }
    if let Some(m) = match_folder_glob(cameras, folder) {
        return m;
    }
    if let Some(m) = match_exif_make_only(cameras, metadata) {
        return m;
    }
    if let Some(m) = match_raw_signature(cameras, metadata, folder, extension, path) {
        return m;
    }
    default_for_medium(detect_medium_from_metadata(metadata))
}

fn match_exif_make_model(cameras: &[CameraRecord], metadata: &MediaInfo) -> Option<CameraMatch> {
    let (make, model) = (metadata.make.as_ref()?, metadata.model.as_ref()?);
    let normalized_model = normalize_model_name(model);
    best_by_priority(cameras, |c| {
        c.make.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(make))
            && c.model
                .as_deref()
                .is_some_and(|m| normalize_model_name(m).eq_ignore_ascii_case(&normalized_model))
    })
    .map(|c| to_match(c, MatchRank::ExifMakeModel))
}

fn match_exif_model_only(cameras: &[CameraRecord], metadata: &MediaInfo) -> Option<CameraMatch> {
    let model = metadata.model.as_ref()?;
    let normalized = normalize_model_name(model).to_lowercase();
    best_by_priority(cameras, |c| {
        c.model
            .as_deref()
            .is_some_and(|m| normalize_model_name(m).to_lowercase().contains(&normalized))
    })
    .map(|c| to_match(c, MatchRank::ExifModelOnly))
}

fn match_filename_glob(cameras: &[CameraRecord], filename: &str) -> Option<CameraMatch> {
    best_pattern_match(cameras, "filename", filename).map(|c| to_match(c, MatchRank::FilenameGlob))
}

fn match_folder_glob(cameras: &[CameraRecord], folder: &str) -> Option<CameraMatch> {
    best_pattern_match(cameras, "folder", folder).map(|c| to_match(c, MatchRank::FolderGlob))
}

fn match_exif_make_only(cameras: &[CameraRecord], metadata: &MediaInfo) -> Option<CameraMatch> {
    let make = metadata.make.as_ref()?;
    // Make-only is too weak a signal for camcorders whose deinterlace handling
    // differs by model within the same make, so those cameras never match here.
    best_by_priority(cameras, |c| {
        !c.deinterlace && c.make.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(make))
    })
    .map(|c| to_match(c, MatchRank::ExifMakeOnly))
}

fn match_raw_signature(
    cameras: &[CameraRecord],
    metadata: &MediaInfo,
    folder: &str,
    extension: &str,
    path: &Path,
) -> Option<CameraMatch> {
    if let Some(m) = best_by_priority(cameras, |c| {
        let extension_matches = c
            .patterns
            .iter()
            .any(|p| p.kind == "extension" && p.glob.eq_ignore_ascii_case(extension));
        let container_matches = metadata.container.is_some()
            && c.patterns.iter().any(|p| p.kind == "extension");
        let folder_matches = c
            .patterns
            .iter()
            .any(|p| p.kind == "folder" && Regex::new(&p.glob).is_ok_and(|re| re.is_match(folder)));
        extension_matches || container_matches || folder_matches
    })
    .map(|c| to_match(c, MatchRank::RawSignature))
    {
        return Some(m);
    }

    if scan::is_avchd_structure(path) {
        return best_by_priority(cameras, |c| c.medium == Medium::Dadcam && c.is_default)
            .map(|c| to_match(c, MatchRank::RawSignature));
    }

    None
}

fn default_for_medium(medium: Medium) -> CameraMatch {
    CameraMatch {
        camera_id: None,
        camera_name: format!("Unidentified ({})", medium.as_str()),
        medium,
        rank: MatchRank::DefaultForMedium,
        confidence: MatchRank::DefaultForMedium.confidence(),
    }
}

/// Resolution under 480 lines with a near-4:3 aspect ratio reads as super8-like;
/// under 720 lines as dadcam-like (standard-def camcorder); anything else is modern.
fn detect_medium_from_metadata(metadata: &MediaInfo) -> Medium {
    match (metadata.width, metadata.height) {
        (Some(w), Some(h)) if h > 0 => {
            let aspect = w as f64 / h as f64;
            if h < 480 && (aspect - 4.0 / 3.0).abs() < 0.15 {
                Medium::Super8
            } else if h < 720 {
                Medium::Dadcam
            } else {
                Medium::Modern
            }
        }
        _ => Medium::Modern,
    }
}

fn best_pattern_match<'a>(cameras: &'a [CameraRecord], kind: &str, haystack: &str) -> Option<&'a CameraRecord> {
    best_by_priority(cameras, |c| {
        c.patterns
            .iter()
            .filter(|p| p.kind == kind)
            .any(|p| glob_matches(&p.glob, haystack))
    })
}

/// Among cameras that satisfy `predicate`, the tie-break within a rank is the
/// matching pattern's `priority` field (lower is stronger); cameras without patterns
/// fall back to declaration order.
fn best_by_priority<'a>(
    cameras: &'a [CameraRecord],
    predicate: impl Fn(&CameraRecord) -> bool,
) -> Option<&'a CameraRecord> {
    cameras
        .iter()
        .filter(|c| c.active && predicate(c))
        .min_by_key(|c| c.patterns.iter().map(|p| p.priority).min().unwrap_or(i32::MAX))
}

fn glob_matches(glob: &str, haystack: &str) -> bool {
    let pattern = regex::escape(glob).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{pattern}$"))
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

fn to_match(camera: &CameraRecord, rank: MatchRank) -> CameraMatch {
    CameraMatch {
        camera_id: Some(camera.id),
        camera_name: camera.nickname.clone().unwrap_or_else(|| camera.display_name.clone()),
        medium: camera.medium,
        rank,
        confidence: rank.confidence(),
    }
}

pub fn camera_slug(camera_name: &str) -> String {
    slugify(camera_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::CameraPatternRecord;

    fn camera(id: i64, display: &str, make: Option<&str>, model: Option<&str>) -> CameraRecord {
        CameraRecord {
            id,
            display_name: display.to_string(),
            nickname: None,
            medium: Medium::Modern,
            make: make.map(str::to_string),
            model: model.map(str::to_string),
            patterns: Vec::new(),
            lut_path: None,
            deinterlace: false,
            audio_channel_policy: None,
            is_default: false,
            active: true,
            system: false,
        }
    }

    #[test]
    fn make_and_model_outranks_everything() {
        let cameras = vec![camera(1, "Sony A7", Some("Sony"), Some("ILCE-7M3"))];
        let metadata = MediaInfo {
            make: Some("Sony".into()),
            model: Some("ILCE-7M3".into()),
            ..Default::default()
        };
        let m = identify(&cameras, &metadata, "clip.mp4", "footage", "mp4", Path::new("/src/footage/clip.mp4"));
        assert_eq!(m.rank, MatchRank::ExifMakeModel);
        assert_eq!(m.camera_id, Some(1));
    }

    #[test]
    fn falls_back_to_default_when_nothing_matches() {
        let cameras = vec![camera(1, "Sony A7", Some("Sony"), Some("ILCE-7M3"))];
        let metadata = MediaInfo::default();
        let m = identify(&cameras, &metadata, "unknown.mp4", "misc", "mp4", Path::new("/src/misc/unknown.mp4"));
        assert_eq!(m.rank, MatchRank::DefaultForMedium);
        assert_eq!(m.camera_id, None);
    }

    #[test]
    fn filename_glob_beats_folder_glob() {
        let mut cam = camera(1, "GoPro", None, None);
        cam.patterns = vec![CameraPatternRecord {
            kind: "filename".to_string(),
            glob: "GOPR*.mp4".to_string(),
            priority: 10,
        }];
        let cameras = vec![cam];
        let m = identify(&cameras, &MediaInfo::default(), "GOPR0001.mp4", "misc", "mp4", Path::new("/src/misc/GOPR0001.mp4"));
        assert_eq!(m.rank, MatchRank::FilenameGlob);
    }

    #[test]
    fn avchd_folder_structure_matches_default_dadcam_camera() {
        let mut default_dadcam = camera(1, "Default Camcorder", None, None);
        default_dadcam.medium = Medium::Dadcam;
        default_dadcam.is_default = true;
        let cameras = vec![default_dadcam];

        let path = Path::new("/Volumes/CARD/PRIVATE/AVCHD/BDMV/STREAM/00001.MTS");
        let m = identify(&cameras, &MediaInfo::default(), "00001.MTS", "STREAM", "mts", path);
        assert_eq!(m.rank, MatchRank::RawSignature);
        assert_eq!(m.camera_id, Some(1));
    }
}
