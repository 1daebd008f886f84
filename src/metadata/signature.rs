//! Raw file-signature provider: the last-resort metadata source when no probe tool is
//! available or a file is too damaged to demux. Sniffs a handful of magic bytes to at
//! least confirm a container family, which is enough for the camera identifier's rank-6
//! raw-signature fallback to have something to match folder/extension patterns against.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

use super::{MediaInfo, MetadataProvider};

pub struct SignatureProvider;

impl MetadataProvider for SignatureProvider {
    fn name(&self) -> &'static str {
        "file-signature"
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut buf = [0u8; 16];
        let mut file = File::open(path)?;
        let n = file.read(&mut buf)?;

        Ok(MediaInfo {
            container: sniff_container(&buf[..n]),
            ..Default::default()
        })
    }

    fn raw_json(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

fn sniff_container(head: &[u8]) -> Option<String> {
    if head.len() >= 4 && &head[0..4] == b"RIFF" {
        return Some("avi".to_string());
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some("mp4".to_string());
    }
    if head.first() == Some(&0x47) {
        // MPEG-TS sync byte, recurring every 188 bytes -- common for AVCHD .mts/.m2ts
        return Some("mpegts".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_riff_header() {
        assert_eq!(sniff_container(b"RIFF....AVI "), Some("avi".to_string()));
    }

    #[test]
    fn recognises_mpegts_sync_byte() {
        assert_eq!(sniff_container(&[0x47, 0, 0, 0]), Some("mpegts".to_string()));
    }

    #[test]
    fn unknown_header_returns_none() {
        assert_eq!(sniff_container(b"????"), None);
    }
}
