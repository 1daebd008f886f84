//! XML sidecar provider. Camcorders that ship alongside-clip XML (e.g. AVCHD/MXF style
//! `.xml` sidecars carrying `<Device manufacturer=.. modelName=..>` and
//! `<CreationDate value=..>` elements) are common enough in wedding-film source footage
//! that the metadata provider set needs one. Shaped like the other providers
//! (`probe`/`raw_json` against a same-stem sidecar file) and does a best-effort
//! tag/attribute scan with `quick-xml`'s streaming reader rather than building a DOM,
//! matching the low-ceremony style of `metadata::probe`/`metadata::exif`.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{ReelVaultError, Result};
use crate::scan;

use super::{MediaInfo, MetadataProvider};

pub struct XmlSidecarProvider;

impl MetadataProvider for XmlSidecarProvider {
    fn name(&self) -> &'static str {
        "xml-sidecar"
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let Some(sidecar) = find_xml_sidecar(path) else {
            return Ok(MediaInfo::default());
        };
        let contents = fs::read_to_string(&sidecar)?;
        Ok(scan(&contents)?)
    }

    fn raw_json(&self, path: &Path) -> Result<Option<String>> {
        let Some(sidecar) = find_xml_sidecar(path) else {
            return Ok(None);
        };
        let contents = fs::read_to_string(&sidecar)?;
        let info = scan(&contents)?;
        Ok(Some(serde_json::to_string(&info)?))
    }
}

fn find_xml_sidecar(media_path: &Path) -> Option<PathBuf> {
    scan::sidecars_for(media_path)
        .into_iter()
        .find(|p| p.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("xml")))
}

/// Walks the XML once, pulling out a small set of attribute/text values known to carry
/// make/model/creation-time on the camcorder families that emit these sidecars. Unknown
/// elements are skipped; a malformed sidecar degrades to an empty `MediaInfo` rather
/// than failing the whole provider.
fn scan(xml: &str) -> Result<MediaInfo> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut info = MediaInfo::default();
    let mut buf = Vec::new();
    let mut current_tag: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .unwrap_or_default()
                        .to_string();
                    apply_field(&mut info, &tag, &key, &value);
                }
                current_tag = Some(tag);
            }
            Ok(Event::Text(t)) => {
                if let Some(tag) = &current_tag {
                    let text = t.unescape().unwrap_or_default().to_string();
                    apply_field(&mut info, tag, "", &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ReelVaultError::Xml(format!("{e}"))),
        }
        buf.clear();
    }

    Ok(info)
}

fn apply_field(info: &mut MediaInfo, tag: &str, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let field = if !key.is_empty() { key } else { tag };
    match field {
        "manufacturer" | "make" => info.make.get_or_insert_with(|| value.to_string()),
        "modelname" | "model" => info.model.get_or_insert_with(|| value.to_string()),
        "value" if tag.contains("creationdate") || tag.contains("recordingtime") => {
            info.recorded_at.get_or_insert_with(|| value.to_string())
        }
        _ => return,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_make_model_and_creation_date() {
        let xml = r#"
            <NonRealTimeMeta>
                <Device manufacturer="Sony" modelName="HDR-CX405"/>
                <CreationDate value="2019-07-04T12:00:00+00:00"/>
            </NonRealTimeMeta>
        "#;
        let info = scan(xml).unwrap();
        assert_eq!(info.make.as_deref(), Some("Sony"));
        assert_eq!(info.model.as_deref(), Some("HDR-CX405"));
        assert_eq!(info.recorded_at.as_deref(), Some("2019-07-04T12:00:00+00:00"));
    }

    #[test]
    fn malformed_xml_degrades_to_empty_info() {
        let info = scan("<unterminated").unwrap_err();
        matches!(info, ReelVaultError::Xml(_));
    }
}
