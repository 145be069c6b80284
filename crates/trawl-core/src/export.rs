use serde::{Deserialize, Serialize};

use crate::diag::Diagnostic;
use crate::types::FlatMetadata;

/// Top-level structure of an evidence export bundle (version 1).
///
/// This is the only place decoded data leaves the core: flat metadata plus
/// the provenance of the byte source it was projected from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundleV1 {
    pub format: String, // "trawl.export.v1"
    pub tool: ExportToolInfo,
    pub records: Vec<ExportRecordV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportToolInfo {
    pub name: String,
    pub version: String,
}

/// One projected artifact record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecordV1 {
    /// Artifact kind name, e.g. "download" or "library_file".
    pub kind: String,
    /// Path of the evidence file the record was decoded from.
    pub source_path: String,
    /// Whitelisted key/value projection, in insertion order.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Human-readable soft events observed during the decode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

pub const EXPORT_FORMAT_V1: &str = "trawl.export.v1";

impl ExportBundleV1 {
    pub fn new(tool_name: &str, tool_version: &str) -> Self {
        Self {
            format: EXPORT_FORMAT_V1.to_owned(),
            tool: ExportToolInfo {
                name: tool_name.to_owned(),
                version: tool_version.to_owned(),
            },
            records: Vec::new(),
        }
    }
}

impl ExportRecordV1 {
    pub fn from_metadata(
        kind: &str,
        source_path: &str,
        metadata: &FlatMetadata,
        diagnostics: &[Diagnostic],
    ) -> Self {
        let mut map = serde_json::Map::with_capacity(metadata.len());
        for (key, value) in metadata.iter() {
            map.insert(key.to_owned(), serde_json::Value::String(value.to_owned()));
        }
        Self {
            kind: kind.to_owned(),
            source_path: source_path.to_owned(),
            metadata: map,
            diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_record_preserves_metadata_order() {
        let mut meta = FlatMetadata::new();
        meta.insert("name", "a.txt");
        meta.insert("size", "1000");
        meta.insert("sha1", "aa".repeat(20));
        let record = ExportRecordV1::from_metadata("download", "case/evidence.sd", &meta, &[]);
        let json = serde_json::to_string(&record).unwrap();
        let name_at = json.find("\"name\"").unwrap();
        let size_at = json.find("\"size\"").unwrap();
        let sha1_at = json.find("\"sha1\"").unwrap();
        assert!(name_at < size_at && size_at < sha1_at);
        assert!(!json.contains("diagnostics"));
    }

    #[test]
    fn export_bundle_round_trips() {
        let mut bundle = ExportBundleV1::new("trawl", "0.1.0");
        let mut meta = FlatMetadata::new();
        meta.insert("path", "C:\\Shared\\a.txt");
        bundle.records.push(ExportRecordV1::from_metadata(
            "library_file",
            "case/Library1.dat",
            &meta,
            &[Diagnostic::UnsupportedVersion {
                kind: "ManagedSearch",
                version: 99,
            }],
        ));
        let json = serde_json::to_string(&bundle).unwrap();
        let back: ExportBundleV1 = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format, EXPORT_FORMAT_V1);
        assert_eq!(back.records.len(), 1);
        assert_eq!(back.records[0].diagnostics.len(), 1);
    }
}
