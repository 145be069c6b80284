//! Flat metadata projection.
//!
//! A pure, cursor-free transform over already-decoded records: each artifact
//! kind has a fixed, explicit whitelist of source fields promoted into an
//! insertion-ordered [`FlatMetadata`]; everything else is dropped without
//! error. For embedded element trees only the root node's own attributes are
//! promoted, never those of descendants. For embedded torrent payloads only
//! a handful of named keys are promoted under a fixed prefix.

use trawl_bencode::BValue;
use trawl_core::types::FlatMetadata;
use trawl_format::ElementNode;

use crate::download::DownloadRecord;
use crate::library::LibraryFile;
use crate::search::QueryHit;
use crate::thumbnail::ThumbnailEntry;

/// Keys promoted out of a decoded torrent payload, and the flat keys they
/// land under. Spaces in source keys become underscores in output keys.
const TORRENT_KEYS: &[(&str, &str)] = &[
    ("length", "torrent_length"),
    ("name", "torrent_name"),
    ("piece length", "torrent_piece_length"),
];

fn promote_torrent(value: &BValue, meta: &mut FlatMetadata) {
    // The interesting keys live either at the top level or inside the
    // payload's "info" dictionary.
    let info = value.get("info");
    for (source_key, flat_key) in TORRENT_KEYS {
        let found = value
            .get(source_key)
            .or_else(|| info.and_then(|i| i.get(source_key)));
        let Some(found) = found else { continue };
        match found {
            BValue::Int(n) => meta.insert(*flat_key, n.to_string()),
            BValue::Bytes(bytes) => {
                meta.insert(*flat_key, String::from_utf8_lossy(bytes).into_owned());
            }
            BValue::List(_) | BValue::Dict(_) => {}
        }
    }
}

/// Promote the root element's own attributes as `elementName.attributeName`.
fn promote_element(element: &ElementNode, meta: &mut FlatMetadata) {
    for (attr_name, attr_value) in &element.attributes {
        meta.insert_nonempty(format!("{}.{}", element.name, attr_name), attr_value.clone());
    }
}

pub fn project_download(record: &DownloadRecord) -> FlatMetadata {
    let mut meta = FlatMetadata::new();
    meta.insert_nonempty("name", record.name.clone());
    meta.insert("size", record.size.to_string());
    meta.insert_nonempty("keywords", record.search_keywords.clone());
    meta.insert_nonempty("sha1", record.sha1.clone());
    meta.insert_nonempty("tiger", record.tiger.clone());
    meta.insert_nonempty("ed2k", record.ed2k.clone());
    meta.insert_nonempty("md5", record.md5.clone());
    meta.insert("source_count", record.sources.len().to_string());
    meta.insert("paused", record.paused.to_string());
    meta.insert("seeding", record.seeding.to_string());
    if let Some(torrent) = &record.torrent {
        promote_torrent(torrent, &mut meta);
    }
    meta
}

pub fn project_library_file(file: &LibraryFile) -> FlatMetadata {
    let mut meta = FlatMetadata::new();
    meta.insert_nonempty("name", file.name.clone());
    meta.insert("size", file.size.to_string());
    if !file.modified.is_absent() {
        meta.insert("modified", file.modified.to_string());
    }
    meta.insert("shared", file.shared_resolved.to_string());
    meta.insert_nonempty("sha1", file.sha1.clone());
    meta.insert_nonempty("tiger", file.tiger.clone());
    meta.insert_nonempty("md5", file.md5.clone());
    if file.rating > 0 {
        meta.insert("rating", file.rating.to_string());
    }
    meta.insert_nonempty("comments", file.comments.clone());
    if let Some(element) = &file.metadata {
        promote_element(element, &mut meta);
    }
    meta
}

pub fn project_query_hit(hit: &QueryHit) -> FlatMetadata {
    let mut meta = FlatMetadata::new();
    meta.insert_nonempty("search_guid", hit.search_guid.clone());
    meta.insert_nonempty("client", hit.client_name.clone());
    meta.insert("address", hit.address.to_string());
    meta.insert("port", hit.port.to_string());
    meta.insert("size", hit.size.to_string());
    if !hit.seen_at.is_absent() {
        meta.insert("seen_at", hit.seen_at.to_string());
    }
    meta
}

pub fn project_thumbnail(entry: &ThumbnailEntry) -> FlatMetadata {
    let mut meta = FlatMetadata::new();
    meta.insert_nonempty("path", entry.path.clone());
    meta.insert("width", entry.width.to_string());
    meta.insert("height", entry.height.to_string());
    meta.insert("image_bytes", entry.image.len().to_string());
    if !entry.last_write.is_absent() {
        meta.insert("last_write", entry.last_write.to_string());
    }
    meta
}
