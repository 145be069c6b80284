//! Thumbnail-cache decoder.
//!
//! A flat, count-driven cache of rendered previews: each entry carries the
//! source path, a last-write file time, pixel dimensions, and a
//! length-prefixed image blob. The blob length is attacker-influenced and is
//! bounded before allocation like every other length field.

use trawl_core::diag::{Decode, Diagnostic, Outcome};
use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;
use trawl_core::types::Timestamp;
use trawl_format::{stamp, ByteCursor, Ctx, Flow, VersionPlan};

pub const THUMBNAIL_SIGNATURE: &[u8; 3] = b"THN";
pub const THUMBNAIL_MIN_VERSION: i32 = 1;
pub const THUMBNAIL_MAX_VERSION: i32 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ThumbnailEntry {
    pub path: String,
    pub last_write: Timestamp,
    pub width: u16,
    pub height: u16,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub image: Vec<u8>,
}

// Entries share the cache's version header.
const ENTRY_PLAN: VersionPlan<ThumbnailEntry> = VersionPlan {
    kind: "ThumbnailEntry",
    min_version: THUMBNAIL_MIN_VERSION,
    max_version: THUMBNAIL_MAX_VERSION,
    steps: &[(1, entry_path), (2, entry_last_write), (1, entry_image)],
};

fn entry_path(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    entry: &mut ThumbnailEntry,
) -> Result<Flow, DecodeError> {
    entry.path = cur.read_string()?;
    Ok(Flow::Continue)
}

fn entry_last_write(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    entry: &mut ThumbnailEntry,
) -> Result<Flow, DecodeError> {
    entry.last_write = stamp::filetime(cur.read_u64()?);
    Ok(Flow::Continue)
}

fn entry_image(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    entry: &mut ThumbnailEntry,
) -> Result<Flow, DecodeError> {
    entry.width = cur.read_u16()?;
    entry.height = cur.read_u16()?;
    let len = cur.read_u32()?;
    let len = ctx.check_blob("ThumbnailEntry.image_length", len)?;
    entry.image = cur.read_blob(len)?.to_vec();
    Ok(Flow::Continue)
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ThumbnailCacheRecord {
    pub version: i32,
    pub valid: bool,
    pub entries: Vec<ThumbnailEntry>,
}

/// Decode a thumbnail-cache file image.
pub fn decode_thumbnail_cache(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<Decode<ThumbnailCacheRecord>, DecodeError> {
    let mut diagnostics = Vec::new();
    if bytes.len() < THUMBNAIL_SIGNATURE.len() || &bytes[..3] != THUMBNAIL_SIGNATURE {
        return Ok(Decode::new(Outcome::WrongKind, diagnostics));
    }
    let mut cursor = ByteCursor::new(bytes);
    cursor.skip(THUMBNAIL_SIGNATURE.len())?;

    let version = cursor.read_i32()?;
    let mut record = ThumbnailCacheRecord {
        version,
        ..ThumbnailCacheRecord::default()
    };
    if !(THUMBNAIL_MIN_VERSION..=THUMBNAIL_MAX_VERSION).contains(&version) {
        diagnostics.push(Diagnostic::UnsupportedVersion {
            kind: "ThumbnailCacheRecord",
            version,
        });
        return Ok(Decode::new(Outcome::Unsupported { version, record }, diagnostics));
    }

    let mut ctx = Ctx {
        version,
        limits,
        diagnostics: &mut diagnostics,
        depth: 0,
    };
    let entry_count = cursor.read_count()?;
    let entry_count = ctx.check_count("ThumbnailCacheRecord.entry_count", entry_count)?;
    record.entries.reserve(entry_count.min(64));
    for _ in 0..entry_count {
        let entry = ENTRY_PLAN.run_fields(&mut cursor, &mut ctx)?;
        record.entries.push(entry.value);
    }
    record.valid = true;
    Ok(Decode::new(Outcome::Decoded(record), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_str(buf: &mut Vec<u8>, s: &str) {
        buf.push(s.len() as u8);
        buf.extend_from_slice(s.as_bytes());
    }

    fn build_cache_v4(image: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(THUMBNAIL_SIGNATURE);
        buf.extend(4i32.to_le_bytes());
        buf.extend(1u32.to_le_bytes());
        push_str(&mut buf, "C:\\Shared\\song.mp3");
        buf.extend(0u64.to_le_bytes()); // last write absent
        buf.extend(64u16.to_le_bytes());
        buf.extend(48u16.to_le_bytes());
        buf.extend((image.len() as u32).to_le_bytes());
        buf.extend_from_slice(image);
        buf
    }

    #[test]
    fn decodes_entries() {
        let data = build_cache_v4(&[0xff, 0xd8, 0xff]);
        let decode = decode_thumbnail_cache(&data, &DecodeLimits::default()).unwrap();
        let record = decode.outcome.record().expect("decoded");
        assert!(record.valid);
        assert_eq!(record.entries.len(), 1);
        let entry = &record.entries[0];
        assert_eq!(entry.path, "C:\\Shared\\song.mp3");
        assert!(entry.last_write.is_absent());
        assert_eq!((entry.width, entry.height), (64, 48));
        assert_eq!(entry.image, vec![0xff, 0xd8, 0xff]);
    }

    #[test]
    fn wrong_signature_is_not_this_kind() {
        let decode = decode_thumbnail_cache(b"ZZZ", &DecodeLimits::default()).unwrap();
        assert_eq!(decode.outcome, Outcome::WrongKind);
    }

    #[test]
    fn future_version_soft_fails() {
        let mut buf = Vec::new();
        buf.extend(THUMBNAIL_SIGNATURE);
        buf.extend(6i32.to_le_bytes());
        let decode = decode_thumbnail_cache(&buf, &DecodeLimits::default()).unwrap();
        assert!(matches!(
            decode.outcome,
            Outcome::Unsupported { version: 6, .. }
        ));
        assert_eq!(decode.diagnostics.len(), 1);
    }

    #[test]
    fn oversized_image_length_is_fatal() {
        let mut data = build_cache_v4(&[]);
        // Rewrite the image length field (last 4 bytes) to a huge value.
        let len = data.len();
        data[len - 4..].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = decode_thumbnail_cache(&data, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitExceeded {
                field: "ThumbnailEntry.image_length",
                ..
            }
        ));
    }

    #[test]
    fn truncated_image_is_underrun() {
        let mut data = build_cache_v4(&[1, 2, 3, 4]);
        data.truncate(data.len() - 2);
        let err = decode_thumbnail_cache(&data, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::BufferUnderrun { .. }));
    }
}
