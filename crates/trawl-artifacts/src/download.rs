//! Download-manager record decoder.
//!
//! The application persists one in-progress or completed transfer per file,
//! with a 3-byte `SDL` signature, a format version, version-gated scalar
//! fields, an optional embedded torrent payload (length-prefixed bencode),
//! and a count-driven list of shared sources.

use std::net::Ipv4Addr;

use trawl_bencode::BValue;
use trawl_core::diag::{Decode, Outcome};
use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;
use trawl_core::types::{HashKind, Timestamp};
use trawl_format::{stamp, ByteCursor, Ctx, Flow, VersionPlan};

pub const DOWNLOAD_SIGNATURE: &[u8; 3] = b"SDL";

/// One remote peer known to hold the file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SharedSource {
    pub address: Ipv4Addr,
    pub port: u16,
    pub server_name: String,
    pub client_guid: String,
    pub last_seen: Timestamp,
    pub speed: u32,
}

impl Default for SharedSource {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            server_name: String::new(),
            client_guid: String::new(),
            last_seen: Timestamp::absent(),
            speed: 0,
        }
    }
}

const SOURCE_PLAN: VersionPlan<SharedSource> = VersionPlan {
    kind: "SharedSource",
    min_version: 7,
    max_version: 21,
    steps: &[
        (7, source_address),
        (14, source_server_name),
        (10, source_client_guid),
        (7, source_last_seen),
        (12, source_speed),
    ],
};

fn source_address(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    src: &mut SharedSource,
) -> Result<Flow, DecodeError> {
    src.address = cur.read_ipv4()?;
    src.port = cur.read_u16()?;
    Ok(Flow::Continue)
}

fn source_server_name(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    src: &mut SharedSource,
) -> Result<Flow, DecodeError> {
    src.server_name = cur.read_string()?;
    Ok(Flow::Continue)
}

fn source_client_guid(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    src: &mut SharedSource,
) -> Result<Flow, DecodeError> {
    src.client_guid = cur.read_guid()?;
    Ok(Flow::Continue)
}

fn source_last_seen(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    src: &mut SharedSource,
) -> Result<Flow, DecodeError> {
    src.last_seen = stamp::unix32(cur.read_u32()?);
    Ok(Flow::Continue)
}

fn source_speed(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    src: &mut SharedSource,
) -> Result<Flow, DecodeError> {
    src.speed = cur.read_u32()?;
    Ok(Flow::Continue)
}

/// A decoded download-manager record.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DownloadRecord {
    pub version: i32,
    pub valid: bool,
    pub name: String,
    pub search_keywords: String,
    pub size: u64,
    pub sha1: String,
    pub tiger: String,
    pub ed2k: String,
    pub md5: String,
    /// Decoded embedded torrent payload, when the record carried one and it
    /// parsed cleanly.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub torrent: Option<BValue>,
    pub sources: Vec<SharedSource>,
    pub paused: bool,
    pub expanded: bool,
    pub seeding: bool,
}

const PLAN: VersionPlan<DownloadRecord> = VersionPlan {
    kind: "DownloadRecord",
    min_version: 11,
    max_version: 42,
    steps: &[
        (11, name),
        (29, search_keywords),
        (11, size),
        (11, hash_sha1),
        (12, hash_tiger),
        (13, hash_ed2k),
        (22, hash_md5),
        (22, torrent),
        (11, sources),
        (11, transfer_flags),
        (26, seeding),
    ],
};

fn name(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.name = cur.read_string()?;
    Ok(Flow::Continue)
}

fn search_keywords(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.search_keywords = cur.read_string()?;
    Ok(Flow::Continue)
}

// The size field widened from 32 to 64 bits in version 29.
fn size(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.size = if ctx.version >= 29 {
        cur.read_u64()?
    } else {
        u64::from(cur.read_u32()?)
    };
    Ok(Flow::Continue)
}

fn hash_sha1(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.sha1 = cur.read_hash(HashKind::Sha1)?;
    Ok(Flow::Continue)
}

fn hash_tiger(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.tiger = cur.read_hash(HashKind::TigerTree)?;
    Ok(Flow::Continue)
}

fn hash_ed2k(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.ed2k = cur.read_hash(HashKind::Ed2k)?;
    Ok(Flow::Continue)
}

fn hash_md5(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.md5 = cur.read_hash(HashKind::Md5)?;
    Ok(Flow::Continue)
}

// Length-prefixed embedded blob. Zero length means no payload and no bytes
// consumed beyond the length field; a malformed payload costs only this one
// field, never the record.
fn torrent(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    let len = cur.read_u32()?;
    if len == 0 {
        return Ok(Flow::Continue);
    }
    let len = ctx.check_blob("DownloadRecord.torrent_length", len)?;
    let blob = cur.read_blob(len)?;
    match trawl_bencode::decode(blob) {
        Ok(value) => rec.torrent = Some(value),
        Err(err) => ctx.sub_decode_failed("DownloadRecord", "torrent", err.to_string()),
    }
    Ok(Flow::Continue)
}

fn sources(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    let count = cur.read_count()?;
    let count = ctx.check_count("DownloadRecord.source_count", count)?;
    rec.sources.reserve(count.min(64));
    for _ in 0..count {
        let source = SOURCE_PLAN.run_nested(cur, ctx)?;
        if !source.valid {
            return Ok(Flow::Halt);
        }
        rec.sources.push(source.value);
    }
    Ok(Flow::Continue)
}

fn transfer_flags(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.paused = cur.read_bool()?;
    rec.expanded = cur.read_bool()?;
    Ok(Flow::Continue)
}

fn seeding(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    rec: &mut DownloadRecord,
) -> Result<Flow, DecodeError> {
    rec.seeding = cur.read_bool()?;
    Ok(Flow::Continue)
}

/// Decode one download record file.
pub fn decode_download(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<Decode<DownloadRecord>, DecodeError> {
    let mut diagnostics = Vec::new();
    if bytes.len() < DOWNLOAD_SIGNATURE.len() || &bytes[..3] != DOWNLOAD_SIGNATURE {
        return Ok(Decode::new(Outcome::WrongKind, diagnostics));
    }
    let mut cursor = ByteCursor::new(bytes);
    cursor.skip(DOWNLOAD_SIGNATURE.len())?;

    let out = PLAN.run(&mut cursor, limits, &mut diagnostics)?;
    let mut record = out.value;
    record.version = out.version;
    record.valid = out.valid;
    if out.version < PLAN.min_version || out.version > PLAN.max_version {
        return Ok(Decode::new(
            Outcome::Unsupported {
                version: out.version,
                record,
            },
            diagnostics,
        ));
    }
    Ok(Decode::new(Outcome::Decoded(record), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_core::diag::Diagnostic;

    fn push_str(buf: &mut Vec<u8>, s: &str) {
        assert!(s.len() < 0xff);
        buf.push(s.len() as u8);
        buf.extend_from_slice(s.as_bytes());
    }

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend(v.to_le_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend(v.to_le_bytes());
    }

    fn push_u64(buf: &mut Vec<u8>, v: u64) {
        buf.extend(v.to_le_bytes());
    }

    fn push_i32(buf: &mut Vec<u8>, v: i32) {
        buf.extend(v.to_le_bytes());
    }

    fn push_source_v15(buf: &mut Vec<u8>, address: [u8; 4], port: u16, name: &str) {
        push_i32(buf, 15);
        buf.extend(address);
        push_u16(buf, port);
        push_str(buf, name);
        buf.extend([0u8; 16]); // client guid absent
        push_u32(buf, 1_400_000_000); // last seen
        push_u32(buf, 512); // speed
    }

    fn build_v30(torrent: &[u8], source_count: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(DOWNLOAD_SIGNATURE);
        push_i32(&mut buf, 30);
        push_str(&mut buf, "movie.mkv");
        push_str(&mut buf, "movie");
        push_u64(&mut buf, 5_000_000_000);
        let mut sha1 = [0u8; 20];
        sha1[0] = 0xaa;
        buf.extend(sha1);
        buf.extend([0u8; 24]); // tiger absent
        buf.extend([0u8; 16]); // ed2k absent
        buf.extend([0u8; 16]); // md5 absent
        push_u32(&mut buf, torrent.len() as u32);
        buf.extend_from_slice(torrent);
        // The claimed count may exceed the sources actually present, for
        // exercising the count bound.
        push_u32(&mut buf, source_count);
        for i in 0..source_count.min(8) {
            push_source_v15(&mut buf, [10, 0, 0, i as u8 + 1], 6346, "peer");
        }
        push_u32(&mut buf, 1); // paused
        push_u32(&mut buf, 0); // expanded
        push_u32(&mut buf, 1); // seeding
        buf
    }

    #[test]
    fn decodes_current_version_fixture() {
        let torrent = b"d6:lengthi1000e4:name5:a.txte";
        let data = build_v30(torrent, 2);
        let decode = decode_download(&data, &DecodeLimits::default()).unwrap();
        let record = decode.outcome.record().expect("decoded");
        assert!(record.valid);
        assert_eq!(record.version, 30);
        assert_eq!(record.name, "movie.mkv");
        assert_eq!(record.search_keywords, "movie");
        assert_eq!(record.size, 5_000_000_000);
        assert!(record.sha1.starts_with("aa"));
        assert_eq!(record.tiger, "");
        assert_eq!(record.ed2k, "");
        assert_eq!(record.md5, "");
        let torrent = record.torrent.as_ref().expect("torrent");
        assert_eq!(torrent.get("length").and_then(BValue::as_int), Some(1000));
        assert_eq!(record.sources.len(), 2);
        assert_eq!(record.sources[0].address, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(record.sources[0].port, 6346);
        assert_eq!(record.sources[0].server_name, "peer");
        assert_eq!(record.sources[0].client_guid, "");
        assert!(record.paused);
        assert!(!record.expanded);
        assert!(record.seeding);
        assert!(decode.diagnostics.is_empty());
    }

    #[test]
    fn decodes_legacy_version_with_narrow_size() {
        let mut buf = Vec::new();
        buf.extend(DOWNLOAD_SIGNATURE);
        push_i32(&mut buf, 20);
        push_str(&mut buf, "song.mp3");
        // No keyword field below v29; size is 32 bits.
        push_u32(&mut buf, 4_000_000);
        buf.extend([0u8; 20]); // sha1 absent
        buf.extend([0u8; 24]); // tiger absent
        buf.extend([0u8; 16]); // ed2k absent
        // No md5, no torrent below v22.
        push_u32(&mut buf, 0); // sources
        push_u32(&mut buf, 0); // paused
        push_u32(&mut buf, 1); // expanded
        // No seeding flag below v26.

        let decode = decode_download(&buf, &DecodeLimits::default()).unwrap();
        let record = decode.outcome.record().expect("decoded");
        assert!(record.valid);
        assert_eq!(record.size, 4_000_000);
        assert_eq!(record.search_keywords, "");
        assert_eq!(record.sha1, "");
        assert!(record.torrent.is_none());
        assert!(record.expanded);
        assert!(!record.seeding);
    }

    #[test]
    fn wrong_signature_is_not_this_kind() {
        let decode = decode_download(b"XYZ rest", &DecodeLimits::default()).unwrap();
        assert_eq!(decode.outcome, Outcome::WrongKind);
        let decode = decode_download(b"SD", &DecodeLimits::default()).unwrap();
        assert_eq!(decode.outcome, Outcome::WrongKind);
    }

    #[test]
    fn future_version_yields_unsupported_with_defaults() {
        let mut buf = Vec::new();
        buf.extend(DOWNLOAD_SIGNATURE);
        push_i32(&mut buf, 43);
        push_str(&mut buf, "anything");
        let decode = decode_download(&buf, &DecodeLimits::default()).unwrap();
        match decode.outcome {
            Outcome::Unsupported { version, record } => {
                assert_eq!(version, 43);
                assert!(!record.valid);
                assert_eq!(record.name, "");
                assert_eq!(record.size, 0);
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
        assert_eq!(
            decode.diagnostics,
            vec![Diagnostic::UnsupportedVersion {
                kind: "DownloadRecord",
                version: 43
            }]
        );
    }

    #[test]
    fn malformed_torrent_costs_only_that_field() {
        let data = build_v30(b"not bencode", 1);
        let decode = decode_download(&data, &DecodeLimits::default()).unwrap();
        let record = decode.outcome.record().expect("decoded");
        assert!(record.valid);
        assert!(record.torrent.is_none());
        assert_eq!(record.sources.len(), 1);
        assert!(matches!(
            decode.diagnostics.as_slice(),
            [Diagnostic::SubDecodeFailed { kind: "DownloadRecord", field: "torrent", .. }]
        ));
    }

    #[test]
    fn unsupported_nested_source_halts_the_record() {
        let mut buf = Vec::new();
        buf.extend(DOWNLOAD_SIGNATURE);
        push_i32(&mut buf, 20);
        push_str(&mut buf, "x");
        push_u32(&mut buf, 1);
        buf.extend([0u8; 20 + 24 + 16]); // hashes
        push_u32(&mut buf, 1); // one source
        push_i32(&mut buf, 99); // from the future
        let decode = decode_download(&buf, &DecodeLimits::default()).unwrap();
        let record = decode.outcome.record().expect("decoded");
        assert!(!record.valid);
        assert!(record.sources.is_empty());
        assert_eq!(
            decode.diagnostics,
            vec![Diagnostic::UnsupportedVersion {
                kind: "SharedSource",
                version: 99
            }]
        );
    }

    #[test]
    fn source_count_over_limit_is_fatal_before_looping() {
        let data = build_v30(b"", u32::MAX);
        let err = decode_download(&data, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitExceeded {
                field: "DownloadRecord.source_count",
                ..
            }
        ));
    }

    #[test]
    fn oversized_torrent_length_is_fatal() {
        let mut buf = Vec::new();
        buf.extend(DOWNLOAD_SIGNATURE);
        push_i32(&mut buf, 30);
        push_str(&mut buf, "x");
        push_str(&mut buf, "");
        push_u64(&mut buf, 1);
        buf.extend([0u8; 20 + 24 + 16 + 16]);
        push_u32(&mut buf, u32::MAX); // torrent length
        let err = decode_download(&buf, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::LimitExceeded { .. }));
    }

    #[test]
    fn truncated_record_is_underrun() {
        let mut data = build_v30(b"", 0);
        data.truncate(data.len() - 6);
        let err = decode_download(&data, &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::BufferUnderrun { .. }));
    }
}
