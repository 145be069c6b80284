//! Shared-library tree decoder.
//!
//! The library file serializes a forest of folders, each holding subfolders
//! and file records. There is no structural delimiter other than the counts
//! read along the way, so recursion order is strict: a node is complete only
//! once every descendant has been consumed from the stream.
//!
//! The share flag is a tri-state: `True`/`False` are authoritative, `Unknown`
//! inherits the nearest ancestor's resolved value, and a root with no answer
//! resolves to shared (the application's default).

use trawl_core::diag::{Decode, Diagnostic, Outcome};
use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;
use trawl_core::types::{HashKind, Timestamp, TriState};
use trawl_format::{decode_element, stamp, ByteCursor, Ctx, ElementNode, Flow, VersionPlan};

pub const LIBRARY_MIN_VERSION: i32 = 4;
pub const LIBRARY_MAX_VERSION: i32 = 29;

/// One file record inside a library folder.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LibraryFile {
    pub name: String,
    pub index: u32,
    pub size: u64,
    pub modified: Timestamp,
    /// On-disk flag, before inheritance.
    pub shared: TriState,
    /// Flag after resolving `Unknown` against the owning folder.
    pub shared_resolved: bool,
    pub sha1: String,
    pub tiger: String,
    pub md5: String,
    pub rating: u32,
    pub comments: String,
    /// Schema URI marking an embedded metadata element tree; empty means no
    /// tree follows in the stream.
    pub schema_uri: String,
    pub metadata: Option<ElementNode>,
}

/// A folder node: own scalars, then subfolder subtrees, then file records.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LibraryFolder {
    pub name: String,
    pub path: String,
    pub shared: TriState,
    pub shared_resolved: bool,
    pub expanded: bool,
    pub folders: Vec<LibraryFolder>,
    pub files: Vec<LibraryFile>,
}

/// The decoded library artifact.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LibraryRecord {
    pub version: i32,
    pub valid: bool,
    pub folders: Vec<LibraryFolder>,
}

// Library files share the artifact's version header, so only the step table
// runs for each record.
const FILE_PLAN: VersionPlan<LibraryFile> = VersionPlan {
    kind: "LibraryFile",
    min_version: LIBRARY_MIN_VERSION,
    max_version: LIBRARY_MAX_VERSION,
    steps: &[
        (4, file_name),
        (4, file_index),
        (4, file_size),
        (10, file_modified),
        (4, file_shared),
        (4, file_hash_sha1),
        (11, file_hash_tiger),
        (22, file_hash_md5),
        (13, file_rating),
        (8, file_metadata),
    ],
};

fn file_name(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.name = cur.read_string()?;
    Ok(Flow::Continue)
}

fn file_index(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.index = cur.read_u32()?;
    Ok(Flow::Continue)
}

// Widened from 32 to 64 bits in version 17.
fn file_size(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.size = if ctx.version >= 17 {
        cur.read_u64()?
    } else {
        u64::from(cur.read_u32()?)
    };
    Ok(Flow::Continue)
}

fn file_modified(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.modified = stamp::filetime(cur.read_u64()?);
    Ok(Flow::Continue)
}

fn file_shared(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.shared = TriState::from_raw(cur.read_i32()?);
    Ok(Flow::Continue)
}

fn file_hash_sha1(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.sha1 = cur.read_hash(HashKind::Sha1)?;
    Ok(Flow::Continue)
}

fn file_hash_tiger(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.tiger = cur.read_hash(HashKind::TigerTree)?;
    Ok(Flow::Continue)
}

fn file_hash_md5(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.md5 = cur.read_hash(HashKind::Md5)?;
    Ok(Flow::Continue)
}

fn file_rating(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.rating = cur.read_u32()?;
    file.comments = cur.read_string()?;
    Ok(Flow::Continue)
}

// Marker-gated element tree: an empty schema URI consumes zero further
// bytes; a non-empty one is followed by exactly one element node and its
// full subtree.
fn file_metadata(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    file: &mut LibraryFile,
) -> Result<Flow, DecodeError> {
    file.schema_uri = cur.read_string()?;
    if !file.schema_uri.is_empty() {
        file.metadata = Some(decode_element(cur, ctx.limits, ctx.depth + 1)?);
    }
    Ok(Flow::Continue)
}

fn decode_file(cur: &mut ByteCursor<'_>, ctx: &mut Ctx<'_>, folder_shared: bool) -> Result<Option<LibraryFile>, DecodeError> {
    let out = FILE_PLAN.run_fields(cur, ctx)?;
    if !out.valid {
        return Ok(None);
    }
    let mut file = out.value;
    file.shared_resolved = file.shared.resolve(Some(folder_shared));
    Ok(Some(file))
}

fn decode_folder(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    parent_shared: Option<bool>,
    depth: u32,
) -> Result<Option<LibraryFolder>, DecodeError> {
    ctx.limits.check_depth("LibraryFolder", depth)?;

    let mut folder = LibraryFolder {
        name: cur.read_string()?,
        path: cur.read_string()?,
        ..LibraryFolder::default()
    };
    folder.shared = TriState::from_raw(cur.read_i32()?);
    folder.shared_resolved = folder.shared.resolve(parent_shared);
    folder.expanded = cur.read_bool()?;

    // Children before self-completion: all subfolder subtrees are consumed
    // from the stream before this folder's own file list.
    let subfolder_count = cur.read_count()?;
    let subfolder_count = ctx.check_count("LibraryFolder.folder_count", subfolder_count)?;
    folder.folders.reserve(subfolder_count.min(64));
    for _ in 0..subfolder_count {
        match decode_folder(cur, ctx, Some(folder.shared_resolved), depth + 1)? {
            Some(child) => folder.folders.push(child),
            None => return Ok(None),
        }
    }

    let file_count = cur.read_count()?;
    let file_count = ctx.check_count("LibraryFolder.file_count", file_count)?;
    folder.files.reserve(file_count.min(64));
    for _ in 0..file_count {
        match decode_file(cur, ctx, folder.shared_resolved)? {
            Some(file) => folder.files.push(file),
            None => return Ok(None),
        }
    }

    Ok(Some(folder))
}

/// Decode a library file image.
pub fn decode_library(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<Decode<LibraryRecord>, DecodeError> {
    let mut diagnostics = Vec::new();
    let mut cursor = ByteCursor::new(bytes);

    let version = cursor.read_i32()?;
    let mut record = LibraryRecord {
        version,
        ..LibraryRecord::default()
    };
    if !(LIBRARY_MIN_VERSION..=LIBRARY_MAX_VERSION).contains(&version) {
        diagnostics.push(Diagnostic::UnsupportedVersion {
            kind: "LibraryRecord",
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
    let root_count = cursor.read_count()?;
    let root_count = ctx.check_count("LibraryRecord.folder_count", root_count)?;
    record.folders.reserve(root_count.min(64));
    let mut complete = true;
    for _ in 0..root_count {
        match decode_folder(&mut cursor, &mut ctx, None, 1)? {
            Some(folder) => record.folders.push(folder),
            None => {
                complete = false;
                break;
            }
        }
    }
    record.valid = complete;
    Ok(Decode::new(Outcome::Decoded(record), diagnostics))
}
