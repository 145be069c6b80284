//! Search-history decoder.
//!
//! The history file holds a repeated sequence of managed-search records
//! (each wrapping a nested query descriptor), followed by a separately
//! serialized match list whose hits point back at a search through a shared
//! GUID string. The decoder performs no cross-record aggregation; callers
//! group hits per identifier afterwards with [`correlate_hits`].

use std::collections::HashMap;
use std::net::Ipv4Addr;

use trawl_core::diag::{Decode, Diagnostic, Outcome};
use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;
use trawl_core::types::{HashKind, Timestamp};
use trawl_format::{decode_element, stamp, ByteCursor, Ctx, ElementNode, Flow, VersionPlan};

pub const SEARCH_HISTORY_MIN_VERSION: i32 = 3;
pub const SEARCH_HISTORY_MAX_VERSION: i32 = 12;

/// The query a managed search was created from.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryDescriptor {
    pub guid: String,
    pub text: String,
    pub schema_uri: String,
    pub metadata: Option<ElementNode>,
    pub sha1: String,
    pub ed2k: String,
}

const QUERY_PLAN: VersionPlan<QueryDescriptor> = VersionPlan {
    kind: "QueryDescriptor",
    min_version: 1,
    max_version: 8,
    steps: &[
        (1, query_guid),
        (1, query_text),
        (2, query_metadata),
        (4, query_hash_sha1),
        (5, query_hash_ed2k),
    ],
};

fn query_guid(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    query: &mut QueryDescriptor,
) -> Result<Flow, DecodeError> {
    query.guid = cur.read_guid()?;
    Ok(Flow::Continue)
}

fn query_text(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    query: &mut QueryDescriptor,
) -> Result<Flow, DecodeError> {
    query.text = cur.read_string()?;
    Ok(Flow::Continue)
}

fn query_metadata(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    query: &mut QueryDescriptor,
) -> Result<Flow, DecodeError> {
    query.schema_uri = cur.read_string()?;
    if !query.schema_uri.is_empty() {
        query.metadata = Some(decode_element(cur, ctx.limits, ctx.depth + 1)?);
    }
    Ok(Flow::Continue)
}

fn query_hash_sha1(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    query: &mut QueryDescriptor,
) -> Result<Flow, DecodeError> {
    query.sha1 = cur.read_hash(HashKind::Sha1)?;
    Ok(Flow::Continue)
}

fn query_hash_ed2k(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    query: &mut QueryDescriptor,
) -> Result<Flow, DecodeError> {
    query.ed2k = cur.read_hash(HashKind::Ed2k)?;
    Ok(Flow::Continue)
}

/// One saved search tab, with its nested query descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ManagedSearch {
    pub active: bool,
    pub priority: i32,
    pub created: Timestamp,
    pub query: QueryDescriptor,
}

const SEARCH_PLAN: VersionPlan<ManagedSearch> = VersionPlan {
    kind: "ManagedSearch",
    min_version: 2,
    max_version: 9,
    steps: &[
        (2, search_active),
        (4, search_priority),
        (6, search_created),
        (2, search_query),
    ],
};

fn search_active(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    search: &mut ManagedSearch,
) -> Result<Flow, DecodeError> {
    search.active = cur.read_bool()?;
    Ok(Flow::Continue)
}

fn search_priority(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    search: &mut ManagedSearch,
) -> Result<Flow, DecodeError> {
    search.priority = cur.read_i32()?;
    Ok(Flow::Continue)
}

fn search_created(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    search: &mut ManagedSearch,
) -> Result<Flow, DecodeError> {
    search.created = stamp::unix32(cur.read_u32()?);
    Ok(Flow::Continue)
}

fn search_query(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    search: &mut ManagedSearch,
) -> Result<Flow, DecodeError> {
    let query = QUERY_PLAN.run_nested(cur, ctx)?;
    if !query.valid {
        return Ok(Flow::Halt);
    }
    search.query = query.value;
    Ok(Flow::Continue)
}

/// One result row from the match list. `search_guid` is the correlation
/// identifier pointing back at the search that produced the hit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryHit {
    pub search_guid: String,
    pub client_name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub size: u64,
    pub rating: u32,
    pub seen_at: Timestamp,
}

impl Default for QueryHit {
    fn default() -> Self {
        Self {
            search_guid: String::new(),
            client_name: String::new(),
            address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            size: 0,
            rating: 0,
            seen_at: Timestamp::absent(),
        }
    }
}

// Hits share the match list's version header.
const HIT_PLAN: VersionPlan<QueryHit> = VersionPlan {
    kind: "QueryHit",
    min_version: 1,
    max_version: 6,
    steps: &[
        (1, hit_search_guid),
        (1, hit_client),
        (1, hit_size),
        (3, hit_rating),
        (2, hit_seen_at),
    ],
};

fn hit_search_guid(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    hit: &mut QueryHit,
) -> Result<Flow, DecodeError> {
    hit.search_guid = cur.read_guid()?;
    Ok(Flow::Continue)
}

fn hit_client(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    hit: &mut QueryHit,
) -> Result<Flow, DecodeError> {
    hit.client_name = cur.read_string()?;
    hit.address = cur.read_ipv4()?;
    hit.port = cur.read_u16()?;
    Ok(Flow::Continue)
}

// Widened from 32 to 64 bits in match-list version 4.
fn hit_size(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    hit: &mut QueryHit,
) -> Result<Flow, DecodeError> {
    hit.size = if ctx.version >= 4 {
        cur.read_u64()?
    } else {
        u64::from(cur.read_u32()?)
    };
    Ok(Flow::Continue)
}

fn hit_rating(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    hit: &mut QueryHit,
) -> Result<Flow, DecodeError> {
    hit.rating = cur.read_u32()?;
    Ok(Flow::Continue)
}

fn hit_seen_at(
    cur: &mut ByteCursor<'_>,
    _ctx: &mut Ctx<'_>,
    hit: &mut QueryHit,
) -> Result<Flow, DecodeError> {
    hit.seen_at = stamp::unix32(cur.read_u32()?);
    Ok(Flow::Continue)
}

/// The separately serialized result list following the searches.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatchList {
    pub version: i32,
    pub valid: bool,
    pub hits: Vec<QueryHit>,
}

const MATCH_LIST_PLAN: VersionPlan<MatchList> = VersionPlan {
    kind: "MatchList",
    min_version: 1,
    max_version: 6,
    steps: &[(1, match_list_hits)],
};

fn match_list_hits(
    cur: &mut ByteCursor<'_>,
    ctx: &mut Ctx<'_>,
    list: &mut MatchList,
) -> Result<Flow, DecodeError> {
    let count = cur.read_count()?;
    let count = ctx.check_count("MatchList.hit_count", count)?;
    list.hits.reserve(count.min(64));
    for _ in 0..count {
        let hit = HIT_PLAN.run_fields(cur, ctx)?;
        if !hit.valid {
            return Ok(Flow::Halt);
        }
        list.hits.push(hit.value);
    }
    Ok(Flow::Continue)
}

/// The decoded search-history artifact.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchHistoryRecord {
    pub version: i32,
    pub valid: bool,
    pub searches: Vec<ManagedSearch>,
    pub matches: MatchList,
}

/// Decode a search-history file image.
pub fn decode_search_history(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<Decode<SearchHistoryRecord>, DecodeError> {
    let mut diagnostics = Vec::new();
    let mut cursor = ByteCursor::new(bytes);

    let version = cursor.read_i32()?;
    let mut record = SearchHistoryRecord {
        version,
        ..SearchHistoryRecord::default()
    };
    if !(SEARCH_HISTORY_MIN_VERSION..=SEARCH_HISTORY_MAX_VERSION).contains(&version) {
        diagnostics.push(Diagnostic::UnsupportedVersion {
            kind: "SearchHistoryRecord",
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

    let search_count = cursor.read_count()?;
    let search_count = ctx.check_count("SearchHistoryRecord.search_count", search_count)?;
    record.searches.reserve(search_count.min(64));
    let mut complete = true;
    for _ in 0..search_count {
        let search = SEARCH_PLAN.run_nested(&mut cursor, &mut ctx)?;
        if !search.valid {
            complete = false;
            break;
        }
        record.searches.push(search.value);
    }

    if complete {
        let matches = MATCH_LIST_PLAN.run_nested(&mut cursor, &mut ctx)?;
        complete = matches.valid;
        record.matches = matches.value;
        record.matches.version = matches.version;
        record.matches.valid = matches.valid;
    }

    record.valid = complete;
    Ok(Decode::new(Outcome::Decoded(record), diagnostics))
}

/// Per-search activity computed from decoded hits, grouped by the shared
/// GUID string. Output is ordered by identifier for determinism.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchActivity {
    pub search_guid: String,
    pub hit_count: usize,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
}

pub fn correlate_hits(hits: &[QueryHit]) -> Vec<SearchActivity> {
    let mut groups: HashMap<&str, SearchActivity> = HashMap::new();
    for hit in hits {
        let entry = groups
            .entry(hit.search_guid.as_str())
            .or_insert_with(|| SearchActivity {
                search_guid: hit.search_guid.clone(),
                hit_count: 0,
                first_seen: Timestamp::absent(),
                last_seen: Timestamp::absent(),
            });
        entry.hit_count += 1;
        if let Some(seen) = hit.seen_at.unix_seconds() {
            let earlier = entry
                .first_seen
                .unix_seconds()
                .is_none_or(|current| seen < current);
            if earlier {
                entry.first_seen = hit.seen_at;
            }
            let later = entry
                .last_seen
                .unix_seconds()
                .is_none_or(|current| seen > current);
            if later {
                entry.last_seen = hit.seen_at;
            }
        }
    }
    let mut out: Vec<SearchActivity> = groups.into_values().collect();
    out.sort_by(|a, b| a.search_guid.cmp(&b.search_guid));
    out
}
