//! Artifact decoders for the evidence files left behind by the target
//! file-sharing application: download-manager records, shared-library trees,
//! search history, and thumbnail caches, plus the flat metadata projection
//! consumed by the evidence store.
//!
//! Every decoder is a pure function of its input bytes. Fatal conditions
//! (truncation, exceeded safety limits) surface as errors; everything else —
//! unknown future versions, malformed embedded payloads — degrades softly so
//! one bad artifact never blocks the rest of a case.

pub mod download;
pub mod evidence;
pub mod library;
pub mod metadata;
pub mod search;
pub mod thumbnail;

pub use download::{decode_download, DownloadRecord, SharedSource};
pub use evidence::{sniff, ArtifactKind, EvidenceFile};
pub use library::{decode_library, LibraryFile, LibraryFolder, LibraryRecord};
pub use search::{
    correlate_hits, decode_search_history, ManagedSearch, MatchList, QueryDescriptor, QueryHit,
    SearchActivity, SearchHistoryRecord,
};
pub use thumbnail::{decode_thumbnail_cache, ThumbnailCacheRecord, ThumbnailEntry};
