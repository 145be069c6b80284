//! Memory-mapped evidence file access and artifact-kind recognition.
//!
//! Decoding itself is pure over byte slices; this module is the one place
//! that touches the filesystem. Independent evidence files share no state,
//! so callers may process them in parallel at file granularity.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use trawl_core::error::Error;

use crate::download::DOWNLOAD_SIGNATURE;
use crate::thumbnail::THUMBNAIL_SIGNATURE;

/// The artifact kinds this crate can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ArtifactKind {
    Download,
    Library,
    SearchHistory,
    ThumbnailCache,
}

impl ArtifactKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Library => "library",
            Self::SearchHistory => "search_history",
            Self::ThumbnailCache => "thumbnail_cache",
        }
    }
}

/// Recognize an artifact kind from its leading signature.
///
/// Only the signature-carrying kinds can be sniffed from bytes alone;
/// library and search-history files open with a bare version gate, so they
/// are recognized by attempting a decode and checking the outcome.
pub fn sniff(bytes: &[u8]) -> Option<ArtifactKind> {
    if bytes.len() >= DOWNLOAD_SIGNATURE.len() && bytes.starts_with(DOWNLOAD_SIGNATURE) {
        return Some(ArtifactKind::Download);
    }
    if bytes.len() >= THUMBNAIL_SIGNATURE.len() && bytes.starts_with(THUMBNAIL_SIGNATURE) {
        return Some(ArtifactKind::ThumbnailCache);
    }
    None
}

/// One evidence file, memory-mapped for the duration of its decode.
#[derive(Debug)]
pub struct EvidenceFile {
    path: PathBuf,
    mmap: Mmap,
}

impl EvidenceFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_ref()
    }

    pub fn sniff(&self) -> Option<ArtifactKind> {
        sniff(self.bytes())
    }
}
