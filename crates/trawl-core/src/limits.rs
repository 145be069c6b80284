use crate::error::DecodeError;

/// Caller-supplied safety bounds for attacker-influenced fields.
///
/// Forensic evidence is frequently adversarial: a count or blob-length field
/// can claim any value, so every loop driven by a count and every allocation
/// driven by a length is checked against these bounds before use. Exceeding a
/// bound is a hard [`DecodeError::LimitExceeded`], unlike version mismatches,
/// because it indicates corruption or an input crafted to exhaust memory.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Maximum accepted value of any count field driving a loop.
    pub max_count: u32,
    /// Maximum accepted length of any embedded blob, in bytes.
    pub max_blob: u32,
    /// Maximum recursion depth for folder trees and element trees.
    pub max_depth: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        // Sized from realistic maxima: the largest known library trees hold
        // well under a million entries, and embedded payloads (torrents,
        // thumbnails) stay far below 16 MiB.
        Self {
            max_count: 1 << 20,
            max_blob: 16 << 20,
            max_depth: 64,
        }
    }
}

impl DecodeLimits {
    /// Validate a count field before it drives a loop.
    pub fn check_count(&self, field: &'static str, count: u32) -> Result<usize, DecodeError> {
        if count > self.max_count {
            return Err(DecodeError::LimitExceeded {
                field,
                value: u64::from(count),
                max: u64::from(self.max_count),
            });
        }
        Ok(count as usize)
    }

    /// Validate a blob length before it drives an allocation.
    pub fn check_blob(&self, field: &'static str, len: u32) -> Result<usize, DecodeError> {
        if len > self.max_blob {
            return Err(DecodeError::LimitExceeded {
                field,
                value: u64::from(len),
                max: u64::from(self.max_blob),
            });
        }
        Ok(len as usize)
    }

    /// Validate a recursion depth before descending.
    pub fn check_depth(&self, field: &'static str, depth: u32) -> Result<(), DecodeError> {
        if depth > self.max_depth {
            return Err(DecodeError::LimitExceeded {
                field,
                value: u64::from(depth),
                max: u64::from(self.max_depth),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_at_bound_passes() {
        let limits = DecodeLimits {
            max_count: 8,
            ..DecodeLimits::default()
        };
        assert_eq!(limits.check_count("f", 8).unwrap(), 8);
    }

    #[test]
    fn count_over_bound_is_limit_exceeded() {
        let limits = DecodeLimits {
            max_count: 8,
            ..DecodeLimits::default()
        };
        let err = limits.check_count("LibraryFolder.child_count", 9).unwrap_err();
        assert!(matches!(err, DecodeError::LimitExceeded { value: 9, max: 8, .. }));
    }

    #[test]
    fn blob_over_bound_is_limit_exceeded() {
        let limits = DecodeLimits {
            max_blob: 1024,
            ..DecodeLimits::default()
        };
        assert!(limits.check_blob("DownloadRecord.torrent", 1025).is_err());
        assert_eq!(limits.check_blob("DownloadRecord.torrent", 1024).unwrap(), 1024);
    }
}
