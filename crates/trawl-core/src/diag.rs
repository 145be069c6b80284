use std::fmt;

/// Non-fatal decode events.
///
/// Decoders collect these into a `Vec<Diagnostic>` returned next to the
/// record; they never influence control flow beyond the field they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Diagnostic {
    /// The artifact's format version is outside the decoder's known range.
    /// The record is returned default-valued with `valid = false`.
    UnsupportedVersion { kind: &'static str, version: i32 },

    /// An embedded sub-format (bencode blob, element tree) failed to decode.
    /// The one affected field is left empty; the outer record stays valid.
    SubDecodeFailed {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { kind, version } => {
                write!(f, "unsupported version {version} for artifact kind {kind}")
            }
            Self::SubDecodeFailed {
                kind,
                field,
                reason,
            } => {
                write!(f, "sub-decode of {kind}.{field} failed, field left empty: {reason}")
            }
        }
    }
}

/// Outcome of a top-level artifact decode entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The leading signature or magic did not match; these bytes are not an
    /// instance of this artifact kind at all.
    WrongKind,
    /// The artifact is of this kind but its version is outside the supported
    /// range. The record holds type-appropriate defaults and `valid = false`;
    /// callers must skip the file rather than trust any field.
    Unsupported { version: i32, record: T },
    /// Fully decoded.
    Decoded(T),
}

impl<T> Outcome<T> {
    /// The decoded record, only when the artifact was fully usable.
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Decoded(record) => Some(record),
            Self::WrongKind | Self::Unsupported { .. } => None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }
}

/// A decode result plus the diagnostics accumulated during the pass.
///
/// Decode is a pure function of its input bytes: nothing is logged or
/// side-effected, so the soft events ride along here.
#[derive(Debug, Clone, PartialEq)]
pub struct Decode<T> {
    pub outcome: Outcome<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Decode<T> {
    pub fn new(outcome: Outcome<T>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            outcome,
            diagnostics,
        }
    }
}
