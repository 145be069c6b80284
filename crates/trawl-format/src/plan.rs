use trawl_core::diag::Diagnostic;
use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;

use crate::cursor::ByteCursor;

/// Per-step control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A nested record soft-failed (unsupported version); the stream beyond
    /// this point can no longer be trusted, so the plan stops and returns the
    /// partially filled value with `valid = false`.
    Halt,
}

/// Shared state handed to every decode step.
pub struct Ctx<'a> {
    /// The format version read at the start of the enclosing record.
    pub version: i32,
    pub limits: &'a DecodeLimits,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    /// Recursion depth of the enclosing record, for tree-shaped containers.
    pub depth: u32,
}

impl Ctx<'_> {
    /// Validate a just-read count against the configured bound. Must be
    /// called before the count drives any loop iteration.
    pub fn check_count(&self, field: &'static str, count: u32) -> Result<usize, DecodeError> {
        self.limits.check_count(field, count)
    }

    pub fn check_blob(&self, field: &'static str, len: u32) -> Result<usize, DecodeError> {
        self.limits.check_blob(field, len)
    }

    pub fn sub_decode_failed(&mut self, kind: &'static str, field: &'static str, reason: String) {
        self.diagnostics.push(Diagnostic::SubDecodeFailed {
            kind,
            field,
            reason,
        });
    }
}

/// One version-gated decode step. Steps run in table order for every version
/// at or above their threshold; a step may also switch field widths on
/// `ctx.version` rather than gate presence.
pub type Step<T> = fn(&mut ByteCursor<'_>, &mut Ctx<'_>, &mut T) -> Result<Flow, DecodeError>;

/// A record decoded through a [`VersionPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: i32,
    pub value: T,
    /// False when the version was outside the plan's range or a nested
    /// record halted the decode. An invalid record holds defaults for every
    /// field its steps never reached; no field is ever undefined.
    pub valid: bool,
}

/// The decode protocol shared by every artifact kind: read an `i32` format
/// version, soft-fail outside `[min_version, max_version]`, then apply an
/// explicit ordered table of `(min_version, step)` pairs.
///
/// An out-of-range version is not an error. Forensic callers must keep
/// processing the rest of an evidence file after meeting one artifact written
/// by a future application version, so the plan emits a diagnostic and
/// returns a default-valued record instead.
pub struct VersionPlan<T: 'static> {
    /// Artifact kind name used in diagnostics.
    pub kind: &'static str,
    pub min_version: i32,
    pub max_version: i32,
    pub steps: &'static [(i32, Step<T>)],
}

impl<T: Default> VersionPlan<T> {
    /// Run the plan at the top of an artifact.
    pub fn run(
        &self,
        cursor: &mut ByteCursor<'_>,
        limits: &DecodeLimits,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Versioned<T>, DecodeError> {
        self.run_at_depth(cursor, limits, diagnostics, 0)
    }

    /// Run the plan for a record nested inside another record's step,
    /// inheriting the enclosing limits and diagnostics channel.
    pub fn run_nested(
        &self,
        cursor: &mut ByteCursor<'_>,
        ctx: &mut Ctx<'_>,
    ) -> Result<Versioned<T>, DecodeError> {
        self.run_at_depth(cursor, ctx.limits, ctx.diagnostics, ctx.depth + 1)
    }

    /// Run only the step table, against a version that was already read by
    /// the enclosing artifact. Container members (library files, query hits)
    /// share their artifact's version header instead of carrying their own.
    pub fn run_fields(
        &self,
        cursor: &mut ByteCursor<'_>,
        ctx: &mut Ctx<'_>,
    ) -> Result<Versioned<T>, DecodeError> {
        let mut value = T::default();
        for (min_version, step) in self.steps {
            if ctx.version >= *min_version {
                match step(cursor, ctx, &mut value)? {
                    Flow::Continue => {}
                    Flow::Halt => {
                        return Ok(Versioned {
                            version: ctx.version,
                            value,
                            valid: false,
                        })
                    }
                }
            }
        }
        Ok(Versioned {
            version: ctx.version,
            value,
            valid: true,
        })
    }

    fn run_at_depth(
        &self,
        cursor: &mut ByteCursor<'_>,
        limits: &DecodeLimits,
        diagnostics: &mut Vec<Diagnostic>,
        depth: u32,
    ) -> Result<Versioned<T>, DecodeError> {
        limits.check_depth(self.kind, depth)?;
        let version = cursor.read_i32()?;
        if version < self.min_version || version > self.max_version {
            diagnostics.push(Diagnostic::UnsupportedVersion {
                kind: self.kind,
                version,
            });
            return Ok(Versioned {
                version,
                value: T::default(),
                valid: false,
            });
        }

        let mut value = T::default();
        let mut ctx = Ctx {
            version,
            limits,
            diagnostics,
            depth,
        };
        for (min_version, step) in self.steps {
            if version >= *min_version {
                match step(cursor, &mut ctx, &mut value)? {
                    Flow::Continue => {}
                    Flow::Halt => {
                        return Ok(Versioned {
                            version,
                            value,
                            valid: false,
                        })
                    }
                }
            }
        }
        Ok(Versioned {
            version,
            value,
            valid: true,
        })
    }
}
