//! Core value types and error taxonomy for the trawl decoding engine.
//!
//! This crate defines the types shared by every artifact decoder: the error
//! and diagnostic taxonomy, decode safety limits, tri-state flags, normalized
//! timestamps, hash identifiers, and the flat metadata projection target.

pub mod diag;
pub mod error;
#[cfg(feature = "serde")]
pub mod export;
pub mod limits;
pub mod types;
