//! The versioned binary decoding engine: byte cursor, version-gated field
//! decoding protocol, timestamp normalization, and the embedded element-tree
//! sub-format.

mod cursor;
mod element;
mod plan;
pub mod stamp;

pub use cursor::ByteCursor;
pub use element::{decode_element, ElementNode};
pub use plan::{Ctx, Flow, Step, VersionPlan, Versioned};
