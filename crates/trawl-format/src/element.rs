use trawl_core::error::DecodeError;
use trawl_core::limits::DecodeLimits;

use crate::cursor::ByteCursor;

/// One node of the embedded attribute/element tree.
///
/// Several artifact kinds carry a schema-URI marker string; when it is
/// non-empty, exactly one of these nodes (with its full recursive subtree)
/// follows in the stream. The shape resembles markup but the serialization
/// is binary, using the same primitives as every other artifact: name,
/// value, an attribute count with that many name/value string pairs, then a
/// child count with that many recursively serialized children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElementNode {
    pub name: String,
    pub value: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    /// The value of one of this node's own attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given element name.
    pub fn child(&self, name: &str) -> Option<&ElementNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Decode exactly one element node and its subtree from the cursor.
pub fn decode_element(
    cursor: &mut ByteCursor<'_>,
    limits: &DecodeLimits,
    depth: u32,
) -> Result<ElementNode, DecodeError> {
    limits.check_depth("ElementNode", depth)?;

    let name = cursor.read_string()?;
    let value = cursor.read_string()?;

    let attribute_count = cursor.read_count()?;
    let attribute_count = limits.check_count("ElementNode.attribute_count", attribute_count)?;
    let mut attributes = Vec::with_capacity(attribute_count.min(64));
    for _ in 0..attribute_count {
        let attr_name = cursor.read_string()?;
        let attr_value = cursor.read_string()?;
        attributes.push((attr_name, attr_value));
    }

    let child_count = cursor.read_count()?;
    let child_count = limits.check_count("ElementNode.child_count", child_count)?;
    let mut children = Vec::with_capacity(child_count.min(64));
    for _ in 0..child_count {
        children.push(decode_element(cursor, limits, depth + 1)?);
    }

    Ok(ElementNode {
        name,
        value,
        attributes,
        children,
    })
}
