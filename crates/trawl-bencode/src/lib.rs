//! Bounded bencode decoder.
//!
//! Decodes the length-prefixed payloads embedded in download records into a
//! tagged scalar/list/dictionary tree. The decoder is deliberately strict
//! about structure (every container must be closed, integers must be
//! well-formed) but makes no attempt to interpret the data; promotion of
//! interesting keys happens in the metadata projection step of the caller.
//!
//! Failures here are caught at the call site and downgraded to a "field left
//! empty" diagnostic; a malformed embedded payload never invalidates the
//! record that carried it.

use std::fmt;

use thiserror::Error;

/// Nesting bound for hostile input; real torrent payloads stay in the single
/// digits.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("truncated bencode data at byte {0}")]
    Truncated(usize),

    #[error("unexpected byte 0x{byte:02x} at offset {at}")]
    UnexpectedByte { byte: u8, at: usize },

    #[error("malformed integer at offset {0}")]
    MalformedInteger(usize),

    #[error("string length overflow at offset {0}")]
    LengthOverflow(usize),

    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("trailing data after root value at offset {0}")]
    TrailingData(usize),
}

/// A decoded bencode value.
///
/// Dictionary entries keep their on-disk order; keys are raw byte strings
/// because the format does not promise UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BValue {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<BValue>),
    Dict(Vec<(Vec<u8>, BValue)>),
}

impl BValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte-string value as UTF-8 text, if it is one and decodes cleanly.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a dictionary key. First match wins, mirroring how the
    /// producing application reads its own payloads.
    pub fn get(&self, key: &str) -> Option<&BValue> {
        match self {
            Self::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_slice() == key.as_bytes())
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for BValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "{s:?}"),
                Err(_) => write!(f, "<{} bytes>", b.len()),
            },
            Self::List(items) => write!(f, "<list of {}>", items.len()),
            Self::Dict(entries) => write!(f, "<dict of {}>", entries.len()),
        }
    }
}

/// Decode a complete bencode document. Trailing bytes are an error: the
/// embedded blobs this decoder sees are exactly one value long.
pub fn decode(bytes: &[u8]) -> Result<BValue, BencodeError> {
    let mut parser = Parser { bytes, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != bytes.len() {
        return Err(BencodeError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::Truncated(self.pos))
    }

    fn bump(&mut self) -> Result<u8, BencodeError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn value(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::TooDeep);
        }
        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => Ok(BValue::Bytes(self.byte_string()?)),
            byte => Err(BencodeError::UnexpectedByte {
                byte,
                at: self.pos,
            }),
        }
    }

    fn integer(&mut self) -> Result<BValue, BencodeError> {
        let start = self.pos;
        self.bump()?; // 'i'
        let mut text = String::new();
        loop {
            match self.bump()? {
                b'e' => break,
                b @ (b'0'..=b'9' | b'-') => text.push(b as char),
                _ => return Err(BencodeError::MalformedInteger(start)),
            }
        }
        text.parse::<i64>()
            .map(BValue::Int)
            .map_err(|_| BencodeError::MalformedInteger(start))
    }

    fn byte_string(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.pos;
        let mut len: usize = 0;
        loop {
            match self.bump()? {
                b':' => break,
                b @ b'0'..=b'9' => {
                    len = len
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(usize::from(b - b'0')))
                        .ok_or(BencodeError::LengthOverflow(start))?;
                }
                byte => {
                    return Err(BencodeError::UnexpectedByte {
                        byte,
                        at: self.pos - 1,
                    })
                }
            }
        }
        let end = self
            .pos
            .checked_add(len)
            .ok_or(BencodeError::LengthOverflow(start))?;
        if end > self.bytes.len() {
            return Err(BencodeError::Truncated(self.pos));
        }
        let data = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    fn list(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        self.bump()?; // 'l'
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.bump()?; // 'e'
        Ok(BValue::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<BValue, BencodeError> {
        self.bump()?; // 'd'
        let mut entries = Vec::new();
        while self.peek()? != b'e' {
            let key = self.byte_string()?;
            let value = self.value(depth + 1)?;
            entries.push((key, value));
        }
        self.bump()?; // 'e'
        Ok(BValue::Dict(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode(b"i42e").unwrap(), BValue::Int(42));
        assert_eq!(decode(b"i-7e").unwrap(), BValue::Int(-7));
        assert_eq!(decode(b"4:spam").unwrap(), BValue::Bytes(b"spam".to_vec()));
        assert_eq!(decode(b"0:").unwrap(), BValue::Bytes(Vec::new()));
    }

    #[test]
    fn decodes_torrent_shaped_dict() {
        let value = decode(b"d6:lengthi1000e4:name5:a.txt12:piece lengthi512ee").unwrap();
        assert_eq!(value.get("length").and_then(BValue::as_int), Some(1000));
        assert_eq!(value.get("name").and_then(BValue::as_str), Some("a.txt"));
        assert_eq!(value.get("piece length").and_then(BValue::as_int), Some(512));
        assert!(value.get("comment").is_none());
    }

    #[test]
    fn decodes_nested_list() {
        let value = decode(b"ll4:spami1eee").unwrap();
        let outer = value.as_list().unwrap();
        let inner = outer[0].as_list().unwrap();
        assert_eq!(inner[0].as_str(), Some("spam"));
        assert_eq!(inner[1].as_int(), Some(1));
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(decode(b"i42").unwrap_err(), BencodeError::Truncated(3));
        assert_eq!(decode(b"4:spa").unwrap_err(), BencodeError::Truncated(2));
        assert!(matches!(decode(b"d4:spam"), Err(BencodeError::Truncated(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(decode(b"i1ei2e").unwrap_err(), BencodeError::TrailingData(3));
    }

    #[test]
    fn rejects_malformed_integers() {
        assert!(matches!(decode(b"ie"), Err(BencodeError::MalformedInteger(_))));
        assert!(matches!(decode(b"i1-2e"), Err(BencodeError::MalformedInteger(_))));
        assert!(matches!(decode(b"iabce"), Err(BencodeError::MalformedInteger(_))));
    }

    #[test]
    fn bounds_nesting_depth() {
        let mut evil = Vec::new();
        evil.extend(std::iter::repeat_n(b'l', 200));
        evil.extend(std::iter::repeat_n(b'e', 200));
        assert_eq!(decode(&evil).unwrap_err(), BencodeError::TooDeep);
    }

    #[test]
    fn non_utf8_keys_are_reachable_as_bytes() {
        let value = decode(b"d2:\xff\xfei1ee").unwrap();
        match &value {
            BValue::Dict(entries) => {
                assert_eq!(entries[0].0, vec![0xff, 0xfe]);
                assert_eq!(entries[0].1, BValue::Int(1));
            }
            _ => panic!("expected dict"),
        }
    }
}
