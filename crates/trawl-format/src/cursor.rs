use std::net::{Ipv4Addr, Ipv6Addr};

use trawl_core::error::DecodeError;
use trawl_core::types::HashKind;

/// Bounded random-access reader over a fixed byte source.
///
/// Every read advances the position by the bytes consumed and fails with
/// [`DecodeError::BufferUnderrun`] when fewer bytes remain than requested; a
/// truncated artifact cannot be partially trusted for the field being read,
/// so callers propagate that as a hard failure of the enclosing decode. The
/// underlying buffer is never mutated. All primitive integers are
/// little-endian.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Absolute seek. The one-past-the-end offset is valid, like any slice
    /// boundary.
    pub fn seek(&mut self, offset: usize) -> Result<(), DecodeError> {
        if offset > self.bytes.len() {
            return Err(DecodeError::InvalidSeek {
                offset,
                size: self.bytes.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Relative skip forward.
    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.take(count)?;
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < count {
            return Err(DecodeError::BufferUnderrun {
                at: self.pos,
                needed: count,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array::<8>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array::<4>()?))
    }

    /// Boolean flags are stored as 32-bit integers; anything non-zero is
    /// true.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u32()? != 0)
    }

    /// An unsigned 32-bit cardinality that drives a following loop. The
    /// cursor imposes no bound here; callers must validate the result
    /// against their configured [`trawl_core::limits::DecodeLimits`] before
    /// iterating.
    pub fn read_count(&mut self) -> Result<u32, DecodeError> {
        self.read_u32()
    }

    /// Exactly `count` raw bytes.
    pub fn read_blob(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        self.take(count)
    }

    /// A length-prefixed string in the serializer's native encoding: a
    /// one-byte length escalating to 16 then 32 bits at 0xff boundaries,
    /// with the 0xff 0xfe marker switching to UTF-16LE code units. Decoding
    /// is lossy; forensic images carry strings in whatever state the
    /// producing machine left them.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let (chars, wide) = self.read_string_length()?;
        if wide {
            // Saturation is safe: a saturated length always underruns below.
            let raw = self.take(chars.saturating_mul(2))?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        } else {
            let raw = self.take(chars)?;
            Ok(String::from_utf8_lossy(raw).into_owned())
        }
    }

    fn read_string_length(&mut self) -> Result<(usize, bool), DecodeError> {
        let first = self.read_u8()?;
        if first < 0xff {
            return Ok((usize::from(first), false));
        }
        let word = self.read_u16()?;
        if word == 0xfffe {
            // UTF-16 marker; the real length follows in the same escalating
            // encoding, counted in code units.
            let first = self.read_u8()?;
            if first < 0xff {
                return Ok((usize::from(first), true));
            }
            let word = self.read_u16()?;
            if word < 0xffff {
                return Ok((usize::from(word), true));
            }
            return Ok((self.read_u32()? as usize, true));
        }
        if word < 0xffff {
            return Ok((usize::from(word), false));
        }
        Ok((self.read_u32()? as usize, false))
    }

    /// A null-terminated byte string, decoded lossily.
    pub fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let rest = &self.bytes[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::BufferUnderrun {
                at: self.pos,
                needed: rest.len() + 1,
            })?;
        let text = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(text)
    }

    /// `count` raw bytes rendered as lowercase hex. An all-zero sequence
    /// decodes to the empty string, the sentinel for "hash not present"
    /// that callers use to short-circuit further decoding.
    pub fn read_hex(&mut self, count: usize) -> Result<String, DecodeError> {
        let raw = self.take(count)?;
        if raw.iter().all(|&b| b == 0) {
            return Ok(String::new());
        }
        Ok(hex::encode(raw))
    }

    /// Hash identifier of the given kind, with the all-zero sentinel rule of
    /// [`Self::read_hex`].
    pub fn read_hash(&mut self, kind: HashKind) -> Result<String, DecodeError> {
        self.read_hex(kind.len())
    }

    /// 16-byte GUID rendered in the Windows text convention: the first three
    /// groups are little-endian, the remaining eight bytes are in storage
    /// order. All-zero decodes to the empty string.
    pub fn read_guid(&mut self) -> Result<String, DecodeError> {
        let raw = self.take_array::<16>()?;
        if raw.iter().all(|&b| b == 0) {
            return Ok(String::new());
        }
        let d1 = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let d2 = u16::from_le_bytes([raw[4], raw[5]]);
        let d3 = u16::from_le_bytes([raw[6], raw[7]]);
        Ok(format!(
            "{d1:08x}-{d2:04x}-{d3:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            raw[8], raw[9], raw[10], raw[11], raw[12], raw[13], raw[14], raw[15]
        ))
    }

    /// Four bytes in network order.
    pub fn read_ipv4(&mut self) -> Result<Ipv4Addr, DecodeError> {
        Ok(Ipv4Addr::from(self.take_array::<4>()?))
    }

    /// Sixteen bytes in network order.
    pub fn read_ipv6(&mut self) -> Result<Ipv6Addr, DecodeError> {
        Ok(Ipv6Addr::from(self.take_array::<16>()?))
    }
}
