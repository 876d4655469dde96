//! Big-endian byte packing for the transaction codec.

use avaxp_types::ids::{ID_LEN, SHORT_ID_LEN};
use avaxp_types::{EvmAddress, Id, NodeId, ShortId};

use crate::TxError;

// ─── Packer ─────────────────────────────────────────────────────────────────

/// Growable output buffer.
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn pack_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn pack_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn pack_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Raw bytes with no length prefix.
    pub fn pack_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `u32` length followed by the bytes.
    pub fn pack_bytes(&mut self, bytes: &[u8]) {
        self.pack_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn pack_id(&mut self, id: &Id) {
        self.pack_fixed(id.as_bytes());
    }

    pub fn pack_short_id(&mut self, id: &ShortId) {
        self.pack_fixed(id.as_bytes());
    }

    /// `u32` count followed by each element.
    pub fn pack_vec<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.pack_u32(items.len() as u32);
        for item in items {
            f(self, item);
        }
    }
}

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Upper bound on any decoded element count; rejects absurd lengths before
/// allocating.
const MAX_ELEMENTS: usize = 1 << 16;

/// Read position over an input buffer.
pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], TxError> {
        if count > self.remaining() {
            return Err(TxError::Codec(format!(
                "unexpected end of data at offset {} (need {} bytes, have {})",
                self.offset,
                count,
                self.remaining()
            )));
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u16(&mut self) -> Result<u16, TxError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, TxError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, TxError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_len_prefixed(&mut self) -> Result<Vec<u8>, TxError> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_id(&mut self) -> Result<Id, TxError> {
        Ok(Id::new(self.read_array::<ID_LEN>()?))
    }

    pub fn read_short_id(&mut self) -> Result<ShortId, TxError> {
        Ok(ShortId::new(self.read_array::<SHORT_ID_LEN>()?))
    }

    pub fn read_node_id(&mut self) -> Result<NodeId, TxError> {
        Ok(NodeId::new(self.read_array::<SHORT_ID_LEN>()?))
    }

    pub fn read_evm_address(&mut self) -> Result<EvmAddress, TxError> {
        Ok(EvmAddress::new(self.read_array::<SHORT_ID_LEN>()?))
    }

    /// Read a `u32` type id and require it to equal `expected`.
    pub fn expect_type_id(&mut self, expected: u32, what: &str) -> Result<(), TxError> {
        let at = self.offset;
        let got = self.read_u32()?;
        if got != expected {
            return Err(TxError::Codec(format!(
                "expected {} type id {:#x} at offset {}, got {:#x}",
                what, expected, at, got
            )));
        }
        Ok(())
    }

    /// `u32` count followed by that many elements.
    pub fn read_vec<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T, TxError>,
    ) -> Result<Vec<T>, TxError> {
        let count = self.read_u32()? as usize;
        if count > MAX_ELEMENTS || count > self.remaining() {
            return Err(TxError::Codec(format!(
                "element count {} at offset {} exceeds the remaining data",
                count, self.offset
            )));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_integers() {
        let mut p = Packer::new();
        p.pack_u16(0x0102);
        p.pack_u32(0x03040506);
        p.pack_u64(7);
        let bytes = p.into_bytes();
        assert_eq!(hex::encode(&bytes), "0102030405060000000000000007");

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u16().unwrap(), 0x0102);
        assert_eq!(c.read_u32().unwrap(), 0x03040506);
        assert_eq!(c.read_u64().unwrap(), 7);
        assert!(c.is_empty());
    }

    #[test]
    fn test_len_prefixed_bytes() {
        let mut p = Packer::new();
        p.pack_bytes(b"memo");
        let bytes = p.into_bytes();
        assert_eq!(bytes, [0, 0, 0, 4, b'm', b'e', b'm', b'o']);
        assert_eq!(Cursor::new(&bytes).read_len_prefixed().unwrap(), b"memo");
    }

    #[test]
    fn test_truncated_read() {
        let mut c = Cursor::new(&[0, 0, 1]);
        assert!(matches!(c.read_u32(), Err(TxError::Codec(_))));
    }

    #[test]
    fn test_vec_count_exceeds_data() {
        let mut c = Cursor::new(&[0xff, 0xff, 0xff, 0xff]);
        assert!(c.read_vec(|c| c.read_u32()).is_err());
    }

    #[test]
    fn test_expect_type_id() {
        let mut c = Cursor::new(&[0, 0, 0, 7, 0, 0, 0, 5]);
        assert!(c.expect_type_id(7, "transfer output").is_ok());
        assert!(c.expect_type_id(7, "transfer output").is_err());
    }
}
