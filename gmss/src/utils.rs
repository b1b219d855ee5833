//! Big-endian, length-prefixed encoding helpers shared by the parameter,
//! public-key and private-key encodings.

use crate::error::{Error, GmssResult};

/// Appends fields to an encoding.
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a collection length. Lengths never exceed `u32::MAX` for
    /// encodable keys.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn put_len(&mut self, len: usize) {
        self.put_u32(len as u32);
    }

    /// Writes a length-prefixed byte string.
    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed array of length-prefixed byte strings.
    pub(crate) fn put_nodes(&mut self, nodes: &[Vec<u8>]) {
        self.put_len(nodes.len());
        for node in nodes {
            self.put_bytes(node);
        }
    }

    pub(crate) fn put_u32s(&mut self, values: &[u32]) {
        self.put_len(values.len());
        for &value in values {
            self.put_u32(value);
        }
    }

    /// Writes a length-prefixed array using `f` for each element.
    pub(crate) fn put_seq<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.put_len(items.len());
        for item in items {
            f(self, item);
        }
    }
}

/// Reads fields from an encoding, never reading past its end.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless every byte has been consumed.
    pub(crate) fn finish(&self) -> GmssResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    pub(crate) fn take(&mut self, len: usize) -> GmssResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub(crate) fn get_u8(&mut self) -> GmssResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn get_bool(&mut self) -> GmssResult<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::Malformed("boolean flag out of range")),
        }
    }

    pub(crate) fn get_u32(&mut self) -> GmssResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    pub(crate) fn get_u64(&mut self) -> GmssResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a collection length, rejecting counts that can't fit in the
    /// remaining input with at least `min_item_len` bytes per item.
    pub(crate) fn get_len(&mut self, min_item_len: usize) -> GmssResult<usize> {
        let len = self.get_u32()? as usize;
        if len.saturating_mul(min_item_len) > self.remaining() {
            return Err(Error::Truncated {
                needed: len.saturating_mul(min_item_len),
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    /// Reads a length-prefixed byte string.
    pub(crate) fn get_bytes(&mut self) -> GmssResult<Vec<u8>> {
        let len = self.get_len(1)?;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a length-prefixed byte string of exactly `expected` bytes.
    pub(crate) fn get_node(&mut self, expected: usize) -> GmssResult<Vec<u8>> {
        let node = self.get_bytes()?;
        if node.len() != expected {
            return Err(Error::Malformed("node has the wrong length"));
        }
        Ok(node)
    }

    /// Reads a length-prefixed array of byte strings of `node_len` bytes each.
    pub(crate) fn get_nodes(&mut self, node_len: usize) -> GmssResult<Vec<Vec<u8>>> {
        let count = self.get_len(4)?;
        (0..count).map(|_| self.get_node(node_len)).collect()
    }

    /// Like [`get_nodes`](Self::get_nodes), also accepting empty entries
    /// for nodes not computed yet.
    pub(crate) fn get_nodes_or_empty(&mut self, node_len: usize) -> GmssResult<Vec<Vec<u8>>> {
        let count = self.get_len(4)?;
        (0..count)
            .map(|_| {
                let node = self.get_bytes()?;
                if node.is_empty() || node.len() == node_len {
                    Ok(node)
                } else {
                    Err(Error::Malformed("node has the wrong length"))
                }
            })
            .collect()
    }

    pub(crate) fn get_u32s(&mut self) -> GmssResult<Vec<u32>> {
        let count = self.get_len(4)?;
        (0..count).map(|_| self.get_u32()).collect()
    }

    /// Reads a length-prefixed array using `f` for each element.
    pub(crate) fn get_seq<T>(
        &mut self,
        mut f: impl FnMut(&mut Self, usize) -> GmssResult<T>,
    ) -> GmssResult<Vec<T>> {
        let count = self.get_len(1)?;
        (0..count).map(|i| f(self, i)).collect()
    }
}

/// Fails with [`Error::Malformed`] unless `actual == expected`.
pub(crate) fn expect_len(actual: usize, expected: usize, what: &'static str) -> GmssResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Malformed(what))
    }
}
