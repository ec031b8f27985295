//! Bounds-checked big-endian reader over an untrusted buffer

use bytes::Buf;
use veilnet_core::{LeaseSetError, Result};

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, buf: data }
    }

    /// Reader positioned at `offset`, or a truncation error
    pub(crate) fn at(buf: &'a [u8], offset: usize) -> Result<Self> {
        let mut reader = Self::new(buf);
        reader.skip(offset)?;
        Ok(reader)
    }

    /// Bytes consumed so far
    pub(crate) fn position(&self) -> usize {
        self.data.len() - self.buf.remaining()
    }

    /// Bytes consumed between `start` and the current position
    pub(crate) fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.position())..self.position()]
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(LeaseSetError::Truncated {
                needed: self.position() + n,
                available: self.data.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// `u16` length prefix followed by that many bytes
    pub(crate) fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }
}
