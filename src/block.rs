//! Low-level reading and writing of GIF blocks
//!
//! A single block is `[len][len bytes]` with no terminator. A sub-block chain is
//! a sequence of such blocks ended by a zero-length block.

use crate::error::*;

pub(crate) const EXTENSION_INTRODUCER: u8 = 0x21;
pub(crate) const IMAGE_SEPARATOR: u8 = 0x2C;
pub(crate) const TRAILER: u8 = 0x3B;

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn take_byte(&mut self) -> CatResult<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(unexpected_eof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    pub fn take_u16_le(&mut self) -> CatResult<u16> {
        Ok(u16::from_le_bytes(self.take_arr()?))
    }

    pub fn take_arr<const N: usize>(&mut self) -> CatResult<[u8; N]> {
        let mut arr = [0; N];
        arr.copy_from_slice(self.take_slice(N)?);
        Ok(arr)
    }

    pub fn take_slice(&mut self, len: usize) -> CatResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len()).ok_or_else(unexpected_eof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// One length-prefixed block, without a terminator
    pub fn take_block(&mut self) -> CatResult<&'a [u8]> {
        let len = self.take_byte()?;
        self.take_slice(len.into())
    }

    /// Concatenated payload of a zero-terminated sub-block chain
    pub fn take_sub_blocks(&mut self) -> CatResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let block = self.take_block()?;
            if block.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(block);
        }
    }
}

#[cold]
fn unexpected_eof() -> Error {
    Error::format("unexpected end of data")
}

#[inline]
pub(crate) fn write_u16_le(out: &mut Vec<u8>, val: u16) {
    out.extend_from_slice(&val.to_le_bytes());
}

pub(crate) fn write_block(out: &mut Vec<u8>, data: &[u8]) -> CatResult<()> {
    let len = u8::try_from(data.len()).map_err(|_| Error::range("block longer than 255 bytes"))?;
    out.push(len);
    out.extend_from_slice(data);
    Ok(())
}

/// Splits data into 255-byte sub-blocks and adds the terminator
pub(crate) fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
    out.reserve(data.len() + data.len() / 255 + 2);
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
}

#[test]
fn sub_block_chain() {
    let data: Vec<u8> = (0..600).map(|n| n as u8).collect();
    let mut out = Vec::new();
    write_sub_blocks(&mut out, &data);
    assert_eq!(out[0], 255);
    assert_eq!(out[256], 255);
    assert_eq!(out[512], 90);
    assert_eq!(*out.last().unwrap(), 0);

    let mut r = ByteReader::new(&out);
    assert_eq!(r.take_sub_blocks().unwrap(), data);
    assert!(r.take_byte().is_err());
}

#[test]
fn empty_chain() {
    let mut out = Vec::new();
    write_sub_blocks(&mut out, &[]);
    assert_eq!(out, [0]);
    assert!(ByteReader::new(&out).take_sub_blocks().unwrap().is_empty());
}

#[test]
fn truncated_block() {
    let mut r = ByteReader::new(&[5, 1, 2]);
    assert!(r.take_block().unwrap_err().is_format_error());
}
