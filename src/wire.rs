//! Fixed-width little-endian integer I/O against an absolute file offset.
//!
//! Every function here operates by explicit offset rather than an implicit file cursor: the
//! underlying file type only needs to implement positional reads/writes (`ReadAt`/`WriteAt`), so
//! there is no seek to forget and no cursor for two callers to race on. Short reads and short
//! writes are errors; there is no partial-success return from any function in this module.

use anyhow::Result;
use sync_file::{ReadAt, WriteAt};

/// Reads a single byte at `offset`.
pub(crate) fn read_u8<F: ReadAt>(file: &F, offset: u64) -> Result<u8> {
    let mut b = [0u8; 1];
    file.read_exact_at(&mut b, offset)?;
    Ok(b[0])
}

/// Writes a single byte at `offset`.
pub(crate) fn write_u8<F: WriteAt>(file: &F, offset: u64, value: u8) -> Result<()> {
    file.write_all_at(&[value], offset)?;
    Ok(())
}

/// Reads a little-endian `u16` at `offset`.
pub(crate) fn read_u16<F: ReadAt>(file: &F, offset: u64) -> Result<u16> {
    let mut b = [0u8; 2];
    file.read_exact_at(&mut b, offset)?;
    Ok(u16::from_le_bytes(b))
}

/// Writes a little-endian `u16` at `offset`.
pub(crate) fn write_u16<F: WriteAt>(file: &F, offset: u64, value: u16) -> Result<()> {
    file.write_all_at(&value.to_le_bytes(), offset)?;
    Ok(())
}

/// Reads a little-endian `u32` at `offset`, reassembled from two little-endian `u16` halves
/// (low half first), matching the on-disk layout of a plain little-endian `u32`.
pub(crate) fn read_u32<F: ReadAt>(file: &F, offset: u64) -> Result<u32> {
    let lo = read_u16(file, offset)?;
    let hi = read_u16(file, offset + 2)?;
    Ok((lo as u32) | ((hi as u32) << 16)
    )
}

/// Writes a little-endian `u32` at `offset` as two little-endian `u16` halves, low half first.
pub(crate) fn write_u32<F: WriteAt>(file: &F, offset: u64, value: u32) -> Result<()> {
    write_u16(file, offset, (value & 0xffff) as u16)?;
    write_u16(file, offset + 2, (value >> 16) as u16)?;
    Ok(())
}

/// Reads `buf.len()` bytes at `offset`. A short read is an error.
pub(crate) fn read_buf<F: ReadAt>(file: &F, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.read_exact_at(buf, offset)?;
    Ok(())
}

/// Writes all of `buf` at `offset`. A short write is an error.
pub(crate) fn write_buf<F: WriteAt>(file: &F, offset: u64, buf: &[u8]) -> Result<()> {
    file.write_all_at(buf, offset)?;
    Ok(())
}
