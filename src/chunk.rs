//! The 13-byte chunk header and its on-disk serialization.

use crate::wire;
use anyhow::{bail, Result};
use sync_file::{ReadAt, WriteAt};

/// Size in bytes of one chunk header.
pub const CHUNK_HEADER_LEN: u64 = 13;

/// The `c_type` discriminant for a chunk.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChunkType {
    /// The payload is stored as-is; `c_len == u_len`.
    Uncompressed,
    /// The payload was produced by the compression gateway's block codec.
    Compressed,
}

const C_TYPE_UNCOMPRESSED: u8 = 3;
const C_TYPE_COMPRESSED: u8 = 4;

impl ChunkType {
    fn to_wire(self) -> u8 {
        match self {
            ChunkType::Uncompressed => C_TYPE_UNCOMPRESSED,
            ChunkType::Compressed => C_TYPE_COMPRESSED,
        }
    }

    fn from_wire(value: u8) -> Result<Self> {
        match value {
            C_TYPE_UNCOMPRESSED => Ok(ChunkType::Uncompressed),
            C_TYPE_COMPRESSED => Ok(ChunkType::Compressed),
            other => bail!("invalid chunk header: c_type = {other} is neither 3 (uncompressed) nor 4 (compressed)"),
        }
    }
}

/// The 13-byte header that precedes every chunk's payload.
#[derive(Copy, Clone, Debug)]
pub struct ChunkHeader {
    pub c_type: ChunkType,
    /// Payload byte length on disk.
    pub c_len: u32,
    /// Payload byte length after decompression (equals `c_len` when `c_type` is uncompressed).
    pub u_len: u32,
    /// File offset (relative to `initial_pos`) of the next chunk header for this stream, or 0.
    pub next_head: u32,
}

impl ChunkHeader {
    /// The all-zero placeholder header reserved for each stream at session-open time.
    pub fn placeholder() -> Self {
        ChunkHeader {
            c_type: ChunkType::Uncompressed,
            c_len: 0,
            u_len: 0,
            next_head: 0,
        }
    }

    /// `true` if the 13 raw bytes at `at` are all zero, without attempting to parse them as a
    /// header. Used to detect the legacy sentinel before `c_type` validation would otherwise
    /// reject the all-zero byte 0 as neither 3 nor 4.
    pub fn peek_all_zero<F: ReadAt>(file: &F, at: u64) -> Result<bool> {
        let mut raw = [0u8; CHUNK_HEADER_LEN as usize];
        file.read_exact_at(&mut raw, at)?;
        Ok(raw.iter().all(|&b| b == 0))
    }

    /// Reads a chunk header at absolute file offset `at`.
    pub fn read_at<F: ReadAt>(file: &F, at: u64) -> Result<Self> {
        let c_type = ChunkType::from_wire(wire::read_u8(file, at)?)?;
        let c_len = wire::read_u32(file, at + 1)?;
        let u_len = wire::read_u32(file, at + 5)?;
        let next_head = wire::read_u32(file, at + 9)?;
        Ok(ChunkHeader {
            c_type,
            c_len,
            u_len,
            next_head,
        })
    }

    /// Writes this chunk header at absolute file offset `at`.
    pub fn write_at<F: WriteAt>(&self, file: &F, at: u64) -> Result<()> {
        wire::write_u8(file, at, self.c_type.to_wire())?;
        wire::write_u32(file, at + 1, self.c_len)?;
        wire::write_u32(file, at + 5, self.u_len)?;
        wire::write_u32(file, at + 9, self.next_head)?;
        Ok(())
    }

    /// Overwrites just the `next_head` field of an already-written header (the back-patch).
    pub fn patch_next_head<F: WriteAt>(file: &F, header_at: u64, next_head: u32) -> Result<()> {
        wire::write_u32(file, header_at + 9, next_head)
    }

    /// `true` if this is the legacy sentinel: an all-zero placeholder header.
    pub fn is_zero_sentinel(&self) -> bool {
        matches!(self.c_type, ChunkType::Uncompressed)
            && self.c_len == 0
            && self.u_len == 0
            && self.next_head == 0
    }

    /// Validates that a just-read initial placeholder header is well-formed.
    pub fn validate_placeholder(&self) -> Result<()> {
        if !matches!(self.c_type, ChunkType::Uncompressed) || self.c_len != 0 || self.u_len != 0 {
            bail!(
                "invalid initial header: expected (c_type=uncompressed, c_len=0, u_len=0), found \
                 (c_type={:?}, c_len={}, u_len={})",
                self.c_type,
                self.c_len,
                self.u_len
            );
        }
        Ok(())
    }
}
