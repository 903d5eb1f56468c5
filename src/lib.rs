//! Multiplexes N independent logical byte streams into a single seekable file, applying
//! per-chunk block compression to each stream's data.
//!
//! This crate is the storage substrate for a larger archiver: callers write to and read from any
//! of N interleaved streams without concern for how the bytes are packed on disk. The file is
//! written out-of-order — headers are back-patched after each flush — and multiple streams share
//! one file with interleaved chunks linked by file offsets.
//!
//! The containing archiver that decides chunk boundaries and higher-level framing, a CLI, and
//! configuration loading are not this crate's concern. The block compressor is pluggable through
//! the [`BlockCodec`] trait; [`DeflateCodec`] is the default implementation.
//!
//! # Non-goals
//!
//! Concurrent access to the same stream set; random-access reads within a stream (reads are
//! sequential from the current position only); checksums or integrity verification beyond what a
//! codec performs internally; endian-neutrality beyond the little-endian wire format; streaming
//! (non-blocking) compression.

#![forbid(unused_must_use)]
#![warn(missing_docs)]

mod chunk;
mod codec;
mod gateway;
mod read_session;
mod wire;
mod write_session;

#[cfg(test)]
mod tests;

pub use chunk::{ChunkHeader, ChunkType, CHUNK_HEADER_LEN};
pub use codec::{BlockCodec, DeflateCodec};
pub use read_session::ReadSession;
pub use write_session::{WriteSession, MAX_BUFSIZE};
