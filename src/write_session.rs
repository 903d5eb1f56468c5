//! The write-side session: `open_out`, `write_stream`, and `close_out` (§4.6).

use crate::chunk::{ChunkHeader, CHUNK_HEADER_LEN};
use crate::codec::{BlockCodec, DeflateCodec};
use crate::gateway;
use crate::wire;
use anyhow::{ensure, Result};
use sync_file::{ReadAt, WriteAt};
use tracing::{trace, trace_span};

/// The largest buffer size a write-session will ever allocate per stream (compression level 9).
pub const MAX_BUFSIZE: u32 = 900 * 1024;

const BUFSIZE_UNIT: u32 = 100 * 1024;

struct WriteStreamState {
    last_head: u64,
    buf: Vec<u8>,
}

/// A write-session bound to one file, multiplexing `num_streams` logical streams.
///
/// `WriteSession` owns the file for its lifetime and hands it back on [`WriteSession::close`].
/// There is no way to read from a stream set through a `WriteSession` — use [`crate::ReadSession`]
/// instead, which keeps "what is this session for" a property of the type rather than a runtime
/// flag (see the opaque-session-handle design note).
pub struct WriteSession<F> {
    file: F,
    codec: Box<dyn BlockCodec>,
    initial_pos: u64,
    cur_pos: u64,
    bufsize: u32,
    compression_level: u8,
    streams: Vec<WriteStreamState>,
}

impl<F: ReadAt + WriteAt> WriteSession<F> {
    /// Opens a new write-session at `initial_pos` in `file`, reserving placeholder headers for
    /// `num_streams` streams, using the default [`DeflateCodec`].
    pub fn create(file: F, initial_pos: u64, num_streams: u32, compression_level: u8) -> Result<Self> {
        Self::create_with_codec(
            file,
            initial_pos,
            num_streams,
            compression_level,
            Box::new(DeflateCodec),
        )
    }

    /// Like [`Self::create`], but with an injected [`BlockCodec`] implementation.
    pub fn create_with_codec(
        file: F,
        initial_pos: u64,
        num_streams: u32,
        compression_level: u8,
        codec: Box<dyn BlockCodec>,
    ) -> Result<Self> {
        let _span = trace_span!("WriteSession::create", num_streams, compression_level).entered();

        ensure!(
            compression_level <= 9,
            "compression_level must be in 0..=9, got {compression_level}"
        );

        let bufsize = if compression_level == 0 {
            BUFSIZE_UNIT
        } else {
            BUFSIZE_UNIT * compression_level as u32
        };
        debug_assert!(bufsize <= MAX_BUFSIZE);

        let mut cur_pos: u64 = 0;
        let mut streams = Vec::with_capacity(num_streams as usize);

        for _ in 0..num_streams {
            let last_head = cur_pos + 9;
            ChunkHeader::placeholder().write_at(&file, initial_pos + cur_pos)?;
            cur_pos += CHUNK_HEADER_LEN;

            let mut buf = Vec::new();
            buf.try_reserve_exact(bufsize as usize)
                .map_err(|_| anyhow::anyhow!("out of memory allocating a {bufsize}-byte stream buffer"))?;
            streams.push(WriteStreamState { last_head, buf });
        }

        trace!(initial_pos, bufsize, "write-session opened");

        Ok(WriteSession {
            file,
            codec,
            initial_pos,
            cur_pos,
            bufsize,
            compression_level,
            streams,
        })
    }

    /// The number of streams in this session.
    pub fn num_streams(&self) -> u32 {
        self.streams.len() as u32
    }

    /// Writes `src` to stream `stream`, flushing to disk as the per-stream buffer fills.
    ///
    /// This call either accepts all of `src` or fails; there is no short-write return.
    pub fn write_stream(&mut self, stream: u32, mut src: &[u8]) -> Result<()> {
        let idx = stream as usize;
        ensure!(idx < self.streams.len(), "stream index {stream} is out of range");

        let bufsize = self.bufsize as usize;
        while !src.is_empty() {
            let space = bufsize - self.streams[idx].buf.len();
            let take = space.min(src.len());
            self.streams[idx].buf.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.streams[idx].buf.len() == bufsize {
                self.flush_stream(stream)?;
            }
        }
        Ok(())
    }

    /// Flushes stream `stream`'s buffer to disk, back-patching the previous header's
    /// `next_head` field and writing a new chunk header plus (possibly compressed) payload.
    fn flush_stream(&mut self, stream: u32) -> Result<()> {
        let _span = trace_span!("WriteSession::flush_stream", stream).entered();
        let idx = stream as usize;

        let last_head = self.streams[idx].last_head;
        let cur_pos = self.cur_pos;

        // Step 1: back-patch the previous header's next_head to point at the upcoming header.
        ChunkHeader::patch_next_head(
            &self.file,
            self.initial_pos + last_head,
            u32::try_from(cur_pos).map_err(|_| anyhow::anyhow!("stream set exceeds 4 GiB"))?,
        )?;

        // Step 2: the next back-patch target is the next_head slot of the header we're about
        // to write, computed from the pre-append cur_pos.
        self.streams[idx].last_head = cur_pos + 9;

        // Steps 3-4: run the compression gateway over the buffered bytes.
        let buf = std::mem::take(&mut self.streams[idx].buf);
        let buflen = buf.len() as u32;
        let outcome = gateway::on_flush(buf, self.compression_level, self.codec.as_ref());

        trace!(
            buflen,
            c_type = ?outcome.c_type,
            c_len = outcome.c_len,
            "flushing chunk"
        );

        // Step 5: write the new header.
        let header = crate::chunk::ChunkHeader {
            c_type: outcome.c_type,
            c_len: outcome.c_len,
            u_len: buflen,
            next_head: 0,
        };
        header.write_at(&self.file, self.initial_pos + cur_pos)?;
        let mut new_cur_pos = cur_pos + CHUNK_HEADER_LEN;

        // Step 6: write the payload.
        wire::write_buf(&self.file, self.initial_pos + new_cur_pos, &outcome.payload)?;
        new_cur_pos += outcome.c_len as u64;

        ensure!(
            new_cur_pos <= u32::MAX as u64,
            "stream set exceeds 4 GiB starting at offset {}",
            self.initial_pos
        );
        self.cur_pos = new_cur_pos;

        // Step 7: reset the buffer for subsequent writes.
        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(self.bufsize as usize)
            .map_err(|_| anyhow::anyhow!("out of memory reallocating stream buffer"))?;
        debug_assert!(fresh.len() <= self.bufsize as usize);
        self.streams[idx].buf = fresh;

        Ok(())
    }

    /// Flushes every stream with pending data, then returns the underlying file to the caller.
    pub fn close(mut self) -> Result<F> {
        let _span = trace_span!("WriteSession::close").entered();
        for stream in 0..self.streams.len() as u32 {
            if !self.streams[stream as usize].buf.is_empty() {
                self.flush_stream(stream)?;
            }
        }
        Ok(self.file)
    }
}
