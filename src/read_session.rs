//! The read-side session: `open_in`, `read_stream`, and `close_in` (§4.6).

use crate::chunk::{ChunkHeader, CHUNK_HEADER_LEN};
use crate::codec::{BlockCodec, DeflateCodec};
use crate::gateway;
use crate::wire;
use anyhow::{ensure, Result};
use sync_file::ReadAt;
use tracing::{trace, trace_span};

struct ReadStreamState {
    /// Offset (relative to `initial_pos`) of the next chunk header to follow for this stream,
    /// or 0 if there is no next chunk. 0 is never a legitimate chunk offset: the lowest chunk
    /// offset any `next_head` can point to is just past all N placeholder headers, which starts
    /// at 13 (N >= 1). Treating 0 as "nothing to read" lets `fill` skip the read entirely instead
    /// of misreading another stream's placeholder header at absolute offset `initial_pos`.
    last_head: u64,
    buf: Vec<u8>,
    bufp: usize,
}

/// A read-session bound to one file, reading back the N streams written by a [`crate::WriteSession`].
pub struct ReadSession<F> {
    file: F,
    codec: Box<dyn BlockCodec>,
    initial_pos: u64,
    total_read: u64,
    streams: Vec<ReadStreamState>,
}

impl<F: ReadAt> ReadSession<F> {
    /// Opens a read-session at `initial_pos` in `file`, expecting `num_streams` streams, using
    /// the default [`DeflateCodec`].
    pub fn open(file: F, initial_pos: u64, num_streams: u32) -> Result<Self> {
        Self::open_with_codec(file, initial_pos, num_streams, Box::new(DeflateCodec))
    }

    /// Like [`Self::open`], but with an injected [`BlockCodec`] implementation. The codec must
    /// match whatever the writer used, or decompression will fail with a format-violation error.
    pub fn open_with_codec(
        file: F,
        mut initial_pos: u64,
        num_streams: u32,
        codec: Box<dyn BlockCodec>,
    ) -> Result<Self> {
        let _span = trace_span!("ReadSession::open", num_streams).entered();

        let mut total_read: u64 = 0;
        let mut streams = Vec::with_capacity(num_streams as usize);

        for i in 0..num_streams {
            let mut head_at = initial_pos + i as u64 * CHUNK_HEADER_LEN;

            if i == 0 && ChunkHeader::peek_all_zero(&file, head_at)? {
                // Legacy writer tolerance: a stray 13-byte sentinel before the real headers. The
                // raw bytes are checked before parsing, since c_type = 0 is not a valid
                // ChunkType and would otherwise fail validation before this check ever ran.
                trace!("legacy sentinel detected before stream 0's header; skipping it");
                initial_pos += CHUNK_HEADER_LEN;
                head_at = initial_pos;
            }

            let header = ChunkHeader::read_at(&file, head_at)?;
            header.validate_placeholder()?;
            total_read += CHUNK_HEADER_LEN;

            streams.push(ReadStreamState {
                last_head: header.next_head as u64,
                buf: Vec::new(),
                bufp: 0,
            });
        }

        trace!(initial_pos, total_read, "read-session opened");

        Ok(ReadSession {
            file,
            codec,
            initial_pos,
            total_read,
            streams,
        })
    }

    /// The number of streams in this session.
    pub fn num_streams(&self) -> u32 {
        self.streams.len() as u32
    }

    /// Reads up to `dst.len()` bytes from stream `stream`, returning the number of bytes copied.
    ///
    /// A return less than `dst.len()` means the stream is exhausted; this is the only way fewer
    /// bytes than requested are returned, and it is not an error.
    pub fn read_stream(&mut self, stream: u32, dst: &mut [u8]) -> Result<usize> {
        let idx = stream as usize;
        ensure!(idx < self.streams.len(), "stream index {stream} is out of range");

        let mut copied = 0;
        while copied < dst.len() {
            let avail = self.streams[idx].buf.len() - self.streams[idx].bufp;
            if avail == 0 {
                self.fill_stream(stream)?;
                if self.streams[idx].buf.is_empty() {
                    break;
                }
                continue;
            }

            let take = avail.min(dst.len() - copied);
            let bufp = self.streams[idx].bufp;
            dst[copied..copied + take].copy_from_slice(&self.streams[idx].buf[bufp..bufp + take]);
            self.streams[idx].bufp += take;
            copied += take;
        }

        Ok(copied)
    }

    /// Follows the next chunk for `stream`, if there is one, decompressing it into the stream's
    /// buffer. Leaves the buffer empty if the stream has no more chunks.
    fn fill_stream(&mut self, stream: u32) -> Result<()> {
        let _span = trace_span!("ReadSession::fill_stream", stream).entered();
        let idx = stream as usize;

        if self.streams[idx].last_head == 0 {
            self.streams[idx].buf = Vec::new();
            self.streams[idx].bufp = 0;
            return Ok(());
        }

        let head_at = self.initial_pos + self.streams[idx].last_head;
        let header = ChunkHeader::read_at(&self.file, head_at)?;
        self.total_read += CHUNK_HEADER_LEN;
        self.streams[idx].last_head = header.next_head as u64;

        if header.u_len == 0 {
            trace!("chunk has zero-length payload");
            self.streams[idx].buf = Vec::new();
            self.streams[idx].bufp = 0;
            return Ok(());
        }

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(header.c_len as usize)
            .map_err(|_| anyhow::anyhow!("out of memory allocating a {}-byte chunk payload", header.c_len))?;
        payload.resize(header.c_len as usize, 0);
        wire::read_buf(&self.file, head_at + CHUNK_HEADER_LEN, &mut payload)?;
        self.total_read += header.c_len as u64;

        trace!(c_len = header.c_len, u_len = header.u_len, c_type = ?header.c_type, "chunk read");

        let buf = gateway::on_fill(header.c_type, header.u_len, payload, self.codec.as_ref())?;
        self.streams[idx].buf = buf;
        self.streams[idx].bufp = 0;
        Ok(())
    }

    /// Splits this session back into the underlying file and the absolute offset just past the
    /// last byte consumed (`initial_pos + total_read`), for callers whose file type does not
    /// support [`std::io::Seek`].
    pub fn into_parts(self) -> (F, u64) {
        let resume_at = self.initial_pos + self.total_read;
        (self.file, resume_at)
    }

    /// Seeks the underlying file to just past the last byte consumed, then returns it.
    pub fn close(self) -> Result<F>
    where
        F: std::io::Seek,
    {
        let _span = trace_span!("ReadSession::close").entered();
        let (mut file, resume_at) = self.into_parts();
        file.seek(std::io::SeekFrom::Start(resume_at))?;
        Ok(file)
    }
}
