//! The compression gateway (§4.4): decides whether to compress a buffer at flush time, and
//! restores it on fill. Compression failure here is never escalated to a session error — it just
//! means the chunk is stored uncompressed.

use crate::codec::BlockCodec;
use crate::chunk::ChunkType;
use anyhow::{ensure, Result};

/// Outcome of running the gateway over a stream's write buffer at flush time.
pub struct FlushOutcome {
    pub c_type: ChunkType,
    pub c_len: u32,
    pub payload: Vec<u8>,
}

/// Runs the compression gateway over `buf` (a write-session stream's queued bytes) at flush
/// time. `buflen` is always `buf.len()`; it is threaded through explicitly to mirror the spec's
/// framing of the gateway as operating on `(buf, buflen)` rather than just a `Vec`.
pub fn on_flush(buf: Vec<u8>, compression_level: u8, codec: &dyn BlockCodec) -> FlushOutcome {
    let buflen = buf.len() as u32;

    if compression_level == 0 {
        return FlushOutcome {
            c_type: ChunkType::Uncompressed,
            c_len: buflen,
            payload: buf,
        };
    }

    // A destination of buflen - 1 bytes forces compression to be a strict win; any "no gain"
    // outcome naturally falls through to uncompressed storage.
    let cap = (buf.len() as usize).saturating_sub(1);

    match codec.compress(&buf, cap, compression_level) {
        Some(compressed) => {
            let c_len = compressed.len() as u32;
            FlushOutcome {
                c_type: ChunkType::Compressed,
                c_len,
                payload: compressed,
            }
        }
        None => FlushOutcome {
            c_type: ChunkType::Uncompressed,
            c_len: buflen,
            payload: buf,
        },
    }
}

/// Runs the decompression gateway over a chunk just read from disk at fill time.
///
/// `payload` holds exactly `c_len` bytes read from disk. Returns the stream's new `buf`
/// contents, which always has length `u_len`.
pub fn on_fill(
    c_type: ChunkType,
    u_len: u32,
    payload: Vec<u8>,
    codec: &dyn BlockCodec,
) -> Result<Vec<u8>> {
    match c_type {
        ChunkType::Uncompressed => {
            ensure!(
                payload.len() as u32 == u_len,
                "uncompressed chunk has c_len {} but declares u_len {}",
                payload.len(),
                u_len
            );
            Ok(payload)
        }
        ChunkType::Compressed => {
            let decompressed = codec
                .decompress(&payload, u_len as usize)
                .ok_or_else(|| anyhow::anyhow!("block codec failed to decompress chunk"))?;
            ensure!(
                decompressed.len() as u32 == u_len,
                "decompressed chunk length {} does not match declared u_len {}",
                decompressed.len(),
                u_len
            );
            Ok(decompressed)
        }
    }
}
