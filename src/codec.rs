//! The block compressor contract (§6). This crate treats the codec as an opaque collaborator:
//! the compression gateway (`gateway.rs`) only ever talks to it through the [`BlockCodec`] trait.

/// A block compressor/decompressor used by the compression gateway.
///
/// Implementations are expected to be pure and stateless with respect to a single call; the
/// gateway never assumes anything about internal buffering between calls.
pub trait BlockCodec {
    /// Compresses `src`, writing no more than `cap` bytes of encoded output.
    ///
    /// Returns `None` if the encoded form would not fit in `cap` bytes, or for any other
    /// encoder failure. A `None` return is never escalated to an error by the caller; it simply
    /// means the caller should store `src` uncompressed.
    fn compress(&self, src: &[u8], cap: usize, level: u8) -> Option<Vec<u8>>;

    /// Decompresses `src`, which is expected to expand to exactly `expected_len` bytes.
    ///
    /// Returns `None` on any decode error, including a length mismatch. Callers still
    /// independently re-check the returned buffer's length against `expected_len`.
    fn decompress(&self, src: &[u8], expected_len: usize) -> Option<Vec<u8>>;
}

/// The default [`BlockCodec`], backed by raw DEFLATE (no gzip/zlib framing).
///
/// Grounded on `ms-pdb-msfz::compress_utils`, which wraps the same `flate2` encoder/decoder pair
/// for the same purpose (compressing one chunk's payload at a time).
#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCodec;

impl BlockCodec for DeflateCodec {
    fn compress(&self, src: &[u8], cap: usize, level: u8) -> Option<Vec<u8>> {
        use std::io::Write;

        let mut dst = Vec::new();
        if dst.try_reserve_exact(cap).is_err() {
            return None;
        }

        let compression = flate2::Compression::new(level.min(9) as u32);
        let mut enc = flate2::write::DeflateEncoder::new(&mut dst, compression);
        enc.write_all(src).ok()?;
        enc.finish().ok()?;

        if dst.len() > cap {
            None
        } else {
            Some(dst)
        }
    }

    fn decompress(&self, src: &[u8], expected_len: usize) -> Option<Vec<u8>> {
        use std::io::Read;

        let mut dst = Vec::new();
        if dst.try_reserve_exact(expected_len).is_err() {
            return None;
        }
        dst.resize(expected_len, 0);

        let mut dec = flate2::read::DeflateDecoder::new(src);
        dec.read_exact(&mut dst).ok()?;

        Some(dst)
    }
}
