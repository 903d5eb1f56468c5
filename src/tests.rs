//! In-memory `ReadAt + WriteAt` test double, grounded on `ms-pdb-msf::tests::TestFile`, plus
//! the testable properties from the crate's design: round-tripping, idempotent close, the
//! exact-bufsize boundary, small-payload compression fallback, legacy sentinel tolerance, and the
//! header back-patch invariant.

use crate::{ChunkHeader, ReadSession, WriteSession};
use std::sync::Mutex;
use sync_file::{ReadAt, WriteAt};

#[derive(Default)]
pub(crate) struct MemFile {
    data: Mutex<Vec<u8>>,
}

impl ReadAt for MemFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        let lock = self.data.lock().unwrap();
        lock.read_exact_at(buf, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        let lock = self.data.lock().unwrap();
        lock.read_at(buf, offset)
    }
}

impl WriteAt for MemFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> std::io::Result<usize> {
        self.write_all_at(buf, offset)?;
        Ok(buf.len())
    }

    fn write_all_at(&self, buf: &[u8], offset: u64) -> std::io::Result<()> {
        let mut lock = self.data.lock().unwrap();
        let vec: &mut Vec<u8> = &mut lock;
        let offset = offset as usize;

        if offset == vec.len() {
            vec.extend_from_slice(buf);
        } else {
            let new_len = offset + buf.len();
            if new_len > vec.len() {
                vec.resize(new_len, 0);
            }
            vec[offset..offset + buf.len()].copy_from_slice(buf);
        }
        Ok(())
    }
}

impl MemFile {
    fn into_inner(self) -> Vec<u8> {
        self.data.into_inner().unwrap()
    }
}

#[test]
fn scenario_1_two_streams_no_compression() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 2, 0).unwrap();
    w.write_stream(0, b"AAA").unwrap();
    w.write_stream(1, b"BB").unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 2).unwrap();
    let mut buf0 = [0u8; 3];
    assert_eq!(r.read_stream(0, &mut buf0).unwrap(), 3);
    assert_eq!(&buf0, b"AAA");

    let mut buf1 = [0u8; 2];
    assert_eq!(r.read_stream(1, &mut buf1).unwrap(), 2);
    assert_eq!(&buf1, b"BB");
}

#[test]
fn scenario_2_multi_flush_single_stream_compressed() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 1, 1).unwrap();
    let payload = vec![0xABu8; 200 * 1024];
    w.write_stream(0, &payload).unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 1).unwrap();
    let mut back = vec![0u8; 200 * 1024];
    let n = r.read_stream(0, &mut back).unwrap();
    assert_eq!(n, back.len());
    assert!(back.iter().all(|&b| b == 0xAB));
}

#[test]
fn scenario_3_interleaved_flush_order_preserved_per_stream() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 3, 5).unwrap();

    // Force stream 1 to flush first, then stream 2, then stream 0, by writing exactly
    // bufsize bytes to each in that order.
    let bufsize = 100 * 1024 * 5;
    w.write_stream(1, &vec![1u8; bufsize]).unwrap();
    w.write_stream(2, &vec![2u8; bufsize]).unwrap();
    w.write_stream(0, &vec![0u8; bufsize]).unwrap();

    // Give each stream some unflushed tail data too, to exercise close()'s final flush.
    w.write_stream(1, b"tail1").unwrap();
    w.write_stream(2, b"tail2").unwrap();
    w.write_stream(0, b"tail0").unwrap();

    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 3).unwrap();
    for (stream, marker, tail) in [(0u32, 0u8, b"tail0"), (1, 1u8, b"tail1"), (2, 2u8, b"tail2")] {
        let mut back = vec![0u8; bufsize + tail.len()];
        let n = r.read_stream(stream, &mut back).unwrap();
        assert_eq!(n, back.len());
        assert!(back[..bufsize].iter().all(|&b| b == marker));
        assert_eq!(&back[bufsize..], tail);
    }
}

#[test]
fn scenario_4_empty_stream_reads_zero_bytes() {
    let file = MemFile::default();
    let w = WriteSession::create(file, 0, 1, 0).unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 1).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(r.read_stream(0, &mut buf).unwrap(), 0);
}

#[test]
fn scenario_5_legacy_sentinel_is_tolerated() {
    let file = MemFile::default();
    // Thirteen zero bytes of sentinel, then a valid N=1 stream set immediately after.
    file.write_all_at(&[0u8; 13], 0).unwrap();
    let w = WriteSession::create(file, 13, 1, 0).unwrap();
    let mut w = w;
    w.write_stream(0, b"hello").unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 1).unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(r.read_stream(0, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
}

#[test]
fn exact_bufsize_write_triggers_single_flush_and_no_extra_chunk_on_close() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 1, 0).unwrap();
    let bufsize = 100 * 1024;
    w.write_stream(0, &vec![7u8; bufsize]).unwrap();
    // Buffer should be exactly empty now (flushed), so close() should not emit another chunk.
    let before_close = {
        // We cannot directly peek the private buffer, so instead verify indirectly: closing
        // twice worth of state would double the byte count if an extra chunk were emitted.
        let file = w.close().unwrap();
        file.into_inner().len()
    };

    let file2 = MemFile::default();
    let mut w2 = WriteSession::create(file2, 0, 1, 0).unwrap();
    w2.write_stream(0, &vec![7u8; bufsize]).unwrap();
    w2.write_stream(0, &[]).unwrap(); // no-op, must not add a chunk
    let file2 = w2.close().unwrap();
    assert_eq!(before_close, file2.into_inner().len());
}

#[test]
fn small_incompressible_payload_falls_back_to_uncompressed_chunk() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 1, 9).unwrap();
    // A handful of high-entropy bytes can never beat "buflen - 1" capacity.
    let payload: Vec<u8> = (0..32u32).map(|x| (x.wrapping_mul(2654435761) >> 24) as u8).collect();
    w.write_stream(0, &payload).unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 1).unwrap();
    let mut back = vec![0u8; payload.len()];
    assert_eq!(r.read_stream(0, &mut back).unwrap(), payload.len());
    assert_eq!(back, payload);
}

#[test]
fn idempotent_close_then_reopen_sees_empty_streams() {
    let file = MemFile::default();
    let w = WriteSession::create(file, 0, 2, 0).unwrap();
    let file = w.close().unwrap();

    let mut r = ReadSession::open(file, 0, 2).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(r.read_stream(0, &mut buf).unwrap(), 0);
    assert_eq!(r.read_stream(1, &mut buf).unwrap(), 0);
}

#[test]
fn header_back_patch_chain_terminates_at_zero() {
    let file = MemFile::default();
    let mut w = WriteSession::create(file, 0, 1, 0).unwrap();
    w.write_stream(0, &vec![9u8; 100 * 1024]).unwrap(); // one flush
    w.write_stream(0, b"last").unwrap();
    let file = w.close().unwrap(); // second flush, from close()

    // Walk the chain by hand, starting at the placeholder for stream 0.
    let mut at = 0u64;
    let mut visited = 0;
    loop {
        let header = ChunkHeader::read_at(&file, at).unwrap();
        if at != 0 {
            visited += 1;
        }
        if header.next_head == 0 {
            break;
        }
        at = header.next_head as u64;
    }
    assert_eq!(visited, 2);
}

#[test]
fn round_trip_across_levels_and_stream_counts() {
    for &n in &[1u32, 2, 8] {
        for &level in &[0u8, 1, 5, 9] {
            let file = MemFile::default();
            let mut w = WriteSession::create(file, 0, n, level).unwrap();

            let plans: Vec<Vec<u8>> = (0..n)
                .map(|i| (0..(i as usize + 1) * 777).map(|b| (b % 251) as u8).collect())
                .collect();

            for (i, plan) in plans.iter().enumerate() {
                // Write in two pieces to exercise the buffering path, not just one shot.
                let half = plan.len() / 2;
                w.write_stream(i as u32, &plan[..half]).unwrap();
                w.write_stream(i as u32, &plan[half..]).unwrap();
            }

            let file = w.close().unwrap();
            let mut r = ReadSession::open(file, 0, n).unwrap();

            for (i, plan) in plans.iter().enumerate() {
                let mut back = vec![0u8; plan.len()];
                let got = r.read_stream(i as u32, &mut back).unwrap();
                assert_eq!(got, plan.len(), "stream {i} at N={n} level={level}");
                assert_eq!(&back, plan, "stream {i} at N={n} level={level}");
            }
        }
    }
}
