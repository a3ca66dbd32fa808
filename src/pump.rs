//! Fixed-buffer image pump.
//!
//! Moves a firmware image between a file and the mtdram block device in
//! 64 KiB chunks. A short read or write is fatal: firmware transfers are
//! not resumable, so there is nothing sensible to retry.

use std::io::{Read, Write};

use crate::error::Result;

/// Chunk size of one read-then-write step.
pub const BUF_SIZE: usize = 64 * 1024;

/// Copy exactly `total` bytes from `src` to `dst`.
///
/// The pump never inspects the data; callers are responsible for
/// validating sizes before and after the transfer.
pub fn pump<R: Read, W: Write>(src: &mut R, dst: &mut W, total: u64) -> Result<()> {
    let mut buf = vec![0u8; BUF_SIZE];
    let mut remaining = total;
    while remaining > 0 {
        let chunk = remaining.min(BUF_SIZE as u64) as usize;
        src.read_exact(&mut buf[..chunk])?;
        dst.write_all(&buf[..chunk])?;
        remaining -= chunk as u64;
    }
    dst.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(n: usize) {
        let src: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let mut reader = Cursor::new(src.clone());
        let mut dst = Vec::new();
        pump(&mut reader, &mut dst, n as u64).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn copies_exact_byte_counts() {
        for n in [1, BUF_SIZE - 1, BUF_SIZE, BUF_SIZE + 1, 10 * BUF_SIZE] {
            roundtrip(n);
        }
    }

    #[test]
    fn zero_bytes_moves_nothing() {
        let mut reader = Cursor::new(vec![1u8, 2, 3]);
        let mut dst = Vec::new();
        pump(&mut reader, &mut dst, 0).unwrap();
        assert!(dst.is_empty());
    }

    #[test]
    fn short_source_is_fatal() {
        let mut reader = Cursor::new(vec![0u8; 10]);
        let mut dst = Vec::new();
        let err = pump(&mut reader, &mut dst, 11).unwrap_err();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn stops_at_requested_length() {
        let mut reader = Cursor::new(vec![7u8; BUF_SIZE * 2]);
        let mut dst = Vec::new();
        pump(&mut reader, &mut dst, 100).unwrap();
        assert_eq!(dst.len(), 100);
    }
}
