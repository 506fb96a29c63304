// ABOUTME: Per-stream receive buffer: a growable byte queue with an explicit read cursor
// ABOUTME: Single producer (the session engine) and single consumer (the embedder)

use std::collections::TryReserveError;

/// A contiguous byte region with three cursors: capacity, end of data,
/// and a read position. `write` appends (growing as needed), `read`
/// copies from the read position forward, `compact` reclaims the
/// consumed prefix. The invariant `pos <= used <= capacity` holds at
/// every step.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ReceiveBuffer {
    pub fn new() -> ReceiveBuffer {
        ReceiveBuffer::default()
    }

    /// Unread bytes currently buffered.
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `src` to the buffer, growing it as needed. Reports the
    /// allocator's refusal instead of aborting so the session can fail
    /// the one stream rather than the process.
    pub fn write(&mut self, src: &[u8]) -> Result<(), TryReserveError> {
        // Reclaim the consumed prefix before growing past it.
        if self.pos > 0 && self.pos * 2 >= self.data.len() {
            self.compact();
        }
        self.data.try_reserve(src.len())?;
        self.data.extend_from_slice(src);
        Ok(())
    }

    /// Copy up to `dst.len()` unread bytes into `dst`, advancing the
    /// read cursor. Returns the number of bytes copied.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.len().min(dst.len());
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if self.pos == self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
        n
    }

    /// Move the unread region `[pos..used)` to the start of the buffer
    /// and reset the read cursor.
    pub fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        let remaining = self.len();
        self.data.copy_within(self.pos.., 0);
        self.data.truncate(remaining);
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let mut buf = ReceiveBuffer::new();
        buf.write(b"hello world").unwrap();
        assert_eq!(buf.len(), 11);

        let mut dst = [0u8; 5];
        assert_eq!(buf.read(&mut dst), 5);
        assert_eq!(&dst, b"hello");
        assert_eq!(buf.len(), 6);

        let mut dst = [0u8; 16];
        assert_eq!(buf.read(&mut dst), 6);
        assert_eq!(&dst[..6], b" world");
        assert!(buf.is_empty());
    }

    #[test]
    fn read_from_empty_returns_zero() {
        let mut buf = ReceiveBuffer::new();
        let mut dst = [0u8; 4];
        assert_eq!(buf.read(&mut dst), 0);
    }

    #[test]
    fn interleaved_writes_and_reads_preserve_order() {
        let mut buf = ReceiveBuffer::new();
        let mut out = Vec::new();
        let mut dst = [0u8; 3];

        for chunk in [&b"abc"[..], b"defg", b"h", b"ijklmn"] {
            buf.write(chunk).unwrap();
            let n = buf.read(&mut dst);
            out.extend_from_slice(&dst[..n]);
        }
        while !buf.is_empty() {
            let n = buf.read(&mut dst);
            out.extend_from_slice(&dst[..n]);
        }
        assert_eq!(out, b"abcdefghijklmn");
    }

    #[test]
    fn compact_resets_the_read_cursor() {
        let mut buf = ReceiveBuffer::new();
        buf.write(b"0123456789").unwrap();
        let mut dst = [0u8; 4];
        buf.read(&mut dst);

        buf.compact();
        assert_eq!(buf.pos, 0);
        assert_eq!(buf.len(), 6);

        let mut dst = [0u8; 6];
        assert_eq!(buf.read(&mut dst), 6);
        assert_eq!(&dst, b"456789");
    }

    #[test]
    fn cursor_invariant_holds_under_churn() {
        let mut buf = ReceiveBuffer::new();
        let mut dst = [0u8; 7];
        for round in 0u8..50 {
            buf.write(&[round; 13]).unwrap();
            buf.read(&mut dst);
            assert!(buf.pos <= buf.data.len());
            assert!(buf.data.len() <= buf.data.capacity());
        }
    }

    #[test]
    fn fully_drained_buffer_releases_its_cursor() {
        let mut buf = ReceiveBuffer::new();
        buf.write(b"xyz").unwrap();
        let mut dst = [0u8; 8];
        buf.read(&mut dst);
        assert_eq!(buf.pos, 0);
        assert!(buf.data.is_empty());
    }
}
