use std::cmp::min;
use std::io::Read;

/// A growable byte buffer used to accumulate socket reads until a frame is complete.
///
/// Data is appended at the tail and consumed from the head. Consumed space is
/// reclaimed lazily, when more than half of the backing storage is dead.
///
/// # Example
///
/// ```rust
/// # use nav350::base::ReceiveBuffer;
/// let mut buffer = ReceiveBuffer::new();
/// buffer.extend_from_slice(&[0, 1, 2, 3]);
/// assert_eq!(buffer.len(), 4);
/// buffer.skip_bytes(2);
/// assert_eq!(buffer.current_read_slice(), &[2, 3]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveBuffer {
    buf: Vec<u8>,
    head: usize,
}

impl ReceiveBuffer {
    /// Creates an empty buffer.
    pub fn new() -> ReceiveBuffer {
        ReceiveBuffer::default()
    }

    /// Returns the number of unread bytes.
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Returns `true` if there are no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All unread bytes, oldest first.
    pub fn current_read_slice(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// Drops up to `bytes` unread bytes from the front and returns how many were dropped.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = min(self.len(), bytes);
        self.head += skipped;
        if self.head == self.buf.len() {
            self.buf.clear();
            self.head = 0;
        }
        skipped
    }

    /// Discards everything.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }

    /// Appends bytes at the tail.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(data);
    }

    /// Performs one read of at most `chunk` bytes from `upstream` into the tail.
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of stream.
    pub fn read_from(&mut self, upstream: &mut impl Read, chunk: usize) -> std::io::Result<usize> {
        self.compact();
        let old_len = self.buf.len();
        self.buf.resize(old_len + chunk.max(1), 0);
        match upstream.read(&mut self.buf[old_len..]) {
            Ok(read) => {
                self.buf.truncate(old_len + read);
                Ok(read)
            }
            Err(err) => {
                self.buf.truncate(old_len);
                Err(err)
            }
        }
    }

    fn compact(&mut self) {
        if self.head > 0 && self.head * 2 >= self.buf.len() {
            self.buf.drain(..self.head);
            self.head = 0;
        }
    }
}
