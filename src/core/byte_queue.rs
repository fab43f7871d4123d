//! Bounded byte queue between the reader thread and the owning task.
//!
//! A fixed-capacity circular buffer guarded by a mutex and two condvars:
//! writers block while the buffer is full, readers block while it is empty.
//! The fixed capacity is the only backpressure bound in the session; a slow
//! consumer stalls the reader thread's write here, which stalls its next
//! transport read, which lets transport-level flow control push back on the
//! remote peer.

use std::sync::{Condvar, Mutex};

use thiserror::Error;

/// A blocked queue operation was interrupted by [`ByteQueue::interrupt`].
#[derive(Error, Debug, PartialEq, Eq)]
#[error("byte queue interrupted")]
pub struct Interrupted;

struct Inner {
    buf: Box<[u8]>,
    /// Index of the oldest byte.
    head: usize,
    /// Number of stored bytes. Always `0 <= count <= capacity`.
    count: usize,
    interrupted: bool,
}

/// Bounded, thread-safe byte ring buffer with blocking read/write.
pub struct ByteQueue {
    inner: Mutex<Inner>,
    readable: Condvar,
    writable: Condvar,
}

impl ByteQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                count: 0,
                interrupted: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    /// Write all of `data`, blocking in chunks while the buffer is full.
    ///
    /// On interrupt, returns `Err(Interrupted)`; only the bytes that fit
    /// before the interrupt have been transferred.
    pub fn write(&self, data: &[u8]) -> Result<(), Interrupted> {
        let mut remaining = data;
        while !remaining.is_empty() {
            let mut inner = self.lock();
            loop {
                if inner.interrupted {
                    return Err(Interrupted);
                }
                if inner.count < inner.buf.len() {
                    break;
                }
                inner = self
                    .writable
                    .wait(inner)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }

            let capacity = inner.buf.len();
            let free = capacity - inner.count;
            let n = free.min(remaining.len());
            let tail = (inner.head + inner.count) % capacity;

            // Copy in at most two segments around the wrap point.
            let first = n.min(capacity - tail);
            inner.buf[tail..tail + first].copy_from_slice(&remaining[..first]);
            if first < n {
                inner.buf[..n - first].copy_from_slice(&remaining[first..n]);
            }
            inner.count += n;
            remaining = &remaining[n..];

            self.readable.notify_one();
        }
        Ok(())
    }

    /// Read up to `out.len()` bytes, blocking until at least one byte is
    /// available. Returns the number of bytes copied. An empty `out` returns
    /// zero immediately.
    pub fn read(&self, out: &mut [u8]) -> Result<usize, Interrupted> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut inner = self.lock();
        while inner.count == 0 && !inner.interrupted {
            inner = self
                .readable
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if inner.count == 0 {
            // Interrupted with nothing buffered.
            return Err(Interrupted);
        }

        let capacity = inner.buf.len();
        let n = inner.count.min(out.len());
        let head = inner.head;

        let first = n.min(capacity - head);
        out[..first].copy_from_slice(&inner.buf[head..head + first]);
        if first < n {
            out[first..n].copy_from_slice(&inner.buf[..n - first]);
        }
        inner.head = (head + n) % capacity;
        inner.count -= n;

        self.writable.notify_one();
        Ok(n)
    }

    /// Non-blocking snapshot of the number of buffered bytes.
    pub fn available(&self) -> usize {
        self.lock().count
    }

    /// Permanently interrupt the queue, waking all blocked readers and
    /// writers. Used by session teardown to release the reader thread.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = ByteQueue::new(16);
        queue.write(b"hello").unwrap();
        queue.write(b" world").unwrap();

        let mut buf = [0u8; 16];
        let n = queue.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
    }

    #[test]
    fn test_read_returns_at_most_requested() {
        let queue = ByteQueue::new(16);
        queue.write(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(queue.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(queue.available(), 2);

        let n = queue.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ef");
        assert_eq!(queue.available(), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let queue = ByteQueue::new(8);
        let mut buf = [0u8; 8];

        // Advance head so subsequent writes wrap.
        queue.write(b"xxxxxx").unwrap();
        assert_eq!(queue.read(&mut buf[..6]).unwrap(), 6);

        queue.write(b"abcdefgh").unwrap();
        let n = queue.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcdefgh");
    }

    #[test]
    fn test_write_blocks_until_read_frees_space() {
        let queue = Arc::new(ByteQueue::new(4));
        queue.write(b"aaaa").unwrap();

        let writer = {
            let queue = queue.clone();
            thread::spawn(move || queue.write(b"bbbb"))
        };

        // Writer is stuck on a full queue; drain it.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.available(), 4);

        let mut buf = [0u8; 4];
        assert_eq!(queue.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"aaaa");

        writer.join().unwrap().unwrap();
        assert_eq!(queue.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"bbbb");
    }

    #[test]
    fn test_count_never_exceeds_capacity() {
        let queue = Arc::new(ByteQueue::new(8));
        let writer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    queue.write(b"0123456789").unwrap();
                }
            })
        };

        let mut total = 0;
        let mut buf = [0u8; 8];
        while total < 1000 {
            assert!(queue.available() <= 8);
            total += queue.read(&mut buf).unwrap();
        }
        assert_eq!(total, 1000);
        writer.join().unwrap();
    }

    #[test]
    fn test_read_blocks_until_data_arrives() {
        let queue = Arc::new(ByteQueue::new(8));
        let reader = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 8];
                let n = queue.read(&mut buf).unwrap();
                buf[..n].to_vec()
            })
        };

        thread::sleep(Duration::from_millis(50));
        queue.write(b"ping").unwrap();
        assert_eq!(reader.join().unwrap(), b"ping");
    }

    #[test]
    fn test_interrupt_unblocks_reader_and_writer() {
        let queue = Arc::new(ByteQueue::new(4));

        let reader = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                queue.read(&mut buf)
            })
        };

        thread::sleep(Duration::from_millis(50));
        queue.interrupt();
        assert_eq!(reader.join().unwrap(), Err(Interrupted));

        // Writes after interrupt fail immediately.
        assert_eq!(queue.write(b"late"), Err(Interrupted));
    }

    #[test]
    fn test_empty_read_buffer_never_blocks() {
        let queue = ByteQueue::new(4);
        let mut buf = [0u8; 0];
        assert_eq!(queue.read(&mut buf).unwrap(), 0);
    }
}
