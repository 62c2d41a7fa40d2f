use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{extract_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reassembles newline-terminated frames from any `Read` stream.
///
/// Handles partial reads internally: a frame split across reads, several
/// frames in one read, or a frame delivered byte by byte all come out the
/// same. Bytes following the last delimiter stay buffered between calls.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no delimiter.
    scanned: usize,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Read the next complete frame, delimiter included (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at end of stream, even if
    /// an unterminated partial frame is buffered.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.take_buffered()? {
                return Ok(frame);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    trace!(pending = self.buf.len(), "dropping unterminated frame at EOF");
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&self.chunk[..read]);
        }
    }

    /// Lazy sequence of frames.
    ///
    /// The sequence yields each frame as it completes, then a single error
    /// (end of stream included) and nothing after that. Buffered bytes are
    /// kept in the reader, so a later call picks up where this one stopped.
    pub fn frames(&mut self) -> Frames<'_, T> {
        Frames {
            reader: self,
            done: false,
        }
    }

    fn take_buffered(&mut self) -> Result<Option<Bytes>> {
        let max = self.config.max_frame_size;
        match extract_frame(&mut self.buf, self.scanned) {
            Some(frame) => {
                self.scanned = 0;
                if frame.len() > max {
                    return Err(FrameError::FrameTooLarge {
                        size: frame.len(),
                        max,
                    });
                }
                Ok(Some(frame))
            }
            None => {
                self.scanned = self.buf.len();
                if self.buf.len() > max {
                    return Err(FrameError::FrameTooLarge {
                        size: self.buf.len(),
                        max,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Bytes received after the last complete frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Iterator returned by [`FrameReader::frames`].
pub struct Frames<'a, T> {
    reader: &'a mut FrameReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Frames<'_, T> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.reader.read_frame();
        if next.is_err() {
            self.done = true;
        }
        Some(next)
    }
}
