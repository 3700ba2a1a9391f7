//! Pull-based byte stream over a sequence of frames.

use std::collections::VecDeque;
use std::io;

use crate::foundation::core::Frame;
use crate::queue::QueueReceiver;

/// Anything that can hand out frames in order.
pub trait FrameSource {
    /// Next frame, blocking if necessary. `None` means the sequence has ended for good.
    fn next_frame(&mut self) -> Option<Frame>;
}

impl FrameSource for QueueReceiver<Frame> {
    fn next_frame(&mut self) -> Option<Frame> {
        self.pop()
    }
}

impl FrameSource for VecDeque<Frame> {
    fn next_frame(&mut self) -> Option<Frame> {
        self.pop_front()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<Frame> {
        (**self).next_frame()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The buffer was filled completely; more bytes may follow.
    More,
    /// The source is exhausted. This call may have written fewer bytes than requested.
    EndOfStream,
}

/// Presents a [`FrameSource`] as one contiguous byte stream.
///
/// Reads may be any size: smaller than a frame, spanning several frames, or not a multiple of
/// the pixel size. Bytes come out exactly in frame order with nothing duplicated or skipped.
pub struct StreamAdapter<S> {
    source: S,
    current: Option<Frame>,
    offset: usize,
    finished: bool,
    bytes_out: u64,
}

impl<S: FrameSource> StreamAdapter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: None,
            offset: 0,
            finished: false,
            bytes_out: 0,
        }
    }

    /// Fill `buf` from the frame sequence.
    ///
    /// Returns the number of bytes written and whether the stream ended. Every call fills `buf`
    /// entirely unless it returns [`ReadStatus::EndOfStream`].
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> (usize, ReadStatus) {
        let mut written = 0;
        while written < buf.len() {
            if self.current.is_none() {
                self.advance();
            }
            let Some(frame) = self.current.as_ref() else {
                self.bytes_out += written as u64;
                return (written, ReadStatus::EndOfStream);
            };
            let data = frame.data();
            let len = data.len();
            let n = (len - self.offset).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&data[self.offset..self.offset + n]);
            written += n;
            self.offset += n;
            if self.offset >= len {
                self.current = None;
                self.offset = 0;
            }
        }
        self.bytes_out += written as u64;
        (written, ReadStatus::More)
    }

    /// Total bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_out
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn advance(&mut self) {
        if self.finished {
            return;
        }
        match self.source.next_frame() {
            Some(f) => {
                tracing::trace!(frame = f.index().0, "stream advanced to frame");
                self.current = Some(f);
                self.offset = 0;
            }
            None => {
                tracing::debug!(bytes = self.bytes_out, "frame stream ended");
                self.finished = true;
            }
        }
    }
}

impl<S: FrameSource> io::Read for StreamAdapter<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, _) = self.read_chunk(buf);
        Ok(n)
    }
}

#[cfg(test)]
#[path = "../tests/unit/stream.rs"]
mod tests;
