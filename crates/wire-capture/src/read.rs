use crate::{CaptureConfig, CaptureDumper, ChunkBuffer, Direction};
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::io::{self, IoSliceMut, Read};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Marker captured by `capture_rest_of_stream` ahead of drained bytes,
/// separating bytes read by the application from bytes drained for a dump.
pub const DRAIN_SENTINEL: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

/// Available is implemented by readers which can report how many bytes
/// may be read from them without blocking.
pub trait Available {
    fn available(&self) -> io::Result<usize>;
}

impl<T: AsRef<[u8]>> Available for io::Cursor<T> {
    fn available(&self) -> io::Result<usize> {
        let len = self.get_ref().as_ref().len() as u64;
        Ok(len.saturating_sub(self.position()) as usize)
    }
}

impl Available for &[u8] {
    fn available(&self) -> io::Result<usize> {
        Ok(self.len())
    }
}

impl Available for VecDeque<u8> {
    fn available(&self) -> io::Result<usize> {
        Ok(self.len())
    }
}

/// Only bytes already held in the BufReader's own buffer are counted.
/// Bytes the inner reader could yield without blocking are not, as this
/// impl would otherwise require `R: Available` and exclude BufReaders over
/// sockets and files. A drain through a BufReader therefore stops at the
/// end of its current buffer.
impl<R> Available for io::BufReader<R> {
    fn available(&self) -> io::Result<usize> {
        Ok(self.buffer().len())
    }
}

impl<A: Available + ?Sized> Available for Box<A> {
    fn available(&self) -> io::Result<usize> {
        (**self).available()
    }
}

pin_project_lite::pin_project! {
    /// CapturingReader wraps a reader, retaining a copy of each chunk of
    /// bytes returned by a successful read. Reads are otherwise passed
    /// through unchanged: the same bytes, counts, and errors are returned
    /// as if the inner reader were read directly.
    ///
    /// Dropping a CapturingReader drops (and closes) its inner reader.
    #[derive(Debug)]
    pub struct CapturingReader<R> {
        #[pin]
        inner: R,
        capture: ChunkBuffer,
        dumper: CaptureDumper,
    }
}

impl<R> CapturingReader<R> {
    /// Wrap `inner`, retaining its most recent 1024 chunks.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, &CaptureConfig::default())
    }

    /// Wrap `inner`, retaining its most recent `capture_last` chunks.
    pub fn with_capture_last(inner: R, capture_last: usize) -> Self {
        Self::with_capacity(inner, 0, capture_last)
    }

    /// Wrap `inner`, retaining its first `capture_first` chunks
    /// and its most recent `capture_last` chunks.
    pub fn with_capacity(inner: R, capture_first: usize, capture_last: usize) -> Self {
        Self::with_config(inner, &CaptureConfig::with_capacity(capture_first, capture_last))
    }

    pub fn with_config(inner: R, config: &CaptureConfig) -> Self {
        let mut dumper = CaptureDumper::new(Direction::Input);
        if let Some(dir) = &config.dump_dir {
            dumper = dumper.in_dir(dir);
        }
        Self {
            inner,
            capture: ChunkBuffer::new(config.capture_first, config.capture_last),
            dumper,
        }
    }

    /// Write dumps into `dir` rather than the system temporary directory.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dumper = self.dumper.in_dir(dir);
        self
    }

    /// Chunks captured so far.
    pub fn capture(&self) -> &ChunkBuffer {
        &self.capture
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutable access to the inner reader.
    /// Bytes read through it directly are not captured.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Dump captured chunks and `cause` to a new file, returning its path.
    /// Failures are logged and otherwise ignored.
    #[track_caller]
    pub fn dump(&self, cause: &(dyn StdError + 'static)) -> Option<PathBuf> {
        self.dumper.dump(&self.capture, cause)
    }
}

impl<R: Read + Available> CapturingReader<R> {
    /// Capture DRAIN_SENTINEL, and then any bytes which the inner reader
    /// can return without blocking. This is intended to be called just
    /// prior to `dump`, so that the dump includes bytes which arrived but
    /// weren't yet consumed. Errors encountered while draining are ignored.
    pub fn capture_rest_of_stream(&mut self) {
        self.capture.add(&DRAIN_SENTINEL);

        if let Err(error) = self.drain_available() {
            tracing::debug!(%error, "failed to capture rest of stream");
        }
    }

    fn drain_available(&mut self) -> io::Result<()> {
        let rest = self.inner.available()?;
        if rest != 0 {
            let mut buf = vec![0; rest];
            self.read(&mut buf)?;
        }
        Ok(())
    }
}

// Upper bound on bytes taken by `capture_rest_of_async_stream`,
// for inner readers which are always ready.
const ASYNC_DRAIN_LIMIT: usize = 1 << 16;

impl<R: AsyncRead + Unpin> CapturingReader<R> {
    /// Capture DRAIN_SENTINEL, and then any bytes which the inner async
    /// reader has ready, polling it until it would block, reaches its end,
    /// or fails. It's never awaited, so it may be called from synchronous
    /// error handling. Errors encountered while draining are ignored.
    pub fn capture_rest_of_async_stream(&mut self) {
        self.capture.add(&DRAIN_SENTINEL);

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let mut buf = vec![0u8; 8192];
        let mut drained = 0;

        while drained < ASYNC_DRAIN_LIMIT {
            let mut read_buf = ReadBuf::new(&mut buf);

            match Pin::new(&mut *self).poll_read(&mut cx, &mut read_buf) {
                Poll::Ready(Ok(())) if !read_buf.filled().is_empty() => {
                    drained += read_buf.filled().len();
                }
                Poll::Ready(Ok(())) | Poll::Pending => break,
                Poll::Ready(Err(error)) => {
                    tracing::debug!(%error, "failed to capture rest of stream");
                    break;
                }
            }
        }
    }
}

impl<R: Read> Read for CapturingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;

        if let Some(filled) = buf.get(..n) {
            self.capture.add(filled);
        }
        Ok(n)
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        let n = self.inner.read_vectored(bufs)?;

        self.capture.add_vectored(bufs.iter().map(|b| &**b), n);
        Ok(n)
    }
}

impl<R: Available> Available for CapturingReader<R> {
    fn available(&self) -> io::Result<usize> {
        self.inner.available()
    }
}

impl<R: AsyncRead> AsyncRead for CapturingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();

        ready!(this.inner.poll_read(cx, buf))?;

        if let Some(filled) = buf.filled().get(before..) {
            this.capture.add(filled);
        }
        Poll::Ready(Ok(()))
    }
}
