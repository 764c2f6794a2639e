use crate::{CaptureConfig, CaptureDumper, ChunkBuffer, Direction};
use std::error::Error as StdError;
use std::io::{self, IoSlice, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::AsyncWrite;

pin_project_lite::pin_project! {
    /// CapturingWriter wraps a writer, retaining a copy of each chunk of
    /// bytes accepted by a successful write. Writes, flushes, and shutdowns
    /// are otherwise passed through unchanged.
    ///
    /// Only the bytes the inner writer reports as written are captured,
    /// so a partial write followed by a retry of the remainder (as done by
    /// `write_all`) captures each byte exactly once.
    #[derive(Debug)]
    pub struct CapturingWriter<W> {
        #[pin]
        inner: W,
        capture: ChunkBuffer,
        dumper: CaptureDumper,
    }
}

impl<W> CapturingWriter<W> {
    /// Wrap `inner`, retaining its most recent 1024 chunks.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, &CaptureConfig::default())
    }

    /// Wrap `inner`, retaining its most recent `capture_last` chunks.
    pub fn with_capture_last(inner: W, capture_last: usize) -> Self {
        Self::with_capacity(inner, 0, capture_last)
    }

    /// Wrap `inner`, retaining its first `capture_first` chunks
    /// and its most recent `capture_last` chunks.
    pub fn with_capacity(inner: W, capture_first: usize, capture_last: usize) -> Self {
        Self::with_config(inner, &CaptureConfig::with_capacity(capture_first, capture_last))
    }

    pub fn with_config(inner: W, config: &CaptureConfig) -> Self {
        let mut dumper = CaptureDumper::new(Direction::Output);
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

    pub fn capture(&self) -> &ChunkBuffer {
        &self.capture
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutable access to the inner writer.
    /// Bytes written through it directly are not captured.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Dump captured chunks and `cause` to a new file, returning its path.
    /// Failures are logged and otherwise ignored.
    #[track_caller]
    pub fn dump(&self, cause: &(dyn StdError + 'static)) -> Option<PathBuf> {
        self.dumper.dump(&self.capture, cause)
    }
}

impl<W: Write> Write for CapturingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;

        if let Some(written) = buf.get(..n) {
            self.capture.add(written);
        }
        Ok(n)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let n = self.inner.write_vectored(bufs)?;

        self.capture.add_vectored(bufs.iter().map(|b| &**b), n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: AsyncWrite> AsyncWrite for CapturingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let n = ready!(this.inner.poll_write(cx, buf))?;

        if let Some(written) = buf.get(..n) {
            this.capture.add(written);
        }
        Poll::Ready(Ok(n))
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let n = ready!(this.inner.poll_write_vectored(cx, bufs))?;

        this.capture.add_vectored(bufs.iter().map(|b| &**b), n);
        Poll::Ready(Ok(n))
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
