use crate::ChunkBuffer;
use bytes::Bytes;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::path::PathBuf;

/// Direction of the stream whose capture is being dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn file_prefix(self) -> &'static str {
        match self {
            Direction::Input => "remotingInputCapture-",
            Direction::Output => "remotingOutputCapture-",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DumpError {
    #[error("failed to create capture dump in {dir:?}")]
    Create {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write capture dump {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const DUMP_SUFFIX: &str = ".txt";

/// CaptureDumper writes the contents of a ChunkBuffer, along with the
/// error which prompted the dump, into a uniquely named text file.
#[derive(Debug, Clone)]
pub struct CaptureDumper {
    direction: Direction,
    dir: PathBuf,
}

impl CaptureDumper {
    /// Dumper which writes into the system temporary directory.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            dir: std::env::temp_dir(),
        }
    }

    /// Write dumps into `dir` instead.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Dump `buffer` and `cause`, returning the path of the written file.
    /// This is best-effort: a failure is logged and None is returned,
    /// leaving the caller's own error handling undisturbed.
    #[track_caller]
    pub fn dump(&self, buffer: &ChunkBuffer, cause: &(dyn StdError + 'static)) -> Option<PathBuf> {
        let location = Location::caller();

        match self.dump_from(location, buffer, cause) {
            Ok(path) => {
                tracing::debug!(
                    path = %path.display(),
                    direction = %self.direction,
                    first = buffer.first().len(),
                    last = buffer.last().len(),
                    "wrote capture dump"
                );
                Some(path)
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    details = ?error,
                    direction = %self.direction,
                    "failed to write capture dump"
                );
                None
            }
        }
    }

    /// Dump `buffer` and `cause`, returning the path of the written file
    /// or the error which prevented it from being written.
    #[track_caller]
    pub fn try_dump(
        &self,
        buffer: &ChunkBuffer,
        cause: &(dyn StdError + 'static),
    ) -> Result<PathBuf, DumpError> {
        self.dump_from(Location::caller(), buffer, cause)
    }

    fn dump_from(
        &self,
        location: &Location<'_>,
        buffer: &ChunkBuffer,
        cause: &(dyn StdError + 'static),
    ) -> Result<PathBuf, DumpError> {
        let mut file = tempfile::Builder::new()
            .prefix(self.direction.file_prefix())
            .suffix(DUMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|source| DumpError::Create {
                dir: self.dir.clone(),
                source,
            })?;

        // Captured whether or not RUST_BACKTRACE is set.
        let backtrace = Backtrace::force_capture();
        let backtrace = match backtrace.status() {
            BacktraceStatus::Captured => Some(&backtrace),
            _ => None,
        };

        // If rendering fails, `file` is dropped and thus removed.
        let rendered = {
            let mut w = io::BufWriter::new(file.as_file_mut());
            render(&mut w, location, cause, backtrace, buffer).and_then(|()| w.flush())
        };
        if let Err(source) = rendered {
            return Err(DumpError::Write {
                path: file.path().to_owned(),
                source,
            });
        }

        let (_file, path) = file.keep().map_err(|err| DumpError::Write {
            path: err.file.path().to_owned(),
            source: err.error,
        })?;

        Ok(path)
    }
}

/// Render a human-readable dump of `buffer` into `w`.
///
/// The dump begins with `context` (typically the call site of the dump),
/// then `cause` and each of its sources, then `backtrace` if present.
/// The first window and then the last window follow, with each chunk
/// rendered as a hexdump beneath a header giving its index and length.
pub fn render<W: Write>(
    w: &mut W,
    context: &dyn fmt::Display,
    cause: &(dyn StdError + 'static),
    backtrace: Option<&Backtrace>,
    buffer: &ChunkBuffer,
) -> io::Result<()> {
    writeln!(w, "Dump from {context}")?;

    let mut source = Some(cause);
    while let Some(err) = source {
        writeln!(w, "Caused by: {err}")?;
        source = err.source();
    }
    if let Some(backtrace) = backtrace {
        writeln!(w, "{backtrace}")?;
    }

    let (first, last) = buffer.snapshot();

    writeln!(
        w,
        "\nFirst window ({} of {} chunks):",
        first.len(),
        buffer.first_capacity()
    )?;
    render_chunks(w, 0, first.iter())?;

    writeln!(
        w,
        "\nLast window ({} of {} chunks, {} dropped):",
        last.len(),
        buffer.last_capacity(),
        buffer.dropped(),
    )?;
    render_chunks(w, first.len(), last.iter())?;

    Ok(())
}

fn render_chunks<'a, W: Write>(
    w: &mut W,
    start: usize,
    chunks: impl Iterator<Item = &'a Bytes>,
) -> io::Result<()> {
    for (index, chunk) in chunks.enumerate() {
        writeln!(w, "--- chunk {}: {} bytes ---", start + index, chunk.len())?;
        for line in hexdump::hexdump_iter(chunk) {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}
