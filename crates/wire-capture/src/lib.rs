//! wire-capture decorates the byte streams of a transport, retaining a
//! bounded sample of the bytes which passed through them so that the
//! sample may be dumped for inspection after a failure.
//!
//! - `CapturingReader` and `CapturingWriter` wrap `std::io` and `tokio::io`
//!   readers and writers, passing all I/O through unchanged.
//! - Each retains its first N and most recent M chunks in a `ChunkBuffer`.
//! - `dump` writes the retained chunks, with the error which prompted the
//!   dump, to a new temporary file.

mod config;
mod dump;
mod read;
mod window;
mod write;

pub use config::{CaptureConfig, DEFAULT_CAPTURE_LAST};
pub use dump::{render, CaptureDumper, Direction, DumpError};
pub use read::{Available, CapturingReader, DRAIN_SENTINEL};
pub use window::{ChunkBuffer, DualWindowBuffer};
pub use write::CapturingWriter;
