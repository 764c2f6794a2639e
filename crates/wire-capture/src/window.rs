use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// DualWindowBuffer retains the first `first_capacity` items it is ever
/// given, and then the most recent `last_capacity` items after that.
/// Items arriving once both windows are full push the oldest item out of
/// the last window, so memory is bounded by the capacities rather than by
/// how many items were pushed.
///
/// An item lands in exactly one window: while the first window has room,
/// items go there and never also into the last window. Once the first
/// window is full it's never modified again.
///
/// The buffer has no internal synchronization. Callers that share it across
/// threads must serialize pushes with reads of its windows.
#[derive(Debug, Clone)]
pub struct DualWindowBuffer<T> {
    first_capacity: usize,
    last_capacity: usize,
    first: Vec<T>,
    last: VecDeque<T>,
    // Items admitted to neither window, or evicted from the last window.
    dropped: u64,
}

/// ChunkBuffer is a DualWindowBuffer of immutable byte chunks,
/// each one a copy of the bytes seen by a single I/O call.
pub type ChunkBuffer = DualWindowBuffer<Bytes>;

impl<T> DualWindowBuffer<T> {
    /// Build an empty buffer. Either capacity may be zero, which disables
    /// that window. With both zero, every push is discarded.
    pub fn new(first_capacity: usize, last_capacity: usize) -> Self {
        Self {
            first_capacity,
            last_capacity,
            // Capacities are upper bounds which may be generous,
            // so don't pre-allocate for them.
            first: Vec::new(),
            last: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Push an item, retaining it in the first window if it has room
    /// and otherwise in the last window, evicting that window's oldest item.
    pub fn push(&mut self, item: T) {
        if self.first.len() < self.first_capacity {
            self.first.push(item);
            return;
        }
        if self.last_capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.last.len() == self.last_capacity {
            self.last.pop_front();
            self.dropped += 1;
        }
        self.last.push_back(item);
    }

    /// Items of the first window, in arrival order.
    pub fn first(&self) -> &[T] {
        &self.first
    }

    /// Items of the last window, in arrival order (most-recent last).
    pub fn last(&self) -> &VecDeque<T> {
        &self.last
    }

    /// Both windows at once, for rendering.
    pub fn snapshot(&self) -> (&[T], &VecDeque<T>) {
        (&self.first, &self.last)
    }

    pub fn first_capacity(&self) -> usize {
        self.first_capacity
    }

    pub fn last_capacity(&self) -> usize {
        self.last_capacity
    }

    /// Number of items which were pushed but are no longer retained.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Number of items currently retained across both windows.
    pub fn len(&self) -> usize {
        self.first.len() + self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkBuffer {
    /// Capture a copy of `chunk`. Empty chunks are ignored.
    pub fn add(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.push(Bytes::copy_from_slice(chunk));
    }

    /// Capture the first `n` bytes spread across `slices` as a single chunk,
    /// as produced by a vectored read or write of `n` bytes.
    pub fn add_vectored<'s>(&mut self, slices: impl IntoIterator<Item = &'s [u8]>, n: usize) {
        let mut chunk = BytesMut::with_capacity(n);

        for slice in slices {
            let take = usize::min(slice.len(), n - chunk.len());
            chunk.extend_from_slice(&slice[..take]);

            if chunk.len() == n {
                break;
            }
        }
        if !chunk.is_empty() {
            self.push(chunk.freeze());
        }
    }
}
