//! Bump-allocated backing store for node payload bytes.
//!
//! The arena owns a list of chunks and hands out 8-byte-aligned byte
//! ranges by bumping an offset into the current chunk. Chunks are
//! append-only and never shrink or move (each chunk is a separate heap
//! allocation), so a [`Span`] stays valid for the arena's whole lifetime.
//! All memory is released at once when the arena is dropped.
//!
//! Mutation happens only under the node tree's write lock; readers resolve
//! spans under the read lock. The arena itself therefore carries no
//! synchronization.

/// Alignment of every allocation, in bytes.
pub const SPAN_ALIGN: usize = 8;

/// Regular chunk size. Payloads larger than this get a dedicated chunk.
const CHUNK_BYTES: usize = 64 * 1024;

/// A byte range inside the arena. Copyable, id-like, resolvable only
/// through [`Arena::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    chunk: u32,
    offset: u32,
    len: u32,
}

impl Span {
    /// The empty span (zero-length payloads resolve to an empty slice).
    pub const EMPTY: Self = Self {
        chunk: 0,
        offset: 0,
        len: 0,
    };

    /// Payload length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Chunked bump allocator for immutable payload bytes.
pub struct Arena {
    chunks: Vec<Box<[u8]>>,
    /// Chunk currently being bumped into. Oversize allocations get their
    /// own chunks and never become the bump target.
    bump_chunk: usize,
    /// Bump offset into `chunks[bump_chunk]`.
    offset: usize,
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            bump_chunk: 0,
            offset: 0,
        }
    }

    /// Copy `payload` into the arena and return its span.
    ///
    /// The returned range is 8-byte aligned and immutable from the caller's
    /// point of view. Allocation only fails if the global allocator does,
    /// which aborts the process; the arena itself never runs out.
    pub fn store(&mut self, payload: &[u8]) -> Span {
        if payload.is_empty() {
            return Span::EMPTY;
        }

        let padded = payload.len().next_multiple_of(SPAN_ALIGN);

        if padded > CHUNK_BYTES {
            let mut chunk = vec![0u8; padded].into_boxed_slice();
            chunk[..payload.len()].copy_from_slice(payload);
            let idx = self.push_chunk(chunk);
            return Span {
                chunk: idx,
                offset: 0,
                len: payload.len() as u32,
            };
        }

        if self.chunks.is_empty() || self.offset + padded > CHUNK_BYTES {
            let idx = self.push_chunk(vec![0u8; CHUNK_BYTES].into_boxed_slice());
            self.bump_chunk = idx as usize;
            self.offset = 0;
        }

        let offset = self.offset;
        self.chunks[self.bump_chunk][offset..offset + payload.len()].copy_from_slice(payload);
        self.offset += padded;

        Span {
            chunk: self.bump_chunk as u32,
            offset: offset as u32,
            len: payload.len() as u32,
        }
    }

    /// Resolve a span to its bytes.
    #[inline]
    #[must_use]
    pub fn get(&self, span: Span) -> &[u8] {
        if span.is_empty() {
            return &[];
        }
        let start = span.offset as usize;
        &self.chunks[span.chunk as usize][start..start + span.len as usize]
    }

    fn push_chunk(&mut self, chunk: Box<[u8]>) -> u32 {
        let idx = self.chunks.len() as u32;
        self.chunks.push(chunk);
        idx
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
