//! Errors surfaced by construction and by fail-fast cursors.

/// Failure returned synchronously at the point of the violating call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Load factor was zero, negative, NaN or infinite.
    #[error("illegal load factor: {0}")]
    InvalidLoadFactor(f32),

    /// The map was structurally modified behind a cursor's back.
    #[error("map modified during iteration (expected generation {expected}, found {found})")]
    ConcurrentModification { expected: u64, found: u64 },

    /// `Cursor::remove` called before `next` or twice for the same entry.
    #[error("cursor has no current entry to remove")]
    NoCurrentEntry,
}
