use core::fmt;

/// Errors surfaced by compact collections and their cursors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A negative expected-size hint was supplied.
    InvalidExpectedSize(i64),
    /// `Cursor::next` was called with nothing left to visit.
    NoSuchElement,
    /// `Cursor::remove` was called without a preceding successful `next`.
    IllegalCursorState,
    /// The collection changed structurally behind the cursor's back.
    ///
    /// Detection is best-effort and must not be relied on for correctness.
    ConcurrentModification,
    /// The insert would exceed [`MAX_SIZE`](crate::capacity::MAX_SIZE) entries.
    CapacityOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidExpectedSize(n) => {
                write!(f, "expected size cannot be negative but was {n}")
            }
            Error::NoSuchElement => f.write_str("cursor has no more elements"),
            Error::IllegalCursorState => {
                f.write_str("remove() requires a preceding next() on this cursor")
            }
            Error::ConcurrentModification => {
                f.write_str("collection was modified outside of the cursor")
            }
            Error::CapacityOverflow => f.write_str("capacity overflow"),
        }
    }
}

impl std::error::Error for Error {}
