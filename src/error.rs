//! Types for working with ring, region, and tree operation errors.

use std::{fmt, io};

/// A specialized `Result` type for continuous-buffer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A list specifying general categories of erroneous operations.
///
/// This list is intended to grow over time and it is not recommended to
/// exhaustively match against it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Operation {
    /// Failed while creating a new continuous buffer.
    CreateCb,
    /// The full address space for a ring could not be allocated.
    RingAllocate,
    /// The full address space for a ring could not be deallocated.
    RingDeallocate,
    /// The mapping for the first half of the ring failed to allocate.
    RingPrimary,
    /// The mapping for the second half of the ring failed to allocate.
    RingSecondary,
    /// A temporary memory file descriptor failed to open.
    MemoryFd,
    /// Failed while appending data to a buffer.
    Append,
    /// Failed while reserving aligned space with `memalign`.
    Memalign,
    /// Failed while growing a buffer.
    Grow,
    /// Failed while shrinking a buffer.
    Shrink,
    /// Failed while copying bytes into a buffer.
    MemcpyIn,
    /// Failed while copying bytes out of a buffer.
    MemcpyOut,
    /// Failed while creating a region.
    RegionCreate,
    /// Failed while reserving space from a region.
    RegionMemalign,
    /// Failed during a BST insert.
    BstInsert,
    /// Failed during a BST delete.
    BstDelete,
    /// Failed during a BST lookup.
    BstLookup,
    /// Failed while consolidating the command log into a tree.
    Consolidate,
    /// Failed while mapping a backing file.
    MapFile,
    /// Used for pure I/O errors to simplify wrapping a `std::io::Error`.
    None,
}

impl Operation {
    /// Returns a display message fragment describing the `Operation`.
    pub fn as_str(&self) -> Option<&'static str> {
        use Operation::*;
        match *self {
            CreateCb => Some("create continuous buffer"),
            RingAllocate => Some("allocate full ring"),
            RingDeallocate => Some("deallocate full ring"),
            RingPrimary => Some("map ring first half"),
            RingSecondary => Some("map ring second half"),
            MemoryFd => Some("open memory fd"),
            Append => Some("append to buffer"),
            Memalign => Some("reserve aligned space"),
            Grow => Some("grow buffer"),
            Shrink => Some("shrink buffer"),
            MemcpyIn => Some("copy bytes into buffer"),
            MemcpyOut => Some("copy bytes out of buffer"),
            RegionCreate => Some("create region"),
            RegionMemalign => Some("reserve region space"),
            BstInsert => Some("insert into tree"),
            BstDelete => Some("delete from tree"),
            BstLookup => Some("look up in tree"),
            Consolidate => Some("consolidate command log"),
            MapFile => Some("map file"),
            None => Option::None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str().unwrap_or(""))
    }
}

/// A list specifying general categories of invalid input.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Input {
    /// A size or alignment precondition was violated (not a power of two,
    /// not a multiple of the page size, zero where nonzero was required).
    BadParam,
    /// A region or sub-allocator ran past its end.
    Depleted,
    /// An offset refers to data outside the buffer's live range.
    StaleOffset,
}

impl Input {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Input::BadParam => "bad parameter",
            Input::Depleted => "region depleted",
            Input::StaleOffset => "offset outside live range",
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// An error produced by a continuous-buffer, region, or tree operation.
#[non_exhaustive]
pub struct Error {
    repr: Repr,
    op: Operation,
}

enum Repr {
    Io(io::Error),
    Input(Input),
    NotFound,
}

impl Error {
    /// Returns an error that wraps a `std::io::Error` along with an [`Operation`].
    pub fn io(op: Operation, err: io::Error) -> Self {
        Self {
            repr: Repr::Io(err),
            op,
        }
    }

    /// Returns an error that wraps an [`Input`] along with an [`Operation`].
    pub fn input(op: Operation, input: Input) -> Self {
        Self {
            repr: Repr::Input(input),
            op,
        }
    }

    /// Returns the distinguished "key not found" error for a BST or map
    /// lookup/delete. This is not a `Failure`; it's an expected outcome that
    /// callers are meant to match on.
    pub fn not_found(op: Operation) -> Self {
        Self {
            repr: Repr::NotFound,
            op,
        }
    }

    /// Returns an error representing the last OS error which occurred.
    pub fn last_os_error(op: Operation) -> Self {
        Self::io(op, io::Error::last_os_error())
    }

    /// True if this error is the distinguished not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self.repr, Repr::NotFound)
    }

    /// Returns the OS error that this error represents (if any).
    pub fn raw_os_error(&self) -> Option<i32> {
        match &self.repr {
            Repr::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Returns the corresponding `std::io::ErrorKind` for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match &self.repr {
            Repr::Io(err) => err.kind(),
            Repr::Input(_) => io::ErrorKind::InvalidInput,
            Repr::NotFound => io::ErrorKind::NotFound,
        }
    }

    /// Returns the [`Operation`] that caused the error.
    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.repr {
            Repr::Io(err) => Some(err),
            Repr::Input(_) | Repr::NotFound => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self {
            repr: Repr::Io(err),
            op: Operation::None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (field, value): (&str, &dyn fmt::Debug) = match &self.repr {
            Repr::Io(err) => ("io", err),
            Repr::Input(input) => ("input", input),
            Repr::NotFound => ("not_found", &true),
        };
        fmt.debug_struct("Error")
            .field("op", &self.op)
            .field("kind", &self.kind())
            .field(field, &value)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &dyn fmt::Display = match &self.repr {
            Repr::Io(err) => err,
            Repr::Input(input) => input,
            Repr::NotFound => &"key not found",
        };
        if let Some(op) = self.op.as_str() {
            write!(fmt, "failed to {}, {}", op, value)
        } else {
            value.fmt(fmt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_failure() {
        let e = Error::not_found(Operation::BstLookup);
        assert!(e.is_not_found());
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn display_includes_operation() {
        let e = Error::input(Operation::Memalign, Input::BadParam);
        let s = format!("{}", e);
        assert!(s.contains("reserve aligned space"));
        assert!(s.contains("bad parameter"));
    }
}
