/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::Dist;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by grid construction, distributed matrices and the redistribution engine.
///
/// Each variant records the routine that raised it in `op`.
///
/// Every condition here is detected from information that all processes share
/// (shapes, schemes, alignments, grid identity), and is checked before any communication
/// is issued.  A failing call therefore fails identically on every process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{op}: a {rows}x{cols} grid cannot hold {size} processes")]
    GridShape { op: &'static str, rows: usize, cols: usize, size: usize },

    #[error("{op}: operands are distributed over different grids")]
    GridMismatch { op: &'static str },

    #[error("{op}: nonconformal operands: {detail}")]
    Nonconformal { op: &'static str, detail: String },

    #[error("{op}: [{col},{row}] is not a valid distribution")]
    InvalidScheme { op: &'static str, col: Dist, row: Dist },

    #[error("{op}: cannot change the alignment of a populated matrix (call empty() first, or realign())")]
    AlignmentLocked { op: &'static str },

    #[error("{op}: {detail}")]
    InvalidArgument { op: &'static str, detail: String },

    #[error("{op}: not supported: {detail}")]
    Unsupported { op: &'static str, detail: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The grid or the pairing of grids is wrong.
    Configuration,
    /// A programming error in the caller.
    Precondition,
    /// A legal request that this library does not implement.
    Unsupported,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::GridShape { .. } |
            Error::GridMismatch { .. } => ErrorKind::Configuration,

            Error::Nonconformal { .. } |
            Error::InvalidScheme { .. } |
            Error::AlignmentLocked { .. } |
            Error::InvalidArgument { .. } => ErrorKind::Precondition,

            Error::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Whether the caller can reasonably branch on this error (e.g. by choosing another
    /// distribution) rather than treat it as a bug.
    pub fn is_recoverable(&self) -> bool { self.kind() == ErrorKind::Unsupported }

    /// The routine that raised the error.
    pub fn op(&self) -> &'static str {
        match *self {
            Error::GridShape { op, .. } |
            Error::GridMismatch { op } |
            Error::Nonconformal { op, .. } |
            Error::InvalidScheme { op, .. } |
            Error::AlignmentLocked { op } |
            Error::InvalidArgument { op, .. } |
            Error::Unsupported { op, .. } => op,
        }
    }
}

macro_rules! nonconformal {
    ($op:expr, $($fmt:tt)+) => {
        $crate::Error::Nonconformal { op: $op, detail: format!($($fmt)+) }
    };
}

macro_rules! invalid_argument {
    ($op:expr, $($fmt:tt)+) => {
        $crate::Error::InvalidArgument { op: $op, detail: format!($($fmt)+) }
    };
}

macro_rules! unsupported {
    ($op:expr, $($fmt:tt)+) => {
        $crate::Error::Unsupported { op: $op, detail: format!($($fmt)+) }
    };
}
