/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Collective communication for SPMD ("single program, multiple data") code.
//!
//! Every process runs the same program and holds a [`Communicator`].
//! All methods on a `Communicator` other than `rank` and `size` are **collective and blocking**:
//! every member of the communicator must make the matching call, in the same order,
//! or the program deadlocks.  Nothing here tries to detect or recover from that.
//!
//! Two implementations are provided:
//!
//! * [`LocalUniverse`], which runs each "process" on a thread of the current process.
//!   This is what the test suite uses.
//! * `MpiComm` (feature `mpi-support`), which wraps a real MPI communicator.
//!
//! The trait itself only moves bytes, so that it can be used as a trait object.
//! [`CommExt`] layers typed versions of each collective on top for any `bytemuck::Pod` type.

#[macro_use] extern crate log;

pub use crate::local::{LocalComm, LocalUniverse};
mod local;

#[cfg(feature = "mpi-support")]
pub use crate::mpi_comm::MpiComm;
#[cfg(feature = "mpi-support")]
mod mpi_comm;

use bytemuck::Pod;

/// A group of cooperating processes.
///
/// # Collective operations
///
/// Byte buffers are exchanged in uniform packages: for `scatter`, `gather`,
/// `all_gather` and `all_to_all`, the package size is the length of the per-process
/// receive (or send) chunk, and must be the same on every member.
///
/// Buffers that are only meaningful on the root (the send buffer of `scatter`,
/// the receive buffer of `gather`) are ignored on other processes, and may be empty there.
pub trait Communicator {
    /// Rank of this process, in `0..self.size()`.
    fn rank(&self) -> usize;

    /// Number of processes in this communicator.
    fn size(&self) -> usize;

    /// Partition this communicator into disjoint sub-communicators.
    ///
    /// Processes that supply the same `color` end up in the same sub-communicator,
    /// ordered by `key` (ties broken by their rank in `self`).
    fn split(&self, color: usize, key: usize) -> Box<dyn Communicator>;

    fn barrier(&self);

    /// Copy `buf` from `root` into `buf` on every process.
    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]);

    /// `send` (on root) holds `size` packages of `recv.len()` bytes; package `q` goes to rank `q`.
    fn scatter_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]);

    /// Inverse of `scatter_bytes`.  `recv` (on root) receives `size` packages of `send.len()` bytes.
    fn gather_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]);

    /// Like `gather_bytes`, but every process receives everything.
    fn all_gather_bytes(&self, send: &[u8], recv: &mut [u8]);

    /// `send` holds one package per destination rank, and `recv` one package per source rank.
    fn all_to_all_bytes(&self, send: &[u8], recv: &mut [u8]);
}

impl<'a, C: Communicator + ?Sized> Communicator for &'a C {
    fn rank(&self) -> usize { (**self).rank() }
    fn size(&self) -> usize { (**self).size() }
    fn split(&self, color: usize, key: usize) -> Box<dyn Communicator> { (**self).split(color, key) }
    fn barrier(&self) { (**self).barrier() }
    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]) { (**self).broadcast_bytes(root, buf) }
    fn scatter_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) { (**self).scatter_bytes(root, send, recv) }
    fn gather_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) { (**self).gather_bytes(root, send, recv) }
    fn all_gather_bytes(&self, send: &[u8], recv: &mut [u8]) { (**self).all_gather_bytes(send, recv) }
    fn all_to_all_bytes(&self, send: &[u8], recv: &mut [u8]) { (**self).all_to_all_bytes(send, recv) }
}

impl<C: Communicator + ?Sized> Communicator for Box<C> {
    fn rank(&self) -> usize { (**self).rank() }
    fn size(&self) -> usize { (**self).size() }
    fn split(&self, color: usize, key: usize) -> Box<dyn Communicator> { (**self).split(color, key) }
    fn barrier(&self) { (**self).barrier() }
    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]) { (**self).broadcast_bytes(root, buf) }
    fn scatter_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) { (**self).scatter_bytes(root, send, recv) }
    fn gather_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) { (**self).gather_bytes(root, send, recv) }
    fn all_gather_bytes(&self, send: &[u8], recv: &mut [u8]) { (**self).all_gather_bytes(send, recv) }
    fn all_to_all_bytes(&self, send: &[u8], recv: &mut [u8]) { (**self).all_to_all_bytes(send, recv) }
}

/// Typed collectives.
///
/// Package sizes are measured in elements rather than bytes, but otherwise
/// these follow the conventions documented on [`Communicator`].
pub trait CommExt: Communicator {
    fn broadcast<T: Pod>(&self, root: usize, buf: &mut [T])
    { self.broadcast_bytes(root, bytemuck::cast_slice_mut(buf)) }

    fn scatter<T: Pod>(&self, root: usize, send: &[T], recv: &mut [T])
    {
        if self.rank() == root {
            assert_eq!(send.len(), recv.len() * self.size(), "scatter: bad send buffer length");
        }
        self.scatter_bytes(root, bytemuck::cast_slice(send), bytemuck::cast_slice_mut(recv))
    }

    fn gather<T: Pod>(&self, root: usize, send: &[T], recv: &mut [T])
    {
        if self.rank() == root {
            assert_eq!(recv.len(), send.len() * self.size(), "gather: bad recv buffer length");
        }
        self.gather_bytes(root, bytemuck::cast_slice(send), bytemuck::cast_slice_mut(recv))
    }

    fn all_gather<T: Pod>(&self, send: &[T], recv: &mut [T])
    {
        assert_eq!(recv.len(), send.len() * self.size(), "all_gather: bad recv buffer length");
        self.all_gather_bytes(bytemuck::cast_slice(send), bytemuck::cast_slice_mut(recv))
    }

    fn all_to_all<T: Pod>(&self, send: &[T], recv: &mut [T])
    {
        assert_eq!(send.len(), recv.len(), "all_to_all: send and recv must have equal length");
        assert_eq!(send.len() % self.size(), 0, "all_to_all: length not divisible by size");
        self.all_to_all_bytes(bytemuck::cast_slice(send), bytemuck::cast_slice_mut(recv))
    }

    /// Broadcast a single value; the argument is ignored on non-root processes.
    fn broadcast_value<T: Pod>(&self, root: usize, value: T) -> T
    {
        let mut buf = [value];
        self.broadcast(root, &mut buf);
        buf[0]
    }

    /// Every process receives the value contributed by each rank, in rank order.
    fn all_gather_value<T: Pod>(&self, value: T) -> Vec<T>
    {
        let mut out = vec![T::zeroed(); self.size()];
        self.all_gather(&[value], &mut out);
        out
    }

    fn all_reduce_max(&self, value: f64) -> f64
    { self.all_gather_value(value).into_iter().fold(::std::f64::NEG_INFINITY, f64::max) }

    /// Sums in rank order, so every process gets a bitwise identical result.
    fn all_reduce_sum(&self, value: f64) -> f64
    { self.all_gather_value(value).into_iter().sum() }
}

impl<C: Communicator + ?Sized> CommExt for C {}

/// True on the process whose rank is `root`.
pub fn this_process_is_root(comm: &(impl Communicator + ?Sized), root: usize) -> bool
{ comm.rank() == root }
