/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! `Communicator` over a real MPI communicator.
//!
//! Everything is sent as `u8` so that the element type never needs an `mpi::Equivalence` impl.

use crate::Communicator;

use ::mpi::traits::*;
use ::mpi::topology::{Color, SystemCommunicator, UserCommunicator};

pub struct MpiComm {
    inner: Inner,
}

enum Inner {
    World(SystemCommunicator),
    User(UserCommunicator),
}

// `mpi::Communicator` is not object safe, so we dispatch by hand.
macro_rules! with_comm {
    ($self:expr, |$c:ident| $body:expr) => {
        match &$self.inner {
            Inner::World($c) => $body,
            Inner::User($c) => $body,
        }
    };
}

impl MpiComm {
    /// Initialize MPI and run `func` with a communicator over `MPI_COMM_WORLD`.
    ///
    /// MPI is finalized when this returns.  Returns `None` if MPI was already initialized.
    pub fn with_world<R>(func: impl FnOnce(MpiComm) -> R) -> Option<R> {
        let universe = ::mpi::initialize()?;
        let comm = MpiComm { inner: Inner::World(universe.world()) };
        Some(func(comm))
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize { with_comm!(self, |c| c.rank() as usize) }
    fn size(&self) -> usize { with_comm!(self, |c| c.size() as usize) }

    fn split(&self, color: usize, key: usize) -> Box<dyn Communicator> {
        let color = Color::with_value(color as i32);
        let sub = with_comm!(self, |c| c.split_by_color_with_key(color, key as i32));
        let sub = sub.expect("MPI_Comm_split with a defined color returned no communicator");
        Box::new(MpiComm { inner: Inner::User(sub) })
    }

    fn barrier(&self) { with_comm!(self, |c| c.barrier()) }

    fn broadcast_bytes(&self, root: usize, buf: &mut [u8]) {
        with_comm!(self, |c| c.process_at_rank(root as i32).broadcast_into(buf))
    }

    fn scatter_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) {
        with_comm!(self, |c| {
            let root_process = c.process_at_rank(root as i32);
            if c.rank() as usize == root {
                root_process.scatter_into_root(send, recv);
            } else {
                root_process.scatter_into(recv);
            }
        })
    }

    fn gather_bytes(&self, root: usize, send: &[u8], recv: &mut [u8]) {
        with_comm!(self, |c| {
            let root_process = c.process_at_rank(root as i32);
            if c.rank() as usize == root {
                root_process.gather_into_root(send, recv);
            } else {
                root_process.gather_into(send);
            }
        })
    }

    fn all_gather_bytes(&self, send: &[u8], recv: &mut [u8]) {
        with_comm!(self, |c| c.all_gather_into(send, recv))
    }

    fn all_to_all_bytes(&self, send: &[u8], recv: &mut [u8]) {
        with_comm!(self, |c| c.all_to_all_into(send, recv))
    }
}
