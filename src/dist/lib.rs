/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Dense matrices distributed over a two-dimensional grid of processes.
//!
//! * [`Grid`] arranges the processes of a communicator into rows and columns.
//! * [`Scheme`] says how the entries of a matrix are assigned to processes, as a pair of
//!   per-index [`Dist`]ributions.
//! * [`DistMatrix`] holds this process's share of a matrix.  [`DistRef`] and [`DistMut`]
//!   are views of submatrices, and the [`DistData`]/[`DistDataMut`] traits are
//!   implemented by all three.
//! * [`redist`] converts between schemes; this is where all the communication happens.
//! * [`Partition`] walks a matrix panel by panel, for writing blocked algorithms.
//!
//! Everything is SPMD: each process runs the same program on its own `DistMatrix`
//! objects, and every collective operation must be called by all processes of the grid
//! in the same order.

#[macro_use]
extern crate log;

#[macro_use]
mod error;
pub use crate::error::{Error, ErrorKind, Result};

pub use crate::grid::{Grid, check_same_grid, default_height};
mod grid;

pub use crate::dist::{Dist, Scheme, DistInfo, length, max_length, shift};
mod dist;

pub use crate::matrix::{DistData, DistDataMut, DistMatrix, DistRef, DistMut, axpy};
mod matrix;

pub use crate::partition::{Direction, Partition, Step, Steps};
mod partition;

pub use crate::redist::{redistribute, sum_scatter_update, Path};
pub mod redist;

pub use distla_comm::{Communicator, CommExt, LocalComm, LocalUniverse};
pub use distla_local::Scalar;
