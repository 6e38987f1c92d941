/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Dense linear algebra on matrices distributed over a two-dimensional grid of processes.
//!
//! This crate gathers the workspace together:
//!
//! * [`comm`] moves bytes between processes (threads, or MPI ranks).
//! * [`local`] has the column-major local matrices and the kernels that run on them.
//! * [`dist`] distributes matrices over a [`Grid`] and redistributes them.
//! * [`blas`] has the blocked algorithms built from the above.
//!
//! It also hosts the `distla-trmm-check` driver.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate failure;

pub use distla_comm as comm;
pub use distla_local as local;
pub use distla_dist as dist;
pub use distla_blas as blas;

pub use crate::dist::{Grid, Scheme, DistMatrix, DistData, DistDataMut, Error, Result};
pub use crate::blas::{AlgoConfig, trmm_lln, trsm_lln, gemm_nn};

pub type FailResult<T> = ::std::result::Result<T, failure::Error>;

pub use crate::config::RunConfig;
mod config;

pub use crate::logging::{GlobalLogger, ColorizedLevel};
mod logging;

pub mod entry_points;
