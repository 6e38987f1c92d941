/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Blocked algorithms on `[MC,MR]` matrices.
//!
//! All of these follow one pattern.  A [`Partition`](distla_dist::Partition) walks the
//! operands panel by panel; each panel is redistributed into whatever layout lets a
//! local kernel do the arithmetic without communicating, and the result is moved back
//! (or summed back, with `sum_scatter_update`) before the cursor advances.
//!
//! The panel size comes from an explicit [`AlgoConfig`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[cfg(test)]
#[macro_use]
extern crate distla_assert_close;

pub use crate::config::AlgoConfig;
mod config;

pub use crate::trmm::trmm_lln;
mod trmm;

pub use crate::trsm::trsm_lln;
mod trsm;

pub use crate::gemm::gemm_nn;
mod gemm;

mod util;

#[cfg(test)]
mod test_util;

pub use distla_local::{Diagonal, Orientation, Side, Uplo};
