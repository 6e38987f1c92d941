/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Everything that happens on a single process.
//!
//! * [`Scalar`], the capabilities required of a matrix element.
//! * [`LocalMatrix`], an owned column-major buffer, and the borrowed views [`LocalRef`]/[`LocalMut`].
//! * [`kernels`], the dense kernels (gemm, trmm, trsm, ...) that blocked algorithms call
//!   on their local data.  These know nothing about distribution.

#[cfg(test)]
#[macro_use]
extern crate distla_assert_close;

pub use crate::scalar::Scalar;
mod scalar;

pub use crate::matrix::{LocalMatrix, LocalRef, LocalMut, LocalRef_};
mod matrix;

pub use crate::kernels::{Side, Uplo, Orientation, Diagonal};
pub mod kernels;

pub use num_complex::Complex;
pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;
