/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use num_complex::Complex;
use rand::Rng;

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// The capabilities required of a matrix element.
///
/// Implemented for `f32`, `f64`, `Complex<f32>` and `Complex<f64>`.
///
/// `Pod` is required so that elements can be packed into the byte buffers
/// that travel between processes.
pub trait Scalar
    : Copy + PartialEq + Default + fmt::Debug + Send + Sync + 'static
    + bytemuck::Pod
    + Add<Output=Self> + Sub<Output=Self> + Mul<Output=Self> + Div<Output=Self> + Neg<Output=Self>
    + AddAssign + SubAssign + MulAssign
{
    const IS_COMPLEX: bool;

    fn zero() -> Self;
    fn one() -> Self;
    fn from_f64(x: f64) -> Self;

    /// Complex conjugate.  The identity for real types.
    fn conj(self) -> Self;

    /// Absolute value (modulus), widened to `f64`.
    fn abs(self) -> f64;

    /// Machine epsilon of the underlying real type.
    fn epsilon() -> f64;

    /// A sample drawn uniformly from the unit ball (`[-1, 1)` for real types,
    /// the unit disc for complex types).
    fn sample_unit_ball<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

macro_rules! impl_real_scalar {
    ($($R:ident)*) => {$(
        impl Scalar for $R {
            const IS_COMPLEX: bool = false;

            #[inline(always)] fn zero() -> Self { 0.0 }
            #[inline(always)] fn one() -> Self { 1.0 }
            #[inline(always)] fn from_f64(x: f64) -> Self { x as $R }
            #[inline(always)] fn conj(self) -> Self { self }
            #[inline(always)] fn abs(self) -> f64 { $R::abs(self) as f64 }
            fn epsilon() -> f64 { <$R>::EPSILON as f64 }

            fn sample_unit_ball<G: Rng + ?Sized>(rng: &mut G) -> Self
            { rng.gen_range(-1.0..1.0) }
        }
    )*};
}

macro_rules! impl_complex_scalar {
    ($($R:ident)*) => {$(
        impl Scalar for Complex<$R> {
            const IS_COMPLEX: bool = true;

            #[inline(always)] fn zero() -> Self { Complex::new(0.0, 0.0) }
            #[inline(always)] fn one() -> Self { Complex::new(1.0, 0.0) }
            #[inline(always)] fn from_f64(x: f64) -> Self { Complex::new(x as $R, 0.0) }
            #[inline(always)] fn conj(self) -> Self { Complex::conj(&self) }
            #[inline(always)] fn abs(self) -> f64 { self.norm() as f64 }
            fn epsilon() -> f64 { <$R>::EPSILON as f64 }

            fn sample_unit_ball<G: Rng + ?Sized>(rng: &mut G) -> Self {
                // rejection sampling; accepts with probability pi/4
                loop {
                    let re: $R = rng.gen_range(-1.0..1.0);
                    let im: $R = rng.gen_range(-1.0..1.0);
                    if re * re + im * im < 1.0 {
                        return Complex::new(re, im);
                    }
                }
            }
        }
    )*};
}

impl_real_scalar! { f32 f64 }
impl_complex_scalar! { f32 f64 }
