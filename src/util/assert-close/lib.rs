/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Approximate equality assertions for test code.
//!
//! ```ignore
//! assert_close!(computed, expected);
//! assert_close!(abs=1e-12, computed, expected);
//! assert_close!(rel=1e-6, abs=1e-12, computed, expected, "in column {}", j);
//! ```
//!
//! Values compare equal when `|a - b| <= max(abs, rel * |a|, rel * |b|)`,
//! where `|.|` is the modulus for complex values.
//! Sequences compare elementwise and must have equal length.

use num_complex::Complex;
use std::fmt;

pub const DEFAULT_REL_TOL: f64 = 1e-9;
pub const DEFAULT_ABS_TOL: f64 = 0.0;

#[macro_export]
macro_rules! assert_close {
    ($($t:tt)*) => {
        $crate::__assert_close_impl!{
            @parsing [$($t)*]
            [[@rel $crate::DEFAULT_REL_TOL] [@abs $crate::DEFAULT_ABS_TOL]]
        }
    };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            $crate::assert_close!{$($t)*}
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_close_impl {
    (@parsing [rel=$tol:expr, $($rest:tt)*] [$($assignment:tt)*]) => {
        $crate::__assert_close_impl!(@parsing [$($rest)*] [$($assignment)* [@rel $tol]]);
    };
    (@parsing [abs=$tol:expr, $($rest:tt)*] [$($assignment:tt)*]) => {
        $crate::__assert_close_impl!(@parsing [$($rest)*] [$($assignment)* [@abs $tol]]);
    };
    (@parsing [$a:expr, $b:expr $(,)*] $assignments:tt) => {
        $crate::__assert_close_impl!(@expand $assignments [$a, $b] ["values are not close"])
    };
    (@parsing [$a:expr, $b:expr, $($fmt:tt)+] $assignments:tt) => {
        $crate::__assert_close_impl!(@expand $assignments [$a, $b] [$($fmt)+])
    };
    (@expand [$([@$which:ident $tol:expr])*] [$a:expr, $b:expr] [$($fmt:tt)+]) => {
        #[allow(unused_mut, unused_assignments)]
        {
            let (a, b) = (&$a, &$b);
            let mut tol = $crate::Tolerances::default();
            $( $crate::__assert_close_impl!(@assign tol $which $tol); )*

            if let Err(e) = $crate::CheckClose::check_close(a, b, tol) {
                panic!("{}: {}", format!($($fmt)+), e);
            }
        }
    };
    (@assign $tol:ident rel $value:expr) => { $tol.rel = $value; };
    (@assign $tol:ident abs $value:expr) => { $tol.abs = $value; };
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self { Tolerances { abs: DEFAULT_ABS_TOL, rel: DEFAULT_REL_TOL } }
}

impl Tolerances {
    /// Is `dist` acceptable as the distance between values of the given magnitudes?
    pub fn accepts(&self, dist: f64, magnitude_a: f64, magnitude_b: f64) -> bool {
        assert!(self.rel >= 0.0 && self.abs >= 0.0, "negative tolerance");
        if dist.is_nan() {
            return false;
        }
        dist <= self.abs.max(self.rel * magnitude_a).max(self.rel * magnitude_b)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckCloseError {
    #[error("lengths differ ({left} vs {right})")]
    Length { left: usize, right: usize },

    #[error("{}mismatch (tol: {tol:?})\n  left: {left}\n right: {right}", index_prefix(.index))]
    Value { index: Option<usize>, left: String, right: String, tol: Tolerances },
}

fn index_prefix(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!("at index {}: ", index),
        None => String::new(),
    }
}

pub trait CheckClose<Rhs: ?Sized = Self> {
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError>;
}

fn check_scalar<T: fmt::Debug + PartialEq>(a: &T, b: &T, dist: f64, mag_a: f64, mag_b: f64, tol: Tolerances) -> Result<(), CheckCloseError> {
    let ok = match () {
        // matching infinities
        _ if a == b => true,
        // an infinite relative tolerance would accept anything
        _ if mag_a.is_infinite() || mag_b.is_infinite() => false,
        _ => tol.accepts(dist, mag_a, mag_b),
    };
    match ok {
        true => Ok(()),
        false => Err(CheckCloseError::Value {
            index: None,
            left: format!("{:?}", a),
            right: format!("{:?}", b),
            tol,
        }),
    }
}

macro_rules! impl_real {
    ($($R:ty),*) => {$(
        impl CheckClose for $R {
            fn check_close(&self, other: &$R, tol: Tolerances) -> Result<(), CheckCloseError> {
                let (a, b) = (*self as f64, *other as f64);
                check_scalar(self, other, (a - b).abs(), a.abs(), b.abs(), tol)
            }
        }

        impl CheckClose for Complex<$R> {
            fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError> {
                let dist = (*self - *other).norm() as f64;
                check_scalar(self, other, dist, self.norm() as f64, other.norm() as f64, tol)
            }
        }
    )*};
}

impl_real!(f32, f64);

impl<'a, A: ?Sized + CheckClose<B>, B: ?Sized> CheckClose<&'a B> for &'a A {
    fn check_close(&self, other: &&'a B, tol: Tolerances) -> Result<(), CheckCloseError> {
        (**self).check_close(*other, tol)
    }
}

impl<T: CheckClose> CheckClose for [T] {
    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError> {
        if self.len() != other.len() {
            return Err(CheckCloseError::Length { left: self.len(), right: other.len() });
        }
        for (i, (a, b)) in self.iter().zip(other).enumerate() {
            a.check_close(b, tol).map_err(|e| match e {
                CheckCloseError::Value { index: None, left, right, tol } => {
                    CheckCloseError::Value { index: Some(i), left, right, tol }
                },
                e => e,
            })?;
        }
        Ok(())
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    fn check_close(&self, other: &Vec<T>, tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}

impl<T: CheckClose> CheckClose<[T]> for Vec<T> {
    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(other, tol)
    }
}

impl<T: CheckClose, const N: usize> CheckClose for [T; N] {
    fn check_close(&self, other: &[T; N], tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}
