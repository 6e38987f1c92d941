/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Single-process dense kernels.
//!
//! These are the only places where floating point arithmetic on matrix data happens.
//! They operate purely on local buffers and have no notion of distribution.
//!
//! The loops are simple and ordered for column-major access; there is no packing or SIMD.
//! Shape mismatches are programming errors, and panic.

use crate::{LocalRef, LocalMut, Scalar};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side { Left, Right }

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Uplo { Lower, Upper }

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Orientation {
    Normal,
    Transpose,
    /// Conjugate transpose.
    Adjoint,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Diagonal {
    NonUnit,
    /// The diagonal is implicitly all ones and is never read.
    Unit,
}

impl Orientation {
    /// Dimensions of `op(A)` given the dimensions of `A`.
    pub fn apply_dims(self, (height, width): (usize, usize)) -> (usize, usize) {
        match self {
            Orientation::Normal => (height, width),
            Orientation::Transpose | Orientation::Adjoint => (width, height),
        }
    }
}

impl Uplo {
    /// The triangle occupied by `op(T)` if `T` occupies this one.
    pub fn under(self, orient: Orientation) -> Uplo {
        match (self, orient) {
            (uplo, Orientation::Normal) => uplo,
            (Uplo::Lower, _) => Uplo::Upper,
            (Uplo::Upper, _) => Uplo::Lower,
        }
    }
}

/// Entry `(i, j)` of `op(a)`.
#[inline(always)]
fn op_get<T: Scalar>(a: LocalRef<'_, T>, orient: Orientation, i: usize, j: usize) -> T {
    match orient {
        Orientation::Normal => a.get(i, j),
        Orientation::Transpose => a.get(j, i),
        Orientation::Adjoint => a.get(j, i).conj(),
    }
}

/// Entry `(i, j)` of `op(t)`, honoring a unit diagonal.
/// Only meaningful inside the triangle.
#[inline(always)]
fn tri_get<T: Scalar>(t: LocalRef<'_, T>, orient: Orientation, diag: Diagonal, i: usize, j: usize) -> T {
    match (diag, i == j) {
        (Diagonal::Unit, true) => T::one(),
        _ => op_get(t, orient, i, j),
    }
}

/// `b := alpha b`
pub fn scale<T: Scalar>(alpha: T, b: &mut LocalMut<'_, T>) {
    if alpha == T::one() {
        return;
    }
    if alpha == T::zero() {
        // don't propagate NaN
        b.fill(T::zero());
        return;
    }
    for j in 0..b.width() {
        for x in b.col_mut(j) {
            *x *= alpha;
        }
    }
}

/// `y := alpha x + y`
pub fn axpy<T: Scalar>(alpha: T, x: LocalRef<'_, T>, y: &mut LocalMut<'_, T>) {
    assert_eq!(x.dims(), y.dims(), "axpy: nonconformal");
    for j in 0..x.width() {
        for (dest, &src) in y.col_mut(j).iter_mut().zip(x.col(j)) {
            *dest += alpha * src;
        }
    }
}

/// `c := alpha op_a(a) op_b(b) + beta c`
pub fn gemm<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: LocalRef<'_, T>,
    b: LocalRef<'_, T>,
    beta: T,
    c: &mut LocalMut<'_, T>,
) {
    let (m, k) = orient_a.apply_dims(a.dims());
    let (k_b, n) = orient_b.apply_dims(b.dims());
    assert_eq!(k, k_b, "gemm: inner dimensions differ");
    assert_eq!((m, n), c.dims(), "gemm: output has wrong shape");

    scale(beta, c);
    if alpha == T::zero() || k == 0 {
        return;
    }

    match orient_a {
        Orientation::Normal => {
            // axpy form: c(:, j) += a(:, p) * (alpha * op_b(b)(p, j))
            for j in 0..n {
                for p in 0..k {
                    let coeff = alpha * op_get(b, orient_b, p, j);
                    if coeff == T::zero() {
                        continue;
                    }
                    let a_col = a.col(p);
                    for (dest, &x) in c.col_mut(j).iter_mut().zip(a_col) {
                        *dest += x * coeff;
                    }
                }
            }
        },
        Orientation::Transpose | Orientation::Adjoint => {
            // dot form: c(i, j) += sum_p a(p, i)' * op_b(b)(p, j)
            let conjugate = orient_a == Orientation::Adjoint;
            for j in 0..n {
                for i in 0..m {
                    let a_col = a.col(i);
                    let mut acc = T::zero();
                    for p in 0..k {
                        let x = if conjugate { a_col[p].conj() } else { a_col[p] };
                        acc += x * op_get(b, orient_b, p, j);
                    }
                    c.update(i, j, alpha * acc);
                }
            }
        },
    }
}

/// Triangular multiply, in place.
///
/// * `Side::Left`:  `b := alpha op(t) b`
/// * `Side::Right`: `b := alpha b op(t)`
///
/// Only the `uplo` triangle of `t` is read (and not even its diagonal, for `Diagonal::Unit`).
pub fn trmm<T: Scalar>(
    side: Side,
    uplo: Uplo,
    orient: Orientation,
    diag: Diagonal,
    alpha: T,
    t: LocalRef<'_, T>,
    b: &mut LocalMut<'_, T>,
) {
    let n = check_triangular("trmm", side, t, b);
    let effective = uplo.under(orient);
    let (height, width) = b.dims();

    match side {
        Side::Left => {
            for j in 0..width {
                // Each new entry only depends on entries that have not been overwritten yet,
                // provided we sweep away from the triangle's apex.
                let mut update_row = |i: usize, ks: &mut dyn Iterator<Item=usize>| {
                    let mut acc = T::zero();
                    for k in ks {
                        acc += tri_get(t, orient, diag, i, k) * b.get(k, j);
                    }
                    b.set(i, j, alpha * acc);
                };
                match effective {
                    Uplo::Lower => for i in (0..n).rev() { update_row(i, &mut (0..=i)) },
                    Uplo::Upper => for i in 0..n { update_row(i, &mut (i..n)) },
                }
            }
        },
        Side::Right => {
            let mut column = vec![T::zero(); height];
            let mut update_col = |j: usize, ks: &mut dyn Iterator<Item=usize>| {
                for x in &mut column {
                    *x = T::zero();
                }
                for k in ks {
                    let coeff = tri_get(t, orient, diag, k, j);
                    for (acc, &x) in column.iter_mut().zip(b.col(k)) {
                        *acc += x * coeff;
                    }
                }
                for (dest, &acc) in b.col_mut(j).iter_mut().zip(&column) {
                    *dest = alpha * acc;
                }
            };
            match effective {
                Uplo::Lower => for j in 0..n { update_col(j, &mut (j..n)) },
                Uplo::Upper => for j in (0..n).rev() { update_col(j, &mut (0..=j)) },
            }
        },
    }
}

/// Triangular solve, in place.
///
/// * `Side::Left`:  `b := alpha inv(op(t)) b`
/// * `Side::Right`: `b := alpha b inv(op(t))`
///
/// A zero on a non-unit diagonal is not detected; the result will contain infinities or NaN.
pub fn trsm<T: Scalar>(
    side: Side,
    uplo: Uplo,
    orient: Orientation,
    diag: Diagonal,
    alpha: T,
    t: LocalRef<'_, T>,
    b: &mut LocalMut<'_, T>,
) {
    let n = check_triangular("trsm", side, t, b);
    let effective = uplo.under(orient);
    scale(alpha, b);

    match side {
        Side::Left => {
            for j in 0..b.width() {
                // substitution; entries on the near side of `i` already hold the solution
                let mut solve_row = |i: usize, ks: &mut dyn Iterator<Item=usize>| {
                    let mut acc = b.get(i, j);
                    for k in ks {
                        acc -= tri_get(t, orient, diag, i, k) * b.get(k, j);
                    }
                    if diag == Diagonal::NonUnit {
                        acc = acc / op_get(t, orient, i, i);
                    }
                    b.set(i, j, acc);
                };
                match effective {
                    Uplo::Lower => for i in 0..n { solve_row(i, &mut (0..i)) },
                    Uplo::Upper => for i in (0..n).rev() { solve_row(i, &mut (i + 1..n)) },
                }
            }
        },
        Side::Right => {
            let height = b.height();
            let mut column = vec![T::zero(); height];
            let mut solve_col = |j: usize, ks: &mut dyn Iterator<Item=usize>| {
                column.copy_from_slice(b.col(j));
                for k in ks {
                    let coeff = tri_get(t, orient, diag, k, j);
                    for (acc, &x) in column.iter_mut().zip(b.col(k)) {
                        *acc -= x * coeff;
                    }
                }
                if diag == Diagonal::NonUnit {
                    let pivot = op_get(t, orient, j, j);
                    for acc in &mut column {
                        *acc = *acc / pivot;
                    }
                }
                b.col_mut(j).copy_from_slice(&column);
            };
            match effective {
                Uplo::Lower => for j in (0..n).rev() { solve_col(j, &mut (j + 1..n)) },
                Uplo::Upper => for j in 0..n { solve_col(j, &mut (0..j)) },
            }
        },
    }
}

fn check_triangular<T: Scalar>(name: &str, side: Side, t: LocalRef<'_, T>, b: &LocalMut<'_, T>) -> usize {
    assert_eq!(t.height(), t.width(), "{}: triangular matrix must be square", name);
    let n = match side {
        Side::Left => b.height(),
        Side::Right => b.width(),
    };
    assert_eq!(t.height(), n, "{}: nonconformal", name);
    n
}

/// Zero the entries outside of a trapezoid.
///
/// With `Uplo::Lower`, entries with `j - i > offset` are zeroed;
/// with `Uplo::Upper`, entries with `j - i < offset` are zeroed.
/// An offset of zero keeps the diagonal.
pub fn make_trapezoidal<T: Scalar>(uplo: Uplo, offset: isize, b: &mut LocalMut<'_, T>) {
    let (height, width) = b.dims();
    for j in 0..width {
        for i in 0..height {
            let diff = j as isize - i as isize;
            let keep = match uplo {
                Uplo::Lower => diff <= offset,
                Uplo::Upper => diff >= offset,
            };
            if !keep {
                b.set(i, j, T::zero());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocalMatrix, Complex64};
    use rand::{SeedableRng, rngs::StdRng};

    fn random<T: Scalar>(rng: &mut StdRng, height: usize, width: usize) -> LocalMatrix<T> {
        LocalMatrix::from_fn(height, width, |_, _| T::sample_unit_ball(rng))
    }

    // An explicit (dense) op(T), with the unused triangle zeroed.
    fn explicit_triangle<T: Scalar>(t: &LocalMatrix<T>, uplo: Uplo, orient: Orientation, diag: Diagonal) -> LocalMatrix<T> {
        let mut tri = t.clone();
        make_trapezoidal(uplo, 0, &mut tri.as_local_mut());
        if diag == Diagonal::Unit {
            for i in 0..tri.height() {
                tri[(i, i)] = T::one();
            }
        }
        let n = tri.height();
        LocalMatrix::from_fn(n, n, |i, j| op_get(tri.as_local_ref(), orient, i, j))
    }

    fn all_combos() -> Vec<(Side, Uplo, Orientation, Diagonal)> {
        let mut out = vec![];
        for &side in &[Side::Left, Side::Right] {
            for &uplo in &[Uplo::Lower, Uplo::Upper] {
                for &orient in &[Orientation::Normal, Orientation::Transpose, Orientation::Adjoint] {
                    for &diag in &[Diagonal::NonUnit, Diagonal::Unit] {
                        out.push((side, uplo, orient, diag));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn gemm_matches_definition() {
        let mut rng = StdRng::seed_from_u64(1);
        for &oa in &[Orientation::Normal, Orientation::Transpose, Orientation::Adjoint] {
            for &ob in &[Orientation::Normal, Orientation::Transpose, Orientation::Adjoint] {
                let a: LocalMatrix<Complex64> = match oa {
                    Orientation::Normal => random(&mut rng, 4, 3),
                    _ => random(&mut rng, 3, 4),
                };
                let b: LocalMatrix<Complex64> = match ob {
                    Orientation::Normal => random(&mut rng, 3, 5),
                    _ => random(&mut rng, 5, 3),
                };
                let c0: LocalMatrix<Complex64> = random(&mut rng, 4, 5);
                let (alpha, beta) = (Complex64::new(0.5, -1.0), Complex64::new(2.0, 0.0));

                let expected = LocalMatrix::from_fn(4, 5, |i, j| {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for p in 0..3 {
                        acc += op_get(a.as_local_ref(), oa, i, p) * op_get(b.as_local_ref(), ob, p, j);
                    }
                    alpha * acc + beta * c0[(i, j)]
                });

                let mut c = c0.clone();
                gemm(oa, ob, alpha, a.as_local_ref(), b.as_local_ref(), beta, &mut c.as_local_mut());
                assert_close!(abs=1e-13, c.to_col_major(), expected.to_col_major());
            }
        }
    }

    #[test]
    fn gemm_with_zero_beta_ignores_garbage() {
        let a = LocalMatrix::<f64>::identity(2);
        let b = LocalMatrix::from_col_major(2, 1, vec![1.0, 2.0]);
        let mut c = LocalMatrix::from_col_major(2, 1, vec![::std::f64::NAN, 0.0]);
        gemm(Orientation::Normal, Orientation::Normal, 1.0, a.as_local_ref(), b.as_local_ref(), 0.0, &mut c.as_local_mut());
        assert_eq!(c.to_col_major(), vec![1.0, 2.0]);
    }

    #[test]
    fn trmm_matches_explicit_product() {
        let mut rng = StdRng::seed_from_u64(2);
        for (side, uplo, orient, diag) in all_combos() {
            let t: LocalMatrix<Complex64> = random(&mut rng, 5, 5);
            let b0: LocalMatrix<Complex64> = match side {
                Side::Left => random(&mut rng, 5, 3),
                Side::Right => random(&mut rng, 3, 5),
            };
            let alpha = Complex64::new(-0.5, 0.25);
            let tri = explicit_triangle(&t, uplo, orient, diag);

            let mut expected = b0.clone();
            match side {
                Side::Left => gemm(Orientation::Normal, Orientation::Normal, alpha, tri.as_local_ref(), b0.as_local_ref(), Complex64::new(0.0, 0.0), &mut expected.as_local_mut()),
                Side::Right => gemm(Orientation::Normal, Orientation::Normal, alpha, b0.as_local_ref(), tri.as_local_ref(), Complex64::new(0.0, 0.0), &mut expected.as_local_mut()),
            }

            let mut b = b0.clone();
            trmm(side, uplo, orient, diag, alpha, t.as_local_ref(), &mut b.as_local_mut());
            assert_close!(abs=1e-13, b.to_col_major(), expected.to_col_major(), "{:?}", (side, uplo, orient, diag));
        }
    }

    #[test]
    fn trsm_undoes_trmm() {
        let mut rng = StdRng::seed_from_u64(3);
        for (side, uplo, orient, diag) in all_combos() {
            // diagonally dominant, so the solve is well conditioned
            let mut t: LocalMatrix<f64> = random(&mut rng, 6, 6);
            for i in 0..6 {
                t[(i, i)] += 4.0;
            }
            let b0: LocalMatrix<f64> = match side {
                Side::Left => random(&mut rng, 6, 2),
                Side::Right => random(&mut rng, 2, 6),
            };
            let mut b = b0.clone();
            trmm(side, uplo, orient, diag, 2.0, t.as_local_ref(), &mut b.as_local_mut());
            trsm(side, uplo, orient, diag, 0.5, t.as_local_ref(), &mut b.as_local_mut());
            assert_close!(abs=1e-12, b.to_col_major(), b0.to_col_major(), "{:?}", (side, uplo, orient, diag));
        }
    }

    #[test]
    fn trapezoids() {
        let mut m = LocalMatrix::from_fn(3, 4, |_, _| 1.0);
        make_trapezoidal(Uplo::Upper, 1, &mut m.as_local_mut());
        assert_eq!(m.to_col_major(), vec![
            0.0, 0.0, 0.0,
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
            1.0, 1.0, 1.0,
        ]);

        let mut m = LocalMatrix::from_fn(3, 3, |_, _| 1.0);
        make_trapezoidal(Uplo::Lower, -1, &mut m.as_local_mut());
        assert_eq!(m.to_col_major(), vec![
            0.0, 1.0, 1.0,
            0.0, 0.0, 1.0,
            0.0, 0.0, 0.0,
        ]);
    }
}
