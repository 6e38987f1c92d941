/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::AlgoConfig;
use crate::util::{check_operands, dims_string};
use distla_dist::{Direction, DistData, DistDataMut, DistMatrix, Partition, Result, Scalar, Scheme};
use distla_local::{kernels, Diagonal, Orientation, Side, Uplo};

/// Left Lower Normal triangular multiply: `X := alpha tril(L) X`.
///
/// With `Diagonal::Unit`, the diagonal of `L` is taken to be ones and never read.
/// Only the lower triangle of `L` is read.
///
/// Walks up the diagonal of `L`.  For each diagonal block `L11` and the row panel `X1`
/// beside it,
///
/// * `X1 := L11 X1` locally, after replicating `L11` everywhere and spreading the
///   columns of `X1` over all processes.
/// * `X1 += L10 X0`, where each process multiplies the pieces of `L10` and `X0` it has
///   (after moving `L10` to `[*,MC]` to line up with the rows of `X0`), and the partial
///   products are summed into `X1`.
///
/// Since `X0` is above the current panel it is still unmodified when it is used.
pub fn trmm_lln<T: Scalar>(
    diag: Diagonal,
    alpha: T,
    l: &impl DistData<T>,
    x: &mut impl DistDataMut<T>,
    config: &AlgoConfig,
) -> Result<()> {
    const OP: &str = "trmm_lln";
    let operands = [("L", l as &dyn DistData<T>), ("X", &*x as &dyn DistData<T>)];
    check_operands(OP, config, &operands)?;
    if l.height() != l.width() || l.width() != x.height() {
        return Err(distla_dist::Error::Nonconformal { op: OP, detail: dims_string(&operands) });
    }

    let grid = l.grid();
    let (m, n) = x.dims();
    debug!("{}: {}x{} by {}x{}, blocksize {}", OP, m, m, m, n, config.blocksize);

    let mut l11_star_star = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_STAR);
    let mut l10_star_mc = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_MC);
    let mut x1_star_vr = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_VR);
    let mut d1_star_mr = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_MR);

    x.scale(alpha);
    for step in Partition::new(Direction::DiagonalUp, m, m).steps(config.blocksize)? {
        let (rows0, rows1) = (step.rows(0), step.rows(1));
        trace!("{}: panel {:?}", OP, rows1);

        let l10 = l.view_range(rows1.clone(), rows0.clone())?;
        let l11 = l.view_range(rows1.clone(), rows1.clone())?;

        l10_star_mc.align_with(&x.view_range(rows0.clone(), 0..n)?)?;
        d1_star_mr.align_with(&x.view_range(rows1.clone(), 0..n)?)?;
        d1_star_mr.resize(rows1.len(), n);

        l11_star_star.copy_from(&l11)?;
        x1_star_vr.copy_from(&x.view_range(rows1.clone(), 0..n)?)?;
        kernels::trmm(
            Side::Left, Uplo::Lower, Orientation::Normal, diag,
            T::one(), l11_star_star.local(), &mut x1_star_vr.local_mut(),
        );
        x.view_range_mut(rows1.clone(), 0..n)?.redistribute_from(&x1_star_vr)?;

        l10_star_mc.copy_from(&l10)?;
        kernels::gemm(
            Orientation::Normal, Orientation::Normal,
            T::one(), l10_star_mc.local(), x.view_range(rows0, 0..n)?.local(),
            T::zero(), &mut d1_star_mr.local_mut(),
        );
        x.view_range_mut(rows1, 0..n)?.sum_scatter_update(T::one(), &d1_star_mr)?;

        l10_star_mc.empty();
        d1_star_mr.empty();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{for_each_grid, random_matrix};
    use distla_dist::{Error, Grid, LocalUniverse};

    fn check_against_local(grid: &Grid, m: usize, n: usize, blocksize: usize, diag: Diagonal) {
        let l = random_matrix::<f64>(grid, m, m, 10);
        let mut x = random_matrix::<f64>(grid, m, n, 20);
        let (l_full, x_full) = (l.to_local_matrix(), x.to_local_matrix());

        trmm_lln(diag, 0.5, &l, &mut x, &AlgoConfig::with_blocksize(blocksize)).unwrap();

        let mut expected = x_full.clone();
        kernels::trmm(Side::Left, Uplo::Lower, Orientation::Normal, diag, 0.5, l_full.as_local_ref(), &mut expected.as_local_mut());
        assert_close!(abs=1e-13, x.to_local_matrix().to_col_major(), expected.to_col_major());
    }

    #[test]
    fn matches_local_trmm() {
        for_each_grid(&[(1, 1), (2, 2), (2, 3)], |grid| {
            for &blocksize in &[1, 3, 16] {
                check_against_local(grid, 7, 5, blocksize, Diagonal::NonUnit);
                check_against_local(grid, 7, 5, blocksize, Diagonal::Unit);
            }
        });
    }

    #[test]
    fn empty_operands() {
        for_each_grid(&[(2, 2)], |grid| {
            check_against_local(grid, 0, 3, 2, Diagonal::NonUnit);
            check_against_local(grid, 4, 0, 2, Diagonal::NonUnit);
        });
    }

    #[test]
    fn preconditions() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let l = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 3, 4);
            let mut x = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 4, 2);
            let config = AlgoConfig::default();
            match trmm_lln(Diagonal::Unit, 1.0, &l, &mut x, &config) {
                Err(Error::Nonconformal { op: "trmm_lln", detail }) => {
                    assert_eq!(detail, "L ~ 3x4, X ~ 4x2");
                },
                other => panic!("{:?}", other),
            }

            let l = DistMatrix::<f64>::zeros(&grid, Scheme::STAR_STAR, 4, 4);
            let err = trmm_lln(Diagonal::Unit, 1.0, &l, &mut x, &config).unwrap_err();
            assert!(err.is_recoverable());

            let l = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 4, 4);
            assert!(trmm_lln(Diagonal::Unit, 1.0, &l, &mut x, &AlgoConfig::with_blocksize(0)).is_err());
        });
    }
}
