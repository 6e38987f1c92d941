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

/// Left Lower Normal triangular solve: `X := alpha inv(tril(L)) X`.
///
/// Walks down the diagonal of `L`.  Each panel `X1` is solved against the replicated
/// diagonal block `L11` with its columns spread over all processes, after which the
/// rows below are updated with `X2 -= L21 X1`, using `L21` as `[MC,*]` and `X1` as
/// `[*,MR]` so that the update is purely local.
///
/// A singular `L` is not detected.
pub fn trsm_lln<T: Scalar>(
    diag: Diagonal,
    alpha: T,
    l: &impl DistData<T>,
    x: &mut impl DistDataMut<T>,
    config: &AlgoConfig,
) -> Result<()> {
    const OP: &str = "trsm_lln";
    let operands = [("L", l as &dyn DistData<T>), ("X", &*x as &dyn DistData<T>)];
    check_operands(OP, config, &operands)?;
    if l.height() != l.width() || l.width() != x.height() {
        return Err(distla_dist::Error::Nonconformal { op: OP, detail: dims_string(&operands) });
    }

    let grid = l.grid();
    let (m, n) = x.dims();
    debug!("{}: {}x{} by {}x{}, blocksize {}", OP, m, m, m, n, config.blocksize);

    let mut l11_star_star = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_STAR);
    let mut l21_mc_star = DistMatrix::<T>::with_scheme(grid, Scheme::MC_STAR);
    let mut x1_star_vr = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_VR);
    let mut x1_star_mr = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_MR);

    x.scale(alpha);
    for step in Partition::new(Direction::DiagonalDown, m, m).steps(config.blocksize)? {
        let (rows1, rows2) = (step.rows(1), step.rows(2));
        trace!("{}: panel {:?}", OP, rows1);

        let l11 = l.view_range(rows1.clone(), rows1.clone())?;
        let l21 = l.view_range(rows2.clone(), rows1.clone())?;

        l21_mc_star.align_with(&x.view_range(rows2.clone(), 0..n)?)?;
        x1_star_mr.align_with(&x.view_range(rows2.clone(), 0..n)?)?;

        // X1 := inv(L11) X1
        l11_star_star.copy_from(&l11)?;
        x1_star_vr.copy_from(&x.view_range(rows1.clone(), 0..n)?)?;
        kernels::trsm(
            Side::Left, Uplo::Lower, Orientation::Normal, diag,
            T::one(), l11_star_star.local(), &mut x1_star_vr.local_mut(),
        );
        x1_star_mr.copy_from(&x1_star_vr)?;
        x.view_range_mut(rows1, 0..n)?.redistribute_from(&x1_star_vr)?;

        // X2 -= L21 X1
        l21_mc_star.copy_from(&l21)?;
        kernels::gemm(
            Orientation::Normal, Orientation::Normal,
            -T::one(), l21_mc_star.local(), x1_star_mr.local(),
            T::one(), &mut x.view_range_mut(rows2, 0..n)?.local_mut(),
        );

        l21_mc_star.empty();
        x1_star_mr.empty();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{for_each_grid, random_matrix};
    use crate::trmm_lln;
    use distla_dist::{Error, Grid, LocalUniverse};

    // a lower triangle that is comfortably invertible
    fn well_conditioned_lower(grid: &Grid, m: usize) -> DistMatrix<'_, f64> {
        let mut l = random_matrix::<f64>(grid, m, m, 30);
        l.make_trapezoidal(Uplo::Lower, 0);
        let mut shift = DistMatrix::<f64>::with_scheme(grid, Scheme::MC_MR);
        shift.resize(m, m);
        shift.set_to_identity();
        distla_dist::axpy(4.0, &shift, &mut l).unwrap();
        l
    }

    #[test]
    fn undoes_trmm() {
        for_each_grid(&[(1, 1), (2, 2), (3, 2)], |grid| {
            for &blocksize in &[1, 4, 9] {
                for &diag in &[Diagonal::NonUnit, Diagonal::Unit] {
                    let l = well_conditioned_lower(grid, 9);
                    let mut x = random_matrix::<f64>(grid, 9, 4, 40);
                    let original = x.to_local_matrix();

                    let config = AlgoConfig::with_blocksize(blocksize);
                    trmm_lln(diag, 2.0, &l, &mut x, &config).unwrap();
                    trsm_lln(diag, 0.5, &l, &mut x, &config).unwrap();
                    assert_close!(abs=1e-10, x.to_local_matrix().to_col_major(), original.to_col_major());
                }
            }
        });
    }

    #[test]
    fn matches_local_trsm() {
        for_each_grid(&[(2, 3)], |grid| {
            let l = well_conditioned_lower(grid, 8);
            let mut x = random_matrix::<f64>(grid, 8, 3, 50);
            let (l_full, mut expected) = (l.to_local_matrix(), x.to_local_matrix());
            kernels::trsm(Side::Left, Uplo::Lower, Orientation::Normal, Diagonal::NonUnit, -1.5, l_full.as_local_ref(), &mut expected.as_local_mut());

            trsm_lln(Diagonal::NonUnit, -1.5, &l, &mut x, &AlgoConfig::with_blocksize(3)).unwrap();
            assert_close!(abs=1e-12, x.to_local_matrix().to_col_major(), expected.to_col_major());
        });
    }

    #[test]
    fn mismatched_grids() {
        let results = LocalUniverse::run(4, |comm| {
            let grid_a = Grid::new(comm).unwrap();
            let comm_b = distla_dist::Communicator::split(grid_a.vc_comm(), 0, grid_a.rank());
            let grid_b = Grid::new(comm_b).unwrap();
            let l = DistMatrix::<f64>::zeros(&grid_a, Scheme::MC_MR, 3, 3);
            let mut x = DistMatrix::<f64>::zeros(&grid_b, Scheme::MC_MR, 3, 3);
            trsm_lln(Diagonal::Unit, 1.0, &l, &mut x, &AlgoConfig::default()).unwrap_err()
        });
        for e in results {
            assert_eq!(e, Error::GridMismatch { op: "trsm_lln" });
        }
    }
}
