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
use distla_local::{kernels, Orientation};

/// General multiply: `C := alpha A B + beta C`.
///
/// Stationary-C outer products.  For each block of the inner dimension, the column
/// panel `A1` is spread over process rows as `[MC,*]` and the row panel `B1` over
/// process columns as `[*,MR]`, which makes `A1 B1` a local rank-`nb` update of
/// every process's piece of `C`.
pub fn gemm_nn<T: Scalar>(
    alpha: T,
    a: &impl DistData<T>,
    b: &impl DistData<T>,
    beta: T,
    c: &mut impl DistDataMut<T>,
    config: &AlgoConfig,
) -> Result<()> {
    const OP: &str = "gemm_nn";
    let operands = [
        ("A", a as &dyn DistData<T>),
        ("B", b as &dyn DistData<T>),
        ("C", &*c as &dyn DistData<T>),
    ];
    check_operands(OP, config, &operands)?;
    if a.width() != b.height() || a.height() != c.height() || b.width() != c.width() {
        return Err(distla_dist::Error::Nonconformal { op: OP, detail: dims_string(&operands) });
    }

    let grid = a.grid();
    let (m, k, n) = (a.height(), a.width(), b.width());
    debug!("{}: {}x{} by {}x{}, blocksize {}", OP, m, k, k, n, config.blocksize);

    let mut a1_mc_star = DistMatrix::<T>::with_scheme(grid, Scheme::MC_STAR);
    let mut b1_star_mr = DistMatrix::<T>::with_scheme(grid, Scheme::STAR_MR);

    c.scale(beta);
    for step in Partition::new(Direction::Right, m, k).steps(config.blocksize)? {
        let inner = step.cols(1);
        trace!("{}: panel {:?}", OP, inner);

        a1_mc_star.align_with(&*c)?;
        b1_star_mr.align_with(&*c)?;
        a1_mc_star.copy_from(&a.view_range(0..m, inner.clone())?)?;
        b1_star_mr.copy_from(&b.view_range(inner, 0..n)?)?;

        kernels::gemm(
            Orientation::Normal, Orientation::Normal,
            alpha, a1_mc_star.local(), b1_star_mr.local(),
            T::one(), &mut c.local_mut(),
        );

        a1_mc_star.empty();
        b1_star_mr.empty();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{for_each_grid, random_matrix};
    use distla_dist::{Error, Grid, LocalUniverse};
    use distla_local::Complex64;

    #[test]
    fn matches_local_gemm() {
        for_each_grid(&[(1, 1), (2, 2), (2, 3)], |grid| {
            for &blocksize in &[1, 4, 32] {
                let a = random_matrix::<f64>(grid, 6, 9, 1);
                let b = random_matrix::<f64>(grid, 9, 5, 2);
                let mut c = random_matrix::<f64>(grid, 6, 5, 3);
                let mut expected = c.to_local_matrix();
                kernels::gemm(
                    Orientation::Normal, Orientation::Normal,
                    2.0, a.to_local_matrix().as_local_ref(), b.to_local_matrix().as_local_ref(),
                    -1.0, &mut expected.as_local_mut(),
                );

                gemm_nn(2.0, &a, &b, -1.0, &mut c, &AlgoConfig::with_blocksize(blocksize)).unwrap();
                assert_close!(abs=1e-13, c.to_local_matrix().to_col_major(), expected.to_col_major());
            }
        });
    }

    #[test]
    fn complex_entries() {
        for_each_grid(&[(2, 2)], |grid| {
            let a = random_matrix::<Complex64>(grid, 5, 3, 4);
            let b = random_matrix::<Complex64>(grid, 3, 4, 5);
            let mut c = DistMatrix::<Complex64>::zeros(grid, Scheme::MC_MR, 5, 4);
            let alpha = Complex64::new(0.0, 1.0);
            let mut expected = c.to_local_matrix();
            kernels::gemm(
                Orientation::Normal, Orientation::Normal,
                alpha, a.to_local_matrix().as_local_ref(), b.to_local_matrix().as_local_ref(),
                Complex64::new(0.0, 0.0), &mut expected.as_local_mut(),
            );

            gemm_nn(alpha, &a, &b, Complex64::new(0.0, 0.0), &mut c, &AlgoConfig::with_blocksize(2)).unwrap();
            assert_close!(abs=1e-13, c.to_local_matrix().to_col_major(), expected.to_col_major());
        });
    }

    #[test]
    fn empty_inner_dimension_only_scales() {
        for_each_grid(&[(2, 2)], |grid| {
            let a = DistMatrix::<f64>::zeros(grid, Scheme::MC_MR, 4, 0);
            let b = DistMatrix::<f64>::zeros(grid, Scheme::MC_MR, 0, 3);
            let mut c = random_matrix::<f64>(grid, 4, 3, 6);
            let expected: Vec<_> = c.to_local_matrix().to_col_major().iter().map(|x| 3.0 * x).collect();

            gemm_nn(1.0, &a, &b, 3.0, &mut c, &AlgoConfig::default()).unwrap();
            assert_close!(abs=1e-14, c.to_local_matrix().to_col_major(), expected);
        });
    }

    #[test]
    fn nonconformal() {
        LocalUniverse::run(2, |comm| {
            let grid = Grid::new(comm).unwrap();
            let a = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 2, 3);
            let b = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 2, 3);
            let mut c = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 2, 3);
            match gemm_nn(1.0, &a, &b, 0.0, &mut c, &AlgoConfig::default()) {
                Err(Error::Nonconformal { op: "gemm_nn", detail }) => {
                    assert_eq!(detail, "A ~ 2x3, B ~ 2x3, C ~ 2x3");
                },
                other => panic!("{:?}", other),
            }
        });
    }
}
