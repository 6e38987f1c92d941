/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

#![allow(dead_code)]

use distla::comm::LocalUniverse;
use distla::dist::{DistDataMut, DistMatrix, Grid, Scheme};

/// The grid shapes every collective property is checked on.
pub const GRID_SHAPES: &[(usize, usize)] = &[(1, 1), (2, 2), (2, 3), (3, 3)];

/// Run `f` on every rank of each grid shape and collect what rank 0 returned.
pub fn for_each_grid<R: Send>(shapes: &[(usize, usize)], f: impl Fn(&Grid) -> R + Sync) -> Vec<R> {
    shapes.iter().map(|&(rows, cols)| {
        let mut results = LocalUniverse::run(rows * cols, |comm| {
            let grid = Grid::with_shape(comm, rows, cols).unwrap();
            f(&grid)
        });
        results.swap_remove(0)
    }).collect()
}

/// Overwrite every locally stored entry with `f(global_row, global_col)`.  No communication.
pub fn fill_with(matrix: &mut impl DistDataMut<f64>, f: impl Fn(usize, usize) -> f64) {
    let (info, mut local) = matrix.parts_mut();
    for lj in 0..local.width() {
        for li in 0..local.height() {
            local.set(li, lj, f(info.global_row(li), info.global_col(lj)));
        }
    }
}

/// Distinct, exactly representable values, so that data movement can be checked bitwise.
pub fn tag(i: usize, j: usize) -> f64 { (1000 * i + j) as f64 }

pub fn tagged<'g>(grid: &'g Grid, scheme: Scheme, height: usize, width: usize) -> DistMatrix<'g, f64> {
    let mut matrix = DistMatrix::zeros(grid, scheme, height, width);
    fill_with(&mut matrix, tag);
    matrix
}

pub fn random<'g>(grid: &'g Grid, height: usize, width: usize, seed: u64) -> DistMatrix<'g, f64> {
    let mut matrix = DistMatrix::zeros(grid, Scheme::MC_MR, height, width);
    matrix.set_to_random(seed);
    matrix
}
