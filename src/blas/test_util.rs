/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use distla_dist::{DistDataMut, DistMatrix, Grid, LocalUniverse, Scalar, Scheme};

/// Run `f` on every rank of each grid shape, with threads standing in for processes.
pub(crate) fn for_each_grid(shapes: &[(usize, usize)], f: impl Fn(&Grid) + Sync) {
    for &(rows, cols) in shapes {
        LocalUniverse::run(rows * cols, |comm| {
            let grid = Grid::with_shape(comm, rows, cols).unwrap();
            f(&grid);
        });
    }
}

/// An `[MC,MR]` matrix of random entries that do not depend on the grid.
pub(crate) fn random_matrix<T: Scalar>(grid: &Grid, height: usize, width: usize, seed: u64) -> DistMatrix<'_, T> {
    let mut matrix = DistMatrix::zeros(grid, Scheme::MC_MR, height, width);
    matrix.set_to_random(seed);
    matrix
}
