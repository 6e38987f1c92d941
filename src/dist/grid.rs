/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::{Error, Result};
use distla_comm::{Communicator, CommExt};

use std::fmt;

/// An `r x c` arrangement of the processes of a communicator.
///
/// Processes are placed in column-major order: the process of rank `q` in the communicator
/// sits at grid row `q % r` and grid column `q / r`.  Hence the communicator's own rank
/// *is* the "VC" rank (column-major linearization).  The "VR" rank is the row-major
/// linearization, `col + row * c`.
///
/// Construction is collective (it splits the communicator), and the grid is immutable
/// afterwards.  Distributed matrices borrow their grid, and operations combining
/// several matrices require them to borrow the *same* grid (compared by address).
pub struct Grid {
    height: usize,
    width: usize,
    row: usize,
    col: usize,
    vc_comm: Box<dyn Communicator>,
    vr_comm: Box<dyn Communicator>,
    mc_comm: Box<dyn Communicator>,
    mr_comm: Box<dyn Communicator>,
}

impl Grid {
    /// A grid whose shape is as close to square as possible, with `height <= width`.
    pub fn new(comm: impl Communicator + 'static) -> Result<Grid> {
        let height = default_height(comm.size());
        Grid::with_height(comm, height)
    }

    /// A grid with `height` rows; the width is inferred.
    pub fn with_height(comm: impl Communicator + 'static, height: usize) -> Result<Grid> {
        let size = comm.size();
        if height == 0 || size % height != 0 {
            return Err(Error::GridShape { op: "Grid::with_height", rows: height, cols: size / height.max(1), size });
        }
        Grid::build(Box::new(comm), height, size / height)
    }

    /// A grid of an explicit shape.  Fails unless `rows * cols` is the communicator size.
    pub fn with_shape(comm: impl Communicator + 'static, rows: usize, cols: usize) -> Result<Grid> {
        let size = comm.size();
        if rows == 0 || cols == 0 || rows * cols != size {
            return Err(Error::GridShape { op: "Grid::with_shape", rows, cols, size });
        }
        Grid::build(Box::new(comm), rows, cols)
    }

    fn build(vc_comm: Box<dyn Communicator>, height: usize, width: usize) -> Result<Grid> {
        let rank = vc_comm.rank();
        let (row, col) = (rank % height, rank / height);

        // Every process performs these splits in the same order.
        let mc_comm = vc_comm.split(col, row);
        let mr_comm = vc_comm.split(row, col);
        let vr_comm = vc_comm.split(0, col + row * width);

        debug!("grid {}x{}: rank {} at ({}, {})", height, width, rank, row, col);
        Ok(Grid { height, width, row, col, vc_comm, vr_comm, mc_comm, mr_comm })
    }

    /// Number of process rows.
    pub fn height(&self) -> usize { self.height }
    /// Number of process columns.
    pub fn width(&self) -> usize { self.width }
    pub fn size(&self) -> usize { self.height * self.width }

    /// This process's rank; identical to [`Grid::vc_rank`].
    pub fn rank(&self) -> usize { self.vc_comm.rank() }
    /// This process's grid row (its rank in [`Grid::mc_comm`]).
    pub fn row(&self) -> usize { self.row }
    /// This process's grid column (its rank in [`Grid::mr_comm`]).
    pub fn col(&self) -> usize { self.col }
    pub fn vc_rank(&self) -> usize { self.vc_comm.rank() }
    pub fn vr_rank(&self) -> usize { self.vr_comm.rank() }

    /// All processes, ranked column-major.
    pub fn vc_comm(&self) -> &dyn Communicator { &*self.vc_comm }
    /// All processes, ranked row-major.
    pub fn vr_comm(&self) -> &dyn Communicator { &*self.vr_comm }
    /// The processes of this grid column, ranked by grid row.
    pub fn mc_comm(&self) -> &dyn Communicator { &*self.mc_comm }
    /// The processes of this grid row, ranked by grid column.
    pub fn mr_comm(&self) -> &dyn Communicator { &*self.mr_comm }

    /// Grid coordinates `(row, col)` of the process with the given VC rank.
    pub fn coords_of(&self, vc_rank: usize) -> (usize, usize) {
        (vc_rank % self.height, vc_rank / self.height)
    }

    /// VC rank of the process at the given grid coordinates.
    pub fn vc_rank_of(&self, row: usize, col: usize) -> usize { row + col * self.height }

    pub fn vc_to_vr(&self, vc_rank: usize) -> usize {
        let (row, col) = self.coords_of(vc_rank);
        col + row * self.width
    }

    pub fn vr_to_vc(&self, vr_rank: usize) -> usize {
        let (row, col) = (vr_rank / self.width, vr_rank % self.width);
        self.vc_rank_of(row, col)
    }

    /// Synchronize all processes of the grid.
    pub fn barrier(&self) { self.vc_comm.barrier() }

    /// Panics unless every process passes the same value.  Collective.
    ///
    /// This is a diagnostic for collective-protocol violations; see the redistribution
    /// routines, which call it in debug builds.
    pub fn assert_consensus(&self, what: &str, fingerprint: u64) {
        let all = self.vc_comm.all_gather_value(fingerprint);
        if let Some(rank) = all.iter().position(|&x| x != fingerprint) {
            panic!(
                "collective protocol violation in {}: rank {} disagrees with rank {} ({:#x} vs {:#x})",
                what, rank, self.rank(), all[rank], fingerprint,
            );
        }
    }

    pub(crate) fn same_as(&self, other: &Grid) -> bool { std::ptr::eq(self, other) }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("row", &self.row)
            .field("col", &self.col)
            .finish()
    }
}

/// Fails with `GridMismatch` unless both grids are the same object.
pub fn check_same_grid(op: &'static str, a: &Grid, b: &Grid) -> Result<()> {
    match a.same_as(b) {
        true => Ok(()),
        false => Err(Error::GridMismatch { op }),
    }
}

/// The largest divisor of `size` not exceeding `sqrt(size)`.
pub fn default_height(size: usize) -> usize {
    let mut height = (size as f64).sqrt() as usize;
    // correct for rounding in the sqrt
    while (height + 1) * (height + 1) <= size {
        height += 1;
    }
    while height > 1 && size % height != 0 {
        height -= 1;
    }
    height.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use distla_comm::LocalUniverse;

    #[test]
    fn near_square_heights() {
        assert_eq!(default_height(1), 1);
        assert_eq!(default_height(4), 2);
        assert_eq!(default_height(6), 2);
        assert_eq!(default_height(7), 1);
        assert_eq!(default_height(9), 3);
        assert_eq!(default_height(12), 3);
        assert_eq!(default_height(16), 4);
    }

    #[test]
    fn bad_shapes_fail_before_communicating() {
        // a collective would hang if only some processes reached it, so every
        // process must fail here on its own
        let results = LocalUniverse::run(6, |comm| {
            Grid::with_shape(comm, 4, 2).map(|_| ()).unwrap_err()
        });
        for e in results {
            assert_eq!(e, Error::GridShape { op: "Grid::with_shape", rows: 4, cols: 2, size: 6 });
        }

        let results = LocalUniverse::run(6, |comm| Grid::with_height(comm, 4).is_err());
        assert!(results.into_iter().all(|x| x));
    }

    #[test]
    fn communicators_agree_with_coordinates() {
        let results = LocalUniverse::run(6, |comm| {
            let grid = Grid::with_shape(comm, 2, 3).unwrap();
            assert_eq!(grid.mc_comm().size(), 2);
            assert_eq!(grid.mr_comm().size(), 3);
            assert_eq!(grid.mc_comm().rank(), grid.row());
            assert_eq!(grid.mr_comm().rank(), grid.col());
            assert_eq!(grid.vr_rank(), grid.vc_to_vr(grid.vc_rank()));
            assert_eq!(grid.vr_to_vc(grid.vr_rank()), grid.vc_rank());
            assert_eq!(grid.coords_of(grid.rank()), (grid.row(), grid.col()));

            // the column communicator really only contains this grid column
            let cols = grid.mc_comm().all_gather_value(grid.col() as u64);
            assert!(cols.iter().all(|&c| c == grid.col() as u64));
            (grid.row(), grid.col(), grid.vr_rank())
        });
        assert_eq!(results, vec![
            (0, 0, 0), (1, 0, 3),
            (0, 1, 1), (1, 1, 4),
            (0, 2, 2), (1, 2, 5),
        ]);
    }

    #[test]
    fn consensus_passes_when_everyone_agrees() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            grid.assert_consensus("test", 0xdead_beef);
        });
    }

    #[test]
    #[should_panic(expected = "collective protocol violation")]
    fn consensus_catches_disagreement() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let fingerprint = if grid.rank() == 2 { 1 } else { 0 };
            grid.assert_consensus("test", fingerprint);
        });
    }
}
