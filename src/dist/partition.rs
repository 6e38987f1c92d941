/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Traversal of a matrix in panels, for blocked algorithms.
//!
//! A [`Partition`] tracks how much of a matrix has been processed.  Each
//! [`Partition::repartition`] carves the next panel out of the unprocessed region,
//! returning a [`Step`] that describes the three bands
//!
//! ```text
//!   Down / Up           Right / Left          DiagonalDown / DiagonalUp
//!
//!   +-----+             +---+---+---+         +----+----+----+
//!   |  0  |             |   |   |   |         | 00 | 01 | 02 |
//!   +-----+             |   |   |   |         +----+----+----+
//!   |  1  |  (panel)    | 0 | 1 | 2 |         | 10 | 11 | 12 |
//!   +-----+             |   |   |   |         +----+----+----+
//!   |  2  |             |   |   |   |         | 20 | 21 | 22 |
//!   +-----+             +---+---+---+         +----+----+----+
//! ```
//!
//! Bands are always numbered in spatial order (top to bottom, left to right), whatever
//! the direction of travel.  When moving down or right, band 0 is the processed region;
//! when moving up or left, band 2 is.
//!
//! Steps are plain index ranges; views of actual matrices are taken from them only when
//! needed, so a step never holds a borrow.

use crate::Result;

use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Row panels, top to bottom.
    Down,
    /// Row panels, bottom to top.
    Up,
    /// Column panels, left to right.
    Right,
    /// Column panels, right to left.
    Left,
    /// Diagonal blocks, top-left to bottom-right.
    DiagonalDown,
    /// Diagonal blocks, bottom-right to top-left.
    DiagonalUp,
}

impl Direction {
    fn splits_rows(self) -> bool {
        match self {
            Direction::Right | Direction::Left => false,
            _ => true,
        }
    }

    fn splits_cols(self) -> bool {
        match self {
            Direction::Down | Direction::Up => false,
            _ => true,
        }
    }

    fn is_forward(self) -> bool {
        match self {
            Direction::Down | Direction::Right | Direction::DiagonalDown => true,
            Direction::Up | Direction::Left | Direction::DiagonalUp => false,
        }
    }
}

/// The state of a blocked traversal of a `rows x cols` matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    direction: Direction,
    rows: usize,
    cols: usize,
    done: usize,
}

/// One panel of a traversal.
///
/// Row band `k` is `rows(k)` and column band `l` is `cols(l)`.  For a direction that
/// only splits rows, every column band but the middle one is empty (and vice versa),
/// so that `block(k, l)` is meaningful for every direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    direction: Direction,
    row_splits: [usize; 4],
    col_splits: [usize; 4],
}

impl Partition {
    pub fn new(direction: Direction, rows: usize, cols: usize) -> Partition {
        Partition { direction, rows, cols, done: 0 }
    }

    pub fn direction(&self) -> Direction { self.direction }

    /// Total length of the traversal: the number of rows, columns, or diagonal entries.
    ///
    /// Diagonal traversals of a non-square matrix cover the leading `min(rows, cols)`
    /// square anchored at the top-left corner.
    pub fn extent(&self) -> usize {
        match (self.direction.splits_rows(), self.direction.splits_cols()) {
            (true, true) => self.rows.min(self.cols),
            (true, false) => self.rows,
            (false, _) => self.cols,
        }
    }

    /// How much has been processed.
    pub fn processed(&self) -> usize { self.done }

    pub fn remaining(&self) -> usize { self.extent() - self.done }

    pub fn is_done(&self) -> bool { self.remaining() == 0 }

    /// Carve the next panel, of size `min(blocksize, remaining)`, without advancing.
    pub fn repartition(&self, blocksize: usize) -> Result<Step> {
        if blocksize == 0 {
            return Err(invalid_argument!("Partition::repartition", "blocksize must be positive"));
        }
        let extent = self.extent();
        let size = blocksize.min(self.remaining());
        // [start, end) of the panel along the traversal
        let (start, end) = match self.direction.is_forward() {
            true => (self.done, self.done + size),
            false => (extent - self.done - size, extent - self.done),
        };

        let splits = |total: usize, split: bool| match split {
            true => [0, start, end, total],
            false => [0, 0, total, total],
        };
        Ok(Step {
            direction: self.direction,
            row_splits: splits(self.rows, self.direction.splits_rows()),
            col_splits: splits(self.cols, self.direction.splits_cols()),
        })
    }

    /// Absorb the panel of `step` into the processed region.
    ///
    /// # Panics
    ///
    /// Panics if `step` was not produced by `repartition` on this partition in its
    /// current state.
    pub fn slide(&mut self, step: &Step) {
        assert_eq!(step.direction, self.direction, "step from a different partition");
        let size = step.panel_size();
        let expected = self.repartition(size.max(1)).map(|s| s.panel_start());
        assert!(
            size <= self.remaining() && expected.ok() == Some(step.panel_start()),
            "step does not continue this partition",
        );
        self.done += size;
    }

    /// Iterate over the remaining panels, advancing as it goes.
    pub fn steps(self, blocksize: usize) -> Result<Steps> {
        // validate now, so the iterator itself never fails
        self.repartition(blocksize)?;
        Ok(Steps { partition: self, blocksize })
    }
}

impl Step {
    fn splits(&self) -> &[usize; 4] {
        match self.direction.splits_rows() {
            true => &self.row_splits,
            false => &self.col_splits,
        }
    }

    /// Row band `k` (0, 1 or 2).
    pub fn rows(&self, k: usize) -> Range<usize> { self.row_splits[k]..self.row_splits[k + 1] }

    /// Column band `k` (0, 1 or 2).
    pub fn cols(&self, k: usize) -> Range<usize> { self.col_splits[k]..self.col_splits[k + 1] }

    /// The `(rows, cols)` of band `k` of a one-dimensional traversal, or of diagonal
    /// block `k` for a diagonal one.
    pub fn part(&self, k: usize) -> (Range<usize>, Range<usize>) {
        match (self.direction.splits_rows(), self.direction.splits_cols()) {
            (true, true) => self.block(k, k),
            (true, false) => self.block(k, 1),
            (false, _) => self.block(1, k),
        }
    }

    /// The `(rows, cols)` of block `(k, l)`.
    pub fn block(&self, k: usize, l: usize) -> (Range<usize>, Range<usize>) {
        (self.rows(k), self.cols(l))
    }

    /// Offset of the panel along the direction of travel.
    pub fn panel_start(&self) -> usize { self.splits()[1] }

    pub fn panel_size(&self) -> usize { self.splits()[2] - self.splits()[1] }
}

/// Iterator returned by [`Partition::steps`].
#[derive(Debug, Clone)]
pub struct Steps {
    partition: Partition,
    blocksize: usize,
}

impl Iterator for Steps {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.partition.is_done() {
            return None;
        }
        let step = self.partition.repartition(self.blocksize).ok()?;
        self.partition.slide(&step);
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.partition.remaining() + self.blocksize - 1) / self.blocksize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Steps {}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Direction; 6] = [
        Direction::Down, Direction::Up,
        Direction::Right, Direction::Left,
        Direction::DiagonalDown, Direction::DiagonalUp,
    ];

    #[test]
    fn panels_tile_the_extent_exactly_once() {
        for &direction in &ALL {
            for &(rows, cols) in &[(10, 10), (7, 3), (3, 7), (1, 1), (0, 4)] {
                for blocksize in 1..12 {
                    let partition = Partition::new(direction, rows, cols);
                    let extent = partition.extent();
                    let mut visited = vec![0; extent];
                    let steps: Vec<_> = partition.steps(blocksize).unwrap().collect();
                    for step in &steps {
                        assert!(step.panel_size() >= 1 && step.panel_size() <= blocksize);
                        for x in step.panel_start()..step.panel_start() + step.panel_size() {
                            visited[x] += 1;
                        }
                        // the bands are a decomposition of the whole matrix
                        let row_total: usize = (0..3).map(|k| step.rows(k).len()).sum();
                        let col_total: usize = (0..3).map(|k| step.cols(k).len()).sum();
                        assert_eq!((row_total, col_total), (rows, cols));
                    }
                    assert!(visited.iter().all(|&n| n == 1), "{:?} {}", direction, blocksize);
                    assert_eq!(steps.len(), (extent + blocksize - 1) / blocksize);
                }
            }
        }
    }

    #[test]
    fn upward_traversal_starts_at_the_bottom() {
        let starts: Vec<_> = {
            Partition::new(Direction::Up, 8, 2).steps(3).unwrap()
                .map(|step| step.rows(1))
                .collect()
        };
        // the short panel comes last, at the top
        assert_eq!(starts, vec![5..8, 2..5, 0..2]);

        let step = Partition::new(Direction::DiagonalUp, 8, 8).repartition(3).unwrap();
        assert_eq!(step.block(1, 0), (5..8, 0..5));
        assert_eq!(step.block(1, 1), (5..8, 5..8));
        assert_eq!(step.block(2, 2), (8..8, 8..8));
    }

    #[test]
    fn one_dimensional_parts() {
        let step = Partition::new(Direction::Right, 4, 9).repartition(2).unwrap();
        assert_eq!(step.part(0), (0..4, 0..0));
        assert_eq!(step.part(1), (0..4, 0..2));
        assert_eq!(step.part(2), (0..4, 2..9));

        let mut partition = Partition::new(Direction::Down, 5, 3);
        let step = partition.repartition(4).unwrap();
        partition.slide(&step);
        let step = partition.repartition(4).unwrap();
        assert_eq!(step.part(0), (0..4, 0..3));
        assert_eq!(step.part(1), (4..5, 0..3));
        assert_eq!(step.part(2), (5..5, 0..3));
    }

    #[test]
    fn repartition_does_not_advance() {
        let partition = Partition::new(Direction::DiagonalDown, 6, 6);
        assert_eq!(partition.repartition(2).unwrap(), partition.repartition(2).unwrap());
        assert_eq!(partition.processed(), 0);
    }

    #[test]
    fn diagonal_up_anchors_at_top_left_square() {
        let mut partition = Partition::new(Direction::DiagonalUp, 7, 4);
        let step = partition.repartition(3).unwrap();
        assert_eq!(step.block(1, 1), (1..4, 1..4));
        assert_eq!(step.rows(2), 4..7);
        assert_eq!(step.cols(2), 4..4);

        partition.slide(&step);
        let step = partition.repartition(3).unwrap();
        assert_eq!(step.block(1, 1), (0..1, 0..1));
        assert_eq!(step.rows(2), 1..7);

        let step = Partition::new(Direction::DiagonalUp, 4, 7).repartition(3).unwrap();
        assert_eq!(step.block(1, 1), (1..4, 1..4));
        assert_eq!(step.rows(2), 4..4);
        assert_eq!(step.cols(2), 4..7);
    }

    #[test]
    fn zero_blocksize_is_rejected() {
        assert!(Partition::new(Direction::Down, 3, 3).repartition(0).is_err());
        assert!(Partition::new(Direction::Down, 3, 3).steps(0).is_err());
    }

    #[test]
    #[should_panic(expected = "does not continue")]
    fn stale_steps_are_rejected() {
        let mut partition = Partition::new(Direction::Down, 6, 6);
        let step = partition.repartition(2).unwrap();
        partition.slide(&step);
        partition.slide(&step);
    }
}
