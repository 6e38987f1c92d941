/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Distribution schemes, and the index arithmetic they imply.

use crate::{Error, Grid, Result};

use itertools::iproduct;
use std::fmt;
use std::hash::{Hash, Hasher};

/// How one index of a matrix (its row index or its column index) is spread over the grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dist {
    /// Cyclic over the process rows of each grid column.
    MC,
    /// Cyclic over the process columns of each grid row.
    MR,
    /// Cyclic over all processes in column-major order.
    VC,
    /// Cyclic over all processes in row-major order.
    VR,
    /// Replicated on every process.
    Star,
    /// Owned entirely by a single process.
    Circ,
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dist::MC => "MC",
            Dist::MR => "MR",
            Dist::VC => "VC",
            Dist::VR => "VR",
            Dist::Star => "*",
            Dist::Circ => "o",
        })
    }
}

impl Dist {
    /// Number of distinct owners along this index.
    pub fn stride(self, grid: &Grid) -> usize {
        match self {
            Dist::MC => grid.height(),
            Dist::MR => grid.width(),
            Dist::VC | Dist::VR => grid.size(),
            Dist::Star | Dist::Circ => 1,
        }
    }

    /// The position of a process (by VC rank) along this distribution.
    pub fn rank_of(self, grid: &Grid, vc_rank: usize) -> usize {
        match self {
            Dist::MC => grid.coords_of(vc_rank).0,
            Dist::MR => grid.coords_of(vc_rank).1,
            Dist::VC => vc_rank,
            Dist::VR => grid.vc_to_vr(vc_rank),
            Dist::Star | Dist::Circ => 0,
        }
    }

    // which grid axes (rows, cols) the distribution consumes
    fn axes(self) -> (bool, bool) {
        match self {
            Dist::MC => (true, false),
            Dist::MR => (false, true),
            Dist::VC | Dist::VR => (true, true),
            Dist::Star | Dist::Circ => (false, false),
        }
    }

    /// Restrict the grid coordinates of processes that own the index whose owner
    /// along this distribution is `owner`.
    fn constrain(self, grid: &Grid, owner: usize, coords: &mut Coords) {
        match self {
            Dist::MC => coords.row = Some(owner),
            Dist::MR => coords.col = Some(owner),
            Dist::VC => {
                let (row, col) = grid.coords_of(owner);
                *coords = Coords { row: Some(row), col: Some(col) };
            },
            Dist::VR => {
                let (row, col) = grid.coords_of(grid.vr_to_vc(owner));
                *coords = Coords { row: Some(row), col: Some(col) };
            },
            Dist::Star | Dist::Circ => {},
        }
    }
}

/// A pair of distributions: `col` distributes the entries of each column (i.e. the row
/// index), `row` distributes the entries of each row (the column index).
///
/// Written `[col,row]`, e.g. `[MC,MR]` is the standard 2D element-cyclic distribution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Scheme {
    col: Dist,
    row: Dist,
}

macro_rules! scheme_consts {
    ($($NAME:ident = [$col:ident, $row:ident];)*) => {
        impl Scheme {$(
            pub const $NAME: Scheme = Scheme { col: Dist::$col, row: Dist::$row };
        )*}
    };
}

scheme_consts! {
    MC_MR = [MC, MR];
    MR_MC = [MR, MC];
    MC_STAR = [MC, Star];
    STAR_MC = [Star, MC];
    MR_STAR = [MR, Star];
    STAR_MR = [Star, MR];
    VC_STAR = [VC, Star];
    STAR_VC = [Star, VC];
    VR_STAR = [VR, Star];
    STAR_VR = [Star, VR];
    STAR_STAR = [Star, Star];
    CIRC_CIRC = [Circ, Circ];
}

impl Scheme {
    /// Fails unless the pair is legal.  A pair may not reuse a grid axis, and `Circ`
    /// only pairs with itself.
    pub fn new(col: Dist, row: Dist) -> Result<Scheme> {
        let (col_rows, col_cols) = col.axes();
        let (row_rows, row_cols) = row.axes();
        let overlap = (col_rows && row_rows) || (col_cols && row_cols);
        let half_circ = (col == Dist::Circ) != (row == Dist::Circ);
        if overlap || half_circ {
            return Err(Error::InvalidScheme { op: "Scheme::new", col, row });
        }
        Ok(Scheme { col, row })
    }

    /// Every legal scheme.
    pub fn all() -> Vec<Scheme> {
        use self::Dist::*;
        let dists = [MC, MR, VC, VR, Star, Circ];
        iproduct!(dists.iter(), dists.iter())
            .filter_map(|(&col, &row)| Scheme::new(col, row).ok())
            .collect()
    }

    pub fn col(&self) -> Dist { self.col }
    pub fn row(&self) -> Dist { self.row }
    pub fn is_circ(&self) -> bool { self.col == Dist::Circ }

    /// The number of distinct pieces the matrix is cut into.
    pub fn dist_size(&self, grid: &Grid) -> usize {
        self.col.stride(grid) * self.row.stride(grid)
    }

    /// How many processes hold a copy of each piece.
    pub fn redundant_size(&self, grid: &Grid) -> usize {
        match self.is_circ() {
            true => 1,
            false => grid.size() / self.dist_size(grid),
        }
    }

    /// How many disjoint teams could each hold the whole matrix.  Only `Circ` leaves
    /// processes out entirely.
    pub fn cross_size(&self, grid: &Grid) -> usize {
        match self.is_circ() {
            true => grid.size(),
            false => 1,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.col, self.row)
    }
}

/// Number of indices in `0..n` that are congruent to `shift` modulo `stride`.
pub fn length(n: usize, shift: usize, stride: usize) -> usize {
    debug_assert!(shift < stride.max(1));
    match n > shift {
        true => (n - shift - 1) / stride + 1,
        false => 0,
    }
}

/// The largest [`length`] over all shifts.
pub fn max_length(n: usize, stride: usize) -> usize {
    (n + stride - 1) / stride
}

/// The shift of a process at position `rank` along a distribution of the given stride.
pub fn shift(rank: usize, align: usize, stride: usize) -> usize {
    (rank + stride - align % stride) % stride
}

#[derive(Debug, Copy, Clone, Default)]
struct Coords {
    row: Option<usize>,
    col: Option<usize>,
}

/// Everything needed to locate the entries of a distributed matrix,
/// without the entries themselves.
///
/// `col_align` and `row_align` are the positions (along the respective distributions)
/// of the process that owns global row 0 and global column 0.  For `Circ`, the owner
/// of everything is `root`, and both alignments are zero.
#[derive(Debug, Copy, Clone)]
pub struct DistInfo<'g> {
    pub grid: &'g Grid,
    pub scheme: Scheme,
    pub height: usize,
    pub width: usize,
    pub col_align: usize,
    pub row_align: usize,
    pub root: usize,
}

impl<'g> DistInfo<'g> {
    pub fn col_stride(&self) -> usize { self.scheme.col.stride(self.grid) }
    pub fn row_stride(&self) -> usize { self.scheme.row.stride(self.grid) }

    /// Whether the process stores any part of the matrix at all.
    pub fn participates(&self, vc_rank: usize) -> bool {
        !self.scheme.is_circ() || vc_rank == self.root
    }

    pub fn col_shift_of(&self, vc_rank: usize) -> usize {
        let rank = self.scheme.col.rank_of(self.grid, vc_rank);
        shift(rank, self.col_align, self.col_stride())
    }

    pub fn row_shift_of(&self, vc_rank: usize) -> usize {
        let rank = self.scheme.row.rank_of(self.grid, vc_rank);
        shift(rank, self.row_align, self.row_stride())
    }

    pub fn col_shift(&self) -> usize { self.col_shift_of(self.grid.vc_rank()) }
    pub fn row_shift(&self) -> usize { self.row_shift_of(self.grid.vc_rank()) }

    pub fn local_height_of(&self, vc_rank: usize) -> usize {
        match self.participates(vc_rank) {
            true => length(self.height, self.col_shift_of(vc_rank), self.col_stride()),
            false => 0,
        }
    }

    pub fn local_width_of(&self, vc_rank: usize) -> usize {
        match self.participates(vc_rank) {
            true => length(self.width, self.row_shift_of(vc_rank), self.row_stride()),
            false => 0,
        }
    }

    pub fn local_height(&self) -> usize { self.local_height_of(self.grid.vc_rank()) }
    pub fn local_width(&self) -> usize { self.local_width_of(self.grid.vc_rank()) }

    /// Upper bound on the local height of any process.
    pub fn max_local_height(&self) -> usize { max_length(self.height, self.col_stride()) }
    /// Upper bound on the local width of any process.
    pub fn max_local_width(&self) -> usize { max_length(self.width, self.row_stride()) }

    /// Upper bound on the number of locally stored entries on any process.
    pub fn max_local_size(&self) -> usize { self.max_local_height() * self.max_local_width() }

    /// Global row of a local row, on the process with the given VC rank.
    pub fn global_row_of(&self, vc_rank: usize, local_i: usize) -> usize {
        self.col_shift_of(vc_rank) + local_i * self.col_stride()
    }

    pub fn global_col_of(&self, vc_rank: usize, local_j: usize) -> usize {
        self.row_shift_of(vc_rank) + local_j * self.row_stride()
    }

    pub fn global_row(&self, local_i: usize) -> usize { self.global_row_of(self.grid.vc_rank(), local_i) }
    pub fn global_col(&self, local_j: usize) -> usize { self.global_col_of(self.grid.vc_rank(), local_j) }

    fn owner_coords(&self, i: usize, j: usize) -> Coords {
        let mut coords = Coords::default();
        if self.scheme.is_circ() {
            let (row, col) = self.grid.coords_of(self.root);
            return Coords { row: Some(row), col: Some(col) };
        }
        let col_owner = (i + self.col_align) % self.col_stride();
        let row_owner = (j + self.row_align) % self.row_stride();
        self.scheme.col.constrain(self.grid, col_owner, &mut coords);
        self.scheme.row.constrain(self.grid, row_owner, &mut coords);
        coords
    }

    /// VC ranks of every process that stores global entry `(i, j)`, in ascending order.
    pub fn owners(&self, i: usize, j: usize) -> impl Iterator<Item=usize> {
        let Coords { row, col } = self.owner_coords(i, j);
        let height = self.grid.height();
        let rows = match row { Some(r) => r..r + 1, None => 0..height };
        let cols = match col { Some(c) => c..c + 1, None => 0..self.grid.width() };
        // column-major, so VC ranks come out sorted
        iproduct!(cols, rows).map(move |(col, row)| row + col * height)
    }

    /// The lowest VC rank among the owners of `(i, j)`.
    pub fn first_owner(&self, i: usize, j: usize) -> usize {
        let Coords { row, col } = self.owner_coords(i, j);
        self.grid.vc_rank_of(row.unwrap_or(0), col.unwrap_or(0))
    }

    pub fn owns(&self, vc_rank: usize, i: usize, j: usize) -> bool {
        let Coords { row, col } = self.owner_coords(i, j);
        let (my_row, my_col) = self.grid.coords_of(vc_rank);
        row.map_or(true, |r| r == my_row) && col.map_or(true, |c| c == my_col)
    }

    /// Local position of a global entry on a process that owns it.
    pub fn local_index_of(&self, vc_rank: usize, i: usize, j: usize) -> (usize, usize) {
        debug_assert!(self.owns(vc_rank, i, j));
        let (col_shift, row_shift) = (self.col_shift_of(vc_rank), self.row_shift_of(vc_rank));
        ((i - col_shift) / self.col_stride(), (j - row_shift) / self.row_stride())
    }

    /// Layout of the `height x width` submatrix starting at global entry `(i, j)`.
    pub fn sub(&self, i: usize, j: usize, height: usize, width: usize) -> DistInfo<'g> {
        debug_assert!(i + height <= self.height && j + width <= self.width);
        let (col_align, row_align) = match self.scheme.is_circ() {
            true => (0, 0),
            false => (
                (self.col_align + i) % self.col_stride(),
                (self.row_align + j) % self.row_stride(),
            ),
        };
        DistInfo { height, width, col_align, row_align, ..*self }
    }

    /// Whether two layouts put every entry in the same place.
    pub fn same_layout(&self, other: &DistInfo<'_>) -> bool {
        self.grid.same_as(other.grid)
            && self.scheme == other.scheme
            && (self.height, self.width) == (other.height, other.width)
            && (self.col_align, self.row_align) == (other.col_align, other.row_align)
            && (!self.scheme.is_circ() || self.root == other.root)
    }

    /// The alignment this layout would give to the distribution `dist`, if it has a
    /// natural one.  Used to align one matrix with another so that entries with the
    /// same index land on the same processes.
    pub fn natural_align(&self, dist: Dist) -> Option<usize> {
        let grid = self.grid;
        let mine = [(self.scheme.col, self.col_align), (self.scheme.row, self.row_align)];
        if let Some(&(_, align)) = mine.iter().find(|&&(d, _)| d == dist) {
            return Some(align);
        }
        mine.iter().filter_map(|&(d, align)| match (d, dist) {
            (Dist::MC, Dist::VC) => Some(align),
            (Dist::MR, Dist::VR) => Some(align),
            (Dist::VC, Dist::MC) => Some(align % grid.height()),
            (Dist::VR, Dist::MR) => Some(align % grid.width()),
            _ => None,
        }).next()
    }

    /// A hash of everything all processes must agree on.
    pub fn fingerprint(&self, hasher: &mut impl Hasher) {
        self.scheme.hash(hasher);
        (self.height, self.width, self.col_align, self.row_align, self.root).hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distla_comm::LocalUniverse;

    #[test]
    fn illegal_schemes() {
        use self::Dist::*;
        assert!(Scheme::new(MC, MC).is_err());
        assert!(Scheme::new(VC, MR).is_err());
        assert!(Scheme::new(VR, VC).is_err());
        assert!(Scheme::new(Circ, Star).is_err());
        assert_eq!(Scheme::new(MC, MR), Ok(Scheme::MC_MR));
        assert_eq!(Scheme::new(Star, VR), Ok(Scheme::STAR_VR));
        assert_eq!(Scheme::new(Circ, Circ), Ok(Scheme::CIRC_CIRC));
        assert_eq!(Scheme::all().len(), 12);
    }

    #[test]
    fn lengths() {
        assert_eq!(length(10, 0, 3), 4);
        assert_eq!(length(10, 1, 3), 3);
        assert_eq!(length(10, 2, 3), 3);
        assert_eq!(length(2, 2, 3), 0);
        assert_eq!(length(0, 0, 1), 0);
        assert_eq!(max_length(10, 3), 4);
        assert_eq!(max_length(0, 3), 0);
        assert_eq!(shift(0, 2, 3), 1);
        assert_eq!(shift(2, 2, 3), 0);
    }

    #[test]
    fn team_sizes() {
        LocalUniverse::run(6, |comm| {
            let grid = Grid::with_shape(comm, 2, 3).unwrap();
            assert_eq!(Scheme::MC_MR.dist_size(&grid), 6);
            assert_eq!(Scheme::MC_MR.redundant_size(&grid), 1);
            assert_eq!(Scheme::MC_STAR.redundant_size(&grid), 3);
            assert_eq!(Scheme::STAR_STAR.redundant_size(&grid), 6);
            assert_eq!(Scheme::CIRC_CIRC.cross_size(&grid), 6);
            assert_eq!(Scheme::CIRC_CIRC.redundant_size(&grid), 1);
            assert_eq!(Scheme::VR_STAR.cross_size(&grid), 1);
        });
    }

    #[test]
    fn every_entry_owned_consistently() {
        LocalUniverse::run(6, |comm| {
            let grid = Grid::with_shape(comm, 2, 3).unwrap();
            for scheme in Scheme::all() {
                let info = DistInfo {
                    grid: &grid, scheme, height: 7, width: 5,
                    col_align: 1 % scheme.col().stride(&grid),
                    row_align: 2 % scheme.row().stride(&grid),
                    root: 4,
                };
                let mut count = 0;
                for q in 0..6 {
                    for (li, lj) in iproduct!(0..info.local_height_of(q), 0..info.local_width_of(q)) {
                        let (i, j) = (info.global_row_of(q, li), info.global_col_of(q, lj));
                        assert!(info.owns(q, i, j), "{} {:?}", scheme, (q, i, j));
                        assert_eq!(info.local_index_of(q, i, j), (li, lj));
                        count += 1;
                    }
                }
                // each entry is stored once per redundant copy
                assert_eq!(count, 7 * 5 * scheme.redundant_size(&grid), "{}", scheme);

                for (i, j) in iproduct!(0..7, 0..5) {
                    let owners: Vec<_> = info.owners(i, j).collect();
                    assert_eq!(owners.len(), scheme.redundant_size(&grid), "{}", scheme);
                    assert_eq!(owners[0], info.first_owner(i, j));
                    assert!(owners.windows(2).all(|w| w[0] < w[1]));
                    assert!(owners.iter().all(|&q| info.owns(q, i, j)));
                }
            }
        });
    }

    #[test]
    fn submatrix_alignment() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let info = DistInfo {
                grid: &grid, scheme: Scheme::MC_MR, height: 9, width: 9,
                col_align: 1, row_align: 0, root: 0,
            };
            let sub = info.sub(3, 5, 4, 2);
            for (i, j) in iproduct!(0..4, 0..2) {
                assert_eq!(sub.first_owner(i, j), info.first_owner(i + 3, j + 5));
            }
        });
    }
}
