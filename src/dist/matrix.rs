/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::{Dist, DistInfo, Error, Grid, Result, Scheme};
use crate::dist::length;
use crate::grid::check_same_grid;
use crate::redist;
use distla_comm::CommExt;
use distla_local::{kernels, LocalMatrix, LocalRef, LocalMut, Scalar, Uplo};

use rand::{SeedableRng, rngs::StdRng};
use std::ops::Range;

/// Read access to a distributed matrix or a view of one.
///
/// Unless noted otherwise, methods that take global indices are **collective**: every
/// process of the grid must call them, in the same order, with the same arguments.
/// Methods with `local` in the name touch only this process's data.
pub trait DistData<T: Scalar> {
    fn info(&self) -> DistInfo<'_>;
    fn local(&self) -> LocalRef<'_, T>;

    fn grid(&self) -> &Grid { self.info().grid }
    fn scheme(&self) -> Scheme { self.info().scheme }
    fn height(&self) -> usize { self.info().height }
    fn width(&self) -> usize { self.info().width }
    fn dims(&self) -> (usize, usize) { (self.height(), self.width()) }
    fn local_height(&self) -> usize { self.local().height() }
    fn local_width(&self) -> usize { self.local().width() }

    /// Entry at a *local* index.  No communication.
    fn get_local(&self, local_i: usize, local_j: usize) -> T {
        let local = self.local();
        assert!(local_i < local.height() && local_j < local.width(), "local index out of bounds");
        local.get(local_i, local_j)
    }

    /// A read-only view of the `height x width` submatrix at `(i, j)`.  No communication.
    fn view(&self, i: usize, j: usize, height: usize, width: usize) -> Result<DistRef<'_, T>> {
        let info = self.info();
        let (sub, window) = sub_layout("view", &info, i, j, height, width)?;
        let local = self.local().into_view(window.0, window.1, window.2, window.3);
        Ok(DistRef { info: sub, local })
    }

    /// [`DistData::view`] taking index ranges.
    fn view_range(&self, rows: Range<usize>, cols: Range<usize>) -> Result<DistRef<'_, T>> {
        self.view(rows.start, cols.start, rows.len(), cols.len())
    }

    /// Read one entry by global index.  Collective.
    ///
    /// This broadcasts the value from its owner to the entire grid, making it the most
    /// expensive way imaginable to read a single number.  Prefer `get_local`.
    fn get(&self, i: usize, j: usize) -> Result<T> {
        let info = self.info();
        check_index("get", &info, i, j)?;
        redist::check_collective(info.grid, "get", &[&info], (i, j));

        let grid = info.grid;
        let owner = info.first_owner(i, j);
        let value = match owner == grid.vc_rank() {
            true => {
                let (li, lj) = info.local_index_of(owner, i, j);
                self.local().get(li, lj)
            },
            false => T::zero(),
        };
        Ok(grid.vc_comm().broadcast_value(owner, value))
    }

    /// Largest modulus of any entry.  Collective.
    fn max_abs(&self) -> f64 {
        let info = self.info();
        info.grid.vc_comm().all_reduce_max(self.local().max_abs())
    }

    /// Gather the full matrix onto every process.  Collective.
    fn to_local_matrix(&self) -> LocalMatrix<T> {
        redist::to_local_matrix(&self.info(), self.local())
    }
}

/// Write access to a distributed matrix or a view of one.
pub trait DistDataMut<T: Scalar>: DistData<T> {
    /// Layout and local data at once, so that both can be used together.
    fn parts_mut(&mut self) -> (DistInfo<'_>, LocalMut<'_, T>);

    fn local_mut(&mut self) -> LocalMut<'_, T> { self.parts_mut().1 }

    /// A mutable view of the `height x width` submatrix at `(i, j)`.  No communication.
    fn view_mut(&mut self, i: usize, j: usize, height: usize, width: usize) -> Result<DistMut<'_, T>> {
        let (info, local) = self.parts_mut();
        let (sub, window) = sub_layout("view_mut", &info, i, j, height, width)?;
        let local = local.into_view_mut(window.0, window.1, window.2, window.3);
        Ok(DistMut { info: sub, local })
    }

    fn view_range_mut(&mut self, rows: Range<usize>, cols: Range<usize>) -> Result<DistMut<'_, T>> {
        self.view_mut(rows.start, cols.start, rows.len(), cols.len())
    }

    fn set_local(&mut self, local_i: usize, local_j: usize, value: T) {
        let mut local = self.local_mut();
        assert!(local_i < local.height() && local_j < local.width(), "local index out of bounds");
        local.set(local_i, local_j, value);
    }

    fn update_local(&mut self, local_i: usize, local_j: usize, value: T) {
        let mut local = self.local_mut();
        assert!(local_i < local.height() && local_j < local.width(), "local index out of bounds");
        local.update(local_i, local_j, value);
    }

    /// Write one entry by global index.  Collective.
    ///
    /// The value given by the process of VC rank 0 is broadcast and stored by every
    /// owner.  Like [`DistData::get`], this is extremely expensive per entry.
    fn set(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        let (info, mut local) = self.parts_mut();
        check_index("set", &info, i, j)?;
        redist::check_collective(info.grid, "set", &[&info], (i, j));

        let grid = info.grid;
        let value = grid.vc_comm().broadcast_value(0, value);
        if info.owns(grid.vc_rank(), i, j) {
            let (li, lj) = info.local_index_of(grid.vc_rank(), i, j);
            local.set(li, lj, value);
        }
        Ok(())
    }

    fn set_to_zero(&mut self) { self.local_mut().fill(T::zero()) }

    fn set_to_identity(&mut self) {
        let (info, mut local) = self.parts_mut();
        for lj in 0..local.width() {
            let j = info.global_col(lj);
            for li in 0..local.height() {
                let value = if info.global_row(li) == j { T::one() } else { T::zero() };
                local.set(li, lj, value);
            }
        }
    }

    /// Fill with values from the unit ball.  No communication.
    ///
    /// The value of each entry depends only on its global index and the seed, so every
    /// copy of a replicated entry agrees, and the same seed produces the same matrix on
    /// any grid and under any distribution.
    fn set_to_random(&mut self, seed: u64) {
        let (info, mut local) = self.parts_mut();
        let (col_shift, col_stride) = (info.col_shift(), info.col_stride());
        for lj in 0..local.width() {
            let j = info.global_col(lj);
            let mut rng = StdRng::seed_from_u64(column_seed(seed, j));
            let mut li = 0;
            for i in 0..info.height {
                // drawn whether or not we keep it, so the stream is identical everywhere
                let value = T::sample_unit_ball(&mut rng);
                if li < local.height() && i == col_shift + li * col_stride {
                    local.set(li, lj, value);
                    li += 1;
                }
            }
        }
    }

    /// Zero the entries outside a trapezoid of global indices; see
    /// [`kernels::make_trapezoidal`].  No communication.
    fn make_trapezoidal(&mut self, uplo: Uplo, offset: isize) {
        let (info, mut local) = self.parts_mut();
        for lj in 0..local.width() {
            let j = info.global_col(lj) as isize;
            for li in 0..local.height() {
                let diff = j - info.global_row(li) as isize;
                let keep = match uplo {
                    Uplo::Lower => diff <= offset,
                    Uplo::Upper => diff >= offset,
                };
                if !keep {
                    local.set(li, lj, T::zero());
                }
            }
        }
    }

    /// `self := alpha self`.  No communication.
    fn scale(&mut self, alpha: T) { kernels::scale(alpha, &mut self.local_mut()) }

    /// `self += alpha * sum of partial contributions`; see [`redist::sum_scatter_update`].
    fn sum_scatter_update(&mut self, alpha: T, partial: &impl DistData<T>) -> Result<()>
    where Self: Sized,
    { redist::sum_scatter_update(alpha, partial, self) }

    /// Overwrite with the contents of `src`, which must have the same shape.
    fn redistribute_from(&mut self, src: &impl DistData<T>) -> Result<()>
    where Self: Sized,
    { redist::redistribute(src, self) }
}

/// Seed of the random stream for global column `j`.
fn column_seed(seed: u64, j: usize) -> u64 {
    seed.rotate_left(17) ^ (j as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn check_index(op: &'static str, info: &DistInfo<'_>, i: usize, j: usize) -> Result<()> {
    if i >= info.height || j >= info.width {
        return Err(invalid_argument!(op, "index ({}, {}) out of bounds for {}x{} matrix", i, j, info.height, info.width));
    }
    Ok(())
}

/// Layout of a submatrix, and the window `(i, j, height, width)` of the local data it
/// occupies on this process.
fn sub_layout<'g>(
    op: &'static str,
    info: &DistInfo<'g>,
    i: usize, j: usize, height: usize, width: usize,
) -> Result<(DistInfo<'g>, (usize, usize, usize, usize))> {
    if i + height > info.height || j + width > info.width {
        return Err(invalid_argument!(
            op, "{}x{} submatrix at ({}, {}) exceeds {}x{} matrix",
            height, width, i, j, info.height, info.width,
        ));
    }
    let sub = info.sub(i, j, height, width);
    let me = info.grid.vc_rank();
    let window = match info.participates(me) {
        true => (
            length(i, info.col_shift(), info.col_stride()),
            length(j, info.row_shift(), info.row_stride()),
            sub.local_height(),
            sub.local_width(),
        ),
        false => (0, 0, 0, 0),
    };
    Ok((sub, window))
}

//--------------------------------------------------------------------------------------

/// A dense matrix distributed over a [`Grid`].
///
/// Each process stores the entries assigned to it by the matrix's [`Scheme`] and
/// alignments in a [`LocalMatrix`].  The local dimensions are derived from the global
/// shape, the layout, and this process's place in the grid; they cannot be set directly.
///
/// Methods that change the global shape or layout are collective by contract (every
/// process must make the same calls in the same order), though only those that
/// communicate say so.
#[derive(Debug, Clone)]
pub struct DistMatrix<'g, T> {
    grid: &'g Grid,
    scheme: Scheme,
    height: usize,
    width: usize,
    col_align: usize,
    row_align: usize,
    root: usize,
    // whether the alignment was chosen explicitly, and should survive copy_from
    constrained: bool,
    local: LocalMatrix<T>,
}

impl<'g, T: Scalar> DistMatrix<'g, T> {
    /// An empty `[MC,MR]` matrix.
    pub fn new(grid: &'g Grid) -> Self { DistMatrix::with_scheme(grid, Scheme::MC_MR) }

    /// An empty matrix of the given distribution.
    pub fn with_scheme(grid: &'g Grid, scheme: Scheme) -> Self {
        DistMatrix {
            grid, scheme,
            height: 0,
            width: 0,
            col_align: 0,
            row_align: 0,
            root: 0,
            constrained: false,
            local: LocalMatrix::zeros(0, 0),
        }
    }

    /// A zero-filled matrix of the given distribution.
    pub fn zeros(grid: &'g Grid, scheme: Scheme, height: usize, width: usize) -> Self {
        let mut out = DistMatrix::with_scheme(grid, scheme);
        out.resize(height, width);
        out.set_to_zero();
        out
    }

    /// The grid, with its full lifetime.
    pub fn grid_ref(&self) -> &'g Grid { self.grid }
    pub fn col_align(&self) -> usize { self.col_align }
    pub fn row_align(&self) -> usize { self.row_align }
    pub fn root(&self) -> usize { self.root }
    pub fn local_matrix(&self) -> &LocalMatrix<T> { &self.local }
    pub fn is_populated(&self) -> bool { self.height > 0 && self.width > 0 }

    fn info_g(&self) -> DistInfo<'g> {
        DistInfo {
            grid: self.grid,
            scheme: self.scheme,
            height: self.height,
            width: self.width,
            col_align: self.col_align,
            row_align: self.row_align,
            root: self.root,
        }
    }

    /// Change the global shape.  The local data is reallocated only if it needs more
    /// room, and its contents are unspecified afterwards.
    pub fn resize(&mut self, height: usize, width: usize) {
        self.height = height;
        self.width = width;
        let info = self.info_g();
        self.local.resize(info.local_height(), info.local_width());
    }

    /// Shrink to `0 x 0` and forget any alignment constraint.
    pub fn empty(&mut self) {
        self.resize(0, 0);
        self.constrained = false;
    }

    /// Allow a later `copy_from` to choose a new alignment.
    pub fn free_alignments(&mut self) { self.constrained = false; }

    fn check_alignable(&self, op: &'static str) -> Result<()> {
        match self.is_populated() {
            true => Err(Error::AlignmentLocked { op }),
            false => Ok(()),
        }
    }

    fn check_alignments(&self, op: &'static str, col_align: usize, row_align: usize) -> Result<()> {
        let info = self.info_g();
        if col_align >= info.col_stride() || row_align >= info.row_stride() {
            return Err(invalid_argument!(
                op, "alignment ({}, {}) out of range for {} on a {}x{} grid",
                col_align, row_align, self.scheme, self.grid.height(), self.grid.width(),
            ));
        }
        Ok(())
    }

    /// Choose which processes own global row 0 and column 0.
    ///
    /// Only possible while the matrix holds no data.  See [`DistMatrix::realign`] for
    /// populated matrices.
    pub fn align(&mut self, col_align: usize, row_align: usize) -> Result<()> {
        self.check_alignable("align")?;
        self.check_alignments("align", col_align, row_align)?;
        self.col_align = col_align;
        self.row_align = row_align;
        self.constrained = true;
        Ok(())
    }

    /// Align so that, wherever both matrices distribute an index the same way, equal
    /// indices live on equal processes.  This is what makes local kernels on the two
    /// local buffers meaningful.
    pub fn align_with(&mut self, other: &impl DistData<T>) -> Result<()> {
        let other = other.info();
        check_same_grid("align_with", self.grid, other.grid)?;
        self.check_alignable("align_with")?;
        if let Some(align) = other.natural_align(self.scheme.col()) {
            self.col_align = align;
        }
        if let Some(align) = other.natural_align(self.scheme.row()) {
            self.row_align = align;
        }
        if self.scheme.is_circ() && other.scheme.is_circ() {
            self.root = other.root;
        }
        self.constrained = true;
        Ok(())
    }

    /// Choose the owner of a `[o,o]` matrix.  Only possible while it holds no data.
    pub fn set_root(&mut self, root: usize) -> Result<()> {
        if !self.scheme.is_circ() {
            return Err(invalid_argument!("set_root", "{} has no root", self.scheme));
        }
        if root >= self.grid.size() {
            return Err(invalid_argument!("set_root", "root {} out of range", root));
        }
        self.check_alignable("set_root")?;
        self.root = root;
        self.constrained = true;
        Ok(())
    }

    /// Move the data to a new alignment.  Collective.
    pub fn realign(&mut self, col_align: usize, row_align: usize) -> Result<()> {
        self.check_alignments("realign", col_align, row_align)?;
        if (col_align, row_align) == (self.col_align, self.row_align) {
            self.constrained = true;
            return Ok(());
        }
        let mut moved = DistMatrix::with_scheme(self.grid, self.scheme);
        moved.align(col_align, row_align)?;
        moved.resize(self.height, self.width);
        redist::redistribute(&*self, &mut moved)?;
        *self = moved;
        Ok(())
    }

    /// Resize to the shape of `src` and redistribute its contents here.  Collective.
    ///
    /// Unless this matrix was explicitly aligned, it first adopts whatever alignment
    /// makes the copy cheapest.
    pub fn copy_from(&mut self, src: &impl DistData<T>) -> Result<()> {
        let info = src.info();
        check_same_grid("copy_from", self.grid, info.grid)?;
        if !self.constrained {
            let natural = |dist: Dist| info.natural_align(dist).unwrap_or(0);
            self.col_align = natural(self.scheme.col());
            self.row_align = natural(self.scheme.row());
            if self.scheme.is_circ() && info.scheme.is_circ() {
                self.root = info.root;
            }
        }
        self.resize(info.height, info.width);
        redist::redistribute(src, self)
    }
}

impl<'g, T: Scalar> DistData<T> for DistMatrix<'g, T> {
    fn info(&self) -> DistInfo<'_> { self.info_g() }
    fn local(&self) -> LocalRef<'_, T> { self.local.as_local_ref() }
}

impl<'g, T: Scalar> DistDataMut<T> for DistMatrix<'g, T> {
    fn parts_mut(&mut self) -> (DistInfo<'_>, LocalMut<'_, T>) {
        (self.info_g(), self.local.as_local_mut())
    }
}

/// A read-only submatrix of a [`DistMatrix`].  It borrows the parent.
#[derive(Debug)]
pub struct DistRef<'a, T> {
    info: DistInfo<'a>,
    local: LocalRef<'a, T>,
}

impl<'a, T> Clone for DistRef<'a, T> {
    fn clone(&self) -> Self { DistRef { info: self.info, local: self.local } }
}
impl<'a, T> Copy for DistRef<'a, T> {}

/// A mutable submatrix of a [`DistMatrix`].  It borrows the parent exclusively.
#[derive(Debug)]
pub struct DistMut<'a, T> {
    info: DistInfo<'a>,
    local: LocalMut<'a, T>,
}

impl<'a, T: Scalar> DistData<T> for DistRef<'a, T> {
    fn info(&self) -> DistInfo<'_> { self.info }
    fn local(&self) -> LocalRef<'_, T> { self.local }
}

impl<'a, T: Scalar> DistData<T> for DistMut<'a, T> {
    fn info(&self) -> DistInfo<'_> { self.info }
    fn local(&self) -> LocalRef<'_, T> { self.local.as_local_ref() }
}

impl<'a, T: Scalar> DistDataMut<T> for DistMut<'a, T> {
    fn parts_mut(&mut self) -> (DistInfo<'_>, LocalMut<'_, T>) {
        (self.info, self.local.as_local_mut())
    }
}

/// `y := alpha x + y`.  Collective if the layouts differ.
pub fn axpy<T: Scalar>(alpha: T, x: &impl DistData<T>, y: &mut impl DistDataMut<T>) -> Result<()> {
    let x_info = x.info();
    let y_info = y.info();
    check_same_grid("axpy", x_info.grid, y_info.grid)?;
    if (x_info.height, x_info.width) != (y_info.height, y_info.width) {
        return Err(nonconformal!(
            "axpy", "x is {}x{} but y is {}x{}",
            x_info.height, x_info.width, y_info.height, y_info.width,
        ));
    }

    if x_info.same_layout(&y_info) {
        kernels::axpy(alpha, x.local(), &mut y.local_mut());
        return Ok(());
    }

    let mut temp = DistMatrix::with_scheme(x_info.grid, y_info.scheme);
    temp.col_align = y_info.col_align;
    temp.row_align = y_info.row_align;
    temp.root = y_info.root;
    temp.constrained = true;
    temp.resize(y_info.height, y_info.width);
    redist::redistribute(x, &mut temp)?;
    kernels::axpy(alpha, temp.local(), &mut y.local_mut());
    Ok(())
}
