/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::Scalar;

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Owned column-major matrix with an explicit leading dimension.
///
/// This is the storage behind one process's share of a distributed matrix.
/// Entry `(i, j)` lives at `data[i + j * ldim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatrix<T> {
    data: Vec<T>,
    height: usize,
    width: usize,
    // invariant: ldim >= max(height, 1) and data.len() == ldim * width
    ldim: usize,
}

/// Borrowed, possibly strided, column-major view.
///
/// `slice` begins at entry `(0, 0)` and is only required to extend through
/// entry `(height - 1, width - 1)`.
//
// Views of zero height or width always hold an empty slice.
#[derive(Debug)]
pub struct LocalRef_<T, V> {
    slice: V,
    height: usize,
    width: usize,
    ldim: usize,
    _marker: PhantomData<T>,
}

pub type LocalRef<'a, T> = LocalRef_<T, &'a [T]>;
pub type LocalMut<'a, T> = LocalRef_<T, &'a mut [T]>;

impl<'a, T> Clone for LocalRef<'a, T> {
    fn clone(&self) -> Self { *self }
}
impl<'a, T> Copy for LocalRef<'a, T> {}

fn required_len(height: usize, width: usize, ldim: usize) -> usize {
    match (height, width) {
        (0, _) | (_, 0) => 0,
        _ => (width - 1) * ldim + height,
    }
}

impl<T: Scalar> LocalMatrix<T> {
    /// A zero-filled matrix.
    pub fn zeros(height: usize, width: usize) -> Self {
        let ldim = height.max(1);
        LocalMatrix { data: vec![T::zero(); ldim * width], height, width, ldim }
    }

    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut out = Self::zeros(height, width);
        for j in 0..width {
            for i in 0..height {
                out[(i, j)] = f(i, j);
            }
        }
        out
    }

    /// Take ownership of densely packed column-major data.
    pub fn from_col_major(height: usize, width: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), height * width, "wrong amount of data for {}x{}", height, width);
        if height == 0 {
            // preserve the ldim invariant
            return Self::zeros(0, width);
        }
        LocalMatrix { data, height, width, ldim: height }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() })
    }

    /// Change the dimensions.
    ///
    /// The existing allocation is reused when it has enough capacity.
    /// The contents afterwards are unspecified (but initialized).
    pub fn resize(&mut self, height: usize, width: usize) {
        let ldim = height.max(1);
        self.data.resize(ldim * width, T::zero());
        self.height = height;
        self.width = width;
        self.ldim = ldim;
    }

    pub fn height(&self) -> usize { self.height }
    pub fn width(&self) -> usize { self.width }
    pub fn ldim(&self) -> usize { self.ldim }

    /// Raw column-major storage, including any padding below each column.
    pub fn buffer(&self) -> &[T] { &self.data }
    pub fn buffer_mut(&mut self) -> &mut [T] { &mut self.data }

    pub fn as_local_ref(&self) -> LocalRef<'_, T> {
        LocalRef_::from_parts(&self.data[..], self.height, self.width, self.ldim)
    }

    pub fn as_local_mut(&mut self) -> LocalMut<'_, T> {
        let (height, width, ldim) = (self.height, self.width, self.ldim);
        LocalRef_::from_parts(&mut self.data[..], height, width, ldim)
    }

    pub fn view(&self, i: usize, j: usize, height: usize, width: usize) -> LocalRef<'_, T>
    { self.as_local_ref().into_view(i, j, height, width) }

    pub fn view_mut(&mut self, i: usize, j: usize, height: usize, width: usize) -> LocalMut<'_, T>
    { self.as_local_mut().into_view_mut(i, j, height, width) }

    pub fn get(&self, i: usize, j: usize) -> T { self[(i, j)] }
    pub fn set(&mut self, i: usize, j: usize, value: T) { self[(i, j)] = value; }
    pub fn update(&mut self, i: usize, j: usize, value: T) { self[(i, j)] += value; }

    pub fn to_col_major(&self) -> Vec<T> { self.as_local_ref().to_col_major() }

    pub fn to_transpose(&self) -> Self
    { Self::from_fn(self.width, self.height, |i, j| self[(j, i)]) }

    /// The maximum absolute value of any entry (zero for an empty matrix).
    pub fn max_abs(&self) -> f64 { self.as_local_ref().max_abs() }
}

impl<T> Index<(usize, usize)> for LocalMatrix<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(i < self.height && j < self.width, "index ({}, {}) out of bounds", i, j);
        &self.data[i + j * self.ldim]
    }
}

impl<T> IndexMut<(usize, usize)> for LocalMatrix<T> {
    #[inline(always)]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(i < self.height && j < self.width, "index ({}, {}) out of bounds", i, j);
        &mut self.data[i + j * self.ldim]
    }
}

//--------------------------------------------------------------------------------------

impl<T, V: AsRef<[T]>> LocalRef_<T, V> {
    /// # Panics
    ///
    /// Panics if `slice` is too short, or if `ldim < max(height, 1)`.
    pub fn from_parts(slice: V, height: usize, width: usize, ldim: usize) -> Self {
        assert!(ldim >= height.max(1), "ldim {} too small for height {}", ldim, height);
        assert!(slice.as_ref().len() >= required_len(height, width, ldim), "slice too short for view");
        LocalRef_ { slice, height, width, ldim, _marker: PhantomData }
    }

    pub fn height(&self) -> usize { self.height }
    pub fn width(&self) -> usize { self.width }
    pub fn ldim(&self) -> usize { self.ldim }
    pub fn dims(&self) -> (usize, usize) { (self.height, self.width) }
    pub fn is_empty(&self) -> bool { self.height == 0 || self.width == 0 }

    fn check_view(&self, i: usize, j: usize, height: usize, width: usize) {
        assert!(
            i + height <= self.height && j + width <= self.width,
            "view ({}, {}) of size {}x{} exceeds {}x{} matrix",
            i, j, height, width, self.height, self.width,
        );
    }

    fn offset_for_view(&self, i: usize, j: usize, height: usize, width: usize) -> Option<usize> {
        self.check_view(i, j, height, width);
        match (height, width) {
            (0, _) | (_, 0) => None,
            _ => Some(i + j * self.ldim),
        }
    }
}

impl<T: Scalar, V: AsRef<[T]>> LocalRef_<T, V> {
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.height && j < self.width, "index ({}, {}) out of bounds", i, j);
        self.slice.as_ref()[i + j * self.ldim]
    }

    /// Column `j` as a contiguous slice of length `height`.
    pub fn col(&self, j: usize) -> &[T] {
        assert!(j < self.width);
        if self.height == 0 {
            return Default::default();
        }
        let start = j * self.ldim;
        &self.slice.as_ref()[start..start + self.height]
    }

    /// The underlying storage, starting at entry `(0, 0)`.  Entry `(i, j)` is at
    /// `i + j * ldim`.  Empty for empty views.
    pub fn as_slice(&self) -> &[T] { self.slice.as_ref() }

    /// Reborrow as a read-only view.
    pub fn as_local_ref(&self) -> LocalRef<'_, T> {
        LocalRef_ {
            slice: self.slice.as_ref(),
            height: self.height,
            width: self.width,
            ldim: self.ldim,
            _marker: PhantomData,
        }
    }

    pub fn view(&self, i: usize, j: usize, height: usize, width: usize) -> LocalRef<'_, T>
    { self.as_local_ref().into_view(i, j, height, width) }

    pub fn to_local_matrix(&self) -> LocalMatrix<T>
    { LocalMatrix::from_fn(self.height, self.width, |i, j| self.get(i, j)) }

    /// Densely packed column-major copy of the data.
    pub fn to_col_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.height * self.width);
        for j in 0..self.width {
            out.extend_from_slice(self.col(j));
        }
        out
    }

    pub fn max_abs(&self) -> f64 {
        let mut out = 0.0f64;
        for j in 0..self.width {
            for &x in self.col(j) {
                out = out.max(x.abs());
            }
        }
        out
    }
}

impl<'a, T: Scalar> LocalRef<'a, T> {
    /// Like `view`, but keeps the original lifetime.
    pub fn into_view(self, i: usize, j: usize, height: usize, width: usize) -> LocalRef<'a, T> {
        let slice = match self.offset_for_view(i, j, height, width) {
            Some(offset) => &self.slice[offset..],
            None => Default::default(),
        };
        LocalRef_ { slice, height, width, ldim: self.ldim, _marker: PhantomData }
    }
}

impl<'a, T: Scalar> LocalMut<'a, T> {
    /// Like `view_mut`, but keeps the original lifetime.
    pub fn into_view_mut(self, i: usize, j: usize, height: usize, width: usize) -> LocalMut<'a, T> {
        let offset = self.offset_for_view(i, j, height, width);
        let slice = self.slice;
        let slice = match offset {
            Some(offset) => &mut slice[offset..],
            None => Default::default(),
        };
        LocalRef_ { slice, height, width, ldim: self.ldim, _marker: PhantomData }
    }

    pub fn view_mut(&mut self, i: usize, j: usize, height: usize, width: usize) -> LocalMut<'_, T>
    { self.as_local_mut().into_view_mut(i, j, height, width) }

    /// Mutable counterpart of `as_slice`.
    pub fn as_mut_slice(&mut self) -> &mut [T] { &mut *self.slice }

    /// Reborrow.
    pub fn as_local_mut(&mut self) -> LocalMut<'_, T> {
        LocalRef_ {
            slice: &mut *self.slice,
            height: self.height,
            width: self.width,
            ldim: self.ldim,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(i < self.height && j < self.width, "index ({}, {}) out of bounds", i, j);
        self.slice[i + j * self.ldim] = value;
    }

    #[inline(always)]
    pub fn update(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(i < self.height && j < self.width, "index ({}, {}) out of bounds", i, j);
        self.slice[i + j * self.ldim] += value;
    }

    pub fn col_mut(&mut self, j: usize) -> &mut [T] {
        assert!(j < self.width);
        if self.height == 0 {
            return Default::default();
        }
        let start = j * self.ldim;
        &mut self.slice[start..start + self.height]
    }

    pub fn fill(&mut self, value: T) {
        for j in 0..self.width {
            for x in self.col_mut(j) {
                *x = value;
            }
        }
    }

    /// Overwrite with the contents of a matrix of identical shape.
    pub fn copy_from(&mut self, src: LocalRef<'_, T>) {
        assert_eq!(self.dims(), src.dims(), "copy between local matrices of different shapes");
        for j in 0..self.width {
            self.col_mut(j).copy_from_slice(src.col(j));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(height: usize, width: usize) -> LocalMatrix<f64> {
        LocalMatrix::from_fn(height, width, |i, j| (10 * i + j) as f64)
    }

    #[test]
    fn views_index_relative_to_their_corner() {
        let m = counting(5, 4);
        let v = m.view(1, 2, 3, 2);
        assert_eq!(v.dims(), (3, 2));
        assert_eq!(v.get(0, 0), 12.0);
        assert_eq!(v.get(2, 1), 33.0);
        assert_eq!(v.col(1), &[13.0, 23.0, 33.0]);

        let vv = v.view(1, 1, 2, 1);
        assert_eq!(vv.get(1, 0), 33.0);
    }

    #[test]
    fn empty_views_at_the_far_edge() {
        let m = counting(3, 3);
        assert!(m.view(3, 0, 0, 3).is_empty());
        assert!(m.view(0, 3, 3, 0).is_empty());
        assert_eq!(m.view(3, 3, 0, 0).max_abs(), 0.0);
    }

    #[test]
    fn mutable_views_write_through() {
        let mut m = counting(4, 4);
        {
            let mut v = m.view_mut(2, 1, 2, 2);
            v.fill(-1.0);
            v.update(0, 0, 0.5);
        }
        assert_eq!(m[(2, 1)], -0.5);
        assert_eq!(m[(3, 2)], -1.0);
        assert_eq!(m[(1, 1)], 11.0);
        assert_eq!(m[(2, 3)], 23.0);
    }

    #[test]
    fn resize_reuses_allocation() {
        let mut m = counting(6, 6);
        let cap = m.buffer().len();
        m.resize(3, 4);
        assert_eq!((m.height(), m.width(), m.ldim()), (3, 4, 3));
        assert!(m.buffer().len() <= cap);
        m.resize(0, 5);
        assert_eq!(m.ldim(), 1);
        assert!(m.as_local_ref().is_empty());
    }

    #[test]
    fn copy_from_view() {
        let src = counting(4, 3);
        let mut dest = LocalMatrix::<f64>::zeros(2, 2);
        dest.as_local_mut().copy_from(src.view(2, 1, 2, 2));
        assert_eq!(dest, LocalMatrix::from_col_major(2, 2, vec![21.0, 31.0, 22.0, 32.0]));
    }
}
