/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Local reshuffling of data to and from transfer buffers.
//!
//! Nothing here communicates.  A redistribution packs what each destination needs into
//! one contiguous package per destination, moves the packages, and unpacks them.

use crate::DistInfo;
use distla_local::{LocalRef, LocalMut, Scalar};

/// Copy a `height x width` grid of elements between two strided layouts.
///
/// Element `(i, j)` is read from `src[i * src_strides.0 + j * src_strides.1]` and
/// written to `dst[i * dst_strides.0 + j * dst_strides.1]`.
pub fn interleave<T: Copy>(
    height: usize,
    width: usize,
    src: &[T],
    src_strides: (usize, usize),
    dst: &mut [T],
    dst_strides: (usize, usize),
) {
    let (src_cs, src_rs) = src_strides;
    let (dst_cs, dst_rs) = dst_strides;
    for j in 0..width {
        for i in 0..height {
            dst[i * dst_cs + j * dst_rs] = src[i * src_cs + j * src_rs];
        }
    }
}

/// The entries of a full (undistributed) matrix that one process owns under some
/// distribution: rows `col_shift, col_shift + col_stride, ...` and likewise for columns.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StridedBlock {
    pub height: usize,
    pub width: usize,
    pub col_shift: usize,
    pub col_stride: usize,
    pub row_shift: usize,
    pub row_stride: usize,
}

impl StridedBlock {
    /// The block owned by the process of the given VC rank.
    pub fn of(info: &DistInfo<'_>, vc_rank: usize) -> StridedBlock {
        StridedBlock {
            height: info.local_height_of(vc_rank),
            width: info.local_width_of(vc_rank),
            col_shift: info.col_shift_of(vc_rank),
            col_stride: info.col_stride(),
            row_shift: info.row_shift_of(vc_rank),
            row_stride: info.row_stride(),
        }
    }

    /// Every entry of a `height x width` matrix.
    pub fn whole(height: usize, width: usize) -> StridedBlock {
        StridedBlock { height, width, col_shift: 0, col_stride: 1, row_shift: 0, row_stride: 1 }
    }

    pub fn len(&self) -> usize { self.height * self.width }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn strides_in(&self, ldim: usize) -> (usize, (usize, usize)) {
        let offset = self.col_shift + self.row_shift * ldim;
        (offset, (self.col_stride, self.row_stride * ldim))
    }
}

/// Gather the entries of `block` out of the full matrix `src` into the front of
/// `packed`, column-major.
pub fn strided_pack<T: Scalar>(block: &StridedBlock, src: LocalRef<'_, T>, packed: &mut [T]) {
    if block.is_empty() {
        return;
    }
    let (offset, strides) = block.strides_in(src.ldim());
    let (height, width) = (block.height, block.width);
    interleave(height, width, &src.as_slice()[offset..], strides, packed, (1, height));
}

/// Inverse of [`strided_pack`]: scatter a package back into the positions of `block`
/// within the full matrix `dst`.
pub fn strided_unpack<T: Scalar>(block: &StridedBlock, packed: &[T], dst: &mut LocalMut<'_, T>) {
    if block.is_empty() {
        return;
    }
    let (offset, strides) = block.strides_in(dst.ldim());
    let (height, width) = (block.height, block.width);
    interleave(height, width, packed, (1, height), &mut dst.as_mut_slice()[offset..], strides);
}

/// Column-major copy of a whole local matrix into the front of `packed`.
pub fn pack_whole<T: Scalar>(src: LocalRef<'_, T>, packed: &mut [T]) {
    strided_pack(&StridedBlock::whole(src.height(), src.width()), src, packed)
}

/// Inverse of [`pack_whole`].
pub fn unpack_whole<T: Scalar>(packed: &[T], dst: &mut LocalMut<'_, T>) {
    strided_unpack(&StridedBlock::whole(dst.height(), dst.width()), packed, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use distla_local::LocalMatrix;
    use itertools::iproduct;

    fn counting(height: usize, width: usize) -> LocalMatrix<f64> {
        LocalMatrix::from_fn(height, width, |i, j| (100 * i + j) as f64)
    }

    #[test]
    fn pack_picks_strided_entries() {
        let full = counting(7, 5);
        let block = StridedBlock { height: 2, width: 2, col_shift: 1, col_stride: 3, row_shift: 2, row_stride: 2 };
        // packages may be padded; the tail is left alone
        let mut packed = vec![0.0; 6];
        strided_pack(&block, full.as_local_ref(), &mut packed);
        assert_eq!(packed, vec![
            102.0, 402.0,
            104.0, 404.0,
            0.0, 0.0,
        ]);
    }

    #[test]
    fn unpack_inverts_pack() {
        let full = counting(7, 5);
        let mut rebuilt = LocalMatrix::<f64>::zeros(7, 5);
        // blocks of a 3x2 cyclic distribution tile the matrix exactly once
        for (col_shift, row_shift) in iproduct!(0..3, 0..2) {
            let block = StridedBlock {
                height: crate::dist::length(7, col_shift, 3),
                width: crate::dist::length(5, row_shift, 2),
                col_shift, col_stride: 3,
                row_shift, row_stride: 2,
            };
            let mut packed = vec![-1.0; block.len()];
            strided_pack(&block, full.as_local_ref(), &mut packed);
            strided_unpack(&block, &packed, &mut rebuilt.as_local_mut());
        }
        assert_eq!(rebuilt, full);
    }

    #[test]
    fn whole_matrix_of_a_view() {
        let full = counting(4, 4);
        let mut packed = vec![0.0; 4];
        pack_whole(full.view(1, 2, 2, 2), &mut packed);
        assert_eq!(packed, vec![102.0, 202.0, 103.0, 203.0]);

        let mut dest = LocalMatrix::<f64>::zeros(3, 3);
        unpack_whole(&packed, &mut dest.view_mut(1, 1, 2, 2));
        assert_eq!(dest.to_col_major(), vec![
            0.0, 0.0, 0.0,
            0.0, 102.0, 202.0,
            0.0, 103.0, 203.0,
        ]);
    }
}
