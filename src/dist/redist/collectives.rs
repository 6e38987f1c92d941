/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Redistributions in which one side is `[o,o]` or `[*,*]`.

use super::pack::{StridedBlock, strided_pack, strided_unpack, pack_whole, unpack_whole};
use crate::DistInfo;
use distla_comm::{Communicator, CommExt, this_process_is_root};
use distla_local::{LocalRef, LocalMut, Scalar};

/// `[*,*]` source: keep the entries we are supposed to own.
pub(super) fn filter<T: Scalar>(
    src_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let block = StridedBlock::of(dst, dst.grid.vc_rank());
    let mut packed = vec![T::zero(); block.len()];
    strided_pack(&block, src_local, &mut packed);
    unpack_whole(&packed, dst_local);
}

/// Ship the whole matrix from one root to another.
///
/// Only the two roots exchange data; everybody else just takes part in the split.
pub(super) fn move_root<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let vc_comm = src.grid.vc_comm();
    let is_src = this_process_is_root(vc_comm, src.root);
    let is_dst = this_process_is_root(vc_comm, dst.root);

    // the source root gets rank 0 in the pair
    let pair = vc_comm.split((!(is_src || is_dst)) as usize, (!is_src) as usize);
    if is_src || is_dst {
        debug_assert_eq!(pair.size(), 2);
        let mut buf = vec![T::zero(); src.height * src.width];
        if is_src {
            pack_whole(src_local, &mut buf);
        }
        pair.broadcast(0, &mut buf);
        if is_dst {
            unpack_whole(&buf, dst_local);
        }
    }
}

// the root's matrix, column-major, on every process
fn broadcast_whole<T: Scalar>(src: &DistInfo<'_>, src_local: LocalRef<'_, T>) -> Vec<T> {
    let grid = src.grid;
    let mut buf = vec![T::zero(); src.height * src.width];
    if this_process_is_root(grid.vc_comm(), src.root) {
        pack_whole(src_local, &mut buf);
    }
    grid.vc_comm().broadcast(src.root, &mut buf);
    buf
}

/// `[o,o]` to a distribution where each process owns a distinct piece.
///
/// The root cuts its matrix into one package per process, laid out exactly as the
/// receiver stores it.
pub(super) fn scatter<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let grid = src.grid;
    let package = dst.max_local_size();
    let send = match this_process_is_root(grid.vc_comm(), src.root) {
        true => {
            let mut send = vec![T::zero(); package * grid.size()];
            for (q, chunk) in send.chunks_mut(package.max(1)).enumerate() {
                strided_pack(&StridedBlock::of(dst, q), src_local, chunk);
            }
            send
        },
        false => vec![],
    };
    let mut recv = vec![T::zero(); package];
    grid.vc_comm().scatter(src.root, &send, &mut recv);
    unpack_whole(&recv, dst_local);
}

/// Inverse of [`scatter`].
pub(super) fn gather<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let grid = src.grid;
    let package = src.max_local_size();
    let mut send = vec![T::zero(); package];
    pack_whole(src_local, &mut send);

    let is_root = this_process_is_root(grid.vc_comm(), dst.root);
    let mut recv = vec![T::zero(); if is_root { package * grid.size() } else { 0 }];
    grid.vc_comm().gather(dst.root, &send, &mut recv);
    if is_root {
        for q in 0..grid.size() {
            strided_unpack(&StridedBlock::of(src, q), &recv[q * package..], dst_local);
        }
    }
}

/// Assemble the full matrix on every process.  `full` must be `height x width`.
///
/// Entries stored redundantly arrive more than once; all copies are equal.
pub(super) fn all_gather<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    full: &mut LocalMut<'_, T>,
) {
    let grid = src.grid;
    let package = src.max_local_size();
    let mut send = vec![T::zero(); package];
    pack_whole(src_local, &mut send);

    let mut recv = vec![T::zero(); package * grid.size()];
    grid.vc_comm().all_gather(&send, &mut recv);
    for q in (0..grid.size()).filter(|&q| src.participates(q)) {
        strided_unpack(&StridedBlock::of(src, q), &recv[q * package..], full);
    }
}

/// Copy a `[o,o]` matrix onto every process.  `full` must be `height x width`.
pub(super) fn broadcast_from_root<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    full: &mut LocalMut<'_, T>,
) {
    unpack_whole(&broadcast_whole(src, src_local), full);
}
