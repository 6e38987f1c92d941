/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Pairwise exchanges between all processes.
//!
//! Both routines here send one package from every process to every other process in a
//! single all-to-all.  Sender and receiver never negotiate: each independently derives
//! which entries travel between them from the two layouts, and both enumerate those
//! entries in increasing global column-major order.  This ordering is the protocol.

use crate::DistInfo;
use distla_comm::CommExt;
use distla_local::{LocalRef, LocalMut, Scalar};

/// Pre-sized, uniformly padded send buffer.
struct Packages<T> {
    data: Vec<T>,
    fill: Vec<usize>,
    size: usize,
}

impl<T: Scalar> Packages<T> {
    fn new(num_procs: usize, size: usize) -> Self {
        Packages { data: vec![T::zero(); num_procs * size], fill: vec![0; num_procs], size }
    }

    fn push(&mut self, dest: usize, value: T) {
        let pos = &mut self.fill[dest];
        assert!(*pos < self.size, "BUG: package for {} overflowed", dest);
        self.data[dest * self.size + *pos] = value;
        *pos += 1;
    }
}

/// Sequential reader over received packages.
struct Received<T> {
    data: Vec<T>,
    next: Vec<usize>,
    size: usize,
}

impl<T: Scalar> Received<T> {
    fn pop(&mut self, source: usize) -> T {
        let pos = &mut self.next[source];
        let value = self.data[source * self.size + *pos];
        *pos += 1;
        value
    }
}

fn all_to_all<T: Scalar>(src: &DistInfo<'_>, packages: Packages<T>) -> Received<T> {
    let grid = src.grid;
    let mut data = vec![T::zero(); packages.data.len()];
    grid.vc_comm().all_to_all(&packages.data, &mut data);
    Received { data, next: vec![0; grid.size()], size: packages.size }
}

/// General redistribution.
///
/// Every process that needs an entry it does not already hold receives it from the
/// lowest-ranked process that holds it.
pub(super) fn exchange<T: Scalar>(
    src: &DistInfo<'_>,
    src_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let grid = src.grid;
    let me = grid.vc_rank();

    // nobody sends more than they have, or receives more than they need
    let package = src.max_local_size().min(dst.max_local_size());
    let mut packages = Packages::new(grid.size(), package);
    for lj in 0..src_local.width() {
        let j = src.global_col(lj);
        for li in 0..src_local.height() {
            let i = src.global_row(li);
            if src.first_owner(i, j) != me {
                continue;
            }
            let value = src_local.get(li, lj);
            for q in dst.owners(i, j) {
                if q != me && !src.owns(q, i, j) {
                    packages.push(q, value);
                }
            }
        }
    }

    let mut received = all_to_all(src, packages);
    for lj in 0..dst_local.width() {
        let j = dst.global_col(lj);
        for li in 0..dst_local.height() {
            let i = dst.global_row(li);
            let value = match src.owns(me, i, j) {
                true => {
                    let (si, sj) = src.local_index_of(me, i, j);
                    src_local.get(si, sj)
                },
                false => received.pop(src.first_owner(i, j)),
            };
            dst_local.set(li, lj, value);
        }
    }
}

/// Reduce the contributions of every owner of each `partial` entry onto every owner
/// of the corresponding `dst` entry, and add `alpha` times the sum.
pub(super) fn sum_scatter<T: Scalar>(
    alpha: T,
    partial: &DistInfo<'_>,
    partial_local: LocalRef<'_, T>,
    dst: &DistInfo<'_>,
    dst_local: &mut LocalMut<'_, T>,
) {
    let grid = partial.grid;
    let me = grid.vc_rank();

    let package = partial.max_local_size().min(dst.max_local_size());
    let mut packages = Packages::new(grid.size(), package);
    for lj in 0..partial_local.width() {
        let j = partial.global_col(lj);
        for li in 0..partial_local.height() {
            let i = partial.global_row(li);
            let value = partial_local.get(li, lj);
            for q in dst.owners(i, j).filter(|&q| q != me) {
                packages.push(q, value);
            }
        }
    }

    let mut received = all_to_all(partial, packages);
    for lj in 0..dst_local.width() {
        let j = dst.global_col(lj);
        for li in 0..dst_local.height() {
            let i = dst.global_row(li);
            let mut sum = T::zero();
            for s in partial.owners(i, j) {
                sum += match s == me {
                    true => {
                        let (pi, pj) = partial.local_index_of(me, i, j);
                        partial_local.get(pi, pj)
                    },
                    false => received.pop(s),
                };
            }
            dst_local.update(li, lj, alpha * sum);
        }
    }
}
