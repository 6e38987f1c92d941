/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

//! Moving data between distributions.
//!
//! Every routine here is collective over the whole grid.  All preconditions are checked
//! before the first message is sent, so that an invalid call fails on every process
//! rather than leaving some of them stuck in a collective.

use crate::{DistData, DistDataMut, DistInfo, Grid, Result, Scheme};
use crate::grid::check_same_grid;
use distla_local::{LocalMatrix, LocalRef, Scalar};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub use self::pack::{interleave, strided_pack, strided_unpack, pack_whole, unpack_whole, StridedBlock};
mod pack;

mod collectives;
mod exchange;

/// The communication pattern used by [`redistribute`] for a pair of layouts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    /// Identical layouts.
    LocalCopy,
    /// The source is `[*,*]`, so every process already has what it needs.
    Filter,
    /// `[o,o]` to `[o,o]` with a different root.
    MoveRoot,
    /// From `[o,o]`.
    Scatter,
    /// To `[o,o]`.
    Gather,
    /// To `[*,*]`.
    AllGather,
    /// Anything else: a pairwise exchange between all processes.
    Exchange,
}

/// Decide how to get from one layout to another, or why we can't.
///
/// Scatter and gather only handle a `[o,o]` counterpart in which every process owns a
/// distinct piece (trivial cross and redundant teams).  Other configurations involving
/// a single-process matrix fail with `Unsupported`; route them through an intermediate
/// distribution instead.  The team check looks at the distributed side of the pair, since
/// the `[o,o]` side always has trivial teams.
pub fn choose_path(src: &DistInfo<'_>, dst: &DistInfo<'_>) -> Result<Path> {
    let grid = src.grid;
    if src.same_layout(dst) {
        return Ok(Path::LocalCopy);
    }
    if src.scheme == Scheme::STAR_STAR {
        return Ok(Path::Filter);
    }
    match (src.scheme.is_circ(), dst.scheme.is_circ()) {
        (true, true) => Ok(Path::MoveRoot),
        (true, false) => {
            check_trivial_teams("scatter", dst.scheme, grid)?;
            Ok(Path::Scatter)
        },
        (false, true) => {
            check_trivial_teams("gather", src.scheme, grid)?;
            Ok(Path::Gather)
        },
        (false, false) => match dst.scheme == Scheme::STAR_STAR {
            true => Ok(Path::AllGather),
            false => Ok(Path::Exchange),
        },
    }
}

fn check_trivial_teams(op: &'static str, scheme: Scheme, grid: &Grid) -> Result<()> {
    if scheme.cross_size(grid) != 1 {
        return Err(unsupported!(op, "non-trivial cross teams ({})", scheme));
    }
    if scheme.redundant_size(grid) != 1 {
        return Err(unsupported!(op, "non-trivial redundant teams ({} on a {}x{} grid)", scheme, grid.height(), grid.width()));
    }
    Ok(())
}

fn check_conformal(op: &'static str, a: &DistInfo<'_>, b: &DistInfo<'_>) -> Result<()> {
    check_same_grid(op, a.grid, b.grid)?;
    if (a.height, a.width) != (b.height, b.width) {
        return Err(nonconformal!(op, "{}x{} vs {}x{}", a.height, a.width, b.height, b.width));
    }
    Ok(())
}

/// In debug builds, panic unless every process is making the same call.  Collective.
///
/// A mismatch means the processes have diverged, and the next collective would hang or
/// silently pair up the wrong messages.
pub(crate) fn check_collective(grid: &Grid, op: &str, infos: &[&DistInfo<'_>], extra: impl Hash) {
    if cfg!(debug_assertions) {
        let mut hasher = DefaultHasher::new();
        op.hash(&mut hasher);
        for info in infos {
            info.fingerprint(&mut hasher);
        }
        extra.hash(&mut hasher);
        grid.assert_consensus(op, hasher.finish());
    }
}

/// Copy the contents of `src` into `dst`, which may be laid out differently.
/// Both must have the same shape and grid.  Collective.
pub fn redistribute<T: Scalar>(src: &impl DistData<T>, dst: &mut impl DistDataMut<T>) -> Result<()> {
    let src_info = src.info();
    let src_local = src.local();
    let (dst_info, mut dst_local) = dst.parts_mut();

    check_conformal("redistribute", &src_info, &dst_info)?;
    let path = choose_path(&src_info, &dst_info)?;
    check_collective(src_info.grid, "redistribute", &[&src_info, &dst_info], ());
    debug!("redistribute {} -> {} ({}x{}): {:?}", src_info.scheme, dst_info.scheme, src_info.height, src_info.width, path);

    match path {
        Path::LocalCopy => dst_local.copy_from(src_local),
        Path::Filter => collectives::filter(src_local, &dst_info, &mut dst_local),
        Path::MoveRoot => collectives::move_root(&src_info, src_local, &dst_info, &mut dst_local),
        Path::Scatter => collectives::scatter(&src_info, src_local, &dst_info, &mut dst_local),
        Path::Gather => collectives::gather(&src_info, src_local, &dst_info, &mut dst_local),
        Path::AllGather => collectives::all_gather(&src_info, src_local, &mut dst_local),
        Path::Exchange => exchange::exchange(&src_info, src_local, &dst_info, &mut dst_local),
    }
    Ok(())
}

/// `dst += alpha * (sum of every process's contribution)`.  Collective.
///
/// Each entry of `partial` is a contribution from every process that stores it, which
/// need not agree (typically each holds a partial sum from a local kernel).  Each
/// process of `dst` that stores an entry receives all the contributions for it and adds
/// them in ascending VC rank order, so the result is the same on every copy and does
/// not depend on timing.
pub fn sum_scatter_update<T: Scalar>(
    alpha: T,
    partial: &impl DistData<T>,
    dst: &mut impl DistDataMut<T>,
) -> Result<()> {
    let src_info = partial.info();
    let src_local = partial.local();
    let (dst_info, mut dst_local) = dst.parts_mut();

    check_conformal("sum_scatter_update", &src_info, &dst_info)?;
    check_collective(src_info.grid, "sum_scatter_update", &[&src_info, &dst_info], ());
    debug!("sum_scatter_update {} -> {} ({}x{})", src_info.scheme, dst_info.scheme, src_info.height, src_info.width);

    exchange::sum_scatter(alpha, &src_info, src_local, &dst_info, &mut dst_local);
    Ok(())
}

/// The full matrix on every process.  Collective.
pub(crate) fn to_local_matrix<T: Scalar>(info: &DistInfo<'_>, local: LocalRef<'_, T>) -> LocalMatrix<T> {
    check_collective(info.grid, "to_local_matrix", &[info], ());
    let mut out = LocalMatrix::zeros(info.height, info.width);
    match info.scheme {
        Scheme::STAR_STAR => out.as_local_mut().copy_from(local),
        Scheme::CIRC_CIRC => collectives::broadcast_from_root(info, local, &mut out.as_local_mut()),
        _ => collectives::all_gather(info, local, &mut out.as_local_mut()),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DistMatrix, Error};
    use distla_comm::LocalUniverse;

    #[test]
    fn path_selection() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let info = |scheme| DistInfo { grid: &grid, scheme, height: 5, width: 5, col_align: 0, row_align: 0, root: 0 };

            let mc_mr = info(Scheme::MC_MR);
            let circ = info(Scheme::CIRC_CIRC);
            assert_eq!(choose_path(&mc_mr, &mc_mr), Ok(Path::LocalCopy));
            assert_eq!(choose_path(&info(Scheme::STAR_STAR), &mc_mr), Ok(Path::Filter));
            assert_eq!(choose_path(&info(Scheme::STAR_STAR), &circ), Ok(Path::Filter));
            assert_eq!(choose_path(&circ, &mc_mr), Ok(Path::Scatter));
            assert_eq!(choose_path(&info(Scheme::VC_STAR), &circ), Ok(Path::Gather));
            assert_eq!(choose_path(&mc_mr, &info(Scheme::STAR_STAR)), Ok(Path::AllGather));
            assert_eq!(choose_path(&mc_mr, &info(Scheme::MR_MC)), Ok(Path::Exchange));
            assert_eq!(choose_path(&circ, &DistInfo { root: 2, ..circ }), Ok(Path::MoveRoot));

            let shifted = DistInfo { col_align: 1, ..mc_mr };
            assert_eq!(choose_path(&mc_mr, &shifted), Ok(Path::Exchange));
        });
    }

    #[test]
    fn scatter_refuses_redundant_targets() {
        let results = LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let mut src = DistMatrix::<f64>::with_scheme(&grid, Scheme::CIRC_CIRC);
            src.resize(4, 4);
            let mut dst = DistMatrix::<f64>::with_scheme(&grid, Scheme::MC_STAR);
            dst.resize(4, 4);
            redistribute(&src, &mut dst).unwrap_err()
        });
        for e in results {
            assert!(e.is_recoverable());
            assert_eq!(e.op(), "scatter");
        }
    }

    #[test]
    fn team_check_follows_the_distributed_side() {
        LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let info = |scheme| DistInfo { grid: &grid, scheme, height: 4, width: 4, col_align: 0, row_align: 0, root: 0 };
            let circ = info(Scheme::CIRC_CIRC);

            // [MC,*] is replicated over process rows; [VC,*] is not
            assert_eq!(choose_path(&circ, &info(Scheme::MC_STAR)).unwrap_err().op(), "scatter");
            assert_eq!(choose_path(&info(Scheme::MC_STAR), &circ).unwrap_err().op(), "gather");
            assert_eq!(choose_path(&circ, &info(Scheme::VC_STAR)), Ok(Path::Scatter));
            assert_eq!(choose_path(&info(Scheme::VC_STAR), &circ), Ok(Path::Gather));
        });
    }

    #[test]
    fn shape_mismatch_is_caught_everywhere() {
        let results = LocalUniverse::run(4, |comm| {
            let grid = Grid::new(comm).unwrap();
            let src = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, 3, 3);
            let mut dst = DistMatrix::<f64>::zeros(&grid, Scheme::VR_STAR, 3, 4);
            redistribute(&src, &mut dst).unwrap_err()
        });
        for e in results {
            assert!(matches!(e, Error::Nonconformal { op: "redistribute", .. }));
        }
    }
}
