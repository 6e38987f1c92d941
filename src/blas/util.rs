/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::AlgoConfig;
use distla_dist::{check_same_grid, DistData, Error, Result, Scalar, Scheme};

/// Common preconditions of the blocked algorithms.  Purely local.
pub(crate) fn check_operands<T: Scalar>(
    op: &'static str,
    config: &AlgoConfig,
    operands: &[(&str, &dyn DistData<T>)],
) -> Result<()> {
    config.validate(op)?;
    let (_, first) = operands[0];
    for &(name, a) in operands {
        check_same_grid(op, first.grid(), a.grid())?;
        if a.scheme() != Scheme::MC_MR {
            return Err(Error::Unsupported {
                op,
                detail: format!("{} is distributed as {}; only [MC,MR] is implemented", name, a.scheme()),
            });
        }
    }
    Ok(())
}

pub(crate) fn dims_string<T: Scalar>(operands: &[(&str, &dyn DistData<T>)]) -> String {
    operands.iter()
        .map(|&(name, a)| format!("{} ~ {}x{}", name, a.height(), a.width()))
        .collect::<Vec<_>>()
        .join(", ")
}
