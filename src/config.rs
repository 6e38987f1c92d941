/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::FailResult;
use crate::blas::AlgoConfig;

use std::path::Path;

/// Settings for `distla-trmm-check`.
///
/// Read from YAML; any field may be omitted.  Command line flags are applied on top
/// with [`RunConfig::override_from_args`].
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    /// Process grid as `[rows, cols]`.
    #[serde(default = "self::defaults::grid")]
    pub grid: [usize; 2],

    /// Order of the triangular matrix.
    #[serde(default = "self::defaults::m")]
    pub m: usize,

    /// Number of right hand sides.
    #[serde(default = "self::defaults::n")]
    pub n: usize,

    #[serde(default)]
    pub algo: AlgoConfig,

    #[serde(default = "self::defaults::alpha")]
    pub alpha: f64,

    #[serde(default)]
    pub seed: u64,

    /// Treat the diagonal of the triangle as ones.
    #[serde(default)]
    pub unit_diagonal: bool,

    /// Largest acceptable `max |X - X_ref|`.
    #[serde(default = "self::defaults::tolerance")]
    pub tolerance: f64,
}

mod defaults {
    pub(crate) fn grid() -> [usize; 2] { [2, 2] }
    pub(crate) fn m() -> usize { 64 }
    pub(crate) fn n() -> usize { 16 }
    pub(crate) fn alpha() -> f64 { 1.0 }
    pub(crate) fn tolerance() -> f64 { 1e-10 }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            grid: defaults::grid(),
            m: defaults::m(),
            n: defaults::n(),
            algo: AlgoConfig::default(),
            alpha: defaults::alpha(),
            seed: 0,
            unit_diagonal: false,
            tolerance: defaults::tolerance(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> FailResult<Self>
    {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Apply the flags that were given explicitly.
    pub fn override_from_args(&mut self, matches: &clap::ArgMatches<'_>) -> FailResult<()>
    {
        if let Some(s) = matches.value_of("grid") {
            self.grid = parse_grid(s)?;
        }
        if let Some(s) = matches.value_of("m") {
            self.m = s.parse()?;
        }
        if let Some(s) = matches.value_of("n") {
            self.n = s.parse()?;
        }
        if let Some(s) = matches.value_of("blocksize") {
            self.algo.blocksize = s.parse()?;
        }
        if let Some(s) = matches.value_of("alpha") {
            self.alpha = s.parse()?;
        }
        if let Some(s) = matches.value_of("seed") {
            self.seed = s.parse()?;
        }
        if let Some(s) = matches.value_of("tolerance") {
            self.tolerance = s.parse()?;
        }
        if matches.is_present("unit_diagonal") {
            self.unit_diagonal = true;
        }
        Ok(())
    }

    pub fn validate(&self) -> FailResult<()>
    {
        let [rows, cols] = self.grid;
        if rows == 0 || cols == 0 {
            bail!("grid must have at least one row and column (got {}x{})", rows, cols);
        }
        if !(self.tolerance >= 0.0) {
            bail!("tolerance must be non-negative (got {})", self.tolerance);
        }
        self.algo.validate("RunConfig::validate")?;
        Ok(())
    }

    pub fn num_procs(&self) -> usize { self.grid[0] * self.grid[1] }
}

/// Parse `"RxC"`.
pub(crate) fn parse_grid(s: &str) -> FailResult<[usize; 2]>
{
    let parts: Vec<_> = s.split('x').collect();
    match parts[..] {
        [rows, cols] => Ok([rows.trim().parse()?, cols.trim().parse()?]),
        _ => bail!("expected a grid shape like '2x3', got {:?}", s),
    }
}
