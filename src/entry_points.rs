/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use crate::{FailResult, GlobalLogger, RunConfig};
use crate::blas::{Diagonal, Orientation, Side, Uplo};
use crate::comm::{Communicator, LocalUniverse};
use crate::dist::{DistData, DistDataMut, DistMatrix, Grid, Scheme};
use crate::local::{kernels, LocalMatrix};

use std::ffi::OsStr;

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if std::env::var_os("RUST_BACKTRACE") == Some(OsStr::new("1").to_owned()) {
            error!("{}", e.backtrace());
        }
        std::process::exit(1);
    });
}

fn app<'a, 'b>() -> clap::App<'a, 'b> {
    use clap::Arg;

    let app = clap::App::new("distla-trmm-check")
        .version(clap::crate_version!())
        .about("Checks the distributed triangular multiply against a single-process reference.")
        .args(&[
            Arg::with_name("config").short("c").long("config").takes_value(true).value_name("FILE")
                .help("config yaml; flags given below take precedence"),
            Arg::with_name("grid").long("grid").takes_value(true).value_name("RxC")
                .help("process grid, e.g. 2x3"),
            Arg::with_name("m").short("m").takes_value(true).value_name("M")
                .help("order of the triangular matrix"),
            Arg::with_name("n").short("n").takes_value(true).value_name("N")
                .help("number of columns of X"),
            Arg::with_name("blocksize").long("blocksize").takes_value(true).value_name("NB")
                .help("panel width"),
            Arg::with_name("alpha").long("alpha").takes_value(true).value_name("ALPHA")
                .allow_hyphen_values(true)
                .help("scale factor"),
            Arg::with_name("seed").long("seed").takes_value(true).value_name("SEED")
                .help("seed for the random operands"),
            Arg::with_name("tolerance").long("tolerance").takes_value(true).value_name("TOL")
                .help("largest acceptable max-norm error"),
            Arg::with_name("unit_diagonal").long("unit-diagonal")
                .help("take the diagonal of the triangle to be ones"),
            Arg::with_name("log").long("log").takes_value(true).value_name("FILE")
                .help("also write the log to this file"),
            Arg::with_name("verbose").short("v").long("verbose").multiple(true)
                .help("more logging from the library (repeatable)"),
        ]);

    #[cfg(feature = "mpi-support")]
    let app = app.arg(Arg::with_name("mpi").long("mpi").help("run on MPI_COMM_WORLD instead of threads"));

    app
}

fn resolve_config(matches: &clap::ArgMatches<'_>) -> FailResult<RunConfig>
{
    let mut config = match matches.value_of("config") {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    config.override_from_args(matches)?;
    config.validate()?;
    Ok(config)
}

/// The outcome of one check, identical on every process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutcome {
    pub max_error: f64,
    pub max_reference: f64,
}

/// Compute `alpha L X` both with `trmm_lln` and on one process, and compare.
///
/// Collective over `comm`, whose size must match `config.grid`.
pub fn run_trmm_check(comm: impl Communicator + 'static, config: &RunConfig) -> crate::Result<CheckOutcome>
{
    let [rows, cols] = config.grid;
    let grid = Grid::with_shape(comm, rows, cols)?;
    let diag = match config.unit_diagonal {
        true => Diagonal::Unit,
        false => Diagonal::NonUnit,
    };

    let mut l = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, config.m, config.m);
    l.set_to_random(config.seed);
    l.make_trapezoidal(Uplo::Lower, 0);
    let mut x = DistMatrix::<f64>::zeros(&grid, Scheme::MC_MR, config.m, config.n);
    x.set_to_random(config.seed.wrapping_add(1));

    let mut expected = x.to_local_matrix();
    kernels::trmm(
        Side::Left, Uplo::Lower, Orientation::Normal, diag,
        config.alpha, l.to_local_matrix().as_local_ref(), &mut expected.as_local_mut(),
    );

    crate::blas::trmm_lln(diag, config.alpha, &l, &mut x, &config.algo)?;

    Ok(CheckOutcome {
        max_error: max_abs_difference(&x.to_local_matrix(), &expected),
        max_reference: expected.max_abs(),
    })
}

fn max_abs_difference(a: &LocalMatrix<f64>, b: &LocalMatrix<f64>) -> f64 {
    a.to_col_major().iter().zip(b.to_col_major())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

fn on_threads(config: &RunConfig) -> crate::Result<CheckOutcome>
{
    info!("running on {} threads", config.num_procs());
    LocalUniverse::run(config.num_procs(), |comm| {
        let is_root = comm.rank() == 0;
        let outcome = run_trmm_check(comm, config);
        if is_root {
            if let Ok(outcome) = &outcome {
                debug!("rank 0: {:?}", outcome);
            }
        }
        outcome
    }).into_iter().next().expect("BUG: universe has at least one process")
}

#[cfg(feature = "mpi-support")]
fn on_mpi(config: &RunConfig) -> FailResult<Option<CheckOutcome>>
{
    use crate::comm::MpiComm;

    let result = MpiComm::with_world(|world| {
        let is_root = world.rank() == 0;
        run_trmm_check(world, config).map(|outcome| match is_root {
            true => Some(outcome),
            false => None,
        })
    });
    match result {
        Some(result) => Ok(result?),
        None => bail!("MPI was already initialized"),
    }
}

// %% CRATES: binary: distla-trmm-check %%
pub fn trmm_check() {
    wrap_result_main(|| {
        let matches = app().get_matches();

        let mut logger = GlobalLogger::default();
        logger.verbosity(matches.occurrences_of("verbose") as i32);
        if let Some(path) = matches.value_of("log") {
            logger.path(path);
        }
        logger.apply()?;

        let config = resolve_config(&matches)?;
        let [rows, cols] = config.grid;
        info!(
            "trmm_lln: m = {}, n = {}, grid {}x{}, blocksize {}, {} diagonal",
            config.m, config.n, rows, cols, config.algo.blocksize,
            match config.unit_diagonal { true => "unit", false => "non-unit" },
        );

        #[cfg(feature = "mpi-support")]
        let outcome = match matches.is_present("mpi") {
            true => on_mpi(&config)?,
            false => Some(on_threads(&config)?),
        };
        #[cfg(not(feature = "mpi-support"))]
        let outcome = Some(on_threads(&config)?);

        // only rank 0 reports under MPI
        if let Some(CheckOutcome { max_error, max_reference }) = outcome {
            info!("||X - X_ref||_max = {:e} (||X_ref||_max = {:e})", max_error, max_reference);
            if !(max_error <= config.tolerance) {
                bail!("error {:e} exceeds tolerance {:e}", max_error, config.tolerance);
            }
            info!("ok");
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::AlgoConfig;

    #[test]
    fn check_passes_on_several_grids() {
        for &grid in &[[1, 1], [2, 2], [3, 2]] {
            let config = RunConfig { grid, m: 11, n: 3, algo: AlgoConfig::with_blocksize(4), ..Default::default() };
            let outcome = on_threads(&config).unwrap();
            assert!(outcome.max_error <= 1e-12, "{:?}", outcome);
            assert!(outcome.max_reference > 0.0);
        }
    }

    #[test]
    fn flags_override_the_file() {
        let matches = app().get_matches_from(vec![
            "distla-trmm-check", "--grid", "3x1", "-m", "5", "--unit-diagonal", "-vv",
        ]);
        let config = resolve_config(&matches).unwrap();
        assert_eq!(config.grid, [3, 1]);
        assert_eq!(config.m, 5);
        assert_eq!(config.n, RunConfig::default().n);
        assert!(config.unit_diagonal);
        assert_eq!(matches.occurrences_of("verbose"), 2);
    }

    #[test]
    fn bad_blocksize_is_rejected() {
        let matches = app().get_matches_from(vec!["distla-trmm-check", "--blocksize", "0"]);
        assert!(resolve_config(&matches).is_err());
    }
}
