use clap::{Parser, Subcommand};
use eos_export::{
    write_archive, write_athtab, write_lorene, write_number_fractions, write_reduced_archive,
    write_reduced_athtab, ExportError, NqtConfig, NqtTable,
};
use eos_solver::{make_beta_eq_table, BetaSolveConfig, SolverError};
use eos_table::{
    dd2_registry, AxisId, FiniteDifferenceModel, GridTolerance, ReducedEosTable, TableError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

mod compose;

use compose::ComposeError;

#[derive(Parser)]
#[command(name = "eostab")]
#[command(about = "EOS table tool - derive, validate, reduce, and export nuclear-matter tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a CompOSE table directory
    Convert {
        /// Directory holding eos.nb, eos.t, eos.yq, eos.thermo, eos.compo
        compose_dir: PathBuf,
        /// Base directory where the EOS output folder is created
        output_dir: PathBuf,
        /// Name of the equation of state (e.g. DD2)
        #[arg(long)]
        eos_name: String,
        /// Write the general table archive
        #[arg(long)]
        archive: bool,
        /// Write AthenaK table output
        #[arg(long)]
        athtab: bool,
        /// Write Lorene table output
        #[arg(long)]
        lorene: bool,
        /// Solve beta equilibrium on the coldest slice and write cold outputs
        #[arg(long)]
        cold: bool,
        /// Build the NQT fast-lookup file from the archive
        #[arg(long)]
        nqt: bool,
        /// Sound-speed floor in units of c^2
        #[arg(long, default_value_t = 1e-6)]
        cs2_floor: f64,
        /// Relative tolerance for the equal-spacing grid check
        #[arg(long, default_value_t = 1e-6)]
        spacing_tol: f64,
        /// NQT polynomial order
        #[arg(long, default_value_t = 2)]
        nqt_order: usize,
        /// Select NQT segments by comparison scan instead of exponent bits
        #[arg(long)]
        no_bithacks: bool,
    },
    /// Read a CompOSE directory, compute derived fields, and validate
    Validate {
        /// Directory holding the CompOSE table files
        compose_dir: PathBuf,
        /// Sound-speed floor in units of c^2
        #[arg(long, default_value_t = 1e-6)]
        cs2_floor: f64,
    },
    /// Build an NQT fast-lookup file from an existing table archive
    Nqt {
        /// Path to a table archive written by `convert --archive`
        archive: PathBuf,
        /// Output path for the lookup file
        output: PathBuf,
        /// Polynomial order
        #[arg(long, default_value_t = 2)]
        order: usize,
        /// Select segments by comparison scan instead of exponent bits
        #[arg(long)]
        no_bithacks: bool,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Fatal(String),
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            compose_dir,
            output_dir,
            eos_name,
            archive,
            athtab,
            lorene,
            cold,
            nqt,
            cs2_floor,
            spacing_tol,
            nqt_order,
            no_bithacks,
        } => cmd_convert(&ConvertArgs {
            compose_dir,
            output_dir,
            eos_name,
            archive,
            athtab,
            lorene,
            cold,
            nqt,
            cs2_floor,
            spacing_tol,
            nqt_order,
            no_bithacks,
        }),
        Commands::Validate {
            compose_dir,
            cs2_floor,
        } => cmd_validate(&compose_dir, cs2_floor),
        Commands::Nqt {
            archive,
            output,
            order,
            no_bithacks,
        } => cmd_nqt(&archive, &output, order, !no_bithacks),
    }
}

struct ConvertArgs {
    compose_dir: PathBuf,
    output_dir: PathBuf,
    eos_name: String,
    archive: bool,
    athtab: bool,
    lorene: bool,
    cold: bool,
    nqt: bool,
    cs2_floor: f64,
    spacing_tol: f64,
    nqt_order: usize,
    no_bithacks: bool,
}

fn prepared_dir(base: &Path, sub: &str) -> Result<PathBuf, CliError> {
    let dir = base.join(sub);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn cmd_convert(args: &ConvertArgs) -> Result<(), CliError> {
    let registry = Arc::new(dd2_registry());
    let mut table =
        compose::read_compose_dir(&args.compose_dir, registry, Some(args.spacing_tol))?;
    let model = FiniteDifferenceModel;

    table.compute_cs2(&model, args.cs2_floor);
    table.compute_abar();
    table.validate(args.cs2_floor, &GridTolerance::default())?;

    // Drop the highest temperature plane, then trim to the longest
    // contiguous valid density range.
    let table = table.restrict_idx(AxisId::T, None, Some(-1))?;
    let table = table.shrink_to_valid_nb()?;
    let (n_nb, n_t, n_yq) = table.shape();
    println!("Table ready: {n_nb} x {n_t} x {n_yq} (nb x t x yq)");

    let eos_dir = args.output_dir.join(&args.eos_name);
    fs::create_dir_all(&eos_dir)?;

    let archive_path = if args.archive {
        let dir = prepared_dir(&eos_dir, "ARCHIVE")?;
        let path = dir.join(format!("{}.eostab", args.eos_name));
        write_archive(&table, &path)?;
        Some(path)
    } else {
        None
    };
    if args.athtab {
        let dir = prepared_dir(&eos_dir, "ATHTAB")?;
        write_athtab(&table, &dir.join(format!("{}.athtab", args.eos_name)))?;
    }

    if args.cold {
        let cold = solve_cold(&table, &model)?;
        let stem = format!("{}_T{}_beta", args.eos_name, cold.t_value());
        println!("Writing cold beta-equilibrium EOS files...");
        if args.archive {
            let dir = prepared_dir(&eos_dir, "ARCHIVE")?;
            write_reduced_archive(&cold, &dir.join(format!("{stem}.eostab")))?;
        }
        if args.lorene {
            let dir = prepared_dir(&eos_dir, "LORENE")?;
            write_lorene(&cold, &dir.join(format!("{stem}.lorene")))?;
            write_number_fractions(&cold, &dir.join(format!("{stem}_Y.out")))?;
        }
        if args.athtab {
            let dir = prepared_dir(&eos_dir, "ATHTAB")?;
            write_reduced_athtab(&cold, &dir.join(format!("{stem}.athtab")))?;
        }
    }

    if args.nqt {
        let source = archive_path.ok_or_else(|| {
            CliError::Fatal(
                "NQT conversion needs the table archive; enable --archive".to_string(),
            )
        })?;
        let config = NqtConfig {
            order: args.nqt_order,
            use_bithacks: !args.no_bithacks,
        };
        let lookup = NqtTable::build_from_archive(&source, &config)?;
        lookup.write(&eos_dir.join(format!("{}_NQT.nqt", args.eos_name)))?;
    }

    Ok(())
}

fn solve_cold(
    table: &eos_table::EosTable,
    model: &FiniteDifferenceModel,
) -> Result<ReducedEosTable, CliError> {
    let slice = table.slice_at_t_idx(0)?;
    info!(t = slice.t_value(), "solving beta equilibrium on coldest slice");
    let report = make_beta_eq_table(&slice, model, &BetaSolveConfig::default())?;
    if report.num_failed() > 0 {
        warn!(
            failed = report.num_failed(),
            converged = report.num_converged(),
            "some density points had no equilibrium and were dropped"
        );
    }
    println!(
        "Beta equilibrium: {} of {} density points converged",
        report.num_converged(),
        report.num_converged() + report.num_failed()
    );
    Ok(report.table)
}

fn cmd_validate(compose_dir: &Path, cs2_floor: f64) -> Result<(), CliError> {
    let registry = Arc::new(dd2_registry());
    let mut table = compose::read_compose_dir(compose_dir, registry, None)?;
    table.compute_cs2(&FiniteDifferenceModel, cs2_floor);
    table.compute_abar();
    table.validate(cs2_floor, &GridTolerance::default())?;
    let (n_nb, n_t, n_yq) = table.shape();
    println!("OK: {n_nb} x {n_t} x {n_yq} table passed validation");
    Ok(())
}

fn cmd_nqt(archive: &Path, output: &Path, order: usize, use_bithacks: bool) -> Result<(), CliError> {
    let config = NqtConfig {
        order,
        use_bithacks,
    };
    let lookup = NqtTable::build_from_archive(archive, &config)?;
    lookup.write(output)?;
    println!(
        "Wrote NQT lookup ({} segments, order {}) to {}",
        lookup.n_segments(),
        lookup.order(),
        output.display()
    );
    Ok(())
}
