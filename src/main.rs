use std::path::PathBuf;
use std::process;

use arrow::array::RecordBatch;
use clap::Parser;
use hstrat_trie::{
    ReconstructError, ReconstructOptions, ReconstructStats, frame, phylogeny_schema, read_table,
    reconstruct_unpacked_with_stats, reconstruct_with_stats, surface_meta, write_table,
};

const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "hstrat-trie",
    about = "Reconstruct a phylogeny from hereditary stratigraphic surfaces",
    version
)]
struct Cli {
    /// Packed population (.csv, .arrow, .ipc or .feather)
    input: PathBuf,

    /// Where to write the reconstructed phylogeny (format from extension)
    output: PathBuf,

    /// Treat INPUT as an already-unpacked long table
    #[arg(long)]
    unpacked: bool,

    /// Run a dropped-only unifurcation collapse every N chunks (0 disables)
    #[arg(long, value_name = "N")]
    collapse_every: Option<usize>,

    /// Maximum unpacked rows per chunk
    #[arg(long, value_name = "N")]
    chunk_size: Option<usize>,

    /// Join independent trees under the common root instead of failing
    #[arg(long)]
    force_common_ancestry: bool,

    /// Run the invariant suite after every chunk and at the end
    #[arg(long)]
    check_invariants: bool,

    /// Directory for chunk files (defaults to the platform temp dir)
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// JSON file holding serialized reconstruction options; flags override it
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    quiet: bool,
}

enum CliError {
    Usage(String),
    Reconstruct(ReconstructError),
}

impl From<ReconstructError> for CliError {
    fn from(err: ReconstructError) -> Self {
        Self::Reconstruct(err)
    }
}

fn init_tracing(cli: &Cli) {
    // --quiet: nothing; --verbose: RUST_LOG or info; default: warnings only.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(cli: &Cli) -> Result<ReconstructOptions, CliError> {
    let mut options = match &cli.options {
        Some(path) => {
            let text = fs_err::read_to_string(path).map_err(|err| CliError::Usage(err.to_string()))?;
            serde_json::from_str(&text)
                .map_err(|err| CliError::Usage(format!("{}: {err}", path.display())))?
        }
        None => ReconstructOptions::default(),
    };
    if let Some(every) = cli.collapse_every {
        options.collapse_every = every;
    }
    if let Some(rows) = cli.chunk_size {
        if rows == 0 {
            return Err(CliError::Usage("--chunk-size must be at least 1".into()));
        }
        options.chunk_size = rows;
    }
    if cli.force_common_ancestry {
        options.force_common_ancestry = true;
    }
    if cli.check_invariants {
        options.check_invariants = true;
    }
    if cli.temp_dir.is_some() {
        options.temp_dir.clone_from(&cli.temp_dir);
    }
    Ok(options)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let options = load_options(cli)?;
    let input = read_table(&cli.input)?;

    let (phylogeny, stats) = if cli.unpacked {
        match surface_meta(&input)? {
            Some(meta) => reconstruct_unpacked_with_stats(&input, meta, &options)?,
            None => {
                let passthrough: Vec<_> = frame::passthrough_fields(input.schema().as_ref())
                    .into_iter()
                    .map(|(_, field)| field)
                    .collect();
                (
                    RecordBatch::new_empty(phylogeny_schema(&passthrough)),
                    ReconstructStats::default(),
                )
            }
        }
    } else {
        reconstruct_with_stats(&input, &options)?
    };

    write_table(&cli.output, &phylogeny)?;
    tracing::info!(
        output.path = %cli.output.display(),
        output.rows = phylogeny.num_rows(),
        pipeline.artifacts = stats.artifacts,
        pipeline.chunks = stats.chunks,
        "phylogeny written"
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(&cli) {
        let code = match &err {
            CliError::Usage(message) => {
                eprintln!("error: {message}");
                EXIT_USAGE
            }
            CliError::Reconstruct(err) => {
                eprintln!("error: {err}");
                EXIT_ERROR
            }
        };
        process::exit(code);
    }
}
