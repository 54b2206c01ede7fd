use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use domain::base::Serial;

use ixfrd::config::{Config, LoggingConfig};
use ixfrd::ExitError;

use ixfrd_engine::chain::{ChainBudget, VersionChain};
use ixfrd_engine::persist::{self, GenericRrTextFormat};
use ixfrd_engine::selector::{select, Selection};

#[derive(Parser)]
#[command(name = "ixfrd", version, about = "Incremental zone transfer engine")]
struct Args {
    /// Path to a TOML configuration file providing logging settings.
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a zone's on-disk IXFR file family and summarize its chain.
    Inspect {
        /// Path to the zone file the `.ixfr`/`.ixfr.N` files are named after.
        zone_file: Utf8PathBuf,

        /// The zone's current SOA serial (the newest file's new-SOA serial).
        #[arg(long)]
        current_serial: u32,

        #[arg(long, default_value_t = 0)]
        max_count: usize,

        #[arg(long, default_value_t = 0)]
        max_bytes: usize,
    },

    /// Decide how a query for `--from` would be answered against the chain
    /// persisted for a zone, without actually streaming a reply.
    SimulateQuery {
        zone_file: Utf8PathBuf,

        #[arg(long)]
        from: u32,

        #[arg(long)]
        current_serial: u32,

        #[arg(long, default_value_t = 0)]
        max_count: usize,

        #[arg(long, default_value_t = 0)]
        max_bytes: usize,
    },

    /// Rewrite a zone's on-disk IXFR file family under a (possibly tighter)
    /// budget, evicting and renumbering files as §4H describes.
    Gc {
        zone_file: Utf8PathBuf,

        #[arg(long)]
        zone_name: String,

        #[arg(long)]
        current_serial: u32,

        #[arg(long)]
        max_count: usize,

        #[arg(long, default_value_t = 0)]
        max_bytes: usize,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let logging = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config.logging,
            Err(error) => {
                eprintln!("{error}");
                return ExitCode::FAILURE;
            }
        },
        None => LoggingConfig::default(),
    };

    if let Err(error) = ixfrd::log::init(&logging) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), ExitError> {
    match command {
        Command::Inspect { zone_file, current_serial, max_count, max_bytes } => {
            let budget = ChainBudget { max_count, max_bytes };
            let mut chain = VersionChain::new();
            persist::read_from_file(
                &mut chain,
                &zone_file,
                budget,
                Serial::from(current_serial),
                &GenericRrTextFormat,
            )?;

            println!("{} segment(s), {} byte(s) aggregate", chain.len(), chain.total_size());
            let mut cursor = chain.first();
            while let Some(segment) = cursor {
                println!(
                    "  {} -> {} (file #{}, {} bytes)",
                    segment.old_serial,
                    segment.new_serial,
                    segment.file_index,
                    segment.data_size()
                );
                cursor = chain.next(segment);
            }
            Ok(())
        }

        Command::SimulateQuery { zone_file, from, current_serial, max_count, max_bytes } => {
            let budget = ChainBudget { max_count, max_bytes };
            let mut chain = VersionChain::new();
            persist::read_from_file(
                &mut chain,
                &zone_file,
                budget,
                Serial::from(current_serial),
                &GenericRrTextFormat,
            )?;

            match select(&chain, Serial::from(from), Serial::from(current_serial)) {
                Selection::UpToDate => println!("up to date: reply with a bare SOA({current_serial})"),
                Selection::Fallback(reason) => println!("AXFR fallback: {reason}"),
                Selection::Serve(start) => {
                    let mut count = 1;
                    let mut segment = start;
                    while let Some(next) = chain.next(segment) {
                        segment = next;
                        count += 1;
                    }
                    println!("IXFR stream: {count} segment(s), starting at {}", start.old_serial);
                }
            }
            Ok(())
        }

        Command::Gc { zone_file, zone_name, current_serial, max_count, max_bytes } => {
            let loose = ChainBudget { max_count: usize::MAX, max_bytes: 0 };
            let mut chain = VersionChain::new();
            persist::read_from_file(
                &mut chain,
                &zone_file,
                loose,
                Serial::from(current_serial),
                &GenericRrTextFormat,
            )?;

            let before = chain.len();
            let budget = ChainBudget { max_count, max_bytes };
            persist::write_to_file(&mut chain, &zone_file, budget, &zone_name, &GenericRrTextFormat)?;
            println!("{before} segment(s) before, {} after", chain.len());
            Ok(())
        }
    }
}
