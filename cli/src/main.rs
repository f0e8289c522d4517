//! bpeprep CLI - prepare a text corpus for language-model training.
//!
//! This is the main entry point for the `bpeprep` command-line tool.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use commands::{CleanCommand, DecodeCommand, EncodeCommand, RunCommand, TrainCommand};
use env_logger::Env;

#[derive(Parser)]
#[command(name = "bpeprep")]
#[command(about = "Clean a corpus, learn a byte-level BPE vocabulary and emit token ids", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw corpus into one cleaned document per line
    Clean(CleanCommand),
    /// Train a new tokenizer from a cleaned corpus
    Train(TrainCommand),
    /// Encode text to token IDs
    Encode(EncodeCommand),
    /// Decode token IDs back to text
    Decode(DecodeCommand),
    /// Clean, train and encode a corpus in one go
    Run(RunCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Clean(cmd) => commands::clean::run(cmd)?,
        Commands::Train(cmd) => commands::train::run(cmd)?,
        Commands::Encode(cmd) => commands::encode::run(cmd)?,
        Commands::Decode(cmd) => commands::decode::run(cmd)?,
        Commands::Run(cmd) => commands::run::run(cmd)?,
    }

    Ok(())
}

/// `RUST_LOG` decides unless -v or -q is given.
fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    let level = match (verbose, quiet) {
        (0, 0) => None,
        (_, 1) => Some(LevelFilter::Warn),
        (_, q) if q > 1 => Some(LevelFilter::Error),
        (1, _) => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}
