//! modlink command-line tool
//!
//! Resolves the module graph of a program and reports symbol tables or
//! resolution errors.

mod commands;

use clap::{Parser, Subcommand};
use commands::SearchArgs;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "modlink")]
#[command(about = "Module resolution and symbol linking", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a program and resolve every symbol it references
    Resolve {
        /// Root module file
        file: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which source an import path selects
    Find {
        /// File or directory the import is written in
        origin: PathBuf,
        /// Import path, e.g. `.types` or `lib.util`
        import: String,
        #[command(flatten)]
        search: SearchArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MODLINK_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Resolve { file, search, json } => commands::resolve::execute(&file, &search, json),
        Commands::Find {
            origin,
            import,
            search,
            json,
        } => commands::find::execute(&origin, &import, &search, json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}
