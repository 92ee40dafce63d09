//! cbridge CLI: generates cgo bindings from a C declaration document.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cbridge", version, about = "C to Go binding generator")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Go, C and header sources for every configured package
    Generate {
        /// Manifest path (default: search upward for cbridge.toml)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Only generate the named package (repeatable)
        #[arg(long)]
        package: Vec<String>,
        /// Override the manifest's output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Print the Go source instead of writing files
        #[arg(long)]
        dry_run: bool,
    },
    /// List the lowered declarations of one package
    Inspect {
        /// Manifest path (default: search upward for cbridge.toml)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Package name
        #[arg(long)]
        package: String,
        /// Output format (text, json)
        #[arg(long)]
        export: Option<String>,
    },
    /// Summarise a declaration document
    Decls {
        /// Declaration document (JSON)
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Generate {
            manifest,
            package,
            output_dir,
            dry_run,
        } => {
            let (manifest, project_dir) = manifest::locate(manifest.as_deref(), &cwd)?;
            commands::generate::run(
                &manifest,
                &project_dir,
                &package,
                output_dir.as_deref(),
                dry_run,
            )
        }

        Commands::Inspect {
            manifest,
            package,
            export,
        } => {
            let (manifest, project_dir) = manifest::locate(manifest.as_deref(), &cwd)?;
            commands::inspect::run(&manifest, &project_dir, &package, export.as_deref())
        }

        Commands::Decls { input } => commands::decls::run(&input),
    }
}
