//! ContentSync CLI
//!
//! Command-line front end for content replication.
//!
//! # Commands
//!
//! - `sync` - Pull content and media from another environment
//! - `serve` - Serve the local content to other environments

mod commands;
mod settings;

use clap::{Args, Parser, Subcommand};
use contentsync_engine::RunOptions;
use settings::Settings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// ContentSync content replication tools.
#[derive(Parser)]
#[command(name = "contentsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(global = true, short, long, default_value = "contentsync.toml")]
    config: PathBuf,

    /// Override the document store directory
    #[arg(global = true, long)]
    documents: Option<PathBuf>,

    /// Override the binary store directory
    #[arg(global = true, long)]
    uploads: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull content and media from another environment
    Sync(SyncArgs),

    /// Serve the local content to other environments
    Serve {
        /// Address to listen on, overriding the settings file
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct SyncArgs {
    /// Environment name or URL to pull from
    #[arg(long)]
    from: Option<String>,

    /// Environment name to push to (not supported)
    #[arg(long)]
    to: Option<String>,

    /// Only sync documents of this type
    #[arg(long = "type")]
    doc_type: Option<String>,

    /// Also sync documents joined from the selected ones
    #[arg(long)]
    related: bool,

    /// Merge into existing content instead of replacing it
    #[arg(long)]
    keep: bool,

    /// Criteria selecting the documents to sync
    #[arg(long)]
    query: Option<String>,

    /// API key of the peer when --from is a URL
    #[arg(long)]
    api_key: Option<String>,

    /// Only sync this workflow locale and keep its draft counterpart
    #[arg(long)]
    locale: Option<String>,
}

impl From<SyncArgs> for RunOptions {
    fn from(args: SyncArgs) -> Self {
        RunOptions {
            from: args.from,
            to: args.to,
            doc_type: args.doc_type,
            related: args.related,
            keep: args.keep,
            query: args.query,
            api_key: args.api_key,
            locale: args.locale,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(&cli.config)?;
    if let Some(dir) = cli.documents {
        settings.store = settings.store.with_documents(dir);
    }
    if let Some(dir) = cli.uploads {
        settings.store = settings.store.with_uploads(dir);
    }

    match cli.command {
        Commands::Sync(args) => commands::sync::run(&settings, args.into())?,
        Commands::Serve { bind } => commands::serve::run(&settings, bind)?,
        Commands::Version => {
            println!("ContentSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Stream protocol v{}", contentsync_protocol::PROTOCOL_VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_flags_map_to_run_options() {
        let cli = Cli::try_parse_from([
            "contentsync",
            "sync",
            "--from=staging",
            "--type",
            "article",
            "--related",
            "--keep",
            "--locale",
            "en",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        let options = RunOptions::from(args);
        assert_eq!(options.from.as_deref(), Some("staging"));
        assert_eq!(options.doc_type.as_deref(), Some("article"));
        assert!(options.related && options.keep);
        assert_eq!(options.locale.as_deref(), Some("en"));
    }

    #[test]
    fn serve_accepts_bind_override() {
        let cli = Cli::try_parse_from(["contentsync", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        let Commands::Serve { bind } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(bind.map(|a| a.port()), Some(8080));
    }
}
