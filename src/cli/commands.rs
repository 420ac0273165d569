//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy resumable database extraction CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON); checkpoints are written back to it
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test connection to the source database
    Check,

    /// List tables of the source database
    Streams,

    /// Describe the columns of one table as a JSON schema
    Discover {
        /// Table name
        table: String,

        /// Schema the table lives in
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Read configured streams incrementally
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Scans per stream in this run (overrides the config)
        #[arg(long)]
        max_scans: Option<u32>,
    },

    /// Validate the source configuration
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read() {
        let cli = Cli::parse_from([
            "solidafy-extract",
            "--config",
            "source.yaml",
            "--state",
            "state.json",
            "read",
            "--streams",
            "users,orders",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("source.yaml")));
        assert_eq!(cli.state, Some(PathBuf::from("state.json")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Read { streams, max_scans } => {
                assert_eq!(streams.as_deref(), Some("users,orders"));
                assert_eq!(max_scans, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_discover_with_global_flags_after() {
        let cli = Cli::parse_from([
            "solidafy-extract",
            "discover",
            "orders",
            "-n",
            "sales",
            "-c",
            "source.json",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Discover { table, namespace } => {
                assert_eq!(table, "orders");
                assert_eq!(namespace.as_deref(), Some("sales"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
