//! Command-line argument parsing for usql-gate.

use crate::config::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run read-only SQL through usql against numbered connections (DB_CS_1, DB_CS_2, ...).
#[derive(Parser, Debug)]
#[command(name = "usql-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file path
    #[arg(long, value_name = "PATH", env = "USQL_GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Download and install usql if it is not found (fetches from GitHub)
    #[arg(long, global = true)]
    pub unsafe_install: bool,

    /// Path to the usql binary
    #[arg(long, value_name = "PATH", global = true)]
    pub usql_path: Option<PathBuf>,

    /// Directory to install usql into when --unsafe-install is set
    #[arg(long, value_name = "DIR", global = true)]
    pub install_dir: Option<PathBuf>,

    /// Query timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve line-delimited JSON requests on stdin (default)
    Serve,

    /// Run a single query and print the result
    Run {
        /// Connection string number (the N in DB_CS_N)
        #[arg(short = 'n', long, value_name = "N", default_value_t = 1)]
        connection: i64,

        /// SQL query (SELECT, WITH or EXPLAIN only)
        query: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the settings file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Settings::default_path)
    }

    /// Returns the subcommand, defaulting to `serve`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Applies flags on top of file and environment settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if self.unsafe_install {
            settings.unsafe_install = true;
        }
        if let Some(path) = &self.usql_path {
            settings.usql_path = Some(path.clone());
        }
        if let Some(dir) = &self.install_dir {
            settings.install_dir = Some(dir.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
    }
}
