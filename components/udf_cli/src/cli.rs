//! Command-line arguments

use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use udf_module::ModuleConfig;

/// Run Lua user-defined functions against in-memory records and streams
#[derive(Parser, Debug)]
#[command(name = "udf-run", version, about)]
pub struct Cli {
    /// JSON module configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// System script root (defaults to the script's directory)
    #[arg(long, global = true)]
    pub system_path: Option<PathBuf>,

    /// User script root (defaults to the script's directory)
    #[arg(long, global = true)]
    pub user_path: Option<PathBuf>,

    /// Build a fresh interpreter for every call
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Run stream pipelines in client scope
    #[arg(long, global = true)]
    pub client: bool,

    /// Print engine and pool counters to stderr when done
    #[arg(long, global = true)]
    pub stats: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Operations
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Check a script for errors without registering it
    Validate {
        /// Script file
        file: PathBuf,
    },
    /// Call a record function
    Record {
        /// Script file
        file: PathBuf,
        /// Function name
        function: String,
        /// Record bins as a JSON object
        #[arg(short, long, default_value = "{}")]
        record: String,
        /// Number of times to call the function
        #[arg(short = 'n', long, default_value_t = 1)]
        repeat: usize,
        /// Extra arguments, each parsed as JSON
        args: Vec<String>,
    },
    /// Run a stream function over a JSON array
    Stream {
        /// Script file
        file: PathBuf,
        /// Function name
        function: String,
        /// Input values as a JSON array
        #[arg(short, long, default_value = "[]")]
        input: String,
        /// Extra arguments, each parsed as JSON
        args: Vec<String>,
    },
}

impl Command {
    /// Script file the command operates on
    pub fn file(&self) -> &Path {
        match self {
            Command::Validate { file }
            | Command::Record { file, .. }
            | Command::Stream { file, .. } => file,
        }
    }
}

impl Cli {
    /// Module configuration from `--config` with command-line overrides.
    ///
    /// Unset script roots fall back to the directory holding the script.
    pub fn module_config(&self) -> CliResult<ModuleConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_reader(File::open(path)?)?,
            None => ModuleConfig::default(),
        };

        let script_dir = match self.command.file().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Some(path) = &self.system_path {
            config.system_path = path.clone();
        } else if config.system_path.as_os_str().is_empty() {
            config.system_path = script_dir.clone();
        }
        if let Some(path) = &self.user_path {
            config.user_path = path.clone();
        } else if config.user_path.as_os_str().is_empty() {
            config.user_path = script_dir;
        }

        if self.no_cache {
            config.cache_enabled = false;
        }
        if self.client {
            config.server_mode = false;
        }
        Ok(config)
    }

    /// Default log filter for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
