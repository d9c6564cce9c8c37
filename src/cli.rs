//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration file and environment variables.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Single-host resource and application health monitor.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (.toml, .yaml or .json).
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Seconds between two collector ticks.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub interval: Option<u64>,

    /// Path of the CSV table shared by the collector and the dashboard.
    #[arg(long, value_name = "PATH", global = true)]
    pub csv: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Sample this machine on a fixed interval and append rows to the CSV table.
    Collect,
    /// Serve the web dashboard over the CSV table.
    Dashboard,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(interval) = self.interval {
            dict.insert("interval_seconds".into(), Value::from(interval));
        }

        if let Some(csv) = &self.csv {
            let mut sink = Dict::new();
            sink.insert(
                "path".into(),
                Value::from(csv.to_string_lossy().into_owned()),
            );
            dict.insert("sink".into(), Value::from(sink));
        }

        // `--debug` can only switch debug logging on; its absence leaves the
        // file or environment setting untouched.
        if self.debug {
            dict.insert("debug_mode".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
