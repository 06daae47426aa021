//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turn a city name into a weather summary and a reporter video
#[derive(Parser, Debug)]
#[command(name = "weathercast", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "WEATHERCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API (and the front-end, if configured)
    Serve {
        /// Port to listen on, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one search in the terminal and save the video
    Report {
        /// City to report on
        #[arg(long)]
        city: String,

        /// Where to write the video
        #[arg(short, long, default_value = "weather-report.mp4")]
        output: PathBuf,
    },
}
