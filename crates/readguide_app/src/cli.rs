use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::watch::WatchArgs;

/// Readguide: generate reading guides for batches of documents and follow their progress.
#[derive(Parser, Debug)]
#[command(name = "readguide", author, version, about)]
pub struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the batch import server
    Serve {
        /// RON config file (defaults to ./readguide.ron when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Submit files to a running server and show progress until the batch ends
    ///
    /// Exits with 0 when every guide was generated, 1 when some jobs failed and
    /// 2 when the batch was interrupted or cancelled.
    Watch {
        /// Server base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8086")]
        server: String,

        /// Expert profile used for every file
        #[arg(short, long, default_value = "academic-mentor")]
        profile: String,

        /// Model name from the server config
        #[arg(short, long)]
        model: Option<String>,

        /// Documents to process, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    /// Unknown level names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

impl Command {
    pub fn watch_args(&self) -> Option<WatchArgs> {
        match self {
            Command::Watch {
                server,
                profile,
                model,
                files,
            } => Some(WatchArgs {
                server: server.clone(),
                profile: profile.clone(),
                model: model.clone(),
                files: files.clone(),
            }),
            Command::Serve { .. } => None,
        }
    }
}
