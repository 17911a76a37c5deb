use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::parse_base_url;
use crate::error::{ChatError, ChatResult};

#[derive(Parser, Debug)]
#[command(
    name = "moodchat",
    about = "Talk through how you feel and get a sentiment read-out from the analysis backend",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    pub config_file: Option<PathBuf>,

    /// Backend base URL (overrides config and MOODCHAT_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output file for logs
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Line-by-line chat on stdin/stdout instead of the full-screen UI
    #[arg(long)]
    pub plain: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Check that the backend is reachable
    Check,

    /// Fetch the plot once and save it
    Plot {
        /// Output file
        #[arg(long, short = 'o', default_value = "plot.png")]
        output: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Print the default config file location instead
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    /// Validate CLI configuration and return appropriate error if invalid
    pub fn validate(&self) -> ChatResult<()> {
        if let Some(level) = &self.log_level {
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                _ => {
                    return Err(ChatError::cli(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        level
                    )));
                }
            }
        }

        if let Some(url) = &self.base_url {
            parse_base_url(url).map_err(|e| ChatError::cli(e.to_string()))?;
        }

        if self.plain && self.command.is_some() {
            return Err(ChatError::cli("--plain only applies to the chat session"));
        }

        if let Some(Commands::Plot { output }) = &self.command {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.is_dir() {
                    return Err(ChatError::cli(format!(
                        "Output directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn is_interactive(&self) -> bool {
        self.command.is_none() && !self.plain
    }
}
