//! Command-line interface for trillcast
//!
//! Provides argument parsing using clap derive macros.

pub use crate::pipeline::Mode;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Real-time pitch and trill detection streamed as UDP datagrams
#[derive(Parser, Debug)]
#[command(
    name = "trillcast",
    version,
    about = "Real-time pitch and trill detection streamed as UDP datagrams"
)]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., hw:0)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Audio host backend (e.g., ALSA, JACK)
    #[arg(long, global = true, value_name = "HOST")]
    pub audio_host: Option<String>,

    /// Destination host for datagrams
    #[arg(long, global = true, value_name = "HOST")]
    pub host: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture from the microphone and run both detectors until Ctrl+C
    Run,

    /// Capture and run the pitch tracker only
    Pitch,

    /// Capture and run the trill detector only
    Trill,

    /// Replay a WAV file through the detectors
    Analyze {
        /// WAV file to analyse ("-" reads from stdin)
        file: PathBuf,

        /// Detectors to run
        #[arg(long, value_enum, default_value_t = Mode::Both)]
        mode: Mode,

        /// Print payloads to stdout instead of sending datagrams
        #[arg(long)]
        stdout: bool,

        /// Print per-pipeline statistics as JSON when done
        #[arg(long)]
        json: bool,
    },

    /// List available audio input devices
    Devices,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Commands {
    /// Live-capture mode for the capture subcommands.
    pub fn capture_mode(&self) -> Option<Mode> {
        match self {
            Commands::Run => Some(Mode::Both),
            Commands::Pitch => Some(Mode::Pitch),
            Commands::Trill => Some(Mode::Trill),
            _ => None,
        }
    }
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
