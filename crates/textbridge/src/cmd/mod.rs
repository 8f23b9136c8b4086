use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// How often blocking loops wake up to check for Ctrl-C.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and send every message back on its channel.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Accept connections and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Channel id to bridge.
    #[arg(long, short = 'c', default_value = "")]
    pub channel: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel id to send on.
    #[arg(long, short = 'c', default_value = "")]
    pub channel: String,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// String payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a JSON payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Attach a binary payload as an object field (KEY=HEX). Repeatable.
    #[arg(long, value_name = "KEY=HEX")]
    pub attach: Vec<String>,
    /// Wait for one message on the channel and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Channel id to listen on.
    #[arg(long, short = 'c', default_value = "")]
    pub channel: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
