pub mod chat;
pub mod check;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "companion-pool",
    about = "Chat with companion bots through a pool of external worker processes",
    propagate_version = true,
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a worker pool and chat with a bot over stdin/stdout.
    Chat(ChatArgs),
    /// Load and validate the configuration, then print the effective values.
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Config file (default: ./companion-pool.yml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial number of workers, overriding the config file.
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Reply as soon as the worker answers.
    #[arg(long)]
    pub no_pacing: bool,

    /// Bot name sent with every request.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Config file (default: ./companion-pool.yml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
