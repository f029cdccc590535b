use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

use cli::capture::CaptureCommand;
use cli::check::CheckCommand;
use cli::config::ConfigCommand;
use cli::exec::ExecCommand;
use cli::fetch::FetchCommand;

#[derive(Parser)]
#[command(name = "snapfetch")]
#[command(about = "Trigger snapshots on a remote device over SSH and fetch the images", long_about = None)]
struct Cli {
    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Capture(CaptureCommand),
    Exec(ExecCommand),
    Fetch(FetchCommand),
    Check(CheckCommand),
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    snapfetch::logging::init(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Capture(cmd) => cmd.execute(),
        Commands::Exec(cmd) => cmd.execute(),
        Commands::Fetch(cmd) => cmd.execute(),
        Commands::Check(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
