//! ReelStream - browse, search and play streaming titles
//!
//! # Usage
//!
//! ```bash
//! reelstream home
//! reelstream trending
//! reelstream search "blade runner"
//! reelstream info 1396 -t tv
//! reelstream play 1396 -t tv -e 62085 --player mpv
//! ```

mod cli;
mod commands;

use clap::Parser;

use reelstream::config::Config;

use crate::cli::{Cli, Command, ExitCode, Output};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run_cli(cli).await.into()
}

/// Respect RUST_LOG if set, otherwise warn-level unless --verbose
fn init_logging(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "reelstream=debug".to_string()
        } else {
            "reelstream=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = Config::load_or_default(cli.config.as_deref());

    match cli.command {
        Command::Home(cmd) => commands::home_cmd(cmd, &config, &output).await,
        Command::Trending(cmd) => commands::trending_cmd(cmd, &config, &output).await,
        Command::Popular(cmd) => commands::popular_cmd(cmd, &config, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &config, &output).await,
        Command::Info(cmd) => commands::info_cmd(cmd, &config, &output).await,
        Command::Sources(cmd) => commands::sources_cmd(cmd, &config, &output).await,
        Command::Play(cmd) => commands::play_cmd(cmd, &config, &output).await,
    }
}
