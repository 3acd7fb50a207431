// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strand - a resumable streaming chat service.
//!
//! This is the binary entry point for the Strand gateway.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Strand - a resumable streaming chat service.
#[derive(Parser, Debug)]
#[command(name = "strand", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Strand gateway server.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match strand_config::load_and_validate() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("strand: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("strand serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            print_config(config);
        }
        None => {
            println!("strand: use --help for available commands");
        }
    }
}

/// Prints the resolved configuration as TOML with secrets redacted.
fn print_config(mut config: strand_config::StrandConfig) {
    if config.anthropic.api_key.is_some() {
        config.anthropic.api_key = Some("<redacted>".into());
    }
    for session in &mut config.sessions {
        session.token = "<redacted>".into();
    }
    match toml::to_string_pretty(&config) {
        Ok(rendered) => print!("{rendered}"),
        Err(e) => eprintln!("strand config: failed to render: {e}"),
    }
}
