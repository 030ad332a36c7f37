//! Retar CLI - regenerate byte-identical release tarballs from tracked
//! trees and small deltas.

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use retar_core::Options;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let options = Options {
        keep_scratch: cli.keep,
        try_harder: false,
    };

    match &cli.command {
        cli::Commands::Gendelta(args) => commands::gendelta::execute(args, options),
        cli::Commands::Gentar(args) => commands::gentar::execute(args, options),
        cli::Commands::Commit(args) => commands::commit::execute(args, options),
        cli::Commands::Checkout(args) => commands::checkout::execute(args, options),
        cli::Commands::List(args) => commands::list::execute(args),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}
