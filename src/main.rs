mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod github;
mod progress;
mod provider;
mod reconcile;
mod review;
mod table;
mod ui;
mod vcs;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status after Ctrl-C.
const INTERRUPTED: i32 = 2;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub credentials_file: Option<PathBuf>,
    pub default_registry_domain: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!();
        log::error!("Interrupted");
        std::process::exit(INTERRUPTED);
    }) {
        log::warn!("Could not install interrupt handler: {e}");
    }

    let ctx = Context {
        verbose: cli.verbose,
        credentials_file: cli.credentials_file.as_deref().map(config::expand_path),
        default_registry_domain: cli.default_registry_domain,
    };

    let result = match cli.command {
        Command::Report(args) => commands::report::run(&ctx, args),
        Command::Upgrade(args) => commands::upgrade::run(&ctx, args),
        Command::Sync(args) => commands::sync::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "infrapatch", &mut io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if ctx.verbose > 0 {
                log::error!("{e:?}");
            } else {
                log::error!("{e:#}");
            }
            if let Some(advice) = advice(&e) {
                log::info!("{advice}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Advice attached to the first classified error in the chain.
fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<error::Error>() {
            e.advice()
        } else if let Some(e) = cause.downcast_ref::<registrykit::Error>() {
            Some(e.category().advice())
        } else {
            cause
                .downcast_ref::<versionkit::Error>()
                .map(|e| e.category().advice())
        }
    })
}
