mod agents;
mod cli;
mod config;
mod error;
mod pin;
mod registry;
mod repository;
mod utils;
mod workflow;

use agents::ReportSection;
use clap::Parser;
use cli::{Cli, Commands, FieldKindArg, StrategyArg};
use colored::Colorize;
use config::PullRequestConfig;
use std::process;
use workflow::ApplyMode;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        utils::verbose::enable();
    }

    let result = match cli.command {
        Commands::Check { upstream_config } => {
            workflow::execute_check(&cli.path, upstream_config.as_deref())
        }
        Commands::Apply {
            report,
            strategy,
            branch,
            base,
            commit_message,
            no_git,
        } => {
            let mode = match (no_git, strategy) {
                (true, _) => ApplyMode::FilesOnly,
                (false, StrategyArg::Local) => ApplyMode::Local,
                (false, StrategyArg::Remote) => ApplyMode::Remote,
            };
            let config = PullRequestConfig::with_overrides(branch, base, commit_message);
            workflow::execute_apply(&cli.path, &report, mode, config)
        }
        Commands::ScanResults {
            results,
            ignore_file,
        } => match workflow::execute_scan_results(&results, &ignore_file) {
            Ok(true) => Ok(()),
            Ok(false) => process::exit(1),
            Err(e) => Err(e),
        },
        Commands::Notify { image, tag, digest } => workflow::execute_notify(&image, &tag, &digest),
        Commands::FormatReport { report, kind } => {
            let section = match kind {
                FieldKindArg::Updates => ReportSection::Updates,
                FieldKindArg::Warnings => ReportSection::Warnings,
                FieldKindArg::Success => ReportSection::Success,
            };
            workflow::execute_format_report(&report, section)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
