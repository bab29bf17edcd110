use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "pinup",
    about = "Keep Docker digests, GitHub Action SHAs and tracked upstream versions pinned and current",
    version
)]
pub struct Cli {
    /// Path to the repository root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan pinned references, look up newer versions and print a JSON report
    Check {
        /// Upstream source config for version-list files (JSON or TOML)
        #[arg(long, value_name = "FILE")]
        upstream_config: Option<String>,
    },

    /// Apply the updates of a report and open (or reuse) a pull request
    Apply {
        /// Report produced by `pinup check`
        #[arg(value_name = "REPORT")]
        report: String,

        /// Where the change is assembled
        #[arg(long, value_enum, default_value_t = StrategyArg::Local)]
        strategy: StrategyArg,

        /// Branch that carries the updates
        #[arg(long)]
        branch: Option<String>,

        /// Base branch the pull request targets
        #[arg(long)]
        base: Option<String>,

        /// Commit message and pull request title
        #[arg(long = "commit-message")]
        commit_message: Option<String>,

        /// Rewrite local files only (no branch, commit, push or pull request)
        #[arg(long, conflicts_with = "strategy")]
        no_git: bool,
    },

    /// Check Trivy JSON results against an ignore list
    ScanResults {
        /// Trivy JSON output
        #[arg(value_name = "RESULTS")]
        results: String,

        /// Ignore list (one ID or glob per line, `#` comments)
        #[arg(value_name = "IGNORE_FILE")]
        ignore_file: String,
    },

    /// Post a Discord notification for a pushed image
    Notify {
        #[arg(value_name = "IMAGE")]
        image: String,

        #[arg(value_name = "TAG")]
        tag: String,

        #[arg(value_name = "DIGEST")]
        digest: String,
    },

    /// Render a report category as Discord embed fields
    FormatReport {
        #[arg(value_name = "REPORT")]
        report: String,

        #[arg(long, value_enum)]
        kind: FieldKindArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    /// Edit the working tree, commit and push with git
    Local,
    /// Build blobs, tree and commit through the GitHub API
    Remote,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKindArg {
    Updates,
    Warnings,
    Success,
}
