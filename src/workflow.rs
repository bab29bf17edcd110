use crate::agents::report_builder::Update;
use crate::agents::update_applier::ApplyOutcome;
use crate::agents::{
    ApplyStrategy, DiscordNotifier, FilesOnlyStrategy, IgnoreList, LocalGitStrategy,
    ReferenceScanner, RemoteApiStrategy, Report, ReportBuilder, ReportSection, ScanResultChecker,
    UpdateApplier, VersionResolver, WebhookMessage, notifier,
};
use crate::config::{DEFAULT_UPSTREAM_CONFIG, GitHubSettings, PullRequestConfig, UpstreamConfig};
use crate::error::Result;
use crate::pin::PinKind;
use crate::repository::RepositoryFactory;
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How `apply` turns updates into a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Local,
    Remote,
    FilesOnly,
}

/// Scan, resolve and print the JSON report on stdout.
pub fn execute_check<P: AsRef<Path>>(repo_path: P, upstream_config: Option<&str>) -> Result<()> {
    let root = PathValidator::validate_repository_root(repo_path)?;
    eprintln!("{}", "Checking pinned dependencies...".cyan().bold());

    eprintln!("\n{}", "1. Loading upstream source config...".yellow());
    let config_path = upstream_config
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join(DEFAULT_UPSTREAM_CONFIG));
    let upstream = UpstreamConfig::load(&config_path)?;
    if upstream.is_empty() {
        eprintln!("   No version-list files configured");
    } else {
        eprintln!(
            "   {} version-list file(s) from {}",
            upstream.sources.len(),
            config_path.display().to_string().dimmed()
        );
    }

    eprintln!("\n{}", "2. Scanning repository...".yellow());
    let records = ReferenceScanner::new(&root).scan(&upstream);
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for record in &records {
        *by_kind.entry(record.pin.kind().to_string()).or_default() += 1;
    }
    eprintln!("   Found {} reference(s)", records.len());
    for (kind, count) in &by_kind {
        eprintln!("   • {} {}", kind.bright_cyan(), count);
    }

    eprintln!("\n{}", "3. Resolving latest versions...".yellow());
    let settings = GitHubSettings::from_env();
    let resolver = VersionResolver::new(
        RepositoryFactory::create_image_registry(),
        RepositoryFactory::create_source_host(&settings)?,
    );
    let results = resolver.resolve_all(records);
    eprintln!("{}", "✓ Resolution completed".green());

    let report = ReportBuilder::build(&results);
    print_report_overview(&report);
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("\n{}", report.summary().bold());

    Ok(())
}

/// Nothing to update and nothing that could not be checked.
fn all_current(report: &Report) -> bool {
    report.updates.is_empty() && report.warnings.is_empty()
}

fn print_report_overview(report: &Report) {
    if all_current(report) {
        eprintln!("\n{}", "✨ All pinned dependencies are current!".green().bold());
    } else if !report.updates.is_empty() {
        eprintln!("\n{}", "📦 Available Updates:".cyan().bold());
        for update in &report.updates {
            eprintln!("  • {}", describe_update(update));
        }
    }

    if !report.warnings.is_empty() {
        eprintln!("\n{}", "⚠ Warnings:".yellow().bold());
        for warning in &report.warnings {
            let subject = if warning.kind == PinKind::ActionNoTag {
                warning.subject.dimmed().to_string()
            } else {
                warning.subject.clone()
            };
            eprintln!("  • {} ({}): {}", subject, warning.file, warning.reason);
        }
    }
}

fn describe_update(update: &Update) -> String {
    match update {
        Update::DockerDigest {
            image,
            tag,
            file,
            latest_digest,
            ..
        } => format!(
            "{} new digest {} ({})",
            format!("{image}:{tag}").white().bold(),
            latest_digest.green(),
            file
        ),
        Update::DockerUnpinned {
            image,
            tag,
            file,
            latest_digest,
            ..
        } => format!(
            "{} {} → {} ({})",
            format!("{image}:{tag}").white().bold(),
            "unpinned".red(),
            latest_digest.green(),
            file
        ),
        Update::ActionPinned {
            action,
            tag,
            file,
            current_sha,
            latest_sha,
            ..
        } => format!(
            "{} {} → {} ({})",
            format!("{action}@{tag}").white().bold(),
            current_sha.red(),
            latest_sha.green(),
            file
        ),
        Update::ActionUnpinned {
            action,
            tag,
            file,
            latest_sha,
            ..
        } => format!(
            "{} {} → {} ({})",
            format!("{action}@{tag}").white().bold(),
            "unpinned".red(),
            latest_sha.green(),
            file
        ),
        Update::VariantUpdate {
            file,
            current_version,
            latest_version,
            ..
        } => format!(
            "{} {} → {}",
            file.white().bold(),
            current_version.red(),
            latest_version.green().bold()
        ),
    }
}

/// Apply a report's updates with the chosen strategy.
pub fn execute_apply<P: AsRef<Path>>(
    repo_path: P,
    report_path: &str,
    mode: ApplyMode,
    config: PullRequestConfig,
) -> Result<()> {
    let root = PathValidator::validate_repository_root(repo_path)?;
    eprintln!("{}", "Applying pinned dependency updates...".cyan().bold());

    let report = Report::load(Path::new(report_path))?;
    eprintln!("   {} update(s) in {}", report.updates.len(), report_path);
    if report.updates.is_empty() {
        eprintln!("\n{}", "✨ No updates to apply".green().bold());
        return Ok(());
    }

    eprintln!(
        "   Branch {} → {}",
        config.branch.bright_cyan(),
        config.base.bright_cyan()
    );
    let applier = UpdateApplier::new(config);
    let strategy: Box<dyn ApplyStrategy> = match mode {
        ApplyMode::FilesOnly => Box::new(FilesOnlyStrategy::new(&root)),
        ApplyMode::Local => {
            let repo = RepositoryFactory::create_remote_repository(&GitHubSettings::from_env())?;
            eprintln!("   Repository {}", repo.slug().bright_cyan());
            Box::new(LocalGitStrategy::new(&root, Box::new(repo)))
        }
        ApplyMode::Remote => {
            let repo = RepositoryFactory::create_remote_repository(&GitHubSettings::from_env())?;
            eprintln!("   Repository {} (remote API)", repo.slug().bright_cyan());
            Box::new(RemoteApiStrategy::new(repo))
        }
    };

    match applier.apply(&report.updates, strategy.as_ref())? {
        ApplyOutcome::NothingToApply => {
            eprintln!("\n{}", "✨ No updates to apply".green().bold());
        }
        ApplyOutcome::NoChanges => {
            eprintln!("\n{}", "✨ Files already up to date, nothing committed".green().bold());
        }
        ApplyOutcome::FilesRewritten(files) => {
            eprintln!(
                "\n{}",
                format!("✓ Rewrote {} file(s); no commit created", files.len()).green()
            );
        }
        ApplyOutcome::PullRequest {
            pull_request,
            reused,
        } => {
            let verb = if reused { "Updated" } else { "Opened" };
            eprintln!(
                "\n{}",
                format!("✓ {verb} pull request #{}", pull_request.number)
                    .green()
                    .bold()
            );
            eprintln!("   {}", pull_request.url.dimmed());
        }
    }

    Ok(())
}

/// Check Trivy results; returns `false` when un-ignored findings remain.
pub fn execute_scan_results(results: &str, ignore_file: &str) -> Result<bool> {
    let ignores = IgnoreList::load(Path::new(ignore_file))?;
    let verdict = ScanResultChecker::new(ignores).check_file(Path::new(results))?;
    for line in verdict.render(ignore_file) {
        println!("{line}");
    }
    Ok(verdict.passed())
}

/// Announce a pushed image. Delivery problems are reported, never fatal.
pub fn execute_notify(image: &str, tag: &str, digest: &str) -> Result<()> {
    let notifier = match DiscordNotifier::from_env() {
        Ok(Some(notifier)) => notifier,
        Ok(None) => {
            println!(
                "Skipping notification: {} not set.",
                notifier::WEBHOOK_ENV
            );
            return Ok(());
        }
        Err(e) => {
            eprintln!("{} {}", "Failed to send Discord notification:".yellow(), e);
            return Ok(());
        }
    };

    println!("Sending Discord notification for {image}:{tag}...");
    match notifier.send(&WebhookMessage::image_pushed(image, tag, digest)) {
        Ok(status) => println!("Notification sent: {status}"),
        Err(e) => eprintln!("{} {}", "Failed to send Discord notification:".yellow(), e),
    }
    Ok(())
}

/// Print one report section as a JSON array of Discord embed fields.
pub fn execute_format_report(report_path: &str, section: ReportSection) -> Result<()> {
    let report = Report::load(Path::new(report_path))?;
    let fields = notifier::embed_fields(&report, section);
    println!("{}", serde_json::to_string(&fields)?);
    Ok(())
}
