pub mod extract;
pub mod notifier;
pub mod reference_scanner;
pub mod report_builder;
pub mod scan_result_checker;
pub mod update_applier;
pub mod version_control;
pub mod version_resolver;

pub use notifier::{DiscordNotifier, ReportSection, WebhookMessage};
pub use reference_scanner::ReferenceScanner;
pub use report_builder::{Report, ReportBuilder};
pub use scan_result_checker::{IgnoreList, ScanResultChecker};
pub use update_applier::{
    ApplyStrategy, FilesOnlyStrategy, LocalGitStrategy, RemoteApiStrategy, UpdateApplier,
};
pub use version_resolver::VersionResolver;
