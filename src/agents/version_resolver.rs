use crate::config::UpstreamSource;
use crate::error::{PinupError, Result};
use crate::pin::{Pin, PinRecord, action_repository};
use crate::registry::version::{UpgradeSelector, Version, restore_prefix};
use crate::repository::{ImageRegistry, SourceHost};
use crate::utils::verbose::verbose;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of looking up one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Latest digest, commit SHA or version. For version entries with no
    /// qualifying upgrade this is the current version itself.
    Latest(String),
    /// Lookup deliberately not attempted.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub record: PinRecord,
    pub resolution: Resolution,
}

/// VersionResolver asks registries and source hosts for the newest value of
/// each record. Lookups are isolated: a failure only affects its own record.
pub struct VersionResolver {
    registry: Arc<dyn ImageRegistry>,
    source_host: Arc<dyn SourceHost>,
}

impl VersionResolver {
    pub fn new(registry: Arc<dyn ImageRegistry>, source_host: Arc<dyn SourceHost>) -> Self {
        Self {
            registry,
            source_host,
        }
    }

    /// Resolve every record in order. Upstream listings for version files are
    /// fetched once per source for the duration of this call.
    pub fn resolve_all(&self, records: Vec<PinRecord>) -> Vec<ResolutionResult> {
        let pb = ProgressBar::new(records.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        let mut listings: HashMap<UpstreamSource, std::result::Result<Vec<String>, String>> =
            HashMap::new();
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            pb.set_message(format!("Checking {}", record.pin.subject()));

            let resolution = self.resolve(&record, &mut listings);
            if let Resolution::Failed(reason) = &resolution {
                pb.suspend(|| eprintln!("  {} {}", "[warn]".yellow(), reason));
            }

            results.push(ResolutionResult { record, resolution });
            pb.inc(1);
        }

        pb.finish_and_clear();
        results
    }

    fn resolve(
        &self,
        record: &PinRecord,
        listings: &mut HashMap<UpstreamSource, std::result::Result<Vec<String>, String>>,
    ) -> Resolution {
        let outcome = match &record.pin {
            Pin::DockerDigest { image, tag, .. } | Pin::DockerUnpinned { image, tag, .. } => {
                self.registry.latest_digest(image, tag)
            }
            Pin::ActionPinned { tag: None, .. } => return Resolution::Skipped,
            Pin::ActionPinned {
                action,
                tag: Some(tag),
                ..
            } => self.resolve_action(action, tag),
            Pin::ActionUnpinned {
                action, git_ref, ..
            } => self.resolve_action(action, git_ref),
            Pin::VersionEntry {
                current_version,
                strict_minor,
                source,
            } => {
                let listing = listings
                    .entry(source.clone())
                    .or_insert_with(|| self.fetch_listing(source).map_err(|e| e.detail()));
                match listing {
                    Ok(available) => {
                        Self::select_version(current_version, available, *strict_minor, source)
                    }
                    Err(reason) => Err(PinupError::Resolution(reason.clone())),
                }
            }
        };

        match outcome {
            Ok(latest) => {
                verbose!("{} -> {}", record.pin.subject(), latest);
                Resolution::Latest(latest)
            }
            Err(e) => Resolution::Failed(format!(
                "Could not check update for {} in {}: {}",
                record.pin.subject(),
                record.file,
                e.detail()
            )),
        }
    }

    fn resolve_action(&self, action: &str, git_ref: &str) -> Result<String> {
        self.source_host
            .resolve_commit(&action_repository(action), git_ref)
    }

    fn fetch_listing(&self, source: &UpstreamSource) -> Result<Vec<String>> {
        let available = match source {
            UpstreamSource::SourceControlReleases { repo, prefix, .. } => {
                self.source_host.list_releases(repo, prefix)?
            }
            UpstreamSource::RegistryTags { image, .. } => self.registry.list_tags(image)?,
        };

        if available.is_empty() {
            return Err(PinupError::Resolution(format!(
                "No upstream versions found in {}",
                source.describe()
            )));
        }
        verbose!("Found {} upstream tags in {}", available.len(), source.describe());
        Ok(available)
    }

    fn select_version(
        current: &str,
        available: &[String],
        strict_minor: bool,
        source: &UpstreamSource,
    ) -> Result<String> {
        if Version::parse(current).is_none() {
            return Err(PinupError::Resolution(format!(
                "'{current}' does not look like a version"
            )));
        }

        let selector = UpgradeSelector::new(source.tag_template());
        Ok(match selector.select(current, available, strict_minor) {
            Some(latest) => restore_prefix(current, latest),
            None => current.to_string(),
        })
    }
}
