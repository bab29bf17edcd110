use super::version_resolver::{Resolution, ResolutionResult};
use crate::error::{PinupError, Result};
use crate::pin::{Pin, PinKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Result of a `check` run. Serialized as the sole stdout product and read
/// back by `apply` and `format-report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub updates: Vec<Update>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub up_to_date: Vec<UpToDate>,
}

impl Report {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PinupError::Config(format!("Cannot read report {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "Summary: {} update(s), {} warning(s), {} up-to-date",
            self.updates.len(),
            self.warnings.len(),
            self.up_to_date.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    DockerDigest {
        file: String,
        image: String,
        tag: String,
        current_digest: String,
        latest_digest: String,
        raw_ref: String,
    },
    DockerUnpinned {
        file: String,
        image: String,
        tag: String,
        latest_digest: String,
        raw_ref: String,
    },
    ActionPinned {
        file: String,
        action: String,
        tag: String,
        current_sha: String,
        latest_sha: String,
        raw_ref: String,
    },
    /// `tag` holds the mutable ref the action was referenced by.
    ActionUnpinned {
        file: String,
        action: String,
        tag: String,
        latest_sha: String,
        raw_ref: String,
    },
    VariantUpdate {
        file: String,
        current_version: String,
        latest_version: String,
        raw_ref: String,
    },
}

impl Update {
    pub fn file(&self) -> &str {
        match self {
            Update::DockerDigest { file, .. }
            | Update::DockerUnpinned { file, .. }
            | Update::ActionPinned { file, .. }
            | Update::ActionUnpinned { file, .. }
            | Update::VariantUpdate { file, .. } => file,
        }
    }

    pub fn kind(&self) -> PinKind {
        match self {
            Update::DockerDigest { .. } => PinKind::DockerDigest,
            Update::DockerUnpinned { .. } => PinKind::DockerUnpinned,
            Update::ActionPinned { .. } => PinKind::ActionPinned,
            Update::ActionUnpinned { .. } => PinKind::ActionUnpinned,
            Update::VariantUpdate { .. } => PinKind::VariantUpdate,
        }
    }

    pub fn raw_ref(&self) -> &str {
        match self {
            Update::DockerDigest { raw_ref, .. }
            | Update::DockerUnpinned { raw_ref, .. }
            | Update::ActionPinned { raw_ref, .. }
            | Update::ActionUnpinned { raw_ref, .. }
            | Update::VariantUpdate { raw_ref, .. } => raw_ref,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpToDate {
    DockerDigest {
        file: String,
        image: String,
        tag: String,
        digest: String,
        raw_ref: String,
    },
    ActionPinned {
        file: String,
        action: String,
        tag: String,
        sha: String,
        raw_ref: String,
    },
    VariantUpdate {
        file: String,
        version: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: PinKind,
    pub subject: String,
    pub reason: String,
}

pub const NO_TAG_REASON: &str = "SHA-pinned action without tag comment";

enum Outcome {
    Update(Update),
    UpToDate(UpToDate),
    Warning(Warning),
}

/// Classifies resolution results into report categories.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(results: &[ResolutionResult]) -> Report {
        let mut report = Report::default();
        for result in results {
            match Self::classify(result) {
                Outcome::Update(update) => report.updates.push(update),
                Outcome::UpToDate(entry) => report.up_to_date.push(entry),
                Outcome::Warning(warning) => report.warnings.push(warning),
            }
        }
        report
    }

    fn classify(result: &ResolutionResult) -> Outcome {
        let record = &result.record;
        let file = record.file.clone();

        let latest = match &result.resolution {
            Resolution::Latest(latest) => latest.clone(),
            Resolution::Failed(reason) => {
                return Outcome::Warning(Warning {
                    file,
                    kind: record.pin.kind(),
                    subject: record.pin.subject(),
                    reason: reason.clone(),
                });
            }
            Resolution::Skipped => {
                return Outcome::Warning(Warning {
                    file,
                    kind: PinKind::ActionNoTag,
                    subject: record.pin.subject(),
                    reason: NO_TAG_REASON.to_string(),
                });
            }
        };

        let is_current = record.pin.current_value() == Some(latest.as_str());

        match &record.pin {
            // Without a tag comment nothing can be applied safely.
            Pin::ActionPinned { tag: None, .. } => Outcome::Warning(Warning {
                file,
                kind: PinKind::ActionNoTag,
                subject: record.pin.subject(),
                reason: NO_TAG_REASON.to_string(),
            }),
            Pin::DockerDigest {
                image,
                tag,
                current_digest,
                raw_ref,
            } => {
                if is_current {
                    Outcome::UpToDate(UpToDate::DockerDigest {
                        file,
                        image: image.clone(),
                        tag: tag.clone(),
                        digest: latest,
                        raw_ref: raw_ref.clone(),
                    })
                } else {
                    Outcome::Update(Update::DockerDigest {
                        file,
                        image: image.clone(),
                        tag: tag.clone(),
                        current_digest: current_digest.clone(),
                        latest_digest: latest,
                        raw_ref: raw_ref.clone(),
                    })
                }
            }
            Pin::DockerUnpinned {
                image,
                tag,
                raw_ref,
            } => Outcome::Update(Update::DockerUnpinned {
                file,
                image: image.clone(),
                tag: tag.clone(),
                latest_digest: latest,
                raw_ref: raw_ref.clone(),
            }),
            Pin::ActionPinned {
                action,
                current_sha,
                tag: Some(tag),
                raw_ref,
            } => {
                if is_current {
                    Outcome::UpToDate(UpToDate::ActionPinned {
                        file,
                        action: action.clone(),
                        tag: tag.clone(),
                        sha: latest,
                        raw_ref: raw_ref.clone(),
                    })
                } else {
                    Outcome::Update(Update::ActionPinned {
                        file,
                        action: action.clone(),
                        tag: tag.clone(),
                        current_sha: current_sha.clone(),
                        latest_sha: latest,
                        raw_ref: raw_ref.clone(),
                    })
                }
            }
            Pin::ActionUnpinned {
                action,
                git_ref,
                raw_ref,
            } => Outcome::Update(Update::ActionUnpinned {
                file,
                action: action.clone(),
                tag: git_ref.clone(),
                latest_sha: latest,
                raw_ref: raw_ref.clone(),
            }),
            Pin::VersionEntry {
                current_version, ..
            } => {
                if is_current {
                    Outcome::UpToDate(UpToDate::VariantUpdate {
                        file,
                        version: latest,
                    })
                } else {
                    Outcome::Update(Update::VariantUpdate {
                        file,
                        current_version: current_version.clone(),
                        latest_version: latest,
                        raw_ref: current_version.clone(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamSource;
    use crate::pin::PinRecord;

    fn digest(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    fn result(file: &str, pin: Pin, resolution: Resolution) -> ResolutionResult {
        ResolutionResult {
            record: PinRecord {
                file: file.into(),
                pin,
            },
            resolution,
        }
    }

    #[test]
    fn changed_digest_becomes_an_update() {
        let report = ReportBuilder::build(&[result(
            "Dockerfile",
            Pin::DockerDigest {
                image: "python".into(),
                tag: "3.11".into(),
                current_digest: digest('a'),
                raw_ref: format!("python:3.11@{}", digest('a')),
            },
            Resolution::Latest(digest('b')),
        )]);

        assert_eq!(report.updates.len(), 1);
        assert!(report.warnings.is_empty() && report.up_to_date.is_empty());
        match &report.updates[0] {
            Update::DockerDigest {
                current_digest,
                latest_digest,
                ..
            } => {
                assert_eq!(current_digest, &digest('a'));
                assert_eq!(latest_digest, &digest('b'));
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn unpinned_action_is_always_an_update() {
        let sha = "deadbeef".repeat(5);
        let report = ReportBuilder::build(&[result(
            ".github/workflows/ci.yml",
            Pin::ActionUnpinned {
                action: "actions/checkout".into(),
                git_ref: "main".into(),
                raw_ref: "actions/checkout@main".into(),
            },
            Resolution::Latest(sha.clone()),
        )]);

        assert_eq!(
            report.updates,
            vec![Update::ActionUnpinned {
                file: ".github/workflows/ci.yml".into(),
                action: "actions/checkout".into(),
                tag: "main".into(),
                latest_sha: sha,
                raw_ref: "actions/checkout@main".into(),
            }]
        );
    }

    #[test]
    fn untagged_sha_pin_is_always_a_warning() {
        let sha = "a".repeat(40);
        let pin = Pin::ActionPinned {
            action: "actions/checkout".into(),
            current_sha: sha.clone(),
            tag: None,
            raw_ref: format!("actions/checkout@{sha}"),
        };
        let report = ReportBuilder::build(&[
            result("a.yml", pin.clone(), Resolution::Skipped),
            result("b.yml", pin, Resolution::Latest("b".repeat(40))),
        ]);

        assert!(report.updates.is_empty() && report.up_to_date.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert!(report
            .warnings
            .iter()
            .all(|w| w.kind == PinKind::ActionNoTag && w.reason == NO_TAG_REASON));
    }

    #[test]
    fn every_record_lands_in_exactly_one_category() {
        let source = UpstreamSource::RegistryTags {
            image: "app".into(),
            tag_template: None,
        };
        let entry = |v: &str| Pin::VersionEntry {
            current_version: v.into(),
            strict_minor: true,
            source: source.clone(),
        };
        let results = [
            result("VARIANTS", entry("1.2.0"), Resolution::Latest("1.2.5".into())),
            result("VARIANTS", entry("1.3.0"), Resolution::Latest("1.3.0".into())),
            result(
                "Dockerfile",
                Pin::DockerUnpinned {
                    image: "private/app".into(),
                    tag: "1".into(),
                    raw_ref: "private/app:1".into(),
                },
                Resolution::Failed("crane digest failed".into()),
            ),
        ];
        let report = ReportBuilder::build(&results);

        assert_eq!(
            report.updates,
            vec![Update::VariantUpdate {
                file: "VARIANTS".into(),
                current_version: "1.2.0".into(),
                latest_version: "1.2.5".into(),
                raw_ref: "1.2.0".into(),
            }]
        );
        assert_eq!(
            report.up_to_date,
            vec![UpToDate::VariantUpdate {
                file: "VARIANTS".into(),
                version: "1.3.0".into(),
            }]
        );
        assert_eq!(report.warnings[0].kind, PinKind::DockerUnpinned);
        assert_eq!(report.summary(), "Summary: 1 update(s), 1 warning(s), 1 up-to-date");
    }

    #[test]
    fn report_json_uses_type_tags() {
        let report = Report {
            updates: vec![Update::VariantUpdate {
                file: "VARIANTS".into(),
                current_version: "1.0".into(),
                latest_version: "1.1".into(),
                raw_ref: "1.0".into(),
            }],
            warnings: vec![Warning {
                file: "a.yml".into(),
                kind: PinKind::ActionNoTag,
                subject: "x/y@abc".into(),
                reason: NO_TAG_REASON.into(),
            }],
            up_to_date: Vec::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["updates"][0]["type"], "variant_update");
        assert_eq!(value["warnings"][0]["type"], "action_no_tag");

        let parsed: Report = serde_json::from_str(r#"{"updates": []}"#).unwrap();
        assert_eq!(parsed, Report::default());
    }
}
