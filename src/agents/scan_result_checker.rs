use crate::error::{PinupError, Result};
use crate::utils::glob::GlobMatcher;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Ignore entries that name advisories and never act as path globs.
const ADVISORY_PREFIXES: [&str; 3] = ["CVE-", "GHSA-", "RUSTSEC-"];

/// Entries of a `.trivyignore`-style file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    entries: BTreeSet<String>,
}

impl IgnoreList {
    /// A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn path_patterns(&self) -> Result<Vec<(&str, GlobMatcher)>> {
        self.entries
            .iter()
            .filter(|entry| !ADVISORY_PREFIXES.iter().any(|p| entry.starts_with(p)))
            .map(|entry| Ok((entry.as_str(), GlobMatcher::new(entry)?)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Target", default)]
    target: Option<String>,
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
    #[serde(rename = "Secrets", default)]
    secrets: Option<Vec<TrivySecret>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    vulnerability_id: Option<String>,
    #[serde(default)]
    pkg_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrivySecret {
    #[serde(rename = "RuleID", default)]
    rule_id: Option<String>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Vulnerability {
        id: String,
        package: String,
        title: String,
    },
    Secret {
        rule_id: String,
        target: String,
        title: String,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Vulnerability { id, package, title } => {
                write!(f, "[VULN] {id} ({package}): {title}")
            }
            Finding::Secret {
                rule_id,
                target,
                title,
            } => write!(f, "[SECRET] {rule_id} in {target}: {title}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanVerdict {
    pub ignores_loaded: usize,
    pub findings: Vec<Finding>,
    /// Ignore entries nothing matched, sorted.
    pub stale_ignores: Vec<String>,
}

impl ScanVerdict {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    /// Human-readable report, one line per entry.
    pub fn render(&self, ignore_file: &str) -> Vec<String> {
        let mut lines = vec![format!(
            "Loaded {} ignores from {}",
            self.ignores_loaded, ignore_file
        )];

        if self.passed() {
            lines.push(String::new());
            lines.push("[SUCCESS] No unignored vulnerabilities found.".to_string());
        } else {
            lines.push(String::new());
            lines.push("[FAILURE] Unignored High/Critical findings detected:".to_string());
            lines.extend(self.findings.iter().map(|f| format!("  {f}")));
        }

        if !self.stale_ignores.is_empty() {
            lines.push(String::new());
            lines.push(
                "[STALE IGNORES] The following ignores are no longer detected and can be removed:"
                    .to_string(),
            );
            lines.extend(self.stale_ignores.iter().map(|i| format!("  - {i}")));
        }
        lines
    }
}

/// Filters Trivy findings through an ignore list and reports unused ignores.
pub struct ScanResultChecker {
    ignores: IgnoreList,
}

impl ScanResultChecker {
    pub fn new(ignores: IgnoreList) -> Self {
        Self { ignores }
    }

    pub fn check_file(&self, results: &Path) -> Result<ScanVerdict> {
        let content = fs::read_to_string(results).map_err(|e| {
            PinupError::Config(format!(
                "Error loading scan results {}: {e}",
                results.display()
            ))
        })?;
        self.check_json(&content)
    }

    pub fn check_json(&self, json: &str) -> Result<ScanVerdict> {
        let report: TrivyReport = serde_json::from_str(json)?;
        let patterns = self.ignores.path_patterns()?;
        let mut used: BTreeSet<&str> = BTreeSet::new();
        let mut findings = Vec::new();

        for result in report.results.unwrap_or_default() {
            let target = result.target.unwrap_or_else(|| "unknown".to_string());

            for vuln in result.vulnerabilities.unwrap_or_default() {
                let Some(id) = vuln.vulnerability_id else {
                    continue;
                };
                if let Some(entry) = self.ignores.entries.get(&id) {
                    used.insert(entry.as_str());
                    continue;
                }
                findings.push(Finding::Vulnerability {
                    id,
                    package: vuln.pkg_name.unwrap_or_else(|| "unknown".to_string()),
                    title: vuln.title.unwrap_or_else(|| "No title".to_string()),
                });
            }

            let basename = target.rsplit('/').next().unwrap_or(&target).to_string();
            for secret in result.secrets.unwrap_or_default() {
                let rule_id = secret.rule_id.unwrap_or_else(|| "unknown".to_string());

                if let Some(entry) = self.ignores.entries.get(&rule_id) {
                    used.insert(entry.as_str());
                    continue;
                }

                let by_path = patterns
                    .iter()
                    .find(|(_, glob)| glob.matches(&target) || glob.matches(&basename));
                if let Some((entry, _)) = by_path {
                    used.insert(*entry);
                    continue;
                }

                findings.push(Finding::Secret {
                    rule_id,
                    target: target.clone(),
                    title: secret.title.unwrap_or_else(|| "No title".to_string()),
                });
            }
        }

        let stale_ignores = self
            .ignores
            .entries
            .iter()
            .filter(|entry| !used.contains(entry.as_str()))
            .cloned()
            .collect();

        Ok(ScanVerdict {
            ignores_loaded: self.ignores.len(),
            findings,
            stale_ignores,
        })
    }
}
