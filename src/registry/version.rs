use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A version string reduced to a `(major, minor, micro)` triple.
///
/// Every maximal run of digits counts as a component, so `"v1.2"`,
/// `"1.2.0"` and `"1.2-0"` all compare equal. Components past the third are
/// ignored; missing ones are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    key: semver::Version,
}

impl Version {
    /// `None` when the string carries no digits (or a component overflows).
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = Vec::with_capacity(3);
        for run in DIGIT_RUN.find_iter(version) {
            parts.push(run.as_str().parse::<u64>().ok()?);
        }
        if parts.is_empty() {
            return None;
        }

        let component = |i: usize| parts.get(i).copied().unwrap_or(0);
        Some(Self {
            original: version.to_string(),
            key: semver::Version::new(component(0), component(1), component(2)),
        })
    }

    pub fn major(&self) -> u64 {
        self.key.major
    }

    pub fn minor(&self) -> u64 {
        self.key.minor
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Picks the upgrade for one tracked version out of an upstream listing.
#[derive(Debug, Clone, Default)]
pub struct UpgradeSelector {
    template: Option<Regex>,
}

impl UpgradeSelector {
    /// `tag_template` contains a `{version}` placeholder; every other
    /// character is matched literally.
    pub fn new(tag_template: Option<&str>) -> Self {
        let template = tag_template.and_then(|template| {
            let pattern = format!(
                "^{}$",
                regex::escape(template).replace(&regex::escape("{version}"), "(.*)")
            );
            Regex::new(&pattern).ok()
        });
        Self { template }
    }

    /// Highest candidate strictly newer than `current`, on the same major
    /// (and, with `strict_minor`, the same minor). Candidates with letters
    /// are treated as pre-releases and skipped. On ties the first listed
    /// candidate wins.
    pub fn select(&self, current: &str, available: &[String], strict_minor: bool) -> Option<String> {
        let current = Version::parse(current)?;
        let mut best: Option<Version> = None;

        for raw in available {
            let Some(clean) = self.extract(raw) else {
                continue;
            };
            if clean.chars().any(|c| c.is_alphabetic()) {
                continue;
            }
            let Some(candidate) = Version::parse(clean) else {
                continue;
            };

            if candidate <= current || candidate.major() != current.major() {
                continue;
            }
            if strict_minor && candidate.minor() != current.minor() {
                continue;
            }

            if best.as_ref().is_none_or(|b| candidate > *b) {
                best = Some(candidate);
            }
        }

        best.map(|v| v.original)
    }

    fn extract<'a>(&self, raw: &'a str) -> Option<&'a str> {
        match &self.template {
            Some(template) => template
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str()),
            None => Some(raw),
        }
    }
}

/// Put a `v` back on `latest` when the tracked entry used one.
pub fn restore_prefix(current: &str, latest: String) -> String {
    if current.starts_with('v') && !latest.starts_with('v') {
        format!("v{latest}")
    } else {
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn triple_comparison_orders_versions() {
        let a = Version::parse("1.2.3").unwrap();
        let b = Version::parse("1.3.0").unwrap();
        assert!(b > a);
    }

    #[test]
    fn missing_components_are_zero_padded() {
        assert_eq!(
            Version::parse("2.0").unwrap().cmp(&Version::parse("2.0.0").unwrap()),
            Ordering::Equal
        );
        assert_eq!(Version::parse("v3").unwrap().minor(), 0);
    }

    #[test]
    fn digit_runs_are_extracted_in_order() {
        let v = Version::parse("jdk-17.0.9+9").unwrap();
        assert_eq!((v.major(), v.minor()), (17, 0));
        assert!(v < Version::parse("17.0.10").unwrap());
        assert!(v > Version::parse("17.0.8").unwrap());
        assert!(Version::parse("latest").is_none());
    }

    #[test]
    fn selects_highest_on_same_major() {
        let selector = UpgradeSelector::new(None);
        let available = list(&["1.2.5", "2.0.0", "1.4.0", "1.3.9"]);
        assert_eq!(
            selector.select("1.2.0", &available, false),
            Some("1.4.0".to_string())
        );
    }

    #[test]
    fn strict_minor_locks_the_minor_line() {
        let selector = UpgradeSelector::new(None);
        let available = list(&["1.2.5", "1.4.0"]);
        assert_eq!(
            selector.select("1.2.0", &available, true),
            Some("1.2.5".to_string())
        );
        assert_eq!(selector.select("1.3.0", &available, true), None);
    }

    #[test]
    fn pre_releases_are_skipped() {
        let selector = UpgradeSelector::new(None);
        let available = list(&["1.3.0-rc1", "1.3.0beta", "1.2.1"]);
        assert_eq!(
            selector.select("1.2.0", &available, false),
            Some("1.2.1".to_string())
        );
    }

    #[test]
    fn nothing_newer_yields_none() {
        let selector = UpgradeSelector::new(None);
        assert_eq!(selector.select("1.2.0", &list(&["1.2.0", "1.1.9"]), false), None);
        assert_eq!(selector.select("no-digits", &list(&["1.0.0"]), false), None);
    }

    #[test]
    fn tag_template_filters_and_extracts() {
        let selector = UpgradeSelector::new(Some("{version}-slim-bookworm"));
        let available = list(&[
            "3.12.7-slim-bookworm",
            "3.12.8",
            "3.12.9-alpine",
            "3.12.6-slim-bookworm",
        ]);
        assert_eq!(
            selector.select("3.12.5", &available, false),
            Some("3.12.7".to_string())
        );
    }

    #[test]
    fn template_literals_are_escaped() {
        let selector = UpgradeSelector::new(Some("release.{version}"));
        assert_eq!(selector.select("1.0", &list(&["releasex1.5"]), false), None);
        assert_eq!(
            selector.select("1.0", &list(&["release.1.5"]), false),
            Some("1.5".to_string())
        );
    }

    #[test]
    fn first_listed_wins_on_equal_versions() {
        let selector = UpgradeSelector::new(None);
        assert_eq!(
            selector.select("1.0.0", &list(&["1.1", "1.1.0"]), false),
            Some("1.1".to_string())
        );
    }

    #[test]
    fn prefix_is_restored_only_when_missing() {
        assert_eq!(restore_prefix("v1.2.0", "1.2.5".into()), "v1.2.5");
        assert_eq!(restore_prefix("v1.2.0", "v1.2.5".into()), "v1.2.5");
        assert_eq!(restore_prefix("1.2.0", "1.2.5".into()), "1.2.5");
    }
}
