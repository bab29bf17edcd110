use crate::agents::extract::{CandidateExtractor, RegexExtractor, substitute_args};
use crate::config::UpstreamConfig;
use crate::pin::{Pin, PinRecord};
use crate::registry::version::Version;
use crate::utils::verbose::verbose;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static COMMIT_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap());

/// ReferenceScanner finds pinned and pinnable references under a repository root.
///
/// Pure text scan: no network access, and unreadable or unmatched input is
/// skipped rather than reported as an error.
pub struct ReferenceScanner<E: CandidateExtractor = RegexExtractor> {
    root: PathBuf,
    extractor: E,
}

impl ReferenceScanner<RegexExtractor> {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_extractor(root, RegexExtractor)
    }
}

impl<E: CandidateExtractor> ReferenceScanner<E> {
    pub fn with_extractor<P: AsRef<Path>>(root: P, extractor: E) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extractor,
        }
    }

    /// Every record in discovery order: Dockerfiles, then workflows, then
    /// configured version-list files.
    pub fn scan(&self, upstream: &UpstreamConfig) -> Vec<PinRecord> {
        let mut records = self.scan_dockerfiles();
        records.extend(self.scan_workflows());
        records.extend(self.scan_version_files(upstream));
        records
    }

    pub fn scan_dockerfiles(&self) -> Vec<PinRecord> {
        let mut records = Vec::new();
        for path in self.find_files(&self.root, |name| name == "Dockerfile") {
            if let Some(content) = self.read(&path) {
                records.extend(self.dockerfile_records(&self.relative(&path), &content));
            }
        }
        records
    }

    pub fn scan_workflows(&self) -> Vec<PinRecord> {
        let github_dir = self.root.join(".github");
        if !github_dir.is_dir() {
            return Vec::new();
        }

        let mut records = Vec::new();
        let is_yaml = |name: &str| name.ends_with(".yml") || name.ends_with(".yaml");
        for path in self.find_files(&github_dir, is_yaml) {
            if let Some(content) = self.read(&path) {
                records.extend(self.workflow_records(&self.relative(&path), &content));
            }
        }
        records
    }

    pub fn scan_version_files(&self, upstream: &UpstreamConfig) -> Vec<PinRecord> {
        let mut records = Vec::new();
        for (file, source) in &upstream.sources {
            let path = self.root.join(file);
            let Some(content) = self.read(&path) else {
                continue;
            };

            let entries: Vec<&str> = content.split_whitespace().collect();
            let minors_by_major = minors_by_major(&entries);

            for entry in entries {
                let strict_minor = Version::parse(entry)
                    .and_then(|v| minors_by_major.get(&v.major()))
                    .is_some_and(|minors| minors.len() > 1);

                records.push(PinRecord {
                    file: file.clone(),
                    pin: Pin::VersionEntry {
                        current_version: entry.to_string(),
                        strict_minor,
                        source: source.clone(),
                    },
                });
            }
        }
        records
    }

    fn dockerfile_records(&self, file: &str, content: &str) -> Vec<PinRecord> {
        let args: HashMap<String, String> = self.extractor.build_args(content).into_iter().collect();
        let mut stages: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        for candidate in self.extractor.from_lines(content) {
            let resolved = substitute_args(&candidate.reference, &args);
            let is_stage = stages.contains(&resolved.to_ascii_lowercase());
            if let Some(alias) = &candidate.alias {
                stages.insert(alias.to_ascii_lowercase());
            }
            if is_stage || resolved == "scratch" {
                continue;
            }

            let pin = match resolved.split_once("@sha256:") {
                Some((base, hex)) => {
                    let (image, tag) = split_image_tag(base);
                    Pin::DockerDigest {
                        image,
                        tag,
                        current_digest: format!("sha256:{hex}"),
                        raw_ref: candidate.reference,
                    }
                }
                None => {
                    let (image, tag) = split_image_tag(&resolved);
                    Pin::DockerUnpinned {
                        image,
                        tag,
                        raw_ref: candidate.reference,
                    }
                }
            };

            records.push(PinRecord {
                file: file.to_string(),
                pin,
            });
        }

        records
    }

    fn workflow_records(&self, file: &str, content: &str) -> Vec<PinRecord> {
        self.extractor
            .uses_lines(content)
            .into_iter()
            .filter(|c| !c.action.starts_with("./"))
            .map(|c| {
                let raw_ref = format!("{}@{}", c.action, c.git_ref);
                let pin = if COMMIT_SHA.is_match(&c.git_ref) {
                    Pin::ActionPinned {
                        action: c.action,
                        current_sha: c.git_ref,
                        tag: c.comment_tag,
                        raw_ref,
                    }
                } else {
                    Pin::ActionUnpinned {
                        action: c.action,
                        git_ref: c.git_ref,
                        raw_ref,
                    }
                };
                PinRecord {
                    file: file.to_string(),
                    pin,
                }
            })
            .collect()
    }

    fn find_files<F>(&self, dir: &Path, matches: F) -> Vec<PathBuf>
    where
        F: Fn(&str) -> bool,
    {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().is_some_and(&matches))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    fn read(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) => {
                verbose!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Split `image[:tag]` on the last `:`. A `:` followed by a `/` belongs to a
/// registry port, so `registry:5000/app` has the default tag.
pub fn split_image_tag(reference: &str) -> (String, String) {
    match reference.rsplit_once(':') {
        Some((image, tag)) if !tag.contains('/') => (image.to_string(), tag.to_string()),
        _ => (reference.to_string(), "latest".to_string()),
    }
}

fn minors_by_major(entries: &[&str]) -> HashMap<u64, BTreeSet<u64>> {
    let mut map: HashMap<u64, BTreeSet<u64>> = HashMap::new();
    for version in entries.iter().filter_map(|e| Version::parse(e)) {
        map.entry(version.major()).or_default().insert(version.minor());
    }
    map
}
