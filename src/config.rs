use crate::error::{PinupError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default location of the upstream-source config, relative to the repository root.
pub const DEFAULT_UPSTREAM_CONFIG: &str = "ci/upstream_config.json";

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

fn default_release_prefix() -> String {
    "v".to_string()
}

/// Where newer versions of a version-list file come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum UpstreamSource {
    /// Published releases of a GitHub repository.
    #[serde(alias = "github_release")]
    SourceControlReleases {
        repo: String,
        /// Prefix stripped from release tags; tags without it are ignored.
        #[serde(default = "default_release_prefix")]
        prefix: String,
        #[serde(default)]
        tag_template: Option<String>,
    },
    /// Tags of a container image repository.
    #[serde(alias = "docker_hub")]
    RegistryTags {
        image: String,
        #[serde(default)]
        tag_template: Option<String>,
    },
}

impl UpstreamSource {
    pub fn tag_template(&self) -> Option<&str> {
        match self {
            UpstreamSource::SourceControlReleases { tag_template, .. }
            | UpstreamSource::RegistryTags { tag_template, .. } => tag_template.as_deref(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            UpstreamSource::SourceControlReleases { repo, .. } => format!("releases of {repo}"),
            UpstreamSource::RegistryTags { image, .. } => format!("tags of {image}"),
        }
    }
}

/// Version-list file path (relative to the repository root) → upstream source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct UpstreamConfig {
    pub sources: BTreeMap<String, UpstreamSource>,
}

impl UpstreamConfig {
    /// Load a JSON or TOML config, chosen by extension. A missing file is an
    /// empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PinupError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Settings for the branch, commit and pull request produced by `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestConfig {
    pub branch: String,
    pub base: String,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            branch: "auto-update/pinned-deps".to_string(),
            base: "main".to_string(),
            commit_message: "update: pinned dependency digests/SHAs".to_string(),
            author_name: "github-actions[bot]".to_string(),
            author_email: "41898282+github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

impl PullRequestConfig {
    pub fn with_overrides(
        branch: Option<String>,
        base: Option<String>,
        commit_message: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            branch: branch.unwrap_or(defaults.branch),
            base: base.unwrap_or(defaults.base),
            commit_message: commit_message.unwrap_or(defaults.commit_message),
            ..defaults
        }
    }
}

/// GitHub access settings, read from the usual Actions environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub api_url: String,
    pub token: Option<String>,
    pub repository: Option<String>,
}

impl GitHubSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_url: non_empty("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            token: non_empty("GH_TOKEN").or_else(|| non_empty("GITHUB_TOKEN")),
            repository: non_empty("GITHUB_REPOSITORY"),
        }
    }

    pub fn require_repository(&self) -> Result<&str> {
        self.repository.as_deref().ok_or_else(|| {
            PinupError::Config("GITHUB_REPOSITORY must be set to 'owner/repo'".to_string())
        })
    }
}
