use crate::config::UpstreamSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pinned (or pinnable) dependency reference found in a repository file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    /// Path relative to the repository root, with `/` separators.
    pub file: String,
    pub pin: Pin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pin {
    /// `FROM image:tag@sha256:...`
    DockerDigest {
        image: String,
        tag: String,
        current_digest: String,
        raw_ref: String,
    },
    /// `FROM image:tag` without a digest.
    DockerUnpinned {
        image: String,
        tag: String,
        raw_ref: String,
    },
    /// `uses: owner/repo@<40 hex>` with an optional `# v1.2.3` comment.
    ActionPinned {
        action: String,
        current_sha: String,
        tag: Option<String>,
        raw_ref: String,
    },
    /// `uses: owner/repo@<branch or tag>`
    ActionUnpinned {
        action: String,
        git_ref: String,
        raw_ref: String,
    },
    /// One entry of a version-list file tracked against an upstream source.
    VersionEntry {
        current_version: String,
        strict_minor: bool,
        source: UpstreamSource,
    },
}

/// Record kinds as they appear in the report's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    DockerDigest,
    DockerUnpinned,
    ActionPinned,
    ActionUnpinned,
    ActionNoTag,
    VariantUpdate,
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PinKind::DockerDigest => "docker_digest",
            PinKind::DockerUnpinned => "docker_unpinned",
            PinKind::ActionPinned => "action_pinned",
            PinKind::ActionUnpinned => "action_unpinned",
            PinKind::ActionNoTag => "action_no_tag",
            PinKind::VariantUpdate => "variant_update",
        };
        f.write_str(label)
    }
}

impl Pin {
    pub fn kind(&self) -> PinKind {
        match self {
            Pin::DockerDigest { .. } => PinKind::DockerDigest,
            Pin::DockerUnpinned { .. } => PinKind::DockerUnpinned,
            Pin::ActionPinned { tag: None, .. } => PinKind::ActionNoTag,
            Pin::ActionPinned { .. } => PinKind::ActionPinned,
            Pin::ActionUnpinned { .. } => PinKind::ActionUnpinned,
            Pin::VersionEntry { .. } => PinKind::VariantUpdate,
        }
    }

    /// Short human label: `image:tag`, `action@ref` or the version string.
    pub fn subject(&self) -> String {
        match self {
            Pin::DockerDigest { image, tag, .. } | Pin::DockerUnpinned { image, tag, .. } => {
                format!("{image}:{tag}")
            }
            Pin::ActionPinned {
                action,
                tag: Some(tag),
                ..
            } => format!("{action}@{tag}"),
            Pin::ActionPinned {
                action,
                current_sha,
                tag: None,
                ..
            } => format!("{action}@{current_sha}"),
            Pin::ActionUnpinned {
                action, git_ref, ..
            } => format!("{action}@{git_ref}"),
            Pin::VersionEntry {
                current_version, ..
            } => current_version.clone(),
        }
    }

    /// Value the resolver's answer is compared against, if the record has one.
    pub fn current_value(&self) -> Option<&str> {
        match self {
            Pin::DockerDigest { current_digest, .. } => Some(current_digest),
            Pin::ActionPinned { current_sha, .. } => Some(current_sha),
            Pin::VersionEntry {
                current_version, ..
            } => Some(current_version),
            Pin::DockerUnpinned { .. } | Pin::ActionUnpinned { .. } => None,
        }
    }
}

/// `owner/repo` of an action reference; sub-paths (`owner/repo/sub/dir`) are dropped.
pub fn action_repository(action: &str) -> String {
    action.split('/').take(2).collect::<Vec<_>>().join("/")
}
