use super::report_builder::Update;
use super::version_control::VersionControlAgent;
use crate::config::PullRequestConfig;
use crate::error::{PinupError, Result};
use crate::pin::PinKind;
use crate::repository::{PullRequest, PullRequestHost, RemoteRepository, TreeEntry};
use crate::utils::path_validator::PathValidator;
use crate::utils::verbose::verbose;
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Deduplicated updates targeting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    pub file: String,
    pub updates: Vec<Update>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The report had no updates.
    NothingToApply,
    /// Updates were present but no file content changed.
    NoChanges,
    /// Files rewritten in place without any git step.
    FilesRewritten(Vec<String>),
    PullRequest {
        pull_request: PullRequest,
        reused: bool,
    },
}

/// How a planned set of rewrites becomes a reviewable change.
pub trait ApplyStrategy {
    fn apply(
        &self,
        config: &PullRequestConfig,
        plans: &[FilePlan],
        body: &str,
    ) -> Result<ApplyOutcome>;
}

/// UpdateApplier turns a report's updates into file rewrites and hands them
/// to a strategy together with the pull request settings.
pub struct UpdateApplier {
    config: PullRequestConfig,
}

impl UpdateApplier {
    pub fn new(config: PullRequestConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, updates: &[Update], strategy: &dyn ApplyStrategy) -> Result<ApplyOutcome> {
        if updates.is_empty() {
            return Ok(ApplyOutcome::NothingToApply);
        }
        let plans = plan(updates);
        let body = pull_request_body(updates);
        strategy.apply(&self.config, &plans, &body)
    }
}

/// Group updates by file in first-appearance order, keeping the first update
/// for each `(type, raw_ref)` pair within a file.
pub fn plan(updates: &[Update]) -> Vec<FilePlan> {
    let mut plans: Vec<FilePlan> = Vec::new();
    let mut seen: HashSet<(String, PinKind, String)> = HashSet::new();

    for update in updates {
        let key = (
            update.file().to_string(),
            update.kind(),
            update.raw_ref().to_string(),
        );
        if !seen.insert(key) {
            continue;
        }

        match plans.iter_mut().find(|p| p.file == update.file()) {
            Some(plan) => plan.updates.push(update.clone()),
            None => plans.push(FilePlan {
                file: update.file().to_string(),
                updates: vec![update.clone()],
            }),
        }
    }
    plans
}

/// Apply every update of a file to its content.
pub fn rewrite(content: &str, updates: &[Update]) -> String {
    let mut content = content.to_string();
    for update in updates {
        content = match update {
            Update::DockerDigest {
                current_digest,
                latest_digest,
                ..
            } => content.replace(current_digest.as_str(), latest_digest),
            Update::DockerUnpinned {
                latest_digest,
                raw_ref,
                ..
            } => replace_token(&content, raw_ref, &format!("{raw_ref}@{latest_digest}")),
            Update::ActionPinned {
                current_sha,
                latest_sha,
                ..
            } => content.replace(current_sha.as_str(), latest_sha),
            Update::ActionUnpinned {
                action,
                tag,
                latest_sha,
                raw_ref,
                ..
            } => replace_token(&content, raw_ref, &format!("{action}@{latest_sha} # {tag}")),
            Update::VariantUpdate {
                current_version,
                latest_version,
                ..
            } => replace_token(&content, current_version, latest_version),
        };
    }
    content
}

/// Replace `needle` only where it is a whole whitespace-delimited token.
fn replace_token(content: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (start, _) in content.match_indices(needle) {
        let end = start + needle.len();
        let bounded_before = content[..start]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        let bounded_after = content[end..].chars().next().is_none_or(char::is_whitespace);
        if !bounded_before || !bounded_after {
            continue;
        }
        out.push_str(&content[last..start]);
        out.push_str(replacement);
        last = end;
    }
    out.push_str(&content[last..]);
    out
}

fn abbreviate(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}

pub fn pull_request_body(updates: &[Update]) -> String {
    let mut lines = vec![
        "## Summary".to_string(),
        String::new(),
        "Automated update of pinned dependency digests and/or SHAs.".to_string(),
        String::new(),
        "### Updated dependencies".to_string(),
        String::new(),
    ];

    for update in updates {
        match update {
            Update::DockerDigest {
                file,
                image,
                tag,
                current_digest,
                latest_digest,
                ..
            } => {
                lines.push(format!("- **{image}:{tag}** in `{file}`"));
                lines.push(format!(
                    "  - `{}...` -> `{}...`",
                    abbreviate(current_digest, 19),
                    abbreviate(latest_digest, 19)
                ));
            }
            Update::DockerUnpinned {
                file,
                image,
                tag,
                latest_digest,
                ..
            } => {
                lines.push(format!("- **{image}:{tag}** in `{file}` (Pinned)"));
                lines.push(format!(
                    "  - `unpinned` -> `{}...`",
                    abbreviate(latest_digest, 19)
                ));
            }
            Update::ActionPinned {
                file,
                action,
                tag,
                current_sha,
                latest_sha,
                ..
            } => {
                lines.push(format!("- **{action}@{tag}** in `{file}`"));
                lines.push(format!(
                    "  - `{}` -> `{}`",
                    abbreviate(current_sha, 12),
                    abbreviate(latest_sha, 12)
                ));
            }
            Update::ActionUnpinned {
                file,
                action,
                tag,
                latest_sha,
                ..
            } => {
                lines.push(format!("- **{action}@{tag}** in `{file}` (Pinned)"));
                lines.push(format!("  - `unpinned` -> `{}`", abbreviate(latest_sha, 12)));
            }
            Update::VariantUpdate {
                file,
                current_version,
                latest_version,
                ..
            } => {
                lines.push(format!("- **{file}** (Version Update)"));
                lines.push(format!("  - `{current_version}` -> `{latest_version}`"));
            }
        }
    }

    lines.extend(
        [
            "",
            "## Test plan",
            "",
            "- [ ] Verify updated digests/SHAs resolve correctly",
            "- [ ] Confirm the image builds pass with updated dependencies",
        ]
        .map(String::from),
    );
    lines.join("\n")
}

fn open_or_reuse_pull_request<H: PullRequestHost + ?Sized>(
    host: &H,
    config: &PullRequestConfig,
    body: &str,
) -> Result<ApplyOutcome> {
    if let Some(existing) = host.find_open_pull_request(&config.branch)? {
        eprintln!(
            "  {} PR #{} already exists: {}",
            "[ok]".green(),
            existing.number,
            existing.url
        );
        return Ok(ApplyOutcome::PullRequest {
            pull_request: existing,
            reused: true,
        });
    }

    let created =
        host.create_pull_request(&config.commit_message, body, &config.branch, &config.base)?;
    eprintln!(
        "  {} Created PR #{}: {}",
        "[ok]".green(),
        created.number,
        created.url
    );
    Ok(ApplyOutcome::PullRequest {
        pull_request: created,
        reused: false,
    })
}

/// Rewrites files of a checked-out repository and returns the ones that changed.
struct WorkingTree<'a> {
    root: &'a Path,
}

impl WorkingTree<'_> {
    fn rewrite_all(&self, plans: &[FilePlan]) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for plan in plans {
            let path = PathValidator::resolve_in_root(&plan.file, self.root)?;
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    eprintln!(
                        "  {} File {} not found, skipping",
                        "[warn]".yellow(),
                        plan.file
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let updated = rewrite(&content, &plan.updates);
            if updated == content {
                verbose!("{} unchanged", plan.file);
                continue;
            }
            fs::write(&path, updated)?;
            eprintln!("  {} Updated {}", "[ok]".green(), plan.file);
            changed.push(plan.file.clone());
        }
        Ok(changed)
    }
}

/// Rewrite files in place only.
pub struct FilesOnlyStrategy {
    root: PathBuf,
}

impl FilesOnlyStrategy {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ApplyStrategy for FilesOnlyStrategy {
    fn apply(
        &self,
        _config: &PullRequestConfig,
        plans: &[FilePlan],
        _body: &str,
    ) -> Result<ApplyOutcome> {
        let changed = WorkingTree { root: &self.root }.rewrite_all(plans)?;
        if changed.is_empty() {
            return Ok(ApplyOutcome::NoChanges);
        }
        Ok(ApplyOutcome::FilesRewritten(changed))
    }
}

/// Commit on a local checkout, force-push the branch and open a pull request.
pub struct LocalGitStrategy {
    root: PathBuf,
    host: Box<dyn PullRequestHost>,
}

impl LocalGitStrategy {
    pub fn new<P: AsRef<Path>>(root: P, host: Box<dyn PullRequestHost>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            host,
        }
    }
}

impl ApplyStrategy for LocalGitStrategy {
    fn apply(
        &self,
        config: &PullRequestConfig,
        plans: &[FilePlan],
        body: &str,
    ) -> Result<ApplyOutcome> {
        let git = VersionControlAgent::new(&self.root)?;
        git.configure_identity(&config.author_name, &config.author_email)?;
        eprintln!(
            "  Creating branch {} from origin/{}",
            config.branch.cyan(),
            config.base
        );
        git.checkout_branch_from(&config.branch, &config.base)?;

        let changed = WorkingTree { root: &self.root }.rewrite_all(plans)?;
        git.stage(&changed)?;
        if !git.has_staged_changes()? {
            eprintln!("  No changes to commit.");
            return Ok(ApplyOutcome::NoChanges);
        }

        git.commit(&config.commit_message)?;
        eprintln!("  Pushing branch {}", config.branch.cyan());
        git.force_push(&config.branch)?;

        open_or_reuse_pull_request(self.host.as_ref(), config, body)
    }
}

/// Build the commit entirely through the remote git data API.
pub struct RemoteApiStrategy<R: RemoteRepository> {
    repo: R,
}

impl<R: RemoteRepository> RemoteApiStrategy<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }
}

impl<R: RemoteRepository> ApplyStrategy for RemoteApiStrategy<R> {
    fn apply(
        &self,
        config: &PullRequestConfig,
        plans: &[FilePlan],
        body: &str,
    ) -> Result<ApplyOutcome> {
        let base = self.repo.branch_head(&config.base)?.ok_or_else(|| {
            PinupError::Apply(format!("Base branch '{}' not found", config.base))
        })?;

        let mut entries = Vec::new();
        for plan in plans {
            let Some(content) = self.repo.file_contents(&plan.file, &base.commit_sha)? else {
                eprintln!(
                    "  {} File {} not found on {}, skipping",
                    "[warn]".yellow(),
                    plan.file,
                    config.base
                );
                continue;
            };

            let updated = rewrite(&content, &plan.updates);
            if updated == content {
                verbose!("{} unchanged", plan.file);
                continue;
            }
            entries.push(TreeEntry {
                path: plan.file.clone(),
                blob_sha: self.repo.create_blob(&updated)?,
            });
            eprintln!("  {} Updated {}", "[ok]".green(), plan.file);
        }

        if entries.is_empty() {
            eprintln!("  No changes to commit.");
            return Ok(ApplyOutcome::NoChanges);
        }

        let tree_sha = self.repo.create_tree(&base.tree_sha, &entries)?;
        let existing = self.repo.branch_head(&config.branch)?;

        match &existing {
            Some(head) if head.tree_sha == tree_sha => {
                eprintln!(
                    "  Branch {} already has these changes",
                    config.branch.cyan()
                );
            }
            _ => {
                let commit_sha =
                    self.repo
                        .create_commit(&config.commit_message, &tree_sha, &base.commit_sha)?;
                if existing.is_some() {
                    self.repo.update_branch(&config.branch, &commit_sha)?;
                } else {
                    self.repo.create_branch(&config.branch, &commit_sha)?;
                }
                eprintln!(
                    "  Committed {} on {}",
                    abbreviate(&commit_sha, 12),
                    config.branch.cyan()
                );
            }
        }

        open_or_reuse_pull_request(&self.repo, config, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::BranchHead;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn digest(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    fn unpinned_checkout(file: &str) -> Update {
        Update::ActionUnpinned {
            file: file.into(),
            action: "actions/checkout".into(),
            tag: "main".into(),
            latest_sha: "deadbeef".repeat(5),
            raw_ref: "actions/checkout@main".into(),
        }
    }

    #[test]
    fn unpinned_action_is_pinned_with_ref_comment() {
        let content = "steps:\n  - uses: actions/checkout@main\n";
        let updated = rewrite(content, &[unpinned_checkout("ci.yml")]);
        assert_eq!(
            updated,
            format!(
                "steps:\n  - uses: actions/checkout@{} # main\n",
                "deadbeef".repeat(5)
            )
        );
    }

    #[test]
    fn unpinned_image_only_matches_whole_tokens() {
        let content = "FROM python:3.11 AS build\nFROM python:3.11-slim\n";
        let update = Update::DockerUnpinned {
            file: "Dockerfile".into(),
            image: "python".into(),
            tag: "3.11".into(),
            latest_digest: digest('b'),
            raw_ref: "python:3.11".into(),
        };
        assert_eq!(
            rewrite(content, &[update]),
            format!("FROM python:3.11@{} AS build\nFROM python:3.11-slim\n", digest('b'))
        );
    }

    #[test]
    fn digest_and_version_replacements() {
        let content = format!("FROM python:3.11@{}\n", digest('a'));
        let update = Update::DockerDigest {
            file: "Dockerfile".into(),
            image: "python".into(),
            tag: "3.11".into(),
            current_digest: digest('a'),
            latest_digest: digest('b'),
            raw_ref: format!("python:3.11@{}", digest('a')),
        };
        assert_eq!(
            rewrite(&content, &[update]),
            format!("FROM python:3.11@{}\n", digest('b'))
        );

        let variant = Update::VariantUpdate {
            file: "VARIANTS".into(),
            current_version: "1.2.0".into(),
            latest_version: "1.2.5".into(),
            raw_ref: "1.2.0".into(),
        };
        assert_eq!(rewrite("11.2.0\n1.2.0\n1.3.0\n", &[variant]), "11.2.0\n1.2.5\n1.3.0\n");
    }

    #[test]
    fn plan_groups_by_file_and_drops_duplicates() {
        let plans = plan(&[
            unpinned_checkout("a.yml"),
            unpinned_checkout("b.yml"),
            unpinned_checkout("a.yml"),
        ]);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].file, "a.yml");
        assert_eq!(plans[0].updates.len(), 1);
        assert_eq!(plans[1].file, "b.yml");
    }

    #[test]
    fn body_abbreviates_digests_and_shas() {
        let body = pull_request_body(&[
            Update::DockerDigest {
                file: "Dockerfile".into(),
                image: "python".into(),
                tag: "3.11".into(),
                current_digest: digest('a'),
                latest_digest: digest('b'),
                raw_ref: String::new(),
            },
            unpinned_checkout("ci.yml"),
        ]);
        assert!(body.contains("`sha256:aaaaaaaaaaaa...` -> `sha256:bbbbbbbbbbbb...`"));
        assert!(body.contains("`unpinned` -> `deadbeefdead`"));
        assert!(body.contains("## Test plan"));
    }

    #[test]
    fn files_only_strategy_rewrites_and_is_idempotent() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".github/workflows")).unwrap();
        fs::write(
            dir.path().join(".github/workflows/ci.yml"),
            "    - uses: actions/checkout@main\n",
        )
        .unwrap();

        let applier = UpdateApplier::new(PullRequestConfig::default());
        let strategy = FilesOnlyStrategy::new(dir.path());
        let updates = vec![
            unpinned_checkout(".github/workflows/ci.yml"),
            unpinned_checkout("missing.yml"),
        ];

        let first = applier.apply(&updates, &strategy).unwrap();
        assert_eq!(
            first,
            ApplyOutcome::FilesRewritten(vec![".github/workflows/ci.yml".to_string()])
        );
        let second = applier.apply(&updates, &strategy).unwrap();
        assert_eq!(second, ApplyOutcome::NoChanges);
        assert_eq!(
            applier.apply(&[], &strategy).unwrap(),
            ApplyOutcome::NothingToApply
        );
    }

    #[test]
    fn files_outside_the_root_are_rejected() {
        let dir = tempdir().unwrap();
        let strategy = FilesOnlyStrategy::new(dir.path());
        let err = UpdateApplier::new(PullRequestConfig::default())
            .apply(&[unpinned_checkout("../outside.yml")], &strategy)
            .unwrap_err();
        assert!(matches!(err, PinupError::ProjectValidation(_)));
    }

    /// In-memory git data API: trees are named after their contents so equal
    /// trees get equal SHAs.
    #[derive(Default)]
    struct FakeRemote {
        files: HashMap<String, String>,
        heads: RefCell<HashMap<String, BranchHead>>,
        pulls: RefCell<Vec<PullRequest>>,
        calls: RefCell<Vec<String>>,
        fail_blobs: bool,
    }

    impl FakeRemote {
        fn with_base(files: &[(&str, &str)]) -> Self {
            let remote = FakeRemote {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
                ..Default::default()
            };
            remote.heads.borrow_mut().insert(
                "main".into(),
                BranchHead {
                    commit_sha: "base-commit".into(),
                    tree_sha: "base-tree".into(),
                },
            );
            remote
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl PullRequestHost for FakeRemote {
        fn find_open_pull_request(&self, head_branch: &str) -> Result<Option<PullRequest>> {
            self.calls.borrow_mut().push(format!("find-pr {head_branch}"));
            Ok(self.pulls.borrow().first().cloned())
        }

        fn create_pull_request(
            &self,
            title: &str,
            _body: &str,
            head_branch: &str,
            base_branch: &str,
        ) -> Result<PullRequest> {
            self.calls
                .borrow_mut()
                .push(format!("create-pr {title} {head_branch}->{base_branch}"));
            let pr = PullRequest {
                number: 7,
                url: "https://github.test/o/r/pull/7".into(),
            };
            self.pulls.borrow_mut().push(pr.clone());
            Ok(pr)
        }
    }

    impl RemoteRepository for FakeRemote {
        fn branch_head(&self, branch: &str) -> Result<Option<BranchHead>> {
            Ok(self.heads.borrow().get(branch).cloned())
        }

        fn file_contents(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
            assert_eq!(git_ref, "base-commit");
            Ok(self.files.get(path).cloned())
        }

        fn create_blob(&self, content: &str) -> Result<String> {
            if self.fail_blobs {
                return Err(PinupError::RemoteApi("blob rejected".into()));
            }
            Ok(format!("blob({content})"))
        }

        fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
            let parts: Vec<String> = entries
                .iter()
                .map(|e| format!("{}={}", e.path, e.blob_sha))
                .collect();
            Ok(format!("tree({base_tree};{})", parts.join(",")))
        }

        fn create_commit(&self, message: &str, tree_sha: &str, parent_sha: &str) -> Result<String> {
            self.calls
                .borrow_mut()
                .push(format!("commit {message} parent={parent_sha}"));
            let sha = format!("commit-{}", self.calls.borrow().len());
            self.heads.borrow_mut().insert(
                format!("pending:{sha}"),
                BranchHead {
                    commit_sha: sha.clone(),
                    tree_sha: tree_sha.to_string(),
                },
            );
            Ok(sha)
        }

        fn create_branch(&self, branch: &str, commit_sha: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("create-branch {branch}"));
            self.point(branch, commit_sha);
            Ok(())
        }

        fn update_branch(&self, branch: &str, commit_sha: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("update-branch {branch}"));
            self.point(branch, commit_sha);
            Ok(())
        }
    }

    impl FakeRemote {
        fn point(&self, branch: &str, commit_sha: &str) {
            let mut heads = self.heads.borrow_mut();
            let head = heads[&format!("pending:{commit_sha}")].clone();
            heads.insert(branch.to_string(), head);
        }
    }

    #[test]
    fn remote_strategy_commits_once_and_reuses_the_pull_request() {
        let remote = FakeRemote::with_base(&[(
            ".github/workflows/ci.yml",
            "    - uses: actions/checkout@main\n",
        )]);
        let strategy = RemoteApiStrategy::new(remote);
        let applier = UpdateApplier::new(PullRequestConfig::default());
        let updates = vec![
            unpinned_checkout(".github/workflows/ci.yml"),
            unpinned_checkout("gone.yml"),
        ];

        let first = applier.apply(&updates, &strategy).unwrap();
        assert!(matches!(first, ApplyOutcome::PullRequest { reused: false, .. }));

        let second = applier.apply(&updates, &strategy).unwrap();
        assert!(matches!(second, ApplyOutcome::PullRequest { reused: true, .. }));

        let calls = strategy.repo.calls();
        assert_eq!(
            calls,
            vec![
                "commit update: pinned dependency digests/SHAs parent=base-commit",
                "create-branch auto-update/pinned-deps",
                "find-pr auto-update/pinned-deps",
                "create-pr update: pinned dependency digests/SHAs auto-update/pinned-deps->main",
                "find-pr auto-update/pinned-deps",
            ]
        );
    }

    #[test]
    fn remote_strategy_without_changes_opens_nothing() {
        let remote = FakeRemote::with_base(&[("ci.yml", "uses: other/action@v1\n")]);
        let strategy = RemoteApiStrategy::new(remote);
        let outcome = UpdateApplier::new(PullRequestConfig::default())
            .apply(&[unpinned_checkout("ci.yml")], &strategy)
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::NoChanges);
        assert!(strategy.repo.calls().is_empty());
    }

    #[test]
    fn remote_api_failures_abort() {
        let remote = FakeRemote {
            fail_blobs: true,
            ..FakeRemote::with_base(&[("ci.yml", "uses: actions/checkout@main\n")])
        };
        let strategy = RemoteApiStrategy::new(remote);
        let err = UpdateApplier::new(PullRequestConfig::default())
            .apply(&[unpinned_checkout("ci.yml")], &strategy)
            .unwrap_err();
        assert!(matches!(err, PinupError::RemoteApi(_)));
    }

    #[test]
    fn missing_base_branch_is_an_apply_error() {
        let strategy = RemoteApiStrategy::new(FakeRemote::default());
        let err = UpdateApplier::new(PullRequestConfig::default())
            .apply(&[unpinned_checkout("ci.yml")], &strategy)
            .unwrap_err();
        assert!(matches!(err, PinupError::Apply(_)));
    }
}
