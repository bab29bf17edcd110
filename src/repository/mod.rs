use crate::error::Result;

pub mod factory;
pub use factory::RepositoryFactory;

/// A container registry that can answer digest and tag queries.
pub trait ImageRegistry: Send + Sync {
    /// Current manifest digest (`sha256:...`) of `image:tag`.
    fn latest_digest(&self, image: &str, tag: &str) -> Result<String>;

    fn list_tags(&self, image: &str) -> Result<Vec<String>>;
}

/// A source-control host that resolves refs and lists releases.
pub trait SourceHost: Send + Sync {
    /// Commit SHA that `git_ref` (tag or branch) of `owner/repo` points at.
    /// Annotated tags are dereferenced to their commit.
    fn resolve_commit(&self, owner_repo: &str, git_ref: &str) -> Result<String>;

    /// Stable release tags with `prefix` stripped; tags lacking the prefix are dropped.
    fn list_releases(&self, owner_repo: &str, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// Pull request operations on one repository.
pub trait PullRequestHost {
    fn find_open_pull_request(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PullRequest>;
}

/// Head commit of a branch together with its root tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub commit_sha: String,
    pub tree_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob_sha: String,
}

/// Git data operations used to build a commit without a working tree.
pub trait RemoteRepository: PullRequestHost {
    fn branch_head(&self, branch: &str) -> Result<Option<BranchHead>>;

    /// File content at `git_ref`; `None` when the file does not exist there.
    fn file_contents(&self, path: &str, git_ref: &str) -> Result<Option<String>>;

    fn create_blob(&self, content: &str) -> Result<String>;

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;

    fn create_commit(&self, message: &str, tree_sha: &str, parent_sha: &str) -> Result<String>;

    fn create_branch(&self, branch: &str, commit_sha: &str) -> Result<()>;

    /// Force-move an existing branch to `commit_sha`.
    fn update_branch(&self, branch: &str, commit_sha: &str) -> Result<()>;
}
