use crate::config::GitHubSettings;
use crate::error::Result;
use crate::registry::{CraneRegistry, GitHubClient, GitHubRepository};
use crate::repository::{ImageRegistry, SourceHost};
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_image_registry() -> Arc<dyn ImageRegistry> {
        Arc::new(CraneRegistry::new())
    }

    pub fn create_source_host(settings: &GitHubSettings) -> Result<Arc<dyn SourceHost>> {
        let client = GitHubClient::new(settings)?;
        Ok(Arc::new(client))
    }

    /// Client bound to `GITHUB_REPOSITORY`, for pull requests and git data.
    pub fn create_remote_repository(settings: &GitHubSettings) -> Result<GitHubRepository> {
        let slug = settings.require_repository()?.to_string();
        Ok(GitHubClient::new(settings)?.repository(slug))
    }
}
