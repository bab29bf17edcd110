pub mod crane;
pub mod github;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

pub use crane::CraneRegistry;
pub use github::{GitHubClient, GitHubRepository};
