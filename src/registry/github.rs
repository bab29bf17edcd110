use crate::config::GitHubSettings;
use crate::error::{PinupError, Result};
use crate::repository::{
    BranchHead, PullRequest, PullRequestHost, RemoteRepository, SourceHost, TreeEntry,
};
use crate::utils::verbose::verbose;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";
const RELEASE_PAGE_SIZE: usize = 30;
// Tags of tags are legal; stop somewhere.
const MAX_TAG_DEPTH: usize = 5;
const MAX_ERROR_BODY: usize = 300;

/// GitHub REST API client (blocking).
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("pinup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base = settings.api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base).map_err(|e| {
            PinupError::Config(format!("Invalid GitHub API URL '{}': {}", settings.api_url, e))
        })?;

        Ok(Self {
            client,
            api_base,
            token: settings.token.clone(),
        })
    }

    /// Bind the client to one `owner/repo`.
    pub fn repository(self, slug: impl Into<String>) -> GitHubRepository {
        GitHubRepository {
            api: self,
            slug: slug.into(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| PinupError::RemoteApi(format!("Invalid API path '{path}': {e}")))
    }

    fn request(&self, method: Method, url: Url, accept: &str) -> RequestBuilder {
        verbose!("{} {}", method, url);
        let builder = self
            .client
            .request(method, url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and check the status; 404 becomes `None`.
    fn execute(&self, builder: RequestBuilder, what: &str) -> Result<Option<Response>> {
        let response = builder.send()?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            verbose!("{what}: HTTP 404");
            return Ok(None);
        }

        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(PinupError::RemoteApi(format!(
                "{what}: HTTP {status}: {}",
                body.trim()
            )));
        }

        Ok(Some(response))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path)?;
        match self.execute(self.request(Method::GET, url, ACCEPT_JSON), path)? {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let what = format!("{method} {path}");
        let url = self.url(path)?;
        let builder = self.request(method, url, ACCEPT_JSON).json(body);
        match self.execute(builder, &what)? {
            Some(response) => Ok(response.json()?),
            None => Err(PinupError::RemoteApi(format!("{what}: HTTP 404 Not Found"))),
        }
    }

    fn peel_tag(&self, owner_repo: &str, mut object: GitObject) -> Result<String> {
        for _ in 0..MAX_TAG_DEPTH {
            match object.kind.as_str() {
                "commit" => return Ok(object.sha),
                "tag" => {
                    let path = format!("repos/{owner_repo}/git/tags/{}", object.sha);
                    let tag: RefResponse = self.get_json(&path)?.ok_or_else(|| {
                        PinupError::Resolution(format!("Tag object {} not found", object.sha))
                    })?;
                    object = tag.object;
                }
                other => {
                    return Err(PinupError::Resolution(format!(
                        "Ref points at a {other} object, not a commit"
                    )));
                }
            }
        }
        Err(PinupError::Resolution(format!(
            "Tag chain in {owner_repo} deeper than {MAX_TAG_DEPTH} levels"
        )))
    }
}

impl SourceHost for GitHubClient {
    fn resolve_commit(&self, owner_repo: &str, git_ref: &str) -> Result<String> {
        let tag_path = format!("repos/{owner_repo}/git/ref/tags/{git_ref}");
        if let Some(tag) = self.get_json::<RefResponse>(&tag_path)? {
            return self.peel_tag(owner_repo, tag.object);
        }

        // Not a tag: let the commits endpoint resolve branches and other refs.
        let commit_path = format!("repos/{owner_repo}/commits/{git_ref}");
        let commit: ShaResponse = self.get_json(&commit_path)?.ok_or_else(|| {
            PinupError::Resolution(format!("Ref '{git_ref}' not found in {owner_repo}"))
        })?;
        Ok(commit.sha)
    }

    fn list_releases(&self, owner_repo: &str, prefix: &str) -> Result<Vec<String>> {
        let path = format!("repos/{owner_repo}/releases?per_page={RELEASE_PAGE_SIZE}");
        let releases: Vec<Release> = self.get_json(&path)?.ok_or_else(|| {
            PinupError::Resolution(format!("Repository {owner_repo} not found"))
        })?;

        Ok(releases
            .into_iter()
            .filter(|r| !r.draft && !r.prerelease)
            .filter_map(|r| r.tag_name.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}

/// GitHub client bound to a single repository.
pub struct GitHubRepository {
    api: GitHubClient,
    slug: String,
}

impl GitHubRepository {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    fn path(&self, rest: &str) -> String {
        format!("repos/{}/{}", self.slug, rest)
    }

    fn owner(&self) -> &str {
        self.slug.split('/').next().unwrap_or(&self.slug)
    }
}

impl PullRequestHost for GitHubRepository {
    fn find_open_pull_request(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        let mut url = self.api.url(&self.path("pulls"))?;
        url.query_pairs_mut()
            .append_pair("head", &format!("{}:{}", self.owner(), head_branch))
            .append_pair("state", "open");

        let pulls: Vec<PullResponse> = match self
            .api
            .execute(self.api.request(Method::GET, url, ACCEPT_JSON), "list pulls")?
        {
            Some(response) => response.json()?,
            None => {
                return Err(PinupError::RemoteApi(format!(
                    "Repository {} not found",
                    self.slug
                )));
            }
        };

        Ok(pulls.into_iter().next().map(Into::into))
    }

    fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PullRequest> {
        let created: PullResponse = self.api.send_json(
            Method::POST,
            &self.path("pulls"),
            &json!({ "title": title, "body": body, "head": head_branch, "base": base_branch }),
        )?;
        Ok(created.into())
    }
}

impl RemoteRepository for GitHubRepository {
    fn branch_head(&self, branch: &str) -> Result<Option<BranchHead>> {
        let Some(head) = self
            .api
            .get_json::<RefResponse>(&self.path(&format!("git/ref/heads/{branch}")))?
        else {
            return Ok(None);
        };

        let commit: CommitResponse = self
            .api
            .get_json(&self.path(&format!("git/commits/{}", head.object.sha)))?
            .ok_or_else(|| {
                PinupError::RemoteApi(format!("Commit {} not found", head.object.sha))
            })?;

        Ok(Some(BranchHead {
            commit_sha: commit.sha,
            tree_sha: commit.tree.sha,
        }))
    }

    fn file_contents(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
        let mut url = self.api.url(&self.path(&format!("contents/{path}")))?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        let what = format!("read {path}@{git_ref}");
        match self
            .api
            .execute(self.api.request(Method::GET, url, ACCEPT_RAW), &what)?
        {
            Some(response) => Ok(Some(response.text()?)),
            None => Ok(None),
        }
    }

    fn create_blob(&self, content: &str) -> Result<String> {
        let blob: ShaResponse = self.api.send_json(
            Method::POST,
            &self.path("git/blobs"),
            &json!({ "content": content, "encoding": "utf-8" }),
        )?;
        Ok(blob.sha)
    }

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let tree: Vec<TreeItem<'_>> = entries
            .iter()
            .map(|entry| TreeItem {
                path: &entry.path,
                mode: "100644",
                kind: "blob",
                sha: &entry.blob_sha,
            })
            .collect();

        let created: ShaResponse = self.api.send_json(
            Method::POST,
            &self.path("git/trees"),
            &json!({ "base_tree": base_tree, "tree": tree }),
        )?;
        Ok(created.sha)
    }

    fn create_commit(&self, message: &str, tree_sha: &str, parent_sha: &str) -> Result<String> {
        let commit: ShaResponse = self.api.send_json(
            Method::POST,
            &self.path("git/commits"),
            &json!({ "message": message, "tree": tree_sha, "parents": [parent_sha] }),
        )?;
        Ok(commit.sha)
    }

    fn create_branch(&self, branch: &str, commit_sha: &str) -> Result<()> {
        let _: serde_json::Value = self.api.send_json(
            Method::POST,
            &self.path("git/refs"),
            &json!({ "ref": format!("refs/heads/{branch}"), "sha": commit_sha }),
        )?;
        Ok(())
    }

    fn update_branch(&self, branch: &str, commit_sha: &str) -> Result<()> {
        let _: serde_json::Value = self.api.send_json(
            Method::PATCH,
            &self.path(&format!("git/refs/heads/{branch}")),
            &json!({ "sha": commit_sha, "force": true }),
        )?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Shape shared by `git/ref/...` and `git/tags/...` responses.
#[derive(Debug, Deserialize)]
struct RefResponse {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

impl From<PullResponse> for PullRequest {
    fn from(pull: PullResponse) -> Self {
        PullRequest {
            number: pull.number,
            url: pull.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct TreeItem<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}
