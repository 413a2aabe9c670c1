//! GitHub REST API: pull requests, branches and release notes.

use crate::error::Error;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("infrapatch/", env!("CARGO_PKG_VERSION"));

/// A remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

/// An open review request (pull request).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewRequest {
    pub number: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "html_url", default)]
    pub url: String,
}

/// Release notes of one upstream version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "html_url", default)]
    pub url: String,
}

/// Hosting service operations used by the sync flow.
pub trait ReviewRequestService {
    /// `None` if the branch does not exist.
    fn get_branch(&self, name: &str) -> Result<Option<Branch>>;

    /// Create branch `name` pointing at `sha`.
    fn create_ref(&self, name: &str, sha: &str) -> Result<()>;

    /// Open requests merging `head` into `base`.
    fn list_open_requests(&self, base: &str, head: &str) -> Result<Vec<ReviewRequest>>;

    fn create_request(&self, title: &str, body: &str, head: &str, base: &str)
    -> Result<ReviewRequest>;

    fn edit_request_body(&self, number: u64, body: &str) -> Result<()>;
}

/// Looks up upstream release notes.
pub trait ReleaseNotesSource {
    /// Release of `version` in `repository` (`owner/repo`), if published.
    fn release(&self, repository: &str, version: &str) -> Result<Option<Release>>;
}

#[derive(Deserialize)]
struct BranchResponse {
    name: String,
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

/// GitHub client bound to one repository.
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
    repository: String,
}

impl GitHubClient {
    pub fn new(
        api_base: impl Into<String>,
        repository: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            repository: repository.into(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{path}", self.api_base, self.repository)
    }

    fn with_headers<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

impl ReviewRequestService for GitHubClient {
    fn get_branch(&self, name: &str) -> Result<Option<Branch>> {
        let url = self.repo_url(&format!("branches/{name}"));
        match self.with_headers(self.agent.get(&url)).call() {
            Ok(mut response) => {
                let branch: BranchResponse = response
                    .body_mut()
                    .read_json()
                    .map_err(|e| Error::review("read branch", e))?;
                Ok(Some(Branch {
                    name: branch.name,
                    sha: branch.commit.sha,
                }))
            }
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(Error::review(format!("get branch '{name}'"), e).into()),
        }
    }

    fn create_ref(&self, name: &str, sha: &str) -> Result<()> {
        let url = self.repo_url("git/refs");
        self.with_headers(self.agent.post(&url))
            .send_json(json!({"ref": format!("refs/heads/{name}"), "sha": sha}))
            .map_err(|e| Error::review(format!("create branch '{name}'"), e))?;
        Ok(())
    }

    fn list_open_requests(&self, base: &str, head: &str) -> Result<Vec<ReviewRequest>> {
        let url = self.repo_url("pulls");
        let head = head_filter(&self.repository, head);
        let requests: Vec<ReviewRequest> = self
            .with_headers(self.agent.get(&url))
            .query("state", "open")
            .query("base", base)
            .query("head", &head)
            .call()
            .and_then(|mut response| response.body_mut().read_json())
            .map_err(|e| Error::review("list pull requests", e))?;
        Ok(requests)
    }

    fn create_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<ReviewRequest> {
        let url = self.repo_url("pulls");
        let request: ReviewRequest = self
            .with_headers(self.agent.post(&url))
            .send_json(json!({"title": title, "body": body, "head": head, "base": base}))
            .and_then(|mut response| response.body_mut().read_json())
            .map_err(|e| Error::review("create pull request", e))?;
        Ok(request)
    }

    fn edit_request_body(&self, number: u64, body: &str) -> Result<()> {
        let url = self.repo_url(&format!("pulls/{number}"));
        self.with_headers(self.agent.patch(&url))
            .send_json(json!({"body": body}))
            .map_err(|e| Error::review(format!("update pull request #{number}"), e))?;
        Ok(())
    }
}

impl ReleaseNotesSource for GitHubClient {
    fn release(&self, repository: &str, version: &str) -> Result<Option<Release>> {
        for tag in release_tags(version) {
            let url = format!("{}/repos/{repository}/releases/tags/{tag}", self.api_base);
            match self.with_headers(self.agent.get(&url)).call() {
                Ok(mut response) => {
                    let release: Release = response
                        .body_mut()
                        .read_json()
                        .map_err(|e| Error::review("read release", e))?;
                    return Ok(Some(release));
                }
                Err(ureq::Error::StatusCode(404)) => {
                    log::debug!("No release '{tag}' in {repository}");
                }
                Err(e) => return Err(Error::review(format!("get release '{tag}'"), e).into()),
            }
        }
        Ok(None)
    }
}

/// `owner:branch` form the pulls API expects for `head`.
fn head_filter(repository: &str, branch: &str) -> String {
    let owner = repository.split('/').next().unwrap_or(repository);
    format!("{owner}:{branch}")
}

/// Tags tried for a version, most common convention first.
fn release_tags(version: &str) -> [String; 2] {
    [format!("v{version}"), version.to_string()]
}
