use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use reqwest::{header, Client, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::github::filter::FileFilter;
use crate::github::identifier::RepoRef;
use crate::github::rate_limiter::RateLimiter;
use crate::github::source::{RepositorySource, SourceListing};
use crate::models::{ContentResponse, FileUnit, RepositoryInfo, SkippedFile, TreeResponse};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const FETCH_CONCURRENCY: usize = 8;

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl GitHubClient {
    /// Unauthenticated access works for public repositories at a much lower
    /// quota, so the token is optional.
    pub fn new(token: Option<&SecretString>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let mut value =
                header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("complexity-analyzer/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// GET with quota handling. A quota rejection is re-issued once after
    /// the limiter has waited for the reset; a reset further away than the
    /// limiter's cap fails with `Error::RateLimited`.
    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.send(url).await?;
        if !self.is_quota_rejection(&response).await {
            return Ok(response);
        }

        tracing::warn!("GitHub quota exhausted while fetching {}, retrying after reset", url);
        let response = self.send(url).await?;
        if self.is_quota_rejection(&response).await {
            let reset_in = self.rate_limiter.exhausted_for().await.unwrap_or(0);
            return Err(Error::RateLimited(reset_in));
        }

        Ok(response)
    }

    async fn send(&self, url: &str) -> Result<Response> {
        self.rate_limiter.wait().await?;
        tracing::debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;
        self.rate_limiter.update_from_headers(response.headers()).await;
        Ok(response)
    }

    async fn is_quota_rejection(&self, response: &Response) -> bool {
        let status = response.status();
        (status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN)
            && self.rate_limiter.exhausted_for().await.is_some()
    }

    pub async fn get_repository(&self, repo: &RepoRef) -> Result<RepositoryInfo> {
        let url = format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name);
        let response = self.get(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(repo.full_name()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch repository {}: {} - {}",
                repo, status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Recursive tree for `branch`, or `None` when the branch does not exist.
    pub async fn get_tree(&self, repo: &RepoRef, branch: &str) -> Result<Option<TreeResponse>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.base_url, repo.owner, repo.name, branch
        );
        let response = self.get(&url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch tree {}@{}: {} - {}",
                repo, branch, status, body
            )));
        }

        Ok(Some(response.json().await?))
    }

    /// Tree of the default branch, falling back to `main` then `master`.
    pub async fn resolve_tree(&self, repo: &RepoRef) -> Result<(String, TreeResponse)> {
        let info = self.get_repository(repo).await?;

        let mut candidates = vec![info.default_branch];
        for fallback in ["main", "master"] {
            if !candidates.iter().any(|b| b == fallback) {
                candidates.push(fallback.to_string());
            }
        }

        for branch in candidates {
            if let Some(tree) = self.get_tree(repo, &branch).await? {
                if tree.truncated {
                    tracing::warn!(
                        "Tree for {}@{} was truncated by GitHub; some files are not listed",
                        repo,
                        branch
                    );
                }
                return Ok((branch, tree));
            }
            tracing::debug!("Branch {} not found for {}", branch, repo);
        }

        Err(Error::RepoNotFound(format!("{} (no readable branch)", repo)))
    }

    /// Contents endpoint for `path`, each segment percent-encoded.
    fn contents_url(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<Url> {
        let base = format!("{}/repos/{}/{}/contents", self.base_url, repo.owner, repo.name);
        let mut url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid GitHub base URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("GitHub base URL cannot hold a path: {}", base)))?
            .extend(path.split('/'));
        url.query_pairs_mut().append_pair("ref", branch);
        Ok(url)
    }

    pub async fn get_file_content(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<String> {
        let url = self.contents_url(repo, path, branch)?;
        let response = self.get(url.as_str()).await?;

        if !response.status().is_success() {
            return Err(Error::FileFetch(format!("{}: HTTP {}", path, response.status())));
        }

        let body: ContentResponse = response.json().await?;
        decode_content(&body)
    }

    pub async fn fetch_repository_files(
        &self,
        identifier: &str,
        filter: &FileFilter,
        max_files: usize,
    ) -> Result<SourceListing> {
        let repo = RepoRef::parse(identifier)?;
        tracing::info!("Fetching files from {}", repo);

        let (branch, tree) = self.resolve_tree(&repo).await?;

        let candidates: Vec<_> = tree
            .tree
            .iter()
            .filter(|entry| entry.is_blob() && filter.matches(&entry.path))
            .map(|entry| entry.path.clone())
            .collect();
        let total_candidates = candidates.len();
        let selected: Vec<_> = candidates.into_iter().take(max_files).collect();

        tracing::info!(
            "{} of {} candidate files selected from {}@{}",
            selected.len(),
            total_candidates,
            repo,
            branch
        );

        let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
        let fetches = selected.iter().map(|path| {
            let semaphore = semaphore.clone();
            let repo = &repo;
            let branch = branch.as_str();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| Error::FileFetch(e.to_string()))?;
                self.get_file_content(repo, path, branch).await
            }
        });
        let results = join_all(fetches).await;

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for (path, result) in selected.into_iter().zip(results) {
            match result {
                Ok(content) => {
                    tracing::debug!("Fetched {} ({} bytes)", path, content.len());
                    files.push(FileUnit::new(path, content));
                }
                Err(e @ Error::RateLimited(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", path, e);
                    let err = match e {
                        Error::FileFetch(_) => e,
                        other => Error::FileFetch(format!("{}: {}", path, other)),
                    };
                    skipped.push(SkippedFile::from_error(path, &err));
                }
            }
        }

        Ok(SourceListing {
            repository: repo.full_name(),
            files,
            skipped,
            total_candidates,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn fetch_files(
        &self,
        identifier: &str,
        filter: &FileFilter,
        max_files: usize,
    ) -> Result<SourceListing> {
        self.fetch_repository_files(identifier, filter, max_files).await
    }
}

fn decode_content(body: &ContentResponse) -> Result<String> {
    if body.encoding != "base64" {
        return Err(Error::FileFetch(format!(
            "{}: unsupported content encoding '{}' ({} bytes)",
            body.path, body.encoding, body.size
        )));
    }

    let cleaned: String = body.content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|e| Error::FileFetch(format!("{}: invalid base64: {}", body.path, e)))?;

    String::from_utf8(bytes)
        .map_err(|_| Error::FileFetch(format!("{}: content is not valid UTF-8", body.path)))
}
