// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GitHub contents API as a file store.
//!
//! Reads, listings, writes, and removals map one-to-one onto the
//! `/repos/{owner}/{repo}/contents/{path}` endpoint. File content travels
//! base64 encoded in both directions, and blob SHAs serve as revision tokens.
//!
//! # See Also
//!
//! - [GitHub REST API - Repository contents](https://docs.github.com/en/rest/repos/contents)

use crate::{
    config::RepoCoordinates,
    store::{DirEntry, EntryKind, FileStore, RemoteFile, Result, StoreError, WriteReceipt},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use tracing::{debug, info, instrument};

/// Default location of the GitHub REST API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Environment variable that overrides the API location, e.g., for GitHub
/// Enterprise.
pub const API_BASE_ENV: &str = "HEXCMS_API_BASE";

const API_VERSION: &str = "2022-11-28";

/// File store backed by a GitHub repository.
#[derive(Clone)]
pub struct GitHubStore {
    http: Client,
    api_base: String,
    repo: RepoCoordinates,
    token: String,
}

impl GitHubStore {
    /// Construct new store for repository, authenticating with bearer token.
    ///
    /// Picks up the API location from `$HEXCMS_API_BASE` when set.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Transport`] if HTTP client cannot be built.
    pub fn new(repo: RepoCoordinates, token: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        let api_base = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.into());

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').into(),
            repo,
            token: token.into(),
        })
    }

    /// Use a different API location.
    pub fn with_api_base(mut self, api_base: impl AsRef<str>) -> Self {
        self.api_base = api_base.as_ref().trim_end_matches('/').into();
        self
    }

    /// Coordinates of backing repository.
    pub fn coordinates(&self) -> &RepoCoordinates {
        &self.repo
    }

    /// Fetch account that owns the access token.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unauthorized`] if token is rejected.
    #[instrument(skip(self), level = "debug")]
    pub async fn authenticated_user(&self) -> Result<GitHubUser> {
        self.get_json(&format!("{}/user", self.api_base), &[]).await
    }

    /// Check whether the access token is accepted at all.
    pub async fn validate_token(&self) -> bool {
        self.authenticated_user().await.is_ok()
    }

    /// Fetch basic information about backing repository.
    #[instrument(skip(self), level = "debug")]
    pub async fn repository(&self) -> Result<RepoInfo> {
        self.get_json(&self.repo_url(""), &[]).await
    }

    /// URL of repository endpoint with suffix appended.
    pub(crate) fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{suffix}",
            self.api_base,
            urlencoding::encode(&self.repo.owner),
            urlencoding::encode(&self.repo.repo),
        )
    }

    /// GET JSON document from URL.
    pub(crate) async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.request(Method::GET, url).query(query).send().await?;
        let response = check(response, url, false).await?;
        Ok(response.json().await?)
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded = path
            .trim_matches('/')
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        self.repo_url(&format!("/contents/{encoded}"))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn get_contents(&self, path: &str) -> Result<Response> {
        let url = self.contents_url(path);
        let response = self
            .request(Method::GET, &url)
            .query(&[("ref", self.repo.branch.as_str())])
            .send()
            .await?;
        check(response, path, false).await
    }
}

impl Debug for GitHubStore {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("GitHubStore")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl FileStore for GitHubStore {
    #[instrument(skip(self), level = "debug")]
    async fn read(&self, path: &str) -> Result<RemoteFile> {
        let response = self.get_contents(path).await?;
        let entry = match response.json::<ContentsResponse>().await? {
            ContentsResponse::Listing(_) => {
                return Err(StoreError::NotAFile { path: path.into() });
            }
            ContentsResponse::Entry(entry) => entry,
        };

        if entry.kind != EntryKind::File {
            return Err(StoreError::NotAFile { path: path.into() });
        }

        // INVARIANT: Files over 1 MB come back with encoding "none" and no
        // content, their bytes are only served by the blob endpoint.
        let bytes = if entry.encoding.as_deref() == Some("none") {
            debug!("{path:?} too large for contents endpoint, fetch blob {}", entry.sha);
            let url = self.repo_url(&format!("/git/blobs/{}", entry.sha));
            let blob = self.get_json::<BlobResponse>(&url, &[]).await?;
            decode_payload(path, blob.encoding.as_deref(), blob.content.as_deref())?
        } else {
            decode_content(path, &entry)?
        };
        let content = String::from_utf8(bytes).map_err(|source| StoreError::NotText {
            path: path.into(),
            source,
        })?;

        Ok(RemoteFile {
            content,
            sha: entry.sha,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let response = match self.get_contents(path).await {
            Ok(response) => response,
            Err(StoreError::NotFound { .. }) => {
                debug!("{path:?} does not exist, treat as empty");
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };

        match response.json::<ContentsResponse>().await? {
            ContentsResponse::Listing(entries) => Ok(entries),
            ContentsResponse::Entry(_) => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, content, expected_sha), level = "debug")]
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected_sha: Option<&str>,
        message: &str,
    ) -> Result<WriteReceipt> {
        let body = PutContents {
            message,
            content: STANDARD.encode(content),
            branch: &self.repo.branch,
            sha: expected_sha,
        };
        let response = self
            .request(Method::PUT, &self.contents_url(path))
            .json(&body)
            .send()
            .await?;
        let response = check(response, path, true).await?;
        let receipt = response.json::<PutResponse>().await?;
        info!("commit {message:?}");

        Ok(receipt
            .content
            .map(|written| WriteReceipt {
                path: written.path,
                sha: written.sha,
            })
            .unwrap_or_else(|| WriteReceipt {
                path: path.into(),
                sha: String::new(),
            }))
    }

    #[instrument(skip(self, expected_sha), level = "debug")]
    async fn remove(&self, path: &str, expected_sha: &str, message: &str) -> Result<()> {
        let body = DeleteContents {
            message,
            sha: expected_sha,
            branch: &self.repo.branch,
        };
        let response = self
            .request(Method::DELETE, &self.contents_url(path))
            .json(&body)
            .send()
            .await?;
        check(response, path, true).await?;
        info!("commit {message:?}");

        Ok(())
    }
}

/// Account that owns an access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    pub avatar_url: String,
    pub html_url: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
}

/// Basic repository information.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<DirEntry>),
    Entry(ContentsEntry),
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    #[serde(rename = "type")]
    kind: EntryKind,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContents<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: Option<WrittenContent>,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    path: String,
    sha: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

fn decode_content(path: &str, entry: &ContentsEntry) -> Result<Vec<u8>> {
    decode_payload(path, entry.encoding.as_deref(), entry.content.as_deref())
}

fn decode_payload(path: &str, encoding: Option<&str>, content: Option<&str>) -> Result<Vec<u8>> {
    match encoding {
        Some("base64") | None => {
            // INVARIANT: GitHub wraps base64 payloads at 60 columns.
            let compact = content
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect::<String>();
            Ok(STANDARD.decode(compact)?)
        }
        Some(other) => Err(StoreError::Api {
            status: StatusCode::OK.as_u16(),
            message: format!("{path:?} delivered with unsupported encoding {other:?}"),
        }),
    }
}

async fn check(response: Response, path: &str, is_write: bool) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        == Some("0");
    let message = response
        .json::<ApiMessage>()
        .await
        .unwrap_or_default()
        .message;
    debug!("{path:?} answered {status}: {message}");

    Err(classify(status, rate_exhausted, is_write, path, message))
}

fn classify(
    status: StatusCode,
    rate_exhausted: bool,
    is_write: bool,
    path: &str,
    message: String,
) -> StoreError {
    match status.as_u16() {
        401 => StoreError::Unauthorized,
        429 => StoreError::RateLimited,
        403 if rate_exhausted => StoreError::RateLimited,
        404 => StoreError::NotFound { path: path.into() },
        409 => StoreError::Conflict { path: path.into() },
        422 if is_write => StoreError::Conflict { path: path.into() },
        code @ 500..=599 => StoreError::Unavailable { status: code },
        code => StoreError::Api {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> GitHubStore {
        GitHubStore::new(RepoCoordinates::new("alice", "my blog", "main"), "ghp_secret")
            .unwrap()
            .with_api_base("https://ghe.example.com/api/v3/")
    }

    #[test]
    fn contents_url_encodes_segments() {
        let result = store().contents_url("source/_posts/2024-03-01-hello world.md");
        let expect = "https://ghe.example.com/api/v3/repos/alice/my%20blog/contents/\
                      source/_posts/2024-03-01-hello%20world.md";
        assert_eq!(result, expect);
    }

    #[test]
    fn debug_output_redacts_token() {
        let output = format!("{:?}", store());
        assert!(!output.contains("ghp_secret"));
        assert!(output.contains("<redacted>"));
    }

    #[test]
    fn decode_wrapped_base64() {
        let entry = ContentsEntry {
            kind: EntryKind::File,
            sha: "abc".into(),
            content: Some("aGVsbG8g\nd29ybGQ=\n".into()),
            encoding: Some("base64".into()),
        };
        assert_eq!(decode_content("a.md", &entry).unwrap(), b"hello world");
    }

    #[test]
    fn decode_rejects_unknown_encoding() {
        let result = decode_payload("a.md", Some("utf-16"), Some("aGk="));
        assert!(matches!(result, Err(StoreError::Api { status: 200, .. })));

        let blob = r#"{"sha": "3", "size": 2, "content": "aGk=\n", "encoding": "base64"}"#;
        let blob = serde_json::from_str::<BlobResponse>(blob).unwrap();
        let result = decode_payload("a.md", blob.encoding.as_deref(), blob.content.as_deref());
        assert_eq!(result.unwrap(), b"hi");
    }

    #[test]
    fn parse_listing_and_entry() {
        let listing = r#"[
            {"name": "a.md", "path": "source/_posts/a.md", "sha": "1", "size": 12,
             "type": "file", "download_url": "https://raw.example.com/a.md"},
            {"name": "img", "path": "source/_posts/img", "sha": "2", "size": 0,
             "type": "dir", "download_url": null}
        ]"#;
        match serde_json::from_str::<ContentsResponse>(listing).unwrap() {
            ContentsResponse::Listing(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(entries[0].is_file());
                assert_eq!(entries[1].kind, EntryKind::Dir);
            }
            ContentsResponse::Entry(_) => panic!("expected listing"),
        }

        let entry = r#"{"type": "file", "sha": "3", "content": "aGk=", "encoding": "base64",
                        "name": "a.md", "path": "a.md"}"#;
        assert!(matches!(
            serde_json::from_str::<ContentsResponse>(entry).unwrap(),
            ContentsResponse::Entry(_)
        ));
    }

    #[test]
    fn status_classification() {
        let classify = |code: u16, exhausted: bool, write: bool| {
            classify(
                StatusCode::from_u16(code).unwrap(),
                exhausted,
                write,
                "a.md",
                String::new(),
            )
        };

        assert!(matches!(classify(401, false, false), StoreError::Unauthorized));
        assert!(matches!(classify(403, true, false), StoreError::RateLimited));
        assert!(matches!(classify(403, false, false), StoreError::Api { status: 403, .. }));
        assert!(matches!(classify(404, false, false), StoreError::NotFound { .. }));
        assert!(matches!(classify(409, false, true), StoreError::Conflict { .. }));
        assert!(matches!(classify(422, false, true), StoreError::Conflict { .. }));
        assert!(matches!(classify(422, false, false), StoreError::Api { .. }));
        assert!(matches!(classify(503, false, false), StoreError::Unavailable { status: 503 }));
    }
}
