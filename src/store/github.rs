//! GitHub contents API file store.
//!
//! Tables live as files in a repository branch. The blob SHA returned by the
//! contents API is the version token; a PUT carrying a stale SHA is refused by
//! GitHub with 409 (or 422 when the SHA is missing for an existing file).

use crate::config::GitHubConfig;
use crate::error::{ApiError, StoreError};
use crate::store::RemoteFileStore;
use crate::types::{FileSnapshot, VersionToken};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GITHUB_JSON: &str = "application/vnd.github+json";
const GITHUB_RAW: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentsFile,
}

#[derive(Debug, Deserialize)]
struct PutContentsFile {
    sha: String,
}

pub struct GitHubFileStore {
    client: reqwest::Client,
    base: Url,
    owner: String,
    repo: String,
    branch: String,
    path_prefix: String,
}

impl GitHubFileStore {
    /// Build a store from configuration; requires owner, repo, and a token
    pub fn new(config: &GitHubConfig) -> Result<Self, ApiError> {
        let token = config.resolved_token().ok_or_else(|| {
            ApiError::ConfigError(
                "GitHub token required (set store.github.token or GITHUB_TOKEN)".to_string(),
            )
        })?;
        if config.owner.trim().is_empty() || config.repo.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "GitHub store requires store.github.owner and store.github.repo".to_string(),
            ));
        }

        let base = Url::parse(&config.api_base).map_err(|e| {
            ApiError::ConfigError(format!("Invalid GitHub API base {}: {}", config.api_base, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::ConfigError(format!(
                "Invalid GitHub API base {}",
                config.api_base
            )));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::ConfigError("GitHub token is not a valid header".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|_| {
                ApiError::ConfigError(format!("Invalid user agent: {}", config.user_agent))
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            owner: config.owner.trim().to_string(),
            repo: config.repo.trim().to_string(),
            branch: config.branch.clone(),
            path_prefix: config.path_prefix.clone(),
        })
    }

    fn repo_path(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }

    fn contents_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| StoreError::Rejected {
                status: 0,
                message: "GitHub API base cannot carry a path".to_string(),
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
                .extend(self.repo_path(path).split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn fetch_raw(&self, url: Url, path: &str) -> Result<String, StoreError> {
        let response = self
            .client
            .get(url)
            .query(&[("ref", self.branch.as_str())])
            .header(ACCEPT, GITHUB_RAW)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let rate_limited = is_rate_limited(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, rate_limited, path, None, &body));
        }
        response.text().await.map_err(transport_error)
    }
}

#[async_trait]
impl RemoteFileStore for GitHubFileStore {
    fn backend_tag(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        let url = self.contents_url(path)?;
        let response = self
            .client
            .get(url.clone())
            .query(&[("ref", self.branch.as_str())])
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let rate_limited = is_rate_limited(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, rate_limited, path, None, &body));
        }

        let body: ContentsResponse = response.json().await.map_err(|e| {
            StoreError::Transient(format!("Unexpected contents response for {}: {}", path, e))
        })?;

        let content = if body.content.is_empty() && body.size > 0 {
            // Above the inline limit the contents API omits the body
            debug!(path, size = body.size, "Fetching large table file as raw");
            self.fetch_raw(url, path).await?
        } else {
            decode_content(&body.content, &body.encoding, path)?
        };

        Ok(FileSnapshot {
            content,
            version: Some(VersionToken::new(body.sha)),
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let url = self.contents_url(path)?;
        let request = PutContentsRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha: expected.map(VersionToken::as_str),
        };

        let response = self
            .client
            .put(url)
            .header(ACCEPT, GITHUB_JSON)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let rate_limited = is_rate_limited(response.headers());
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, rate_limited, path, expected, &body);
            if !err.is_retryable() {
                warn!(path, status = status.as_u16(), "GitHub rejected table write");
            }
            return Err(err);
        }

        let body: PutContentsResponse = response.json().await.map_err(|e| {
            StoreError::Transient(format!("Unexpected commit response for {}: {}", path, e))
        })?;
        Ok(VersionToken::new(body.content.sha))
    }
}

fn decode_content(content: &str, encoding: &str, path: &str) -> Result<String, StoreError> {
    if !encoding.is_empty() && encoding != "base64" {
        return Err(StoreError::Rejected {
            status: 200,
            message: format!("Unsupported content encoding {} for {}", encoding, path),
        });
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| StoreError::Transient(format!("Invalid base64 for {}: {}", path, e)))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Rejected {
        status: 200,
        message: format!("{} is not valid UTF-8: {}", path, e),
    })
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Transient(format!("GitHub request timed out: {}", err))
    } else {
        StoreError::Transient(format!("GitHub request failed: {}", err))
    }
}

fn is_rate_limited(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
        || headers.contains_key(reqwest::header::RETRY_AFTER)
}

/// Map a non-success GitHub status onto the store error taxonomy
fn classify_failure(
    status: StatusCode,
    rate_limited: bool,
    path: &str,
    expected: Option<&VersionToken>,
    body: &str,
) -> StoreError {
    match status.as_u16() {
        409 | 422 => StoreError::VersionConflict {
            path: path.to_string(),
            expected: expected
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<absent>".to_string()),
        },
        429 => StoreError::Transient(format!("GitHub rate limit hit for {}", path)),
        403 if rate_limited => StoreError::Transient(format!("GitHub rate limit hit for {}", path)),
        code if status.is_server_error() => {
            StoreError::Transient(format!("GitHub returned {} for {}", code, path))
        }
        code => StoreError::Rejected {
            status: code,
            message: truncate(body, 200),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
