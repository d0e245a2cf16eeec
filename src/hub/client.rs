//! Hugging Face Hub metadata client
//!
//! Uses the Hub REST API directly:
//! - `POST /api/models/{repo}/paths-info/{revision}` to stat one path
//! - `GET /api/models/{repo}/tree/{revision}[/{path}]` to list a directory
//!
//! Tree listings are paginated; the next page is announced in a
//! `Link: <url>; rel="next"` header and followed until none is left.
//!
//! Every failure is classified into a [`ResolveError`]; nothing is retried here.

use super::auth::HubToken;
use super::{EntryKind, RemoteEntry, RemoteMetadataClient};
use crate::config::HubConfig;
use crate::error::ResolveError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Header the Hub uses to explain 4xx responses
const ERROR_CODE_HEADER: &str = "x-error-code";

/// Entry as returned by the tree and paths-info endpoints
#[derive(Debug, Deserialize)]
struct WireEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    lfs: Option<WireLfs>,
}

#[derive(Debug, Deserialize)]
struct WireLfs {
    size: u64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
}

impl From<WireEntry> for RemoteEntry {
    fn from(entry: WireEntry) -> Self {
        let kind = match entry.kind.as_str() {
            "file" => EntryKind::File,
            "directory" => EntryKind::Directory,
            _ => EntryKind::Other,
        };
        let size = match kind {
            EntryKind::File => entry.lfs.map(|lfs| lfs.size).unwrap_or(entry.size),
            _ => 0,
        };
        RemoteEntry {
            path: entry.path,
            kind,
            size,
        }
    }
}

/// Metadata client for a Hugging Face Hub compatible endpoint
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    revision: String,
    token: Option<HubToken>,
}

impl HubClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &HubConfig, token: Option<HubToken>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!(
            endpoint = %config.endpoint,
            revision = %config.revision,
            authenticated = token.is_some(),
            "Hub client created"
        );

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            revision: config.revision.clone(),
            token,
        })
    }

    fn api_url(&self, repo_id: &str, action: &str, path: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/models/{}/{}/{}",
            self.endpoint,
            encode_path(repo_id),
            action,
            urlencoding::encode(&self.revision)
        );
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            url.push('/');
            url.push_str(&encode_path(path));
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &str,
    ) -> Result<T, ResolveError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(target, e))?;

        read_json(response, target).await
    }

    /// Resolve a `rel="next"` link, refusing to leave the configured endpoint
    fn next_page(
        &self,
        current: &str,
        headers: &HeaderMap,
        target: &str,
    ) -> Option<Result<String, ResolveError>> {
        let link = next_link(headers)?;
        let resolved = Url::parse(current)
            .and_then(|base| base.join(&link))
            .ok()
            .filter(|next| {
                Url::parse(&self.endpoint).is_ok_and(|endpoint| endpoint.origin() == next.origin())
            })
            .filter(|next| next.as_str() != current);

        Some(resolved.map(|next| next.to_string()).ok_or_else(|| {
            ResolveError::Other(format!("{}: unusable next page link {:?}", target, link))
        }))
    }
}

#[async_trait]
impl RemoteMetadataClient for HubClient {
    async fn stat(&self, repo_id: &str, path: &str) -> Result<RemoteEntry, ResolveError> {
        let target = format!("{}/{}", repo_id, path);
        let request = self
            .http
            .post(self.api_url(repo_id, "paths-info", None))
            .form(&[("paths", path), ("expand", "false")]);

        let entries: Vec<WireEntry> = self.send(request, &target).await?;

        entries
            .into_iter()
            .find(|e| e.path == path)
            .map(RemoteEntry::from)
            .ok_or_else(|| ResolveError::NotFound(format!("{} does not exist", target)))
    }

    async fn list(
        &self,
        repo_id: &str,
        path: Option<&str>,
    ) -> Result<Vec<RemoteEntry>, ResolveError> {
        let target = match path {
            Some(path) => format!("{}/{}", repo_id, path),
            None => repo_id.to_string(),
        };
        let mut url = self.api_url(repo_id, "tree", path);
        let mut entries = Vec::new();
        let mut pages = 0usize;

        loop {
            let response = self
                .authorize(self.http.get(&url))
                .send()
                .await
                .map_err(|e| transport_error(&target, e))?;
            let next = self.next_page(&url, response.headers(), &target);

            let page: Vec<WireEntry> = read_json(response, &target).await?;
            entries.extend(page.into_iter().map(RemoteEntry::from));
            pages += 1;

            match next {
                Some(next) => url = next?,
                None => break,
            }
        }

        tracing::debug!(repo = %target, pages, entries = entries.len(), "Tree listed");

        Ok(entries)
    }
}

/// URL of the `rel="next"` entry of a `Link` header, if any
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let url = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
            parts
                .any(|param| {
                    matches!(
                        param.trim().replace(' ', "").as_str(),
                        "rel=\"next\"" | "rel=next"
                    )
                })
                .then(|| url.to_string())
        })
}

/// Percent-encode each segment, keeping `/` separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    target: &str,
) -> Result<T, ResolveError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| transport_error(target, e));
    }

    let error_code = response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<WireError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    let message = if detail.trim().is_empty() {
        format!("{} ({})", target, status)
    } else {
        format!("{} ({}): {}", target, status, detail.trim())
    };

    Err(classify_status(status, error_code.as_deref(), message))
}

/// Map an HTTP error response to the resolution taxonomy
pub(crate) fn classify_status(
    status: StatusCode,
    error_code: Option<&str>,
    message: String,
) -> ResolveError {
    match error_code {
        Some("RepoNotFound" | "EntryNotFound" | "RevisionNotFound") => {
            return ResolveError::NotFound(message);
        }
        Some("GatedRepo") => return ResolveError::AccessDenied(message),
        _ => {}
    }

    match status {
        StatusCode::NOT_FOUND => ResolveError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ResolveError::AccessDenied(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ResolveError::Transient(message)
        }
        s if s.is_server_error() => ResolveError::Transient(message),
        _ => ResolveError::Other(message),
    }
}

/// Map a transport-level failure to the resolution taxonomy
fn transport_error(target: &str, error: reqwest::Error) -> ResolveError {
    let message = format!("{}: {}", target, error);
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        ResolveError::Transient(message)
    } else {
        ResolveError::Other(message)
    }
}
