//! GitHub API client.
//!
//! Provides the HTTP client for the GitHub REST API with bearer-token
//! authentication and `Link`-header pagination.

use crate::error::AcquisitionError;
use crate::models::ReviewItem;
use futures::stream::{self, StreamExt};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page size the search API accepts.
const MAX_PER_PAGE: u32 = 100;

/// Concurrent detail requests while enriching size metrics.
const ENRICH_CONCURRENCY: usize = 4;

/// Search query for open PRs awaiting the authenticated user's review.
const REVIEW_REQUESTED_QUERY: &str = "type:pr state:open review-requested:@me";

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// API root (e.g., `https://api.github.com` or `https://ghe.example.com/api/v3`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

/// Query parameters for the issue search endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQuery {
    /// Search qualifiers.
    pub q: String,

    /// Sort field: `updated`, `created`, `comments`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// Sort direction: `asc` or `desc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// Number of items per page (max 100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

impl SearchQuery {
    /// Open PRs requesting the user's review, most recently updated first.
    pub fn review_requested(per_page: u32) -> Self {
        Self {
            q: REVIEW_REQUESTED_QUERY.to_string(),
            sort: Some("updated".to_string()),
            order: Some("desc".to_string()),
            per_page: Some(per_page.clamp(1, MAX_PER_PAGE)),
        }
    }
}

/// GitHub user from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub id: i64,
}

/// Search result envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSearchResult {
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<GitHubIssue>,
}

/// Issue (or PR) as returned by the search API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub html_url: String,
    pub user: GitHubUser,
    pub repository_url: Option<String>,
}

impl From<GitHubIssue> for ReviewItem {
    fn from(issue: GitHubIssue) -> Self {
        ReviewItem::new(
            issue.id,
            issue.title,
            issue.html_url,
            issue.user.login,
            issue.number,
        )
    }
}

/// The size fields of a pull request (GET /repos/:owner/:repo/pulls/:number).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
}

/// Issue timeline event (GET /repos/:owner/:repo/issues/:number/events).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssueEvent {
    pub event: String,
    pub requested_reviewer: Option<GitHubUser>,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AcquisitionError> {
        let mut headers = header::HeaderMap::new();

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| AcquisitionError::unauthorized("Invalid token format"))?;
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("pr-review-light/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AcquisitionError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AcquisitionError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body).map_err(AcquisitionError::from);
        }

        let headers = response.headers();
        let exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");
        let reset_at = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        let err = AcquisitionError::from_status(status, endpoint, exhausted, reset_at);
        log::warn!(
            "[github] {} returned HTTP {}: {}",
            endpoint,
            status.as_u16(),
            err
        );
        Err(err)
    }

    /// GET a single JSON resource.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&impl Serialize>,
    ) -> Result<T, AcquisitionError> {
        let mut request = self.client.get(self.api_url(endpoint));
        if let Some(q) = query {
            request = request.query(q);
        }

        let response = request.send().await?;
        self.handle_response(response, endpoint).await
    }

    /// Fetch all pages of a list endpoint, following `Link: rel="next"`.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, AcquisitionError> {
        let mut all_data = Vec::new();
        let mut next_url = Some(self.api_url(endpoint));
        let mut first = true;

        while let Some(url) = next_url.take() {
            let mut request = self.client.get(&url);
            if first {
                request = request.query(&[("per_page", MAX_PER_PAGE.to_string())]);
                first = false;
            }

            let response = request.send().await?;
            next_url = response
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let data: Vec<T> = self.handle_response(response, endpoint).await?;
            all_data.extend(data);
        }

        Ok(all_data)
    }

    /// Fetch the authenticated user (also serves as a connection test).
    pub async fn current_user(&self) -> Result<GitHubUser, AcquisitionError> {
        self.get_json("/user", None::<&()>).await
    }

    /// Search for open PRs awaiting the user's review.
    pub async fn search_review_requests(
        &self,
        per_page: u32,
    ) -> Result<GitHubSearchResult, AcquisitionError> {
        let query = SearchQuery::review_requested(per_page);
        self.get_json("/search/issues", Some(&query)).await
    }

    /// Get a single pull request.
    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<GitHubPullRequest, AcquisitionError> {
        let endpoint = format!("/repos/{}/{}/pulls/{}", owner, repo, number);
        self.get_json(&endpoint, None::<&()>).await
    }

    /// Count how many times review was requested from `login` on a PR.
    pub async fn count_review_requests(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        login: &str,
    ) -> Result<i64, AcquisitionError> {
        let endpoint = format!("/repos/{}/{}/issues/{}/events", owner, repo, number);
        let events: Vec<GitHubIssueEvent> = self.get_all_pages(&endpoint).await?;
        Ok(count_requests_for(&events, login))
    }

    /// Fetch the current review requests as review items.
    ///
    /// Order is the API's (most recently updated first). With
    /// `with_metrics`, each item is enriched with size metrics and the
    /// review request count; enrichment failures only leave those absent.
    pub async fn fetch_review_items(
        &self,
        max_items: usize,
        with_metrics: bool,
    ) -> Result<Vec<ReviewItem>, AcquisitionError> {
        let per_page = u32::try_from(max_items).unwrap_or(MAX_PER_PAGE);
        let result = self.search_review_requests(per_page).await?;

        if result.incomplete_results {
            log::warn!("[github] Search results flagged incomplete by GitHub");
        }
        log::debug!(
            "[github] Search returned {} of {} pending reviews",
            result.items.len(),
            result.total_count
        );

        let mut issues = result.items;
        issues.truncate(max_items);

        if !with_metrics {
            return Ok(issues.into_iter().map(ReviewItem::from).collect());
        }

        let login = match self.current_user().await {
            Ok(user) => Some(user.login),
            Err(e) => {
                log::warn!("[github] Failed to fetch current user for request counts: {}", e);
                None
            }
        };

        let items: Vec<ReviewItem> = stream::iter(issues)
            .map(|issue| self.enrich(issue, login.as_deref()))
            .buffered(ENRICH_CONCURRENCY)
            .collect()
            .await;

        Ok(items)
    }

    /// Fill in size metrics for one issue. Never fails.
    async fn enrich(&self, issue: GitHubIssue, login: Option<&str>) -> ReviewItem {
        let repo = issue
            .repository_url
            .as_deref()
            .and_then(repo_from_api_url)
            .or_else(|| repo_from_html_url(&issue.html_url));
        let number = issue.number;
        let mut item = ReviewItem::from(issue);

        let Some((owner, name)) = repo else {
            log::warn!("[github] Cannot derive repository for PR {}", item.url);
            return item;
        };

        match self.get_pull_request(&owner, &name, number).await {
            Ok(pr) => {
                item.additions = pr.additions;
                item.deletions = pr.deletions;
                item.changed_files = pr.changed_files;
            }
            Err(e) => {
                // Non-critical - log and continue
                log::warn!("[github] Failed to fetch size of {}/{}#{}: {}", owner, name, number, e);
            }
        }

        if let Some(login) = login {
            match self.count_review_requests(&owner, &name, number, login).await {
                Ok(count) => item.review_request_count = Some(count),
                Err(e) => {
                    log::warn!(
                        "[github] Failed to count review requests on {}/{}#{}: {}",
                        owner,
                        name,
                        number,
                        e
                    );
                }
            }
        }

        item
    }
}

/// Join an API root and a path without doubling slashes.
fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Count `review_requested` events addressed to `login`.
fn count_requests_for(events: &[GitHubIssueEvent], login: &str) -> i64 {
    events
        .iter()
        .filter(|e| e.event == "review_requested")
        .filter(|e| {
            e.requested_reviewer
                .as_ref()
                .is_some_and(|r| r.login.eq_ignore_ascii_case(login))
        })
        .count() as i64
}

/// Extract `owner/repo` from an API repository URL.
///
/// e.g., "https://api.github.com/repos/acme/app" -> ("acme", "app")
fn repo_from_api_url(url: &str) -> Option<(String, String)> {
    let idx = url.find("/repos/")?;
    let mut parts = url[idx + "/repos/".len()..].split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}

/// Extract `owner/repo` from a PR browser URL.
///
/// e.g., "https://github.com/acme/app/pull/7" -> ("acme", "app")
fn repo_from_html_url(url: &str) -> Option<(String, String)> {
    let after_scheme = &url[url.find("://")? + 3..];
    let path = &after_scheme[after_scheme.find('/')? + 1..];
    let pull_idx = path.find("/pull/")?;
    let (owner, repo) = path[..pull_idx].rsplit_once('/')?;
    let owner = owner.rsplit('/').next().unwrap_or(owner);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Find the `rel="next"` target in a `Link` header.
fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_construction() {
        assert_eq!(
            join_url("https://api.github.com/", "/search/issues"),
            "https://api.github.com/search/issues"
        );
        assert_eq!(
            join_url("https://ghe.example.com/api/v3", "/user"),
            "https://ghe.example.com/api/v3/user"
        );
    }

    #[test]
    fn test_search_query_serialization() {
        let query = SearchQuery::review_requested(500);

        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("review-requested:@me"));
        assert!(json.contains("\"sort\":\"updated\""));
        assert!(json.contains("\"order\":\"desc\""));
        // Clamped to the API maximum
        assert!(json.contains("\"per_page\":100"));
    }

    #[test]
    fn test_search_result_decoding_preserves_order() {
        let body = r#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {
                    "id": 2002, "number": 18, "title": "Bump deps",
                    "html_url": "https://github.com/acme/app/pull/18",
                    "user": {"login": "dependabot[bot]", "id": 49699333},
                    "repository_url": "https://api.github.com/repos/acme/app",
                    "state": "open"
                },
                {
                    "id": 1001, "number": 4, "title": "Add cache",
                    "html_url": "https://github.com/acme/lib/pull/4",
                    "user": {"login": "octocat"}
                }
            ]
        }"#;

        let result: GitHubSearchResult = serde_json::from_str(body).unwrap();
        let items: Vec<ReviewItem> = result.items.into_iter().map(ReviewItem::from).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 2002);
        assert_eq!(items[0].author, "dependabot[bot]");
        assert_eq!(items[1].url, "https://github.com/acme/lib/pull/4");
        assert!(items[1].additions.is_none());
    }

    #[test]
    fn test_repo_from_api_url() {
        assert_eq!(
            repo_from_api_url("https://api.github.com/repos/acme/app"),
            Some(("acme".to_string(), "app".to_string()))
        );
        assert_eq!(
            repo_from_api_url("https://ghe.example.com/api/v3/repos/team/svc"),
            Some(("team".to_string(), "svc".to_string()))
        );
        assert_eq!(repo_from_api_url("https://api.github.com/users/acme"), None);
    }

    #[test]
    fn test_repo_from_html_url() {
        assert_eq!(
            repo_from_html_url("https://github.com/acme/app/pull/7"),
            Some(("acme".to_string(), "app".to_string()))
        );
        assert_eq!(repo_from_html_url("invalid-url"), None);
        assert_eq!(repo_from_html_url("https://github.com/acme/app/issues/7"), None);
    }

    #[test]
    fn test_parse_next_link() {
        let link = r#"<https://api.github.com/repositories/1/issues/7/events?page=2>; rel="next", <https://api.github.com/repositories/1/issues/7/events?page=3>; rel="last""#;
        assert_eq!(
            parse_next_link(link).as_deref(),
            Some("https://api.github.com/repositories/1/issues/7/events?page=2")
        );

        let last_page = r#"<https://api.github.com/x?page=1>; rel="prev", <https://api.github.com/x?page=1>; rel="first""#;
        assert_eq!(parse_next_link(last_page), None);
    }

    #[test]
    fn test_count_requests_for() {
        let body = r#"[
            {"event": "review_requested", "requested_reviewer": {"login": "Me"}},
            {"event": "review_request_removed", "requested_reviewer": {"login": "me"}},
            {"event": "review_requested", "requested_reviewer": {"login": "someone"}},
            {"event": "labeled"},
            {"event": "review_requested", "requested_reviewer": {"login": "me"}}
        ]"#;
        let events: Vec<GitHubIssueEvent> = serde_json::from_str(body).unwrap();
        assert_eq!(count_requests_for(&events, "me"), 2);
    }
}
