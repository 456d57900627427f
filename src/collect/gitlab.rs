use crate::error::{PulseError, Result};
use crate::model::{CommitRecord, DateRange};
use chrono::SecondsFormat;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const TOTAL_HEADER: &str = "x-total";

/// Where a GitLab project lives, derived from its web URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub api_base: String,
    pub project_path: String,
    pub repo_name: String,
}

impl RepoLocator {
    /// Parses `https://host/group/[subgroup/]repo`, tolerating a `.git`
    /// suffix, a trailing slash and GitLab UI suffixes such as `/-/tree/main`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |why: &str| {
            PulseError::InvalidInput(format!("Invalid repository URL '{input}': {why}"))
        };

        let url = Url::parse(input.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) URL"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|parts| {
                parts
                    .filter(|p| !p.is_empty())
                    .take_while(|p| *p != "-")
                    .collect()
            })
            .unwrap_or_default();
        if let Some(last) = segments.last_mut() {
            let name: &str = *last;
            *last = name.trim_end_matches(".git");
        }
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("expected https://host/group/repo"));
        }

        let mut api_base = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            api_base.push_str(&format!(":{port}"));
        }
        api_base.push_str("/api/v4");

        let repo_name = segments[segments.len() - 1].to_string();
        Ok(Self {
            api_base,
            project_path: segments.join("/"),
            repo_name,
        })
    }
}

/// Everything the client needs, supplied up front rather than read from the
/// process environment.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub api_base: String,
    pub token: String,
    pub page_size: u32,
    pub page_delay: Duration,
    pub show_progress: bool,
}

impl CollectorConfig {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            show_progress: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

#[derive(Deserialize)]
struct Project {
    id: u64,
}

pub struct GitLabClient {
    http: Client,
    config: CollectorConfig,
}

impl GitLabClient {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(PulseError::Authentication("missing access token".to_string()));
        }
        if config.page_size == 0 {
            return Err(PulseError::InvalidInput("page size must be positive".to_string()));
        }
        let http = Client::builder()
            .user_agent(concat!("commitpulse/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.config.token)
            .query(query)
            .send()
            .await?;
        Ok(response)
    }

    pub async fn resolve_project_id(&self, project_path: &str) -> Result<u64> {
        let encoded: String = url::form_urlencoded::byte_serialize(project_path.as_bytes()).collect();
        let response = self.get(&self.endpoint(&format!("projects/{encoded}")), &[]).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::from_status(status, project_path, &body));
        }

        let body = response.text().await?;
        let project: Project = serde_json::from_str(&body)
            .map_err(|e| PulseError::Upstream(format!("Malformed project response: {e}")))?;
        info!(project = project_path, id = project.id, "resolved project");
        Ok(project.id)
    }

    /// Pages through the commit history of `range` until an empty page,
    /// pausing between pages. Any failed page aborts the whole fetch.
    pub async fn fetch_commits(&self, project_id: u64, range: &DateRange) -> Result<Vec<CommitRecord>> {
        let url = self.endpoint(&format!("projects/{project_id}/repository/commits"));
        let since = range.since().to_rfc3339_opts(SecondsFormat::Secs, true);
        let until = range.until().to_rfc3339_opts(SecondsFormat::Secs, true);

        let total = self.count_commits(&url, &since, &until).await?;
        let pb = self.progress_bar(total);

        let mut commits: Vec<CommitRecord> = Vec::new();
        let mut page = 1u32;
        loop {
            pb.set_message(format!("page {page}, collected {}", commits.len()));

            let query = [
                ("since", since.clone()),
                ("until", until.clone()),
                ("per_page", self.config.page_size.to_string()),
                ("page", page.to_string()),
                ("all", "true".to_string()),
                ("with_stats", "true".to_string()),
            ];
            let response = self.get(&url, &query).await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                pb.abandon();
                return Err(PulseError::upstream(status, &format!("commits page {page}"), &body));
            }

            let body = response.text().await?;
            let batch: Vec<CommitRecord> = serde_json::from_str(&body).map_err(|e| {
                PulseError::Upstream(format!("Malformed commits page {page}: {e}"))
            })?;
            debug!(page, received = batch.len(), "fetched commit page");
            if batch.is_empty() {
                break;
            }

            pb.inc(batch.len() as u64);
            commits.extend(batch);
            page += 1;
            tokio::time::sleep(self.config.page_delay).await;
        }

        pb.finish_and_clear();
        info!(commits = commits.len(), pages = page - 1, "fetched commit history");
        Ok(commits)
    }

    /// Reads the `X-Total` header of a one-item page; only used to size the progress bar.
    async fn count_commits(&self, url: &str, since: &str, until: &str) -> Result<Option<u64>> {
        let query = [
            ("since", since.to_string()),
            ("until", until.to_string()),
            ("per_page", "1".to_string()),
            ("page", "1".to_string()),
        ];
        let response = self.get(url, &query).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::upstream(status, "commit count", &body));
        }

        let total = response
            .headers()
            .get(TOTAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        debug!(?total, "commit count");
        Ok(total)
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn locator_from_gitlab_url() {
        let loc = RepoLocator::parse("https://gitlab.com/acme/platform/api-server").unwrap();
        assert_eq!(
            loc,
            RepoLocator {
                api_base: "https://gitlab.com/api/v4".to_string(),
                project_path: "acme/platform/api-server".to_string(),
                repo_name: "api-server".to_string(),
            }
        );
    }

    #[test]
    fn locator_strips_git_suffix_and_ui_paths() {
        let loc = RepoLocator::parse("https://git.example.org:8443/team/tool.git/").unwrap();
        assert_eq!(loc.api_base, "https://git.example.org:8443/api/v4");
        assert_eq!(loc.project_path, "team/tool");

        let loc = RepoLocator::parse("https://gitlab.com/team/tool/-/tree/main").unwrap();
        assert_eq!(loc.project_path, "team/tool");
        assert_eq!(loc.repo_name, "tool");
    }

    #[test]
    fn locator_rejects_bad_urls() {
        for input in ["gitlab.com/team/tool", "ftp://gitlab.com/a/b", "https://gitlab.com/solo"] {
            assert!(
                matches!(RepoLocator::parse(input), Err(PulseError::InvalidInput(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn client_requires_a_token() {
        let err = GitLabClient::new(CollectorConfig::new("https://gitlab.com/api/v4", " ")).err();
        assert!(matches!(err, Some(PulseError::Authentication(_))));
    }
}
