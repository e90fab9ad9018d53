//! HTTPS clients for the issue trackers.

use super::{IssueKind, IssueRef};
use crate::{
    config::GrrConfig,
    constants::USER_AGENT,
    errors::{GrrError, GrrResult},
};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Fetches issue titles from the tracker an [IssueRef] lives in.
#[allow(async_fn_in_trait)]
pub trait IssueTracker {
    /// Returns the title of `issue`.
    ///
    /// ## Returns
    /// - `Ok(String)` - The issue title.
    /// - `Err(GrrError::IssueNotFound)` - The tracker has no such issue.
    /// - `Err(GrrError::IssueFetch)` - Any other failure.
    /// - `Err(GrrError::MissingCredentials)` - No credentials are configured for the tracker.
    async fn fetch_title(&self, issue: &IssueRef) -> GrrResult<String>;
}

/// [IssueTracker] backed by the JIRA REST API and the GitHub REST API.
pub struct HttpIssueTracker {
    client: reqwest::Client,
    config: GrrConfig,
    owner: Option<String>,
    repo_name: String,
}

#[derive(Deserialize)]
struct JiraIssue {
    fields: JiraFields,
}

#[derive(Deserialize)]
struct JiraFields {
    summary: String,
}

#[derive(Deserialize)]
struct GithubIssue {
    title: String,
}

impl HttpIssueTracker {
    /// Creates a tracker client for the repository `owner/repo_name`.
    pub fn new(config: GrrConfig, owner: Option<String>, repo_name: impl Into<String>) -> GrrResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GrrError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            owner,
            repo_name: repo_name.into(),
        })
    }

    fn jira_request(&self, issue: &IssueRef) -> GrrResult<reqwest::RequestBuilder> {
        let creds = self.config.jira_credentials()?;
        Ok(self
            .client
            .get(jira_issue_url(&creds.url, &issue.id))
            .basic_auth(creds.username, Some(creds.token)))
    }

    fn github_request(&self, issue: &IssueRef) -> GrrResult<reqwest::RequestBuilder> {
        let token = self.config.github_token()?;
        let owner = self.owner.as_deref().ok_or_else(|| {
            GrrError::Configuration(format!(
                "Cannot determine the GitHub owner of `{}` from the origin remote URL.",
                self.repo_name
            ))
        })?;
        Ok(self
            .client
            .get(github_issue_url(
                self.config.github_api_url(),
                owner,
                &self.repo_name,
                &issue.id,
            ))
            .bearer_auth(token)
            .header(header::ACCEPT, "application/vnd.github+json"))
    }
}

impl IssueTracker for HttpIssueTracker {
    async fn fetch_title(&self, issue: &IssueRef) -> GrrResult<String> {
        let request = match issue.kind {
            IssueKind::Jira => self.jira_request(issue)?,
            IssueKind::GitHub => self.github_request(issue)?,
        };
        debug!(issue = %issue, "fetching issue title");

        let fetch_error = |reason: String| GrrError::IssueFetch {
            issue: issue.name.clone(),
            reason,
        };
        let response = request.send().await.map_err(|e| fetch_error(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(GrrError::IssueNotFound(issue.name.clone())),
            status if !status.is_success() => {
                return Err(fetch_error(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let title = match issue.kind {
            IssueKind::Jira => response
                .json::<JiraIssue>()
                .await
                .map(|i| i.fields.summary),
            IssueKind::GitHub => response.json::<GithubIssue>().await.map(|i| i.title),
        }
        .map_err(|e| fetch_error(e.to_string()))?;

        Ok(title.trim().to_string())
    }
}

fn jira_issue_url(base: &str, id: &str) -> String {
    format!("{}/rest/api/2/issue/{}?fields=summary", base, id)
}

fn github_issue_url(api: &str, owner: &str, repo: &str, number: &str) -> String {
    format!("{}/repos/{}/{}/issues/{}", api, owner, repo, number)
}

#[cfg(test)]
mod test {
    use super::{github_issue_url, jira_issue_url, HttpIssueTracker, IssueTracker};
    use crate::{
        config::GrrConfig,
        errors::GrrError,
        issue::{IssueKind, IssueRef},
    };

    #[test]
    fn builds_tracker_urls() {
        assert_eq!(
            jira_issue_url("https://jira.example.com", "FOO-1"),
            "https://jira.example.com/rest/api/2/issue/FOO-1?fields=summary"
        );
        assert_eq!(
            github_issue_url("https://api.github.com", "acme", "widgets", "12"),
            "https://api.github.com/repos/acme/widgets/issues/12"
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let tracker =
            HttpIssueTracker::new(GrrConfig::default(), Some("acme".to_string()), "widgets")
                .unwrap();

        let jira = IssueRef::new(IssueKind::Jira, "FOO-1", "FOO-1");
        assert!(matches!(
            tracker.fetch_title(&jira).await,
            Err(GrrError::MissingCredentials { tracker: "JIRA", .. })
        ));

        let github = IssueRef::new(IssueKind::GitHub, "12", "widgets#12");
        assert!(matches!(
            tracker.fetch_title(&github).await,
            Err(GrrError::MissingCredentials { tracker: "GitHub", .. })
        ));
    }
}
