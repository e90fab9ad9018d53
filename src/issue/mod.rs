//! Issue references: resolution of user-supplied issue strings and fetching of their titles.

use crate::errors::{GrrError, GrrResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, hash::Hash};

mod tracker;
pub use tracker::{HttpIssueTracker, IssueTracker};

static JIRA_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)([a-z][a-z0-9_]*-[0-9]+)$").expect("valid regex"));
static JIRA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^/\s]+(?:/[^\s]*)?/browse/(?i)([a-z][a-z0-9_]*-[0-9]+)/?$")
        .expect("valid regex")
});
static GITHUB_SHORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:([\w.-]+)/)?([\w.-]+))?#([0-9]+)$|^([0-9]+)$").expect("valid regex")
});
static GITHUB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://github\.com/([\w.-]+)/([\w.-]+)/(?:issues|pull)/([0-9]+)/?$")
        .expect("valid regex")
});

/// The tracker an issue lives in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A JIRA ticket, e.g. `FOO-123`.
    Jira,
    /// A GitHub issue of the current repository, e.g. `widgets#123`.
    #[serde(rename = "github")]
    GitHub,
}

/// A resolved reference to an issue. Two references are equal iff their kind and id match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRef {
    /// The tracker the issue lives in.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// The tracker-native short identifier.
    pub id: String,
    /// The fully qualified display identifier.
    pub name: String,
}

impl IssueRef {
    pub fn new(kind: IssueKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }

    /// Resolves a user-supplied issue string for the repository named `repo_name`.
    ///
    /// ## Takes
    /// - `raw` - A JIRA key or `/browse/` URL, or a GitHub issue number, `#n`, `repo#n`,
    ///   `owner/repo#n`, or issue URL.
    /// - `repo_name` - The name of the current repository.
    ///
    /// ## Returns
    /// - `Ok(IssueRef)` - The resolved reference.
    /// - `Err(GrrError::InvalidIssueReference)` - `raw` matches no known shape.
    /// - `Err(GrrError::RepoMismatch)` - `raw` names a different repository.
    pub fn resolve(raw: &str, repo_name: &str) -> GrrResult<Self> {
        let trimmed = raw.trim();

        if let Some(caps) = JIRA_KEY
            .captures(trimmed)
            .or_else(|| JIRA_URL.captures(trimmed))
        {
            let key = caps[1].to_uppercase();
            return Ok(Self::new(IssueKind::Jira, key.clone(), key));
        }

        let (repo, number) = if let Some(caps) = GITHUB_URL.captures(trimmed) {
            (Some(caps[2].to_string()), caps[3].to_string())
        } else if let Some(caps) = GITHUB_SHORT.captures(trimmed) {
            match caps.get(4) {
                Some(number) => (None, number.as_str().to_string()),
                None => (caps.get(2).map(|m| m.as_str().to_string()), caps[3].to_string()),
            }
        } else {
            return Err(GrrError::InvalidIssueReference(raw.to_string()));
        };

        if let Some(repo) = repo {
            if !repo.eq_ignore_ascii_case(repo_name) {
                return Err(GrrError::RepoMismatch {
                    issue: raw.to_string(),
                    expected: repo_name.to_string(),
                    found: repo,
                });
            }
        }

        Ok(Self::github(&number, repo_name))
    }

    /// Rebuilds a reference from an id persisted in branch metadata, without validating its
    /// shape. All-digit ids are GitHub issues, anything else is a JIRA key.
    pub fn from_cached_id(id: &str, repo_name: &str) -> Self {
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            Self::github(id, repo_name)
        } else {
            Self::new(IssueKind::Jira, id, id)
        }
    }

    fn github(number: &str, repo_name: &str) -> Self {
        Self::new(
            IssueKind::GitHub,
            number,
            format!("{}#{}", repo_name, number),
        )
    }
}

impl PartialEq for IssueRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl Eq for IssueRef {}

impl Hash for IssueRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl Display for IssueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An issue attached to a branch in addition to its primary issue, with its cached title.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtraIssue {
    #[serde(flatten)]
    pub issue: IssueRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ExtraIssue {
    pub fn new(issue: IssueRef) -> Self {
        Self { issue, title: None }
    }
}
