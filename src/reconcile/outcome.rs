//! The result of a reconciliation and its human-readable narrative.

use super::Action;
use crate::{
    errors::GrrError,
    git::LocalCommit,
    issue::{ExtraIssue, IssueRef},
};
use nu_ansi_term::Color;
use std::fmt::Display;

/// What a reconciliation did.
#[derive(Debug)]
pub struct SyncOutcome {
    pub action: Action,
    pub primary: IssueRef,
    pub title: String,
    pub extra_issues: Vec<ExtraIssue>,
    /// The issue branch.
    pub branch: String,
    /// Whether the issue branch was created by this invocation.
    pub branch_created: bool,
    pub review_number: Option<u64>,
    pub review_url: Option<String>,
    /// The CR's current patch set after the action.
    pub patch_set: Option<u64>,
    /// Commits pushed by this invocation, newest first.
    pub pushed_commits: Vec<LocalCommit>,
    /// A failure while removing the integration branch after a successful push.
    pub cleanup_error: Option<GrrError>,
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} {}",
            Color::Green.bold().paint(&self.primary.name),
            self.title
        )?;
        for extra in &self.extra_issues {
            writeln!(
                f,
                "  {} {}",
                Color::Green.paint(&extra.issue.name),
                extra.title.as_deref().unwrap_or_default()
            )?;
        }

        if self.branch_created {
            writeln!(f, "Created branch `{}`.", Color::Blue.paint(&self.branch))?;
        }

        if !self.pushed_commits.is_empty() {
            writeln!(f, "New commits:")?;
            for commit in &self.pushed_commits {
                writeln!(
                    f,
                    "  {} {}",
                    Color::Yellow.paint(&commit.sha[..commit.sha.len().min(10)]),
                    commit.summary()
                )?;
            }
        }

        let url = self
            .review_url
            .as_deref()
            .map(|u| Color::Cyan.italic().paint(u).to_string())
            .unwrap_or_default();
        let number = self.review_number.unwrap_or_default();
        let patch_set = self.patch_set.unwrap_or_default();
        match self.action {
            Action::None if self.review_number.is_some() => {
                writeln!(f, "CR {} is up to date: {}", number, url)?
            }
            Action::None => writeln!(
                f,
                "Nothing to push yet. Commit on `{}` and run grr again.",
                Color::Blue.paint(&self.branch)
            )?,
            Action::Create => writeln!(f, "Created CR {}: {}", number, url)?,
            Action::Update => writeln!(
                f,
                "Updated CR {} with patch set {}: {}",
                number, patch_set, url
            )?,
            Action::UpdateCommitMessage => writeln!(
                f,
                "Amended the commit message of CR {} in patch set {} (no new commits): {}",
                number, patch_set, url
            )?,
        }

        if let Some(error) = &self.cleanup_error {
            writeln!(f, "{} {}", Color::Yellow.bold().paint("warning:"), error)?;
        }
        Ok(())
    }
}
