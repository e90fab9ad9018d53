//! Deciding what a reconciliation has to do.

use super::message::normalize_message;
use crate::{git::LocalCommit, review::ChangeRequest};
use std::fmt::Display;

/// The action a reconciliation takes against the review backend.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    /// Nothing new to push and the CR message is current.
    None,
    /// New commits and no CR yet: push to `refs/for/<main line>`.
    Create,
    /// New commits for an existing CR: push a new patch set.
    Update,
    /// No new commits, but the CR's commit message is stale.
    UpdateCommitMessage,
}

impl Action {
    /// Whether the action pushes the commits the CR does not have yet.
    pub fn pushes_commits(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateCommitMessage => "updateCommitMessage",
        };
        write!(f, "{}", name)
    }
}

/// Returns the commits newer than `last_pushed_sha`, newest first.
///
/// `commits` is ordered oldest first. If `last_pushed_sha` is unset or no longer part of the
/// branch, every commit is new.
pub fn commits_to_push<'a>(
    commits: &'a [LocalCommit],
    last_pushed_sha: Option<&str>,
) -> Vec<&'a LocalCommit> {
    match commits.last() {
        None => Vec::new(),
        Some(newest) if Some(newest.sha.as_str()) == last_pushed_sha => Vec::new(),
        Some(_) => commits
            .iter()
            .rev()
            .take_while(|commit| Some(commit.sha.as_str()) != last_pushed_sha)
            .collect(),
    }
}

/// Chooses the [Action] for a branch.
///
/// ## Takes
/// - `has_new_commits` - Whether [commits_to_push] found anything.
/// - `has_commits` - Whether the branch has any commits at all.
/// - `review` - The current state of the CR, if one exists.
/// - `target_message` - The commit message the CR should carry.
pub fn decide_action(
    has_new_commits: bool,
    has_commits: bool,
    review: Option<&ChangeRequest>,
    target_message: &str,
) -> Action {
    match (has_new_commits, review) {
        (true, None) => Action::Create,
        (true, Some(_)) => Action::Update,
        (false, Some(review))
            if has_commits
                && normalize_message(&review.commit_message)
                    != normalize_message(target_message) =>
        {
            Action::UpdateCommitMessage
        }
        (false, _) => Action::None,
    }
}
