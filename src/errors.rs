//! Error types for the `grr` application.

use nu_ansi_term::Color;
use thiserror::Error;

/// Coarse classification of a [GrrError], used to decide how it is presented.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The user supplied something invalid or contradictory.
    UserInput,
    /// Credentials, usernames, or remotes are missing or misconfigured.
    Configuration,
    /// A `git` or `ssh` subprocess failed.
    ExternalTool,
    /// An issue tracker or the review backend failed or answered unexpectedly.
    Backend,
    /// Tidying up after a push failed.
    Cleanup,
}

#[derive(Error, Debug)]
pub enum GrrError {
    /// Not inside a git repository.
    #[error("Not in a git repository.")]
    NotInRepository,
    /// Reading the repository-local configuration failed for a reason other than a missing key.
    #[error("Failed to access git config key `{key}`: {source}")]
    ConfigAccess {
        key: String,
        #[source]
        source: git2::Error,
    },
    /// The user configuration file is unreadable or malformed.
    #[error("{0}")]
    Configuration(String),
    /// Credentials for an issue tracker are missing.
    #[error(
        "Missing {tracker} credentials. Add the following to `{path}`:\n\n{snippet}"
    )]
    MissingCredentials {
        tracker: &'static str,
        path: String,
        snippet: &'static str,
    },
    /// The issue argument matches none of the recognized shapes.
    #[error("`{}` is not a recognized issue reference.", Color::Blue.paint(.0))]
    InvalidIssueReference(String),
    /// The issue argument names a different repository.
    #[error("Issue `{issue}` belongs to repository `{found}`, but this repository is `{expected}`.")]
    RepoMismatch {
        issue: String,
        expected: String,
        found: String,
    },
    /// The tracker has no such issue.
    #[error("Issue `{}` was not found.", Color::Blue.paint(.0))]
    IssueNotFound(String),
    /// Fetching an issue failed.
    #[error("Failed to fetch issue `{issue}`: {reason}")]
    IssueFetch { issue: String, reason: String },
    /// No username could be discovered for the review backend.
    #[error(
        "Could not determine your review username. Set it in `{0}`:\n\n[gerrit]\nusername = \"you\""
    )]
    UsernameUnknown(String),
    /// The review remote exists and points somewhere unexpected.
    #[error(
        "Remote `{remote}` points to `{found}`, expected `{expected}`. Fix it with `git remote set-url {remote} {expected}`."
    )]
    RemoteConfigConflict {
        remote: String,
        expected: String,
        found: String,
    },
    /// The review backend has no such CR.
    #[error("CR {0} was not found.")]
    ReviewNotFound(u64),
    /// The review backend answered for a different CR than requested.
    #[error("Asked for CR {expected_number} in `{expected_project}`, got CR {found_number} in `{found_project}`.")]
    ReviewMismatch {
        expected_number: u64,
        expected_project: String,
        found_number: u64,
        found_project: String,
    },
    /// The review backend reported a failure.
    #[error("Review backend error: {0}")]
    Backend(String),
    /// The push succeeded but no review number was found in its output.
    #[error("Could not find the new CR number in the push output:\n{0}")]
    ReviewNumberNotParsed(String),
    /// Posting a comment to the CR failed.
    #[error("Failed to comment on CR {number}: {reason}")]
    CommentPost { number: u64, reason: String },
    /// The branch to create already exists.
    #[error("Branch `{}` already exists.", Color::Blue.paint(.0))]
    BranchAlreadyExists(String),
    /// Teardown requested while on the main line.
    #[error("Cannot delete the main line branch `{}`.", Color::Blue.paint(.0))]
    CannotDeleteMainLine(String),
    /// The issue argument contradicts the issue bound to the branch.
    #[error("This branch is for `{cached}`, not `{requested}`.")]
    IssueConflict { cached: String, requested: String },
    /// No issue argument and none bound to the branch.
    #[error("{}", missing_issue_message(.on_main_line))]
    MissingIssue { on_main_line: bool },
    /// Attempt to remove the primary issue from the extra issues.
    #[error("`{0}` is the main issue of this branch and cannot be removed.")]
    CannotRemoveMainIssue(String),
    /// Attempt to add the primary issue as an extra issue.
    #[error("`{0}` is the main issue of this branch and cannot also be an extra issue.")]
    CannotAddMainIssueAsExtra(String),
    /// Attempt to add an extra issue that is already attached.
    #[error("`{0}` is already an extra issue of this branch.")]
    DuplicateExtraIssue(String),
    /// Squashing the issue branch onto the main line produced conflicts.
    #[error("Squashing `{}` onto `{}` has conflicts. Rebase onto the main line first.", Color::Blue.paint(.branch), Color::Blue.paint(.main_line))]
    SquashConflict { branch: String, main_line: String },
    /// A subprocess exited unsuccessfully.
    #[error("`{command}` failed with exit code {code}: {}", .stderr.trim())]
    ExternalTool {
        command: String,
        code: i32,
        stderr: String,
    },
    /// Cleanup after a push failed.
    #[error("Cleanup failed: {0}")]
    Cleanup(Box<GrrError>),
    /// A [git2::Error] occurred.
    #[error("libgit2 error: {}", .0)]
    Git(#[from] git2::Error),
    /// A [serde_json::Error] occurred.
    #[error("JSON error: {}", .0)]
    Json(#[from] serde_json::Error),
    /// An [std::io::Error] occurred.
    #[error("I/O error: {}", .0)]
    Io(#[from] std::io::Error),
}

impl GrrError {
    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidIssueReference(_)
            | Self::RepoMismatch { .. }
            | Self::BranchAlreadyExists(_)
            | Self::CannotDeleteMainLine(_)
            | Self::IssueConflict { .. }
            | Self::MissingIssue { .. }
            | Self::CannotRemoveMainIssue(_)
            | Self::CannotAddMainIssueAsExtra(_)
            | Self::DuplicateExtraIssue(_)
            | Self::SquashConflict { .. } => ErrorCategory::UserInput,
            Self::NotInRepository
            | Self::ConfigAccess { .. }
            | Self::Configuration(_)
            | Self::MissingCredentials { .. }
            | Self::UsernameUnknown(_)
            | Self::RemoteConfigConflict { .. } => ErrorCategory::Configuration,
            Self::ExternalTool { .. } | Self::Git(_) | Self::Io(_) => ErrorCategory::ExternalTool,
            Self::IssueNotFound(_)
            | Self::IssueFetch { .. }
            | Self::ReviewNotFound(_)
            | Self::ReviewMismatch { .. }
            | Self::ReviewNumberNotParsed(_)
            | Self::CommentPost { .. }
            | Self::Backend(_)
            | Self::Json(_) => ErrorCategory::Backend,
            Self::Cleanup(_) => ErrorCategory::Cleanup,
        }
    }

    /// The process exit code to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalTool { code, .. } if *code > 0 => *code,
            Self::Cleanup(inner) => inner.exit_code(),
            _ => 1,
        }
    }
}

pub type GrrResult<T> = Result<T, GrrError>;

fn missing_issue_message(on_main_line: &bool) -> &'static str {
    if *on_main_line {
        "An issue is required: `grr <issue>` creates a branch for it."
    } else {
        "This branch has no issue yet. Run `grr <issue>` to attach one."
    }
}

#[cfg(test)]
mod test {
    use super::{ErrorCategory, GrrError};

    #[test]
    fn external_tool_exit_code_is_propagated() {
        let err = GrrError::ExternalTool {
            command: "git push".to_string(),
            code: 128,
            stderr: "fatal: nope\n".to_string(),
        };
        assert_eq!(err.exit_code(), 128);
        assert_eq!(err.category(), ErrorCategory::ExternalTool);
        assert_eq!(
            err.to_string(),
            "`git push` failed with exit code 128: fatal: nope"
        );
    }

    #[test]
    fn signal_killed_tool_defaults_to_one() {
        let err = GrrError::ExternalTool {
            command: "ssh".to_string(),
            code: -1,
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_issue_message_depends_on_branch() {
        let on_main = GrrError::MissingIssue { on_main_line: true }.to_string();
        let on_branch = GrrError::MissingIssue { on_main_line: false }.to_string();
        assert!(on_main.contains("creates a branch"));
        assert!(on_branch.contains("attach one"));
        assert_ne!(on_main, on_branch);
    }
}
