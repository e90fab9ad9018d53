//! Creation and removal of issue branches.

use super::GrrContext;
use crate::{
    constants::ISSUE_BRANCH_PREFIX,
    errors::{GrrError, GrrResult},
    git::RepositoryExt,
    issue::IssueRef,
};
use tracing::{debug, info};

/// The branch a reconciliation runs on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BranchEntry {
    /// The issue branch name.
    pub name: String,
    /// Whether the branch was created by this invocation.
    pub created: bool,
}

/// The result of tearing down an issue branch.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Teardown {
    /// The branch whose metadata was removed.
    pub branch: String,
    /// Whether the branch itself was deleted. Branches not named by `grr` are kept.
    pub deleted: bool,
}

/// Returns the issue branch name for `issue`.
pub fn issue_branch_name(issue: &IssueRef) -> String {
    format!("{}{}", ISSUE_BRANCH_PREFIX, issue.id)
}

/// Whether `branch` follows the `grr-<suffix>` naming convention.
pub fn is_issue_branch_name(branch: &str) -> bool {
    branch
        .strip_prefix(ISSUE_BRANCH_PREFIX)
        .is_some_and(|suffix| !suffix.is_empty() && !suffix.contains('/'))
}

impl<'a> GrrContext<'a> {
    /// Makes sure an issue branch is checked out.
    ///
    /// Any branch other than the main line is used as-is, whatever its name. On the main line,
    /// `grr-<issue id>` is created at `HEAD` and checked out.
    ///
    /// ## Returns
    /// - `Ok(BranchEntry)` - The branch to work on.
    /// - `Err(GrrError::BranchAlreadyExists)` - On the main line, and the issue branch exists.
    pub fn ensure_on_issue_branch(&self, issue: &IssueRef) -> GrrResult<BranchEntry> {
        let current = self.current_branch()?;
        if current != self.main_line() {
            debug!(branch = %current, "already on an issue branch");
            return Ok(BranchEntry {
                name: current,
                created: false,
            });
        }

        let name = issue_branch_name(issue);
        if self.repository.branch_exists(&name)? {
            return Err(GrrError::BranchAlreadyExists(name));
        }
        self.repository.create_and_checkout_branch(&name)?;
        info!(branch = %name, "created issue branch");

        Ok(BranchEntry {
            name,
            created: true,
        })
    }

    /// Removes the metadata of the current branch and, if `grr` named it, deletes the branch
    /// after switching to the main line.
    ///
    /// ## Returns
    /// - `Ok(Teardown)` - What was removed.
    /// - `Err(GrrError::CannotDeleteMainLine)` - The main line is checked out.
    pub fn teardown(&self) -> GrrResult<Teardown> {
        let branch = self.current_branch()?;
        if branch == self.main_line() {
            return Err(GrrError::CannotDeleteMainLine(branch));
        }

        self.store.remove_all(&branch)?;

        if !is_issue_branch_name(&branch) {
            debug!(branch = %branch, "keeping branch not named by grr");
            return Ok(Teardown {
                branch,
                deleted: false,
            });
        }

        self.repository.checkout_branch(self.main_line())?;
        self.repository.force_delete_branch(&branch)?;
        info!(branch = %branch, "deleted issue branch");

        Ok(Teardown {
            branch,
            deleted: true,
        })
    }
}
