//! The default command: create or update the CR of the current issue branch.

use super::gerrit_client;
use crate::{
    ctx::GrrContext,
    issue::HttpIssueTracker,
    reconcile::{Reconciler, SyncRequest},
};
use anyhow::Result;
use clap::Args;

/// CLI arguments for creating or updating a CR.
#[derive(Debug, Clone, Default, Eq, PartialEq, Args)]
pub struct SyncCmd {
    /// The primary issue of the branch: a JIRA key or URL, or a GitHub issue number or URL
    #[clap(index = 1)]
    pub issue: Option<String>,
    /// Extra issues the CR must carry; ones already attached are kept as they are
    #[clap(index = 2)]
    pub extra_issues: Vec<String>,
    /// Attach extra issues (comma separated, repeatable)
    #[arg(short = 'a', long = "add", value_delimiter = ',', value_name = "ISSUES")]
    pub add: Vec<String>,
    /// Detach extra issues (comma separated, repeatable)
    #[arg(short = 'r', long = "remove", value_delimiter = ',', value_name = "ISSUES")]
    pub remove: Vec<String>,
    /// Annotate the title line. An empty string clears it.
    #[arg(short = 'p', long = "parenthetical", value_name = "TEXT")]
    pub parenthetical: Option<String>,
    /// Fetch issue titles again instead of using the cached ones
    #[arg(short = 'u', long = "update")]
    pub update: bool,
}

impl SyncCmd {
    /// Run the reconciliation.
    pub async fn run(self, ctx: GrrContext<'_>) -> Result<()> {
        let repo = ctx.repo_identity()?;
        let backend = gerrit_client(&ctx)?;
        let tracker = HttpIssueTracker::new(ctx.config.clone(), repo.owner, repo.name)?;

        let request = SyncRequest {
            issue: self.issue,
            add_extra_issues: self.add,
            ensure_extra_issues: self.extra_issues,
            remove_extra_issues: self.remove,
            parenthetical: self.parenthetical,
            update: self.update,
        };

        let outcome = Reconciler::new(&ctx, backend, tracker)
            .sync(request)
            .await?;
        print!("{}", outcome);
        Ok(())
    }
}
