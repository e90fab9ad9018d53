//! `-L`: list the open CRs of the repository.

use super::gerrit_client;
use crate::{ctx::GrrContext, issue::HttpIssueTracker, reconcile::Reconciler};
use anyhow::Result;

/// Lists open CRs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ListCmd;

impl ListCmd {
    /// Run the listing.
    pub fn run(self, ctx: GrrContext<'_>) -> Result<()> {
        let repo = ctx.repo_identity()?;
        let backend = gerrit_client(&ctx)?;
        let tracker = HttpIssueTracker::new(ctx.config.clone(), repo.owner, repo.name)?;

        let mut reconciler = Reconciler::new(&ctx, backend, tracker);
        let reviews = reconciler.list_open_reviews()?;
        ctx.print_reviews(&reviews, |number| reconciler.review_url(number))?;
        Ok(())
    }
}
