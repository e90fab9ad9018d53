//! `-D`: tear down the current issue branch.

use crate::{
    ctx::GrrContext,
    errors::{GrrError, GrrResult},
    git::RepositoryExt,
    reconcile::commits_to_push,
};
use anyhow::Result;
use nu_ansi_term::Color;

/// Removes the current issue branch and its metadata.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeleteCmd {
    /// Skip the confirmation prompt.
    yes: bool,
}

impl DeleteCmd {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }

    /// Run the teardown.
    pub fn run(self, ctx: GrrContext<'_>) -> Result<()> {
        let branch = ctx.current_branch()?;
        if branch == ctx.main_line() {
            return Err(GrrError::CannotDeleteMainLine(branch).into());
        }

        // Ask for confirmation before dropping commits the CR does not have yet.
        let unpushed = match self.yes {
            true => 0,
            false => unpushed_commits(&ctx, &branch)?,
        };
        if unpushed > 0 {
            let confirm = inquire::Confirm::new(
                format!(
                    "Branch `{}` has {} commit(s) that were never pushed. Delete it anyway?",
                    Color::Blue.paint(&branch),
                    unpushed
                )
                .as_str(),
            )
            .with_default(false)
            .prompt()?;

            // Exit early if the user doesn't confirm.
            if !confirm {
                return Ok(());
            }
        }

        let teardown = ctx.teardown()?;
        if teardown.deleted {
            println!(
                "Deleted branch `{}` and switched to `{}`.",
                Color::Blue.paint(&teardown.branch),
                Color::Blue.paint(ctx.main_line())
            );
        } else {
            println!(
                "Removed grr metadata from `{}`. The branch itself was kept.",
                Color::Blue.paint(&teardown.branch)
            );
        }
        Ok(())
    }
}

/// The number of commits on `branch` newer than the last push.
fn unpushed_commits(ctx: &GrrContext<'_>, branch: &str) -> GrrResult<usize> {
    let commits = ctx.repository.local_commits(ctx.main_line())?;
    let last_pushed_sha = ctx.store.last_pushed_sha(branch)?;
    Ok(commits_to_push(&commits, last_pushed_sha.as_deref()).len())
}

#[cfg(test)]
mod test {
    use super::DeleteCmd;
    use crate::{
        config::GrrConfig,
        ctx::GrrContext,
        git::{test_util::init_repository, RepositoryExt},
        store::MetadataKey,
    };

    #[test]
    fn yes_skips_main_line_lookup() {
        let (_dir, repo) = init_repository();
        repo.create_and_checkout_branch("my-work").unwrap();
        // A main line that resolves nowhere.
        let config = GrrConfig {
            main_line: Some("trunk".to_string()),
            ..Default::default()
        };
        let ctx = GrrContext::new(&repo, config);
        ctx.store.set("my-work", MetadataKey::Issue, "FOO-1").unwrap();

        DeleteCmd::new(true).run(ctx).unwrap();

        let ctx = GrrContext::new(&repo, GrrConfig::default());
        assert_eq!(ctx.store.issue("my-work").unwrap(), None);
        assert_eq!(repo.current_branch_name().unwrap(), "my-work");
    }
}
