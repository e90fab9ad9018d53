//! The commands of the `grr` application.

mod delete;
pub use delete::DeleteCmd;

mod list;
pub use list::ListCmd;

mod sync;
pub use sync::SyncCmd;

use crate::{
    constants::REVIEW_REMOTE_NAME,
    ctx::GrrContext,
    errors::{GrrError, GrrResult},
    review::GerritClient,
};

/// Builds the review backend client for the repository in `ctx`.
fn gerrit_client(ctx: &GrrContext<'_>) -> GrrResult<GerritClient> {
    let workdir = ctx.repository.workdir().ok_or_else(|| {
        GrrError::Configuration("Bare repositories are not supported.".to_string())
    })?;
    Ok(GerritClient::new(
        ctx.config.gerrit_host()?,
        ctx.config.gerrit_port(),
        workdir,
        REVIEW_REMOTE_NAME,
    ))
}
