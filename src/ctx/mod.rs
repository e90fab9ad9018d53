//! The in-memory context of the `grr` application.

use crate::{
    config::GrrConfig,
    constants::ORIGIN_REMOTE_NAME,
    errors::GrrResult,
    git::{RepoIdentity, RepositoryExt},
    store::BranchMetadataStore,
};
use git2::Repository;

mod fmt;
mod lifecycle;

/// The in-memory context of the `grr` application.
pub struct GrrContext<'a> {
    /// The repository `grr` operates on.
    pub repository: &'a Repository,
    /// The user configuration.
    pub config: GrrConfig,
    /// The per-branch metadata of the repository.
    pub store: BranchMetadataStore<'a>,
}

impl<'a> GrrContext<'a> {
    /// Creates a [GrrContext] for `repository`.
    pub fn new(repository: &'a Repository, config: GrrConfig) -> Self {
        let store = BranchMetadataStore::new(repository, config.main_line());
        Self {
            repository,
            config,
            store,
        }
    }

    /// The main line branch name.
    pub fn main_line(&self) -> &str {
        self.config.main_line()
    }

    /// The currently checked out branch.
    pub fn current_branch(&self) -> GrrResult<String> {
        self.repository.current_branch_name()
    }

    /// Whether the main line is checked out.
    pub fn on_main_line(&self) -> GrrResult<bool> {
        Ok(self.current_branch()? == self.main_line())
    }

    /// The identity of the repository, derived from the origin remote.
    pub fn repo_identity(&self) -> GrrResult<RepoIdentity> {
        self.repository.remote_identity(ORIGIN_REMOTE_NAME)
    }
}
