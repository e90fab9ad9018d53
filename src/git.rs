//! Utilities for interacting with `git` repositories for the `grr` application.

use crate::{
    constants::ORIGIN_REMOTE_NAME,
    errors::{GrrError, GrrResult},
};
use git2::{
    build::CheckoutBuilder, BranchType, Commit, ErrorCode, Oid, Repository, Signature, Sort,
};
use std::env;
use tracing::{debug, trace};

/// Returns the repository for the current working directory, and [None] if
/// the current working directory is not within a git repository or an error
/// occurs.
pub fn active_repository() -> Option<Repository> {
    Repository::discover(env::current_dir().ok()?).ok()
}

/// Returns the tip of the main line: the origin's remote-tracking branch if it exists, otherwise
/// the local branch.
fn main_line_commit<'r>(repository: &'r Repository, main_line: &str) -> GrrResult<Commit<'r>> {
    let remote_tracking = format!("{}/{}", ORIGIN_REMOTE_NAME, main_line);
    let branch = match repository.find_branch(&remote_tracking, BranchType::Remote) {
        Ok(branch) => branch,
        Err(e) if e.code() == ErrorCode::NotFound => {
            repository.find_branch(main_line, BranchType::Local)?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(branch.get().peel_to_commit()?)
}

/// The identity of the repository, as derived from its origin remote URL.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RepoIdentity {
    /// The path segment preceding the repository name, if any (e.g. the GitHub owner).
    pub owner: Option<String>,
    /// The last path segment of the remote URL with `.git` stripped.
    pub name: String,
}

impl RepoIdentity {
    /// Parses a remote URL in either URL form (`ssh://host:port/owner/repo.git`) or scp form
    /// (`git@host:owner/repo.git`).
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let url = url.trim().trim_end_matches('/');
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, path)| path)?,
            None => url.split_once(':').map_or(url, |(_, path)| path),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
        let name = segments.next()?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        Some(Self {
            owner: segments.next().map(ToOwned::to_owned),
            name: name.to_string(),
        })
    }
}

/// The author of a local commit.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// A commit on the issue branch that is not on the main line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LocalCommit {
    /// The full hex object id.
    pub sha: String,
    pub author: CommitAuthor,
    pub message: String,
}

impl LocalCommit {
    /// The first line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Extension trait for the [Repository] type to expose helper functions related to
/// repository management.
pub trait RepositoryExt {
    /// Returns the name of the current branch.
    ///
    /// ## Returns
    /// - `Result<String>` - The name of the current branch, or an error if `HEAD` is detached.
    fn current_branch_name(&self) -> GrrResult<String>;

    /// Returns whether a local branch named `branch_name` exists.
    fn branch_exists(&self, branch_name: &str) -> GrrResult<bool>;

    /// Checks out a branch with the given `branch_name`.
    ///
    /// ## Takes
    /// - `branch_name` - The name of the branch to checkout.
    ///
    /// ## Returns
    /// - `Result<()>` - The result of the operation.
    fn checkout_branch(&self, branch_name: &str) -> GrrResult<()>;

    /// Creates a branch at `HEAD` and checks it out.
    fn create_and_checkout_branch(&self, branch_name: &str) -> GrrResult<()>;

    /// Deletes a local branch, regardless of whether it is merged.
    fn force_delete_branch(&self, branch_name: &str) -> GrrResult<()>;

    /// Returns the [RepoIdentity] derived from the URL of `remote_name`.
    fn remote_identity(&self, remote_name: &str) -> GrrResult<RepoIdentity>;

    /// Creates or validates the remote `remote_name` so that it points at `url`.
    ///
    /// ## Returns
    /// - `Ok(())` - The remote exists and points at `url`.
    /// - `Err(GrrError::RemoteConfigConflict)` - The remote points at a different, non-empty URL.
    fn ensure_remote(&self, remote_name: &str, url: &str) -> GrrResult<()>;

    /// Returns the commits reachable from `HEAD` but not from the merge base with the tip of
    /// `main_line`, oldest first.
    fn local_commits(&self, main_line: &str) -> GrrResult<Vec<LocalCommit>>;

    /// Squashes `branch_name` onto the tip of `main_line` (preferring the origin's remote-tracking
    /// branch) as a single commit on a freshly
    /// (re)created `target_branch`. The working tree and `HEAD` are not touched.
    ///
    /// ## Takes
    /// - `main_line` - The branch to squash onto.
    /// - `branch_name` - The branch whose changes are squashed.
    /// - `target_branch` - The branch that receives the squashed commit.
    /// - `author` - The author of the squashed commit.
    /// - `message` - The commit message.
    ///
    /// ## Returns
    /// - `Ok(Oid)` - The id of the squashed commit.
    /// - `Err(GrrError::SquashConflict)` - The merge of the two branches has conflicts.
    fn squash_onto(
        &self,
        main_line: &str,
        branch_name: &str,
        target_branch: &str,
        author: &CommitAuthor,
        message: &str,
    ) -> GrrResult<Oid>;
}

impl RepositoryExt for Repository {
    fn current_branch_name(&self) -> GrrResult<String> {
        let head = self.head()?;
        if !head.is_branch() {
            return Err(GrrError::Configuration(
                "HEAD is detached. Check out a branch first.".to_string(),
            ));
        }
        head.shorthand()
            .map(ToOwned::to_owned)
            .ok_or_else(|| GrrError::Configuration("Branch name is not valid UTF-8.".to_string()))
    }

    fn branch_exists(&self, branch_name: &str) -> GrrResult<bool> {
        match self.find_branch(branch_name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn checkout_branch(&self, branch_name: &str) -> GrrResult<()> {
        let reference = format!("refs/heads/{}", branch_name);
        let target = self.revparse_single(&reference)?;
        self.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        self.set_head(&reference)?;
        debug!(branch = branch_name, "checked out");
        Ok(())
    }

    fn create_and_checkout_branch(&self, branch_name: &str) -> GrrResult<()> {
        let head_commit = self.head()?.peel_to_commit()?;
        self.branch(branch_name, &head_commit, false)?;
        self.checkout_branch(branch_name)
    }

    fn force_delete_branch(&self, branch_name: &str) -> GrrResult<()> {
        self.find_branch(branch_name, BranchType::Local)?.delete()?;
        debug!(branch = branch_name, "deleted branch");
        Ok(())
    }

    fn remote_identity(&self, remote_name: &str) -> GrrResult<RepoIdentity> {
        let remote = self.find_remote(remote_name).map_err(|_| {
            GrrError::Configuration(format!(
                "No `{}` remote is configured; cannot determine the repository name.",
                remote_name
            ))
        })?;
        let url = remote.url().unwrap_or_default();
        RepoIdentity::from_remote_url(url).ok_or_else(|| {
            GrrError::Configuration(format!(
                "Cannot derive a repository name from `{}` URL `{}`.",
                remote_name, url
            ))
        })
    }

    fn ensure_remote(&self, remote_name: &str, url: &str) -> GrrResult<()> {
        match self.find_remote(remote_name) {
            Ok(remote) => match remote.url() {
                Some(existing) if existing == url => Ok(()),
                Some("") => {
                    debug!(remote = remote_name, url, "setting empty remote URL");
                    self.remote_set_url(remote_name, url)?;
                    Ok(())
                }
                found => Err(GrrError::RemoteConfigConflict {
                    remote: remote_name.to_string(),
                    expected: url.to_string(),
                    found: found.unwrap_or("<non UTF-8 URL>").to_string(),
                }),
            },
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(remote = remote_name, url, "creating remote");
                self.remote(remote_name, url)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn local_commits(&self, main_line: &str) -> GrrResult<Vec<LocalCommit>> {
        let head = self.head()?.peel_to_commit()?;
        let main = main_line_commit(self, main_line)?;
        let base = self.merge_base(main.id(), head.id())?;

        let mut walk = self.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(head.id())?;
        walk.hide(base)?;

        let commits = walk
            .map(|oid| -> GrrResult<LocalCommit> {
                let commit = self.find_commit(oid?)?;
                let author = commit.author();
                Ok(LocalCommit {
                    sha: commit.id().to_string(),
                    author: CommitAuthor {
                        name: author.name().unwrap_or_default().to_string(),
                        email: author.email().unwrap_or_default().to_string(),
                    },
                    message: commit.message().unwrap_or_default().to_string(),
                })
            })
            .collect::<GrrResult<Vec<_>>>()?;

        trace!(count = commits.len(), base = %base, "collected local commits");
        Ok(commits)
    }

    fn squash_onto(
        &self,
        main_line: &str,
        branch_name: &str,
        target_branch: &str,
        author: &CommitAuthor,
        message: &str,
    ) -> GrrResult<Oid> {
        let main_commit = main_line_commit(self, main_line)?;
        let branch_commit = self
            .find_branch(branch_name, BranchType::Local)?
            .get()
            .peel_to_commit()?;

        // A stale integration branch from an interrupted run is overwritten.
        self.branch(target_branch, &main_commit, true)?;

        let mut index = self.merge_commits(&main_commit, &branch_commit, None)?;
        if index.has_conflicts() {
            return Err(GrrError::SquashConflict {
                branch: branch_name.to_string(),
                main_line: main_line.to_string(),
            });
        }
        let tree = self.find_tree(index.write_tree_to(self)?)?;

        let author = Signature::now(&author.name, &author.email)?;
        let committer = self.signature()?;
        let oid = self.commit(
            Some(format!("refs/heads/{}", target_branch).as_str()),
            &author,
            &committer,
            message,
            &tree,
            &[&main_commit],
        )?;

        debug!(%oid, branch = target_branch, "created squashed commit");
        Ok(oid)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use git2::{Repository, RepositoryInitOptions, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    /// Creates a repository on `master` with one commit and an `origin` remote.
    pub(crate) fn init_repository() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        repo.remote("origin", "git@github.com:acme/widgets.git")
            .unwrap();
        commit_file(&repo, "README", "hello\n", "initial commit");
        (dir, repo)
    }

    /// Writes `contents` to `name` and commits it on `HEAD`, returning the new commit id.
    pub(crate) fn commit_file(
        repo: &Repository,
        name: &str,
        contents: &str,
        message: &str,
    ) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), contents).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let signature = Signature::now("Test User", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parents = parents.iter().collect::<Vec<_>>();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }
}
