//! Constants for the `grr` application.

/// Name of the user configuration file, relative to `$HOME`.
pub(crate) const GRR_CFG_FILE_NAME: &str = ".grr.toml";

/// The default main line branch.
pub(crate) const DEFAULT_MAIN_LINE: &str = "master";

/// Prefix of every issue branch created by `grr`.
pub(crate) const ISSUE_BRANCH_PREFIX: &str = "grr-";

/// The disposable branch used to squash and push.
pub(crate) const INTEGRATION_BRANCH: &str = "grr-integration";

/// The remote that pushes are sent to.
pub(crate) const REVIEW_REMOTE_NAME: &str = "gerrit";

/// The remote that the repository name is derived from.
pub(crate) const ORIGIN_REMOTE_NAME: &str = "origin";

/// The git config section holding per-branch metadata.
pub(crate) const METADATA_SECTION: &str = "grr";

/// Repository-local cache key for a probed review username.
pub(crate) const USERNAME_CACHE_KEY: &str = "grr.username";

/// Default SSH port of the review backend.
pub(crate) const DEFAULT_REVIEW_PORT: u16 = 29418;

/// Default GitHub API root.
pub(crate) const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// `User-Agent` sent to issue trackers.
pub(crate) const USER_AGENT: &str = concat!("grr/", env!("CARGO_PKG_VERSION"));

/// Marks the CR of the checked out branch in listings.
pub(crate) const FILLED_CIRCLE: char = '●';
pub(crate) const EMPTY_CIRCLE: char = '○';
