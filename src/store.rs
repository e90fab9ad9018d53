//! Per-branch metadata persisted in the repository-local git config.
//!
//! Every branch other than the main line owns a `[grr "<branch>"]` section holding the issue it
//! is bound to, its extra issues, cached titles, and the state of its CR. The main line never
//! carries metadata: every accessor silently refuses to read or write it.

use crate::{
    constants::{METADATA_SECTION, USERNAME_CACHE_KEY},
    errors::{GrrError, GrrResult},
    issue::ExtraIssue,
};
use git2::{Config, ConfigLevel, ErrorCode, Repository};
use itertools::Itertools;
use tracing::{debug, trace};

/// The keys stored for each branch.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MetadataKey {
    /// Id of the primary issue.
    Issue,
    /// JSON list of [ExtraIssue]s.
    ExtraIssues,
    /// Cached title of the primary issue.
    Title,
    /// Free-text annotation appended to the title.
    Parenthetical,
    /// Sha of the newest commit included in the last push.
    LastPushedSha,
    /// Number of the CR on the review backend.
    Cr,
}

impl MetadataKey {
    /// The git config variable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::ExtraIssues => "extra-issues",
            Self::Title => "title",
            Self::Parenthetical => "parenthetical",
            Self::LastPushedSha => "last-pushed-sha",
            Self::Cr => "cr",
        }
    }
}

/// Typed access to branch metadata in the repository-local config.
pub struct BranchMetadataStore<'a> {
    repository: &'a Repository,
    main_line: String,
}

impl<'a> BranchMetadataStore<'a> {
    /// Creates a store for `repository` that refuses to touch `main_line`.
    pub fn new(repository: &'a Repository, main_line: impl Into<String>) -> Self {
        Self {
            repository,
            main_line: main_line.into(),
        }
    }

    /// Returns the raw value of `key` for `branch`, or an empty string if unset.
    pub fn get(&self, branch: &str, key: MetadataKey) -> GrrResult<String> {
        if self.is_main_line(branch) {
            return Ok(String::new());
        }
        read_local(self.repository, &config_key(branch, key))
    }

    /// Writes `value` to `key` for `branch` unconditionally.
    pub fn set(&self, branch: &str, key: MetadataKey, value: &str) -> GrrResult<()> {
        if self.is_main_line(branch) {
            debug!(branch, key = key.as_str(), "refusing to write metadata on the main line");
            return Ok(());
        }
        let name = config_key(branch, key);
        trace!(key = %name, value, "writing metadata");
        self.local_config()?
            .set_str(&name, value)
            .map_err(|source| GrrError::ConfigAccess { key: name, source })
    }

    /// Writes `value` to `key` only if it differs from the stored value.
    ///
    /// ## Returns
    /// - `Ok(true)` - The value changed and was written.
    /// - `Ok(false)` - The stored value was already equal.
    pub fn set_if_changed(&self, branch: &str, key: MetadataKey, value: &str) -> GrrResult<bool> {
        if self.get(branch, key)? == value {
            return Ok(false);
        }
        self.set(branch, key, value)?;
        Ok(true)
    }

    /// Deletes every entry of the `grr.<branch>` section, including keys this version does not
    /// know. Succeeds if there are none.
    pub fn remove_all(&self, branch: &str) -> GrrResult<()> {
        if self.is_main_line(branch) {
            return Ok(());
        }
        let mut config = self.local_config()?;
        let access_error = |source: git2::Error| GrrError::ConfigAccess {
            key: format!("{}.{}", METADATA_SECTION, branch),
            source,
        };

        let prefix = format!("{}.{}.", METADATA_SECTION, branch);
        let mut names = Vec::new();
        {
            let glob = format!("^{}\\.", METADATA_SECTION);
            let mut entries = config.entries(Some(&glob)).map_err(access_error)?;
            while let Some(entry) = entries.next() {
                let entry = entry.map_err(access_error)?;
                let Some(name) = entry.name() else { continue };
                // `grr.<branch>.x.key` belongs to the branch `<branch>.x`.
                if name
                    .strip_prefix(&prefix)
                    .is_some_and(|variable| !variable.contains('.'))
                {
                    names.push(name.to_string());
                }
            }
        }

        for name in names.into_iter().unique() {
            match config.remove_multivar(&name, ".*") {
                Ok(()) => trace!(key = %name, "removed metadata"),
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(source) => return Err(GrrError::ConfigAccess { key: name, source }),
            }
        }
        debug!(branch, "removed branch metadata");
        Ok(())
    }

    /// The primary issue id bound to `branch`, if any.
    pub fn issue(&self, branch: &str) -> GrrResult<Option<String>> {
        self.get(branch, MetadataKey::Issue).map(non_empty)
    }

    /// The extra issues attached to `branch`, in insertion order.
    pub fn extra_issues(&self, branch: &str) -> GrrResult<Vec<ExtraIssue>> {
        let raw = self.get(branch, MetadataKey::ExtraIssues)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persists the extra issues of `branch`, if they changed.
    pub fn set_extra_issues(&self, branch: &str, extra_issues: &[ExtraIssue]) -> GrrResult<bool> {
        let raw = if extra_issues.is_empty() {
            String::new()
        } else {
            serde_json::to_string(extra_issues)?
        };
        self.set_if_changed(branch, MetadataKey::ExtraIssues, &raw)
    }

    /// The cached title of the primary issue.
    pub fn title(&self, branch: &str) -> GrrResult<Option<String>> {
        self.get(branch, MetadataKey::Title).map(non_empty)
    }

    /// The annotation appended to the title.
    pub fn parenthetical(&self, branch: &str) -> GrrResult<Option<String>> {
        self.get(branch, MetadataKey::Parenthetical).map(non_empty)
    }

    /// The sha of the newest commit included in the last push.
    pub fn last_pushed_sha(&self, branch: &str) -> GrrResult<Option<String>> {
        self.get(branch, MetadataKey::LastPushedSha).map(non_empty)
    }

    /// Records the newest pushed commit.
    pub fn set_last_pushed_sha(&self, branch: &str, sha: &str) -> GrrResult<bool> {
        self.set_if_changed(branch, MetadataKey::LastPushedSha, sha)
    }

    /// The CR number of `branch`, if one was created.
    pub fn cr(&self, branch: &str) -> GrrResult<Option<u64>> {
        Ok(self
            .get(branch, MetadataKey::Cr)?
            .trim()
            .parse::<u64>()
            .ok())
    }

    /// Records the CR number of `branch`.
    pub fn set_cr(&self, branch: &str, number: u64) -> GrrResult<bool> {
        self.set_if_changed(branch, MetadataKey::Cr, &number.to_string())
    }

    /// The review username cached by a previous probe. Not branch scoped.
    pub fn cached_username(&self) -> GrrResult<Option<String>> {
        read_local(self.repository, USERNAME_CACHE_KEY).map(non_empty)
    }

    /// Caches a probed review username.
    pub fn cache_username(&self, username: &str) -> GrrResult<()> {
        self.local_config()?
            .set_str(USERNAME_CACHE_KEY, username)
            .map_err(|source| GrrError::ConfigAccess {
                key: USERNAME_CACHE_KEY.to_string(),
                source,
            })
    }

    fn is_main_line(&self, branch: &str) -> bool {
        branch == self.main_line
    }

    fn local_config(&self) -> GrrResult<Config> {
        self.repository
            .config()
            .and_then(|c| c.open_level(ConfigLevel::Local))
            .map_err(|source| GrrError::ConfigAccess {
                key: METADATA_SECTION.to_string(),
                source,
            })
    }
}

fn config_key(branch: &str, key: MetadataKey) -> String {
    format!("{}.{}.{}", METADATA_SECTION, branch, key.as_str())
}

/// Reads a key from the local config, mapping "not found" to an empty string and every other
/// failure to [GrrError::ConfigAccess].
fn read_local(repository: &Repository, name: &str) -> GrrResult<String> {
    let result = repository
        .config()
        .and_then(|c| c.open_level(ConfigLevel::Local))
        .and_then(|c| c.get_string(name));
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(String::new()),
        Err(source) => Err(GrrError::ConfigAccess {
            key: name.to_string(),
            source,
        }),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
