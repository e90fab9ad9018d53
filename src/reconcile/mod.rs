//! The CR reconciliation engine.
//!
//! A reconciliation brings the CR of an issue branch in sync with the branch's local commits and
//! metadata. It runs as a sequence of stages; each stage reads what earlier stages produced and
//! any failure aborts the remaining ones. Only the integration branch cleanup after a squash is
//! attempted unconditionally.

use crate::{
    constants::{INTEGRATION_BRANCH, REVIEW_REMOTE_NAME},
    ctx::GrrContext,
    errors::{GrrError, GrrResult},
    git::{LocalCommit, RepoIdentity, RepositoryExt},
    issue::{ExtraIssue, IssueRef, IssueTracker},
    review::{parse_created_review_number, ChangeRequest, ReviewBackend},
    store::MetadataKey,
};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

mod message;
mod outcome;
mod plan;

use message::commit_message;
pub use outcome::SyncOutcome;
pub use plan::{commits_to_push, decide_action, Action};

/// The inputs of a reconciliation.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SyncRequest {
    /// The primary issue, as typed by the user.
    pub issue: Option<String>,
    /// Extra issues to attach. Attaching one that is already attached is an error.
    pub add_extra_issues: Vec<String>,
    /// Extra issues that must be attached. Ones already attached are left alone, so repeating
    /// the same invocation is harmless.
    pub ensure_extra_issues: Vec<String>,
    /// Extra issues to detach.
    pub remove_extra_issues: Vec<String>,
    /// Annotation for the title line. `Some("")` clears it.
    pub parenthetical: Option<String>,
    /// Re-fetch cached titles.
    pub update: bool,
}

/// Where the invocation started.
struct Identity {
    repo: RepoIdentity,
    branch: String,
    on_main_line: bool,
    requested: Option<IssueRef>,
}

/// The issue-side state that is persisted to the branch and feeds the commit message.
struct IssueState {
    primary: IssueRef,
    extra_issues: Vec<ExtraIssue>,
    title: String,
    parenthetical: Option<String>,
}

/// Drives a reconciliation against a [ReviewBackend] and an [IssueTracker].
pub struct Reconciler<'c, 'a, B, T> {
    ctx: &'c GrrContext<'a>,
    backend: B,
    tracker: T,
}

impl<'c, 'a, B: ReviewBackend, T: IssueTracker> Reconciler<'c, 'a, B, T> {
    pub fn new(ctx: &'c GrrContext<'a>, backend: B, tracker: T) -> Self {
        Self {
            ctx,
            backend,
            tracker,
        }
    }

    /// Gives back the backend and tracker.
    pub fn into_parts(self) -> (B, T) {
        (self.backend, self.tracker)
    }

    /// Creates or updates the CR for the current issue branch.
    pub async fn sync(&mut self, request: SyncRequest) -> GrrResult<SyncOutcome> {
        let identity = self.resolve_identity(&request)?;
        let primary = self.reconcile_primary(&identity)?;
        let extra_issues = self
            .reconcile_extra_issues(&identity, &primary, &request)
            .await?;
        self.ensure_remote_wiring(&identity.repo)?;
        let title = self
            .resolve_title(&identity.branch, &primary, request.update)
            .await?;

        let entry = self.ctx.ensure_on_issue_branch(&primary)?;
        let branch = entry.name.clone();
        let parenthetical = match request.parenthetical {
            Some(parenthetical) => Some(parenthetical),
            None => self.ctx.store.parenthetical(&branch)?,
        };
        let issues = IssueState {
            primary,
            extra_issues,
            title,
            parenthetical,
        };
        self.persist_metadata(&branch, &issues)?;

        let commits = self.ctx.repository.local_commits(self.ctx.main_line())?;
        debug!(count = commits.len(), "read local commits");
        let cr = self.ctx.store.cr(&branch)?;
        let review = cr
            .map(|number| self.backend.current_review(number, &identity.repo.name))
            .transpose()?;

        let approvals = review
            .as_ref()
            .map(|r| r.current_patch_set.approvals.as_slice())
            .unwrap_or_default();
        let message = commit_message(
            &issues.primary,
            &issues.title,
            issues.parenthetical.as_deref(),
            &issues.extra_issues,
            approvals,
        );

        let last_pushed_sha = self.ctx.store.last_pushed_sha(&branch)?;
        let new_commits = commits_to_push(&commits, last_pushed_sha.as_deref());
        let action = decide_action(
            !new_commits.is_empty(),
            !commits.is_empty(),
            review.as_ref(),
            &message,
        );
        info!(%action, new_commits = new_commits.len(), "decided action");

        let mut outcome = SyncOutcome {
            action,
            primary: issues.primary.clone(),
            title: issues.title.clone(),
            extra_issues: issues.extra_issues.clone(),
            branch: branch.clone(),
            branch_created: entry.created,
            review_number: cr,
            review_url: cr.map(|n| self.backend.review_url(n)),
            patch_set: review.as_ref().map(|r| r.current_patch_set.number),
            pushed_commits: new_commits.iter().map(|c| (*c).clone()).collect(),
            cleanup_error: None,
        };
        if action == Action::None {
            return Ok(outcome);
        }

        let newest = commits
            .last()
            .ok_or_else(|| GrrError::Backend("no commits to push".to_string()))?;
        let destination = match cr {
            Some(number) => format!("refs/changes/{}", number),
            None => format!("refs/for/{}", self.ctx.main_line()),
        };
        let (stderr, cleanup_error) = self.squash_and_push(&branch, newest, &message, &destination)?;
        outcome.cleanup_error = cleanup_error;

        let number = match cr {
            Some(number) => number,
            None => {
                let number = parse_created_review_number(&stderr)
                    .ok_or_else(|| GrrError::ReviewNumberNotParsed(stderr.clone()))?;
                self.ctx.store.set_cr(&branch, number)?;
                info!(number, "created CR");
                number
            }
        };
        if action.pushes_commits() {
            self.ctx.store.set_last_pushed_sha(&branch, &newest.sha)?;
        }

        let review = self
            .backend
            .current_review(number, &identity.repo.name)?;
        outcome.review_number = Some(number);
        outcome.review_url = Some(self.backend.review_url(number));
        outcome.patch_set = Some(review.current_patch_set.number);

        if action.pushes_commits() {
            self.backend.post_comment(
                number,
                review.current_patch_set.number,
                &push_comment(&new_commits),
            )?;
        }

        Ok(outcome)
    }

    /// Lists the open CRs of the repository.
    pub fn list_open_reviews(&mut self) -> GrrResult<Vec<ChangeRequest>> {
        let repo = self.ctx.repo_identity()?;
        let username = self.find_username()?;
        self.backend.set_username(&username);
        self.backend.list_open_reviews(&repo.name)
    }

    /// The browser URL of CR `number`.
    pub fn review_url(&self, number: u64) -> String {
        self.backend.review_url(number)
    }

    fn resolve_identity(&self, request: &SyncRequest) -> GrrResult<Identity> {
        let repo = self.ctx.repo_identity()?;
        let branch = self.ctx.current_branch()?;
        let on_main_line = branch == self.ctx.main_line();
        let requested = request
            .issue
            .as_deref()
            .map(|raw| IssueRef::resolve(raw, &repo.name))
            .transpose()?;
        debug!(repo = %repo.name, %branch, ?requested, "resolved identity");

        Ok(Identity {
            repo,
            branch,
            on_main_line,
            requested,
        })
    }

    /// The primary issue of a branch never changes once bound.
    fn reconcile_primary(&self, identity: &Identity) -> GrrResult<IssueRef> {
        let cached = self
            .ctx
            .store
            .issue(&identity.branch)?
            .map(|id| IssueRef::from_cached_id(&id, &identity.repo.name));

        match (cached, identity.requested.clone()) {
            (Some(cached), Some(requested)) if cached != requested => Err(GrrError::IssueConflict {
                cached: cached.name,
                requested: requested.name,
            }),
            (None, None) => Err(GrrError::MissingIssue {
                on_main_line: identity.on_main_line,
            }),
            (Some(cached), None) => Ok(cached),
            (_, Some(requested)) => Ok(requested),
        }
    }

    async fn reconcile_extra_issues(
        &self,
        identity: &Identity,
        primary: &IssueRef,
        request: &SyncRequest,
    ) -> GrrResult<Vec<ExtraIssue>> {
        let mut extra_issues = self.ctx.store.extra_issues(&identity.branch)?;

        for raw in &request.remove_extra_issues {
            let issue = IssueRef::resolve(raw, &identity.repo.name)?;
            if &issue == primary {
                return Err(GrrError::CannotRemoveMainIssue(issue.name));
            }
            let before = extra_issues.len();
            extra_issues.retain(|extra| extra.issue != issue);
            if extra_issues.len() == before {
                debug!(issue = %issue, "extra issue was not attached");
            }
        }

        for raw in &request.add_extra_issues {
            let issue = IssueRef::resolve(raw, &identity.repo.name)?;
            if &issue == primary {
                return Err(GrrError::CannotAddMainIssueAsExtra(issue.name));
            }
            if extra_issues.iter().any(|extra| extra.issue == issue) {
                return Err(GrrError::DuplicateExtraIssue(issue.name));
            }
            extra_issues.push(ExtraIssue::new(issue));
        }

        for raw in &request.ensure_extra_issues {
            let issue = IssueRef::resolve(raw, &identity.repo.name)?;
            if &issue == primary {
                return Err(GrrError::CannotAddMainIssueAsExtra(issue.name));
            }
            if extra_issues.iter().any(|extra| extra.issue == issue) {
                debug!(issue = %issue, "extra issue already attached");
                continue;
            }
            extra_issues.push(ExtraIssue::new(issue));
        }

        let tracker = &self.tracker;
        let stale = extra_issues
            .iter_mut()
            .filter(|extra| request.update || extra.title.is_none())
            .collect::<Vec<_>>();
        let titles = try_join_all(stale.iter().map(|extra| tracker.fetch_title(&extra.issue))).await?;
        for (extra, title) in stale.into_iter().zip(titles) {
            extra.title = Some(title);
        }

        Ok(extra_issues)
    }

    /// Makes sure the review remote exists and points at this repository for this user.
    fn ensure_remote_wiring(&mut self, repo: &RepoIdentity) -> GrrResult<()> {
        let username = self.find_username()?;
        self.backend.set_username(&username);
        let url = self.backend.remote_url(&repo.name, &username);
        self.ctx.repository.ensure_remote(REVIEW_REMOTE_NAME, &url)
    }

    /// Discovers the review username from the config file, then the cache, then a probe.
    fn find_username(&self) -> GrrResult<String> {
        if let Some(username) = self.ctx.config.gerrit_username() {
            return Ok(username.to_string());
        }
        if let Some(username) = self.ctx.store.cached_username()? {
            return Ok(username);
        }
        match self.backend.probe_username()? {
            Some(username) => {
                debug!(%username, "caching probed username");
                self.ctx.store.cache_username(&username)?;
                Ok(username)
            }
            None => Err(GrrError::UsernameUnknown(
                self.ctx.config.path.display().to_string(),
            )),
        }
    }

    async fn resolve_title(&self, branch: &str, primary: &IssueRef, update: bool) -> GrrResult<String> {
        if !update {
            if let Some(title) = self.ctx.store.title(branch)? {
                return Ok(title);
            }
        }
        self.tracker.fetch_title(primary).await
    }

    /// Writes the fields that changed.
    fn persist_metadata(&self, branch: &str, issues: &IssueState) -> GrrResult<()> {
        let store = &self.ctx.store;
        let mut changed = Vec::new();
        if store.set_if_changed(branch, MetadataKey::Issue, &issues.primary.id)? {
            changed.push(MetadataKey::Issue);
        }
        if store.set_extra_issues(branch, &issues.extra_issues)? {
            changed.push(MetadataKey::ExtraIssues);
        }
        if store.set_if_changed(branch, MetadataKey::Title, &issues.title)? {
            changed.push(MetadataKey::Title);
        }
        if let Some(parenthetical) = &issues.parenthetical {
            if store.set_if_changed(branch, MetadataKey::Parenthetical, parenthetical)? {
                changed.push(MetadataKey::Parenthetical);
            }
        }
        debug!(?changed, "persisted metadata");
        Ok(())
    }

    /// Squashes the branch onto the main line and pushes it to `destination`. The integration
    /// branch is removed whatever happens.
    ///
    /// ## Returns
    /// - `Ok((stderr, None))` - Pushed and cleaned up.
    /// - `Ok((stderr, Some(_)))` - Pushed, but cleanup failed.
    /// - `Err(_)` - The squash or push failed. A cleanup failure is logged, not returned.
    fn squash_and_push(
        &self,
        branch: &str,
        newest: &LocalCommit,
        message: &str,
        destination: &str,
    ) -> GrrResult<(String, Option<GrrError>)> {
        let pushed = self
            .ctx
            .repository
            .squash_onto(
                self.ctx.main_line(),
                branch,
                INTEGRATION_BRANCH,
                &newest.author,
                message,
            )
            .and_then(|_| self.backend.push(INTEGRATION_BRANCH, destination));
        let cleanup = self.cleanup_integration_branch(branch);

        match (pushed, cleanup) {
            (Ok(stderr), Ok(())) => Ok((stderr, None)),
            (Ok(stderr), Err(e)) => Ok((stderr, Some(GrrError::Cleanup(Box::new(e))))),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(error = %cleanup, "cleanup after failed push also failed");
                Err(e)
            }
        }
    }

    fn cleanup_integration_branch(&self, branch: &str) -> GrrResult<()> {
        let repository = self.ctx.repository;
        if repository.current_branch_name()? != branch {
            repository.checkout_branch(branch)?;
        }
        if repository.branch_exists(INTEGRATION_BRANCH)? {
            repository.force_delete_branch(INTEGRATION_BRANCH)?;
        }
        Ok(())
    }
}

/// The comment posted after new commits are pushed.
fn push_comment(new_commits: &[&LocalCommit]) -> String {
    let mut comment = format!("grr pushed {} new commit(s):\n", new_commits.len());
    for commit in new_commits {
        comment.push_str(&format!(
            "\n{} {}",
            &commit.sha[..commit.sha.len().min(10)],
            commit.summary()
        ));
    }
    comment
}
