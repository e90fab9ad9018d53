//! [ReviewBackend] implementation for Gerrit, spoken to over its SSH command interface.

use super::{ChangeRequest, ReviewBackend};
use crate::{
    errors::{GrrError, GrrResult},
    process,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A Gerrit server reached through `ssh -p <port> [<user>@]<host> gerrit ...`.
#[derive(Debug, Clone)]
pub struct GerritClient {
    host: String,
    port: u16,
    username: Option<String>,
    /// The working directory pushes are run from.
    workdir: PathBuf,
    /// The remote pushes are sent to.
    remote_name: String,
}

impl GerritClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        workdir: impl Into<PathBuf>,
        remote_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            workdir: workdir.into(),
            remote_name: remote_name.into(),
        }
    }

    fn ssh_target(&self) -> String {
        match &self.username {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    fn gerrit(&self, args: &[&str]) -> GrrResult<String> {
        let port = self.port.to_string();
        let target = self.ssh_target();
        let mut ssh_args = vec!["-p", port.as_str(), target.as_str(), "gerrit"];
        ssh_args.extend_from_slice(args);
        Ok(process::run("ssh", &ssh_args, None)?.stdout)
    }

    fn query(&self, args: &[&str]) -> GrrResult<Vec<ChangeRequest>> {
        let mut query_args = vec!["query", "--format=JSON"];
        query_args.extend_from_slice(args);
        parse_query_output(&self.gerrit(&query_args)?)
    }
}

impl ReviewBackend for GerritClient {
    fn probe_username(&self) -> GrrResult<Option<String>> {
        let port = self.port.to_string();
        let output = process::run_unchecked("ssh", &["-G", "-p", &port, &self.host], None)?;
        if !output.success() {
            warn!(stderr = %output.stderr.trim(), "ssh username probe failed");
            return Ok(None);
        }
        Ok(parse_ssh_user(&output.stdout))
    }

    fn set_username(&mut self, username: &str) {
        self.username = Some(username.to_string());
    }

    fn remote_url(&self, repo_name: &str, username: &str) -> String {
        format!("ssh://{}@{}:{}/{}", username, self.host, self.port, repo_name)
    }

    fn review_url(&self, number: u64) -> String {
        format!("https://{}/{}", self.host, number)
    }

    fn query_review(&self, number: u64) -> GrrResult<Option<ChangeRequest>> {
        let change = format!("change:{}", number);
        let mut reviews = self.query(&["--current-patch-set", "--commit-message", &change])?;
        Ok((!reviews.is_empty()).then(|| reviews.remove(0)))
    }

    fn list_open_reviews(&self, repo_name: &str) -> GrrResult<Vec<ChangeRequest>> {
        let project = format!("project:{}", repo_name);
        self.query(&["--current-patch-set", "status:open", &project])
    }

    fn push(&self, local_ref: &str, destination_ref: &str) -> GrrResult<String> {
        let refspec = format!("refs/heads/{}:{}", local_ref, destination_ref);
        debug!(remote = %self.remote_name, %refspec, "pushing");
        let output = process::run(
            "git",
            &["push", &self.remote_name, &refspec],
            Some(self.workdir.as_path()),
        )?;
        Ok(output.stderr)
    }

    fn post_comment(&self, number: u64, patch_set: u64, text: &str) -> GrrResult<()> {
        let target = format!("{},{}", number, patch_set);
        let message = quote_remote_arg(text);
        self.gerrit(&["review", "--message", &message, &target])
            .map(|_| ())
            .map_err(|e| GrrError::CommentPost {
                number,
                reason: e.to_string(),
            })
    }
}

/// Parses the newline-delimited JSON emitted by `gerrit query --format=JSON`, dropping the
/// trailing statistics row.
fn parse_query_output(stdout: &str) -> GrrResult<Vec<ChangeRequest>> {
    let mut reviews = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let row: Value = serde_json::from_str(line)?;
        match row.get("type").and_then(Value::as_str) {
            Some("stats") => continue,
            Some("error") => {
                return Err(GrrError::Backend(
                    row.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or(line)
                        .to_string(),
                ));
            }
            _ => reviews.push(serde_json::from_value(row)?),
        }
    }
    Ok(reviews)
}

/// Reads the `user` line of `ssh -G` output.
fn parse_ssh_user(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("user "))
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(ToOwned::to_owned)
}

/// Quotes an argument for the command line parser on the far side of `ssh`.
fn quote_remote_arg(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
