//! Computation of the squashed commit message.

use crate::{
    issue::{ExtraIssue, IssueRef},
    review::{Approval, ApprovalKind},
};
use itertools::Itertools;

/// Builds the commit message for the squashed commit.
///
/// The first line is `<primary-name> <primary-title>`, optionally followed by
/// ` (<parenthetical>)`. Each extra issue adds a `<name> <title>` line, and each positive
/// review or integration vote on the current patch set adds a `Reviewed by:` or `Approved by:`
/// trailer.
pub fn commit_message(
    primary: &IssueRef,
    title: &str,
    parenthetical: Option<&str>,
    extra_issues: &[ExtraIssue],
    approvals: &[Approval],
) -> String {
    let mut lines = Vec::with_capacity(1 + extra_issues.len() + approvals.len());

    let mut summary = format!("{} {}", primary.name, title);
    if let Some(parenthetical) = parenthetical.filter(|p| !p.trim().is_empty()) {
        summary.push_str(&format!(" ({})", parenthetical.trim()));
    }
    lines.push(summary);

    lines.extend(extra_issues.iter().map(|extra| {
        format!(
            "{} {}",
            extra.issue.name,
            extra.title.as_deref().unwrap_or_default()
        )
        .trim_end()
        .to_string()
    }));

    lines.extend(trailers(approvals));
    lines.join("\n")
}

/// Credits every positive vote. Rejections and neutral votes never produce a trailer.
fn trailers(approvals: &[Approval]) -> impl Iterator<Item = String> + '_ {
    approvals
        .iter()
        .filter(|approval| approval.value > 0)
        .filter_map(|approval| {
            let prefix = match approval.kind()? {
                ApprovalKind::Review => "Reviewed by",
                ApprovalKind::Integration => "Approved by",
            };
            Some(format!(
                "{}: {} <{}>",
                prefix, approval.by.name, approval.by.email
            ))
        })
        .unique()
}

/// Normalizes a commit message for comparison: drops `Change-Id:` trailers added by the backend,
/// trailing whitespace, and surrounding blank lines.
pub fn normalize_message(message: &str) -> String {
    message
        .lines()
        .filter(|line| !line.starts_with("Change-Id:"))
        .map(str::trim_end)
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod test {
    use super::{commit_message, normalize_message};
    use crate::{
        issue::{ExtraIssue, IssueKind, IssueRef},
        review::{Account, Approval},
    };

    fn approval(label: &str, value: i64, name: &str, email: &str) -> Approval {
        Approval {
            label: label.to_string(),
            value,
            by: Account {
                name: name.to_string(),
                email: email.to_string(),
                username: String::new(),
            },
        }
    }

    fn primary() -> IssueRef {
        IssueRef::new(IssueKind::Jira, "FOO-1", "FOO-1")
    }

    #[test]
    fn summary_only() {
        assert_eq!(
            commit_message(&primary(), "fix thing", None, &[], &[]),
            "FOO-1 fix thing"
        );
    }

    #[test]
    fn parenthetical_and_extra_issues() {
        let extras = vec![
            ExtraIssue {
                issue: IssueRef::new(IssueKind::GitHub, "12", "widgets#12"),
                title: Some("crash on start".to_string()),
            },
            ExtraIssue {
                issue: IssueRef::new(IssueKind::Jira, "FOO-2", "FOO-2"),
                title: Some("tidy up".to_string()),
            },
        ];
        assert_eq!(
            commit_message(&primary(), "fix thing", Some("part 2"), &extras, &[]),
            "FOO-1 fix thing (part 2)\nwidgets#12 crash on start\nFOO-2 tidy up"
        );
    }

    #[test]
    fn rejections_never_produce_trailers() {
        let approvals = vec![
            approval("Code-Review", -1, "B", "b@x"),
            approval("Code-Review", 1, "A", "a@x"),
        ];
        let message = commit_message(&primary(), "fix thing", None, &[], &approvals);

        let trailer_lines = message
            .lines()
            .filter(|l| l.starts_with("Reviewed by"))
            .collect::<Vec<_>>();
        assert_eq!(trailer_lines, vec!["Reviewed by: A <a@x>"]);
        assert!(!message.contains("b@x"));
    }

    #[test]
    fn integration_approvals_are_credited() {
        let approvals = vec![
            approval("Integration-Approval", 1, "I", "i@x"),
            approval("Integration-Approval", 0, "Undecided", "undecided@x"),
            approval("Verified", 1, "CI", "ci@x"),
            approval("Workflow", 1, "W", "w@x"),
            approval("Code-Review", 2, "A", "a@x"),
        ];
        assert_eq!(
            commit_message(&primary(), "fix thing", None, &[], &approvals),
            "FOO-1 fix thing\nApproved by: I <i@x>\nReviewed by: A <a@x>"
        );
    }

    #[test]
    fn normalization_ignores_change_id() {
        assert_eq!(
            normalize_message("FOO-1 fix thing\n\nChange-Id: I0123  \n"),
            "FOO-1 fix thing"
        );
        assert_eq!(
            normalize_message("FOO-1 fix thing\nReviewed by: A <a@x>\n"),
            "FOO-1 fix thing\nReviewed by: A <a@x>"
        );
    }
}
