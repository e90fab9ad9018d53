//! The remote review backend: CR records, and the [ReviewBackend] seam used by the
//! reconciliation engine.

use crate::errors::{GrrError, GrrResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

mod gerrit;
pub use gerrit::GerritClient;

static CREATED_REVIEW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^remote:\s+https?://[^\s]*?/([0-9]+)(?:\s|$)").expect("valid regex")
});

/// Extracts the number of a newly created CR from the output of a push to `refs/for/*`.
///
/// The backend announces new CRs with a line of the form
/// `remote:   https://<host>/<number> <subject>`.
pub fn parse_created_review_number(text: &str) -> Option<u64> {
    CREATED_REVIEW
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// A review account.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub username: String,
}

/// The kind of vote an [Approval] is.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ApprovalKind {
    /// A code review vote (`Code-Review`).
    Review,
    /// An integration approval (`Integration-Approval`).
    Integration,
}

/// A vote recorded against a patch set.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Approval {
    /// The label name, e.g. `Code-Review`.
    #[serde(rename = "type")]
    pub label: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub value: i64,
    #[serde(default)]
    pub by: Account,
}

impl Approval {
    /// The kind of vote, or [None] for labels that do not produce trailers.
    pub fn kind(&self) -> Option<ApprovalKind> {
        match self.label.as_str() {
            "Code-Review" | "CRVW" => Some(ApprovalKind::Review),
            "Integration-Approval" | "INTG" => Some(ApprovalKind::Integration),
            // `Verified` is cast by CI and never credits anyone.
            _ => None,
        }
    }
}

/// One revision of a CR.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatchSet {
    #[serde(deserialize_with = "lenient_u64")]
    pub number: u64,
    pub revision: String,
    pub approvals: Vec<Approval>,
}

/// A review record on the backend.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeRequest {
    #[serde(deserialize_with = "lenient_u64")]
    pub number: u64,
    pub project: String,
    pub subject: String,
    pub url: String,
    pub status: String,
    pub owner: Account,
    pub current_patch_set: PatchSet,
    pub commit_message: String,
}

/// The operations the reconciliation engine needs from the review backend.
pub trait ReviewBackend {
    /// Asks the backend's transport which username it would log in as.
    fn probe_username(&self) -> GrrResult<Option<String>>;

    /// Sets the username used for subsequent requests.
    fn set_username(&mut self, username: &str);

    /// The push URL of `repo_name` for `username`.
    fn remote_url(&self, repo_name: &str, username: &str) -> String;

    /// The browser URL of CR `number`.
    fn review_url(&self, number: u64) -> String;

    /// Queries CR `number`, returning [None] if the backend has no such CR.
    fn query_review(&self, number: u64) -> GrrResult<Option<ChangeRequest>>;

    /// Lists the open CRs of `repo_name`.
    fn list_open_reviews(&self, repo_name: &str) -> GrrResult<Vec<ChangeRequest>>;

    /// Pushes `local_ref` to `destination_ref` on the review remote, returning the push's stderr.
    fn push(&self, local_ref: &str, destination_ref: &str) -> GrrResult<String>;

    /// Comments on patch set `patch_set` of CR `number`.
    fn post_comment(&self, number: u64, patch_set: u64, text: &str) -> GrrResult<()>;

    /// Queries CR `number` and checks that the backend answered for `repo_name` and `number`.
    ///
    /// ## Returns
    /// - `Ok(ChangeRequest)` - The validated CR.
    /// - `Err(GrrError::ReviewNotFound)` - No such CR.
    /// - `Err(GrrError::ReviewMismatch)` - The backend answered with a different CR or project.
    fn current_review(&self, number: u64, repo_name: &str) -> GrrResult<ChangeRequest> {
        let review = self
            .query_review(number)?
            .ok_or(GrrError::ReviewNotFound(number))?;
        if review.number != number || review.project != repo_name {
            return Err(GrrError::ReviewMismatch {
                expected_number: number,
                expected_project: repo_name.to_string(),
                found_number: review.number,
                found_project: review.project,
            });
        }
        Ok(review)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

/// Older backends encode numbers as JSON strings.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = lenient_i64(deserializer)?;
    u64::try_from(value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod test {
    use super::{
        parse_created_review_number, Approval, ApprovalKind, ChangeRequest, ReviewBackend,
    };
    use crate::errors::{GrrError, GrrResult};

    /// Answers every query with the same canned CR.
    struct StubBackend(Option<ChangeRequest>);

    impl ReviewBackend for StubBackend {
        fn probe_username(&self) -> GrrResult<Option<String>> {
            Ok(None)
        }

        fn set_username(&mut self, _: &str) {}

        fn remote_url(&self, repo_name: &str, username: &str) -> String {
            format!("ssh://{}@review.example.com:29418/{}", username, repo_name)
        }

        fn review_url(&self, number: u64) -> String {
            format!("https://review.example.com/{}", number)
        }

        fn query_review(&self, _: u64) -> GrrResult<Option<ChangeRequest>> {
            Ok(self.0.clone())
        }

        fn list_open_reviews(&self, _: &str) -> GrrResult<Vec<ChangeRequest>> {
            Ok(self.0.iter().cloned().collect())
        }

        fn push(&self, _: &str, _: &str) -> GrrResult<String> {
            Ok(String::new())
        }

        fn post_comment(&self, _: u64, _: u64, _: &str) -> GrrResult<()> {
            Ok(())
        }
    }

    fn review(number: u64, project: &str) -> ChangeRequest {
        ChangeRequest {
            number,
            project: project.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn current_review_accepts_matching_answer() {
        let backend = StubBackend(Some(review(42, "widgets")));
        assert_eq!(backend.current_review(42, "widgets").unwrap().number, 42);
    }

    #[test]
    fn current_review_rejects_missing_review() {
        assert!(matches!(
            StubBackend(None).current_review(42, "widgets"),
            Err(GrrError::ReviewNotFound(42))
        ));
    }

    #[test]
    fn current_review_rejects_other_number() {
        let backend = StubBackend(Some(review(43, "widgets")));
        assert!(matches!(
            backend.current_review(42, "widgets"),
            Err(GrrError::ReviewMismatch {
                expected_number: 42,
                found_number: 43,
                ..
            })
        ));
    }

    #[test]
    fn current_review_rejects_other_project() {
        let backend = StubBackend(Some(review(42, "gadgets")));
        match backend.current_review(42, "widgets") {
            Err(GrrError::ReviewMismatch {
                expected_project,
                found_project,
                ..
            }) => {
                assert_eq!(expected_project, "widgets");
                assert_eq!(found_project, "gadgets");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn parses_new_change_line() {
        let stderr = "remote: Processing changes: new: 1, refs: 1, done    \n\
                      remote: \n\
                      remote: New Changes:\n\
                      remote:   https://review.example.com/42 FOO-1 fix thing\n\
                      remote: \n\
                      To ssh://jdoe@review.example.com:29418/widgets\n \
                      * [new branch]      grr-integration -> refs/for/master\n";
        assert_eq!(parse_created_review_number(stderr), Some(42));
    }

    #[test]
    fn parses_project_scoped_change_url() {
        let stderr = "remote: SUCCESS\nremote:\n\
                      remote:   https://review.example.com/c/widgets/+/1337 FOO-1 fix thing [NEW]\n";
        assert_eq!(parse_created_review_number(stderr), Some(1337));
    }

    #[test]
    fn parses_url_at_end_of_line_with_port() {
        assert_eq!(
            parse_created_review_number("remote:   http://review.example.com:8080/7\n"),
            Some(7)
        );
    }

    #[test]
    fn ignores_output_without_new_change() {
        assert_eq!(parse_created_review_number(""), None);
        assert_eq!(
            parse_created_review_number(
                "remote: Processing changes: refs: 1, done\nremote: error: no new changes\n"
            ),
            None
        );
        assert_eq!(
            parse_created_review_number("To ssh://review.example.com:29418/widgets\n"),
            None
        );
    }

    #[test]
    fn approval_kinds() {
        let approval = |label: &str| Approval {
            label: label.to_string(),
            value: 1,
            by: Default::default(),
        };
        assert_eq!(approval("Code-Review").kind(), Some(ApprovalKind::Review));
        assert_eq!(approval("CRVW").kind(), Some(ApprovalKind::Review));
        assert_eq!(
            approval("Integration-Approval").kind(),
            Some(ApprovalKind::Integration)
        );
        assert_eq!(approval("INTG").kind(), Some(ApprovalKind::Integration));
        assert_eq!(approval("Verified").kind(), None);
        assert_eq!(approval("Workflow").kind(), None);
    }

    #[test]
    fn deserializes_string_encoded_numbers() {
        let review: ChangeRequest = serde_json::from_str(
            r#"{"number":"42","project":"widgets","currentPatchSet":{"number":"3",
                "approvals":[{"type":"CRVW","value":"-1","by":{"name":"A"}}]}}"#,
        )
        .unwrap();
        assert_eq!(review.number, 42);
        assert_eq!(review.current_patch_set.number, 3);
        assert_eq!(review.current_patch_set.approvals[0].value, -1);
    }
}
