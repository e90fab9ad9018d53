//! Contains the formatting logic for listings printed from a [GrrContext].

use super::GrrContext;
use crate::{
    constants::{EMPTY_CIRCLE, FILLED_CIRCLE},
    review::ChangeRequest,
};
use anyhow::Result;
use nu_ansi_term::Color;
use std::fmt::Write;

impl<'a> GrrContext<'a> {
    /// Prints one line per open CR. The CR bound to the checked out branch is marked.
    pub fn print_reviews(
        &self,
        reviews: &[ChangeRequest],
        review_url: impl Fn(u64) -> String,
    ) -> Result<()> {
        let current = match self.on_main_line()? {
            true => None,
            false => self.store.cr(&self.current_branch()?)?,
        };

        let mut buf = String::new();
        write_reviews(&mut buf, reviews, current, review_url)?;
        print!("{}", buf);
        Ok(())
    }
}

/// Writes the listing of `reviews` to `w`, marking the CR numbered `current`.
pub(crate) fn write_reviews<W: Write>(
    w: &mut W,
    reviews: &[ChangeRequest],
    current: Option<u64>,
    review_url: impl Fn(u64) -> String,
) -> std::fmt::Result {
    if reviews.is_empty() {
        return writeln!(w, "No open CRs.");
    }

    for review in reviews {
        let icon = if Some(review.number) == current {
            FILLED_CIRCLE
        } else {
            EMPTY_CIRCLE
        };
        let url = if review.url.is_empty() {
            review_url(review.number)
        } else {
            review.url.clone()
        };
        let owner = match (review.owner.username.is_empty(), review.owner.name.is_empty()) {
            (false, _) => review.owner.username.as_str(),
            (true, false) => review.owner.name.as_str(),
            (true, true) => "unknown",
        };
        writeln!(
            w,
            "{} {} {} {} {}",
            icon,
            Color::Green.bold().paint(review.number.to_string()),
            Color::Cyan.italic().paint(url),
            Color::Blue.paint(format!("[{}]", owner)),
            review.subject
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::write_reviews;
    use crate::review::{Account, ChangeRequest};

    fn review(number: u64, url: &str, username: &str, subject: &str) -> ChangeRequest {
        ChangeRequest {
            number,
            url: url.to_string(),
            subject: subject.to_string(),
            owner: Account {
                username: username.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn lists_every_review_and_marks_current() {
        let reviews = vec![
            review(7, "https://review.example.com/7", "jdoe", "FOO-1 fix thing"),
            review(9, "", "", "widgets#12 docs"),
        ];
        let mut buf = String::new();
        write_reviews(&mut buf, &reviews, Some(9), |n| format!("https://r/{}", n)).unwrap();

        let lines = buf.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('○'));
        assert!(lines[0].contains("https://review.example.com/7"));
        assert!(lines[0].contains("[jdoe]"));
        assert!(lines[0].ends_with("FOO-1 fix thing"));
        assert!(lines[1].starts_with('●'));
        assert!(lines[1].contains("https://r/9"));
        assert!(lines[1].contains("[unknown]"));
    }

    #[test]
    fn empty_listing() {
        let mut buf = String::new();
        write_reviews(&mut buf, &[], None, |n| n.to_string()).unwrap();
        assert_eq!(buf, "No open CRs.\n");
    }
}
