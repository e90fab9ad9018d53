//! The CLI for `grr`.

use crate::{
    config::GrrConfig,
    ctx::GrrContext,
    errors::GrrError,
    subcommands::{DeleteCmd, ListCmd, SyncCmd},
};
use anyhow::{anyhow, Result};
use clap::{
    builder::styling::{AnsiColor, Color, Style},
    ArgAction, Parser,
};
use std::path::PathBuf;
use tracing::{debug, Level};

const ABOUT: &str =
    "grr keeps one Gerrit CR per issue branch in sync with the branch's commits and issues.";

/// The CLI application for `grr`.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
#[command(about = ABOUT, version, styles = cli_styles())]
pub struct Cli {
    /// Verbosity level (0-4)
    #[arg(short, action = ArgAction::Count)]
    pub v: u8,
    /// Path to the configuration file
    #[arg(long, env = "GRR_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Remove the current issue branch and its metadata, then return to the main line
    #[arg(
        short = 'D',
        long = "delete",
        conflicts_with_all = ["list", "issue", "extra_issues", "add", "remove", "parenthetical", "update"]
    )]
    pub delete: bool,
    /// Skip the confirmation prompt of `-D`
    #[arg(short = 'y', long = "yes", requires = "delete")]
    pub yes: bool,
    /// List the open CRs of the repository
    #[arg(
        short = 'L',
        long = "list",
        conflicts_with_all = ["issue", "extra_issues", "add", "remove", "parenthetical", "update"]
    )]
    pub list: bool,
    #[command(flatten)]
    pub sync: SyncCmd,
}

impl Cli {
    /// Run the CLI application with the given arguments.
    pub async fn run(self) -> Result<()> {
        let repo = crate::git::active_repository().ok_or(GrrError::NotInRepository)?;
        let config_path = self.config.unwrap_or_else(GrrConfig::default_path);
        let config = GrrConfig::load(&config_path)?;
        let ctx = GrrContext::new(&repo, config);

        if self.delete {
            DeleteCmd::new(self.yes).run(ctx)
        } else if self.list {
            ListCmd.run(ctx)
        } else {
            self.sync.run(ctx).await
        }
    }

    /// Initializes the tracing subscriber
    ///
    /// # Returns
    /// - `Result<()>` - Ok if successful, Err otherwise.
    pub(crate) fn init_tracing_subscriber(self) -> Result<Self> {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(match self.v {
                0 => Level::ERROR,
                1 => Level::WARN,
                2 => Level::INFO,
                3 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .finish();

        tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))?;

        Ok(self)
    }
}

/// Prints `err` to stderr as `grr: error: <message>`. With `verbose`, every underlying cause
/// follows on its own line.
pub(crate) fn report_error(err: &anyhow::Error, verbose: bool) {
    if let Some(e) = err.downcast_ref::<GrrError>() {
        debug!(category = ?e.category(), "grr failed");
    }
    eprintln!(
        "{} {}",
        nu_ansi_term::Color::Red.bold().paint("grr: error:"),
        err
    );
    if verbose {
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
    }
}

/// The process exit code for `err`.
pub(crate) fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<GrrError>()
        .map_or(1, GrrError::exit_code)
}

/// Styles for the CLI application.
const fn cli_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

#[cfg(test)]
mod test {
    use super::{exit_code, Cli};
    use crate::errors::GrrError;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_arguments() {
        let cli = Cli::try_parse_from([
            "grr", "-vv", "FOO-1", "FOO-2", "-a", "FOO-3,widgets#4", "-a", "5", "-r", "FOO-9", "-p",
            "wip", "-u",
        ])
        .unwrap();
        assert_eq!(cli.v, 2);
        assert!(!cli.delete && !cli.list);
        assert_eq!(cli.sync.issue.as_deref(), Some("FOO-1"));
        assert_eq!(cli.sync.extra_issues, vec!["FOO-2"]);
        assert_eq!(cli.sync.add, vec!["FOO-3", "widgets#4", "5"]);
        assert_eq!(cli.sync.remove, vec!["FOO-9"]);
        assert_eq!(cli.sync.parenthetical.as_deref(), Some("wip"));
        assert!(cli.sync.update);
    }

    #[test]
    fn teardown_and_listing_take_no_issue() {
        let cli = Cli::try_parse_from(["grr", "-D", "-y"]).unwrap();
        assert!(cli.delete && cli.yes);
        assert!(Cli::try_parse_from(["grr", "-L"]).unwrap().list);

        assert!(Cli::try_parse_from(["grr", "-D", "FOO-1"]).is_err());
        assert!(Cli::try_parse_from(["grr", "-L", "-u"]).is_err());
        assert!(Cli::try_parse_from(["grr", "-y"]).is_err());
    }

    #[test]
    fn exit_code_comes_from_failing_tool() {
        let err = anyhow::Error::new(GrrError::ExternalTool {
            command: "git push".to_string(),
            code: 128,
            stderr: String::new(),
        });
        assert_eq!(exit_code(&err), 128);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
