//! The user configuration file for `grr`.

use crate::{
    constants::{DEFAULT_GITHUB_API_URL, DEFAULT_MAIN_LINE, DEFAULT_REVIEW_PORT, GRR_CFG_FILE_NAME},
    errors::{GrrError, GrrResult},
};
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::debug;

const GERRIT_SNIPPET: &str = "[gerrit]\nhost = \"review.example.com\"";
const JIRA_SNIPPET: &str =
    "[jira]\nurl = \"https://example.atlassian.net\"\nusername = \"you@example.com\"\ntoken = \"<api token>\"";
const GITHUB_SNIPPET: &str = "[github]\ntoken = \"<personal access token>\"";

/// The `~/.grr.toml` configuration.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GrrConfig {
    /// The main line branch. Defaults to `master`.
    pub main_line: Option<String>,
    /// Review backend settings.
    pub gerrit: GerritConfig,
    /// JIRA credentials.
    pub jira: JiraConfig,
    /// GitHub credentials.
    pub github: GithubConfig,
    /// Where the configuration was loaded from.
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GerritConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

/// Resolved JIRA credentials.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JiraCredentials {
    pub url: String,
    pub username: String,
    pub token: String,
}

impl GrrConfig {
    /// Returns the default location of the configuration file, `$HOME/.grr.toml`.
    pub fn default_path() -> PathBuf {
        env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(GRR_CFG_FILE_NAME)
    }

    /// Loads the configuration at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> GrrResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self {
                path: path.to_path_buf(),
                ..Default::default()
            });
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| {
            GrrError::Configuration(format!("Invalid config file `{}`: {}", path.display(), e))
        })?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// The main line branch name.
    pub fn main_line(&self) -> &str {
        self.main_line.as_deref().unwrap_or(DEFAULT_MAIN_LINE)
    }

    /// The review backend host, required by every command that talks to it.
    pub fn gerrit_host(&self) -> GrrResult<&str> {
        non_empty(&self.gerrit.host).ok_or_else(|| {
            GrrError::Configuration(format!(
                "No review host configured. Add the following to `{}`:\n\n{}",
                self.path.display(),
                GERRIT_SNIPPET
            ))
        })
    }

    /// The review backend SSH port.
    pub fn gerrit_port(&self) -> u16 {
        self.gerrit.port.unwrap_or(DEFAULT_REVIEW_PORT)
    }

    /// A username override for the review backend, if configured.
    pub fn gerrit_username(&self) -> Option<&str> {
        non_empty(&self.gerrit.username)
    }

    /// The JIRA credentials, or [GrrError::MissingCredentials] if any is absent.
    pub fn jira_credentials(&self) -> GrrResult<JiraCredentials> {
        match (
            non_empty(&self.jira.url),
            non_empty(&self.jira.username),
            non_empty(&self.jira.token),
        ) {
            (Some(url), Some(username), Some(token)) => Ok(JiraCredentials {
                url: url.trim_end_matches('/').to_string(),
                username: username.to_string(),
                token: token.to_string(),
            }),
            _ => Err(self.missing("JIRA", JIRA_SNIPPET)),
        }
    }

    /// The GitHub token, or [GrrError::MissingCredentials] if absent.
    pub fn github_token(&self) -> GrrResult<&str> {
        non_empty(&self.github.token).ok_or_else(|| self.missing("GitHub", GITHUB_SNIPPET))
    }

    /// The GitHub API root.
    pub fn github_api_url(&self) -> &str {
        non_empty(&self.github.api_url)
            .unwrap_or(DEFAULT_GITHUB_API_URL)
            .trim_end_matches('/')
    }

    fn missing(&self, tracker: &'static str, snippet: &'static str) -> GrrError {
        GrrError::MissingCredentials {
            tracker,
            path: self.path.display().to_string(),
            snippet,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::GrrConfig;
    use crate::errors::GrrError;
    use std::path::Path;

    #[test]
    fn missing_file_is_default() {
        let config = GrrConfig::load(Path::new("/nonexistent/.grr.toml")).unwrap();
        assert_eq!(config.main_line(), "master");
        assert_eq!(config.gerrit_port(), 29418);
        assert!(config.gerrit_host().is_err());
    }

    #[test]
    fn parses_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".grr.toml");
        std::fs::write(
            &path,
            r#"
main-line = "trunk"

[gerrit]
host = "review.example.com"
port = 2222
username = "jdoe"

[jira]
url = "https://jira.example.com/"
username = "jdoe@example.com"
token = "secret"

[github]
token = "ghp_x"
"#,
        )
        .unwrap();

        let config = GrrConfig::load(&path).unwrap();
        assert_eq!(config.main_line(), "trunk");
        assert_eq!(config.gerrit_host().unwrap(), "review.example.com");
        assert_eq!(config.gerrit_port(), 2222);
        assert_eq!(config.gerrit_username(), Some("jdoe"));
        assert_eq!(config.jira_credentials().unwrap().url, "https://jira.example.com");
        assert_eq!(config.github_token().unwrap(), "ghp_x");
        assert_eq!(config.github_api_url(), "https://api.github.com");
    }

    #[test]
    fn missing_credentials_explain_the_format() {
        let config = GrrConfig::default();
        match config.jira_credentials() {
            Err(GrrError::MissingCredentials { tracker, snippet, .. }) => {
                assert_eq!(tracker, "JIRA");
                assert!(snippet.contains("[jira]"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(config.github_token().is_err());
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".grr.toml");
        std::fs::write(&path, "[gerrit\nhost = ").unwrap();
        assert!(matches!(
            GrrConfig::load(&path),
            Err(GrrError::Configuration(_))
        ));
    }
}
