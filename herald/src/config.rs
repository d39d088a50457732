//! The `herald` configuration file.
//!
//! ```ron
//! (
//!     smtp: (
//!         server: "smtp.example.com",
//!         port: 587,
//!         username: "mailer",
//!         password: "secret",
//!     ),
//!     email: (
//!         to: ["alice@example.com", "bob@example.com"],
//!         from: "noreply@example.com",
//!         subject: "Deployment finished",
//!         body: "All green.",
//!     ),
//!     retry: (max_attempts: 3),
//!     dry_run: false,
//! )
//! ```

use std::path::{Path, PathBuf};

use herald_common::config::ClientTimeouts;
use herald_delivery::RetryPolicy;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("smtp.port must be non-zero")]
    InvalidPort,

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,
}

/// Everything needed to send one email.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Herald {
    pub smtp: SmtpConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Compose and log the email, but never contact the server.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone, Default, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    /// Leave empty to skip authentication.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub timeouts: ClientTimeouts,
    /// Skip verification of the server's certificate after STARTTLS.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("timeouts", &self.timeouts)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    pub to: Vec<String>,
    /// Defaults to the recipients, joined with `", "`.
    #[serde(default)]
    pub to_display_name: String,
    pub from: String,
    /// Defaults to `from`.
    #[serde(default)]
    pub from_display_name: String,
    #[serde(default)]
    pub reply_to: String,
    pub subject: String,
    /// Written on its own line right after the headers.
    #[serde(default)]
    pub preamble: String,
    pub body: String,
}

impl Herald {
    /// Parse a configuration from RON, without validating it.
    ///
    /// # Errors
    ///
    /// If `content` is not a valid configuration.
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Read and parse the configuration at `path`, without validating it.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_ron(&content)
    }

    /// Check that everything needed to send is present.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email.to.is_empty() {
            return Err(ConfigError::Missing("email.to"));
        }
        if self.email.from.is_empty() {
            return Err(ConfigError::Missing("email.from"));
        }
        if self.email.subject.is_empty() {
            return Err(ConfigError::Missing("email.subject"));
        }
        if self.email.body.is_empty() {
            return Err(ConfigError::Missing("email.body"));
        }
        if self.smtp.server.is_empty() {
            return Err(ConfigError::Missing("smtp.server"));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const MINIMAL: &str = r#"(
        smtp: (server: "smtp.example.com", port: 587),
        email: (
            to: ["alice@example.com"],
            from: "noreply@example.com",
            subject: "Hello",
            body: "World",
        ),
    )"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Herald::from_ron(MINIMAL).unwrap();

        assert_eq!(config.smtp.server, "smtp.example.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.username, "");
        assert_eq!(config.smtp.timeouts, ClientTimeouts::default());
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.email.reply_to, "");
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = Herald::from_ron(
            r#"(
                smtp: (
                    server: "localhost",
                    port: 2525,
                    username: "user",
                    password: "pass",
                    timeouts: (connect_secs: 5),
                    accept_invalid_certs: true,
                ),
                email: (
                    to: ["a@example.com", "b@example.com"],
                    to_display_name: "Team",
                    from: "me@example.com",
                    from_display_name: "Me <me@example.com>",
                    reply_to: "replies@example.com",
                    subject: "Status",
                    preamble: "MIME-Version: 1.0",
                    body: "Done",
                ),
                retry: (max_attempts: 2, max_delay_ms: 1000),
                dry_run: true,
            )"#,
        )
        .unwrap();

        assert_eq!(config.smtp.timeouts.connect_secs, 5);
        assert_eq!(config.smtp.timeouts.data_secs, 120);
        assert!(config.smtp.accept_invalid_certs);
        assert_eq!(config.email.to.len(), 2);
        assert_eq!(config.email.preamble, "MIME-Version: 1.0");
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_delay_ms, 1000);
        assert_eq!(config.retry.seed_min_ms, 10);
        assert!(config.dry_run);
    }

    #[test]
    fn test_missing_section_is_a_parse_error() {
        let error = Herald::from_ron(r#"(smtp: (server: "x", port: 25))"#).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let valid = Herald::from_ron(MINIMAL).unwrap();

        let mut config = valid.clone();
        config.email.to.clear();
        assert_eq!(config.validate().unwrap_err().to_string(), "email.to is required");

        let mut config = valid.clone();
        config.email.from.clear();
        assert_eq!(config.validate().unwrap_err().to_string(), "email.from is required");

        let mut config = valid.clone();
        config.email.subject.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("email.subject"))
        ));

        let mut config = valid.clone();
        config.email.body.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("email.body"))
        ));

        let mut config = valid.clone();
        config.smtp.server.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("smtp.server"))
        ));

        let mut config = valid.clone();
        config.smtp.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort)));

        let mut config = valid;
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoAttempts)));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = Herald::from_ron(MINIMAL).unwrap();
        config.smtp.password = "hunter2".to_string();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_load_reports_path() {
        let error = Herald::load(Path::new("/nonexistent/herald.config.ron")).unwrap_err();
        assert!(
            error
                .to_string()
                .starts_with("Failed to read config from /nonexistent/herald.config.ron")
        );
    }
}
