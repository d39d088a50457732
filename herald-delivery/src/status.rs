//! Classification of failed sends by SMTP reply code.
//!
//! Failures fall into exactly two classes. A `421` ("service not available,
//! closing transmission channel") means the server may accept the message on
//! a fresh connection later, so the attempt is retried. Everything else,
//! including text that carries no reply code at all, is terminal.

use std::sync::LazyLock;

use regex::Regex;

/// The only reply code worth retrying.
pub const TRANSIENT_CODE: &str = "421";

/// Returned by [`extract_status_code`] when the text holds no reply code.
pub const NO_STATUS_CODE: &str = "No status code found";

/// Three ASCII digits bounded by non-word characters (or the ends of the text).
#[allow(
    clippy::expect_used,
    reason = "The pattern is a literal; failing to compile it is a programming error"
)]
static STATUS_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{3}(?-u:\b)").expect("status code pattern is valid")
});

/// Extracts the first standalone three-digit sequence from `message`.
///
/// Returns [`NO_STATUS_CODE`] when there is none; callers compare against it
/// rather than handling an error.
///
/// ```
/// use herald_delivery::status::{NO_STATUS_CODE, extract_status_code};
///
/// assert_eq!(extract_status_code("421 Service not available"), "421");
/// assert_eq!(extract_status_code("connection reset"), NO_STATUS_CODE);
/// ```
#[must_use]
pub fn extract_status_code(message: &str) -> &str {
    STATUS_CODE
        .find(message)
        .map_or(NO_STATUS_CODE, |code| code.as_str())
}

/// What a failed send means for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The server is temporarily unavailable; try again after a delay.
    Transient,
    /// Retrying will not help; report the failure.
    Terminal,
}

impl Classification {
    /// Classifies an extracted status code.
    #[must_use]
    pub fn of_code(code: &str) -> Self {
        if code == TRANSIENT_CODE {
            Self::Transient
        } else {
            Self::Terminal
        }
    }

    /// Classifies the text of a failed send.
    #[must_use]
    pub fn of_message(message: &str) -> Self {
        Self::of_code(extract_status_code(message))
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extracts_leading_code() {
        assert_eq!(extract_status_code("421 Service not available"), "421");
        assert_eq!(extract_status_code("500 Internal Server Error"), "500");
    }

    #[test]
    fn test_extracts_first_of_several() {
        assert_eq!(
            extract_status_code("550 5.1.1 <a@example.com>: Recipient 421 rejected"),
            "550"
        );
        assert_eq!(extract_status_code("SMTP error: 421 - Try again"), "421");
    }

    #[test]
    fn test_extracts_code_followed_by_dash() {
        assert_eq!(extract_status_code("421-mx.example.com busy"), "421");
    }

    #[test]
    fn test_ignores_runs_that_are_not_standalone() {
        assert_eq!(extract_status_code("error 4210 happened"), NO_STATUS_CODE);
        assert_eq!(extract_status_code("code42"), NO_STATUS_CODE);
        assert_eq!(extract_status_code("x421y"), NO_STATUS_CODE);
        assert_eq!(extract_status_code("a4210 then 552 b"), "552");
    }

    #[test]
    fn test_not_found_sentinel() {
        assert_eq!(extract_status_code(""), NO_STATUS_CODE);
        assert_eq!(extract_status_code("connection refused"), NO_STATUS_CODE);
        assert_eq!(extract_status_code("12 34"), NO_STATUS_CODE);
    }

    #[test]
    fn test_non_ascii_word_characters_are_boundaries() {
        assert_eq!(extract_status_code("é421é"), "421");
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            Classification::of_message("421 Service not available"),
            Classification::Transient
        );
        assert_eq!(
            Classification::of_message("450 Mailbox busy"),
            Classification::Terminal
        );
        assert_eq!(
            Classification::of_message("500 Internal Server Error"),
            Classification::Terminal
        );
        assert_eq!(
            Classification::of_message("dial tcp: connection refused"),
            Classification::Terminal
        );
        assert!(Classification::of_code(TRANSIENT_CODE).is_transient());
        assert!(!Classification::of_code(NO_STATUS_CODE).is_transient());
    }
}
