//! SMTP reply parsing and representation.

use super::error::{ClientError, Result};

/// Represents a single line in an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// The SMTP status code (e.g., 220, 250, 550).
    pub code: u16,
    /// Whether this is the last line in a multi-line reply.
    pub is_last: bool,
    /// The message text following the status code.
    pub message: String,
}

/// Represents a complete SMTP reply, which may be multi-line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The SMTP status code.
    pub code: u16,
    /// All message lines in the reply.
    pub lines: Vec<String>,
}

impl Response {
    /// Creates a new `Response`.
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns the complete message as a single string with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns `true` if this reply indicates success (2xx code).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// Returns `true` if this reply indicates a temporary error (4xx code).
    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// Returns `true` if this reply indicates a permanent error (5xx code).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Require this reply to carry `code`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::SmtpError` holding the reply otherwise.
    pub fn expect_code(self, code: u16) -> Result<Self> {
        if self.code == code {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Converts the reply into the error the server reported.
    #[must_use]
    pub fn into_error(self) -> ClientError {
        ClientError::SmtpError {
            code: self.code,
            message: self.lines.join("\n"),
        }
    }

    /// Whether an EHLO reply advertises `keyword` (e.g. `STARTTLS`, `AUTH`).
    ///
    /// The first line of an EHLO reply is the server's greeting, so only the
    /// following lines are considered.
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.lines.iter().skip(1).any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(keyword))
        })
    }

    /// Parses a single reply line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line doesn't match SMTP format.
    pub fn parse_line(line: &str) -> Result<ResponseLine> {
        let Some(code_str) = line.get(..3) else {
            return Err(ClientError::ParseError(format!(
                "Response line too short: '{line}'"
            )));
        };

        let code = code_str
            .parse::<u16>()
            .map_err(|_| ClientError::ParseError(format!("Invalid status code: '{code_str}'")))?;

        // A space (or nothing) ends the reply, a dash continues it
        let is_last = match line[3..].chars().next() {
            Some(' ') | None => true,
            Some('-') => false,
            Some(c) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator character: '{c}'"
                )));
            }
        };

        let message = line.get(4..).unwrap_or_default().to_string();

        Ok(ResponseLine {
            code,
            is_last,
            message,
        })
    }

    /// Parses a complete multi-line SMTP reply from a buffer.
    ///
    /// Returns the parsed `Response` and the number of bytes consumed, or
    /// `None` when the buffer does not yet hold a complete reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the reply is malformed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut lines = Vec::new();
        let mut bytes_consumed = 0;
        let mut first_code = None;

        // Only complete lines are decoded; a read may end inside a character
        while let Some(end) = buffer[bytes_consumed..].iter().position(|&b| b == b'\n') {
            let raw = std::str::from_utf8(&buffer[bytes_consumed..bytes_consumed + end])?;
            bytes_consumed += end + 1;

            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                continue;
            }

            let parsed_line = Self::parse_line(line)?;

            match first_code {
                // No codes in the text, it must not classify as a server reply
                Some(code) if parsed_line.code != code => {
                    return Err(ClientError::ParseError(
                        "Status code mismatch in multi-line response".to_string(),
                    ));
                }
                Some(_) => {}
                None => first_code = Some(parsed_line.code),
            }

            lines.push(parsed_line.message);

            if parsed_line.is_last {
                return Ok(first_code.map(|code| (Self::new(code, lines), bytes_consumed)));
            }
        }

        Ok(None)
    }
}
