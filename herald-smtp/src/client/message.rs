//! Composition of the plain message sent during DATA.

/// Builds the flat message handed to the SMTP transaction.
///
/// The layout is fixed:
///
/// ```text
/// From: <from display name>
/// To: <to display name>
/// Reply-To: <reply-to>
/// Subject: <subject>
/// <preamble>
///
/// <body>
/// ```
///
/// The from display name falls back to the sender address and the to display
/// name to the recipients joined with `", "`. Values are inserted verbatim:
/// nothing is encoded and header injection through CR/LF in a field is not
/// prevented, so callers must pass trusted values.
///
/// # Examples
///
/// ```
/// use herald_smtp::client::MessageComposer;
///
/// let message = MessageComposer::new()
///     .from("sender@example.com")
///     .to(["recipient@example.com"])
///     .subject("Hello")
///     .body("This is the message body")
///     .compose();
///
/// assert!(message.ends_with(b"This is the message body"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageComposer {
    from: String,
    from_display_name: String,
    to: Vec<String>,
    to_display_name: String,
    reply_to: String,
    subject: String,
    preamble: String,
    body: String,
}

impl MessageComposer {
    /// Creates a new empty composer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.from = email.into();
        self
    }

    /// Sets the name shown in the From header.
    #[must_use]
    pub fn from_display_name(mut self, name: impl Into<String>) -> Self {
        self.from_display_name = name.into();
        self
    }

    /// Adds recipients.
    #[must_use]
    pub fn to<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to.extend(emails.into_iter().map(Into::into));
        self
    }

    /// Sets the text shown in the To header.
    #[must_use]
    pub fn to_display_name(mut self, name: impl Into<String>) -> Self {
        self.to_display_name = name.into();
        self
    }

    /// Sets the Reply-To header.
    #[must_use]
    pub fn reply_to(mut self, email: impl Into<String>) -> Self {
        self.reply_to = email.into();
        self
    }

    /// Sets the Subject header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the text placed directly after the Subject header, e.g. extra
    /// headers such as `MIME-Version: 1.0`.
    #[must_use]
    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Sets the message body.
    #[must_use]
    pub fn body(mut self, content: impl Into<String>) -> Self {
        self.body = content.into();
        self
    }

    /// Produces the message bytes.
    #[must_use]
    pub fn compose(&self) -> Vec<u8> {
        let from = if self.from_display_name.is_empty() {
            self.from.as_str()
        } else {
            self.from_display_name.as_str()
        };

        let joined;
        let to = if self.to_display_name.is_empty() {
            joined = self.to.join(", ");
            joined.as_str()
        } else {
            self.to_display_name.as_str()
        };

        format!(
            "From: {from}\nTo: {to}\nReply-To: {}\nSubject: {}\n{}\n\n{}",
            self.reply_to, self.subject, self.preamble, self.body
        )
        .into_bytes()
    }
}
