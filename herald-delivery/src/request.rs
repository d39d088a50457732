use std::fmt;

use crate::transport::PlainAuth;

/// Everything needed to send one message, fixed for all of its attempts.
#[derive(Clone, PartialEq, Eq)]
pub struct SendRequest {
    from: String,
    to: Vec<String>,
    message: Vec<u8>,
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl SendRequest {
    #[must_use]
    pub fn builder() -> SendRequestBuilder {
        SendRequestBuilder::default()
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn to(&self) -> &[String] {
        &self.to
    }

    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The server address as `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `PLAIN` credentials for the server, with an empty identity.
    #[must_use]
    pub fn auth(&self) -> PlainAuth {
        PlainAuth::new("", &self.username, &self.password, &self.host)
    }
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("message_len", &self.message.len())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SendRequest`].
#[derive(Debug, Clone, Default)]
pub struct SendRequestBuilder {
    from: String,
    to: Vec<String>,
    message: Vec<u8>,
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl SendRequestBuilder {
    #[must_use]
    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    #[must_use]
    pub fn with_recipients<I, S>(mut self, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to = to.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn build(self) -> SendRequest {
        SendRequest {
            from: self.from,
            to: self.to,
            message: self.message,
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
        }
    }
}
