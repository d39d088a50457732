//! The [`Transport`] backed by a real SMTP session.
//!
//! One call to [`SmtpTransport::send_mail`] is one complete transaction on a
//! fresh connection:
//! - greeting, then EHLO (falling back to HELO)
//! - STARTTLS when the server advertises it, followed by a second EHLO
//! - AUTH PLAIN when credentials are present
//! - MAIL FROM, one RCPT TO per recipient, DATA and the message
//! - QUIT
//!
//! Any reply other than the one a command expects ends the transaction with
//! an error rendered as `<code> <text>`.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use herald_common::config::ClientTimeouts;
use herald_smtp::client::{self, ClientError, Response, SmtpClient};

use crate::{
    error::TransportError,
    transport::{PlainAuth, Transport},
};

/// Sends mail over SMTP, one connection per message.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    timeouts: ClientTimeouts,
    accept_invalid_certs: bool,
    helo_name: String,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new(ClientTimeouts::default())
    }
}

impl SmtpTransport {
    #[must_use]
    pub fn new(timeouts: ClientTimeouts) -> Self {
        Self {
            timeouts,
            accept_invalid_certs: false,
            helo_name: "localhost".to_string(),
        }
    }

    /// Skip verification of the certificate presented after STARTTLS.
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// The name announced in EHLO/HELO. Defaults to `localhost`.
    #[must_use]
    pub fn with_helo_name(mut self, helo_name: impl Into<String>) -> Self {
        self.helo_name = helo_name.into();
        self
    }

    #[must_use]
    pub const fn timeouts(&self) -> &ClientTimeouts {
        &self.timeouts
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    #[tracing::instrument(level = "debug", skip_all, fields(address = %address))]
    async fn send_mail(
        &self,
        address: &str,
        auth: &PlainAuth,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError> {
        validate_line(from)?;
        for recipient in to {
            validate_line(recipient)?;
        }

        if self.accept_invalid_certs {
            tracing::warn!(
                address,
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        SmtpTransaction {
            transport: self,
            address,
            server_name: server_name(address),
        }
        .execute(auth, from, to, message)
        .await
    }
}

/// One SMTP session against a single server.
struct SmtpTransaction<'a> {
    transport: &'a SmtpTransport,
    address: &'a str,
    server_name: &'a str,
}

impl SmtpTransaction<'_> {
    async fn execute(
        self,
        auth: &PlainAuth,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError> {
        let timeouts = &self.transport.timeouts;

        let mut client = self.connect_and_greet().await?;

        // `None` when the server only understood HELO
        let mut extensions = self.hello(&mut client).await?;

        if extensions
            .as_ref()
            .is_some_and(|ehlo| ehlo.has_extension("STARTTLS"))
        {
            extensions = self.negotiate_tls(&mut client).await?;
        }

        if let Some(ehlo) = &extensions
            && !auth.is_empty()
        {
            if !ehlo.has_extension("AUTH") {
                return Err(
                    ClientError::AuthError("server doesn't support AUTH".to_string()).into(),
                );
            }
            auth.check(client.server_domain(), client.is_tls())?;
            timed(
                "AUTH",
                timeouts.auth(),
                client.auth_plain(auth.identity(), auth.username(), auth.password()),
            )
            .await?;
            tracing::debug!(address = self.address, "Authenticated");
        }

        timed("MAIL FROM", timeouts.mail_from(), client.mail_from(from))
            .await?
            .expect_code(250)?;

        for recipient in to {
            let response = timed("RCPT TO", timeouts.rcpt_to(), client.rcpt_to(recipient)).await?;
            if !matches!(response.code, 250 | 251) {
                return Err(response.into_error().into());
            }
        }

        timed("DATA", timeouts.data(), client.data())
            .await?
            .expect_code(354)?;
        timed("DATA", timeouts.data(), client.send_data(message))
            .await?
            .expect_code(250)?;

        // The message is already accepted, a failed QUIT changes nothing
        let quit = timed("QUIT", timeouts.quit(), client.quit())
            .await
            .and_then(|response| response.expect_code(221).map_err(TransportError::from));
        if let Err(error) = quit {
            tracing::warn!(address = self.address, %error, "QUIT failed after successful delivery");
        }

        Ok(())
    }

    async fn connect_and_greet(&self) -> Result<SmtpClient, TransportError> {
        let timeouts = &self.transport.timeouts;

        let mut client = timed(
            "Connect",
            timeouts.connect(),
            SmtpClient::connect(self.address, self.server_name),
        )
        .await?
        .accept_invalid_certs(self.transport.accept_invalid_certs);

        timed("Greeting", timeouts.connect(), client.read_greeting()).await?;

        Ok(client)
    }

    /// EHLO, or HELO if the server does not understand EHLO.
    ///
    /// A temporary failure is returned as is, so a `421` still reaches the
    /// retry loop.
    async fn hello(&self, client: &mut SmtpClient) -> Result<Option<Response>, TransportError> {
        let timeouts = &self.transport.timeouts;
        let helo_name = &self.transport.helo_name;

        let ehlo = timed("EHLO", timeouts.ehlo(), client.ehlo(helo_name)).await?;
        if ehlo.code == 250 {
            return Ok(Some(ehlo));
        }
        if !ehlo.is_permanent_error() {
            return Err(ehlo.into_error().into());
        }

        tracing::debug!(
            address = self.address,
            code = ehlo.code,
            "EHLO refused, falling back to HELO"
        );
        timed("HELO", timeouts.ehlo(), client.helo(helo_name))
            .await?
            .expect_code(250)?;

        Ok(None)
    }

    async fn negotiate_tls(
        &self,
        client: &mut SmtpClient,
    ) -> Result<Option<Response>, TransportError> {
        let timeouts = &self.transport.timeouts;

        timed("STARTTLS", timeouts.starttls(), client.starttls()).await?;
        tracing::debug!(address = self.address, "TLS negotiated via STARTTLS");

        let ehlo = timed(
            "EHLO",
            timeouts.ehlo(),
            client.ehlo(&self.transport.helo_name),
        )
        .await?
        .expect_code(250)?;

        Ok(Some(ehlo))
    }
}

/// Runs one client step under `limit`.
async fn timed<T>(
    stage: &str,
    limit: Duration,
    step: impl Future<Output = client::Result<T>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_) => Err(TransportError::new(format!(
            "{stage} timed out after {limit:?}"
        ))),
    }
}

/// Addresses end up on a command line of their own; a line break would let
/// them inject further commands.
fn validate_line(line: &str) -> Result<(), TransportError> {
    if line.contains(['\r', '\n']) {
        return Err(TransportError::new("a line must not contain CR or LF"));
    }
    Ok(())
}

/// The host part of `host:port`, without IPv6 brackets.
fn server_name(address: &str) -> &str {
    address
        .rsplit_once(':')
        .map_or(address, |(host, _)| host)
        .trim_start_matches('[')
        .trim_end_matches(']')
}
