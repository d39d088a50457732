use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use herald_common::{Signal, internal, logging};
use herald_delivery::{
    DeliveryError, LoggingTransport, SendRequest, SmtpTransport, Transport, deliver_until,
};
use herald_smtp::client::MessageComposer;
use tokio::sync::broadcast;

use crate::config::Herald;

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// What became of a send that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// `"<recipients joined by ','> | <subject> | <unix seconds>"`
    pub id: String,
    /// Transport invocations made; zero for a dry run.
    pub attempts: u32,
    pub dry_run: bool,
}

/// Identifies a sent email by its recipients, subject and time of sending.
#[must_use]
pub fn message_id(to: &[String], subject: &str, at: DateTime<Utc>) -> String {
    format!("{} | {subject} | {}", to.join(","), at.timestamp())
}

/// Waits for Ctrl+C or SIGTERM, then tells any delivery waiting to retry to
/// stop.
#[tracing::instrument(level = "trace")]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, cancelling delivery");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, cancelling delivery");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

/// Drives a shutdown listener, logging a failure to install it since nothing
/// awaits the task it runs in. Returns whether the listener finished cleanly.
async fn watch_shutdown<F>(listener: F) -> bool
where
    F: Future<Output = anyhow::Result<()>>,
{
    match listener.await {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(
                %error,
                "Unable to listen for shutdown signals, delivery cannot be cancelled"
            );
            false
        }
    }
}

impl Herald {
    /// The email as it will be handed to the server.
    #[must_use]
    pub fn compose(&self) -> Vec<u8> {
        let email = &self.email;

        MessageComposer::new()
            .from(&email.from)
            .from_display_name(&email.from_display_name)
            .to(&email.to)
            .to_display_name(&email.to_display_name)
            .reply_to(&email.reply_to)
            .subject(&email.subject)
            .preamble(&email.preamble)
            .body(&email.body)
            .compose()
    }

    #[must_use]
    pub fn request(&self) -> SendRequest {
        SendRequest::builder()
            .with_sender(&self.email.from)
            .with_recipients(&self.email.to)
            .with_message(self.compose())
            .with_server(&self.smtp.server, self.smtp.port)
            .with_credentials(&self.smtp.username, &self.smtp.password)
            .build()
    }

    #[must_use]
    pub fn transport(&self) -> SmtpTransport {
        SmtpTransport::new(self.smtp.timeouts.clone())
            .with_accept_invalid_certs(self.smtp.accept_invalid_certs)
    }

    /// Send the email through `transport`, or only log it for a dry run.
    ///
    /// # Errors
    ///
    /// The delivery's error once it gives up, or is cancelled via `shutdown`.
    #[tracing::instrument(level = "debug", skip_all, fields(subject = %self.email.subject, dry_run = self.dry_run))]
    pub async fn send_with<T>(
        &self,
        transport: &T,
        shutdown: broadcast::Receiver<Signal>,
    ) -> Result<Sent, DeliveryError>
    where
        T: Transport + ?Sized,
    {
        if self.dry_run {
            tracing::info!(
                from = %self.email.from,
                to = ?self.email.to,
                subject = %self.email.subject,
                "In dry-run mode, not sending email"
            );

            return Ok(Sent {
                id: message_id(&self.email.to, &self.email.subject, Utc::now()),
                attempts: 0,
                dry_run: true,
            });
        }

        let report = deliver_until(transport, &self.retry, &self.request(), shutdown).await;
        let attempts = report.attempts;

        if let Err(error) = report.into_result() {
            tracing::error!(attempts, %error, "smtp error");
            return Err(error);
        }

        Ok(Sent {
            id: message_id(&self.email.to, &self.email.subject, Utc::now()),
            attempts,
            dry_run: false,
        })
    }

    /// Validate the configuration, then send the email over SMTP, cancelling
    /// any pending retry on Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid or the email could not be sent.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn run(self) -> anyhow::Result<Sent> {
        logging::init();

        self.validate()?;

        internal!("Controller running");

        let signals = tokio::spawn(watch_shutdown(shutdown()));
        let transport = LoggingTransport::new(self.transport());

        let result = self
            .send_with(&transport, SHUTDOWN_BROADCAST.subscribe())
            .await;

        signals.abort();

        let sent = result?;
        internal!(level = INFO, "Sent {} ({} attempt(s))", sent.id, sent.attempts);

        Ok(sent)
    }
}
