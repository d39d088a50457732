//! Error types for delivery.
//!
//! A failed send is only ever described by its text. The engine reads the
//! SMTP reply code out of that text to decide whether to retry, and hands the
//! last failure back unchanged when it gives up.

use herald_smtp::client::ClientError;
use thiserror::Error;

use crate::status::extract_status_code;

/// A failed attempt to send, as reported by a [`Transport`](crate::Transport).
///
/// Displays as exactly the message it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The first standalone three-digit code in the message, or
    /// [`NO_STATUS_CODE`](crate::status::NO_STATUS_CODE).
    #[must_use]
    pub fn status_code(&self) -> &str {
        extract_status_code(&self.message)
    }
}

/// Client errors keep their wire rendering, so an SMTP reply becomes
/// `"<code> <text>"`.
impl From<ClientError> for TransportError {
    fn from(error: ClientError) -> Self {
        Self::new(error.to_string())
    }
}

/// Why a delivery did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The last attempt failed, either with a terminal error or with a
    /// transient one after every attempt was used up.
    ///
    /// Displays as the transport's message, unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A shutdown was signalled while waiting to retry.
    #[error("Delivery cancelled after {attempts} attempt(s), last error: {last}")]
    Cancelled { attempts: u32, last: TransportError },
}

impl DeliveryError {
    /// The error from the last attempt made.
    #[must_use]
    pub const fn last_error(&self) -> &TransportError {
        match self {
            Self::Transport(error) | Self::Cancelled { last: error, .. } => error,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_transport_error_display_is_the_message() {
        let error = TransportError::new("421 Service not available");
        assert_eq!(error.to_string(), "421 Service not available");
        assert_eq!(error.status_code(), "421");
    }

    #[test]
    fn test_delivery_error_is_transparent() {
        let error = DeliveryError::from(TransportError::new("500 Internal Server Error"));
        assert_eq!(error.to_string(), "500 Internal Server Error");
        assert!(!error.is_cancelled());
        assert_eq!(error.last_error().status_code(), "500");
    }

    #[test]
    fn test_cancelled_display() {
        let error = DeliveryError::Cancelled {
            attempts: 2,
            last: TransportError::new("421 Try later"),
        };
        assert!(error.is_cancelled());
        assert_eq!(
            error.to_string(),
            "Delivery cancelled after 2 attempt(s), last error: 421 Try later"
        );
        assert_eq!(error.last_error().message(), "421 Try later");
    }

    #[test]
    fn test_client_error_conversion_keeps_code_first() {
        let error: TransportError = ClientError::SmtpError {
            code: 421,
            message: "Service not available".to_string(),
        }
        .into();
        assert_eq!(error.message(), "421 Service not available");

        let error: TransportError = ClientError::ConnectionClosed.into();
        assert_eq!(error.status_code(), crate::status::NO_STATUS_CODE);
    }
}
