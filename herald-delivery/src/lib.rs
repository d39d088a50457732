//! Delivery of a single message over SMTP, retrying while the server reports
//! itself temporarily unavailable.
//!
//! - [`Transport`]: the capability that sends one message
//! - [`RetryPolicy`]: how many attempts, and how long to wait between them
//! - [`deliver`]: the retry loop, classifying each failure by its reply code
//! - [`SmtpTransport`]: the [`Transport`] backed by a real SMTP session

mod engine;
mod error;
pub mod policy;
mod request;
mod smtp_transaction;
pub mod status;
mod transport;

pub use engine::{DeliveryReport, deliver, deliver_until};
pub use error::{DeliveryError, TransportError};
pub use policy::{Backoff, RetryPolicy};
pub use request::{SendRequest, SendRequestBuilder};
pub use smtp_transaction::SmtpTransport;
pub use status::{Classification, extract_status_code};
pub use transport::{LoggingTransport, PlainAuth, Transport};
