//! Outbound SMTP client.
//!
//! [`SmtpClient`] speaks one command at a time over plain TCP, upgrading to
//! TLS via STARTTLS when asked. Replies are parsed into [`Response`] values;
//! anything other than the expected reply code becomes a
//! [`ClientError::SmtpError`] whose text starts with the code.
//!
//! # Example
//!
//! ```no_run
//! use herald_smtp::client::{MessageComposer, SmtpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let message = MessageComposer::new()
//!     .from("sender@example.com")
//!     .to(["recipient@example.com"])
//!     .subject("Test")
//!     .body("Hello World")
//!     .compose();
//!
//! let mut client = SmtpClient::connect("localhost:2525", "localhost").await?;
//! client.read_greeting().await?;
//! client.ehlo("localhost").await?;
//! client.mail_from("sender@example.com").await?;
//! client.rcpt_to("recipient@example.com").await?;
//! client.data().await?;
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::MessageComposer;
pub use response::{Response, ResponseLine};
pub use smtp_client::{SmtpClient, encode_data};
