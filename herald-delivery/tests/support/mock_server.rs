//! Scriptable SMTP server for exercising delivery end to end.
//!
//! Every reply can be overridden, connections and commands are counted, and
//! everything the client sends is recorded for later assertions.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    task::JoinHandle,
    time::timeout,
};

/// A command as the mock server understood it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    Auth(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content between DATA and the lone dot, still dot-stuffed.
    MessageContent(String),
    Quit,
    StartTls,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct Script {
    greeting: Reply,
    /// First entry is the greeting line, the rest are extensions.
    ehlo: Option<Vec<String>>,
    helo: Reply,
    auth: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    starttls: Reply,
    /// `None` closes the connection without answering QUIT.
    quit: Option<Reply>,
    /// Greetings for the first connections; later ones use `greeting`.
    greeting_sequence: Vec<Reply>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.local ESMTP ready"),
            ehlo: Some(vec!["mock.local".to_string(), "SIZE 10000".to_string()]),
            helo: Reply::new(250, "mock.local"),
            auth: Reply::new(235, "2.7.0 Authentication successful"),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "OK: queued"),
            starttls: Reply::new(454, "TLS not available"),
            quit: Some(Reply::new(221, "Bye")),
            greeting_sequence: Vec::new(),
        }
    }
}

fn ehlo_bytes(lines: &[String]) -> Vec<u8> {
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let separator = if i == last { ' ' } else { '-' };
            format!("250{separator}{line}\r\n")
        })
        .collect::<String>()
        .into_bytes()
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
    connections: Arc<AtomicUsize>,
    accept_loop: JoinHandle<()>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            script: Script::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    async fn handle_client(
        stream: TcpStream,
        script: Arc<Script>,
        greeting: Reply,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer.write_all(&greeting.to_bytes()).await?;
        if greeting.code != 220 {
            return Ok(());
        }

        let mut line = String::new();
        loop {
            line.clear();
            match timeout(Duration::from_secs(10), reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Err(_) => return Ok(()),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
            }

            let command_line = line.trim_end_matches(['\r', '\n']);
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line, ""));

            let (reply, command) = match verb.to_ascii_uppercase().as_str() {
                "EHLO" => (
                    script.ehlo.as_deref().map_or_else(
                        || Reply::new(502, "Command not implemented").to_bytes(),
                        ehlo_bytes,
                    ),
                    SmtpCommand::Ehlo(argument.to_string()),
                ),
                "HELO" => (script.helo.to_bytes(), SmtpCommand::Helo(argument.to_string())),
                "AUTH" => (script.auth.to_bytes(), SmtpCommand::Auth(argument.to_string())),
                "MAIL" => (
                    script.mail_from.to_bytes(),
                    SmtpCommand::MailFrom(argument.to_string()),
                ),
                "RCPT" => (
                    script.rcpt_to.to_bytes(),
                    SmtpCommand::RcptTo(argument.to_string()),
                ),
                "DATA" => (script.data.to_bytes(), SmtpCommand::Data),
                "STARTTLS" => (script.starttls.to_bytes(), SmtpCommand::StartTls),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    if let Some(quit) = &script.quit {
                        writer.write_all(&quit.to_bytes()).await?;
                    }
                    return Ok(());
                }
                _ => (
                    Reply::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(command_line.to_string()),
                ),
            };

            let entering_data = command == SmtpCommand::Data && script.data.code == 354;
            commands.write().await.push(command);
            writer.write_all(&reply).await?;

            if entering_data {
                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line.trim_end_matches(['\r', '\n']) == "." {
                        break;
                    }
                    content.push_str(&line);
                }
                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                writer.write_all(&script.data_end.to_bytes()).await?;
            }
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

pub struct MockSmtpServerBuilder {
    script: Script,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.greeting = Reply::new(code, message);
        self
    }

    /// Greet the first connections with these replies, in order.
    #[must_use]
    pub fn with_greeting_sequence(mut self, replies: Vec<(u16, &str)>) -> Self {
        self.script.greeting_sequence = replies
            .into_iter()
            .map(|(code, message)| Reply::new(code, message))
            .collect();
        self
    }

    /// Lines of the EHLO reply after the first.
    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        let mut lines = vec!["mock.local".to_string()];
        lines.extend(extensions.iter().map(ToString::to_string));
        self.script.ehlo = Some(lines);
        self
    }

    /// Reply 502 to EHLO, as a server that only speaks HELO would.
    #[must_use]
    pub fn without_ehlo(mut self) -> Self {
        self.script.ehlo = None;
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.auth = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.rcpt_to = Reply::new(code, message);
        self
    }

    /// Reply to STARTTLS; the mock cannot complete a TLS handshake, so only
    /// refusals are useful.
    #[must_use]
    pub fn with_starttls_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.starttls = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_quit_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.quit = Some(Reply::new(code, message));
        self
    }

    /// Hang up on QUIT instead of answering it.
    #[must_use]
    pub fn without_quit_reply(mut self) -> Self {
        self.script.quit = None;
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.script.data_end = Reply::new(code, message);
        self
    }

    /// Bind to a random local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let script = Arc::new(self.script);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_loop = {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);

            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let greeting = script
                        .greeting_sequence
                        .get(index)
                        .unwrap_or(&script.greeting)
                        .clone();
                    let script = Arc::clone(&script);
                    let commands = Arc::clone(&commands);

                    tokio::spawn(async move {
                        if let Err(e) =
                            MockSmtpServer::handle_client(stream, script, greeting, commands).await
                        {
                            eprintln!("Mock server client error: {e}");
                        }
                    });
                }
            })
        };

        Ok(MockSmtpServer {
            addr,
            commands,
            connections,
            accept_loop,
        })
    }
}
