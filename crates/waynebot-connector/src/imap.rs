// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IMAP mailbox over implicit TLS.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_imap::imap_proto::{Response, Status};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mail_parser::MessageParser;
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;
use waynebot_core::WaynebotError;

use crate::email::{InboundEmail, MailSource};

type Session = async_imap::Session<TlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Bound on each protocol exchange after the TCP dial.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// Applies to the TLS handshake, greeting, and every command.
    pub op_timeout: Duration,
}

impl ImapConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            pass: pass.into(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

/// [`MailSource`] backed by an IMAP `INBOX`, verified against the webpki roots.
pub struct ImapSource {
    config: ImapConfig,
    tls: TlsConnector,
    session: Option<Session>,
}

impl ImapSource {
    pub fn new(config: ImapConfig) -> Result<Self, WaynebotError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| WaynebotError::Config(format!("imap tls setup: {e}")))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            config,
            tls: TlsConnector::from(Arc::new(tls)),
            session: None,
        })
    }

    /// Run one protocol exchange under the configured timeout.
    async fn bounded<T, E, F>(&self, what: &str, fut: F) -> Result<T, WaynebotError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let duration = self.config.op_timeout;
        match tokio::time::timeout(duration, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(imap_err(format!("{what}: {e}"))),
            Err(_) => {
                debug!(host = %self.config.host, what, "IMAP operation timed out");
                Err(WaynebotError::Timeout { duration })
            }
        }
    }

    async fn open(&self) -> Result<Session, WaynebotError> {
        let addr = (self.config.host.as_str(), self.config.port);
        let tcp = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| WaynebotError::Timeout {
                duration: CONNECT_TIMEOUT,
            })?
            .map_err(|e| {
                imap_err(format!("dial {}:{}: {e}", self.config.host, self.config.port))
            })?;

        let server_name = ServerName::try_from(self.config.host.clone())
            .map_err(|e| imap_err(format!("invalid server name: {e}")))?;
        let tls = self
            .bounded("tls handshake", self.tls.connect(server_name, tcp))
            .await?;

        let mut client = async_imap::Client::new(tls);
        let greeting = self
            .bounded("greeting", client.read_response())
            .await?
            .ok_or_else(|| imap_err("connection closed before greeting"))?;
        if let Response::Data {
            status: Status::Bye,
            ..
        } = greeting.parsed()
        {
            return Err(imap_err("server said BYE in greeting"));
        }

        let mut session = self
            .bounded("login", async {
                client
                    .login(&self.config.user, &self.config.pass)
                    .await
                    .map_err(|(e, _)| e)
            })
            .await?;
        self.bounded("select inbox", session.select("INBOX")).await?;
        Ok(session)
    }
}

#[async_trait]
impl MailSource for ImapSource {
    async fn connect(&mut self) -> Result<(), WaynebotError> {
        self.close().await;
        let session = self.open().await?;
        debug!(host = %self.config.host, user = %self.config.user, "IMAP session open");
        self.session = Some(session);
        Ok(())
    }

    async fn fetch_unseen(&mut self) -> Result<Vec<InboundEmail>, WaynebotError> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| imap_err("not connected"))?;
        let fetched = self.fetch_with(&mut session).await;
        self.session = Some(session);
        fetched
    }

    async fn mark_seen(&mut self, uids: &[u32]) -> Result<(), WaynebotError> {
        if uids.is_empty() {
            return Ok(());
        }
        let mut session = self
            .session
            .take()
            .ok_or_else(|| imap_err("not connected"))?;
        let stored = self
            .bounded("store seen", async {
                session
                    .uid_store(uid_set(uids), "+FLAGS (\\Seen)")
                    .await?
                    .try_collect::<Vec<_>>()
                    .await
            })
            .await
            .map(|_| ());
        self.session = Some(session);
        stored
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = self.bounded("logout", session.logout()).await {
                debug!(error = %e, "IMAP logout failed");
            }
        }
    }
}

impl ImapSource {
    async fn fetch_with(&self, session: &mut Session) -> Result<Vec<InboundEmail>, WaynebotError> {
        let mut uids: Vec<u32> = self
            .bounded("search unseen", session.uid_search("UNSEEN"))
            .await?
            .into_iter()
            .collect();
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        uids.sort_unstable();

        let fetches = self
            .bounded("fetch", async {
                session
                    .uid_fetch(uid_set(&uids), "RFC822")
                    .await?
                    .try_collect::<Vec<_>>()
                    .await
            })
            .await?;

        let mut out: Vec<InboundEmail> = fetches
            .iter()
            .filter_map(|fetch| {
                let uid = fetch.uid?;
                fetch.body().map(|raw| parse_email(uid, raw))
            })
            .collect();
        out.sort_by_key(|m| m.uid);
        Ok(out)
    }
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a raw RFC 822 message. Missing parts come back empty.
pub fn parse_email(uid: u32, raw: &[u8]) -> InboundEmail {
    let Some(msg) = MessageParser::default().parse(raw) else {
        return InboundEmail {
            uid,
            ..InboundEmail::default()
        };
    };

    let from = msg
        .from()
        .and_then(|addrs| addrs.first())
        .and_then(|addr| {
            addr.name()
                .filter(|n| !n.trim().is_empty())
                .or_else(|| addr.address())
        })
        .unwrap_or_default()
        .to_string();

    InboundEmail {
        uid,
        from,
        subject: msg.subject().unwrap_or_default().to_string(),
        body: msg
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
        date: msg
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0)),
    }
}

fn imap_err(message: impl Into<String>) -> WaynebotError {
    WaynebotError::provider(format!("imap: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Alice Example <alice@example.com>\r\n\
To: bot@example.com\r\n\
Subject: Quarterly numbers\r\n\
Date: Mon, 02 Mar 2026 09:05:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Revenue is up.\r\n";

    #[test]
    fn parses_sender_subject_date_and_body() {
        let email = parse_email(42, RAW);
        assert_eq!(email.uid, 42);
        assert_eq!(email.from, "Alice Example");
        assert_eq!(email.subject, "Quarterly numbers");
        assert_eq!(email.body.trim(), "Revenue is up.");
        assert_eq!(
            email.date.unwrap().to_rfc3339(),
            "2026-03-02T09:05:00+00:00"
        );
    }

    #[test]
    fn sender_falls_back_to_address() {
        let raw = b"From: alice@example.com\r\nSubject: hi\r\n\r\nbody\r\n";
        assert_eq!(parse_email(1, raw).from, "alice@example.com");
    }

    #[test]
    fn uid_sets_are_comma_separated() {
        assert_eq!(uid_set(&[3, 5, 9]), "3,5,9");
    }

    #[tokio::test]
    async fn operations_require_a_session() {
        let mut source = ImapSource::new(ImapConfig::new("imap.example.com", 993, "u", "p")).unwrap();
        assert!(source.fetch_unseen().await.is_err());
        assert!(source.mark_seen(&[1]).await.is_err());
        assert!(source.mark_seen(&[]).await.is_ok());
        source.close().await;
    }

    #[tokio::test]
    async fn silent_server_times_out_the_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            // Accept and never answer.
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut config = ImapConfig::new("127.0.0.1", port, "u", "p");
        config.op_timeout = Duration::from_millis(100);
        let mut source = ImapSource::new(config).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), source.connect())
            .await
            .expect("connect was not bounded")
            .unwrap_err();
        assert!(matches!(err, WaynebotError::Timeout { .. }), "{err:?}");
        hold.abort();
    }
}
