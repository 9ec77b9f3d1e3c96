use std::fmt;
use std::sync::Arc;

use async_imap::imap_proto::{AttributeValue, Response, Status};
use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

use enroller_core::{EnrollError, Result};

use crate::message::MailboxMessage;
use crate::poller::Mailbox;

/// Stream an IMAP session runs over.
pub trait ImapTransport: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send + 'static {}

impl<T> ImapTransport for T where T: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send + 'static {}

pub type TlsImapStream = Compat<TlsStream<TcpStream>>;

/// Where and as whom to log in.
#[derive(Debug, Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub mailbox: String,
}

/// IMAP session with one selected mailbox.
pub struct ImapMailbox<T: ImapTransport = TlsImapStream> {
    settings: ImapSettings,
    session: Option<async_imap::Session<T>>,
}

impl ImapMailbox {
    /// TLS connect, LOGIN and SELECT. Nothing is retried.
    pub async fn connect(settings: ImapSettings) -> Result<Self> {
        let tls_stream = connect_tls(&settings.host, settings.port).await?;
        Self::from_stream(tls_stream, settings).await
    }
}

impl<T: ImapTransport> ImapMailbox<T> {
    /// LOGIN and SELECT over an already established stream.
    pub async fn from_stream(stream: T, settings: ImapSettings) -> Result<Self> {
        let client = async_imap::Client::new(stream);

        let mut session = client
            .login(&settings.username, &settings.password)
            .await
            .map_err(|(e, _)| EnrollError::Transport(format!("IMAP login failed: {}", e)))?;

        let selected = session
            .select(&settings.mailbox)
            .await
            .map_err(|e| EnrollError::Transport(format!("SELECT {} failed: {}", settings.mailbox, e)))?;

        info!(
            host = %settings.host,
            mailbox = %settings.mailbox,
            exists = selected.exists,
            "mailbox connected"
        );

        Ok(Self {
            settings,
            session: Some(session),
        })
    }

    fn session(&mut self) -> Result<&mut async_imap::Session<T>> {
        self.session
            .as_mut()
            .ok_or_else(|| EnrollError::Transport("mailbox session is closed".to_string()))
    }
}

/// `UID FETCH * (UID BODY.PEEK[])`, read response by response so a tagged NO/BAD is
/// reported instead of looking like an empty result.
async fn fetch_highest_uid<T: ImapTransport>(
    session: &mut async_imap::Session<T>,
) -> Result<Option<(u32, Vec<u8>)>> {
    let tag = session
        .run_command("UID FETCH * (UID BODY.PEEK[])")
        .await
        .map_err(|e| EnrollError::Transport(format!("UID FETCH failed: {}", e)))?;

    let mut newest: Option<(u32, Vec<u8>)> = None;

    loop {
        let response = session
            .read_response()
            .await
            .ok_or_else(|| EnrollError::transport("connection lost during UID FETCH"))?
            .map_err(|e| EnrollError::Transport(format!("UID FETCH failed: {}", e)))?;

        match response.parsed() {
            Response::Done {
                tag: done,
                status,
                information,
                ..
            } if *done == tag => {
                return match status {
                    Status::Ok => Ok(newest),
                    other => Err(EnrollError::Transport(format!(
                        "UID FETCH rejected: {:?} {}",
                        other,
                        information.as_deref().unwrap_or("")
                    ))),
                };
            }
            Response::Fetch(_, attributes) => {
                let uid = attributes.iter().find_map(|a| match a {
                    AttributeValue::Uid(uid) => Some(*uid),
                    _ => None,
                });
                let body = attributes.iter().find_map(|a| match a {
                    AttributeValue::BodySection { data: Some(data), .. } => Some(data.to_vec()),
                    _ => None,
                });

                if let (Some(uid), Some(body)) = (uid, body) {
                    if newest.as_ref().map_or(true, |(best, _)| uid > *best) {
                        newest = Some((uid, body));
                    }
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<T: ImapTransport> Mailbox for ImapMailbox<T> {
    async fn fetch_newest(&mut self) -> Result<Option<MailboxMessage>> {
        let mailbox = self.settings.mailbox.clone();
        let session = self.session()?;

        // Re-selecting refreshes EXISTS; `UID FETCH *` on an empty mailbox is an error on some servers.
        let selected = session
            .select(&mailbox)
            .await
            .map_err(|e| EnrollError::Transport(format!("SELECT {} failed: {}", mailbox, e)))?;
        if selected.exists == 0 {
            return Ok(None);
        }

        let Some((uid, raw)) = fetch_highest_uid(session).await? else {
            return Ok(None);
        };

        let message = MailboxMessage::parse(uid, &raw)
            .map_err(|e| EnrollError::Protocol(format!("unparseable message UID {}: {}", uid, e)))?;
        debug!(uid, subject = ?message.subject, "fetched newest message");

        Ok(Some(message))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout().await {
                debug!(host = %self.settings.host, "IMAP logout failed: {}", e);
            }
        }
        Ok(())
    }
}

async fn connect_tls(host: &str, port: u16) -> Result<TlsImapStream> {
    let tcp_stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| EnrollError::Transport(format!("TCP connect to {}:{} failed: {}", host, port, e)))?;

    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| EnrollError::Transport(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(RootCertStore::from_iter(
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
        ))
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| EnrollError::Transport(format!("invalid server name {}: {}", host, e)))?;

    let tls_stream = connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| EnrollError::Transport(format!("TLS handshake with {} failed: {}", host, e)))?;

    Ok(tls_stream.compat())
}
