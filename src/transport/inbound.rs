//! Inbound mail — IMAP polling over rustls.
//!
//! A plain IMAP session is enough here: log in, list unseen messages,
//! fetch each one, mark it seen. Parsed replies are deduplicated against
//! the store by Message-ID and handed to the interpreter.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use mail_parser::{MessageParser, MimeHeaders};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::interpreter::ReplyInterpreter;
use crate::store::JournalStore;

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// A fetched email.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

type ImapError = Box<dyn std::error::Error + Send + Sync>;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Fetch unseen emails over a fresh IMAP session (blocking, run in
/// `spawn_blocking`).
pub fn fetch_unseen(config: &ImapConfig) -> Result<Vec<InboundEmail>, ImapError> {
    let tcp = TcpStream::connect((&*config.host, config.port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name: rustls::pki_types::ServerName<'_> =
        rustls::pki_types::ServerName::try_from(config.host.clone())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let _greeting = read_line(&mut tls)?;

    let login_resp = send_cmd(
        &mut tls,
        "A1",
        &format!("LOGIN \"{}\" \"{}\"", config.username, config.password),
    )?;
    if !login_resp.last().is_some_and(|l| l.contains("OK")) {
        return Err("IMAP login failed".into());
    }

    let _select = send_cmd(&mut tls, "A2", "SELECT \"INBOX\"")?;

    let search_resp = send_cmd(&mut tls, "A3", "SEARCH UNSEEN")?;
    let mut uids: Vec<String> = Vec::new();
    for line in &search_resp {
        if line.starts_with("* SEARCH") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() > 2 {
                uids.extend(parts[2..].iter().map(|s| s.to_string()));
            }
        }
    }

    let mut results = Vec::new();
    let mut tag_counter = 4_u32;

    for uid in &uids {
        let fetch_tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetch_resp = send_cmd(&mut tls, &fetch_tag, &format!("FETCH {uid} RFC822"))?;

        let raw: String = fetch_resp
            .iter()
            .skip(1)
            .take(fetch_resp.len().saturating_sub(2))
            .cloned()
            .collect();

        if let Some(parsed) = MessageParser::default().parse(raw.as_bytes()) {
            let message_id = parsed
                .message_id()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

            results.push(InboundEmail {
                message_id,
                sender: extract_sender(&parsed),
                subject: parsed.subject().unwrap_or("(no subject)").to_string(),
                body: extract_text(&parsed),
            });
        }

        let store_tag = format!("A{tag_counter}");
        tag_counter += 1;
        let _ = send_cmd(&mut tls, &store_tag, &format!("STORE {uid} +FLAGS (\\Seen)"));
    }

    let logout_tag = format!("A{tag_counter}");
    let _ = send_cmd(&mut tls, &logout_tag, "LOGOUT");

    Ok(results)
}

fn read_line(tls: &mut TlsStream) -> Result<String, ImapError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match std::io::Read::read(tls, &mut byte) {
            Ok(0) => return Err("IMAP connection closed".into()),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).to_string());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn send_cmd(tls: &mut TlsStream, tag: &str, cmd: &str) -> Result<Vec<String>, ImapError> {
    let full = format!("{tag} {cmd}\r\n");
    IoWrite::write_all(tls, full.as_bytes())?;
    IoWrite::flush(tls)?;
    let mut lines = Vec::new();
    loop {
        let line = read_line(tls)?;
        let done = line.starts_with(tag);
        lines.push(line);
        if done {
            break;
        }
    }
    Ok(lines)
}

/// Extract the sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Extract readable text from a parsed email.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run one inbound pass: fetch unseen mail and interpret each message
/// exactly once. Returns how many new messages were handled.
pub async fn poll_once(
    config: &ImapConfig,
    store: &Arc<dyn JournalStore>,
    interpreter: &ReplyInterpreter,
) -> Result<usize, ImapError> {
    let cfg = config.clone();
    let emails = tokio::task::spawn_blocking(move || fetch_unseen(&cfg)).await??;

    let mut handled = 0;
    for email in emails {
        if store.is_processed(&email.message_id).await? {
            continue;
        }

        match interpreter
            .handle_reply(&email.sender, &email.subject, &email.body, chrono::Utc::now())
            .await
        {
            Ok(outcome) => {
                info!(sender = %email.sender, ?outcome, "Inbound reply handled");
            }
            Err(Error::UnknownSender { email: sender }) => {
                warn!(sender = %sender, "Ignoring mail from unknown sender");
            }
            Err(e) => {
                error!(sender = %email.sender, error = %e, "Inbound reply failed");
                // Leave unprocessed so the next pass retries.
                continue;
            }
        }

        store.mark_processed(&email.message_id).await?;
        handled += 1;
    }
    Ok(handled)
}

/// Spawn the inbound polling loop.
pub fn spawn_inbound_poller(
    config: ImapConfig,
    store: Arc<dyn JournalStore>,
    interpreter: Arc<ReplyInterpreter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(host = %config.host, interval_secs = interval.as_secs(), "Inbound polling started");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match poll_once(&config, &store, &interpreter).await {
                Ok(handled) if handled > 0 => {
                    info!(handled, "Inbound pass complete");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Inbound poll failed");
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
            }
        }
    })
}
