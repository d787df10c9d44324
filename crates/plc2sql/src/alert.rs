//! Operator alert channels.
//!
//! Mail transport is out of process: [`SpoolAlertChannel`] renders a complete
//! HTML message into an outbox directory for an external mailer to pick up.

use crate::config::{AlertConfig, AlertKind};
use crate::error::AlertError;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, headline: &str, detail: &str) -> Result<(), AlertError>;
}

pub fn from_config(config: &AlertConfig) -> Arc<dyn AlertChannel> {
    match config.kind {
        AlertKind::Log => Arc::new(LogAlertChannel),
        AlertKind::Spool => Arc::new(SpoolAlertChannel::new(config)),
    }
}

/// Emits the alert as an error-level tracing event.
#[derive(Debug, Default)]
pub struct LogAlertChannel;

#[async_trait]
impl AlertChannel for LogAlertChannel {
    async fn send(&self, headline: &str, detail: &str) -> Result<(), AlertError> {
        error!(alert = headline, "{}", detail);
        Ok(())
    }
}

/// Writes one `.html` message file per alert into `outbox_dir`.
#[derive(Debug)]
pub struct SpoolAlertChannel {
    outbox_dir: PathBuf,
    subject: String,
    sender: String,
    recipients: Vec<String>,
    sequence: AtomicU64,
}

impl SpoolAlertChannel {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            outbox_dir: config.outbox_dir.clone(),
            subject: config.subject.clone(),
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
            sequence: AtomicU64::new(0),
        }
    }

    fn render(&self, headline: &str, detail: &str) -> String {
        format!(
            "Subject: {subject}\r\n\
             From: {sender}\r\n\
             To: {to}\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             \r\n\
             <html>\n<body>\n\
             <h2>{headline}</h2>\n\
             <p>{detail}</p>\n\
             </body>\n</html>\n",
            subject = self.subject,
            sender = self.sender,
            to = self.recipients.join(", "),
            headline = escape_html(headline),
            detail = escape_html(detail),
        )
    }
}

#[async_trait]
impl AlertChannel for SpoolAlertChannel {
    async fn send(&self, headline: &str, detail: &str) -> Result<(), AlertError> {
        tokio::fs::create_dir_all(&self.outbox_dir).await?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!("alert-{}-{}.html", Utc::now().format("%Y%m%dT%H%M%S%.3f"), seq);
        let path = self.outbox_dir.join(name);
        tokio::fs::write(&path, self.render(headline, detail)).await?;

        info!(path = %path.display(), "Alert spooled");
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spool_config(dir: &std::path::Path) -> AlertConfig {
        AlertConfig {
            kind: AlertKind::Spool,
            outbox_dir: dir.to_path_buf(),
            recipients: vec!["ops@example.com".into(), "maint@example.com".into()],
            ..AlertConfig::default()
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b> & \"c\""), "a&lt;b&gt; &amp; &quot;c&quot;");
    }

    #[tokio::test]
    async fn test_spool_writes_one_file_per_alert() {
        let tmp = TempDir::new().unwrap();
        let outbox = tmp.path().join("outbox");
        let channel = SpoolAlertChannel::new(&spool_config(&outbox));

        channel.send("3 restarts in 30 min", "store <locked>").await.unwrap();
        channel.send("again", "still down").await.unwrap();

        let mut files: Vec<_> = std::fs::read_dir(&outbox)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 2);

        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert!(content.starts_with("Subject: PLC2SQL acquisition failure\r\n"));
        assert!(content.contains("To: ops@example.com, maint@example.com\r\n"));
        assert!(content.contains("store &lt;locked&gt;"));
    }

    #[tokio::test]
    async fn test_log_channel_never_fails() {
        LogAlertChannel.send("headline", "detail").await.unwrap();
    }
}
