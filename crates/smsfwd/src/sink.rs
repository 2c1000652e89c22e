//! Live notification over a local Unix socket.
//!
//! A foreground UI may listen on the socket to show arriving messages as
//! they happen. One connection per event, one JSON line per connection; no
//! listener is the normal case and surfaces as an error the dispatcher
//! treats as ignorable.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::{io::AsyncWriteExt, net::UnixStream};

use smsfwd_core::domain::InboundMessage;
use smsfwd_core::ports::NotifySink;
use smsfwd_core::{Error, Result};

#[derive(Serialize)]
struct NotifyLine<'a> {
    event: &'static str,
    #[serde(rename = "originatingAddress")]
    originating_address: Option<&'a str>,
    #[serde(rename = "messageBody")]
    message_body: &'a str,
    time: i64,
}

pub struct SocketNotifySink {
    path: PathBuf,
}

impl SocketNotifySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NotifySink for SocketNotifySink {
    async fn notify(&self, message: &InboundMessage) -> Result<()> {
        let mut stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| Error::Sink(format!("connect {}: {e}", self.path.display())))?;

        let line = NotifyLine {
            event: "sms-received",
            originating_address: message.sender.as_deref(),
            message_body: &message.body,
            time: message.received_at,
        };
        let mut payload = serde_json::to_vec(&line)?;
        payload.push(b'\n');

        stream
            .write_all(&payload)
            .await
            .map_err(|e| Error::Sink(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::{io::AsyncReadExt, net::UnixListener};

    fn tmp_sock(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.sock"))
    }

    fn message() -> InboundMessage {
        InboundMessage {
            sender: Some("+15551234567".to_string()),
            body: "Hello".to_string(),
            received_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn notify_writes_one_json_line() {
        let path = tmp_sock("smsfwd-sink");
        let listener = UnixListener::bind(&path).unwrap();
        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.unwrap();
            buf
        });

        SocketNotifySink::new(&path).notify(&message()).await.unwrap();

        let buf = reader.await.unwrap();
        assert!(buf.ends_with('\n'));
        let v: serde_json::Value = serde_json::from_str(buf.trim_end()).unwrap();
        assert_eq!(v["event"], "sms-received");
        assert_eq!(v["originatingAddress"], "+15551234567");
        assert_eq!(v["messageBody"], "Hello");
        assert_eq!(v["time"], 1_700_000_000_000i64);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn absent_listener_is_a_sink_error() {
        let err = SocketNotifySink::new(tmp_sock("smsfwd-sink-absent"))
            .notify(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }
}
