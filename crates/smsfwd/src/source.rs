//! NDJSON event source.
//!
//! The platform bridge writes one JSON message event per line to our stdin.
//! A malformed line is logged and skipped; the pump only stops when the
//! stream ends.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use smsfwd_core::domain::InboundMessage;
use smsfwd_core::intake::IntakeDispatcher;

pub async fn pump<R>(reader: R, dispatcher: &IntakeDispatcher)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<InboundMessage>(line) {
                    Ok(message) => dispatcher.handle(message).await,
                    Err(e) => warn!("skipping malformed event line: {e}"),
                }
            }
            Ok(None) => {
                debug!("event source closed");
                break;
            }
            Err(e) => {
                warn!("event source read failed: {e}");
                break;
            }
        }
    }
}
