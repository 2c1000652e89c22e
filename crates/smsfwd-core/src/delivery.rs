//! Delivery path: one attempt to turn a queued job into a sent email.
//!
//! Settings are re-read on every attempt. The snapshot captured at intake is
//! never reused, so credentials fixed (or forwarding switched off) after a
//! message arrived still take effect here.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::{DeliveryJob, Outcome, OutboundEmail};
use crate::ports::{ConfigStore, EmailTransport, JobExecutor};
use crate::render::EmailTemplate;

/// Display name attached to the sending address.
pub const SENDER_DISPLAY_NAME: &str = "SMS Forwarder";
/// Display name attached to the receiving address.
pub const TARGET_DISPLAY_NAME: &str = "You";

const LOG_BODY_MAX: usize = 300;

pub struct DeliveryWorker {
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn EmailTransport>,
    template_path: Option<PathBuf>,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn EmailTransport>,
        template_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            transport,
            template_path,
        }
    }

    /// Runs one delivery attempt and classifies it for the queue.
    pub async fn execute(&self, job: &DeliveryJob) -> Outcome {
        let config = match self.store.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!("settings unreadable, will retry: {e}");
                return Outcome::Retry;
            }
        };
        if !config.enabled {
            // Switched off after the message was queued; the job is done.
            info!("forwarding disabled, completing job without sending");
            return Outcome::Success;
        }
        let missing = config.missing_fields();
        if !missing.is_empty() {
            warn!(?missing, "email settings incomplete, will retry");
            return Outcome::Retry;
        }
        let credential = config.sender_credential.as_deref().unwrap_or_default().trim();
        let sender_address = config.sender_address.as_deref().unwrap_or_default().trim();
        let target_address = config.target_address.as_deref().unwrap_or_default().trim();

        let rendered = EmailTemplate::load(self.template_path.as_deref())
            .await
            .render(job);
        let email = OutboundEmail {
            sender_name: SENDER_DISPLAY_NAME.to_string(),
            sender_address: sender_address.to_string(),
            target_name: TARGET_DISPLAY_NAME.to_string(),
            target_address: target_address.to_string(),
            subject: rendered.subject,
            html_body: rendered.html_body,
            text_body: rendered.text_body,
        };

        match self.transport.send(credential, &email).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                info!(status = resp.status, "email accepted");
                Outcome::Success
            }
            Ok(resp) if resp.status >= 500 => {
                warn!(
                    status = resp.status,
                    body = %truncate_text(&resp.body, LOG_BODY_MAX),
                    "remote failure, will retry"
                );
                Outcome::Retry
            }
            Ok(resp) => {
                error!(
                    status = resp.status,
                    body = %truncate_text(&resp.body, LOG_BODY_MAX),
                    "email rejected, giving up"
                );
                Outcome::PermanentFailure
            }
            Err(e) => {
                warn!("transport failed, will retry: {e}");
                Outcome::Retry
            }
        }
    }
}

#[async_trait]
impl JobExecutor for DeliveryWorker {
    async fn execute(&self, job: &DeliveryJob) -> Outcome {
        DeliveryWorker::execute(self, job).await
    }
}

fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use tokio::sync::Mutex;

    use crate::domain::ForwardingConfig;
    use crate::ports::TransportResponse;
    use crate::{Error, Result};

    struct SwitchableStore(Mutex<Option<ForwardingConfig>>);

    impl SwitchableStore {
        fn new(config: Option<ForwardingConfig>) -> Self {
            Self(Mutex::new(config))
        }

        async fn set(&self, config: ForwardingConfig) {
            *self.0.lock().await = Some(config);
        }
    }

    #[async_trait]
    impl ConfigStore for SwitchableStore {
        async fn load(&self) -> Result<ForwardingConfig> {
            self.0
                .lock()
                .await
                .clone()
                .ok_or_else(|| Error::Config("store unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        sent: Mutex<Vec<(String, OutboundEmail)>>,
        replies: Mutex<VecDeque<Result<TransportResponse>>>,
    }

    impl ScriptedTransport {
        async fn push(&self, reply: Result<TransportResponse>) {
            self.replies.lock().await.push_back(reply);
        }

        async fn reply_status(&self, status: u16) {
            self.push(Ok(TransportResponse {
                status,
                body: format!("status {status} body"),
            }))
            .await;
        }
    }

    #[async_trait]
    impl EmailTransport for ScriptedTransport {
        async fn send(&self, credential: &str, email: &OutboundEmail) -> Result<TransportResponse> {
            self.sent
                .lock()
                .await
                .push((credential.to_string(), email.clone()));
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("unscripted send".to_string())))
        }
    }

    fn complete_config() -> ForwardingConfig {
        ForwardingConfig {
            enabled: true,
            sender_credential: Some("api-key-1".to_string()),
            sender_address: Some("from@example.com".to_string()),
            target_address: Some("to@example.com".to_string()),
        }
    }

    fn job() -> DeliveryJob {
        DeliveryJob {
            sender: Some("+15551234567".to_string()),
            body: "Hello".to_string(),
            received_at: 1_700_000_000_000,
        }
    }

    fn worker(store: Arc<SwitchableStore>, transport: Arc<ScriptedTransport>) -> DeliveryWorker {
        DeliveryWorker::new(store, transport, None)
    }

    #[tokio::test]
    async fn accepted_reply_is_success_and_email_is_addressed() {
        let store = Arc::new(SwitchableStore::new(Some(complete_config())));
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply_status(202).await;
        let w = worker(store, transport.clone());

        assert_eq!(w.execute(&job()).await, Outcome::Success);

        let sent = transport.sent.lock().await;
        let (credential, email) = &sent[0];
        assert_eq!(credential, "api-key-1");
        assert_eq!(email.sender_name, SENDER_DISPLAY_NAME);
        assert_eq!(email.sender_address, "from@example.com");
        assert_eq!(email.target_name, TARGET_DISPLAY_NAME);
        assert_eq!(email.target_address, "to@example.com");
        assert_eq!(email.subject, "SMS from +15551234567");
        assert!(email.text_body.ends_with("Message:\nHello"));
    }

    #[tokio::test]
    async fn server_error_reply_retries() {
        let store = Arc::new(SwitchableStore::new(Some(complete_config())));
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply_status(503).await;
        let w = worker(store, transport);

        assert_eq!(w.execute(&job()).await, Outcome::Retry);
    }

    #[tokio::test]
    async fn client_error_reply_is_permanent() {
        let store = Arc::new(SwitchableStore::new(Some(complete_config())));
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply_status(401).await;
        let w = worker(store, transport);

        assert_eq!(w.execute(&job()).await, Outcome::PermanentFailure);
    }

    #[tokio::test]
    async fn transport_failure_retries() {
        let store = Arc::new(SwitchableStore::new(Some(complete_config())));
        let transport = Arc::new(ScriptedTransport::default());
        transport
            .push(Err(Error::Transport("connect timeout".to_string())))
            .await;
        let w = worker(store, transport);

        assert_eq!(w.execute(&job()).await, Outcome::Retry);
    }

    #[tokio::test]
    async fn disabled_at_delivery_completes_without_sending() {
        let store = Arc::new(SwitchableStore::new(Some(ForwardingConfig::disabled())));
        let transport = Arc::new(ScriptedTransport::default());
        let w = worker(store, transport.clone());

        assert_eq!(w.execute(&job()).await, Outcome::Success);
        assert!(transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn incomplete_settings_retry_without_sending() {
        let config = ForwardingConfig {
            target_address: None,
            ..complete_config()
        };
        let store = Arc::new(SwitchableStore::new(Some(config)));
        let transport = Arc::new(ScriptedTransport::default());
        let w = worker(store, transport.clone());

        assert_eq!(w.execute(&job()).await, Outcome::Retry);
        assert!(transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_settings_retry() {
        let store = Arc::new(SwitchableStore::new(None));
        let transport = Arc::new(ScriptedTransport::default());
        let w = worker(store, transport);

        assert_eq!(w.execute(&job()).await, Outcome::Retry);
    }

    #[tokio::test]
    async fn settings_are_reread_on_every_attempt() {
        let store = Arc::new(SwitchableStore::new(Some(ForwardingConfig {
            target_address: None,
            ..complete_config()
        })));
        let transport = Arc::new(ScriptedTransport::default());
        transport.reply_status(200).await;
        let w = worker(store.clone(), transport.clone());

        assert_eq!(w.execute(&job()).await, Outcome::Retry);

        store.set(complete_config()).await;
        assert_eq!(w.execute(&job()).await, Outcome::Success);
        assert_eq!(transport.sent.lock().await.len(), 1);
    }
}
