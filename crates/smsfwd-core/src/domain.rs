use serde::{Deserialize, Serialize};

/// An inbound message event as observed by the platform event source.
///
/// Created once per event and never mutated. `received_at` is epoch millis;
/// the wire shape is `{sender, body, receivedAt}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InboundMessage {
    pub sender: Option<String>,
    pub body: String,
    #[serde(rename = "receivedAt")]
    pub received_at: i64,
}

/// The durable unit of work: a copy of the message fields and nothing else.
///
/// Configuration is deliberately NOT captured here; the delivery worker
/// re-reads it at execution time so settings fixed after arrival still apply.
/// The queue payload shape is `{sender, body, time}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub sender: Option<String>,
    pub body: String,
    #[serde(rename = "time")]
    pub received_at: i64,
}

impl From<InboundMessage> for DeliveryJob {
    fn from(message: InboundMessage) -> Self {
        Self {
            sender: message.sender,
            body: message.body,
            received_at: message.received_at,
        }
    }
}

impl DeliveryJob {
    /// Sender as shown in the subject and rendered bodies.
    pub fn sender_display(&self) -> &str {
        match self.sender.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => "unknown sender",
        }
    }
}

/// Opaque queue identifier. Logged, never interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of one delivery attempt, driving the queue's re-invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Retry,
    PermanentFailure,
}

/// Point-in-time snapshot of the user's forwarding settings.
///
/// Read fresh at intake and again at each delivery attempt; two reads may
/// legitimately observe different values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardingConfig {
    pub enabled: bool,
    pub sender_credential: Option<String>,
    pub sender_address: Option<String>,
    pub target_address: Option<String>,
}

impl ForwardingConfig {
    /// Snapshot meaning "forwarding is off" (what an absent store reads as).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Names of the delivery-required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.sender_credential) {
            missing.push("smtpPassword");
        }
        if blank(&self.sender_address) {
            missing.push("smtpEmail");
        }
        if blank(&self.target_address) {
            missing.push("targetEmail");
        }
        missing
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

/// Rendered email content. Ephemeral; a pure function of the job fields and
/// the template in effect at render time.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// A rendered email plus addressing, ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundEmail {
    pub sender_name: String,
    pub sender_address: String,
    pub target_name: String,
    pub target_address: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}
