//! Turns a delivery job into email content.
//!
//! Rendering is pure: same job, same template, same output. Escaping always
//! runs before any markup-producing step so message content can never inject
//! tags into the HTML body.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::domain::{DeliveryJob, RenderedEmail};
use crate::Result;

/// Built-in HTML layout used whenever no template file is readable.
pub const FALLBACK_HTML: &str = "<h3>📱 New SMS Received</h3>\
    <p><strong>From:</strong> {{sender}}</p>\
    <p><strong>Time:</strong> {{time}}</p>\
    <hr>\
    <p>{{body}}</p>";

/// Escapes the five HTML-significant characters. `&` goes first so already
/// produced entities are not double-escaped.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wraps URLs in anchor tags. Input must already be escaped; the character
/// class leaves out everything escaping produces (`&`, quotes, angle
/// brackets) so a URL can never swallow part of an entity.
pub fn linkify(escaped: &str) -> String {
    let re = Regex::new(r"[A-Za-z][A-Za-z0-9+.-]*://[A-Za-z0-9._~:/?#@!$+,;%=-]+")
        .expect("valid regex");
    re.replace_all(escaped, r#"<a href="$0">$0</a>"#).into_owned()
}

/// Epoch millis as `YYYY-MM-DD HH:MM:SS UTC`; values chrono cannot represent
/// fall back to the raw number.
pub fn format_timestamp(epoch_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(epoch_ms) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => epoch_ms.to_string(),
    }
}

#[derive(serde::Deserialize)]
struct TemplateFile {
    template: String,
}

/// HTML layout with `{{sender}}`, `{{time}}` and `{{body}}` placeholders.
#[derive(Clone, Debug)]
pub struct EmailTemplate {
    html: String,
}

impl EmailTemplate {
    pub fn fallback() -> Self {
        Self {
            html: FALLBACK_HTML.to_string(),
        }
    }

    /// Reads the template file if one is configured and parseable, otherwise
    /// returns the built-in layout. A broken template never blocks delivery.
    pub async fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::fallback();
        };
        match Self::read(path).await {
            Ok(template) => template,
            Err(e) => {
                debug!(path = %path.display(), "using built-in email template: {e}");
                Self::fallback()
            }
        }
    }

    async fn read(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let file: TemplateFile = serde_json::from_str(&raw)?;
        Ok(Self { html: file.template })
    }

    pub fn render(&self, job: &DeliveryJob) -> RenderedEmail {
        let sender = job.sender_display();
        let time = format_timestamp(job.received_at);
        // Body is substituted last: placeholder-like text inside the message
        // must stay literal instead of being expanded again.
        let html_body = self
            .html
            .replace("{{sender}}", &escape_html(sender))
            .replace("{{time}}", &time)
            .replace("{{body}}", &linkify(&escape_html(&job.body)));
        let text_body = format!(
            "From: {sender}\nTime: {time}\n\nMessage:\n{body}",
            body = job.body
        );
        RenderedEmail {
            subject: format!("SMS from {sender}"),
            html_body,
            text_body,
        }
    }
}
