use super::report_builder::{Report, Update};
use crate::error::{PinupError, Result};
use crate::utils::verbose::verbose;
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK";
const USERNAME: &str = "Container Factory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub username: String,
    pub content: String,
}

impl WebhookMessage {
    pub fn image_pushed(image: &str, tag: &str, digest: &str) -> Self {
        Self {
            username: USERNAME.to_string(),
            content: format!(
                "**New Image Pushed**\n**Image:** `{image}`\n**Tag:** `{tag}`\n**Digest:** `{digest}`\n\nUpdate your manifests to use this secure pinning!"
            ),
        }
    }
}

/// Posts messages to a Discord webhook.
pub struct DiscordNotifier {
    client: Client,
    webhook: Url,
}

impl DiscordNotifier {
    pub fn new(webhook: &str) -> Result<Self> {
        let webhook = Url::parse(webhook.trim())
            .map_err(|e| PinupError::Config(format!("Invalid {WEBHOOK_ENV} URL: {e}")))?;
        if !matches!(webhook.scheme(), "http" | "https") {
            return Err(PinupError::Config(format!(
                "{WEBHOOK_ENV} must be an http(s) URL"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("pinup/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, webhook })
    }

    /// `None` when the webhook variable is unset or blank.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(WEBHOOK_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::new(&value).map(Some),
            _ => Ok(None),
        }
    }

    /// Deliver `message`; returns the response status line.
    pub fn send(&self, message: &WebhookMessage) -> Result<String> {
        verbose!("POST {}", self.webhook.host_str().unwrap_or("webhook"));
        let response = self
            .client
            .post(self.webhook.clone())
            .json(message)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PinupError::RemoteApi(format!(
                "Webhook returned {status}"
            )));
        }
        Ok(status.to_string())
    }
}

/// Section of a report rendered as embed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    Updates,
    Warnings,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: String, value: String) -> Self {
        Self {
            name,
            value,
            inline: false,
        }
    }
}

fn short(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}

pub fn embed_fields(report: &Report, section: ReportSection) -> Vec<EmbedField> {
    match section {
        ReportSection::Updates => report.updates.iter().map(update_field).collect(),
        ReportSection::Warnings => report
            .warnings
            .iter()
            .map(|w| EmbedField::new(w.subject.clone(), format!("File: `{}`\n{}", w.file, w.reason)))
            .collect(),
        ReportSection::Success => vec![EmbedField::new(
            "Status".to_string(),
            format!(
                "{} dependencies checked. All up to date.",
                report.up_to_date.len()
            ),
        )],
    }
}

fn update_field(update: &Update) -> EmbedField {
    match update {
        Update::DockerDigest {
            file,
            image,
            tag,
            current_digest,
            latest_digest,
            ..
        } => EmbedField::new(
            format!("{image}:{tag}"),
            format!(
                "File: `{file}`\nOld: `{}...`\nNew: `{}...`",
                short(current_digest, 19),
                short(latest_digest, 19)
            ),
        ),
        Update::DockerUnpinned {
            file,
            image,
            tag,
            latest_digest,
            ..
        } => EmbedField::new(
            format!("{image}:{tag}"),
            format!(
                "File: `{file}`\nStatus: Pinned to `{}...`",
                short(latest_digest, 19)
            ),
        ),
        Update::ActionPinned {
            file,
            action,
            tag,
            current_sha,
            latest_sha,
            ..
        } => EmbedField::new(
            format!("{action}@{tag}"),
            format!(
                "File: `{file}`\nOld: `{}`\nNew: `{}`",
                short(current_sha, 12),
                short(latest_sha, 12)
            ),
        ),
        Update::ActionUnpinned {
            file,
            action,
            tag,
            latest_sha,
            ..
        } => EmbedField::new(
            format!("{action}@{tag}"),
            format!("File: `{file}`\nStatus: Pinned to `{}`", short(latest_sha, 12)),
        ),
        Update::VariantUpdate {
            file,
            current_version,
            latest_version,
            ..
        } => EmbedField::new(
            file.clone(),
            format!("Old: `{current_version}`\nNew: `{latest_version}`"),
        ),
    }
}
