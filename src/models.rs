use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GmailError;

/// Gmail system label ids used by the orchestration layer
pub mod system_labels {
    pub const INBOX: &str = "INBOX";
    pub const SPAM: &str = "SPAM";
    pub const IMPORTANT: &str = "IMPORTANT";
    pub const TRASH: &str = "TRASH";
}

/// Raw message metadata as fetched from Gmail, before display mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    pub thread_id: String,
    pub snippet: String,
    pub subject: String,
    /// Raw `From` header
    pub from: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Raw `Date` header
    pub date: String,
    pub internal_date: Option<DateTime<Utc>>,
    pub label_ids: Vec<String>,
    pub size_estimate: u64,
    pub list_unsubscribe: Option<String>,
    pub list_unsubscribe_post: Option<String>,
}

/// Email snapshot returned to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub snippet: String,
    pub from: String,
    pub date: String,
    /// Label display names (raw ids are mapped through the label table)
    pub labels: Vec<String>,
}

/// Email annotated with its estimated size in bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LargeEmail {
    #[serde(flatten)]
    pub email: Email,
    pub size_estimate: u64,
}

/// Labels the triage flow can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmailLabel {
    Spam,
    Important,
    Ads,
}

impl EmailLabel {
    pub const ALL: [EmailLabel; 3] = [EmailLabel::Spam, EmailLabel::Important, EmailLabel::Ads];

    /// Display name, which is also the custom label name for `Ads`
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailLabel::Spam => "Spam",
            EmailLabel::Important => "Important",
            EmailLabel::Ads => "Ads",
        }
    }

    /// Fixed Gmail id for system-backed labels, `None` for custom ones
    pub fn system_id(&self) -> Option<&'static str> {
        match self {
            EmailLabel::Spam => Some(system_labels::SPAM),
            EmailLabel::Important => Some(system_labels::IMPORTANT),
            EmailLabel::Ads => None,
        }
    }
}

impl fmt::Display for EmailLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailLabel {
    type Err = GmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spam" => Ok(EmailLabel::Spam),
            "important" => Ok(EmailLabel::Important),
            "ads" | "promotional" => Ok(EmailLabel::Ads),
            other => Err(GmailError::InvalidRequest(format!(
                "Unknown label '{}'. Must be one of Spam, Important, Ads",
                other
            ))),
        }
    }
}

impl TryFrom<String> for EmailLabel {
    type Error = GmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmailLabel> for String {
    fn from(label: EmailLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Mailbox view requested by the inbox list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    AllEmail,
    Label(EmailLabel),
}

impl FromStr for Category {
    type Err = GmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "" | "all" | "all email" | "inbox" => Ok(Category::AllEmail),
            _ => s.parse().map(Category::Label),
        }
    }
}

/// Derived newsletter subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Id of the newest message seen from this sender
    pub id: String,
    pub sender: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe_email: Option<String>,
    #[serde(default)]
    pub one_click: bool,
    #[serde(default)]
    pub last_seen: String,
}

/// Per-sender message count over the analytics window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderStat {
    pub sender: String,
    pub email: String,
    pub count: usize,
}

/// Standing "from sender, add label" rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub from: String,
    pub add_label_id: String,
}

/// Result of labeling a message and everything else from its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLabelOutcome {
    pub label_id: String,
    pub sender: Option<String>,
    pub filter_id: Option<String>,
    pub filter_created: bool,
    pub messages_labeled: usize,
}

/// What happened when unsubscribing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UnsubscribeOutcome {
    /// Sent an unsubscribe email or a one-click POST
    Unsubscribed,
    /// Nothing machine-actionable; the user has to open the link
    Manual { url: String },
}
