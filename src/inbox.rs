//! Inbox orchestration: listing, labeling, archiving and trashing
//!
//! Each method is one self-contained sequence of Gmail calls made with the
//! caller's token. Nothing is cached between requests.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{batch_modify_in_chunks, collect_message_ids, GmailClient, MessageListQuery, MAX_PAGE_SIZE};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::filters::ensure_filter;
use crate::headers::sender_address;
use crate::labels::{resolve_label, LabelTable, Resolution};
use crate::models::{
    system_labels, ApplyLabelOutcome, Category, Email, EmailLabel, FilterRule, MessageMetadata,
};
use crate::query::{stale_cutoff, GmailQuery};

/// Request-scoped facade over the Gmail client
pub struct InboxService {
    pub(crate) client: Arc<dyn GmailClient>,
    pub(crate) config: Arc<Config>,
    pub(crate) http: reqwest::Client,
}

impl InboxService {
    pub fn new(client: Arc<dyn GmailClient>, config: Arc<Config>, http: reqwest::Client) -> Self {
        Self {
            client,
            config,
            http,
        }
    }

    pub(crate) fn client(&self) -> &dyn GmailClient {
        self.client.as_ref()
    }

    /// Page size for listings that stop at `limit`
    pub(crate) fn page_size_for(&self, limit: usize) -> u32 {
        let limit = u32::try_from(limit).unwrap_or(MAX_PAGE_SIZE);
        limit.clamp(1, self.config.gmail.page_size)
    }

    /// Fetch metadata for each id concurrently, keeping list order
    ///
    /// A message that fails to load is logged and left out.
    pub(crate) async fn fetch_metadata(&self, ids: Vec<String>) -> Vec<MessageMetadata> {
        let requested = ids.len();
        let client = self.client();

        let messages: Vec<MessageMetadata> = stream::iter(ids)
            .map(|id| async move {
                match client.get_message(&id).await {
                    Ok(message) => Some(message),
                    Err(e) => {
                        warn!("Dropping message {} from results: {}", id, e);
                        None
                    }
                }
            })
            .buffered(self.config.gmail.max_concurrent_requests)
            .filter_map(|message| async move { message })
            .collect()
            .await;

        if messages.len() < requested {
            debug!("Fetched {}/{} messages", messages.len(), requested);
        }
        messages
    }

    /// List the newest messages in a category
    pub async fn list_emails(&self, category: Category) -> Result<Vec<Email>> {
        let client = self.client();
        let mut labels = LabelTable::load(client).await?;
        let label_id = labels.resolve_category(client, category).await?;

        let limit = self.config.gmail.list_limit;
        let query = MessageListQuery::with_label(label_id.clone(), self.page_size_for(limit));
        let ids = collect_message_ids(client, &query, Some(limit)).await?;
        debug!("Listing {} messages under {}", ids.len(), label_id);

        let messages = self.fetch_metadata(ids).await;
        Ok(messages
            .into_iter()
            .map(|m| to_email(m, &labels))
            .collect())
    }

    /// Label one message and every other message from the same sender
    ///
    /// Also leaves a standing filter so future mail from that sender gets
    /// the label automatically.
    pub async fn apply_label(&self, email_id: &str, label: EmailLabel) -> Result<ApplyLabelOutcome> {
        let client = self.client();
        let label_id = resolve_label(client, label, Resolution::LookupOrCreate)
            .await?
            .ok_or_else(|| GmailError::LabelError(format!("Label '{}' could not be resolved", label)))?;

        let message = client.get_message(email_id).await?;
        let add = vec![label_id.clone()];

        let Some(sender) = sender_address(&message.from) else {
            warn!(
                "Message {} has no usable sender ({:?}); labeling it alone",
                email_id, message.from
            );
            client.modify_message(email_id, &add, &[]).await?;
            return Ok(ApplyLabelOutcome {
                label_id,
                sender: None,
                filter_id: None,
                filter_created: false,
                messages_labeled: 1,
            });
        };

        let filter = ensure_filter(client, &FilterRule::for_sender(&sender, &label_id)).await?;

        let query = MessageListQuery::with_query(
            GmailQuery::new().from_sender(&sender).build(),
            MAX_PAGE_SIZE,
        );
        let mut ids = collect_message_ids(client, &query, None).await?;
        if !ids.iter().any(|id| id == email_id) {
            ids.push(email_id.to_string());
        }

        let messages_labeled = batch_modify_in_chunks(client, &ids, &add, &[]).await?;
        info!(
            "Applied {} to {} messages from {}",
            label, messages_labeled, sender
        );

        Ok(ApplyLabelOutcome {
            label_id,
            sender: Some(sender),
            filter_id: Some(filter.id),
            filter_created: filter.created,
            messages_labeled,
        })
    }

    /// Archive one message by removing it from the inbox
    pub async fn archive_email(&self, email_id: &str) -> Result<()> {
        self.client()
            .modify_message(email_id, &[], &[system_labels::INBOX.to_string()])
            .await?;
        info!("Archived message {}", email_id);
        Ok(())
    }

    /// Move specific messages to trash; returns how many were moved
    pub async fn trash_emails(&self, email_ids: &[String]) -> Result<usize> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = email_ids
            .iter()
            .filter(|id| !id.trim().is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        // Trash label only: recoverable until Gmail's own retention expires
        let trashed = batch_modify_in_chunks(
            self.client(),
            &ids,
            &[system_labels::TRASH.to_string()],
            &[],
        )
        .await?;

        info!("Moved {} messages to trash", trashed);
        Ok(trashed)
    }

    /// Move every message carrying `label` to trash
    pub async fn batch_delete_by_label(&self, label: EmailLabel) -> Result<usize> {
        let client = self.client();
        let Some(label_id) = resolve_label(client, label, Resolution::Lookup).await? else {
            info!("Label {} does not exist; nothing to clean", label);
            return Ok(0);
        };

        let query = MessageListQuery::with_label(label_id, self.config.gmail.page_size);
        let ids = collect_message_ids(client, &query, None).await?;
        info!("Cleaning {} messages labeled {}", ids.len(), label);

        self.trash_emails(&ids).await
    }

    /// Move messages carrying `label` that are older than `older_than_days` to trash
    pub async fn clean_stale_emails(&self, label: EmailLabel, older_than_days: u32) -> Result<usize> {
        self.clean_stale_emails_at(label, older_than_days, Utc::now())
            .await
    }

    /// Same as `clean_stale_emails` with an explicit clock
    pub async fn clean_stale_emails_at(
        &self,
        label: EmailLabel,
        older_than_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if older_than_days == 0 {
            return Err(GmailError::InvalidRequest(
                "olderThanDays must be at least 1".to_string(),
            ));
        }

        let client = self.client();
        let Some(label_id) = resolve_label(client, label, Resolution::Lookup).await? else {
            info!("Label {} does not exist; nothing to clean", label);
            return Ok(0);
        };

        let cutoff = stale_cutoff(now, older_than_days);
        let query = MessageListQuery {
            query: Some(GmailQuery::new().before(cutoff).build()),
            label_ids: vec![label_id],
            page_size: self.config.gmail.page_size,
        };
        let ids = collect_message_ids(client, &query, None).await?;
        info!(
            "Cleaning {} {} messages older than {} days (before {})",
            ids.len(),
            label,
            older_than_days,
            cutoff
        );

        self.trash_emails(&ids).await
    }
}

/// Assemble the UI snapshot, mapping raw label ids to names
pub(crate) fn to_email(message: MessageMetadata, labels: &LabelTable) -> Email {
    Email {
        labels: labels.display_names(&message.label_ids),
        id: message.id,
        thread_id: message.thread_id,
        subject: message.subject,
        snippet: message.snippet,
        from: message.from,
        date: message.date,
    }
}
