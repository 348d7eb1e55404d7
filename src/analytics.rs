//! Mailbox analytics: large emails and sender ranking

use std::collections::HashMap;
use tracing::{debug, info};

use crate::client::{collect_message_ids, MessageListQuery};
use crate::error::{GmailError, Result};
use crate::inbox::{to_email, InboxService};
use crate::labels::LabelTable;
use crate::models::{LargeEmail, MessageMetadata, SenderStat};
use crate::query::{megabytes_to_bytes, GmailQuery};

impl InboxService {
    /// Messages larger than `min_size_mb`, biggest first
    pub async fn list_large_emails(&self, min_size_mb: u64) -> Result<Vec<LargeEmail>> {
        if min_size_mb == 0 {
            return Err(GmailError::InvalidRequest(
                "minSize must be a positive number of megabytes".to_string(),
            ));
        }

        let client = self.client();
        let labels = LabelTable::load(client).await?;

        let limit = self.config.large_emails.limit;
        let query = MessageListQuery::with_query(
            GmailQuery::new()
                .larger_than_bytes(megabytes_to_bytes(min_size_mb))
                .build(),
            self.page_size_for(limit),
        );
        let ids = collect_message_ids(client, &query, Some(limit)).await?;
        debug!("Found {} messages over {} MB", ids.len(), min_size_mb);

        let mut large: Vec<LargeEmail> = self
            .fetch_metadata(ids)
            .await
            .into_iter()
            .map(|message| {
                let size_estimate = message.size_estimate;
                LargeEmail {
                    email: to_email(message, &labels),
                    size_estimate,
                }
            })
            .collect();

        large.sort_by(|a, b| b.size_estimate.cmp(&a.size_estimate));
        Ok(large)
    }

    /// Top senders over the most recent analytics window
    pub async fn get_sender_stats(&self) -> Result<Vec<SenderStat>> {
        let window = self.config.analytics.window;
        let query = MessageListQuery {
            query: None,
            label_ids: Vec::new(),
            page_size: self.page_size_for(window),
        };
        let ids = collect_message_ids(self.client(), &query, Some(window)).await?;

        let messages = self.fetch_metadata(ids).await;
        let stats = rank_senders(&messages, self.config.analytics.top_senders);

        info!(
            "Ranked {} senders over {} messages",
            stats.len(),
            messages.len()
        );
        Ok(stats)
    }
}

/// Count messages per sender address and rank them
///
/// Addresses compare case-insensitively. The display name is the first one
/// seen for that address. Ties break on address so the order is stable.
pub fn rank_senders(messages: &[MessageMetadata], top: usize) -> Vec<SenderStat> {
    let mut by_address: HashMap<String, SenderStat> = HashMap::new();

    for message in messages {
        let email = message.sender_email.trim().to_lowercase();
        if email.is_empty() {
            continue;
        }

        by_address
            .entry(email.clone())
            .or_insert_with(|| SenderStat {
                sender: if message.sender_name.is_empty() {
                    email.clone()
                } else {
                    message.sender_name.clone()
                },
                email,
                count: 0,
            })
            .count += 1;
    }

    let mut stats: Vec<SenderStat> = by_address.into_values().collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.email.cmp(&b.email)));
    stats.truncate(top);
    stats
}
