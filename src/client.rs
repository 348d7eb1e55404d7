//! Gmail API client with per-call timeouts, plus pagination and batching helpers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::api::{
    BatchModifyMessagesRequest, Filter, FilterAction, FilterCriteria, Label, Message,
    ModifyMessageRequest,
};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};
use crate::headers::parse_sender;
use crate::models::{FilterRule, MessageMetadata};

/// Gmail accepts at most this many ids per batchModify call
pub const BATCH_MODIFY_LIMIT: usize = 1000;

/// Largest page `users.messages.list` will return
pub const MAX_PAGE_SIZE: u32 = 500;

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";
const SETTINGS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.settings.basic";

/// Headers requested with `format=metadata`
const METADATA_HEADERS: &[&str] = &[
    "From",
    "Subject",
    "Date",
    "List-Unsubscribe",
    "List-Unsubscribe-Post",
];

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Existing Gmail filter info for comparison
#[derive(Debug, Clone, Default)]
pub struct ExistingFilterInfo {
    pub id: String,
    pub from: Option<String>,
    pub query: Option<String>,
    pub add_label_ids: Vec<String>,
}

/// Parameters of one `users.messages.list` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageListQuery {
    pub query: Option<String>,
    pub label_ids: Vec<String>,
    pub page_size: u32,
}

impl MessageListQuery {
    pub fn with_label(label_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            query: None,
            label_ids: vec![label_id.into()],
            page_size,
        }
    }

    pub fn with_query(query: impl Into<String>, page_size: u32) -> Self {
        Self {
            query: Some(query.into()),
            label_ids: Vec::new(),
            page_size,
        }
    }
}

/// One page of message ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Trait defining Gmail client operations for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label, returning its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Fetch one page of message ids
    async fn list_messages_page(
        &self,
        query: &MessageListQuery,
        page_token: Option<String>,
    ) -> Result<MessagePage>;

    /// Get message metadata (headers, snippet, size, label ids)
    async fn get_message(&self, id: &str) -> Result<MessageMetadata>;

    /// Add and remove labels on a single message
    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;

    /// One batchModify call; callers must stay within BATCH_MODIFY_LIMIT ids
    async fn batch_modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize>;

    /// List all existing filters
    async fn list_filters(&self) -> Result<Vec<ExistingFilterInfo>>;

    /// Create a new filter rule, returning its id
    async fn create_filter(&self, filter: &FilterRule) -> Result<String>;

    /// Send an RFC 822 message, returning the sent message id
    async fn send_message(&self, raw: Vec<u8>) -> Result<String>;
}

/// Page through a listing, deduplicating ids and stopping at `limit`
pub async fn collect_message_ids(
    client: &dyn GmailClient,
    query: &MessageListQuery,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut all_ids = Vec::new();
    let mut seen = HashSet::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = client
            .list_messages_page(query, page_token.take())
            .await?;

        for id in page.ids {
            if seen.insert(id.clone()) {
                all_ids.push(id);
            }
            if limit.is_some_and(|max| all_ids.len() >= max) {
                return Ok(all_ids);
            }
        }

        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    debug!("Collected {} message ids", all_ids.len());
    Ok(all_ids)
}

/// Modify labels across any number of messages in BATCH_MODIFY_LIMIT chunks
pub async fn batch_modify_in_chunks(
    client: &dyn GmailClient,
    message_ids: &[String],
    add_label_ids: &[String],
    remove_label_ids: &[String],
) -> Result<usize> {
    let mut total_modified = 0;

    for chunk in message_ids.chunks(BATCH_MODIFY_LIMIT) {
        total_modified += client
            .batch_modify_labels(chunk, add_label_ids, remove_label_ids)
            .await?;
    }

    Ok(total_modified)
}

/// Production Gmail client bound to one access token
pub struct ProductionGmailClient {
    hub: GmailHub,
    request_timeout: Duration,
}

impl ProductionGmailClient {
    /// Create a new production Gmail client
    ///
    /// # Arguments
    /// * `hub` - Gmail API hub instance
    /// * `request_timeout` - Upper bound for each Gmail API call
    pub fn new(hub: GmailHub, request_timeout: Duration) -> Self {
        Self {
            hub,
            request_timeout,
        }
    }

    /// Run a Gmail call, turning an elapsed timeout into a network error
    async fn with_timeout<T, Fut>(&self, operation_name: &str, operation: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, self.request_timeout
                );
                Err(GmailError::NetworkError(format!(
                    "{} timed out after {:?}",
                    operation_name, self.request_timeout
                )))
            }
        }
    }
}

/// Parse Gmail API Message into our MessageMetadata structure
fn parse_message_metadata(msg: Message) -> Result<MessageMetadata> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let thread_id = msg
        .thread_id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing thread ID".to_string()))?;

    let mut metadata = MessageMetadata {
        id,
        thread_id,
        snippet: msg.snippet.unwrap_or_default(),
        internal_date: msg.internal_date.and_then(DateTime::<Utc>::from_timestamp_millis),
        label_ids: msg.label_ids.unwrap_or_default(),
        size_estimate: msg.size_estimate.map(|s| s.max(0) as u64).unwrap_or(0),
        ..Default::default()
    };

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default();

    for header in headers {
        if let (Some(name), Some(value)) = (header.name, header.value) {
            match name.to_lowercase().as_str() {
                "from" => {
                    let (sender_name, sender_email) = parse_sender(&value);
                    metadata.sender_name = sender_name;
                    metadata.sender_email = sender_email;
                    metadata.from = value;
                }
                "subject" => metadata.subject = value,
                "date" => metadata.date = value,
                "list-unsubscribe" => metadata.list_unsubscribe = Some(value),
                "list-unsubscribe-post" => metadata.list_unsubscribe_post = Some(value),
                _ => {}
            }
        }
    }

    Ok(metadata)
}

fn non_empty(ids: &[String]) -> Option<Vec<String>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.to_vec())
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        self.with_timeout("list_labels", async {
            debug!("Calling Gmail API to list labels...");
            let (_, response) = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(LABELS_SCOPE)
                .doit()
                .await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Successfully parsed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        self.with_timeout("create_label", async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created_label) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(LABELS_SCOPE)
                .doit()
                .await?;

            created_label
                .id
                .ok_or_else(|| GmailError::LabelError("Created label has no ID".to_string()))
        })
        .await
    }

    async fn list_messages_page(
        &self,
        query: &MessageListQuery,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        self.with_timeout("list_messages", async {
            let mut call = self
                .hub
                .users()
                .messages_list("me")
                .max_results(query.page_size.clamp(1, MAX_PAGE_SIZE));

            if let Some(q) = query.query.as_deref() {
                call = call.q(q);
            }
            for label_id in &query.label_ids {
                call = call.add_label_ids(label_id);
            }
            if let Some(token) = page_token.as_deref() {
                call = call.page_token(token);
            }

            let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;

            let ids = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect();

            Ok(MessagePage {
                ids,
                next_page_token: response.next_page_token,
            })
        })
        .await
    }

    async fn get_message(&self, id: &str) -> Result<MessageMetadata> {
        self.with_timeout("get_message", async {
            let mut call = self.hub.users().messages_get("me", id).format("metadata");
            for header in METADATA_HEADERS {
                call = call.add_metadata_headers(header);
            }

            let (_, msg) = call.add_scope(MODIFY_SCOPE).doit().await?;
            parse_message_metadata(msg)
        })
        .await
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        self.with_timeout("modify_message", async {
            let modify_request = ModifyMessageRequest {
                add_label_ids: non_empty(add_label_ids),
                remove_label_ids: non_empty(remove_label_ids),
            };

            self.hub
                .users()
                .messages_modify(modify_request, "me", message_id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            Ok(())
        })
        .await
    }

    async fn batch_modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        if message_ids.len() > BATCH_MODIFY_LIMIT {
            return Err(GmailError::InvalidRequest(format!(
                "batchModify accepts at most {} ids, got {}",
                BATCH_MODIFY_LIMIT,
                message_ids.len()
            )));
        }

        self.with_timeout("batch_modify_labels", async {
            let request = BatchModifyMessagesRequest {
                ids: Some(message_ids.to_vec()),
                add_label_ids: non_empty(add_label_ids),
                remove_label_ids: non_empty(remove_label_ids),
            };

            self.hub
                .users()
                .messages_batch_modify(request, "me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            Ok(message_ids.len())
        })
        .await
    }

    async fn list_filters(&self) -> Result<Vec<ExistingFilterInfo>> {
        self.with_timeout("list_filters", async {
            debug!("Calling Gmail API to list filters...");
            let (_, response) = self
                .hub
                .users()
                .settings_filters_list("me")
                .add_scope(SETTINGS_SCOPE)
                .doit()
                .await?;

            let filters: Vec<ExistingFilterInfo> = response
                .filter
                .unwrap_or_default()
                .into_iter()
                .filter_map(|f| {
                    let id = f.id?;
                    let criteria = f.criteria.unwrap_or_default();
                    let action = f.action.unwrap_or_default();

                    Some(ExistingFilterInfo {
                        id,
                        from: criteria.from,
                        query: criteria.query,
                        add_label_ids: action.add_label_ids.unwrap_or_default(),
                    })
                })
                .collect();

            debug!("Successfully parsed {} filters", filters.len());
            Ok(filters)
        })
        .await
    }

    async fn create_filter(&self, filter: &FilterRule) -> Result<String> {
        self.with_timeout("create_filter", async {
            let gmail_filter = Filter {
                criteria: Some(FilterCriteria {
                    from: Some(filter.from.clone()),
                    ..Default::default()
                }),
                action: Some(FilterAction {
                    add_label_ids: Some(vec![filter.add_label_id.clone()]),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let (_, created_filter) = self
                .hub
                .users()
                .settings_filters_create(gmail_filter, "me")
                .add_scope(SETTINGS_SCOPE)
                .doit()
                .await?;

            created_filter
                .id
                .ok_or_else(|| GmailError::FilterError("Created filter has no ID".to_string()))
        })
        .await
    }

    async fn send_message(&self, raw: Vec<u8>) -> Result<String> {
        let mime_type: mime::Mime = "message/rfc822"
            .parse()
            .map_err(|e| GmailError::Unknown(format!("Invalid mime type: {}", e)))?;

        self.with_timeout("send_message", async {
            let (_, sent) = self
                .hub
                .users()
                .messages_send(Message::default(), "me")
                .add_scope(MODIFY_SCOPE)
                .upload(std::io::Cursor::new(raw), mime_type)
                .await?;

            sent.id
                .ok_or_else(|| GmailError::InvalidMessageFormat("Sent message has no ID".to_string()))
        })
        .await
    }
}
