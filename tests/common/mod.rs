//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::mock;
use smart_inbox::auth::GmailClientFactory;
use smart_inbox::client::{
    ExistingFilterInfo, GmailClient, LabelInfo, MessageListQuery, MessagePage, BATCH_MODIFY_LIMIT,
};
use smart_inbox::config::Config;
use smart_inbox::error::{GmailError, Result};
use smart_inbox::headers::parse_sender;
use smart_inbox::inbox::InboxService;
use smart_inbox::models::{system_labels, FilterRule, MessageMetadata};
use smart_inbox::server::{router, AppState};
use smart_inbox::subscriptions::unsubscribe_http_client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Create a test message with default values
pub fn create_test_message(id: &str, from: &str, subject: &str) -> MessageMetadata {
    let (sender_name, sender_email) = parse_sender(from);

    MessageMetadata {
        id: id.to_string(),
        thread_id: format!("thread_{}", id),
        snippet: format!("Snippet of {}", subject),
        subject: subject.to_string(),
        from: from.to_string(),
        sender_name,
        sender_email,
        date: "Mon, 1 Jan 2024 10:00:00 -0800".to_string(),
        internal_date: Some(Utc::now()),
        label_ids: vec![system_labels::INBOX.to_string()],
        size_estimate: 4_096,
        list_unsubscribe: None,
        list_unsubscribe_post: None,
    }
}

/// Create a message received on a given UTC day
pub fn create_dated_message(id: &str, from: &str, received: NaiveDate) -> MessageMetadata {
    let mut message = create_test_message(id, from, "Dated");
    message.internal_date = received
        .and_hms_opt(12, 0, 0)
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    message
}

/// Create a message received at an exact instant
pub fn create_message_received_at(id: &str, from: &str, received: DateTime<Utc>) -> MessageMetadata {
    let mut message = create_test_message(id, from, "Timed");
    message.internal_date = Some(received);
    message
}

/// Create a newsletter message carrying List-Unsubscribe headers
pub fn create_newsletter_message(id: &str, from: &str, list_unsubscribe: &str) -> MessageMetadata {
    let mut message = create_test_message(id, from, "Weekly Newsletter");
    message.list_unsubscribe = Some(list_unsubscribe.to_string());
    message
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Create a test ExistingFilterInfo
pub fn create_test_existing_filter(id: &str, from: &str, add_label_ids: Vec<&str>) -> ExistingFilterInfo {
    ExistingFilterInfo {
        id: id.to_string(),
        from: Some(from.to_string()),
        query: None,
        add_label_ids: add_label_ids.into_iter().map(|s| s.to_string()).collect(),
    }
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn list_messages_page(
            &self,
            query: &MessageListQuery,
            page_token: Option<String>,
        ) -> Result<MessagePage>;
        async fn get_message(&self, id: &str) -> Result<MessageMetadata>;
        async fn modify_message(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
        async fn batch_modify_labels(
            &self,
            message_ids: &[String],
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<usize>;
        async fn list_filters(&self) -> Result<Vec<ExistingFilterInfo>>;
        async fn create_filter(&self, filter: &FilterRule) -> Result<String>;
        async fn send_message(&self, raw: Vec<u8>) -> Result<String>;
    }
}

#[derive(Default)]
struct MailboxState {
    /// Newest first, as Gmail lists them
    messages: Vec<MessageMetadata>,
    labels: Vec<LabelInfo>,
    filters: Vec<ExistingFilterInfo>,
    sent: Vec<Vec<u8>>,
    batch_sizes: Vec<usize>,
    failing: HashSet<String>,
    next_id: usize,
}

/// In-memory Gmail account implementing the same search semantics the
/// service relies on: label scoping, `from:`, `before:`, `larger:` and
/// free-text terms, with spam and trash hidden unless asked for
#[derive(Default)]
pub struct FakeMailbox {
    state: Mutex<MailboxState>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<MessageMetadata>) -> Self {
        let mailbox = Self::new();
        for message in messages {
            mailbox.add_message(message);
        }
        mailbox
    }

    pub fn add_message(&self, message: MessageMetadata) {
        self.state.lock().unwrap().messages.push(message);
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .labels
            .push(create_test_label_info(id, name));
    }

    pub fn add_filter(&self, filter: ExistingFilterInfo) {
        self.state.lock().unwrap().filters.push(filter);
    }

    /// Make `get_message` fail for this id
    pub fn fail_fetch(&self, id: &str) {
        self.state.lock().unwrap().failing.insert(id.to_string());
    }

    pub fn message(&self, id: &str) -> MessageMetadata {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no message {}", id))
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    pub fn has_label(&self, id: &str, label_id: &str) -> bool {
        self.message(id).label_ids.iter().any(|l| l == label_id)
    }

    pub fn labels(&self) -> Vec<LabelInfo> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn filters(&self) -> Vec<ExistingFilterInfo> {
        self.state.lock().unwrap().filters.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    fn next_id(state: &mut MailboxState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{}_{}", prefix, state.next_id)
    }
}

fn matches_term(message: &MessageMetadata, term: &str) -> bool {
    if let Some(sender) = term.strip_prefix("from:") {
        let sender = sender.trim_start_matches('(').trim_end_matches(')');
        return message.sender_email.eq_ignore_ascii_case(sender);
    }
    if let Some(cutoff) = term.strip_prefix("before:") {
        // Only epoch seconds; Gmail would read a bare date as Pacific midnight
        let Ok(cutoff) = cutoff.parse::<i64>() else {
            panic!("before: expects epoch seconds, got {:?}", cutoff);
        };
        return message
            .internal_date
            .map(|received| received.timestamp() < cutoff)
            .unwrap_or(false);
    }
    if let Some(bytes) = term.strip_prefix("larger:") {
        return bytes
            .parse::<u64>()
            .map(|min| message.size_estimate > min)
            .unwrap_or(false);
    }

    let term = term.to_lowercase();
    message.subject.to_lowercase().contains(&term)
        || message.snippet.to_lowercase().contains(&term)
        || (term == "unsubscribe" && message.list_unsubscribe.is_some())
}

fn matches_query(message: &MessageMetadata, query: &MessageListQuery) -> bool {
    let hidden = [system_labels::SPAM, system_labels::TRASH];
    let asks_for_hidden = query
        .label_ids
        .iter()
        .any(|l| hidden.contains(&l.as_str()));
    if !asks_for_hidden && message.label_ids.iter().any(|l| hidden.contains(&l.as_str())) {
        return false;
    }

    if !query
        .label_ids
        .iter()
        .all(|wanted| message.label_ids.contains(wanted))
    {
        return false;
    }

    query
        .query
        .as_deref()
        .map(|q| q.split_whitespace().all(|term| matches_term(message, term)))
        .unwrap_or(true)
}

fn apply_modification(message: &mut MessageMetadata, add: &[String], remove: &[String]) {
    for label in add {
        if !message.label_ids.contains(label) {
            message.label_ids.push(label.clone());
        }
    }
    message.label_ids.retain(|l| !remove.contains(l));
}

#[async_trait]
impl GmailClient for FakeMailbox {
    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Ok(self.labels())
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.labels.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
            return Err(GmailError::BadRequest(format!("Label name exists: {}", name)));
        }
        let id = Self::next_id(&mut state, "Label");
        state.labels.push(create_test_label_info(&id, name));
        Ok(id)
    }

    async fn list_messages_page(
        &self,
        query: &MessageListQuery,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let state = self.state.lock().unwrap();
        let matching: Vec<String> = state
            .messages
            .iter()
            .filter(|m| matches_query(m, query))
            .map(|m| m.id.clone())
            .collect();

        let offset: usize = page_token
            .as_deref()
            .map(|t| t.parse().unwrap())
            .unwrap_or(0);
        let page_size = query.page_size.max(1) as usize;
        let end = (offset + page_size).min(matching.len());

        Ok(MessagePage {
            ids: matching[offset.min(end)..end].to_vec(),
            next_page_token: if end < matching.len() {
                Some(end.to_string())
            } else {
                None
            },
        })
    }

    async fn get_message(&self, id: &str) -> Result<MessageMetadata> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(id) {
            return Err(GmailError::NetworkError(format!("fetch of {} failed", id)));
        }
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| GmailError::NotFound(id.to_string()))
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| GmailError::NotFound(message_id.to_string()))?;
        apply_modification(message, add_label_ids, remove_label_ids);
        Ok(())
    }

    async fn batch_modify_labels(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<usize> {
        if message_ids.len() > BATCH_MODIFY_LIMIT {
            return Err(GmailError::BadRequest("Too many ids".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        state.batch_sizes.push(message_ids.len());
        for message in state
            .messages
            .iter_mut()
            .filter(|m| message_ids.contains(&m.id))
        {
            apply_modification(message, add_label_ids, remove_label_ids);
        }
        Ok(message_ids.len())
    }

    async fn list_filters(&self) -> Result<Vec<ExistingFilterInfo>> {
        Ok(self.filters())
    }

    async fn create_filter(&self, filter: &FilterRule) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "Filter");
        state.filters.push(ExistingFilterInfo {
            id: id.clone(),
            from: Some(filter.from.clone()),
            query: None,
            add_label_ids: vec![filter.add_label_id.clone()],
        });
        Ok(id)
    }

    async fn send_message(&self, raw: Vec<u8>) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "Sent");
        state.sent.push(raw);
        Ok(id)
    }
}

/// Hands every token the same client and remembers which tokens it saw
pub struct StaticClientFactory {
    client: Arc<dyn GmailClient>,
    tokens: Mutex<Vec<String>>,
}

impl StaticClientFactory {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self {
            client,
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl GmailClientFactory for StaticClientFactory {
    fn for_token(&self, access_token: &str) -> Arc<dyn GmailClient> {
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.client.clone()
    }
}

/// Service that may POST to plain-http one-click links such as a local MockServer
pub fn service_allowing_http_one_click(client: Arc<dyn GmailClient>) -> InboxService {
    let mut config = Config::default();
    config.subscriptions.allow_insecure_one_click = true;
    service_with_config(client, config)
}

/// Service over `client` with default configuration
pub fn service(client: Arc<dyn GmailClient>) -> InboxService {
    service_with_config(client, Config::default())
}

pub fn service_with_config(client: Arc<dyn GmailClient>, config: Config) -> InboxService {
    let http = unsubscribe_http_client(&config.subscriptions).unwrap();
    InboxService::new(client, Arc::new(config), http)
}

/// Start the API on an ephemeral port and return its base URL
pub async fn spawn_server(factory: Arc<StaticClientFactory>) -> String {
    let state = Arc::new(AppState::new(factory, Config::default()).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{}", addr)
}
