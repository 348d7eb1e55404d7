//! Newsletter detection from List-Unsubscribe headers, and unsubscribing

use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::{collect_message_ids, MessageListQuery};
use crate::config::SubscriptionConfig;
use crate::error::{GmailError, Result};
use crate::headers::{mailto_address, parse_list_unsubscribe, parse_mailto, MailtoTarget, UnsubscribeTargets};
use crate::inbox::InboxService;
use crate::models::{MessageMetadata, Subscription, UnsubscribeOutcome};
use crate::query::GmailQuery;

/// RFC 8058 one-click request body
pub const ONE_CLICK_BODY: &str = "List-Unsubscribe=One-Click";

/// Outbound client for one-click POSTs
///
/// Redirects are not followed, so a POST never lands anywhere the sender
/// did not name directly.
pub fn unsubscribe_http_client(settings: &SubscriptionConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.unsubscribe_timeout_secs))
        .redirect(Policy::none())
        .user_agent(concat!("smart-inbox/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GmailError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

impl InboxService {
    /// Scan recent mail for newsletters, newest first, one per sender
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let settings = &self.config.subscriptions;
        let query = MessageListQuery::with_query(
            GmailQuery::new().raw(&settings.query).build(),
            self.page_size_for(settings.scan_window),
        );
        let ids = collect_message_ids(self.client(), &query, Some(settings.scan_window)).await?;

        let messages = self.fetch_metadata(ids).await;
        let subscriptions = detect_subscriptions(&messages, settings.allow_insecure_one_click);
        info!(
            "Detected {} subscriptions in {} messages",
            subscriptions.len(),
            messages.len()
        );
        Ok(subscriptions)
    }

    /// Unsubscribe from the list that sent `subscription.id`
    ///
    /// Mailto targets get an email sent through Gmail; https one-click links
    /// get a POST. Anything else is handed back for the user to open.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<UnsubscribeOutcome> {
        if subscription.id.trim().is_empty() {
            return Err(GmailError::InvalidRequest(
                "Subscription is missing its message id".to_string(),
            ));
        }

        let message = self.client().get_message(&subscription.id).await?;
        let targets = unsubscribe_targets(&message)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GmailError::InvalidRequest(format!(
                    "Message {} has no unsubscribe target",
                    subscription.id
                ))
            })?;

        if let Some(target) = targets.mailto.as_deref().and_then(parse_mailto) {
            let sent_id = self
                .client()
                .send_message(build_unsubscribe_message(&target))
                .await?;
            info!("Sent unsubscribe email to {} (message {})", target.to, sent_id);
            return Ok(UnsubscribeOutcome::Unsubscribed);
        }

        let allow_insecure = self.config.subscriptions.allow_insecure_one_click;
        if let Some(link) = targets.one_click_link(allow_insecure) {
            self.post_one_click(link).await?;
            return Ok(UnsubscribeOutcome::Unsubscribed);
        }

        match targets.link {
            Some(link) => {
                debug!("No machine-actionable target for {}; manual link", message.sender_email);
                Ok(UnsubscribeOutcome::Manual { url: link })
            }
            None => Err(GmailError::InvalidRequest(format!(
                "Message {} has no usable unsubscribe target",
                subscription.id
            ))),
        }
    }

    async fn post_one_click(&self, link: &str) -> Result<()> {
        let response = self
            .http
            .post(link)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(ONE_CLICK_BODY)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("One-click unsubscribe to {} returned {}", link, status);
            return Err(GmailError::UnsubscribeError(format!(
                "One-click endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        info!("One-click unsubscribe accepted by {}", link);
        Ok(())
    }
}

fn unsubscribe_targets(message: &MessageMetadata) -> Option<UnsubscribeTargets> {
    message.list_unsubscribe.as_deref().map(|header| {
        parse_list_unsubscribe(header, message.list_unsubscribe_post.as_deref())
    })
}

/// Turn fetched messages (newest first) into one subscription per sender
pub fn detect_subscriptions(
    messages: &[MessageMetadata],
    allow_insecure_one_click: bool,
) -> Vec<Subscription> {
    let mut seen = HashSet::new();
    let mut subscriptions = Vec::new();

    for message in messages {
        let Some(targets) = unsubscribe_targets(message) else {
            continue;
        };
        if targets.is_empty() {
            continue;
        }

        // Fall back to the list address when From is unusable
        let email = if message.sender_email.is_empty() {
            match targets.mailto.as_deref().and_then(mailto_address) {
                Some(address) => address.to_lowercase(),
                None => continue,
            }
        } else {
            message.sender_email.clone()
        };

        if !seen.insert(email.clone()) {
            continue;
        }

        let one_click = targets.one_click_link(allow_insecure_one_click).is_some();

        subscriptions.push(Subscription {
            id: message.id.clone(),
            sender: if message.sender_name.is_empty() {
                email.clone()
            } else {
                message.sender_name.clone()
            },
            email,
            unsubscribe_link: targets.link,
            unsubscribe_email: targets.mailto,
            one_click,
            last_seen: message.date.clone(),
        });
    }

    subscriptions
}

/// Minimal RFC 822 message for a mailto unsubscribe
pub fn build_unsubscribe_message(target: &MailtoTarget) -> Vec<u8> {
    format!(
        "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n{}\r\n",
        header_safe(&target.to),
        header_safe(&target.subject),
        target.body
    )
    .into_bytes()
}

fn header_safe(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}
