//! Standing sender filters: validation, deduplication and creation

use crate::client::{ExistingFilterInfo, GmailClient};
use crate::error::{GmailError, Result};
use crate::models::FilterRule;
use tracing::{debug, info};

/// Filter id plus whether this call created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredFilter {
    pub id: String,
    pub created: bool,
}

impl FilterRule {
    /// Rule that adds `label_id` to all future mail from `sender`
    pub fn for_sender(sender: &str, label_id: &str) -> Self {
        Self {
            from: sender.trim().to_lowercase(),
            add_label_id: label_id.to_string(),
        }
    }

    /// Validates a filter rule before creation
    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() {
            return Err(GmailError::FilterError(
                "Filter must have a sender".to_string(),
            ));
        }

        if self.add_label_id.is_empty() {
            return Err(GmailError::FilterError(
                "Filter must have a target label".to_string(),
            ));
        }

        Ok(())
    }
}

impl ExistingFilterInfo {
    /// Check if this existing filter already does what `rule` would do
    pub fn matches_rule(&self, rule: &FilterRule) -> bool {
        let sender = rule.from.to_lowercase();

        let from_matches = self
            .from
            .as_deref()
            .map(|from| from.trim().to_lowercase() == sender)
            .unwrap_or(false);

        let query_matches = self
            .query
            .as_deref()
            .map(|query| {
                let query = query.trim().to_lowercase();
                query == format!("from:({})", sender) || query == format!("from:{}", sender)
            })
            .unwrap_or(false);

        (from_matches || query_matches) && self.add_label_ids.contains(&rule.add_label_id)
    }
}

/// Make sure a filter equivalent to `rule` exists, creating it if needed
pub async fn ensure_filter(client: &dyn GmailClient, rule: &FilterRule) -> Result<EnsuredFilter> {
    rule.validate()?;

    let existing = client.list_filters().await?;
    if let Some(found) = existing.iter().find(|f| f.matches_rule(rule)) {
        debug!(
            "Reusing existing filter {} for sender {}",
            found.id, rule.from
        );
        return Ok(EnsuredFilter {
            id: found.id.clone(),
            created: false,
        });
    }

    info!("Creating filter for sender: {}", rule.from);
    let filter_id = client.create_filter(rule).await?;
    info!("Successfully created filter with ID: {}", filter_id);

    Ok(EnsuredFilter {
        id: filter_id,
        created: true,
    })
}
