//! Label table: name/id resolution with lookup-or-create for custom labels

use crate::client::{GmailClient, LabelInfo};
use crate::error::{GmailError, Result};
use crate::models::{system_labels, Category, EmailLabel};
use std::collections::HashMap;
use tracing::{debug, info};

/// How to treat a custom label that does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Return `None` when missing
    Lookup,
    /// Create it when missing
    LookupOrCreate,
}

/// Request-scoped view of the account's labels
///
/// Built once per request from `labels.list`; never outlives the request.
pub struct LabelTable {
    name_to_id: HashMap<String, String>, // lowercase name -> id
    id_to_name: HashMap<String, String>,
}

impl LabelTable {
    /// Build the table from an already-fetched label list
    pub fn from_labels(labels: Vec<LabelInfo>) -> Self {
        let mut table = Self {
            name_to_id: HashMap::new(),
            id_to_name: HashMap::new(),
        };
        for label in labels {
            table.insert(label.name, label.id);
        }
        table
    }

    /// Fetch all labels from Gmail into a fresh table
    pub async fn load(client: &dyn GmailClient) -> Result<Self> {
        let labels = client.list_labels().await?;
        debug!("Loaded {} labels into table", labels.len());
        Ok(Self::from_labels(labels))
    }

    fn insert(&mut self, name: String, id: String) {
        self.name_to_id.insert(name.to_lowercase(), id.clone());
        self.id_to_name.insert(id, name);
    }

    /// Case-insensitive name lookup
    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Display name for a raw id; unknown ids map to themselves
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.id_to_name.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Map a list of raw ids to display names
    pub fn display_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter().map(|id| self.display_name(id).to_string()).collect()
    }

    /// Resolve a triage label to its Gmail id
    ///
    /// System-backed labels resolve without touching the table.
    pub async fn resolve(
        &mut self,
        client: &dyn GmailClient,
        label: EmailLabel,
        resolution: Resolution,
    ) -> Result<Option<String>> {
        if let Some(system_id) = label.system_id() {
            return Ok(Some(system_id.to_string()));
        }

        let name = label.as_str();
        if let Some(id) = self.id_for_name(name) {
            return Ok(Some(id.to_string()));
        }

        match resolution {
            Resolution::Lookup => {
                debug!("Label '{}' does not exist", name);
                Ok(None)
            }
            Resolution::LookupOrCreate => self.create(client, name).await.map(Some),
        }
    }

    /// Resolve a label that must exist afterwards
    pub async fn resolve_or_create(
        &mut self,
        client: &dyn GmailClient,
        label: EmailLabel,
    ) -> Result<String> {
        self.resolve(client, label, Resolution::LookupOrCreate)
            .await?
            .ok_or_else(|| GmailError::LabelError(format!("Label '{}' could not be resolved", label)))
    }

    /// Resolve an inbox category to a label id
    pub async fn resolve_category(
        &mut self,
        client: &dyn GmailClient,
        category: Category,
    ) -> Result<String> {
        match category {
            Category::AllEmail => Ok(system_labels::INBOX.to_string()),
            Category::Label(label) => self.resolve_or_create(client, label).await,
        }
    }

    async fn create(&mut self, client: &dyn GmailClient, name: &str) -> Result<String> {
        info!("Creating label: {}", name);

        let label_id = client.create_label(name).await.map_err(|e| match e {
            GmailError::AuthError(_) => e,
            other => GmailError::LabelError(format!("Failed to create label '{}': {}", name, other)),
        })?;

        self.insert(name.to_string(), label_id.clone());
        info!("Successfully created label '{}' with ID: {}", name, label_id);
        Ok(label_id)
    }
}

/// Resolve one triage label, listing labels only for custom ones
pub async fn resolve_label(
    client: &dyn GmailClient,
    label: EmailLabel,
    resolution: Resolution,
) -> Result<Option<String>> {
    if let Some(system_id) = label.system_id() {
        return Ok(Some(system_id.to_string()));
    }
    LabelTable::load(client)
        .await?
        .resolve(client, label, resolution)
        .await
}
