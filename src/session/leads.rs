//! Lead persistence for callers who give their name.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeadError {
    #[error("Lead webhook request failed: {0}")]
    Network(String),
    #[error("Lead webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type LeadResult<T> = Result<T, LeadError>;

/// Caller details captured during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInfo {
    pub phone_number: Option<String>,
    pub name: String,
    pub call_id: String,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn update_lead(&self, lead: LeadInfo) -> LeadResult<()>;
}

/// Keeps leads in memory, keyed by phone number (call id when unknown).
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    leads: DashMap<String, LeadInfo>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(lead: &LeadInfo) -> String {
        lead.phone_number
            .clone()
            .unwrap_or_else(|| lead.call_id.clone())
    }

    pub fn get(&self, key: &str) -> Option<LeadInfo> {
        self.leads.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    pub fn all(&self) -> Vec<LeadInfo> {
        self.leads.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn update_lead(&self, lead: LeadInfo) -> LeadResult<()> {
        debug!("Storing lead {} for {}", lead.name, Self::key(&lead));
        self.leads.insert(Self::key(&lead), lead);
        Ok(())
    }
}

/// Posts each lead as JSON to an external endpoint.
#[derive(Debug, Clone)]
pub struct WebhookLeadStore {
    client: reqwest::Client,
    url: String,
}

impl WebhookLeadStore {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LeadStore for WebhookLeadStore {
    async fn update_lead(&self, lead: LeadInfo) -> LeadResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&lead)
            .send()
            .await
            .map_err(|e| LeadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LeadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(call_id = %lead.call_id, "Lead delivered to webhook");
        Ok(())
    }
}
