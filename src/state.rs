//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::llm::OpenAIChat;
use crate::core::stt::{DeepgramSTT, DeepgramSTTConfig};
use crate::core::tts::DeepgramTTS;
use crate::errors::{AppError, AppResult};
use crate::session::{
    Collaborators, InMemoryLeadStore, LeadStore, SessionRegistry, WebhookLeadStore,
};

/// Why a new call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLimitError {
    LimitReached { limit: usize },
}

/// A reserved call slot. Released when the last clone drops.
#[derive(Debug, Clone)]
pub struct CallSlot(Arc<SlotGuard>);

#[derive(Debug)]
struct SlotGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct AppState {
    pub config: ServerConfig,
    pub registry: SessionRegistry,
    pub http_client: reqwest::Client,
    active_calls: Arc<AtomicUsize>,
}

impl AppState {
    /// Build state with Deepgram, OpenAI and the configured lead store.
    pub async fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let recognizer = DeepgramSTT::new(
            DeepgramSTTConfig::new(config.deepgram_api_key.clone().unwrap_or_default())
                .with_base_url(config.deepgram_stt_url.clone()),
        );
        let synthesizer = DeepgramTTS::with_url(
            http_client.clone(),
            config.tts_config(),
            config.deepgram_tts_url.clone(),
        )
        .map_err(|e| AppError::Configuration(e.to_string()))?;
        let generator = OpenAIChat::new(http_client.clone(), config.llm_config())
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let leads: Arc<dyn LeadStore> = match &config.lead_webhook_url {
            Some(url) => {
                info!("Delivering leads to webhook");
                Arc::new(WebhookLeadStore::new(http_client.clone(), url.clone()))
            }
            None => Arc::new(InMemoryLeadStore::new()),
        };

        let collaborators = Collaborators {
            recognizer: Arc::new(recognizer),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            leads,
        };

        Ok(Self::with_collaborators(config, collaborators, http_client))
    }

    /// Build state around caller-supplied collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        collaborators: Collaborators,
        http_client: reqwest::Client,
    ) -> Arc<Self> {
        let registry = SessionRegistry::new(collaborators, config.session_settings());
        Arc::new(Self {
            config,
            registry,
            http_client,
            active_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Reserve a slot for a new call, honoring `max_concurrent_calls`.
    pub fn try_acquire_call(&self) -> Result<CallSlot, CallLimitError> {
        let limit = self.config.max_concurrent_calls;
        self.active_calls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match limit {
                Some(limit) if current >= limit => None,
                _ => Some(current + 1),
            })
            .map_err(|_| CallLimitError::LimitReached {
                limit: limit.unwrap_or_default(),
            })?;

        Ok(CallSlot(Arc::new(SlotGuard {
            active: self.active_calls.clone(),
        })))
    }

    pub fn active_call_count(&self) -> usize {
        self.active_calls.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(limit: Option<usize>) -> ServerConfig {
        let mut config = ServerConfig::from_env().unwrap();
        config.max_concurrent_calls = limit;
        config
    }

    #[tokio::test]
    #[serial]
    async fn test_call_slots_respect_limit() {
        let state = AppState::new(config(Some(2))).await.unwrap();
        assert_eq!(state.active_call_count(), 0);

        let first = state.try_acquire_call().unwrap();
        let second = state.try_acquire_call().unwrap();
        assert_eq!(state.active_call_count(), 2);
        assert_eq!(
            state.try_acquire_call().unwrap_err(),
            CallLimitError::LimitReached { limit: 2 }
        );

        // Clones share one reservation
        let copy = first.clone();
        drop(first);
        assert_eq!(state.active_call_count(), 2);
        drop(copy);
        assert_eq!(state.active_call_count(), 1);

        drop(second);
        assert!(state.try_acquire_call().is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_unlimited_calls() {
        let state = AppState::new(config(None)).await.unwrap();
        let slots: Vec<_> = (0..50).map(|_| state.try_acquire_call().unwrap()).collect();
        assert_eq!(state.active_call_count(), 50);
        drop(slots);
        assert_eq!(state.active_call_count(), 0);
    }
}
