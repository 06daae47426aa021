//! API key selection shared by the generation clients
//!
//! The key is owned by the top-level process and handed to every component
//! that talks to the generation API, so there is exactly one place where it
//! is selected or cleared.

use crate::{Result, WeathercastError};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// An API key that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank input
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(WeathercastError::validation("API key cannot be empty"));
        }
        Ok(Self(key))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Shared handle to the currently selected API key
#[derive(Clone, Default)]
pub struct Credentials {
    selected: Arc<RwLock<Option<ApiKey>>>,
}

impl Credentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a key already selected
    #[must_use]
    pub fn with_key(key: ApiKey) -> Self {
        let credentials = Self::new();
        credentials.select(key);
        credentials
    }

    /// Whether a usable key has been selected
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn select(&self, key: ApiKey) {
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
        tracing::info!("API key selected");
    }

    pub fn clear(&self) {
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("API key cleared");
    }

    /// The selected key, or [`WeathercastError::MissingCredential`]
    pub fn current(&self) -> Result<ApiKey> {
        self.selected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(WeathercastError::MissingCredential)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("selected", &self.is_selected())
            .finish()
    }
}

/// Asks the user to select a key
///
/// Called by the orchestrator when a search is submitted without a key.
/// Completion means the prompt was shown, not that a key was chosen.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    async fn request_selection(&self, credentials: &Credentials) -> Result<()>;
}

/// Prompt for front-ends that select the key out of band
///
/// The HTTP API exposes the awaiting state and accepts the key on its own
/// endpoint, so there is nothing to do here but log.
#[derive(Debug, Default)]
pub struct DeferredPrompt;

#[async_trait]
impl CredentialPrompt for DeferredPrompt {
    async fn request_selection(&self, _credentials: &Credentials) -> Result<()> {
        tracing::info!("waiting for an API key to be selected");
        Ok(())
    }
}

/// Reads a key from standard input
#[derive(Debug, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn request_selection(&self, credentials: &Credentials) -> Result<()> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"No API key selected. Paste a Gemini API key: ")
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;

        match ApiKey::new(line) {
            Ok(key) => credentials.select(key),
            Err(_) => tracing::warn!("no API key entered"),
        }
        Ok(())
    }
}
