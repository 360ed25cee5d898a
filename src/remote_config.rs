//! Read-through cache of the gateway address.
//!
//! The `settings/appsScript` document is the single source of truth shared by every client.
//! The cached copy is only ever replaced by a successful read or after a successful write.

use std::sync::{Arc, RwLock};

use regex::{Regex, RegexBuilder};

use crate::data::settings::GatewaySettings;
use crate::error::StoreError;
use crate::store::SettingsStore;

pub struct RemoteConfig {
    store: Arc<dyn SettingsStore>,
    pattern: Regex,
    cached: RwLock<Option<String>>,
}

impl RemoteConfig {
    /// `gateway_host` is the host every accepted URL has to point at.
    pub fn new(store: Arc<dyn SettingsStore>, gateway_host: &str) -> Result<RemoteConfig, regex::Error> {
        let pattern = RegexBuilder::new(&format!(
            r"^https?://{}(?:[/?#]\S*)?$",
            regex::escape(gateway_host)
        ))
        .case_insensitive(true)
        .build()?;

        Ok(RemoteConfig {
            store,
            pattern,
            cached: RwLock::new(None),
        })
    }

    /// Re-reads the address from storage. Failures leave the cache unconfigured.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Option<String> {
        let url = match self.store.gateway_settings().await {
            Ok(Some(settings)) => Some(settings.url.trim().to_string()).filter(|it| !it.is_empty()),
            Ok(None) => {
                tracing::info!("No gateway address stored yet.");
                None
            }
            Err(e) => {
                tracing::warn!("Unable to load gateway address: {}", e);
                None
            }
        };

        self.replace(url.clone());
        url
    }

    /// Persists a new address, then makes it visible to readers.
    #[tracing::instrument(skip(self))]
    pub async fn save(&self, url: &str) -> Result<GatewaySettings, StoreError> {
        let settings = GatewaySettings::new(url);
        if let Err(e) = self.store.put_gateway_settings(&settings).await {
            tracing::error!("Unable to save gateway address: {}", e);
            return Err(e);
        }

        self.replace(Some(settings.url.clone()).filter(|it| !it.is_empty()));
        tracing::info!("Gateway address updated.");
        Ok(settings)
    }

    pub fn url(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Format check of the cached address; says nothing about reachability.
    pub fn is_configured(&self) -> bool {
        self.url().map_or(false, |url| self.matches_pattern(&url))
    }

    pub fn matches_pattern(&self, url: &str) -> bool {
        self.pattern.is_match(url.trim())
    }

    fn replace(&self, url: Option<String>) {
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = url;
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url())
            .field("configured", &self.is_configured())
            .finish()
    }
}
