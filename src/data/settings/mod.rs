use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod db;

pub static SETTINGS_COLLECTION_NAME: &str = "settings";
pub static GATEWAY_SETTINGS_ID: &str = "appsScript";
pub static BOOTSTRAP_MARKER_ID: &str = "bootstrap";

/// Singleton `settings/appsScript` document every client reads its gateway address from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl GatewaySettings {
    pub fn new(url: impl AsRef<str>) -> GatewaySettings {
        GatewaySettings {
            url: url.as_ref().trim().to_string(),
            updated_at: Utc::now(),
        }
    }
}

/// Written once, by whoever created the first profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapMarker {
    pub user_id: String,
    #[serde(default = "Utc::now")]
    pub claimed_at: DateTime<Utc>,
}
