use async_trait::async_trait;
use bson::Document;
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};

use super::{
    BootstrapMarker, GatewaySettings, BOOTSTRAP_MARKER_ID, GATEWAY_SETTINGS_ID,
    SETTINGS_COLLECTION_NAME,
};
use crate::data::{filter, is_duplicate_key};
use crate::error::StoreError;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn gateway_settings(&self) -> Result<Option<GatewaySettings>, StoreError>;

    async fn put_gateway_settings(&self, settings: &GatewaySettings) -> Result<(), StoreError>;

    /// Records `user_id` as the bootstrap admin.
    ///
    /// Returns `true` if the claim is new or already held by `user_id`, `false` if another user
    /// holds it.
    async fn claim_bootstrap(&self, user_id: &str) -> Result<bool, StoreError>;

    async fn bootstrap_owner(&self) -> Result<Option<String>, StoreError>;
}

fn settings(db: &Database) -> Collection<Document> {
    db.collection(SETTINGS_COLLECTION_NAME)
}

#[async_trait]
impl SettingsStore for Database {
    async fn gateway_settings(&self) -> Result<Option<GatewaySettings>, StoreError> {
        match settings(self)
            .find_one(filter::by_id(GATEWAY_SETTINGS_ID), None)
            .await?
        {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn put_gateway_settings(&self, value: &GatewaySettings) -> Result<(), StoreError> {
        let mut document = bson::to_document(value)?;
        document.insert("_id", GATEWAY_SETTINGS_ID);

        settings(self)
            .replace_one(
                filter::by_id(GATEWAY_SETTINGS_ID),
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn claim_bootstrap(&self, user_id: &str) -> Result<bool, StoreError> {
        let marker = BootstrapMarker {
            user_id: user_id.to_string(),
            claimed_at: chrono::Utc::now(),
        };
        let mut document = bson::to_document(&marker)?;
        document.insert("_id", BOOTSTRAP_MARKER_ID);

        match settings(self).insert_one(document, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => {
                Ok(self.bootstrap_owner().await?.as_deref() == Some(user_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn bootstrap_owner(&self) -> Result<Option<String>, StoreError> {
        match settings(self)
            .find_one(filter::by_id(BOOTSTRAP_MARKER_ID), None)
            .await?
        {
            Some(document) => {
                let marker: BootstrapMarker = bson::from_document(document)?;
                Ok(Some(marker.user_id))
            }
            None => Ok(None),
        }
    }
}
