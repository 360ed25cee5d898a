use std::sync::Arc;

use mongodb::{Client, Database};
use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::directory::ClassDirectory;
use crate::error::{BackendError, ConfigurationError};
use crate::gateway::transport::{HttpTransport, Transport};
use crate::gateway::GatewayClient;
use crate::identity::{IdentityProvider, Session, SessionHandle, UserAdmin};
use crate::remote_config::RemoteConfig;
use crate::store::{DocumentStore, MemoryStore};
use crate::workflow::{StudentDesk, TeacherDesk};

pub mod access;
pub mod config;
pub mod data;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod remote_config;
pub mod resp;
pub mod role;
pub mod store;
pub mod util;
pub mod workflow;

/// Everything a client needs, wired against one document store and one gateway.
pub struct Classroom {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub remote: Arc<RemoteConfig>,
    pub gateway: GatewayClient,
    pub directory: Arc<ClassDirectory>,
    pub users: UserAdmin,
}

impl Classroom {
    /// Wires the components and hydrates the gateway address from storage.
    pub async fn assemble<S: DocumentStore + 'static>(
        config: Config,
        store: Arc<S>,
        transport: Arc<dyn Transport>,
    ) -> Result<Classroom, BackendError> {
        let remote = Arc::new(RemoteConfig::new(store.clone(), &config.gateway_host)?);
        match remote.load().await {
            Some(url) if remote.is_configured() => tracing::info!("Gateway address: {}", url),
            Some(url) => tracing::warn!("Stored gateway address is malformed: {}", url),
            None => tracing::warn!("Gateway address isn't configured."),
        }

        Ok(Classroom {
            gateway: GatewayClient::new(remote.clone(), transport),
            directory: Arc::new(ClassDirectory::new(store.clone())),
            users: UserAdmin::new(store.clone()),
            remote,
            store,
            config,
        })
    }

    /// In-process store, nothing persisted. Gateway calls still go over HTTP.
    pub async fn in_memory(config: Config) -> Result<Classroom, BackendError> {
        Classroom::assemble(config, Arc::new(MemoryStore::new()), Arc::new(HttpTransport::new())).await
    }

    pub fn session(&self, provider: Arc<dyn IdentityProvider>) -> SessionHandle {
        Session::start(provider, self.store.clone())
    }

    pub fn teacher_desk(&self) -> TeacherDesk {
        TeacherDesk::new(self.gateway.clone(), self.directory.clone(), self.config.limits)
    }

    pub fn student_desk(&self) -> StudentDesk {
        StudentDesk::new(self.gateway.clone(), self.directory.clone(), self.config.limits)
    }
}

pub async fn create(log_level: Option<Level>) -> Result<Classroom, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    let db = connect(&c).await?;
    store::ensure_indexes(&db).await?;

    Classroom::assemble(c, Arc::new(db), Arc::new(HttpTransport::new())).await
}

async fn connect(c: &Config) -> Result<Database, BackendError> {
    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if let Err(e) = db.list_collection_names(None).await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(e.into());
    }
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::transport::scripted::ScriptedTransport;
    use crate::identity::provider::fake::{account, FakeProvider};
    use crate::role::Role;

    #[tokio::test]
    async fn first_admin_configures_and_teaches() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::json(
            serde_json::json!({ "success": true, "assignments": [] }),
        ));
        let classroom = Classroom::assemble(Config::default(), store, transport.clone())
            .await
            .unwrap();
        assert!(!classroom.remote.is_configured());

        let provider = Arc::new(FakeProvider::new(Ok(account("u1", "Ana", "ana@school.edu"))));
        let session = classroom.session(provider);
        let admin = session.login().await.unwrap();
        assert_eq!(admin.role, Role::Admin);

        let desk = classroom.teacher_desk();
        desk.configure_gateway(&admin, "https://script.google.com/macros/s/x/exec")
            .await
            .unwrap();
        assert!(classroom.remote.is_configured());
        assert!(desk.assignments(&admin).await.unwrap().is_empty());
        assert!(transport.requests().is_empty());
    }
}
