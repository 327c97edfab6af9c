use std::{sync::Arc, time::Duration};

use gallery::{
    credentials::CredentialStore,
    library::Library,
    storage::{StorageGateway, drive::DriveStorage, local::LocalStorage},
};
use tracing::info;

use super::{
    config::{Config, StorageKind},
    session::SessionStore,
};

pub struct State {
    pub config: Config,
    pub credentials: CredentialStore,
    pub library: Library,
    pub sessions: SessionStore,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();
        let credentials = config.credentials();

        let gateway: Arc<dyn StorageGateway> = match config.storage {
            StorageKind::Drive => Arc::new(
                DriveStorage::new(&config.drive_api, config.drive_token())
                    .expect("Failed to build Drive client"),
            ),
            StorageKind::Local => Arc::new(LocalStorage::new(&config.local_root)),
        };
        info!(
            "Serving {} albums from {:?} storage",
            config.layout, config.storage
        );

        Self::from_parts(config, credentials, gateway)
    }

    pub fn from_parts(
        config: Config,
        credentials: CredentialStore,
        gateway: Arc<dyn StorageGateway>,
    ) -> Arc<Self> {
        let library = Library::new(gateway, config.library_options());
        let sessions = SessionStore::new(Duration::from_secs(config.session_idle));

        Arc::new(Self {
            config,
            credentials,
            library,
            sessions,
        })
    }

    /// Storage root of the tenant, falling back to the configured root.
    pub fn tenant_root(&self, tenant_id: &str) -> &str {
        self.credentials
            .tenant(tenant_id)
            .map(|tenant| tenant.root.as_str())
            .filter(|root| !root.is_empty())
            .unwrap_or(&self.config.root)
    }
}
