use std::sync::Arc;

use crate::config::Config;
use crate::identity::{AnonymousOnly, SupabaseVerifier, TokenVerifier};
use crate::notifier::ChangeNotifier;
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<ChangeNotifier>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub public_base_url: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        verifier: Arc<dyn TokenVerifier>,
        notifier: Arc<ChangeNotifier>,
        public_base_url: &str,
    ) -> Self {
        Self {
            store,
            notifier,
            verifier,
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }

    /// Connects to the configured backends, running migrations when Postgres
    /// is in use.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, config.database_max_connections).await?;
                store.migrate().await?;
                Arc::new(store)
            }
            None => Arc::new(MemoryStore::new()),
        };

        let verifier: Arc<dyn TokenVerifier> = match &config.supabase_url {
            Some(url) => Arc::new(SupabaseVerifier::new(url)),
            None => Arc::new(AnonymousOnly),
        };

        Ok(Self::new(
            store,
            verifier,
            ChangeNotifier::new(config.notifier_capacity),
            &config.public_base_url,
        ))
    }

    pub fn share_url(&self, poll_id: uuid::Uuid) -> String {
        format!("{}/poll/{poll_id}", self.public_base_url)
    }
}
