use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::api::ApiClient;
use crate::cache::QueryCache;
use crate::config::CoreConfig;
use crate::events::{CoreEvent, LocalBroadcast};
use crate::realtime::{ConnectionManager, Connector, ReconnectPolicy, WebSocketConnector};
use crate::secure_storage::{KeyringTokenStore, TokenStore};
use crate::services::{
    AuthService, ContractsBackend, ContractsService, RealtimeSync, SyncContext,
};
use crate::store::{app_store, ProcessingRegistry, SharedStore};

/// Owns every service of the client core and wires them together.
///
/// There is exactly one of each service per runtime: one REST client, one
/// cache, one connection manager. Must be created inside a tokio runtime.
pub struct CoreRuntime {
    config: CoreConfig,
    api: ApiClient,
    cache: QueryCache,
    store: SharedStore,
    processing: ProcessingRegistry,
    realtime: ConnectionManager,
    broadcast: LocalBroadcast,
    contracts: ContractsService,
    auth: AuthService,
    _sync: RealtimeSync,
}

impl CoreRuntime {
    /// Production wiring: websocket push channel, keyring-backed token
    pub fn new(config: CoreConfig) -> Result<Self> {
        let api = ApiClient::new(config.api_base_url.clone());
        let backend: Arc<dyn ContractsBackend> = Arc::new(api.clone());
        let tokens: Arc<dyn TokenStore> = Arc::new(KeyringTokenStore::for_api(&config.api_base_url));
        Self::with_parts(
            config,
            api,
            Arc::new(WebSocketConnector),
            tokens,
            backend,
        )
    }

    /// Wiring with substitutable seams
    pub fn with_parts(
        config: CoreConfig,
        api: ApiClient,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenStore>,
        backend: Arc<dyn ContractsBackend>,
    ) -> Result<Self> {
        let realtime_url = config
            .realtime_url()
            .context("Failed to derive the push channel URL")?;

        let cache = QueryCache::new(Duration::from_secs(config.cache.keep_unused_secs));
        let store = app_store::shared();
        let processing = ProcessingRegistry::new(config.prune_delay());
        let broadcast = LocalBroadcast::new();

        let realtime = ConnectionManager::new(
            connector,
            realtime_url,
            config.realtime.namespace.clone(),
            ReconnectPolicy::from_config(&config.realtime),
        );

        let contracts = ContractsService::new(backend, cache.clone(), processing.clone());
        let auth = AuthService::new(
            api.clone(),
            tokens,
            store.clone(),
            realtime.clone(),
            cache.clone(),
            processing.clone(),
        );

        let sync = RealtimeSync::install(
            realtime.bus(),
            SyncContext {
                store: store.clone(),
                processing: processing.clone(),
                contracts: contracts.clone(),
                broadcast: broadcast.clone(),
            },
        );

        tracing::info!(api = %config.api_base_url, "Core runtime ready");

        Ok(Self {
            config,
            api,
            cache,
            store,
            processing,
            realtime,
            broadcast,
            contracts,
            auth,
            _sync: sync,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn processing(&self) -> &ProcessingRegistry {
        &self.processing
    }

    pub fn realtime(&self) -> &ConnectionManager {
        &self.realtime
    }

    pub fn contracts(&self) -> &ContractsService {
        &self.contracts
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Receiver for [`CoreEvent`]s; subscribe before triggering the work you wait on
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.broadcast.subscribe()
    }

    /// Drop unobserved cache entries past their keep-unused window
    pub fn evict_unused(&self) -> usize {
        self.cache.evict_unused()
    }

    pub fn shutdown(&self) {
        self.realtime.disconnect();
        tracing::info!("Core runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::testing::FakeConnector;
    use crate::realtime::{ProcessedStatus, SocketSignal};
    use crate::secure_storage::MemoryTokenStore;
    use crate::services::contracts::tests::FakeBackend;
    use crate::store::ProcessingStatus;
    use serde_json::json;

    fn runtime(connector: Arc<FakeConnector>) -> CoreRuntime {
        let config = CoreConfig::new("http://127.0.0.1:9/api/v1");
        CoreRuntime::with_parts(
            config.clone(),
            ApiClient::new(config.api_base_url.clone()),
            connector,
            Arc::new(MemoryTokenStore::default()),
            Arc::new(FakeBackend::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unusable_api_url() {
        let config = CoreConfig::new("not a url");
        let result = CoreRuntime::with_parts(
            config.clone(),
            ApiClient::new(config.api_base_url.clone()),
            Arc::new(FakeConnector::default()),
            Arc::new(MemoryTokenStore::default()),
            Arc::new(FakeBackend::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_event_flows_to_broadcast() {
        let connector = Arc::new(FakeConnector::default());
        let runtime = runtime(connector.clone());
        let mut events = runtime.subscribe_events();

        runtime.realtime().connect();
        connector.signal(SocketSignal::Connected);
        runtime.processing().start_processing("c7");
        connector.signal(SocketSignal::Event {
            name: "contract_summarized".to_string(),
            data: json!({"contractId": "c7", "status": "success"}),
        });

        let mut notice = None;
        while notice.is_none() {
            if let CoreEvent::ContractProcessed(n) = events.recv().await.unwrap() {
                notice = Some(n);
            }
        }
        let notice = notice.unwrap();
        assert_eq!(notice.contract_id, "c7");
        assert_eq!(notice.status, ProcessedStatus::Success);
        assert_eq!(
            runtime.processing().get_status("c7"),
            Some(ProcessingStatus::Completed)
        );

        runtime.shutdown();
        assert!(!runtime.realtime().is_connected());
    }
}
