use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use crate::api::client::decode;
use crate::api::{ApiClient, ApiError};
use crate::cache::{
    run_optimistic, CacheKey, EntityArgs, PatchSet, QueryCache, QuerySubscription, Tag, TagKind,
};
use crate::constants::endpoints;
use crate::models::{
    Contract, ContractPage, DashboardStats, InitContractRequest, ListContractsArgs,
    SummarizeStatus, UploadUrlRequest, UploadUrlResponse,
};
use crate::store::ProcessingRegistry;

/// Which collection a contract operation targets. Admin templates share
/// every contract operation under their own path and cache endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractScope {
    User,
    Template,
}

impl ContractScope {
    pub fn base_path(&self) -> &'static str {
        match self {
            ContractScope::User => "/contracts",
            ContractScope::Template => "/admin/templates",
        }
    }

    pub fn entity_endpoint(&self) -> &'static str {
        match self {
            ContractScope::User => endpoints::GET_CONTRACT,
            ContractScope::Template => endpoints::GET_TEMPLATE,
        }
    }

    pub fn list_endpoint(&self) -> &'static str {
        match self {
            ContractScope::User => endpoints::GET_CONTRACTS,
            ContractScope::Template => endpoints::GET_TEMPLATES,
        }
    }

    pub fn tag_kind(&self) -> TagKind {
        match self {
            ContractScope::User => TagKind::Contract,
            ContractScope::Template => TagKind::Template,
        }
    }

    pub fn entity_key(&self, id: &str) -> CacheKey {
        CacheKey::new(self.entity_endpoint(), &EntityArgs::new(id))
    }

    pub fn list_key(&self, args: &ListContractsArgs) -> CacheKey {
        CacheKey::new(self.list_endpoint(), args)
    }

    /// Tags a change to `id` invalidates: the entity, its lists and the dashboard
    pub fn tags_for(&self, id: &str) -> Vec<Tag> {
        vec![
            Tag::entity(self.tag_kind(), id),
            Tag::list(self.tag_kind()),
            Tag::list(TagKind::Dashboard),
        ]
    }
}

/// Network side of the contract operations, returning normalized payloads
pub trait ContractsBackend: Send + Sync {
    fn summarize<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn fetch_contract<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn fetch_contracts<'a>(
        &'a self,
        scope: ContractScope,
        args: &'a ListContractsArgs,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn dashboard_stats(&self) -> BoxFuture<'_, Result<Value, ApiError>>;

    fn upload_url<'a>(
        &'a self,
        scope: ContractScope,
        request: &'a UploadUrlRequest,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn init_contract<'a>(
        &'a self,
        scope: ContractScope,
        request: &'a InitContractRequest,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn delete_contract<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;
}

impl ContractsBackend for ApiClient {
    fn summarize<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let path = format!("{}/{}/summarize", scope.base_path(), id);
            self.post_value(&path, &json!({})).await
        }
        .boxed()
    }

    fn fetch_contract<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let path = format!("{}/{}", scope.base_path(), id);
            self.get_value(&path, &[]).await
        }
        .boxed()
    }

    fn fetch_contracts<'a>(
        &'a self,
        scope: ContractScope,
        args: &'a ListContractsArgs,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move { self.get_value(scope.base_path(), &args.query_pairs()).await }.boxed()
    }

    fn dashboard_stats(&self) -> BoxFuture<'_, Result<Value, ApiError>> {
        async move { self.get_value("/contracts/dashboard-stats", &[]).await }.boxed()
    }

    fn upload_url<'a>(
        &'a self,
        scope: ContractScope,
        request: &'a UploadUrlRequest,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let path = format!("{}/upload-url", scope.base_path());
            self.post_value(&path, request).await
        }
        .boxed()
    }

    fn init_contract<'a>(
        &'a self,
        scope: ContractScope,
        request: &'a InitContractRequest,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let path = format!("{}/init", scope.base_path());
            self.post_value(&path, request).await
        }
        .boxed()
    }

    fn delete_contract<'a>(&'a self, scope: ContractScope, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let path = format!("{}/{}", scope.base_path(), id);
            self.delete(&path).await
        }
        .boxed()
    }
}

// ===== Cached JSON helpers =====

/// Items of a cached list payload, which is either a page object or a bare array
fn list_items_mut(list: &mut Value) -> Option<&mut Vec<Value>> {
    match list {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get_mut("items").and_then(Value::as_array_mut),
        _ => None,
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    item.get("id").and_then(Value::as_str) == Some(id)
}

fn set_summarize_status(contract: &mut Value, status: SummarizeStatus) -> bool {
    let Some(obj) = contract.as_object_mut() else {
        return false;
    };
    let new = Value::String(status.as_str().to_string());
    if obj.get("summarizeStatus") == Some(&new) {
        return false;
    }
    obj.insert("summarizeStatus".to_string(), new);
    true
}

fn set_list_item_status(list: &mut Value, id: &str, status: SummarizeStatus) -> bool {
    list_items_mut(list)
        .and_then(|items| items.iter_mut().find(|item| has_id(item, id)))
        .map(|item| set_summarize_status(item, status))
        .unwrap_or(false)
}

fn remove_list_item(list: &mut Value, id: &str) -> bool {
    let removed = match list_items_mut(list) {
        Some(items) => {
            let before = items.len();
            items.retain(|item| !has_id(item, id));
            before != items.len()
        }
        None => false,
    };
    if removed {
        if let Some(total) = list.get_mut("total") {
            if let Some(n) = total.as_u64() {
                *total = json!(n.saturating_sub(1));
            }
        }
    }
    removed
}

fn page_from_value(value: Value) -> Result<ContractPage, ApiError> {
    match value {
        Value::Array(items) => {
            let items: Vec<Contract> = decode(Value::Array(items))?;
            let total = items.len() as u64;
            Ok(ContractPage {
                items,
                total,
                page: 1,
                limit: 0,
            })
        }
        other => decode(other),
    }
}

/// Contract queries and mutations over the query cache.
///
/// Queries are cache-first. Mutations that change what is already on screen
/// patch the cache before the request goes out and undo the patch if it fails.
#[derive(Clone)]
pub struct ContractsService {
    backend: Arc<dyn ContractsBackend>,
    cache: QueryCache,
    processing: ProcessingRegistry,
}

impl ContractsService {
    pub fn new(backend: Arc<dyn ContractsBackend>, cache: QueryCache, processing: ProcessingRegistry) -> Self {
        Self {
            backend,
            cache,
            processing,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ===== Queries =====

    /// Keep the cached copy of `id` from eviction while the guard lives
    pub fn observe_contract(&self, scope: ContractScope, id: &str) -> QuerySubscription {
        self.cache.subscribe(scope.entity_key(id))
    }

    pub async fn get_contract(&self, scope: ContractScope, id: &str) -> Result<Contract, ApiError> {
        let key = scope.entity_key(id);
        if let Some(contract) = self.cache.fresh::<Contract>(&key) {
            tracing::trace!(key = %key, "cache hit");
            return Ok(contract);
        }

        let value = self.backend.fetch_contract(scope, id).await?;
        let contract: Contract = decode(value.clone())?;
        self.cache
            .insert(key, value, vec![Tag::entity(scope.tag_kind(), id)]);
        Ok(contract)
    }

    pub async fn list_contracts(
        &self,
        scope: ContractScope,
        args: &ListContractsArgs,
    ) -> Result<ContractPage, ApiError> {
        let key = scope.list_key(args);
        if let Some(value) = self.cache.get(&key) {
            if self.cache.is_stale(&key) == Some(false) {
                if let Ok(page) = page_from_value(value) {
                    return Ok(page);
                }
            }
        }

        let value = self.backend.fetch_contracts(scope, args).await?;
        let page = page_from_value(value.clone())?;

        let mut tags = vec![Tag::list(scope.tag_kind())];
        tags.extend(page.items.iter().map(|c| Tag::entity(scope.tag_kind(), &c.id)));
        self.cache.insert(key, value, tags);
        Ok(page)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let key = CacheKey::new(endpoints::GET_DASHBOARD_STATS, &());
        if let Some(stats) = self.cache.fresh::<DashboardStats>(&key) {
            return Ok(stats);
        }

        let value = self.backend.dashboard_stats().await?;
        let stats: DashboardStats = decode(value.clone())?;
        self.cache.insert(key, value, vec![Tag::list(TagKind::Dashboard)]);
        Ok(stats)
    }

    // ===== Mutations =====

    /// Ask the backend to summarize a contract.
    ///
    /// The contract shows as `ongoing` everywhere it is cached and is marked
    /// processing before the request is sent. Completion arrives later over
    /// the push channel. On failure the cache and the registry are restored
    /// and the error is returned.
    pub async fn start_summarize(&self, scope: ContractScope, id: &str) -> Result<(), ApiError> {
        let mut patches = PatchSet::new(self.cache.clone());
        patches.push(self.cache.update_query_data(&scope.entity_key(id), |contract| {
            set_summarize_status(contract, SummarizeStatus::Ongoing)
        }));
        for (key, _args) in self
            .cache
            .keys_with_args::<ListContractsArgs>(scope.list_endpoint())
        {
            patches.push(self.cache.update_query_data(&key, |list| {
                set_list_item_status(list, id, SummarizeStatus::Ongoing)
            }));
        }
        tracing::debug!(contract_id = id, patched = patches.len(), "summarize requested");

        self.processing.start_processing(id);

        match run_optimistic(patches, self.backend.summarize(scope, id)).await {
            Ok(_) => {
                tracing::info!(contract_id = id, "Summary started");
                Ok(())
            }
            Err(e) => {
                self.processing.stop_processing(id);
                tracing::error!(contract_id = id, error = %e, "Failed to start summary");
                Err(e)
            }
        }
    }

    pub async fn request_upload_url(
        &self,
        scope: ContractScope,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrlResponse, ApiError> {
        let value = self.backend.upload_url(scope, request).await?;
        decode(value)
    }

    /// Register uploaded files as a new contract
    pub async fn init_contract(
        &self,
        scope: ContractScope,
        request: &InitContractRequest,
    ) -> Result<Contract, ApiError> {
        let value = self.backend.init_contract(scope, request).await?;
        let contract: Contract = decode(value)?;
        self.cache
            .invalidate_tags(&[Tag::list(scope.tag_kind()), Tag::list(TagKind::Dashboard)]);
        tracing::info!(contract_id = %contract.id, "Contract created");
        Ok(contract)
    }

    /// Remove a contract. It disappears from cached lists right away and
    /// comes back if the backend refuses.
    pub async fn delete_contract(&self, scope: ContractScope, id: &str) -> Result<(), ApiError> {
        let mut patches = PatchSet::new(self.cache.clone());
        for (key, _args) in self
            .cache
            .keys_with_args::<ListContractsArgs>(scope.list_endpoint())
        {
            patches.push(self.cache.update_query_data(&key, |list| remove_list_item(list, id)));
        }

        run_optimistic(patches, self.backend.delete_contract(scope, id)).await?;

        self.cache.remove(&scope.entity_key(id));
        self.processing.clear(id);
        self.cache.invalidate_tags(&[Tag::list(TagKind::Dashboard)]);
        tracing::info!(contract_id = id, "Contract deleted");
        Ok(())
    }

    /// Reflect a finished summary job in every cached copy of the contract,
    /// then mark those entries for refetch. The job's scope is not part of
    /// the push event, so both scopes are touched.
    pub fn apply_summarize_outcome(&self, id: &str, status: SummarizeStatus) -> usize {
        let mut touched = 0;
        for scope in [ContractScope::User, ContractScope::Template] {
            if self
                .cache
                .update_query_data(&scope.entity_key(id), |c| set_summarize_status(c, status))
                .is_some()
            {
                touched += 1;
            }
            for (key, _args) in self
                .cache
                .keys_with_args::<ListContractsArgs>(scope.list_endpoint())
            {
                if self
                    .cache
                    .update_query_data(&key, |list| set_list_item_status(list, id, status))
                    .is_some()
                {
                    touched += 1;
                }
            }
            self.invalidate_contract(scope, id);
        }
        touched
    }

    /// Mark everything cached about `id` for refetch
    pub fn invalidate_contract(&self, scope: ContractScope, id: &str) -> Vec<CacheKey> {
        self.cache.invalidate_tags(&scope.tags_for(id))
    }
}
