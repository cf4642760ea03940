//! Asset loading with the namespace/root fallback ladder.

use super::key::{DEFAULT_NAMESPACE, DEFAULT_ROOT};
use super::{AssetKey, AssetParser, Fetcher, KeyValueStore, ListParser, Request};
use crate::error::{RenderError, Result};
use std::future::Future;
use std::sync::Arc;

/// Fetches assets and parses them, retrying absent assets against the
/// default namespace and the default asset host.
#[derive(Clone)]
pub struct AssetLoader {
    fetcher: Arc<dyn Fetcher>,
    store: Option<Arc<dyn KeyValueStore>>,
    default_root: String,
}

impl AssetLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            store: None,
            default_root: DEFAULT_ROOT.to_string(),
        }
    }

    /// Consult `store` before the network and persist successful bodies.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Asset host that fallback attempts are redirected to.
    pub fn with_default_root(mut self, root: impl Into<String>) -> Self {
        let root: String = root.into();
        self.default_root = root.trim_end_matches('/').to_string();
        self
    }

    pub fn default_root(&self) -> &str {
        &self.default_root
    }

    /// Keys to try for `key`, in order, without duplicates.
    ///
    /// 1. the key itself
    /// 2. namespace forced to `minecraft`, if it differs
    /// 3. root forced to the default host, if it differs (keeping the
    ///    namespace override from step 2)
    pub fn fallback_chain(&self, key: &AssetKey) -> Vec<AssetKey> {
        let mut chain = vec![key.clone()];
        let mut current = key.clone();

        if key.namespace() != DEFAULT_NAMESPACE {
            current = current.with_namespace(DEFAULT_NAMESPACE);
            chain.push(current.clone());
        }
        if key.root() != self.default_root {
            current = current.with_root(self.default_root.clone());
            chain.push(current);
        }

        chain.dedup();
        chain
    }

    /// Load `key` with `parser`, walking the fallback chain.
    ///
    /// Resolves to `Ok(None)` only when every attempt answered 404. Any other
    /// status or a transport failure ends the walk with an error.
    pub fn load_with_fallback<P>(
        &self,
        key: &AssetKey,
        parser: P,
    ) -> impl Future<Output = Result<Option<P::Output>>> + Send + 'static
    where
        P: AssetParser + 'static,
    {
        let loader = self.clone();
        let chain = self.fallback_chain(key);
        let requested = key.clone();
        async move {
            for attempt in &chain {
                if let Some(value) = loader.load_direct(attempt, &parser).await? {
                    if attempt != &requested {
                        log::debug!("Resolved {} via fallback {}", requested, attempt.url());
                    }
                    return Ok(Some(value));
                }
            }
            log::debug!("Asset not found after {} attempts: {}", chain.len(), requested.url());
            Ok(None)
        }
    }

    /// A single attempt: no fallback.
    async fn load_direct<P: AssetParser>(&self, key: &AssetKey, parser: &P) -> Result<Option<P::Output>> {
        let url = key.url();

        if let Some(store) = &self.store {
            if let Some(body) = store.get(&url).await? {
                return parser.parse(key, &body).map(Some);
            }
        }

        let response = self
            .fetcher
            .fetch(&url, Request::asset(parser.response_type()))
            .await?;

        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(RenderError::transport(
                &url,
                Some(response.status),
                format!("HTTP status {}", response.status),
            ));
        }

        let value = parser.parse(key, &response.body)?;
        if let Some(store) = &self.store {
            store.put(&url, response.body).await?;
        }
        Ok(Some(value))
    }

    /// Names available for `asset_type` (and optional sub-type) on `root`,
    /// falling back to the default host, for populating pickers. Missing
    /// listings are empty.
    pub async fn list(&self, root: &str, asset_type: &str, kind: Option<&str>) -> Result<Vec<String>> {
        let key = AssetKey::listing(asset_type, kind).with_root(root);
        Ok(self
            .load_with_fallback(&key, ListParser)
            .await?
            .unwrap_or_default())
    }
}
