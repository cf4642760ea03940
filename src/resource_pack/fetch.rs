//! Transport seam: fetching raw asset bytes by URL.
//!
//! The pipeline only needs "give me the body at this URL" and a way to tell
//! success, 404 and every other failure apart.

use crate::error::{RenderError, Result};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How the caller wants the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Json,
    Text,
    Binary,
}

/// Whether a request goes through the asset-host throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Asset,
    Generic,
}

/// Request options passed to a [`Fetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub response_type: ResponseType,
    pub kind: RequestKind,
}

impl Request {
    pub fn asset(response_type: ResponseType) -> Self {
        Self {
            response_type,
            kind: RequestKind::Asset,
        }
    }

    pub fn generic(response_type: ResponseType) -> Self {
        Self {
            response_type,
            kind: RequestKind::Generic,
        }
    }
}

/// A completed HTTP exchange. Only transport failures are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Async "fetch resource by URL" capability.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, request: Request) -> BoxFuture<'static, Result<FetchResponse>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, url: &str, request: Request) -> BoxFuture<'static, Result<FetchResponse>> {
        (**self).fetch(url, request)
    }
}

/// Funnels asset requests through a queue that dispatches at most one
/// request per `interval`. Generic requests bypass the queue.
pub struct ThrottledFetcher<F> {
    inner: Arc<F>,
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl<F: Fetcher + 'static> ThrottledFetcher<F> {
    pub fn new(inner: F, interval: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Reserve the next dispatch time.
    fn reserve_slot(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }
}

impl<F: Fetcher + 'static> Fetcher for ThrottledFetcher<F> {
    fn fetch(&self, url: &str, request: Request) -> BoxFuture<'static, Result<FetchResponse>> {
        if request.kind == RequestKind::Generic || self.interval.is_zero() {
            return self.inner.fetch(url, request);
        }
        let slot = self.reserve_slot();
        let inner = self.inner.clone();
        let url = url.to_string();
        async move {
            tokio::time::sleep_until(slot).await;
            inner.fetch(&url, request).await
        }
        .boxed()
    }
}

/// HTTP transport backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, _request: Request) -> BoxFuture<'static, Result<FetchResponse>> {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| RenderError::transport(&url, None, e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| RenderError::transport(&url, Some(status), e.to_string()))?;
            Ok(FetchResponse {
                status,
                body: body.to_vec(),
            })
        }
        .boxed()
    }
}

enum MemoryEntry {
    Body(Vec<u8>),
    Status(u16),
    Unreachable(String),
}

/// An in-memory asset host. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.entries.lock().insert(url.into(), MemoryEntry::Body(body.into()));
    }

    /// Serve a JSON document at `url`.
    pub fn insert_json(&self, url: impl Into<String>, json: &serde_json::Value) {
        self.insert(url, json.to_string().into_bytes());
    }

    /// Answer `url` with a bare HTTP status.
    pub fn insert_status(&self, url: impl Into<String>, status: u16) {
        self.entries.lock().insert(url.into(), MemoryEntry::Status(status));
    }

    /// Fail `url` as if the host could not be reached.
    pub fn insert_unreachable(&self, url: impl Into<String>, message: impl Into<String>) {
        self.entries
            .lock()
            .insert(url.into(), MemoryEntry::Unreachable(message.into()));
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// How many times `url` was requested.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str, _request: Request) -> BoxFuture<'static, Result<FetchResponse>> {
        self.requests.lock().push(url.to_string());
        let result = match self.entries.lock().get(url) {
            Some(MemoryEntry::Body(body)) => Ok(FetchResponse::ok(body.clone())),
            Some(MemoryEntry::Status(status)) => Ok(FetchResponse {
                status: *status,
                body: Vec::new(),
            }),
            Some(MemoryEntry::Unreachable(message)) => {
                Err(RenderError::transport(url, None, message.clone()))
            }
            None => Ok(FetchResponse::not_found()),
        };
        async move {
            tokio::task::yield_now().await;
            result
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher_statuses() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("http://host/a", b"hello".to_vec());
        fetcher.insert_status("http://host/b", 500);
        fetcher.insert_unreachable("http://host/c", "connection refused");

        let a = fetcher.fetch("http://host/a", Request::asset(ResponseType::Text)).await.unwrap();
        assert!(a.is_success());
        assert_eq!(a.body, b"hello");

        let b = fetcher.fetch("http://host/b", Request::asset(ResponseType::Text)).await.unwrap();
        assert_eq!(b.status, 500);

        let c = fetcher.fetch("http://host/c", Request::asset(ResponseType::Text)).await;
        assert!(c.unwrap_err().is_transport());

        let d = fetcher.fetch("http://host/d", Request::asset(ResponseType::Text)).await.unwrap();
        assert!(d.is_not_found());

        assert_eq!(fetcher.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_asset_requests() {
        let memory = MemoryFetcher::new();
        let throttled = ThrottledFetcher::new(memory.clone(), Duration::from_millis(100));
        let start = Instant::now();

        let requests = (0..3).map(|i| throttled.fetch(&format!("http://host/{i}"), Request::asset(ResponseType::Json)));
        futures::future::join_all(requests).await;

        assert!(Instant::now().duration_since(start) >= Duration::from_millis(200));
        assert_eq!(memory.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_requests_bypass_throttle() {
        let memory = MemoryFetcher::new();
        let throttled = ThrottledFetcher::new(memory.clone(), Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..3 {
            throttled
                .fetch(&format!("http://host/{i}"), Request::generic(ResponseType::Json))
                .await
                .unwrap();
        }

        assert!(Instant::now().duration_since(start) < Duration::from_secs(1));
    }
}
