//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fetchgate::{FetchOutcome, Interceptor, RouteRule, RouteTable};
use fetchgate_backend::{DeleteStatus, Store, StoreError, StoreResult};
use fetchgate_core::{
    CacheEntry, CachedResponse, Fetch, FetchRequest, ManualClock, RequestKey, StoreLabel,
};
use futures::future::BoxFuture;

pub const EXPERIMENT_URL: &str =
    "https://console.example.com/api/service/pipelines/ns-1/dspa/apis/v2beta1/experiments/exp-1";

pub const OTHER_URL: &str = "https://console.example.com/api/service/pipelines/ns-1/runs";

/// Fetcher that counts calls, waits `latency` (Tokio time) and replays
/// scripted outcomes. Once the script runs out it answers `response N`.
#[derive(Clone)]
pub struct ScriptedFetcher {
    calls: Arc<AtomicUsize>,
    latency: Duration,
    script: Arc<Mutex<VecDeque<FetchOutcome>>>,
}

impl ScriptedFetcher {
    pub fn new(latency: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            latency,
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn then(self, outcome: FetchOutcome) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn then_body(self, body: &'static str) -> Self {
        self.then(Ok(CachedResponse::ok(body)))
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for ScriptedFetcher {
    type Future = BoxFuture<'static, FetchOutcome>;

    fn fetch(&self, _request: FetchRequest) -> Self::Future {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CachedResponse::ok(format!("response {call}"))));
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            outcome
        })
    }
}

/// DashMap store whose reads and writes can be made to fail or slow.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<RequestKey, CacheEntry>>,
    read_latency: Duration,
    writes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Reads take `latency` (Tokio time) and return the entry as it was when
    /// the read started.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    pub fn entry(&self, key: &RequestKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, key: &RequestKey) -> StoreResult<Option<CacheEntry>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory".to_owned()));
        }
        let entry = self.entry(key);
        if !self.read_latency.is_zero() {
            tokio::time::sleep(self.read_latency).await;
        }
        Ok(entry)
    }

    async fn write(&self, key: &RequestKey, entry: CacheEntry) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory".to_owned()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &RequestKey) -> StoreResult<DeleteStatus> {
        Ok(match self.entries.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("memory")
    }
}

pub fn routes(max_age: Duration) -> RouteTable {
    RouteTable::new(vec![
        RouteRule::new("/experiments/[^?].*", max_age).unwrap(),
    ])
}

pub type TestInterceptor = Interceptor<ScriptedFetcher, MemoryStore, ManualClock>;

pub fn interceptor(
    fetcher: &ScriptedFetcher,
    store: &MemoryStore,
    clock: &ManualClock,
    max_age: Duration,
) -> TestInterceptor {
    Interceptor::builder()
        .fetcher(fetcher.clone())
        .store(store.clone())
        .clock(clock.clone())
        .routes(routes(max_age))
        .build()
}

pub fn key(url: &str) -> RequestKey {
    RequestKey::new(url)
}

pub fn get(url: &str) -> FetchRequest {
    FetchRequest::get(url)
}

pub fn body(intercepted: &fetchgate::Intercepted) -> &str {
    std::str::from_utf8(intercepted.response.body()).unwrap()
}
