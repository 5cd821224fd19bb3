//! Fixtures shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::database::{MemoryStore, RecordStore, StoreError};
use crate::models::{Check, CheckState, Method, Protocol};
use crate::monitoring::checker::Prober;
use crate::monitoring::types::ProbeOutcome;
use crate::notify::{Notifier, NotifyError};

pub const USER_KEY: &str = "5551234567";

/// Raw record as the account layer would store it
pub fn check_record(id: &str, target: &str) -> Value {
    json!({
        "id": id,
        "userKey": USER_KEY,
        "protocol": "https",
        "target": target,
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 3
    })
}

/// Validated check with no probe history
pub fn check(id: &str, target: &str) -> Check {
    Check {
        id: id.to_string(),
        user_key: USER_KEY.to_string(),
        protocol: Protocol::Https,
        target: target.to_string(),
        method: Method::Get,
        success_codes: vec![200],
        timeout_seconds: 3,
        state: CheckState::Down,
        last_checked: None,
        extra: Default::default(),
    }
}

/// Server that accepts connections and never answers
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// Prober returning canned outcomes keyed by target
#[derive(Default)]
pub struct StubProber {
    outcomes: Mutex<HashMap<String, ProbeOutcome>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Outcome for `target`; unknown targets answer 200
    pub fn set(&self, target: &str, outcome: ProbeOutcome) {
        self.outcomes.lock().unwrap().insert(target.to_string(), outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, check: &Check) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(&check.target)
            .cloned()
            .unwrap_or(ProbeOutcome::Response(200))
    }
}

/// Notifier that records messages and optionally fails every send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient.to_string(), message.to_string()));
        if self.fail {
            return Err(NotifyError::Rejected { status: 503, body: "unavailable".to_string() });
        }
        Ok(())
    }
}

/// Memory store with injectable read and write failures
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_reads: HashSet<String>,
    fail_writes: bool,
    updates: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_reads(keys: &[&str]) -> Self {
        Self { failing_reads: keys.iter().map(|k| k.to_string()).collect(), ..Self::default() }
    }

    pub fn failing_writes() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

fn injected() -> StoreError {
    StoreError::Io(std::io::Error::other("injected failure"))
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        self.inner.create(collection, key, record).await
    }

    async fn read(&self, collection: &str, key: &str) -> Result<Value, StoreError> {
        if self.failing_reads.contains(key) {
            return Err(injected());
        }
        self.inner.read(collection, key).await
    }

    async fn update(&self, collection: &str, key: &str, record: &Value) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(injected());
        }
        self.inner.update(collection, key, record).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(collection).await
    }
}
