#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use certwatch_common::types::{Alert, Monitor, MonitorDefinition};
use certwatch_notify::engine::NotificationEngine;
use certwatch_notify::NotificationChannel;
use certwatch_registry::{RegistryError, RegistryPage, RegistrySource};
use certwatch_server::app::App;
use certwatch_server::cert::probe::{CertificateProbe, ProbeError};
use certwatch_storage::engine::SqliteMonitorStore;
use certwatch_storage::{MonitorSelector, MonitorStore};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
}

pub fn definition(id: &str) -> MonitorDefinition {
    MonitorDefinition {
        id: id.to_string(),
        friendly_name: format!("Site {id}"),
        url: format!("http://{id}.example.com"),
    }
}

pub fn monitor(id: &str, valid_to: Option<DateTime<Utc>>) -> Monitor {
    Monitor {
        valid_to,
        ..Monitor::from_definition(definition(id))
    }
}

/// Probe URL the scanner uses for [`monitor`]`(id, ..)`.
pub fn probe_url(id: &str) -> String {
    format!("https://{id}.example.com")
}

/// Registry serving fixed pages in order. Pages past the end are empty.
#[derive(Default)]
pub struct ScriptedRegistry {
    pages: Vec<RegistryPage>,
    fail_at: Option<usize>,
    fetches: AtomicUsize,
}

impl ScriptedRegistry {
    /// One page per entry in `sizes`, with ids unique across pages.
    pub fn with_page_sizes(sizes: &[usize]) -> Self {
        let mut next = 0;
        let pages = sizes
            .iter()
            .map(|&size| {
                let monitors: Vec<_> = (next..next + size)
                    .map(|i| definition(&format!("m{i:04}")))
                    .collect();
                next += size;
                RegistryPage {
                    fetched: monitors.len(),
                    monitors,
                }
            })
            .collect();
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_pages(pages: Vec<RegistryPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Fails the fetch of page `index` with an API error.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrySource for ScriptedRegistry {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> certwatch_registry::Result<RegistryPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let index = offset / limit;
        if self.fail_at == Some(index) {
            return Err(RegistryError::Api {
                id: "100".to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProbeScript {
    Expires(DateTime<Utc>),
    Refused,
    TimesOut,
}

/// Probe answering from a per-URL script. Unscripted URLs are refused.
#[derive(Default)]
pub struct ScriptedProbe {
    script: Mutex<HashMap<String, ProbeScript>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn set(&self, id: &str, script: ProbeScript) {
        self.script.lock().unwrap().insert(probe_url(id), script);
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl CertificateProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Result<DateTime<Utc>, ProbeError> {
        self.calls.lock().unwrap().push(url.to_string());
        let script = self.script.lock().unwrap().get(url).copied();
        match script {
            Some(ProbeScript::Expires(valid_to)) => Ok(valid_to),
            Some(ProbeScript::TimesOut) => Err(ProbeError::Timeout {
                host: url.to_string(),
                secs: 10,
            }),
            Some(ProbeScript::Refused) | None => Err(ProbeError::Connect {
                addr: url.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Probe that holds each call for a fixed delay and records the highest
/// number of calls in flight at once.
pub struct SlowProbe {
    delay: std::time::Duration,
    valid_to: DateTime<Utc>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowProbe {
    pub fn new(delay: std::time::Duration, valid_to: DateTime<Utc>) -> Self {
        Self {
            delay,
            valid_to,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateProbe for SlowProbe {
    async fn probe(&self, _url: &str) -> Result<DateTime<Utc>, ProbeError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.valid_to)
    }
}

/// Alert sink that keeps every alert it receives.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, alert: &Alert) -> certwatch_notify::error::Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// SQLite store that counts the writes made through the trait.
pub struct CountingStore {
    inner: SqliteMonitorStore,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SqliteMonitorStore) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Writes `monitor` directly, bypassing the counters.
    pub fn seed(&self, monitor: &Monitor) {
        self.inner.insert_if_absent(monitor).unwrap();
        if let Some(valid_to) = monitor.valid_to {
            self.inner.update_valid_to(&monitor.id, valid_to).unwrap();
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn valid_to(&self, id: &str) -> Option<DateTime<Utc>> {
        self.inner.find_by_id(id).unwrap().and_then(|m| m.valid_to)
    }

    pub fn count(&self) -> usize {
        self.inner.find(MonitorSelector::All).unwrap().len()
    }
}

impl MonitorStore for CountingStore {
    fn find(&self, selector: MonitorSelector) -> certwatch_storage::Result<Vec<Monitor>> {
        self.inner.find(selector)
    }

    fn find_by_id(&self, id: &str) -> certwatch_storage::Result<Option<Monitor>> {
        self.inner.find_by_id(id)
    }

    fn insert_if_absent(&self, monitor: &Monitor) -> certwatch_storage::Result<bool> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_if_absent(monitor)
    }

    fn update_valid_to(&self, id: &str, valid_to: DateTime<Utc>) -> certwatch_storage::Result<bool> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_valid_to(id, valid_to)
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<CountingStore>,
    pub registry: Arc<ScriptedRegistry>,
    pub probe: Arc<ScriptedProbe>,
    pub alerts: RecordingChannel,
    pub app: App,
}

pub fn build_test_context(registry: ScriptedRegistry) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(CountingStore::new(SqliteMonitorStore::new(temp_dir.path())?));
    let registry = Arc::new(registry);
    let probe = Arc::new(ScriptedProbe::default());
    let alerts = RecordingChannel::default();

    let app = App::new(
        store.clone(),
        registry.clone(),
        probe.clone(),
        NotificationEngine::new(vec![Box::new(alerts.clone())]),
        4,
    );

    Ok(TestContext {
        temp_dir,
        store,
        registry,
        probe,
        alerts,
        app,
    })
}
