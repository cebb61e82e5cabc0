use anyhow::Context;
use certwatch_common::types::expiry_horizon;
use certwatch_notify::channels::slack::SlackWebhookChannel;
use certwatch_notify::engine::NotificationEngine;
use certwatch_registry::uptimerobot::UptimeRobotRegistry;
use certwatch_registry::RegistrySource;
use certwatch_storage::engine::SqliteMonitorStore;
use certwatch_storage::{MonitorSelector, MonitorStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cert::probe::{CertificateProbe, TlsProbe};
use crate::cert::scanner::{ExpiryScanner, ScanSummary};
use crate::config::CertwatchConfig;
use crate::sync::RegistrySync;

/// The operations exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Probe every stored monitor.
    Update,
    /// Import new monitors from the registry.
    Insert,
    /// Probe expired and expiring monitors and announce renewals.
    Recheck,
    /// Alert on expired and expiring monitors without probing.
    Notify,
}

impl std::str::FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            "insert" => Ok(Self::Insert),
            "recheck" => Ok(Self::Recheck),
            "notify" => Ok(Self::Notify),
            other => Err(anyhow::anyhow!("unknown command: {other}")),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Update => "update",
            Self::Insert => "insert",
            Self::Recheck => "recheck",
            Self::Notify => "notify",
        };
        f.write_str(name)
    }
}

/// Wired-up components for one process run.
pub struct App {
    store: Arc<dyn MonitorStore>,
    sync: RegistrySync,
    scanner: ExpiryScanner,
    notifier: NotificationEngine,
}

impl App {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        registry: Arc<dyn RegistrySource>,
        probe: Arc<dyn CertificateProbe>,
        notifier: NotificationEngine,
        max_concurrent: usize,
    ) -> Self {
        Self {
            sync: RegistrySync::new(registry, store.clone()),
            scanner: ExpiryScanner::new(store.clone(), probe, max_concurrent),
            store,
            notifier,
        }
    }

    /// Builds the production components from `config`. Fails only on
    /// startup problems: an unopenable database or invalid credentials.
    pub fn from_config(config: &CertwatchConfig) -> anyhow::Result<Self> {
        let store = SqliteMonitorStore::new(&config.data_path()).with_context(|| {
            format!("failed to open monitor store in '{}'", config.data_dir)
        })?;

        let registry = UptimeRobotRegistry::new(
            &config.registry.endpoint,
            &config.registry.api_key,
            config.registry.request_timeout_secs,
        )
        .context("invalid registry configuration")?;

        let probe = TlsProbe::new(&config.probe).context("failed to build TLS probe")?;

        let slack = SlackWebhookChannel::new(
            &config.alerts.webhook_url,
            &config.alerts.channel,
            &config.alerts.username,
        )
        .context("invalid alert configuration")?;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(registry),
            Arc::new(probe),
            NotificationEngine::new(vec![Box::new(slack)]),
            config.probe.max_concurrent,
        ))
    }

    /// Runs `command` to completion. Per-unit failures are logged, never
    /// returned.
    pub async fn run(&self, command: Command) {
        tracing::info!(%command, "Running command");
        match command {
            Command::Update => {
                self.update().await;
            }
            Command::Insert => {
                self.insert().await;
            }
            Command::Recheck => {
                self.recheck().await;
            }
            Command::Notify => {
                self.notify().await;
            }
        }
    }

    pub async fn update(&self) -> Option<ScanSummary> {
        match self.scanner.scan(MonitorSelector::All).await {
            Ok(outcome) => {
                log_summary("update", &outcome.summary);
                Some(outcome.summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to select monitors for update");
                None
            }
        }
    }

    pub async fn insert(&self) -> Option<usize> {
        match self.sync.sync().await {
            Ok(inserted) => {
                tracing::info!(inserted, "Registry sync finished");
                Some(inserted)
            }
            Err(e) => {
                tracing::error!(error = %e, "Registry sync aborted");
                None
            }
        }
    }

    pub async fn recheck(&self) -> Option<ScanSummary> {
        self.recheck_at(Utc::now()).await
    }

    pub async fn recheck_at(&self, started_at: DateTime<Utc>) -> Option<ScanSummary> {
        match self.scanner.recheck_at(&self.notifier, started_at).await {
            Ok(summary) => {
                log_summary("recheck", &summary);
                Some(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to select monitors for recheck");
                None
            }
        }
    }

    pub async fn notify(&self) -> Option<usize> {
        self.notify_at(Utc::now()).await
    }

    /// Sends the expiry report as of `now`. Returns the number of alerts
    /// rendered.
    pub async fn notify_at(&self, now: DateTime<Utc>) -> Option<usize> {
        let selector = MonitorSelector::ExpiringBefore(now + expiry_horizon());
        match self.store.find(selector) {
            Ok(monitors) => Some(self.notifier.notify(&monitors, now).await),
            Err(e) => {
                tracing::error!(error = %e, "Failed to select monitors for notify");
                None
            }
        }
    }
}

fn log_summary(command: &str, summary: &ScanSummary) {
    tracing::info!(
        command,
        selected = summary.selected,
        skipped = summary.skipped,
        probed = summary.probed,
        updated = summary.updated,
        failed = summary.failed,
        renewed = summary.renewed,
        "Scan finished"
    );
}
