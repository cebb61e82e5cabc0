use certwatch_common::types::{expiry_horizon, renewal_margin, Monitor};
use certwatch_notify::engine::NotificationEngine;
use certwatch_storage::{MonitorSelector, MonitorStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::probe::{CertificateProbe, ProbeError};

/// Counters for one scan, logged when the command finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub selected: usize,
    /// Monitors whose URL is not HTTP(S).
    pub skipped: usize,
    /// Probes that returned an expiry.
    pub probed: usize,
    pub updated: usize,
    pub failed: usize,
    pub renewed: usize,
}

/// Result of a scan: counters plus every monitor that was probed
/// successfully, paired with the expiry it presented.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub summary: ScanSummary,
    pub probed: Vec<(Monitor, DateTime<Utc>)>,
}

/// Whether a certificate valid until `valid_to` counts as renewed for a scan
/// started at `started_at`.
pub fn is_renewed(valid_to: DateTime<Utc>, started_at: DateTime<Utc>) -> bool {
    valid_to > started_at + renewal_margin()
}

/// Probes stored monitors and writes back changed expiries.
pub struct ExpiryScanner {
    store: Arc<dyn MonitorStore>,
    probe: Arc<dyn CertificateProbe>,
    max_concurrent: usize,
}

impl ExpiryScanner {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        probe: Arc<dyn CertificateProbe>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            probe,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Probes every monitor matching `selector`.
    ///
    /// Only the initial selection can fail; per-monitor probe and store
    /// errors are logged and counted in the summary.
    pub async fn scan(&self, selector: MonitorSelector) -> Result<ScanOutcome, StoreError> {
        let monitors = self.store.find(selector)?;
        let mut outcome = ScanOutcome::default();
        outcome.summary.selected = monitors.len();

        if monitors.is_empty() {
            tracing::info!(?selector, "No monitors selected for scan");
            return Ok(outcome);
        }

        tracing::info!(
            count = monitors.len(),
            max_concurrent = self.max_concurrent,
            "Probing certificates"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<(Monitor, Result<DateTime<Utc>, ProbeError>)> = JoinSet::new();

        for monitor in monitors {
            let Some(url) = monitor.secure_url() else {
                tracing::warn!(
                    monitor = %monitor.friendly_name,
                    url = %monitor.url,
                    "Skipping monitor without an HTTP(S) URL"
                );
                outcome.summary.skipped += 1;
                continue;
            };

            // The semaphore is owned by this scan and never closed.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let probe = self.probe.clone();
            tasks.spawn(async move {
                let result = probe.probe(&url).await;
                drop(permit);
                (monitor, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (monitor, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(error = %e, "Probe task aborted");
                    outcome.summary.failed += 1;
                    continue;
                }
            };

            match result {
                Ok(valid_to) => {
                    outcome.summary.probed += 1;
                    match self.apply(&monitor, valid_to) {
                        Ok(true) => outcome.summary.updated += 1,
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(
                                monitor = %monitor.friendly_name,
                                error = %e,
                                "Failed to store certificate expiry"
                            );
                            outcome.summary.failed += 1;
                        }
                    }
                    outcome.probed.push((monitor, valid_to));
                }
                Err(e) => {
                    tracing::warn!(
                        monitor = %monitor.friendly_name,
                        url = %monitor.url,
                        error = %e,
                        "Certificate probe failed"
                    );
                    outcome.summary.failed += 1;
                }
            }
        }

        outcome.probed.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        Ok(outcome)
    }

    /// Writes `valid_to` only when it differs from the stored value.
    fn apply(&self, monitor: &Monitor, valid_to: DateTime<Utc>) -> Result<bool, StoreError> {
        if monitor.valid_to == Some(valid_to) {
            tracing::debug!(monitor = %monitor.friendly_name, "Certificate expiry unchanged");
            return Ok(false);
        }
        let written = self.store.update_valid_to(&monitor.id, valid_to)?;
        if written {
            tracing::info!(
                monitor = %monitor.friendly_name,
                valid_to = %valid_to,
                "Updated certificate expiry"
            );
        }
        Ok(written)
    }

    /// Re-probes monitors expired or expiring within the horizon of
    /// `started_at` and announces the ones whose certificate was renewed.
    pub async fn recheck_at(
        &self,
        notifier: &NotificationEngine,
        started_at: DateTime<Utc>,
    ) -> Result<ScanSummary, StoreError> {
        let selector = MonitorSelector::ExpiringBefore(started_at + expiry_horizon());
        let outcome = self.scan(selector).await?;
        let mut summary = outcome.summary;

        for (monitor, valid_to) in &outcome.probed {
            if is_renewed(*valid_to, started_at) {
                summary.renewed += 1;
                notifier.notify_renewal(monitor, *valid_to).await;
            } else {
                tracing::info!(
                    monitor = %monitor.friendly_name,
                    valid_to = %valid_to,
                    "Certificate not yet renewed"
                );
            }
        }
        Ok(summary)
    }

    pub async fn recheck(&self, notifier: &NotificationEngine) -> Result<ScanSummary, StoreError> {
        self.recheck_at(notifier, Utc::now()).await
    }
}
