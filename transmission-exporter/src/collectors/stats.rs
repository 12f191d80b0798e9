//! Live transfer activity from `session-stats`.
//!
//! Fetched on every scrape like the session itself. The label sets never change, so gauges are
//! simply overwritten; a failed fetch emits nothing for that scrape.

use async_trait::async_trait;
use prometheus::GaugeVec;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, instrument};

use super::{ScrapeCollector, collect_all, describe_all, gauge_vec};
use crate::errors::{Error, Result};
use crate::transmission::{SessionStats, TransmissionApi};
use crate::types::StatsPeriod;

const NO_LABELS: &[&str] = &[];
const PERIOD: &[&str] = &["type"];

pub struct SessionStatsCollector {
    client: Arc<dyn TransmissionApi>,
    timeout: Duration,
    download_speed: GaugeVec,
    upload_speed: GaugeVec,
    torrents: GaugeVec,
    active_torrents: GaugeVec,
    paused_torrents: GaugeVec,
    downloaded: GaugeVec,
    uploaded: GaugeVec,
    files_added: GaugeVec,
    active_seconds: GaugeVec,
    sessions: GaugeVec,
    /// Held for the whole scrape so two snapshots are never mixed in one output.
    scrape: Mutex<()>,
}

impl SessionStatsCollector {
    pub fn new(client: Arc<dyn TransmissionApi>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client,
            timeout,
            download_speed: gauge_vec("session_stats_download_speed_bytes", "Current download speed in bytes", NO_LABELS)?,
            upload_speed: gauge_vec("session_stats_upload_speed_bytes", "Current upload speed in bytes", NO_LABELS)?,
            torrents: gauge_vec("session_stats_torrents_total", "The total number of torrents", NO_LABELS)?,
            active_torrents: gauge_vec("session_stats_torrents_active", "The number of active torrents", NO_LABELS)?,
            paused_torrents: gauge_vec("session_stats_torrents_paused", "The number of paused torrents", NO_LABELS)?,
            downloaded: gauge_vec("session_stats_downloaded_bytes", "The number of downloaded bytes", PERIOD)?,
            uploaded: gauge_vec("session_stats_uploaded_bytes", "The number of uploaded bytes", PERIOD)?,
            files_added: gauge_vec("session_stats_files_added", "The number of files added", PERIOD)?,
            active_seconds: gauge_vec("session_stats_active", "The time transmission is active since", PERIOD)?,
            sessions: gauge_vec("session_stats_sessions", "Count of the times transmission started", PERIOD)?,
            scrape: Mutex::new(()),
        })
    }

    fn all(&self) -> [&GaugeVec; 10] {
        [
            &self.download_speed,
            &self.upload_speed,
            &self.torrents,
            &self.active_torrents,
            &self.paused_torrents,
            &self.downloaded,
            &self.uploaded,
            &self.files_added,
            &self.active_seconds,
            &self.sessions,
        ]
    }

    async fn fetch(&self) -> Result<SessionStats> {
        tokio::time::timeout(self.timeout, self.client.session_stats())
            .await
            .map_err(|_| Error::timeout("session-stats", self.timeout))?
    }

    fn set(&self, stats: &SessionStats) {
        self.download_speed.with_label_values(NO_LABELS).set(stats.download_speed.as_f64());
        self.upload_speed.with_label_values(NO_LABELS).set(stats.upload_speed.as_f64());
        self.torrents.with_label_values(NO_LABELS).set(stats.torrents as f64);
        self.active_torrents.with_label_values(NO_LABELS).set(stats.active_torrents as f64);
        self.paused_torrents.with_label_values(NO_LABELS).set(stats.paused_torrents as f64);

        for period in StatsPeriod::ALL {
            let totals = stats.totals(period);
            let label = [period.as_label()];
            self.downloaded.with_label_values(&label).set(totals.downloaded.as_f64());
            self.uploaded.with_label_values(&label).set(totals.uploaded.as_f64());
            self.files_added.with_label_values(&label).set(totals.files_added as f64);
            self.active_seconds.with_label_values(&label).set(totals.active.as_secs_f64());
            self.sessions.with_label_values(&label).set(totals.sessions as f64);
        }
    }
}

#[async_trait]
impl ScrapeCollector for SessionStatsCollector {
    fn describe(&self) -> Vec<Desc> {
        describe_all(&self.all())
    }

    #[instrument(skip_all)]
    async fn collect(&self) -> Vec<MetricFamily> {
        let _scrape = self.scrape.lock().await;

        match self.fetch().await {
            Ok(stats) => {
                self.set(&stats);
                collect_all(&self.all())
            }
            Err(e) => {
                error!("Failed to get session stats: {}", e);
                Vec::new()
            }
        }
    }
}
