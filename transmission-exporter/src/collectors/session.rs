//! Session configuration and download directory capacity.
//!
//! Every scrape fetches the session and probes free space for both download directories under a
//! single deadline. Session series are rebuilt from scratch each time and only emitted when the
//! session fetch succeeds. The space gauges are keyed by `(type, path)`: a failed probe retracts
//! the series for its directory, and a directory that moved has its old path retracted, so a
//! frozen value is never served.

use async_trait::async_trait;
use prometheus::GaugeVec;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, instrument, warn};

use super::{ScrapeCollector, bool_label, collect_all, describe_all, gauge_vec};
use crate::errors::{Error, Result};
use crate::transmission::{FreeSpace, Session, TransmissionApi};
use crate::types::{DirRole, Gated};

const NO_LABELS: &[&str] = &[];
const ENABLED: &[&str] = &["enabled"];

/// Gauges rebuilt from the session on every successful scrape.
struct SessionGauges {
    alt_speed_down: GaugeVec,
    alt_speed_up: GaugeVec,
    cache_size: GaugeVec,
    queue_down: GaugeVec,
    queue_up: GaugeVec,
    global_peer_limit: GaugeVec,
    torrent_peer_limit: GaugeVec,
    seed_ratio_limit: GaugeVec,
    speed_limit_down: GaugeVec,
    speed_limit_up: GaugeVec,
    version: GaugeVec,
}

impl SessionGauges {
    fn new() -> Result<Self> {
        Ok(Self {
            alt_speed_down: gauge_vec("alt_speed_down", "Alternative max global download speed", ENABLED)?,
            alt_speed_up: gauge_vec("alt_speed_up", "Alternative max global upload speed", ENABLED)?,
            cache_size: gauge_vec("cache_size_bytes", "Maximum size of the disk cache", NO_LABELS)?,
            queue_down: gauge_vec("queue_down", "Max number of torrents to download at once", ENABLED)?,
            queue_up: gauge_vec("queue_up", "Max number of torrents to upload at once", ENABLED)?,
            global_peer_limit: gauge_vec("global_peer_limit", "Maximum global number of peers", NO_LABELS)?,
            torrent_peer_limit: gauge_vec("torrent_peer_limit", "Maximum number of peers for a single torrent", NO_LABELS)?,
            seed_ratio_limit: gauge_vec("seed_ratio_limit", "The default seed ratio for torrents to use", ENABLED)?,
            speed_limit_down: gauge_vec("speed_limit_down_bytes", "Max global download speed", ENABLED)?,
            speed_limit_up: gauge_vec("speed_limit_up_bytes", "Max global upload speed", ENABLED)?,
            version: gauge_vec("version", "Transmission version as label", &["version"])?,
        })
    }

    fn all(&self) -> [&GaugeVec; 11] {
        [
            &self.alt_speed_down,
            &self.alt_speed_up,
            &self.cache_size,
            &self.queue_down,
            &self.queue_up,
            &self.global_peer_limit,
            &self.torrent_peer_limit,
            &self.seed_ratio_limit,
            &self.speed_limit_down,
            &self.speed_limit_up,
            &self.version,
        ]
    }

    fn set(&self, session: &Session) {
        for gauge in self.all() {
            gauge.reset();
        }

        set_gated(&self.alt_speed_down, session.alt_speed_down.map(|v| v as f64));
        set_gated(&self.alt_speed_up, session.alt_speed_up.map(|v| v as f64));
        self.cache_size.with_label_values(NO_LABELS).set(session.cache_size.as_f64());
        set_gated(&self.queue_down, session.download_queue.map(|v| v as f64));
        set_gated(&self.queue_up, session.seed_queue.map(|v| v as f64));
        self.global_peer_limit
            .with_label_values(NO_LABELS)
            .set(session.peer_limit_global as f64);
        self.torrent_peer_limit
            .with_label_values(NO_LABELS)
            .set(session.peer_limit_per_torrent as f64);
        set_gated(&self.seed_ratio_limit, session.seed_ratio_limit);
        set_gated(&self.speed_limit_down, session.speed_limit_down.map(|v| v as f64));
        set_gated(&self.speed_limit_up, session.speed_limit_up.map(|v| v as f64));
        self.version.with_label_values(&[session.version.as_str()]).set(1.0);
    }
}

fn set_gated(gauge: &GaugeVec, setting: Gated<f64>) {
    gauge.with_label_values(&[bool_label(setting.enabled)]).set(setting.value);
}

pub struct SessionCollector {
    client: Arc<dyn TransmissionApi>,
    timeout: Duration,
    session: SessionGauges,
    free_space: GaugeVec,
    total_space: GaugeVec,
    /// Path each directory role was last published under. Held for the whole scrape, so
    /// concurrent scrapes cannot interleave resets and writes.
    published: Mutex<HashMap<DirRole, String>>,
}

impl SessionCollector {
    pub fn new(client: Arc<dyn TransmissionApi>, timeout: Duration) -> Result<Self> {
        let labels = &["type", "path"];

        Ok(Self {
            client,
            timeout,
            session: SessionGauges::new()?,
            free_space: gauge_vec("free_space_bytes", "Free space left on device to download to", labels)?,
            total_space: gauge_vec("total_space_bytes", "Total space on device to download to", labels)?,
            published: Mutex::new(HashMap::new()),
        })
    }

    async fn fetch_session(&self, deadline: Instant) -> Result<Session> {
        timeout_at(deadline, self.client.session())
            .await
            .map_err(|_| Error::timeout("session-get", self.timeout))?
    }

    async fn fetch_free_space(&self, path: &str, deadline: Instant) -> Result<FreeSpace> {
        timeout_at(deadline, self.client.free_space(path))
            .await
            .map_err(|_| Error::timeout("free-space", self.timeout))?
    }

    fn update_space(&self, published: &mut HashMap<DirRole, String>, role: DirRole, path: &str, space: FreeSpace) {
        if published.get(&role).is_some_and(|old| old != path) {
            debug!(%role, path, "Directory moved, retracting old path");
            self.retract_space(published, role);
        }

        let labels = [role.as_label(), path];
        self.free_space.with_label_values(&labels).set(space.free.as_f64());
        match space.total {
            Some(total) => self.total_space.with_label_values(&labels).set(total.as_f64()),
            None => {
                let _ = self.total_space.remove_label_values(&labels);
            }
        }
        published.insert(role, path.to_string());
    }

    fn retract_space(&self, published: &mut HashMap<DirRole, String>, role: DirRole) {
        if let Some(path) = published.remove(&role) {
            let labels = [role.as_label(), path.as_str()];
            // Either may be gone already; absence is all that matters
            let _ = self.free_space.remove_label_values(&labels);
            let _ = self.total_space.remove_label_values(&labels);
        }
    }
}

#[async_trait]
impl ScrapeCollector for SessionCollector {
    fn describe(&self) -> Vec<Desc> {
        let mut descs = describe_all(&[&self.free_space, &self.total_space]);
        descs.extend(describe_all(&self.session.all()));
        descs
    }

    #[instrument(skip_all)]
    async fn collect(&self) -> Vec<MetricFamily> {
        let mut published = self.published.lock().await;
        let deadline = Instant::now() + self.timeout;

        let session = match self.fetch_session(deadline).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to get session: {}", e);
                return Vec::new();
            }
        };

        for role in DirRole::ALL {
            let path = session.dir(role);
            match self.fetch_free_space(path, deadline).await {
                Ok(space) => self.update_space(&mut published, role, path, space),
                Err(e) => {
                    warn!(%role, path, "Failed to get free space: {}", e);
                    self.retract_space(&mut published, role);
                }
            }
        }

        self.session.set(&session);

        let mut families = collect_all(&[&self.free_space, &self.total_space]);
        families.extend(collect_all(&self.session.all()));
        families
    }
}
