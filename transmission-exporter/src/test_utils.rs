//! Test utilities: a scripted in-memory daemon and helpers for inspecting collected families.

use async_trait::async_trait;
use prometheus::proto::MetricFamily;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::transmission::{FreeSpace, Session, SessionStats, TransferTotals, TransmissionApi};
use crate::types::{Bytes, Gated};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Session matching a stock daemon with alt speeds switched on.
pub fn test_session() -> Session {
    Session {
        alt_speed_down: Gated::new(50, true),
        alt_speed_up: Gated::new(20, true),
        cache_size: Bytes::from_mebibytes(4),
        download_queue: Gated::new(5, true),
        seed_queue: Gated::new(10, false),
        peer_limit_global: 200,
        peer_limit_per_torrent: 50,
        seed_ratio_limit: Gated::new(2.0, false),
        speed_limit_down: Gated::new(100, false),
        speed_limit_up: Gated::new(100, true),
        peer_port: 51413,
        version: "3.00".to_string(),
        download_dir: "/data".to_string(),
        incomplete_dir: "/tmp".to_string(),
    }
}

/// A few hours into the daemon's twelfth run.
pub fn test_stats() -> SessionStats {
    SessionStats {
        torrents: 7,
        active_torrents: 3,
        paused_torrents: 1,
        download_speed: Bytes::new(2 * 1024 * 1024),
        upload_speed: Bytes::new(256 * 1024),
        current: TransferTotals {
            downloaded: Bytes::new(5 * GIB),
            uploaded: Bytes::new(GIB),
            files_added: 4,
            sessions: 1,
            active: Duration::from_secs(3 * 3600),
        },
        cumulative: TransferTotals {
            downloaded: Bytes::new(800 * GIB),
            uploaded: Bytes::new(1200 * GIB),
            files_added: 350,
            sessions: 12,
            active: Duration::from_secs(90 * 86400),
        },
    }
}

fn scripted_failure(method: &str) -> Error {
    Error::Rpc {
        method: method.to_string(),
        result: "scripted failure".to_string(),
    }
}

/// In-memory [`TransmissionApi`] whose answers are set by the test.
///
/// Unset answers fail: `port_open: None` fails `port-test`, a path without a scripted capacity
/// fails `free-space`, and unset stats fail `session-stats`.
pub struct FakeTransmission {
    session: Mutex<Session>,
    session_fails: AtomicBool,
    port_open: Mutex<Option<bool>>,
    free_space: Mutex<HashMap<String, FreeSpace>>,
    stats: Mutex<Option<SessionStats>>,
    stalled: AtomicBool,
    latency: Mutex<Duration>,
    port_test_calls: AtomicUsize,
}

impl FakeTransmission {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            session_fails: AtomicBool::new(false),
            port_open: Mutex::new(None),
            free_space: Mutex::new(HashMap::new()),
            stats: Mutex::new(None),
            stalled: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            port_test_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_port_open(&self, open: Option<bool>) {
        *self.port_open.lock().unwrap() = open;
    }

    pub fn set_session_port(&self, port: u16) {
        self.session.lock().unwrap().peer_port = port;
    }

    pub fn set_download_dir(&self, path: &str) {
        self.session.lock().unwrap().download_dir = path.to_string();
    }

    pub fn set_version(&self, version: &str) {
        self.session.lock().unwrap().version = version.to_string();
    }

    pub fn fail_session(&self, fail: bool) {
        self.session_fails.store(fail, Ordering::SeqCst);
    }

    pub fn set_free_space(&self, path: &str, free: u64, total: u64) {
        let space = FreeSpace {
            free: Bytes::new(free),
            total: Some(Bytes::new(total)),
        };
        self.free_space.lock().unwrap().insert(path.to_string(), space);
    }

    /// Free space as reported by a daemon that predates the `total_size` field.
    pub fn set_free_space_without_total(&self, path: &str, free: u64) {
        let space = FreeSpace {
            free: Bytes::new(free),
            total: None,
        };
        self.free_space.lock().unwrap().insert(path.to_string(), space);
    }

    pub fn fail_free_space(&self, path: &str) {
        self.free_space.lock().unwrap().remove(path);
    }

    /// `None` fails `session-stats`.
    pub fn set_stats(&self, stats: Option<SessionStats>) {
        *self.stats.lock().unwrap() = stats;
    }

    /// Make every call hang until the caller's deadline fires.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Delay every answer, so concurrent callers overlap.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn port_test_calls(&self) -> usize {
        self.port_test_calls.load(Ordering::SeqCst)
    }

    async fn maybe_stall(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl TransmissionApi for FakeTransmission {
    async fn test_port(&self) -> Result<bool> {
        self.port_test_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let open = *self.port_open.lock().unwrap();
        open.ok_or_else(|| scripted_failure("port-test"))
    }

    async fn session(&self) -> Result<Session> {
        self.maybe_stall().await;
        if self.session_fails.load(Ordering::SeqCst) {
            return Err(scripted_failure("session-get"));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn free_space(&self, path: &str) -> Result<FreeSpace> {
        self.maybe_stall().await;
        let space = self.free_space.lock().unwrap().get(path).copied();
        space.ok_or_else(|| scripted_failure("free-space"))
    }

    async fn session_stats(&self) -> Result<SessionStats> {
        self.maybe_stall().await;
        let stats = *self.stats.lock().unwrap();
        stats.ok_or_else(|| scripted_failure("session-stats"))
    }
}

/// Number of series in the named family, zero if the family is absent.
pub fn series_count(families: &[MetricFamily], name: &str) -> usize {
    families
        .iter()
        .filter(|family| family.name() == name)
        .map(|family| family.get_metric().len())
        .sum()
}

/// Value of the series in `name` whose label set is exactly `labels`.
pub fn gauge_value(families: &[MetricFamily], name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    families
        .iter()
        .filter(|family| family.name() == name)
        .flat_map(|family| family.get_metric().iter())
        .find(|metric| {
            let pairs = metric.get_label();
            pairs.len() == labels.len()
                && labels
                    .iter()
                    .all(|(key, value)| pairs.iter().any(|pair| pair.name() == *key && pair.value() == *value))
        })
        .map(|metric| metric.get_gauge().value())
}
