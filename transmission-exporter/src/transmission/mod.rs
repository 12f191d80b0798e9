//! The Transmission daemon as seen by the collectors.
//!
//! [`TransmissionApi`] is the seam between collection logic and the wire: collectors only ever see
//! the domain types below, with sizes already normalized to [`Bytes`] and enable flags already
//! paired with their values. [`TransmissionClient`] is the reqwest implementation.

mod client;
mod models;

pub use client::{Credentials, TransmissionClient, install_crypto_provider};

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::Result;
use crate::types::{Bytes, DirRole, Gated, StatsPeriod};

/// Snapshot of the daemon's session configuration, fetched fresh on every use.
///
/// Speed values are in the daemon's native speed unit (kB/s by default).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub alt_speed_down: Gated<u64>,
    pub alt_speed_up: Gated<u64>,
    pub cache_size: Bytes,
    pub download_queue: Gated<u64>,
    pub seed_queue: Gated<u64>,
    pub peer_limit_global: u64,
    pub peer_limit_per_torrent: u64,
    pub seed_ratio_limit: Gated<f64>,
    pub speed_limit_down: Gated<u64>,
    pub speed_limit_up: Gated<u64>,
    pub peer_port: u16,
    pub version: String,
    pub download_dir: String,
    pub incomplete_dir: String,
}

impl Session {
    pub fn dir(&self, role: DirRole) -> &str {
        match role {
            DirRole::Download => &self.download_dir,
            DirRole::Incomplete => &self.incomplete_dir,
        }
    }
}

/// Capacity of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace {
    pub free: Bytes,
    /// Only reported by Transmission 4.0 and later.
    pub total: Option<Bytes>,
}

/// Transfer totals over one [`StatsPeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferTotals {
    pub downloaded: Bytes,
    pub uploaded: Bytes,
    pub files_added: u64,
    /// Number of times the daemon was started.
    pub sessions: u64,
    pub active: Duration,
}

/// Live activity counters from `session-stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub torrents: u64,
    pub active_torrents: u64,
    pub paused_torrents: u64,
    /// Bytes per second.
    pub download_speed: Bytes,
    /// Bytes per second.
    pub upload_speed: Bytes,
    pub current: TransferTotals,
    pub cumulative: TransferTotals,
}

impl SessionStats {
    pub fn totals(&self, period: StatsPeriod) -> &TransferTotals {
        match period {
            StatsPeriod::Current => &self.current,
            StatsPeriod::Cumulative => &self.cumulative,
        }
    }
}

/// The daemon operations the collectors depend on.
///
/// Implementations must be safe to call concurrently; the port status collector issues
/// [`test_port`](TransmissionApi::test_port) and [`session`](TransmissionApi::session) at the
/// same time. Callers bound every call with their own deadline and drop the future on expiry.
#[async_trait]
pub trait TransmissionApi: Send + Sync {
    /// Ask the daemon whether its peer port is reachable from the outside.
    async fn test_port(&self) -> Result<bool>;

    async fn session(&self) -> Result<Session>;

    async fn free_space(&self, path: &str) -> Result<FreeSpace>;

    async fn session_stats(&self) -> Result<SessionStats>;
}
