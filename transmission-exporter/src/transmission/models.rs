//! Wire format of the Transmission RPC protocol.
//!
//! Field names follow the daemon's mixed kebab/camel casing. Every session field is mandatory:
//! a daemon that omits one has broken its contract and the whole fetch fails to decode. The one
//! exception is the free-space total, which older daemons do not report.

use serde::{Deserialize, Serialize};

use std::time::Duration;

use super::{FreeSpace, Session, SessionStats, TransferTotals};
use crate::types::{Bytes, Gated};

pub const METHOD_PORT_TEST: &str = "port-test";
pub const METHOD_SESSION_GET: &str = "session-get";
pub const METHOD_FREE_SPACE: &str = "free-space";
pub const METHOD_SESSION_STATS: &str = "session-stats";

/// Value of `result` on a successful call.
pub const RESULT_SUCCESS: &str = "success";

/// Fields requested from `session-get`, so the daemon does not serialize its whole session.
pub const SESSION_FIELDS: &[&str] = &[
    "alt-speed-down",
    "alt-speed-up",
    "alt-speed-enabled",
    "cache-size-mb",
    "download-queue-size",
    "download-queue-enabled",
    "seed-queue-size",
    "seed-queue-enabled",
    "peer-limit-global",
    "peer-limit-per-torrent",
    "seedRatioLimit",
    "seedRatioLimited",
    "speed-limit-down",
    "speed-limit-down-enabled",
    "speed-limit-up",
    "speed-limit-up-enabled",
    "peer-port",
    "version",
    "download-dir",
    "incomplete-dir",
];

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, A: Serialize> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<A>,
    pub tag: u64,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<R> {
    pub result: String,
    pub arguments: Option<R>,
}

#[derive(Debug, Serialize)]
pub struct SessionGetArguments {
    pub fields: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct FreeSpaceArguments<'a> {
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortTestResponse {
    pub port_is_open: bool,
}

/// `total_size` only exists from RPC version 17 (Transmission 4.0) on.
#[derive(Debug, Deserialize)]
pub struct FreeSpaceResponse {
    #[serde(rename = "size-bytes")]
    pub size_bytes: u64,
    #[serde(default)]
    pub total_size: Option<u64>,
}

impl From<FreeSpaceResponse> for FreeSpace {
    fn from(value: FreeSpaceResponse) -> Self {
        Self {
            free: Bytes::new(value.size_bytes),
            total: value.total_size.map(Bytes::new),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionResponse {
    pub alt_speed_down: u64,
    pub alt_speed_up: u64,
    pub alt_speed_enabled: bool,
    pub cache_size_mb: u64,
    pub download_queue_size: u64,
    pub download_queue_enabled: bool,
    pub seed_queue_size: u64,
    pub seed_queue_enabled: bool,
    pub peer_limit_global: u64,
    pub peer_limit_per_torrent: u64,
    #[serde(rename = "seedRatioLimit")]
    pub seed_ratio_limit: f64,
    #[serde(rename = "seedRatioLimited")]
    pub seed_ratio_limited: bool,
    pub speed_limit_down: u64,
    pub speed_limit_down_enabled: bool,
    pub speed_limit_up: u64,
    pub speed_limit_up_enabled: bool,
    pub peer_port: u16,
    pub version: String,
    pub download_dir: String,
    pub incomplete_dir: String,
}

impl From<SessionResponse> for Session {
    fn from(value: SessionResponse) -> Self {
        Self {
            // Both alt speeds share one switch
            alt_speed_down: Gated::new(value.alt_speed_down, value.alt_speed_enabled),
            alt_speed_up: Gated::new(value.alt_speed_up, value.alt_speed_enabled),
            cache_size: Bytes::from_mebibytes(value.cache_size_mb),
            download_queue: Gated::new(value.download_queue_size, value.download_queue_enabled),
            seed_queue: Gated::new(value.seed_queue_size, value.seed_queue_enabled),
            peer_limit_global: value.peer_limit_global,
            peer_limit_per_torrent: value.peer_limit_per_torrent,
            seed_ratio_limit: Gated::new(value.seed_ratio_limit, value.seed_ratio_limited),
            speed_limit_down: Gated::new(value.speed_limit_down, value.speed_limit_down_enabled),
            speed_limit_up: Gated::new(value.speed_limit_up, value.speed_limit_up_enabled),
            peer_port: value.peer_port,
            version: value.version,
            download_dir: value.download_dir,
            incomplete_dir: value.incomplete_dir,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTotalsResponse {
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub files_added: u64,
    pub session_count: u64,
    pub seconds_active: u64,
}

impl From<TransferTotalsResponse> for TransferTotals {
    fn from(value: TransferTotalsResponse) -> Self {
        Self {
            downloaded: Bytes::new(value.downloaded_bytes),
            uploaded: Bytes::new(value.uploaded_bytes),
            files_added: value.files_added,
            sessions: value.session_count,
            active: Duration::from_secs(value.seconds_active),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatsResponse {
    pub torrent_count: u64,
    pub active_torrent_count: u64,
    pub paused_torrent_count: u64,
    pub download_speed: u64,
    pub upload_speed: u64,
    #[serde(rename = "current-stats")]
    pub current_stats: TransferTotalsResponse,
    #[serde(rename = "cumulative-stats")]
    pub cumulative_stats: TransferTotalsResponse,
}

impl From<SessionStatsResponse> for SessionStats {
    fn from(value: SessionStatsResponse) -> Self {
        Self {
            torrents: value.torrent_count,
            active_torrents: value.active_torrent_count,
            paused_torrents: value.paused_torrent_count,
            download_speed: Bytes::new(value.download_speed),
            upload_speed: Bytes::new(value.upload_speed),
            current: value.current_stats.into(),
            cumulative: value.cumulative_stats.into(),
        }
    }
}
