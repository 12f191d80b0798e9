//! Peer port reachability, refreshed at most once per interval.
//!
//! A port test makes the daemon contact an external checker, so it is far too expensive to run
//! on every scrape. The collector keeps the last successful result and only re-probes once the
//! configured interval has passed. The reachability test and the peer port lookup run
//! concurrently under one deadline, and the result is only published if both succeed: a port
//! number is never paired with a reachability answer from a different refresh.

use async_trait::async_trait;
use prometheus::GaugeVec;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{ScrapeCollector, collect_all, describe_all, gauge_vec};
use crate::errors::{Error, Result};
use crate::transmission::TransmissionApi;

/// Result of one successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PortStatus {
    port: u16,
    open: bool,
}

pub struct PortStatusCollector {
    client: Arc<dyn TransmissionApi>,
    interval: Duration,
    timeout: Duration,
    port_open: GaugeVec,
    /// Time of the last successful refresh. The lock is held for the whole refresh, so
    /// concurrent scrapes never probe twice or interleave their writes to `port_open`.
    last_refresh: Mutex<Option<Instant>>,
}

impl PortStatusCollector {
    pub fn new(client: Arc<dyn TransmissionApi>, interval: Duration, timeout: Duration) -> Result<Self> {
        let port_open = gauge_vec(
            "port_open",
            "Whether the peer port is reachable from the outside (1) or not (0)",
            &["port"],
        )?;

        Ok(Self {
            client,
            interval,
            timeout,
            port_open,
            last_refresh: Mutex::new(None),
        })
    }

    fn is_due(&self, last_refresh: Option<Instant>, now: Instant) -> bool {
        match last_refresh {
            Some(at) => now >= at + self.interval,
            None => true,
        }
    }

    /// Run both sub-queries. The first failure (or the deadline) aborts the whole refresh.
    async fn probe(&self) -> Result<PortStatus> {
        let probes = async { tokio::try_join!(self.client.test_port(), self.client.session()) };

        let (open, session) = tokio::time::timeout(self.timeout, probes)
            .await
            .map_err(|_| Error::timeout("port status refresh", self.timeout))??;

        Ok(PortStatus {
            port: session.peer_port,
            open,
        })
    }

    fn publish(&self, status: PortStatus) {
        // The port is the label, so a changed port leaves a stale series behind unless cleared
        self.port_open.reset();
        self.port_open
            .with_label_values(&[status.port.to_string().as_str()])
            .set(if status.open { 1.0 } else { 0.0 });
    }
}

#[async_trait]
impl ScrapeCollector for PortStatusCollector {
    fn describe(&self) -> Vec<Desc> {
        describe_all(&[&self.port_open])
    }

    #[instrument(skip_all)]
    async fn collect(&self) -> Vec<MetricFamily> {
        let mut last_refresh = self.last_refresh.lock().await;

        if self.is_due(*last_refresh, Instant::now()) {
            match self.probe().await {
                Ok(status) => {
                    info!(port = status.port, open = status.open, "Refreshed port status");
                    self.publish(status);
                    *last_refresh = Some(Instant::now());
                }
                Err(e) => warn!("Failed to get port status: {}", e),
            }
        } else {
            debug!("Port status is fresh, serving cached value");
        }

        collect_all(&[&self.port_open])
    }
}
