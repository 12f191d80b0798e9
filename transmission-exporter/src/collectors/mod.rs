//! Prometheus collectors for the Transmission daemon.
//!
//! Each collector implements [`ScrapeCollector`]: `describe` hands out static descriptors once at
//! registration, `collect` runs once per scrape and returns whatever series are valid right now.
//! The [`Exporter`] merges all registered collectors into one text exposition payload.
//!
//! Collectors own the process-wide gauge state they publish. Nothing outside a collector's own
//! `collect` writes to it, and remote failures never escape `collect`: they are logged and turn
//! into fewer (or older) series.

mod port_status;
mod session;
mod stats;

pub use port_status::PortStatusCollector;
pub use session::SessionCollector;
pub use stats::SessionStatsCollector;

use async_trait::async_trait;
use futures::future::join_all;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, TextEncoder};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::Result;

/// Prefix shared by every exported series.
pub const NAMESPACE: &str = "transmission";

/// A source of series that is asked for a fresh snapshot on every scrape.
#[async_trait]
pub trait ScrapeCollector: Send + Sync {
    /// Static metadata of every family this collector can emit.
    fn describe(&self) -> Vec<Desc>;

    /// Current series. May return fewer families than described, never fails.
    async fn collect(&self) -> Vec<MetricFamily>;
}

/// Boolean label value. Enable flags qualify the value they travel with, so they are labels
/// rather than series of their own.
pub(crate) fn bool_label(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

pub(crate) fn gauge_vec(name: &str, help: &str, label_names: &[&str]) -> Result<GaugeVec> {
    Ok(GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), label_names)?)
}

pub(crate) fn describe_all(vecs: &[&GaugeVec]) -> Vec<Desc> {
    vecs.iter().flat_map(|vec| vec.desc().into_iter().cloned()).collect()
}

pub(crate) fn collect_all(vecs: &[&GaugeVec]) -> Vec<MetricFamily> {
    vecs.iter().flat_map(|vec| vec.collect()).collect()
}

/// Registry of scrape collectors.
#[derive(Default)]
pub struct Exporter {
    collectors: Vec<Arc<dyn ScrapeCollector>>,
    names: HashSet<String>,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector, rejecting it if any of its families is already provided by another.
    pub fn register(&mut self, collector: Arc<dyn ScrapeCollector>) -> Result<()> {
        let mut incoming = HashSet::new();
        for desc in collector.describe() {
            if self.names.contains(&desc.fq_name) || !incoming.insert(desc.fq_name.clone()) {
                return Err(prometheus::Error::AlreadyReg.into());
            }
        }

        debug!("Registered collector with {} families", incoming.len());
        self.names.extend(incoming);
        self.collectors.push(collector);
        Ok(())
    }

    /// Run every collector once and merge their output, sorted by family name.
    #[instrument(skip_all)]
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let outputs = join_all(self.collectors.iter().map(|collector| collector.collect())).await;

        let mut families: Vec<MetricFamily> = outputs
            .into_iter()
            .flatten()
            // The text encoder rejects families without series
            .filter(|family| !family.get_metric().is_empty())
            .collect();
        families.sort_by(|a, b| a.name().cmp(b.name()));
        families
    }

    /// One scrape, encoded in the Prometheus text format.
    pub async fn render(&self) -> Result<String> {
        let families = self.gather().await;
        let mut buffer = vec![];
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
