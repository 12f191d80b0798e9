//! Domain value types shared by the RPC client and the collectors.
//!
//! - [`Bytes`]: a byte quantity. Every size the daemon reports is converted into this type at the
//!   wire boundary, so collectors never have to know which unit the daemon used.
//! - [`Gated`]: a numeric setting together with the flag that switches it on or off. The two are
//!   always read, stored and exported together.
//! - [`DirRole`]: which of the daemon's two download directories a path plays the role of.
//! - [`StatsPeriod`]: which window a set of transfer statistics covers.

use std::fmt;

const BYTES_PER_MEBIBYTE: u64 = 1024 * 1024;

/// A quantity of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Bytes(u64);

impl Bytes {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Saturates instead of wrapping; the daemon reports cache sizes in MiB.
    pub const fn from_mebibytes(mebibytes: u64) -> Self {
        Self(mebibytes.saturating_mul(BYTES_PER_MEBIBYTE))
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Gauge value. Precision is lost above 2^53 bytes (8 PiB).
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

/// A setting whose value only applies while `enabled` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gated<T> {
    pub value: T,
    pub enabled: bool,
}

impl<T> Gated<T> {
    pub const fn new(value: T, enabled: bool) -> Self {
        Self { value, enabled }
    }

    /// Convert the value, keeping it paired with its flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Gated<U> {
        Gated {
            value: f(self.value),
            enabled: self.enabled,
        }
    }
}

/// Role of a directory in the daemon's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirRole {
    /// Where finished downloads are stored.
    Download,
    /// Where partial downloads are staged.
    Incomplete,
}

impl DirRole {
    pub const ALL: [DirRole; 2] = [DirRole::Download, DirRole::Incomplete];

    /// Value of the `type` label on the space gauges.
    pub const fn as_label(self) -> &'static str {
        match self {
            DirRole::Download => "download-dir",
            DirRole::Incomplete => "incomplete-dir",
        }
    }
}

impl fmt::Display for DirRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Window covered by the daemon's transfer statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsPeriod {
    /// Since the daemon last started.
    Current,
    /// Over every run of the daemon.
    Cumulative,
}

impl StatsPeriod {
    pub const ALL: [StatsPeriod; 2] = [StatsPeriod::Current, StatsPeriod::Cumulative];

    pub const fn as_label(self) -> &'static str {
        match self {
            StatsPeriod::Current => "current",
            StatsPeriod::Cumulative => "cumulative",
        }
    }
}
