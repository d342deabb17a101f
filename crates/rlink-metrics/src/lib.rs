//! Metrics for the radio bridge stack.
//!
//! This crate declares every metric the session and pump sequencer record as
//! structured [`Metric`] constants, so names and metadata live in one place.
//! It re-exports the `metrics` crate; installing a recorder is left to the
//! application.
//!
//! # Example
//!
//! ```rust,ignore
//! use rlink_metrics::{describe_metrics, metric_defs, DeviceLabels};
//!
//! describe_metrics();
//!
//! let labels = DeviceLabels::new("bridge-1");
//! metrics::counter!(metric_defs::BRIDGE_COMMANDS.name, &labels.with_command("GetPacket"))
//!     .increment(1);
//! ```
//!
//! # Metric Type
//!
//! ```rust
//! use rlink_metrics::{Metric, MetricKind};
//! use metrics::Unit;
//!
//! const MY_COUNTER: Metric = Metric::counter("my.counter")
//!     .with_description("A counter metric")
//!     .with_unit(Unit::Count)
//!     .with_labels(&["device"]);
//!
//! assert_eq!(MY_COUNTER.kind, MetricKind::Counter);
//! metrics::counter!(MY_COUNTER.name).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// Built with const constructors so declarations are checked at compile time.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "rlink.bridge.commands").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    pub const DEVICE_LABELS: &[&str] = &["device"];

    pub const COMMAND_LABELS: &[&str] = &["device", "command"];

    // ========================================================================
    // Bridge Session Metrics
    // ========================================================================

    pub const BRIDGE_COMMANDS: Metric = Metric::counter("rlink.bridge.commands")
        .with_description("Commands written to the bridge")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    pub const BRIDGE_COMMAND_ERRORS: Metric = Metric::counter("rlink.bridge.command_errors")
        .with_description("Bridge commands that ended in an error")
        .with_unit(Unit::Count)
        .with_labels(&["device", "command", "error"]);

    pub const BRIDGE_COMMAND_LATENCY: Metric = Metric::histogram("rlink.bridge.command_latency_ms")
        .with_description("Time from command write to reply in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(COMMAND_LABELS);

    pub const BRIDGE_STALE_REPLIES: Metric = Metric::counter("rlink.bridge.stale_replies")
        .with_description("Replies to abandoned commands drained before a new reply")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    pub const IDLE_PACKETS: Metric = Metric::counter("rlink.idle.packets")
        .with_description("Unsolicited packets captured while idle listening")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    pub const IDLE_LISTENING: Metric = Metric::gauge("rlink.idle.listening")
        .with_description("1 while idle listening is enabled, else 0")
        .with_labels(DEVICE_LABELS);

    pub const SESSIONS: Metric = Metric::counter("rlink.session.started")
        .with_description("Command sessions run")
        .with_unit(Unit::Count)
        .with_labels(&["device", "session"]);

    // ========================================================================
    // Pump Sequencer Metrics
    // ========================================================================

    pub const PUMP_SEND_ATTEMPTS: Metric = Metric::counter("rlink.pump.send_attempts")
        .with_description("Send/listen attempts made to the pump")
        .with_unit(Unit::Count)
        .with_labels(&["device", "message"]);

    pub const PUMP_NO_RESPONSE: Metric = Metric::counter("rlink.pump.no_response")
        .with_description("Send/listen cycles that exhausted their retries")
        .with_unit(Unit::Count)
        .with_labels(&["device", "message"]);

    pub const PUMP_CROSSTALK: Metric = Metric::counter("rlink.pump.crosstalk")
        .with_description("Packets heard while waiting that were not the expected reply")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    pub const PUMP_WAKEUPS: Metric = Metric::counter("rlink.pump.wakeups")
        .with_description("Wake bursts sent to the pump")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    pub const PUMP_HISTORY_PAGES: Metric = Metric::counter("rlink.pump.history_pages")
        .with_description("History pages fetched")
        .with_unit(Unit::Count)
        .with_labels(DEVICE_LABELS);

    pub const PUMP_RSSI: Metric = Metric::histogram("rlink.pump.rssi_dbm")
        .with_description("Signal strength of pump replies in dBm")
        .with_labels(DEVICE_LABELS);

    pub const ALL: &[&Metric] = &[
        // Bridge session
        &BRIDGE_COMMANDS,
        &BRIDGE_COMMAND_ERRORS,
        &BRIDGE_COMMAND_LATENCY,
        &BRIDGE_STALE_REPLIES,
        &IDLE_PACKETS,
        &IDLE_LISTENING,
        &SESSIONS,
        // Pump sequencer
        &PUMP_SEND_ATTEMPTS,
        &PUMP_NO_RESPONSE,
        &PUMP_CROSSTALK,
        &PUMP_WAKEUPS,
        &PUMP_HISTORY_PAGES,
        &PUMP_RSSI,
    ];
}

/// Labels identifying the bridge a metric was recorded for.
#[derive(Debug, Clone)]
pub struct DeviceLabels {
    pub device: String,
}

impl DeviceLabels {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    ///
    /// ```rust
    /// use rlink_metrics::DeviceLabels;
    ///
    /// let labels = DeviceLabels::new("bridge-1").to_labels();
    /// assert_eq!(labels, vec![("device", "bridge-1".to_string())]);
    /// ```
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("device", self.device.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }

    pub fn with_command(&self, command: &'static str) -> Vec<(&'static str, String)> {
        self.with(&[("command", command.to_string())])
    }
}

/// Describes all metrics used by the stack.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
