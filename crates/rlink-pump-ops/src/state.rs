//! Per-pump soft state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use minimed_history::PumpModel;
use minimed_packet::{MessageTable, PumpAddress};
use tokio::time::Instant;

/// What the host knows about one pump between operations.
///
/// Lives only as long as the process; updated after commands complete.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpState {
    pub pump_id: PumpAddress,
    pub model: Option<PumpModel>,
    /// The pump's radio is known to be on until this instant.
    pub awake_until: Option<Instant>,
    pub last_wake_attempt: Option<Instant>,
    pub last_history_dump: Option<DateTime<Utc>>,
    /// Frequency chosen by the last successful tune.
    pub tuned_frequency_mhz: Option<f64>,
}

impl PumpState {
    pub fn new(pump_id: PumpAddress, model: Option<PumpModel>) -> Self {
        PumpState {
            pump_id,
            model,
            awake_until: None,
            last_wake_attempt: None,
            last_history_dump: None,
            tuned_frequency_mhz: None,
        }
    }

    pub fn is_awake(&self) -> bool {
        self.awake_until.is_some_and(|until| until > Instant::now())
    }

    pub fn mark_awake_for(&mut self, duration: Duration) {
        self.awake_until = Some(Instant::now() + duration);
    }

    /// Whether a wake burst was sent less than `interval` ago.
    pub fn woke_within(&self, interval: Duration) -> bool {
        self.last_wake_attempt.is_some_and(|at| at.elapsed() < interval)
    }

    /// Code table for replies; MySentry-era until the model is known.
    pub fn message_table(&self) -> MessageTable {
        self.model.map(PumpModel::message_table).unwrap_or_default()
    }
}
