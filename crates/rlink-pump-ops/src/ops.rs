//! Pump operations over a shared bridge.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use minimed_history::HistoryPage;
use minimed_packet::ButtonType;
use rlink_bridge_protocol::FirmwareState;
use rlink_session::{BridgeDevice, BridgeTransport};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::PumpSettings;
use crate::error::{PumpOpsError, Result};
use crate::sequencer::{BatteryStatus, PumpSequencer, ScanResult, TimestampedHistoryEvent};
use crate::state::PumpState;

type SequencerFuture<'s, R> = Pin<Box<dyn Future<Output = Result<R>> + Send + 's>>;

/// One pump reached through one bridge.
///
/// Each operation runs in its own command session, so calls from several
/// tasks queue on the bridge instead of interleaving. Operations are
/// refused while the bridge runs firmware that cannot talk to pumps.
pub struct PumpOps<T: BridgeTransport> {
    device: BridgeDevice<T>,
    settings: PumpSettings,
    state: Mutex<PumpState>,
}

impl<T: BridgeTransport> PumpOps<T> {
    pub fn new(device: BridgeDevice<T>, settings: PumpSettings) -> Self {
        let mut state = PumpState::new(settings.pump_id, settings.pump_model);
        state.tuned_frequency_mhz = settings.frequency_mhz;
        PumpOps {
            device,
            settings,
            state: Mutex::new(state),
        }
    }

    pub fn device(&self) -> &BridgeDevice<T> {
        &self.device
    }

    pub fn settings(&self) -> &PumpSettings {
        &self.settings
    }

    /// Snapshot of the pump state.
    pub async fn state(&self) -> PumpState {
        self.state.lock().await.clone()
    }

    fn check_firmware(&self) -> Result<()> {
        match self.device.firmware_state() {
            FirmwareState::Invalid => {
                let version = self.device.status().firmware_version;
                warn!(device = self.device.name(), ?version, "Pump operation refused");
                Err(PumpOpsError::FirmwareIncompatible(version))
            }
            _ => Ok(()),
        }
    }

    /// Run `body` in a command session with a sequencer over the pump state.
    async fn with_sequencer<R, F>(&self, name: &str, body: F) -> Result<R>
    where
        F: for<'s> FnOnce(PumpSequencer<'s, T>) -> SequencerFuture<'s, R>,
    {
        self.check_firmware()?;
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let settings = &self.settings;
        self.device
            .run_session(name, |session| body(PumpSequencer::new(session, state, settings)))
            .await
    }

    /// Wake the pump for `duration`. Returns false when it did not answer.
    pub async fn wakeup(&self, duration: Duration) -> Result<bool> {
        let result = self
            .with_sequencer("wakeup", |mut seq| {
                Box::pin(async move { seq.wakeup(duration).await })
            })
            .await;
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_no_response() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_pump_model(&self) -> Result<String> {
        self.with_sequencer("get_pump_model", |mut seq| {
            Box::pin(async move { seq.get_pump_model().await })
        })
        .await
    }

    pub async fn get_battery_voltage(&self) -> Result<BatteryStatus> {
        self.with_sequencer("get_battery_voltage", |mut seq| {
            Box::pin(async move { seq.get_battery_voltage().await })
        })
        .await
    }

    pub async fn press_button(&self, button: ButtonType) -> Result<()> {
        self.with_sequencer("press_button", |mut seq| {
            Box::pin(async move { seq.press_button(button).await })
        })
        .await
    }

    pub async fn get_history_page(&self, page: u8) -> Result<HistoryPage> {
        self.with_sequencer("get_history_page", |mut seq| {
            Box::pin(async move { seq.get_history_page(page).await })
        })
        .await
    }

    pub async fn get_history_events(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TimestampedHistoryEvent>> {
        self.with_sequencer("get_history_events", |mut seq| {
            Box::pin(async move { seq.get_history_events(since).await })
        })
        .await
    }

    /// Scan the configured region's band and tune to the pump.
    pub async fn tune_pump(&self) -> Result<ScanResult> {
        let region = self.settings.region;
        self.with_sequencer("tune_pump", |mut seq| {
            Box::pin(async move { seq.tune_pump(region).await })
        })
        .await
    }

    pub async fn set_base_frequency(&self, mhz: f64) -> Result<()> {
        self.with_sequencer("set_base_frequency", |mut seq| {
            Box::pin(async move { seq.set_base_frequency(mhz).await })
        })
        .await
    }
}
