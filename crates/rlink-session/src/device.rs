//! The per-bridge device actor.
//!
//! A [`BridgeDevice`] owns one transport. Every command goes through
//! [`BridgeDevice::run_session`], which holds the device's command lock for
//! the whole session, so commands from concurrent callers queue rather than
//! interleave on the wire. Between sessions an optional background task keeps
//! the radio listening and publishes whatever it hears.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rlink_bridge_protocol::{
    encode_write, BridgeCommand, BridgeError, BridgeResponse, FirmwareState, FirmwareVersion,
    RadioPacket, ResponseCode, CMD_GET_VERSION, RESP_CODE_CMD_INTERRUPTED, RESP_CODE_SUCCESS,
};
use rlink_metrics::{metric_defs, DeviceLabels};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::frame::RadioFrame;
use crate::session::CommandSession;
use crate::transport::{BridgeTransport, ConnectionState};

/// Frames buffered per subscriber before the slowest one starts lagging.
const PACKET_CHANNEL_CAPACITY: usize = 64;

/// Pause after an unexpected idle-listen failure before listening again.
const IDLE_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Status
// ============================================================================

/// Snapshot of a device's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// Host-side device name.
    pub name: String,
    /// Connection state reported by the transport.
    pub connection_state: ConnectionState,
    /// Version string read on connect.
    pub firmware_version: Option<String>,
    /// Compatibility of that version.
    #[serde(serialize_with = "display")]
    pub firmware_state: FirmwareState,
    /// Channel the radio listens on between sessions.
    pub idle_listen_channel: Option<u8>,
    /// When idle listening last finished a listen window.
    pub last_idle: Option<DateTime<Utc>>,
    /// Name stored on the peripheral.
    pub custom_name: Option<String>,
}

fn display<S: serde::Serializer>(
    value: &FirmwareState,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Default)]
struct SoftState {
    firmware: Option<FirmwareVersion>,
    firmware_version: Option<String>,
    firmware_state: FirmwareState,
    idle_channel: Option<u8>,
    last_idle: Option<DateTime<Utc>>,
}

// ============================================================================
// Device
// ============================================================================

/// Handle to one connected bridge. Cheap to clone; clones share the device.
pub struct BridgeDevice<T: BridgeTransport> {
    inner: Arc<DeviceInner<T>>,
}

impl<T: BridgeTransport> Clone for BridgeDevice<T> {
    fn clone(&self) -> Self {
        BridgeDevice {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct DeviceInner<T: BridgeTransport> {
    name: String,
    transport: Arc<T>,
    config: SessionConfig,
    labels: DeviceLabels,
    /// Held by a session or by one idle listen.
    command_lock: Arc<AsyncMutex<()>>,
    state: RwLock<SoftState>,
    packets: broadcast::Sender<RadioFrame>,
    frame_sequence: AtomicU64,
    /// Bumped by [`BridgeDevice::cancel_command`].
    cancel: watch::Sender<u64>,
    /// A command was abandoned; the bridge still owes it a reply.
    stale_reply: AtomicBool,
    /// Sessions queued for the command lock.
    waiting: AtomicUsize,
    /// Wakes an idle listen so a queued session can run.
    preempt: Notify,
    idle_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: BridgeTransport> BridgeDevice<T> {
    pub fn new(name: impl Into<String>, transport: Arc<T>, config: SessionConfig) -> Self {
        let name = name.into();
        let (packets, _) = broadcast::channel(PACKET_CHANNEL_CAPACITY);
        let (cancel, _) = watch::channel(0);
        BridgeDevice {
            inner: Arc::new(DeviceInner {
                labels: DeviceLabels::new(name.clone()),
                name,
                transport,
                config,
                command_lock: Arc::new(AsyncMutex::new(())),
                state: RwLock::new(SoftState::default()),
                packets,
                frame_sequence: AtomicU64::new(0),
                cancel,
                stale_reply: AtomicBool::new(false),
                waiting: AtomicUsize::new(0),
                preempt: Notify::new(),
                idle_task: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    pub fn status(&self) -> DeviceStatus {
        let state = self.inner.state.read();
        DeviceStatus {
            name: self.inner.name.clone(),
            connection_state: self.inner.transport.state(),
            firmware_version: state.firmware_version.clone(),
            firmware_state: state.firmware_state,
            idle_listen_channel: state.idle_channel,
            last_idle: state.last_idle,
            custom_name: self.inner.transport.custom_name(),
        }
    }

    pub fn firmware_state(&self) -> FirmwareState {
        self.inner.state.read().firmware_state
    }

    /// Parsed firmware version, once read.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.inner.state.read().firmware.clone()
    }

    /// Frames heard while idle listening, and stray frames the pump
    /// sequencer set aside.
    pub fn subscribe_packets(&self) -> broadcast::Receiver<RadioFrame> {
        self.inner.packets.subscribe()
    }

    /// Read and classify the firmware version. Call once the transport
    /// reports [`ConnectionState::Connected`].
    ///
    /// Out-of-date firmware is logged and usable; invalid firmware is
    /// recorded and left for callers to refuse.
    pub async fn on_connected(&self) -> Result<FirmwareState> {
        let version = self
            .run_session("connect", |mut session| async move {
                session.read_version().await
            })
            .await?;

        let firmware = FirmwareVersion::parse(&version);
        let firmware_state = FirmwareVersion::classify(&version);
        match firmware_state {
            FirmwareState::OutOfDate => {
                warn!(device = %self.inner.name, version = %version, "Bridge firmware is out of date")
            }
            FirmwareState::Invalid => {
                warn!(device = %self.inner.name, version = %version, "Bridge firmware is not supported")
            }
            _ => debug!(device = %self.inner.name, version = %version, "Bridge firmware is up to date"),
        }
        {
            let mut state = self.inner.state.write();
            state.firmware = firmware;
            state.firmware_version = Some(version);
            state.firmware_state = firmware_state;
        }

        if let Some(channel) = self.inner.config.idle_channel {
            self.enable_idle_listening(channel).await?;
        }
        Ok(firmware_state)
    }

    /// Stop background work after the transport dropped the connection.
    pub fn on_disconnected(&self) {
        debug!(device = %self.inner.name, "Bridge disconnected");
        if let Some(handle) = self.inner.idle_task.lock().take() {
            handle.abort();
        }
        self.inner.stale_reply.store(false, Ordering::Release);
    }

    /// Run `body` with exclusive use of the bridge.
    ///
    /// Sessions run one at a time in arrival order. An idle listen in
    /// progress is abandoned so the session does not wait out its window;
    /// idle listening is re-asserted once `body` finishes.
    pub async fn run_session<F, Fut, R>(&self, name: &str, body: F) -> R
    where
        F: FnOnce(CommandSession<T>) -> Fut,
        Fut: Future<Output = R>,
    {
        let queued = Queued::new(&self.inner);
        let guard = Arc::clone(&self.inner.command_lock).lock_owned().await;
        drop(queued);

        debug!(device = %self.inner.name, session = name, "Session started");
        metrics::counter!(
            metric_defs::SESSIONS.name,
            &self.inner.labels.with(&[("session", name.to_string())])[..]
        )
        .increment(1);

        let session = CommandSession::new(self.clone(), name, guard);
        let result = body(session).await;

        debug!(device = %self.inner.name, session = name, "Session finished");
        self.assert_idle_listening(false);
        result
    }

    /// Interrupt the command in flight, if any. Its caller gets
    /// [`BridgeError::CmdInterrupted`].
    pub fn cancel_command(&self) {
        self.inner.cancel.send_modify(|generation| *generation += 1);
    }

    /// Listen on `channel` whenever no session is running.
    pub async fn enable_idle_listening(&self, channel: u8) -> Result<()> {
        self.inner.state.write().idle_channel = Some(channel);
        self.inner.transport.set_idle_signal(true).await?;
        metrics::gauge!(metric_defs::IDLE_LISTENING.name, &self.inner.labels.to_labels()[..])
            .set(1.0);
        debug!(device = %self.inner.name, channel, "Idle listening enabled");
        self.assert_idle_listening(true);
        Ok(())
    }

    pub async fn disable_idle_listening(&self) -> Result<()> {
        self.inner.state.write().idle_channel = None;
        if let Some(handle) = self.inner.idle_task.lock().take() {
            handle.abort();
        }
        self.inner.transport.set_idle_signal(false).await?;
        metrics::gauge!(metric_defs::IDLE_LISTENING.name, &self.inner.labels.to_labels()[..])
            .set(0.0);
        debug!(device = %self.inner.name, "Idle listening disabled");
        Ok(())
    }

    /// Make sure the idle listener is running if idle listening is enabled.
    ///
    /// Does nothing while a healthy listener exists, unless `force_restart`
    /// is set, in which case the listener is replaced and the listen command
    /// re-sent.
    pub fn assert_idle_listening(&self, force_restart: bool) {
        let Some(channel) = self.inner.state.read().idle_channel else {
            return;
        };
        if self.inner.transport.state() != ConnectionState::Connected {
            return;
        }

        let mut task = self.inner.idle_task.lock();
        if let Some(handle) = task.as_ref() {
            if !force_restart && !handle.is_finished() {
                return;
            }
            handle.abort();
        }
        *task = Some(tokio::spawn(idle_loop(Arc::clone(&self.inner), channel)));
    }

    pub async fn set_custom_name(&self, name: &str) -> Result<()> {
        self.inner.transport.set_custom_name(name).await?;
        Ok(())
    }

    pub fn custom_name(&self) -> Option<String> {
        self.inner.transport.custom_name()
    }

    pub(crate) fn inner(&self) -> &DeviceInner<T> {
        &self.inner
    }
}

/// Marks a session as queued for the command lock until dropped.
struct Queued<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> Queued<'a> {
    fn new<T: BridgeTransport>(inner: &'a DeviceInner<T>) -> Self {
        inner.waiting.fetch_add(1, Ordering::AcqRel);
        inner.preempt.notify_waiters();
        Queued {
            waiting: &inner.waiting,
        }
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Flags a stale reply unless the command it guards got its answer.
struct InFlight<'a> {
    stale: &'a AtomicBool,
    answered: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.answered {
            self.stale.store(true, Ordering::Release);
        }
    }
}

// ============================================================================
// Command Exchange
// ============================================================================

impl<T: BridgeTransport> DeviceInner<T> {
    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn is_legacy(&self) -> bool {
        self.state
            .read()
            .firmware
            .as_ref()
            .is_some_and(FirmwareVersion::is_legacy)
    }

    /// Send a command and decode its reply with the connected firmware's
    /// conventions. Failure codes become errors.
    pub(crate) async fn command(
        &self,
        command: &BridgeCommand,
        timeout: Duration,
    ) -> Result<BridgeResponse> {
        self.command_with(command, timeout, self.is_legacy()).await
    }

    pub(crate) async fn command_with(
        &self,
        command: &BridgeCommand,
        timeout: Duration,
        legacy: bool,
    ) -> Result<BridgeResponse> {
        let labels = self.labels.with_command(command.name());
        metrics::counter!(metric_defs::BRIDGE_COMMANDS.name, &labels[..]).increment(1);
        let started = Instant::now();

        let result = self.exchange(command, timeout, legacy).await;

        match &result {
            Ok(_) => {
                metrics::histogram!(metric_defs::BRIDGE_COMMAND_LATENCY.name, &labels[..])
                    .record(started.elapsed().as_secs_f64() * 1000.0);
            }
            Err(e) => {
                let mut labels = labels;
                labels.push(("error", error_label(e).to_string()));
                metrics::counter!(metric_defs::BRIDGE_COMMAND_ERRORS.name, &labels[..])
                    .increment(1);
            }
        }
        result
    }

    async fn exchange(
        &self,
        command: &BridgeCommand,
        timeout: Duration,
        legacy: bool,
    ) -> Result<BridgeResponse> {
        if self.transport.state() != ConnectionState::Connected {
            return Err(SessionError::Disconnected);
        }

        let write = encode_write(&command.encode())?;
        if self.stale_reply.load(Ordering::Acquire) {
            self.drain_queued_replies().await?;
        }
        let mut cancel = self.cancel.subscribe();
        trace!(device = %self.name, command = command.name(), "TX {}", hex::encode(&write));
        self.transport.send(&write).await?;

        if !command.expects_response() {
            return Ok(BridgeResponse::Code(ResponseCode::Success));
        }

        let mut in_flight = InFlight {
            stale: &self.stale_reply,
            answered: false,
        };
        // None when the command listens until interrupted.
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(tokio::time::Instant::now()),
                None => Duration::MAX,
            };
            let reply = tokio::select! {
                reply = self.transport.receive(remaining) => reply?,
                _ = cancel.changed() => {
                    debug!(device = %self.name, command = command.name(), "Command interrupted");
                    return Err(BridgeError::CmdInterrupted.into());
                }
            };
            let Some(data) = reply else {
                return Err(SessionError::ResponseTimeout {
                    command: command.name(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            };
            trace!(device = %self.name, command = command.name(), "RX {}", hex::encode(&data));

            if self.stale_reply.swap(false, Ordering::AcqRel)
                && is_stale_reply(command, &data, legacy)
            {
                self.discard_stale_reply(&data);
                continue;
            }
            in_flight.answered = true;

            if data.is_empty() && (command.is_listen() || !legacy) {
                return Err(BridgeError::ZeroData.into());
            }
            let response = BridgeResponse::decode(command, &data, legacy)?;
            response.code().check(command.code())?;
            return Ok(response);
        }
    }

    /// Throw away replies that reached us before the next command was
    /// written. They can only belong to an abandoned command.
    async fn drain_queued_replies(&self) -> Result<()> {
        while let Some(data) = self.transport.receive(Duration::ZERO).await? {
            self.stale_reply.store(false, Ordering::Release);
            self.discard_stale_reply(&data);
        }
        Ok(())
    }

    fn discard_stale_reply(&self, data: &[u8]) {
        debug!(device = %self.name, "Drained reply to an abandoned command: {}", hex::encode(data));
        metrics::counter!(metric_defs::BRIDGE_STALE_REPLIES.name, &self.labels.to_labels()[..])
            .increment(1);
        // A listen that caught a frame just before it was abandoned.
        if data.first() == Some(&RESP_CODE_SUCCESS) {
            if let Some(packet) = RadioPacket::from_rfspy(&data[1..]) {
                self.publish(packet);
            }
        }
    }

    pub(crate) fn publish(&self, packet: RadioPacket) {
        let sequence = self.frame_sequence.fetch_add(1, Ordering::Relaxed);
        let frame = RadioFrame::captured(packet, sequence);
        // No subscribers is fine.
        let _ = self.packets.send(frame);
    }
}

/// True for a reply that answers the abandoned command rather than
/// `command`: the interrupt acknowledgement, or a captured packet where
/// `command` only ever gets a status code back.
fn is_stale_reply(command: &BridgeCommand, data: &[u8], legacy: bool) -> bool {
    if data == [RESP_CODE_CMD_INTERRUPTED] {
        return true;
    }
    !legacy
        && !command.is_listen()
        && command.code() != CMD_GET_VERSION
        && data.len() > 2
        && data[0] == RESP_CODE_SUCCESS
}

fn error_label(error: &SessionError) -> &'static str {
    match error {
        SessionError::Bridge(BridgeError::RxTimeout) => "rx_timeout",
        SessionError::Bridge(BridgeError::CmdInterrupted) => "interrupted",
        SessionError::Bridge(BridgeError::ZeroData) => "zero_data",
        SessionError::Bridge(_) => "bridge",
        SessionError::ResponseTimeout { .. } => "response_timeout",
        SessionError::Disconnected => "disconnected",
        SessionError::Transport(_) => "transport",
        SessionError::Unsupported(_) => "unsupported",
    }
}

// ============================================================================
// Idle Listening
// ============================================================================

async fn idle_loop<T: BridgeTransport>(inner: Arc<DeviceInner<T>>, channel: u8) {
    let command = BridgeCommand::GetPacket {
        channel,
        timeout_ms: inner.config.idle_timeout_ms,
    };
    let timeout = command.response_timeout(inner.config.ble_latency());
    debug!(device = %inner.name, channel, "Idle listener running");

    loop {
        let guard = Arc::clone(&inner.command_lock).lock_owned().await;

        let preempted = inner.preempt.notified();
        tokio::pin!(preempted);
        preempted.as_mut().enable();
        if inner.waiting.load(Ordering::Acquire) > 0 {
            drop(guard);
            tokio::task::yield_now().await;
            continue;
        }

        let outcome = tokio::select! {
            result = inner.command(&command, timeout) => Some(result),
            _ = &mut preempted => None,
        };
        drop(guard);

        match outcome {
            None => trace!(device = %inner.name, "Idle listen preempted"),
            Some(Ok(response)) => {
                if let Some(packet) = response.packet() {
                    debug!(device = %inner.name, rssi = packet.rssi, "Idle listen captured a packet");
                    metrics::counter!(metric_defs::IDLE_PACKETS.name, &inner.labels.to_labels()[..])
                        .increment(1);
                    inner.publish(packet.clone());
                }
                inner.state.write().last_idle = Some(Utc::now());
            }
            Some(Err(SessionError::Bridge(BridgeError::CmdInterrupted))) => {
                trace!(device = %inner.name, "Idle listen cancelled");
            }
            Some(Err(e)) if e.is_retryable() => {
                inner.state.write().last_idle = Some(Utc::now());
            }
            Some(Err(SessionError::Disconnected)) | Some(Err(SessionError::Transport(_))) => {
                debug!(device = %inner.name, "Idle listener stopped: link down");
                return;
            }
            Some(Err(e)) => {
                warn!(device = %inner.name, error = %e, "Idle listen failed");
                tokio::time::sleep(IDLE_RETRY_DELAY).await;
            }
        }
    }
}
