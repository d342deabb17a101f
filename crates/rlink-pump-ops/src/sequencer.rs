//! Pump-level operations on top of a command session.
//!
//! Every radio exchange goes through [`PumpSequencer::send_and_listen`]:
//! one `SendAndListen` per attempt, with the firmware's own retry disabled
//! so the host decides what counts as an answer. Frames that are garbled,
//! come from another device, or are unsolicited broadcasts do not end an
//! attempt; they are handed to packet subscribers and listening continues.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use minimed_history::{HistoryEvent, HistoryPage, PumpModel};
use minimed_packet::{
    decode_frame, encode_frame, BatteryIndicator, ButtonType, HistoryFrameMessage, Message,
    MessageTable, MessageType, PacketType, PumpAddress, PumpMessage,
};
use rlink_bridge_protocol::{BridgeCommand, RadioPacket};
use rlink_metrics::{metric_defs, DeviceLabels};
use rlink_session::{BridgeTransport, CommandSession};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{PumpRegion, PumpSettings, RadioSettings};
use crate::error::{PumpOpsError, Result};
use crate::state::PumpState;

/// Pumps stay awake a little over a minute after their last exchange.
const RESPONDING_AWAKE: Duration = Duration::from_secs(60);

const MIN_WAKE_INTERVAL: Duration = Duration::from_secs(60);

/// Listen window for the wake burst. Older pumps only check the radio every
/// few seconds.
const WAKE_BURST_LISTEN_MS: u32 = 12_000;

const WAKE_BURST_REPEATS: u8 = 255;

/// Stray packets tolerated within one attempt before it counts as unanswered.
const MAX_STRAY_PACKETS: u32 = 8;

/// Pages walked by [`PumpSequencer::get_history_events`].
const HISTORY_PAGE_COUNT: u8 = 16;

/// Pump clocks may run ahead of ours.
const CLOCK_AHEAD_MINUTES: i64 = 60;

const SCAN_TRIES: u32 = 3;

/// Score of a scan try that got no answer, in dBm.
const MISSED_RSSI: i32 = -99;

/// Radio parameters of one send/listen cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenParams {
    /// Extra copies of the packet per send.
    pub repeat_count: u8,
    /// Sends after the first before giving up.
    pub retry_count: u8,
    pub wait_time_ms: u32,
    pub ms_between_packets: u8,
    pub listen_channel: u8,
    pub send_channel: u8,
}

impl ListenParams {
    pub fn with_retries(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_wait(mut self, wait_time_ms: u32) -> Self {
        self.wait_time_ms = wait_time_ms;
        self
    }

    pub fn with_repeats(mut self, repeat_count: u8) -> Self {
        self.repeat_count = repeat_count;
        self
    }
}

impl From<&RadioSettings> for ListenParams {
    fn from(radio: &RadioSettings) -> Self {
        ListenParams {
            repeat_count: 0,
            retry_count: radio.retry_count,
            wait_time_ms: radio.wait_time_ms,
            ms_between_packets: radio.ms_between_packets,
            listen_channel: radio.listen_channel,
            send_channel: radio.send_channel,
        }
    }
}

/// A reply from the pump.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpResponse {
    pub message: Message,
    pub rssi: i16,
}

/// Battery voltage and the pump's own verdict on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryStatus {
    pub volts: f64,
    pub level: BatteryIndicator,
}

/// Reception at one frequency during a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTrial {
    pub frequency_mhz: f64,
    pub tries: u32,
    pub successes: u32,
    /// Mean RSSI with misses counted as -99 dBm.
    pub avg_rssi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub best_frequency_mhz: f64,
    /// One trial per frequency, in sweep order.
    pub trials: Vec<FrequencyTrial>,
}

/// A history event placed on the UTC timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedHistoryEvent {
    pub event: HistoryEvent,
    pub date: DateTime<Utc>,
}

/// What a received frame turned out to be.
enum Heard {
    Reply(Message),
    Refused(minimed_packet::PumpErrorCode),
    /// Our pump, but not the reply that was asked for.
    Unexpected(String),
    /// Anything that does not end the wait.
    Stray,
}

/// Runs pump operations within one command session.
///
/// State changes are written back only after the exchange that justifies
/// them has completed.
pub struct PumpSequencer<'a, T: BridgeTransport> {
    session: CommandSession<T>,
    state: &'a mut PumpState,
    settings: &'a PumpSettings,
    labels: DeviceLabels,
}

impl<'a, T: BridgeTransport> PumpSequencer<'a, T> {
    pub fn new(
        session: CommandSession<T>,
        state: &'a mut PumpState,
        settings: &'a PumpSettings,
    ) -> Self {
        let labels = DeviceLabels::new(session.device().name());
        PumpSequencer {
            session,
            state,
            settings,
            labels,
        }
    }

    pub fn state(&self) -> &PumpState {
        &*self.state
    }

    pub fn session(&mut self) -> &mut CommandSession<T> {
        &mut self.session
    }

    fn address(&self) -> PumpAddress {
        self.state.pump_id
    }

    fn params(&self) -> ListenParams {
        ListenParams::from(&self.settings.radio)
    }

    // ========================================================================
    // Send / Listen
    // ========================================================================

    /// Send `message` until the pump answers with `expected`.
    ///
    /// Makes at most `params.retry_count + 1` sends. Fails with
    /// [`PumpOpsError::NoResponse`] when none is answered,
    /// [`PumpOpsError::PumpRefused`] when the pump returns an error code, and
    /// [`PumpOpsError::UnexpectedResponse`] when it answers with something
    /// else.
    pub async fn send_and_listen(
        &mut self,
        message: &PumpMessage,
        expected: MessageType,
        params: &ListenParams,
    ) -> Result<PumpResponse> {
        let frame = encode_frame(&message.tx_data());
        let attempts = params.retry_count as u32 + 1;
        let labels = self
            .labels
            .with(&[("message", format!("{:?}", message.message_type))]);

        for attempt in 1..=attempts {
            metrics::counter!(metric_defs::PUMP_SEND_ATTEMPTS.name, &labels[..]).increment(1);
            let command = BridgeCommand::SendAndListen {
                send_channel: params.send_channel,
                repeat_count: params.repeat_count,
                delay_ms: params.ms_between_packets,
                listen_channel: params.listen_channel,
                timeout_ms: params.wait_time_ms,
                retry_count: 0,
                data: frame.clone(),
            };
            let mut heard = self.session.listen(&command).await;
            let mut strays = 0;

            loop {
                let packet = match heard {
                    Ok(packet) => packet,
                    Err(e) if e.is_retryable() => {
                        debug!(
                            pump = %self.address(),
                            message = ?message.message_type,
                            attempt,
                            "No answer: {}",
                            e
                        );
                        break;
                    }
                    Err(e) => return Err(e.into()),
                };
                let rssi = packet.rssi;
                match self.interpret(packet, expected) {
                    Heard::Reply(reply) => {
                        metrics::histogram!(
                            metric_defs::PUMP_RSSI.name,
                            &self.labels.to_labels()[..]
                        )
                        .record(rssi as f64);
                        return Ok(PumpResponse {
                            message: reply,
                            rssi,
                        });
                    }
                    Heard::Refused(code) => {
                        return Err(PumpOpsError::PumpRefused {
                            message: message.message_type,
                            code,
                        })
                    }
                    Heard::Unexpected(received) => {
                        return Err(PumpOpsError::UnexpectedResponse {
                            sent: message.message_type,
                            received,
                        })
                    }
                    Heard::Stray => {
                        strays += 1;
                        if strays > MAX_STRAY_PACKETS {
                            break;
                        }
                        heard = self
                            .session
                            .get_packet(params.listen_channel, params.wait_time_ms)
                            .await;
                    }
                }
            }
        }

        metrics::counter!(metric_defs::PUMP_NO_RESPONSE.name, &labels[..]).increment(1);
        Err(PumpOpsError::NoResponse {
            message: message.message_type,
            attempts,
        })
    }

    fn interpret(&self, packet: RadioPacket, expected: MessageType) -> Heard {
        let decoded = match decode_frame(&packet.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(pump = %self.address(), "Dropped frame {}: {}", hex::encode(&packet.data), e);
                return Heard::Stray;
            }
        };
        if decoded.packet_type() != PacketType::Carelink || decoded.address() != self.address() {
            debug!(
                pump = %self.address(),
                from = %decoded.address(),
                packet_type = ?decoded.packet_type(),
                "Crosstalk while waiting for {:?}",
                expected
            );
            metrics::counter!(metric_defs::PUMP_CROSSTALK.name, &self.labels.to_labels()[..])
                .increment(1);
            self.session.forward_packet(packet);
            return Heard::Stray;
        }

        let table = self.state.message_table();
        match table.lookup(decoded.message_type()) {
            Some(MessageType::ErrorResponse) => match Message::from_packet_with(&decoded, table) {
                Some(Message::PumpError(code)) => Heard::Refused(code),
                _ => Heard::Unexpected("empty error response".to_string()),
            },
            Some(found) if found == expected => match Message::from_packet_with(&decoded, table) {
                Some(message) => Heard::Reply(message),
                None => Heard::Unexpected(format!(
                    "malformed {:?} {}",
                    found,
                    hex::encode(decoded.payload())
                )),
            },
            Some(found) => Heard::Unexpected(format!("{:?}", found)),
            None => Heard::Unexpected(describe_code(decoded.message_type(), table)),
        }
    }

    // ========================================================================
    // Wake-up
    // ========================================================================

    /// Make sure the pump's radio is on for `duration`.
    ///
    /// Does nothing while the pump is known to be awake. A pump that still
    /// answers a model query is given one more minute; otherwise a wake
    /// burst is followed by a power-on for `duration`.
    pub async fn wakeup(&mut self, duration: Duration) -> Result<()> {
        if self.state.is_awake() {
            return Ok(());
        }
        if self.pump_responding().await? {
            debug!(pump = %self.address(), "Pump already awake; extending timer");
            self.state.mark_awake_for(RESPONDING_AWAKE);
            return Ok(());
        }

        metrics::counter!(metric_defs::PUMP_WAKEUPS.name, &self.labels.to_labels()[..])
            .increment(1);
        self.send_wake_burst().await?;

        let minutes = duration.as_secs().div_ceil(60).clamp(1, u8::MAX as u64) as u8;
        let power_on = PumpMessage::power_on(self.address(), minutes);
        let params = self.params();
        self.send_and_listen(&power_on, MessageType::PumpAck, &params)
            .await?;

        info!(pump = %self.address(), minutes, "Pump powered on");
        self.state.mark_awake_for(duration);
        Ok(())
    }

    async fn ensure_awake(&mut self) -> Result<()> {
        self.wakeup(self.settings.radio.wake_duration()).await
    }

    /// Whether the pump answers a model query right now.
    pub async fn pump_responding(&mut self) -> Result<bool> {
        let query = PumpMessage::get_pump_model(self.address());
        let params = self.params().with_retries(1);
        match self
            .send_and_listen(&query, MessageType::GetPumpModel, &params)
            .await
        {
            Ok(response) => {
                if let Message::PumpModel(reply) = response.message {
                    self.remember_model(&reply.model);
                }
                Ok(true)
            }
            Err(PumpOpsError::Session(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    /// Short power-on messages repeated back to back, to catch the pump's
    /// next radio check.
    async fn send_wake_burst(&mut self) -> Result<()> {
        if self.state.woke_within(MIN_WAKE_INTERVAL) {
            debug!(pump = %self.address(), "Skipping wake burst; one was sent recently");
            return Ok(());
        }

        let power_on = PumpMessage::wake(self.address());
        let burst = self
            .params()
            .with_repeats(WAKE_BURST_REPEATS)
            .with_retries(0);

        if !self.state.model.is_some_and(PumpModel::has_mysentry) {
            match self
                .send_and_listen(&power_on, MessageType::PumpAck, &burst.with_wait(1))
                .await
            {
                Ok(_) => {}
                Err(PumpOpsError::Session(e)) => return Err(e.into()),
                Err(e) => debug!(pump = %self.address(), "Preliminary burst: {}", e),
            }
        }

        let result = self
            .send_and_listen(
                &power_on,
                MessageType::PumpAck,
                &burst.with_wait(WAKE_BURST_LISTEN_MS),
            )
            .await;
        self.state.last_wake_attempt = Some(Instant::now());
        result.map(|_| ())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Wake the pump, announce `message` with its short form, then send it.
    pub async fn run_command_with_arguments(
        &mut self,
        message: &PumpMessage,
        expected: MessageType,
    ) -> Result<PumpResponse> {
        self.ensure_awake().await?;
        let params = self.params();
        self.send_and_listen(&message.to_short(), MessageType::PumpAck, &params)
            .await?;
        self.send_and_listen(message, expected, &params).await
    }

    /// Wake the pump and send a short query.
    async fn query(&mut self, message: PumpMessage) -> Result<Message> {
        self.ensure_awake().await?;
        let params = self.params();
        let response = self
            .send_and_listen(&message, message.message_type, &params)
            .await?;
        Ok(response.message)
    }

    /// Model number as the pump reports it, e.g. `"551"`.
    pub async fn get_pump_model(&mut self) -> Result<String> {
        match self.query(PumpMessage::get_pump_model(self.address())).await? {
            Message::PumpModel(reply) => {
                self.remember_model(&reply.model);
                Ok(reply.model)
            }
            other => Err(unexpected(MessageType::GetPumpModel, &other)),
        }
    }

    /// Known model, asking the pump if it has not been read yet.
    pub async fn pump_model(&mut self) -> Result<PumpModel> {
        if let Some(model) = self.state.model {
            return Ok(model);
        }
        let number = self.get_pump_model().await?;
        self.state
            .model
            .ok_or(PumpOpsError::UnknownPumpModel(number))
    }

    fn remember_model(&mut self, number: &str) {
        if self.state.model.is_some() {
            return;
        }
        match number.parse::<PumpModel>() {
            Ok(model) => {
                debug!(pump = %self.address(), %model, "Pump model identified");
                self.state.model = Some(model);
            }
            Err(_) => warn!(pump = %self.address(), "Pump reported unknown model {:?}", number),
        }
    }

    pub async fn get_battery_voltage(&mut self) -> Result<BatteryStatus> {
        match self.query(PumpMessage::get_battery(self.address())).await? {
            Message::Battery(reply) => Ok(BatteryStatus {
                volts: reply.volts(),
                level: reply.indicator(),
            }),
            other => Err(unexpected(MessageType::GetBattery, &other)),
        }
    }

    pub async fn press_button(&mut self, button: ButtonType) -> Result<()> {
        let message = PumpMessage::button_press(self.address(), button);
        self.run_command_with_arguments(&message, MessageType::PumpAck)
            .await?;
        Ok(())
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Fetch one history page.
    ///
    /// The pump sends the page as numbered 64-byte frames starting at 1,
    /// each acknowledged before the next; the last ack gets no reply. The
    /// page is only returned when complete and its CRC checks out.
    pub async fn get_history_page(&mut self, page: u8) -> Result<HistoryPage> {
        let model = self.pump_model().await?;
        let request = PumpMessage::get_history_page(self.address(), page);
        let first = self
            .run_command_with_arguments(&request, MessageType::GetHistoryPage)
            .await?;

        let ack = PumpMessage::pump_ack(self.address());
        let params = self.params();
        let mut data = Vec::with_capacity(HistoryPage::SIZE);
        let mut expected_frame = 1;
        let mut frame = history_frame(first.message)?;

        while frame.frame_number == expected_frame {
            data.extend_from_slice(&frame.data);
            expected_frame += 1;
            if frame.last_frame || data.len() >= HistoryPage::SIZE {
                let final_ack = encode_frame(&ack.tx_data());
                if let Err(e) = self
                    .session
                    .send_packet(params.send_channel, 0, 0, final_ack)
                    .await
                {
                    warn!(pump = %self.address(), page, "Final history ack failed: {}", e);
                }
                break;
            }
            let next = self
                .send_and_listen(&ack, MessageType::GetHistoryPage, &params)
                .await?;
            frame = history_frame(next.message)?;
        }

        if data.len() != HistoryPage::SIZE {
            return Err(PumpOpsError::IncompleteHistoryPage {
                page,
                len: data.len(),
            });
        }
        let history = HistoryPage::new(data, model);
        history.crc_check()?;
        debug!(pump = %self.address(), page, "History page fetched");
        metrics::counter!(metric_defs::PUMP_HISTORY_PAGES.name, &self.labels.to_labels()[..])
            .increment(1);
        Ok(history)
    }

    /// Timestamped events since `since`, oldest first.
    ///
    /// Pages are read newest first and walked backwards until an event older
    /// than `since` turns up, less an allowance for boluses the pump logs
    /// out of order. Records already seen are skipped.
    pub async fn get_history_events(
        &mut self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TimestampedHistoryEvent>> {
        self.ensure_awake().await?;
        let model = self.pump_model().await?;
        let allowance = if model.appends_square_wave_to_history_on_start_of_delivery() {
            chrono::Duration::minutes(10)
        } else {
            chrono::Duration::hours(9)
        };
        let offset = self
            .settings
            .time_zone()
            .or_else(|| FixedOffset::east_opt(0));

        let mut cursor = Utc::now() + chrono::Duration::minutes(CLOCK_AHEAD_MINUTES);
        let mut seen = HashSet::new();
        let mut events = Vec::new();

        'pages: for page_number in 0..HISTORY_PAGE_COUNT {
            let page = self.get_history_page(page_number).await?;
            let decoded: Vec<HistoryEvent> = page.decode().collect();
            for event in decoded.into_iter().rev() {
                let Some(stamp) = event.timestamp() else {
                    continue;
                };
                if !seen.insert(event.record().bytes().to_vec()) {
                    continue;
                }
                let Some(date) = offset.and_then(|o| stamp.with_offset(o)) else {
                    continue;
                };
                let date = date.with_timezone(&Utc);
                if date < since - allowance {
                    debug!(pump = %self.address(), %date, %since, "Reached events before start");
                    break 'pages;
                }
                if date > cursor + allowance {
                    debug!(pump = %self.address(), %date, "Event out of order; ending history walk");
                    break 'pages;
                }
                if date >= since {
                    cursor = date;
                }
                events.push(TimestampedHistoryEvent { event, date });
            }
        }

        events.reverse();
        self.state.last_history_dump = Some(Utc::now());
        Ok(events)
    }

    // ========================================================================
    // Radio
    // ========================================================================

    pub async fn set_base_frequency(&mut self, mhz: f64) -> Result<()> {
        self.session.set_base_frequency(mhz).await?;
        Ok(())
    }

    /// Program the modem for the region's channel plan.
    pub async fn configure_radio(&mut self, region: PumpRegion) -> Result<()> {
        debug!(pump = %self.address(), ?region, "Configuring radio");
        self.session
            .update_registers(&region.radio_settings())
            .await?;
        Ok(())
    }

    /// Find the frequency the pump is heard best on.
    ///
    /// Each frequency gets three model queries; frequencies rank by mean
    /// RSSI with misses at -99 dBm, ties going to the earlier one. The winner
    /// is programmed. If nothing answered, the middle frequency is restored
    /// and the scan fails with [`PumpOpsError::PumpNotFound`].
    pub async fn scan_for_pump(&mut self, frequencies: &[f64]) -> Result<ScanResult> {
        let Some(&middle) = frequencies.get(frequencies.len() / 2) else {
            return Err(PumpOpsError::PumpNotFound);
        };

        // The pump may hear us even when we cannot hear it.
        let warm_up = match self.set_base_frequency(middle).await {
            Ok(()) => self.ensure_awake().await,
            Err(e) => Err(e),
        };
        if let Err(e) = warm_up {
            debug!(pump = %self.address(), "Scanning without confirmed wake-up: {}", e);
        }

        let query = PumpMessage::get_pump_model(self.address());
        let params = self.params().with_retries(0);
        let mut trials = Vec::with_capacity(frequencies.len());

        for &mhz in frequencies {
            self.set_base_frequency(mhz).await?;
            let mut successes = 0;
            let mut sum_rssi = 0i32;
            for _ in 0..SCAN_TRIES {
                match self
                    .send_and_listen(&query, MessageType::GetPumpModel, &params)
                    .await
                {
                    Ok(response) => {
                        successes += 1;
                        sum_rssi += response.rssi as i32;
                    }
                    Err(PumpOpsError::Session(e)) => return Err(e.into()),
                    Err(_) => {}
                }
            }
            sum_rssi += MISSED_RSSI * (SCAN_TRIES - successes) as i32;
            let trial = FrequencyTrial {
                frequency_mhz: mhz,
                tries: SCAN_TRIES,
                successes,
                avg_rssi: sum_rssi as f64 / SCAN_TRIES as f64,
            };
            debug!(pump = %self.address(), ?trial, "Frequency trial");
            trials.push(trial);
        }

        let mut ranked: Vec<&FrequencyTrial> = trials.iter().collect();
        ranked.sort_by(|a, b| b.avg_rssi.total_cmp(&a.avg_rssi));
        let best = ranked
            .first()
            .filter(|trial| trial.successes > 0)
            .map(|trial| trial.frequency_mhz);

        match best {
            Some(best_frequency_mhz) => {
                self.set_base_frequency(best_frequency_mhz).await?;
                info!(pump = %self.address(), mhz = best_frequency_mhz, "Tuned to pump");
                self.state.tuned_frequency_mhz = Some(best_frequency_mhz);
                Ok(ScanResult {
                    best_frequency_mhz,
                    trials,
                })
            }
            None => {
                self.set_base_frequency(middle).await?;
                warn!(pump = %self.address(), "No pump responses during scan");
                Err(PumpOpsError::PumpNotFound)
            }
        }
    }

    /// Configure the radio for `region` and scan its band.
    pub async fn tune_pump(&mut self, region: PumpRegion) -> Result<ScanResult> {
        self.configure_radio(region).await?;
        self.scan_for_pump(&region.scan_frequencies()).await
    }
}

fn history_frame(message: Message) -> Result<HistoryFrameMessage> {
    match message {
        Message::HistoryFrame(frame) => Ok(frame),
        other => Err(unexpected(MessageType::GetHistoryPage, &other)),
    }
}

fn unexpected(sent: MessageType, received: &Message) -> PumpOpsError {
    PumpOpsError::UnexpectedResponse {
        sent,
        received: received.name().to_string(),
    }
}

fn describe_code(code: u8, table: MessageTable) -> String {
    match table.lookup(code) {
        Some(message_type) => format!("{:?}", message_type),
        None => format!("message type 0x{:02x}", code),
    }
}
