//! Typed pump messages.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

use crate::{
    DecodeError, Field, FieldMap, FieldMessage, MessageTable, MessageType, Packet, PacketType,
    PumpAddress, HEADER_LEN,
};

/// Bit offset of the first body bit for messages with the standard header.
const BODY: usize = HEADER_LEN * 8;

// ============================================================================
// Layouts
// ============================================================================

const ALERT_FIELDS: [Field; 8] = [
    Field::new("sequence", 1, 7),
    Field::new("alert_type", 8, 8),
    Field::new("hour", 16, 8),
    Field::new("minute", 24, 8),
    Field::new("second", 32, 8),
    Field::new("year", 40, 8),
    Field::new("month", 48, 8),
    Field::new("day", 56, 8),
];
/// MySentry alert: sequence, alert code, pump time.
pub static ALERT_MAP: FieldMap<'static> = FieldMap::new(BODY, HEADER_LEN + 8, &ALERT_FIELDS);

const ALERT_CLEARED_FIELDS: [Field; 2] =
    [Field::new("sequence", 1, 7), Field::new("alert_type", 8, 8)];
/// MySentry alert-cleared notice.
pub static ALERT_CLEARED_MAP: FieldMap<'static> =
    FieldMap::new(BODY, HEADER_LEN + 2, &ALERT_CLEARED_FIELDS);

const LINK_FIELDS: [Field; 2] = [
    Field::new("sequence", 1, 7),
    Field::new("device_address", 8, 24),
];
/// Device link and find device share one layout.
pub static LINK_MAP: FieldMap<'static> = FieldMap::new(BODY, HEADER_LEN + 4, &LINK_FIELDS);

const PUMP_STATUS_FIELDS: [Field; 25] = [
    Field::new("sequence", 0, 8),
    Field::new("trend", 12, 3),
    Field::new("pump_hour", 16, 8),
    Field::new("pump_minute", 24, 8),
    Field::new("pump_second", 32, 8),
    Field::new("pump_year", 40, 8),
    Field::new("pump_month", 48, 8),
    Field::new("pump_day", 56, 8),
    Field::new("glucose_high", 72, 8),
    Field::new("previous_glucose_high", 80, 8),
    Field::new("insulin_remaining", 96, 16),
    Field::new("battery", 112, 8),
    Field::new("active_insulin", 120, 16),
    Field::new("sensor_age", 144, 8),
    Field::new("sensor_remaining", 152, 8),
    Field::new("next_cal_hour", 160, 8),
    Field::new("next_cal_minute", 168, 8),
    Field::new("previous_glucose_low", 198, 1),
    Field::new("glucose_low", 199, 1),
    Field::new("glucose_hour", 224, 8),
    Field::new("glucose_minute", 232, 8),
    Field::new("glucose_second", 240, 8),
    Field::new("glucose_year", 248, 8),
    Field::new("glucose_month", 256, 8),
    Field::new("glucose_day", 264, 8),
];
/// MySentry pump status broadcast (36-byte body).
pub static PUMP_STATUS_MAP: FieldMap<'static> =
    FieldMap::new(BODY, HEADER_LEN + 36, &PUMP_STATUS_FIELDS);

// Meter packets carry flags and glucose where other packets carry the
// message type, so their base offset sits right after the address.
const METER_FIELDS: [Field; 2] = [Field::new("flags", 5, 2), Field::new("glucose", 7, 9)];
/// Glucose meter reading.
pub static METER_MAP: FieldMap<'static> = FieldMap::new(32, 6, &METER_FIELDS);

const BATTERY_FIELDS: [Field; 2] = [
    Field::new("indicator", 8, 8),
    Field::new("voltage", 16, 16),
];
/// Carelink battery response.
pub static BATTERY_MAP: FieldMap<'static> = FieldMap::new(BODY, HEADER_LEN + 4, &BATTERY_FIELDS);

fn mysentry_time(msg: &FieldMessage, prefix: &str) -> Option<NaiveDateTime> {
    let get = |name: &str| msg.get_bits(&format!("{}{}", prefix, name)).ok();
    NaiveDate::from_ymd_opt(2000 + get("year")? as i32, get("month")?, get("day")?)?
        .and_hms_opt(get("hour")?, get("minute")?, get("second")?)
}

fn fields_json(msg: &FieldMessage) -> Map<String, Value> {
    msg.values()
        .map(|(name, value)| (name.to_string(), Value::from(value)))
        .collect()
}

// ============================================================================
// Value Types
// ============================================================================

/// Alert codes reported by MySentry pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    NoDelivery,
    MaxHourlyBolus,
    LowReservoir,
    HighGlucose,
    LowGlucose,
    MeterBgNow,
    MeterBgSoon,
    CalibrationError,
    SensorEnd,
    WeakSignal,
    LostSensor,
    HighPredicted,
    LowPredicted,
    /// A code this table does not name.
    Unknown(u8),
}

impl From<u8> for AlertType {
    fn from(code: u8) -> Self {
        match code {
            0x04 => AlertType::NoDelivery,
            0x33 => AlertType::MaxHourlyBolus,
            0x52 => AlertType::LowReservoir,
            0x65 => AlertType::HighGlucose,
            0x66 => AlertType::LowGlucose,
            0x68 => AlertType::MeterBgNow,
            0x69 => AlertType::MeterBgSoon,
            0x6a => AlertType::CalibrationError,
            0x6b => AlertType::SensorEnd,
            0x70 => AlertType::WeakSignal,
            0x71 => AlertType::LostSensor,
            0x72 => AlertType::HighPredicted,
            0x73 => AlertType::LowPredicted,
            other => AlertType::Unknown(other),
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::NoDelivery => f.write_str("No Delivery"),
            AlertType::MaxHourlyBolus => f.write_str("Max Hourly Bolus"),
            AlertType::LowReservoir => f.write_str("Low Reservoir"),
            AlertType::HighGlucose => f.write_str("High Glucose"),
            AlertType::LowGlucose => f.write_str("Low Glucose"),
            AlertType::MeterBgNow => f.write_str("Meter BG Now"),
            AlertType::MeterBgSoon => f.write_str("Meter BG Soon"),
            AlertType::CalibrationError => f.write_str("Calibration Error"),
            AlertType::SensorEnd => f.write_str("Sensor End"),
            AlertType::WeakSignal => f.write_str("Weak Signal"),
            AlertType::LostSensor => f.write_str("Lost Sensor"),
            AlertType::HighPredicted => f.write_str("High Predicted"),
            AlertType::LowPredicted => f.write_str("Low Predicted"),
            AlertType::Unknown(code) => write!(f, "Unknown Alert 0x{:02x}", code),
        }
    }
}

/// Sensor glucose trend arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlucoseTrend {
    None,
    Up,
    DoubleUp,
    Down,
    DoubleDown,
    Unknown(u8),
}

impl From<u32> for GlucoseTrend {
    fn from(bits: u32) -> Self {
        match bits {
            0 => GlucoseTrend::None,
            1 => GlucoseTrend::Up,
            2 => GlucoseTrend::DoubleUp,
            3 => GlucoseTrend::Down,
            4 => GlucoseTrend::DoubleDown,
            other => GlucoseTrend::Unknown(other as u8),
        }
    }
}

/// Sensor state, carried as special glucose values below 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    Missing,
    MeterBgNow,
    WeakSignal,
    Warmup,
    Lost,
    HighBg,
    Ok,
    Unknown,
}

impl SensorStatus {
    fn from_glucose(glucose: u32) -> Self {
        match glucose {
            0 => SensorStatus::Missing,
            2 => SensorStatus::MeterBgNow,
            4 => SensorStatus::WeakSignal,
            6 => SensorStatus::Warmup,
            10 => SensorStatus::Lost,
            14 => SensorStatus::HighBg,
            g if g >= 20 => SensorStatus::Ok,
            _ => SensorStatus::Unknown,
        }
    }
}

/// Battery level reported alongside the voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BatteryIndicator {
    Normal,
    Low,
}

impl std::fmt::Display for BatteryIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryIndicator::Normal => f.write_str("Normal"),
            BatteryIndicator::Low => f.write_str("Low"),
        }
    }
}

/// Error codes a pump returns instead of executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpErrorCode {
    /// Pump suspended, prime unfinished, or temp basal type mismatch.
    CommandRefused,
    MaxSettingExceeded,
    BolusInProgress,
    Unknown(u8),
}

impl From<u8> for PumpErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0x08 => PumpErrorCode::CommandRefused,
            0x09 => PumpErrorCode::MaxSettingExceeded,
            0x0c => PumpErrorCode::BolusInProgress,
            other => PumpErrorCode::Unknown(other),
        }
    }
}

// ============================================================================
// MySentry Messages
// ============================================================================

/// Alert raised on the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage(FieldMessage);

impl AlertMessage {
    pub fn sequence(&self) -> u8 {
        self.0.value("sequence") as u8
    }

    pub fn alert_type(&self) -> AlertType {
        AlertType::from(self.0.value("alert_type") as u8)
    }

    /// Pump-local time of the alert.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        mysentry_time(&self.0, "")
    }

    pub fn fields(&self) -> &FieldMessage {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut FieldMessage {
        &mut self.0
    }
}

/// Alert acknowledged on the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertClearedMessage(FieldMessage);

impl AlertClearedMessage {
    pub fn alert_type(&self) -> AlertType {
        AlertType::from(self.0.value("alert_type") as u8)
    }

    pub fn fields(&self) -> &FieldMessage {
        &self.0
    }
}

/// Periodic pump status broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpStatusMessage(FieldMessage);

impl PumpStatusMessage {
    /// Sensor glucose in mg/dL (9 bits split across the body).
    pub fn glucose(&self) -> u32 {
        (self.0.value("glucose_high") << 1) | self.0.value("glucose_low")
    }

    pub fn previous_glucose(&self) -> u32 {
        (self.0.value("previous_glucose_high") << 1) | self.0.value("previous_glucose_low")
    }

    pub fn trend(&self) -> GlucoseTrend {
        GlucoseTrend::from(self.0.value("trend"))
    }

    pub fn sensor_status(&self) -> SensorStatus {
        SensorStatus::from_glucose(self.glucose())
    }

    /// Insulin on board, units.
    pub fn active_insulin(&self) -> f64 {
        self.0.value("active_insulin") as f64 / 40.0
    }

    /// Reservoir contents, units.
    pub fn insulin_remaining(&self) -> f64 {
        self.0.value("insulin_remaining") as f64 / 10.0
    }

    /// Battery level, percent.
    pub fn battery_percent(&self) -> u32 {
        self.0.value("battery") * 25
    }

    /// Hours since sensor insertion.
    pub fn sensor_age(&self) -> u32 {
        self.0.value("sensor_age")
    }

    /// Hours of sensor life left.
    pub fn sensor_remaining(&self) -> u32 {
        self.0.value("sensor_remaining")
    }

    /// Next calibration as (hour, minute).
    pub fn next_calibration(&self) -> (u32, u32) {
        (self.0.value("next_cal_hour"), self.0.value("next_cal_minute"))
    }

    pub fn pump_time(&self) -> Option<NaiveDateTime> {
        mysentry_time(&self.0, "pump_")
    }

    pub fn measurement_time(&self) -> Option<NaiveDateTime> {
        mysentry_time(&self.0, "glucose_")
    }

    pub fn fields(&self) -> &FieldMessage {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut FieldMessage {
        &mut self.0
    }
}

/// Link announcement from a paired device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLinkMessage(FieldMessage);

/// Search for a paired device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindDeviceMessage(FieldMessage);

macro_rules! link_accessors {
    ($ty:ident) => {
        impl $ty {
            pub fn sequence(&self) -> u8 {
                self.0.value("sequence") as u8
            }

            pub fn device_address(&self) -> PumpAddress {
                let raw = self.0.value("device_address").to_be_bytes();
                PumpAddress([raw[1], raw[2], raw[3]])
            }

            pub fn fields(&self) -> &FieldMessage {
                &self.0
            }
        }
    };
}

link_accessors!(DeviceLinkMessage);
link_accessors!(FindDeviceMessage);

/// Linked glucose meter reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterMessage(FieldMessage);

impl MeterMessage {
    pub fn glucose(&self) -> u32 {
        self.0.value("glucose")
    }

    /// Set when the meter asks for an acknowledgement.
    pub fn ack_flag(&self) -> bool {
        self.0.value("flags") == 0b11
    }
}

// ============================================================================
// Carelink Responses
// ============================================================================

/// Pump model number as reported by the pump, e.g. `"551"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpModelMessage {
    pub model: String,
}

impl PumpModelMessage {
    fn parse(body: &[u8]) -> Option<Self> {
        let len = *body.get(1)? as usize;
        let raw = body.get(2..2 + len)?;
        let model = std::str::from_utf8(raw).ok()?.to_string();
        Some(PumpModelMessage { model })
    }
}

/// Battery response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryMessage(FieldMessage);

impl BatteryMessage {
    pub fn indicator(&self) -> BatteryIndicator {
        if self.0.value("indicator") > 0 {
            BatteryIndicator::Low
        } else {
            BatteryIndicator::Normal
        }
    }

    pub fn volts(&self) -> f64 {
        self.0.value("voltage") as f64 / 100.0
    }
}

/// Size of the data carried by one history frame.
pub const HISTORY_FRAME_DATA_LEN: usize = 64;

/// One 64-byte slice of a history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFrameMessage {
    pub frame_number: u8,
    pub last_frame: bool,
    pub data: Vec<u8>,
}

impl HistoryFrameMessage {
    fn parse(body: &[u8]) -> Option<Self> {
        let head = *body.first()?;
        let data = body.get(1..1 + HISTORY_FRAME_DATA_LEN)?.to_vec();
        Some(HistoryFrameMessage {
            frame_number: head & 0x7f,
            last_frame: head & 0x80 != 0,
            data,
        })
    }
}

// ============================================================================
// Message
// ============================================================================

/// A message carried by a valid packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Alert(AlertMessage),
    AlertCleared(AlertClearedMessage),
    PumpStatus(PumpStatusMessage),
    DeviceLink(DeviceLinkMessage),
    FindDevice(FindDeviceMessage),
    Meter(MeterMessage),
    PumpAck,
    PumpError(PumpErrorCode),
    PumpModel(PumpModelMessage),
    Battery(BatteryMessage),
    HistoryFrame(HistoryFrameMessage),
}

impl Message {
    /// Interpret a packet with the MySentry-era code table.
    ///
    /// Returns `None` for message types the host does not handle and for
    /// bodies too short for their layout.
    pub fn from_packet(packet: &Packet) -> Option<Message> {
        Self::from_packet_with(packet, MessageTable::MySentry)
    }

    /// Interpret a packet with an explicit code table.
    pub fn from_packet_with(packet: &Packet, table: MessageTable) -> Option<Message> {
        let bytes = packet.to_bytes();
        let wrap = |map: &'static FieldMap<'static>| FieldMessage::new(map, bytes.clone()).ok();

        match packet.packet_type() {
            PacketType::Meter => wrap(&METER_MAP).map(|m| Message::Meter(MeterMessage(m))),
            PacketType::Sensor => None,
            PacketType::Sentry => match table.lookup(packet.message_type())? {
                MessageType::Alert => wrap(&ALERT_MAP).map(|m| Message::Alert(AlertMessage(m))),
                MessageType::AlertCleared => wrap(&ALERT_CLEARED_MAP)
                    .map(|m| Message::AlertCleared(AlertClearedMessage(m))),
                MessageType::PumpStatus => {
                    wrap(&PUMP_STATUS_MAP).map(|m| Message::PumpStatus(PumpStatusMessage(m)))
                }
                MessageType::DeviceLink => {
                    wrap(&LINK_MAP).map(|m| Message::DeviceLink(DeviceLinkMessage(m)))
                }
                MessageType::FindDevice => {
                    wrap(&LINK_MAP).map(|m| Message::FindDevice(FindDeviceMessage(m)))
                }
                _ => None,
            },
            PacketType::Carelink => {
                let body = packet.payload();
                match table.lookup(packet.message_type())? {
                    MessageType::PumpAck => Some(Message::PumpAck),
                    MessageType::ErrorResponse => {
                        body.first().map(|&c| Message::PumpError(PumpErrorCode::from(c)))
                    }
                    MessageType::GetPumpModel => PumpModelMessage::parse(body).map(Message::PumpModel),
                    MessageType::GetBattery => {
                        wrap(&BATTERY_MAP).map(|m| Message::Battery(BatteryMessage(m)))
                    }
                    MessageType::GetHistoryPage => {
                        HistoryFrameMessage::parse(body).map(Message::HistoryFrame)
                    }
                    _ => None,
                }
            }
        }
    }

    /// Build a message from raw field values, e.g. for simulating a pump.
    pub fn with_fields(
        map: &'static FieldMap<'static>,
        header: &[u8],
        values: &[(&str, u32)],
    ) -> Result<FieldMessage, DecodeError> {
        let mut msg = FieldMessage::zeroed(map);
        let len = header.len().min(msg.bytes().len());
        msg.bytes_mut()[..len].copy_from_slice(&header[..len]);
        for (name, value) in values {
            msg.set_bits(name, *value)?;
        }
        Ok(msg)
    }

    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Alert(_) => "Alert",
            Message::AlertCleared(_) => "AlertCleared",
            Message::PumpStatus(_) => "PumpStatus",
            Message::DeviceLink(_) => "DeviceLink",
            Message::FindDevice(_) => "FindDevice",
            Message::Meter(_) => "Meter",
            Message::PumpAck => "PumpAck",
            Message::PumpError(_) => "PumpError",
            Message::PumpModel(_) => "PumpModel",
            Message::Battery(_) => "Battery",
            Message::HistoryFrame(_) => "HistoryFrame",
        }
    }

    /// JSON record with `_type` and the decoded fields.
    pub fn to_json(&self) -> Value {
        let mut map = match self {
            Message::Alert(m) => {
                let mut map = fields_json(&m.0);
                map.insert("alert".into(), json!(m.alert_type().to_string()));
                map.insert("timestamp".into(), json!(m.timestamp().map(|t| t.to_string())));
                map
            }
            Message::AlertCleared(m) => fields_json(&m.0),
            Message::PumpStatus(m) => {
                let mut map = fields_json(&m.0);
                map.insert("glucose".into(), json!(m.glucose()));
                map.insert("previous_glucose".into(), json!(m.previous_glucose()));
                map.insert("trend".into(), json!(format!("{:?}", m.trend())));
                map.insert("sensor_status".into(), json!(format!("{:?}", m.sensor_status())));
                map.insert("active_insulin".into(), json!(m.active_insulin()));
                map.insert("insulin_remaining".into(), json!(m.insulin_remaining()));
                map.insert("battery_percent".into(), json!(m.battery_percent()));
                map
            }
            Message::DeviceLink(m) => {
                let mut map = fields_json(&m.0);
                map.insert("device_address".into(), json!(m.device_address().to_string()));
                map
            }
            Message::FindDevice(m) => {
                let mut map = fields_json(&m.0);
                map.insert("device_address".into(), json!(m.device_address().to_string()));
                map
            }
            Message::Meter(m) => {
                let mut map = Map::new();
                map.insert("glucose".into(), json!(m.glucose()));
                map.insert("ack_flag".into(), json!(m.ack_flag()));
                map
            }
            Message::PumpAck => Map::new(),
            Message::PumpError(code) => {
                let mut map = Map::new();
                map.insert("error".into(), json!(format!("{:?}", code)));
                map
            }
            Message::PumpModel(m) => {
                let mut map = Map::new();
                map.insert("model".into(), json!(m.model));
                map
            }
            Message::Battery(m) => {
                let mut map = Map::new();
                map.insert("volts".into(), json!(m.volts()));
                map.insert("status".into(), json!(m.indicator().to_string()));
                map
            }
            Message::HistoryFrame(m) => {
                let mut map = Map::new();
                map.insert("frame_number".into(), json!(m.frame_number));
                map.insert("last_frame".into(), json!(m.last_frame));
                map.insert("data".into(), json!(hex::encode(&m.data)));
                map
            }
        };
        map.insert("_type".into(), json!(self.name()));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_frame, encode_frame};

    fn packet(hex_str: &str) -> Packet {
        let data = hex::decode(hex_str).unwrap();
        Packet::parse(&data).expect("should parse")
    }

    #[test]
    fn test_device_link() {
        let msg = Message::from_packet(&packet("a23505350a93ce8aa000"));
        let Some(Message::DeviceLink(link)) = msg else {
            panic!("Expected DeviceLink, got {:?}", msg);
        };
        assert_eq!(link.sequence(), 19);
        assert_eq!(link.device_address().to_string(), "ce8aa0");
    }

    #[test]
    fn test_find_device() {
        let msg = Message::from_packet(&packet("a235053509cf99999900"));
        let Some(Message::FindDevice(find)) = msg else {
            panic!("Expected FindDevice, got {:?}", msg);
        };
        assert_eq!(find.sequence(), 79);
        assert_eq!(find.device_address().to_string(), "999999");
    }

    #[test]
    fn test_paradigm_table_does_not_decode_device_link() {
        let p = packet("a23505350a93ce8aa000");
        assert_eq!(Message::from_packet_with(&p, MessageTable::Paradigm), None);
    }

    #[test]
    fn test_pump_status() {
        let frame = hex::decode("ab2959595965574ab2d31c565748ea54e55a54b5558cd8cd55557194b56357156535ac5659956a55c55555556355555568bc5657255554e55a54b5555555b1").unwrap();
        let packet = decode_frame(&frame).expect("should decode");
        let Some(Message::PumpStatus(status)) = Message::from_packet(&packet) else {
            panic!("Expected PumpStatus");
        };

        assert_eq!(status.glucose(), 123);
        assert_eq!(status.previous_glucose(), 123);
        assert_eq!(status.trend(), GlucoseTrend::None);
        assert_eq!(status.sensor_status(), SensorStatus::Ok);
        assert!((status.insulin_remaining() - 34.7).abs() < 1e-9);
        assert!((status.active_insulin() - 6.525).abs() < 1e-9);
        assert_eq!(status.battery_percent(), 75);
        assert_eq!(status.sensor_age(), 23);
        assert_eq!(status.next_calibration(), (10, 15));
        assert_eq!(
            status.pump_time().unwrap().to_string(),
            "2014-08-11 23:04:58"
        );
        assert_eq!(
            status.measurement_time().unwrap().to_string(),
            "2014-08-11 23:02:00"
        );
    }

    #[test]
    fn test_alert() {
        // sequence 5, low reservoir, 2015-09-06 07:39:15
        let msg = Message::from_packet(&packet("a259404001055207270f0f0906"));
        let Some(Message::Alert(alert)) = msg else {
            panic!("Expected Alert, got {:?}", msg);
        };
        assert_eq!(alert.sequence(), 5);
        assert_eq!(alert.alert_type(), AlertType::LowReservoir);
        assert_eq!(
            alert.timestamp().unwrap().to_string(),
            "2015-09-06 07:39:15"
        );
        assert_eq!(alert.alert_type().to_string(), "Low Reservoir");
    }

    #[test]
    fn test_battery_response() {
        let msg = Message::from_packet(&packet(
            "a7350535720300008c000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ));
        let Some(Message::Battery(battery)) = msg else {
            panic!("Expected Battery, got {:?}", msg);
        };
        assert!((battery.volts() - 1.4).abs() < 1e-9);
        assert_eq!(battery.indicator(), BatteryIndicator::Normal);
    }

    #[test]
    fn test_pump_model_response() {
        let msg = Message::from_packet(&packet("a73505358d0903353233000000"));
        assert_eq!(
            msg,
            Some(Message::PumpModel(PumpModelMessage {
                model: "523".to_string()
            }))
        );
    }

    #[test]
    fn test_history_frame() {
        let mut body = vec![0x81];
        body.extend(std::iter::repeat(0xab).take(64));
        let mut data = hex::decode("a735053580").unwrap();
        data.extend(&body);
        let Some(Message::HistoryFrame(frame)) = Message::from_packet(&packet(&hex::encode(&data)))
        else {
            panic!("Expected HistoryFrame");
        };
        assert_eq!(frame.frame_number, 1);
        assert!(frame.last_frame);
        assert_eq!(frame.data.len(), HISTORY_FRAME_DATA_LEN);
    }

    #[test]
    fn test_meter_reading() {
        // flags 0b11 (ack requested), glucose 0x1c8 = 456
        let msg = Message::from_packet(&packet("a5c5271b07c8"));
        let Some(Message::Meter(meter)) = msg else {
            panic!("Expected Meter, got {:?}", msg);
        };
        assert_eq!(meter.glucose(), 456);
        assert!(meter.ack_flag());
    }

    #[test]
    fn test_pump_error() {
        let msg = Message::from_packet(&packet("a735053515080000"));
        assert_eq!(msg, Some(Message::PumpError(PumpErrorCode::CommandRefused)));
    }

    #[test]
    fn test_unrecognized_types_are_ignored() {
        assert_eq!(Message::from_packet(&packet("a2350535ff0000")), None);
        assert_eq!(Message::from_packet(&packet("a7350535400000")), None);
        assert_eq!(Message::from_packet(&packet("a8350535010203")), None);
    }

    #[test]
    fn test_short_body_is_ignored() {
        assert_eq!(Message::from_packet(&packet("a23505350a93")), None);
    }

    #[test]
    fn test_build_and_decode_status() {
        let fields = Message::with_fields(
            &PUMP_STATUS_MAP,
            &[0xa2, 0x35, 0x05, 0x35, 0x04],
            &[("glucose_high", 60), ("glucose_low", 1), ("trend", 3)],
        )
        .expect("should build");
        let packet = decode_frame(&encode_frame(fields.bytes())).expect("should decode");
        let Some(Message::PumpStatus(status)) = Message::from_packet(&packet) else {
            panic!("Expected PumpStatus");
        };
        assert_eq!(status.glucose(), 121);
        assert_eq!(status.trend(), GlucoseTrend::Down);
    }

    #[test]
    fn test_to_json() {
        let msg = Message::from_packet(&packet("a23505350a93ce8aa000")).unwrap();
        let value = msg.to_json();
        assert_eq!(value["_type"], "DeviceLink");
        assert_eq!(value["sequence"], 19);
        assert_eq!(value["device_address"], "ce8aa0");
    }
}
