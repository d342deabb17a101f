//! Offline tools for Minimed radio captures and pump settings.
//!
//! Every command produces a JSON value; the `rlink` binary prints it.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use minimed_history::{HistoryError, HistoryPage, PumpModel};
use minimed_packet::{decode_frame, encode_frame, FrameError, Message};
use rlink_pump_ops::{ConfigError, PumpSettings};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Minimed radio link tools
#[derive(Parser, Debug)]
#[command(name = "rlink", version, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Decode a 4b6b radio frame given as hex
    DecodeFrame {
        /// Encoded frame, e.g. "a96965..."
        hex: String,
    },

    /// Append a CRC-8 to a decoded packet given as hex and 4b6b-encode it
    EncodeFrame {
        /// Decoded packet without its CRC
        hex: String,
    },

    /// Decode a 1024-byte history page (raw binary or hex text)
    DecodePage {
        /// File holding the page
        path: PathBuf,

        /// Pump model number, e.g. 551
        #[arg(short, long)]
        model: String,

        /// Pump clock offset from UTC, in seconds
        #[arg(long, allow_hyphen_values = true)]
        utc_offset_secs: Option<i32>,
    },

    /// Load and validate a pump settings file
    CheckConfig {
        /// YAML settings file
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTC offset of {0} seconds is out of range")]
    InvalidOffset(i32),

    #[error("history page is {0} bytes, expected {expected}", expected = HistoryPage::SIZE)]
    PageSize(usize),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Run one command and return its report.
pub fn run(command: &Command) -> Result<Value> {
    match command {
        Command::DecodeFrame { hex } => decode_frame_report(hex),
        Command::EncodeFrame { hex } => encode_frame_report(hex),
        Command::DecodePage {
            path,
            model,
            utc_offset_secs,
        } => {
            let model: PumpModel = model.parse()?;
            let offset = utc_offset_secs
                .map(|secs| FixedOffset::east_opt(secs).ok_or(CliError::InvalidOffset(secs)))
                .transpose()?;
            let raw = std::fs::read(path)?;
            info!(path = %path.display(), bytes = raw.len(), "Read history page");
            decode_page_report(parse_page_input(&raw)?, model, offset)
        }
        Command::CheckConfig { path } => check_config(path),
    }
}

/// Packet header, payload and interpreted message of an encoded frame.
pub fn decode_frame_report(frame_hex: &str) -> Result<Value> {
    let frame = hex::decode(frame_hex.trim())?;
    let packet = decode_frame(&frame)?;
    let message = Message::from_packet(&packet);
    debug!(
        message = message.as_ref().map(|m| m.name()).unwrap_or("unknown"),
        "Decoded frame"
    );

    Ok(json!({
        "packet_type": packet.packet_type(),
        "address": packet.address().to_string(),
        "message_type": format!("0x{:02x}", packet.message_type()),
        "payload": hex::encode(packet.payload()),
        "message": message.map(|m| m.to_json()),
    }))
}

pub fn encode_frame_report(packet_hex: &str) -> Result<Value> {
    let packet = hex::decode(packet_hex.trim())?;
    Ok(json!({ "frame": hex::encode(encode_frame(&packet)) }))
}

/// Accept a page as raw bytes or as hex text with arbitrary whitespace.
pub fn parse_page_input(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() == HistoryPage::SIZE {
        return Ok(raw.to_vec());
    }
    let text: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let data = hex::decode(text)?;
    if data.len() != HistoryPage::SIZE {
        return Err(CliError::PageSize(data.len()));
    }
    Ok(data)
}

/// CRC status and events of a page. A bad CRC is reported, not fatal.
pub fn decode_page_report(
    data: Vec<u8>,
    model: PumpModel,
    offset: Option<FixedOffset>,
) -> Result<Value> {
    let page = HistoryPage::new(data, model);
    let crc_valid = page.is_crc_valid();
    if let Err(e) = page.crc_check() {
        warn!(error = %e, "History page failed its CRC check");
    }

    Ok(json!({
        "model": model.number(),
        "crc_valid": crc_valid,
        "events": page.to_json(offset),
    }))
}

/// Settings as loaded, defaults filled in.
pub fn check_config(path: &Path) -> Result<Value> {
    let settings = PumpSettings::load(path)?;
    info!(pump_id = %settings.pump_id, region = ?settings.region, "Settings are valid");
    Ok(serde_json::to_value(&settings)?)
}
