//! Control and streaming protocol types.
//!
//! The control phase is two JSON POSTs; the streaming phase delivers JSON
//! text messages tagged by a `type` field. [`decode`] turns one raw message
//! into a [`StreamEvent`], absorbing malformed input into a variant instead
//! of an error so that a single bad message can never abort the stream.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/initialize`.
#[derive(Debug, Serialize)]
pub struct InitializeRequest {
    /// Satellite dataset, passed through opaquely
    pub satellites: Value,
    /// Backend configuration, empty object by default
    pub config: Value,
}

impl InitializeRequest {
    pub fn new(satellites: Value) -> Self {
        Self {
            satellites,
            config: Value::Object(Default::default()),
        }
    }
}

/// Success body of `POST /api/initialize`. The count is display-only.
#[derive(Debug, Deserialize)]
pub struct InitializeResponse {
    #[serde(default)]
    pub satellite_count: u64,
}

/// Body of `POST /api/generate`. `start_time` is ISO 8601 and serialized
/// as null when absent, matching what the server expects.
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub duration_seconds: u64,
    pub step_seconds: u64,
    pub start_time: Option<String>,
}

/// Success body of `POST /api/generate`; seeds the expected frame count.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub total_frames: u64,
}

/// One inbound stream message as the server sends it. Unknown `type`
/// values and structural mismatches fail deserialization, which `decode`
/// classifies as malformed rather than assuming any variant.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    Status {
        data: StatusData,
    },
    Frame {
        index: u64,
        total: u64,
        filename: String,
        timestamp: String,
        data: String,
    },
    Complete {
        total_frames: u64,
    },
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
}

/// A decoded frame ready to persist; payload already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub index: u64,
    pub total: u64,
    pub filename: String,
    pub timestamp: String,
    pub bytes: Vec<u8>,
}

/// Typed view of one inbound stream message.
#[derive(Debug)]
pub enum StreamEvent {
    /// Server-side status text, observable but not a state change
    Status(String),
    /// One frame to persist
    Frame(FrameRecord),
    /// Server's final word on how many frames were transferred; overrides
    /// the control-phase estimate
    Complete { total_frames: u64 },
    /// Unparseable or structurally invalid message. `index` is set when
    /// the envelope parsed but the payload did not, so the failure can be
    /// attributed to that frame.
    Malformed { index: Option<u64>, reason: String },
}

/// Classify one raw text message. Total: malformed input becomes
/// [`StreamEvent::Malformed`], never an error.
pub fn decode(raw: &str) -> StreamEvent {
    let msg: WireMessage = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(e) => {
            return StreamEvent::Malformed {
                index: None,
                reason: e.to_string(),
            }
        }
    };

    match msg {
        WireMessage::Status { data } => StreamEvent::Status(data.status),
        WireMessage::Frame {
            index,
            total,
            filename,
            timestamp,
            data,
        } => match base64::engine::general_purpose::STANDARD.decode(&data) {
            Ok(bytes) => StreamEvent::Frame(FrameRecord {
                index,
                total,
                filename,
                timestamp,
                bytes,
            }),
            Err(e) => StreamEvent::Malformed {
                index: Some(index),
                reason: format!("invalid frame payload: {e}"),
            },
        },
        WireMessage::Complete { total_frames } => StreamEvent::Complete { total_frames },
    }
}
