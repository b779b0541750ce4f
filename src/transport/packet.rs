//! Wire format: typed JSON envelopes, optionally followed by a binary blob.
//!
//! Outbound packets are `{"type", "pid", "data"}` objects. A packet carrying
//! a blob is sent as a single binary frame: the JSON text, a newline, then
//! the raw bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Kind of outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    /// Session handshake with environment details.
    Init,
    /// A user or widget event.
    Event,
    /// Keepalive or explicit ping.
    Ping,
    /// A log record forwarded to the server.
    Log,
}

/// An outbound packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: PacketType,
    pub pid: String,
    pub data: Value,
}

/// A single transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Envelope {
    pub fn new(kind: PacketType, pid: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            pid: pid.into(),
            data,
        }
    }

    /// Encode as a frame, appending `blob` after a newline when present.
    pub fn encode(&self, blob: Option<&[u8]>) -> Result<Frame> {
        let json = serde_json::to_string(self)?;
        Ok(match blob {
            None => Frame::Text(json),
            Some(bytes) => {
                let mut buf = Vec::with_capacity(json.len() + 1 + bytes.len());
                buf.extend_from_slice(json.as_bytes());
                buf.push(b'\n');
                buf.extend_from_slice(bytes);
                Frame::Binary(buf)
            }
        })
    }
}

impl Frame {
    /// Decode the envelope and any trailing blob.
    pub fn decode(&self) -> Result<(Envelope, Option<Vec<u8>>)> {
        match self {
            Frame::Text(text) => Ok((serde_json::from_str(text)?, None)),
            Frame::Binary(bytes) => {
                let split = bytes
                    .iter()
                    .position(|&b| b == b'\n')
                    .ok_or_else(|| Error::invalid_argument("frame", "binary frame without header"))?;
                let envelope = serde_json::from_slice(&bytes[..split])?;
                Ok((envelope, Some(bytes[split + 1..].to_vec())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn text_frame_shape() {
        let env = Envelope::new(PacketType::Ping, "p1", json!("keepalive"));
        let Frame::Text(text) = env.encode(None).unwrap() else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "ping", "pid": "p1", "data": "keepalive"}));
    }

    #[test]
    fn blob_frame_splits_on_first_newline() {
        let env = Envelope::new(PacketType::Event, "p1", json!({"type": "upload", "file": "a\nb"}));
        let frame = env.encode(Some(b"\x00\n\x01")).unwrap();
        assert!(matches!(frame, Frame::Binary(_)));
        let (decoded, blob) = frame.decode().unwrap();
        assert_eq!(decoded, env);
        assert_eq!(blob.as_deref(), Some(&b"\x00\n\x01"[..]));
    }

    #[test]
    fn binary_without_header_is_rejected() {
        assert!(Frame::Binary(b"{}".to_vec()).decode().is_err());
    }

    #[test]
    fn packet_type_names() {
        assert_eq!(serde_json::to_value(PacketType::Init).unwrap(), json!("init"));
        assert_eq!(serde_json::to_value(PacketType::Log).unwrap(), json!("log"));
    }
}
