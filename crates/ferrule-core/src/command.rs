use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::Direction;

// ── Command names ──

pub const WRITE: &str = "write";
pub const WRITE_BASE64: &str = "writeBase64";
pub const UNDO: &str = "undo";
pub const REDO: &str = "redo";
pub const SHOW_IN_IDE: &str = "showInIde";
pub const REFRESH: &str = "refresh";

/// Every command the dispatcher recognizes, in the order advertised to clients.
pub const SUPPORTED_COMMANDS: &[&str] = &[WRITE, WRITE_BASE64, UNDO, REDO, SHOW_IN_IDE, REFRESH];

// ── Wire shape ──

/// Request body as it arrives on the wire: `{"command": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCommand {
    pub command: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ── Payloads ──

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteData {
    pub file: String,
    pub content: String,
    #[serde(default)]
    pub undo_label: Option<String>,
}

/// A `writeBase64` payload with its content already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryWriteData {
    pub file: String,
    pub bytes: Vec<u8>,
    pub undo_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UndoRedoData {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShowInIdeData {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// A validated command. Each variant carries the payload its handler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write(WriteData),
    WriteBase64(BinaryWriteData),
    UndoRedo(UndoRedoData, Direction),
    ShowInIde(ShowInIdeData),
    Refresh,
}

impl Command {
    /// Validate a raw request. Unknown command names and payloads that do not
    /// match the command's shape are rejected here, before any handler runs.
    pub fn parse(raw: RawCommand) -> Result<Self, BridgeError> {
        let RawCommand { command, data } = raw;
        match command.as_str() {
            WRITE => Ok(Command::Write(payload(&command, data)?)),
            WRITE_BASE64 => {
                let wire: WriteData = payload(&command, data)?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(wire.content.trim())
                    .map_err(|e| BridgeError::InvalidPayload {
                        command: command.clone(),
                        reason: format!("content is not valid base64: {e}"),
                    })?;
                Ok(Command::WriteBase64(BinaryWriteData {
                    file: wire.file,
                    bytes,
                    undo_label: wire.undo_label,
                }))
            }
            UNDO => Ok(Command::UndoRedo(payload(&command, data)?, Direction::Undo)),
            REDO => Ok(Command::UndoRedo(payload(&command, data)?, Direction::Redo)),
            SHOW_IN_IDE => Ok(Command::ShowInIde(payload(&command, data)?)),
            REFRESH => Ok(Command::Refresh),
            _ => Err(BridgeError::UnrecognizedCommand(command)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Write(_) => WRITE,
            Command::WriteBase64(_) => WRITE_BASE64,
            Command::UndoRedo(_, Direction::Undo) => UNDO,
            Command::UndoRedo(_, Direction::Redo) => REDO,
            Command::ShowInIde(_) => SHOW_IN_IDE,
            Command::Refresh => REFRESH,
        }
    }
}

fn payload<T: DeserializeOwned>(command: &str, data: serde_json::Value) -> Result<T, BridgeError> {
    serde_json::from_value(data).map_err(|e| BridgeError::InvalidPayload {
        command: command.to_string(),
        reason: e.to_string(),
    })
}
