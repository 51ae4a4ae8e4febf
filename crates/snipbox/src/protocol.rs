//! JSON-lines protocol between the host and a runtime worker.
//!
//! Host → worker, one object per line on the worker's stdin:
//!
//! ```text
//! {"id":1,"code":"print('hi')"}
//! ```
//!
//! Worker → host, one object per line on the worker's protocol stream:
//!
//! ```text
//! {"type":"ready","version":"3.12.3"}
//! {"type":"stdout","id":1,"text":"hi\n"}
//! {"type":"done","id":1,"error":null}
//! {"type":"done","id":2,"error":{"message":"division by zero","type":"ZeroDivisionError","line":1}}
//! ```

use serde::{Deserialize, Serialize};

use crate::capture::Stream;
use crate::result::ErrorInfo;

/// Execution identifier, unique per worker.
pub type RequestId = u64;

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: RequestId,
    code: &'a str,
}

/// Encode one request line, including the trailing newline.
pub fn encode_request(id: RequestId, code: &str) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(&Request { id, code })?;
    line.push('\n');
    Ok(line)
}

/// Event emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Ready {
        #[serde(default)]
        version: String,
    },
    Stdout {
        id: RequestId,
        text: String,
    },
    Stderr {
        id: RequestId,
        text: String,
    },
    Done {
        id: RequestId,
        #[serde(default)]
        error: Option<WireError>,
    },
}

impl Event {
    /// Output text and its stream, if this is an output event.
    pub fn output(&self) -> Option<(RequestId, Stream, &str)> {
        match self {
            Event::Stdout { id, text } => Some((*id, Stream::Stdout, text)),
            Event::Stderr { id, text } => Some((*id, Stream::Stderr, text)),
            _ => None,
        }
    }
}

/// Error as reported by a driver, before position sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub column: Option<i64>,
}

impl From<WireError> for ErrorInfo {
    fn from(wire: WireError) -> Self {
        let info = ErrorInfo::new(wire.message).at(wire.line, wire.column);
        match wire.kind {
            Some(kind) => info.with_kind(kind),
            None => info,
        }
    }
}

pub fn decode_event(line: &str) -> Result<Event, serde_json::Error> {
    serde_json::from_str(line)
}
