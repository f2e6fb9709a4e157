//! MongoDB driver error summaries.
//!
//! Driver errors are condensed into an [`ErrorInfo`] and rendered as one
//! line of JSON, e.g.
//! `{"type":"mongo.command_error","code":43,"name":"CursorNotFound","message":"..."}`,
//! so the job runner's logs carry the server code next to the message.

use mongodb::error::{Error as DriverError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Structured summary of a MongoDB error.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorInfo {
    fn classified(error_type: &str, message: String) -> Self {
        Self {
            error_type: Some(format!("mongo.{error_type}")),
            message: Some(message),
            ..Default::default()
        }
    }

    /// Summarize a driver error.
    ///
    /// Only read-path failures are classified: command errors raised by
    /// `find`/`aggregate`, authentication, server selection and network
    /// drops. Anything else keeps just its display text.
    pub fn from_driver(error: &DriverError) -> Self {
        match error.kind.as_ref() {
            ErrorKind::Command(command) => Self {
                code: Some(command.code),
                name: server_code_name(command.code).map(str::to_string),
                ..Self::classified("command_error", command.message.clone())
            },
            ErrorKind::Authentication { message, .. } => {
                Self::classified("authentication_error", message.clone())
            }
            ErrorKind::InvalidArgument { message, .. } => {
                Self::classified("invalid_argument", message.clone())
            }
            ErrorKind::ServerSelection { message, .. } => {
                Self::classified("server_selection_error", message.clone())
            }
            ErrorKind::Io(io) => Self::classified("io_error", io.to_string()),
            _ => Self {
                message: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    /// Single-line JSON rendering.
    pub fn to_json_compact(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Server error codes an export is likely to hit.
fn server_code_name(code: i32) -> Option<&'static str> {
    Some(match code {
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        43 => "CursorNotFound",
        50 => "MaxTimeMSExpired",
        292 => "QueryExceededMemoryLimitNoDiskUseAllowed",
        _ => return None,
    })
}
