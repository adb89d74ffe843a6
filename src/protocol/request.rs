//! Request and response envelopes.
//!
//! ```text
//! → {"id": "<uuid>", "tabId": 7, "method": "script.evaluate", "params": {...}}
//! ← {"id": "<uuid>", "type": "success", "result": {...}}
//! ← {"id": "<uuid>", "type": "error", "error": "code", "message": "text"}
//! ```
//!
//! `tabId` is only present on tab-scoped commands. The READY handshake
//! arrives as a success response carrying the nil UUID.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TabId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// Envelope for one command sent to the extension.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation ID, echoed back in the response.
    pub id: RequestId,

    /// Tab the command runs in, if any.
    #[serde(rename = "tabId", skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,

    /// Method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a request scoped to `tab_id`.
    #[inline]
    #[must_use]
    pub fn new(tab_id: TabId, command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            tab_id: Some(tab_id),
            command,
        }
    }

    /// Creates a request for a browser-wide command.
    #[inline]
    #[must_use]
    pub fn untargeted(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            tab_id: None,
            command,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Envelope for the extension's answer to one request.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// ID of the request being answered.
    pub id: RequestId,

    /// Outcome.
    #[serde(rename = "type")]
    pub status: ResponseStatus,

    /// Payload of a success.
    #[serde(default)]
    pub result: Option<Value>,

    /// Short error code of a failure.
    #[serde(default)]
    pub error: Option<String>,

    /// Readable description of a failure.
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Returns `true` if the extension reported a failure.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Best description of a failure: message, then code.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    /// Returns the result payload, or the failure description.
    ///
    /// A success without a payload yields `null`.
    pub fn into_value(self) -> std::result::Result<Value, String> {
        match self.status {
            ResponseStatus::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseStatus::Error => Err(self.error_message()),
        }
    }

    /// Decodes the result payload into `T`.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the response is a failure or the payload does
    /// not have the expected shape.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_value().map_err(Error::protocol)?;
        serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("unexpected result shape: {e}")))
    }
}

// ============================================================================
// ResponseStatus
// ============================================================================

/// Value of the response `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The command ran.
    Success,
    /// The command failed.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
