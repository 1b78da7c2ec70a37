//! Response envelope types

use serde::{Deserialize, Serialize};

/// Outward status code, serialized as the wire strings consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Full success.
    #[serde(rename = "200")]
    Ok,
    /// Partial success: some extracted fields are null or some batches failed.
    #[serde(rename = "206")]
    Partial,
    /// Error: invalid API key, invalid input, or a failed extraction.
    #[serde(rename = "500")]
    Error,
}

/// Response envelope: status plus payload.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub status: StatusCode,
    pub data: Payload<T>,
}

/// Envelope payload: the output on success, an error message otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Output(T),
    Message { post: String },
}

impl<T> Envelope<T> {
    /// Full-success envelope.
    pub fn ok(output: T) -> Self {
        Self {
            status: StatusCode::Ok,
            data: Payload::Output(output),
        }
    }

    /// Partial-success envelope.
    pub fn partial(output: T) -> Self {
        Self {
            status: StatusCode::Partial,
            data: Payload::Output(output),
        }
    }

    /// Error envelope carrying a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Error,
            data: Payload::Message {
                post: message.into(),
            },
        }
    }

    /// The output payload, if this is not an error envelope.
    pub fn output(&self) -> Option<&T> {
        match &self.data {
            Payload::Output(output) => Some(output),
            Payload::Message { .. } => None,
        }
    }

    /// The error message, if this is an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        match &self.data {
            Payload::Message { post } => Some(post),
            Payload::Output(_) => None,
        }
    }
}
