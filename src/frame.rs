//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Wire frames and the message codec.
//!
//! Every message on the substrate is a UTF-8 JSON object in exactly one
//! of five shapes, distinguished by which of the reserved fields it
//! carries:
//!
//! | Shape | Fields |
//! |---|---|
//! | [`Frame::Request`] | `id`, `method`, `params`, optional `callbacks` |
//! | [`Frame::Progress`] | `id`, `callback`, `params` |
//! | [`Frame::Success`] | `id`, `result` |
//! | [`Frame::Failure`] | `id`, `error`, `message` |
//! | [`Frame::Notification`] | `method`, `params` (no `id`) |
//!
//! Parsing is two-phase: the payload is deserialized into a permissive
//! raw struct, then classified by its field combination. Anything that
//! does not land cleanly in one shape is a [`CodecError`]; the channel
//! treats those as protocol errors and drops them without replying.

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors produced by the message codec.
///
/// Codec errors are protocol errors: the channel logs them at debug
/// level and drops the offending payload. They are never reported back
/// to the peer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed, but its field combination matches none of
    /// the five frame shapes.
    #[error("frame shape is not recognized")]
    UnknownShape,

    /// A reserved field was present with the wrong type.
    #[error("frame field `{field}` has the wrong type")]
    FieldType {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// One message frame, in its on-wire form.
///
/// `method` fields are the scoped wire form (`"<scope>::<method>"` when
/// a scope is configured); the codec does not know about scopes. The
/// channel applies its scope on post and strips it on receive.
///
/// # Example
///
/// ```rust
/// use framechan::frame::Frame;
/// use serde_json::json;
///
/// let frame = Frame::Request {
///     id: 3,
///     method: "echo".to_string(),
///     params: json!({ "x": 1 }),
///     callbacks: vec![],
/// };
/// let wire = frame.encode();
/// let back = Frame::parse(&wire).unwrap();
/// assert!(matches!(back, Frame::Request { id: 3, .. }));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A call initiated by the peer: `{ id, method, params, callbacks? }`.
    Request {
        /// Transaction id, allocated by the caller.
        id: u64,
        /// Scoped method name.
        method: String,
        /// Parameter tree, with callables pruned out.
        params: Value,
        /// Slash-joined paths where the caller pruned callables.
        /// Omitted from the wire when empty.
        callbacks: Vec<String>,
    },

    /// A non-terminal progress value for an open transaction:
    /// `{ id, callback, params }`.
    Progress {
        /// Transaction id of the open call.
        id: u64,
        /// Declared callback path the value is addressed to.
        callback: String,
        /// The progress value.
        params: Value,
    },

    /// A successful final response: `{ id, result }`.
    Success {
        /// Transaction id of the completed call.
        id: u64,
        /// The success payload.
        result: Value,
    },

    /// An error final response: `{ id, error, message }`.
    Failure {
        /// Transaction id of the failed call.
        id: u64,
        /// Stable error code.
        error: String,
        /// Human-readable message.
        message: String,
    },

    /// A fire-and-forget notification: `{ method, params }`, no id.
    Notification {
        /// Scoped method name.
        method: String,
        /// Parameter value.
        params: Value,
    },
}

/// Permissive superset of every frame shape, used for classification.
#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    callbacks: Option<Vec<String>>,
    callback: Option<String>,
    result: Option<Value>,
    error: Option<Value>,
    message: Option<Value>,
}

impl Frame {
    /// Parses a payload string into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the payload is not JSON, is not an
    /// object, or does not classify as exactly one of the five shapes.
    pub fn parse(payload: &str) -> Result<Self, CodecError> {
        let raw: RawFrame = serde_json::from_str(payload)?;
        Self::classify(raw)
    }

    fn classify(raw: RawFrame) -> Result<Self, CodecError> {
        let params = raw.params.unwrap_or(Value::Null);
        match (raw.id, raw.method, raw.callback) {
            (Some(id), Some(method), None) => Ok(Self::Request {
                id,
                method,
                params,
                callbacks: raw.callbacks.unwrap_or_default(),
            }),
            (Some(id), None, Some(callback)) => Ok(Self::Progress {
                id,
                callback,
                params,
            }),
            (Some(id), None, None) => match (raw.result, raw.error) {
                (Some(result), None) => Ok(Self::Success { id, result }),
                (None, Some(error)) => {
                    let error = match error {
                        Value::String(code) => code,
                        _ => return Err(CodecError::FieldType { field: "error" }),
                    };
                    let message = match raw.message {
                        Some(Value::String(text)) => text,
                        Some(_) => return Err(CodecError::FieldType { field: "message" }),
                        None => return Err(CodecError::UnknownShape),
                    };
                    Ok(Self::Failure { id, error, message })
                }
                _ => Err(CodecError::UnknownShape),
            },
            (None, Some(method), None) => Ok(Self::Notification { method, params }),
            _ => Err(CodecError::UnknownShape),
        }
    }

    /// Encodes this frame to its wire string.
    ///
    /// The `callbacks` field of a request is omitted when no callables
    /// were pruned from the parameter tree.
    #[must_use]
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Request {
                id,
                method,
                params,
                callbacks,
            } => {
                let mut value = json!({ "id": id, "method": method, "params": params });
                if !callbacks.is_empty() {
                    value["callbacks"] = json!(callbacks);
                }
                value
            }
            Self::Progress {
                id,
                callback,
                params,
            } => json!({ "id": id, "callback": callback, "params": params }),
            Self::Success { id, result } => json!({ "id": id, "result": result }),
            Self::Failure { id, error, message } => {
                json!({ "id": id, "error": error, "message": message })
            }
            Self::Notification { method, params } => {
                json!({ "method": method, "params": params })
            }
        };
        value.to_string()
    }

    /// Returns the scoped method name, for the shapes that carry one.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Returns the transaction id, for the shapes that carry one.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Request { id, .. }
            | Self::Progress { id, .. }
            | Self::Success { id, .. }
            | Self::Failure { id, .. } => Some(*id),
            Self::Notification { .. } => None,
        }
    }
}
