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

//! Request handlers and application-error normalization.

use std::rc::Rc;

use serde_json::Value;

use crate::channel::Transaction;
use crate::params::Params;

/// A bound request handler.
///
/// Invoked with the transaction control handle (`None` for
/// notifications, which have nothing to reply to) and the parameter
/// tree. A returned `Ok` value becomes the success payload unless the
/// handler opted into delayed return or already finalized; a returned
/// `Err` is normalized into a `(code, message)` error reply. For
/// notifications, both are discarded.
pub type RequestHandler = Rc<dyn Fn(Option<Rc<Transaction>>, Params) -> Result<Value, HandlerError>>;

/// Error code used when a handler failure carries no code of its own.
pub const RUNTIME_ERROR: &str = "runtime_error";

/// An application failure surfaced by a request handler.
///
/// This is the typed stand-in for "whatever the handler threw": any
/// JSON value, normalized onto the wire's `(code, message)` shape in a
/// fixed order of preference:
///
/// 1. a string → code [`RUNTIME_ERROR`], the string as message;
/// 2. a two-element array → `[code, message]`;
/// 3. an object with a string `error` field → that code; the message
///    is the object's `message` field if string-valued, otherwise the
///    serialization of that field, otherwise the serialization of the
///    whole object;
/// 4. anything else → code [`RUNTIME_ERROR`], the serialized value as
///    message.
///
/// # Examples
///
/// ```rust
/// use framechan::HandlerError;
/// use serde_json::json;
///
/// let plain = HandlerError::from("boom");
/// let coded = HandlerError::coded("not_found", "no such user");
/// let raw = HandlerError::from(json!({ "error": "denied", "message": "nope" }));
/// # let _ = (plain, coded, raw);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError(Value);

impl HandlerError {
    /// Wraps an arbitrary JSON value as the failure.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A failure with an explicit code and message.
    #[must_use]
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self(Value::Array(vec![
            Value::String(code.into()),
            Value::String(message.into()),
        ]))
    }

    /// Normalizes onto the wire shape.
    pub(crate) fn into_wire(self) -> (String, String) {
        match self.0 {
            Value::String(message) => (RUNTIME_ERROR.to_string(), message),
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                let code = stringify(items.next().unwrap_or(Value::Null));
                let message = stringify(items.next().unwrap_or(Value::Null));
                (code, message)
            }
            Value::Object(ref map) if matches!(map.get("error"), Some(Value::String(_))) => {
                let code = match map.get("error") {
                    Some(Value::String(code)) => code.clone(),
                    _ => RUNTIME_ERROR.to_string(),
                };
                let message = match map.get("message") {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => serialize(other),
                    None => serialize(&self.0),
                };
                (code, message)
            }
            other => (RUNTIME_ERROR.to_string(), serialize(&other)),
        }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(Value::String(message.to_string()))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(Value::String(message))
    }
}

impl From<Value> for HandlerError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A code or message position that should read as text: strings pass
/// through, anything else serializes.
fn stringify(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serialize(&other),
    }
}

/// Serializes a value, falling back to a coarse textual form when
/// serialization fails.
fn serialize(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}
