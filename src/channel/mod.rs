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

//! The channel layer: the RPC runtime itself.
//!
//! A [`Channel`] is one endpoint of an RPC relationship between two
//! isolated contexts. It layers four interaction patterns over the
//! untyped string-passing substrate:
//!
//! - **Request/response** — [`Channel::call`] with a success (and
//!   optional error) continuation, answered by a handler bound with
//!   [`Channel::bind`].
//! - **Progress callbacks** — callables inside a call's parameter tree
//!   are marshaled by path; the handler emits intermediate values
//!   through its [`Transaction`] handle and the caller's callables
//!   fire in order.
//! - **Notifications** — [`Channel::notify`], fire and forget.
//! - **Structured errors** — handler failures normalize to a stable
//!   `(code, message)` pair on the wire.
//!
//! The runtime enforces the origin filter on every inbound frame,
//! multiplexes channels sharing one substrate by scope prefix, and
//! gates all traffic behind the two-step ready handshake.

#[allow(clippy::module_inception)]
mod channel;
mod config;
mod error;
mod handler;
mod handshake;
mod transaction;

pub use channel::{Call, Channel};
pub use config::{ChannelConfig, FrameObserver, ReadyHook};
pub use error::ChannelError;
pub use handler::{HandlerError, RUNTIME_ERROR, RequestHandler};
pub use transaction::{ErrorContinuation, SuccessContinuation, Transaction};
