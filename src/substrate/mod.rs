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

//! The substrate contract the channel consumes.
//!
//! The substrate is the host-provided, asynchronous, untyped,
//! best-effort string-passing primitive between two isolated execution
//! contexts. This crate does not implement it (beyond the in-process
//! [`memory`] variant for tests and single-process hosts); it consumes
//! two halves of it:
//!
//! - **Outbound**: a [`Substrate`] handle with a `post` operation
//!   taking `(payload, target_origin)`.
//! - **Inbound**: the host's event dispatch, which pushes each
//!   `(payload, sender_identity)` tuple into
//!   [`Channel::deliver`](crate::Channel::deliver), one at a time.
//!
//! Delivery is best effort: a payload posted while nobody in the peer
//! context is listening is simply lost. The channel's ready handshake
//! is designed around exactly that property.

use thiserror::Error;

pub mod memory;

/// Errors surfaced by a substrate post.
///
/// Posts are best effort; the channel logs these and moves on.
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// The peer context no longer exists.
    #[error("peer context is gone")]
    PeerGone,
}

/// A handle to the peer context, usable for posting payloads.
///
/// Implementations wrap whatever the host provides (a window handle, a
/// pipe, a test double). A handle is directional: it is held by one
/// context and points at the other.
pub trait Substrate {
    /// Posts a payload toward the peer context.
    ///
    /// `target_origin` restricts delivery: the payload must only be
    /// handed to the peer if the peer's identity matches (`"*"`
    /// matches anything). The sender identity the peer observes is
    /// derived by the substrate, never from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`SubstrateError::PeerGone`] when the peer context has
    /// been torn down.
    fn post(&self, payload: &str, target_origin: &str) -> Result<(), SubstrateError>;

    /// True when this handle refers back to the context holding it.
    ///
    /// A channel to oneself is a configuration error, checked at build
    /// time.
    fn is_loopback(&self) -> bool;
}
