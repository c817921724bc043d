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

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Architecture
//!
//! The crate is organized in layers, leaves first:
//!
//! - [`frame`]: the wire codec — five JSON frame shapes, classified by
//!   their field combinations
//! - [`params`]: parameter trees and the callback marshaler
//! - [`origin`]: origin canonicalization and the inbound identity
//!   filter
//! - [`substrate`]: the contract consumed from the host's
//!   string-passing primitive, plus an in-memory implementation
//! - [`channel`]: the runtime — handshake, transaction table,
//!   dispatcher, and the public surface (`bind`, `unbind`, `call`,
//!   `notify`, `destroy`)
//!
//! # Execution model
//!
//! Channels run single-threaded and cooperatively: the substrate
//! delivers inbound frames one at a time, handlers and continuations
//! are plain closures invoked from that dispatch, and sends never
//! block (they either reach the substrate or wait in the pre-ready
//! buffer). There are no timeouts and no retries; end-to-end recovery
//! belongs to the caller, and [`Channel::destroy`] is the only
//! cancellation primitive.
//!
//! # Safety
//!
//! 100% safe Rust, `#![deny(unsafe_code)]`.

pub mod channel;
pub mod frame;
pub mod origin;
pub mod params;
pub mod substrate;

pub use channel::{
    Call, Channel, ChannelConfig, ChannelError, ErrorContinuation, FrameObserver, HandlerError,
    ReadyHook, RequestHandler, SuccessContinuation, Transaction,
};
pub use frame::{CodecError, Frame};
pub use origin::{Origin, OriginError};
pub use params::{Params, ProgressCallback};
pub use substrate::{Substrate, SubstrateError};
