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

//! Error types for the channel layer.

use thiserror::Error;

use crate::origin::OriginError;

/// Errors surfaced synchronously by channel operations.
///
/// These are the construction and usage errors of the public surface.
/// Protocol errors — malformed frames, unknown ids, failed origin or
/// scope checks — are by design never errors: they are dropped with a
/// debug log and never reported to the peer, so a misbehaving peer
/// cannot amplify traffic.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The configured peer handle refers back to the local context.
    #[error("peer handle refers to the local context")]
    SelfPeer,

    /// The configured origin did not canonicalize.
    #[error("invalid origin: {0}")]
    BadOrigin(#[from] OriginError),

    /// The configured scope contains the reserved separator `::`.
    #[error("scope `{0}` contains the reserved separator `::`")]
    BadScope(String),

    /// A handler is already bound under this method name.
    #[error("method `{0}` is already bound")]
    MethodBound(String),

    /// The method name was empty.
    #[error("method name must be a non-empty string")]
    InvalidMethod,

    /// `call` was issued without a success continuation.
    #[error("call requires a success continuation")]
    MissingSuccess,

    /// A progress callback was invoked under a name the caller did not
    /// declare.
    #[error("callback `{0}` was not declared by the caller")]
    UnknownCallback(String),

    /// The transaction has already been finalized, or its channel is
    /// gone.
    #[error("transaction {0} is no longer open")]
    StaleTransaction(u64),

    /// `complete` or `error` was applied to a transaction this side
    /// initiated; only the callee finalizes a transaction.
    #[error("transaction {0} was not initiated by the peer")]
    NotInbound(u64),
}

impl ChannelError {
    /// True for errors that indicate misconfiguration at build time.
    #[must_use]
    pub const fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::SelfPeer | Self::BadOrigin(_) | Self::BadScope(_)
        )
    }
}
