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

//! Ready handshake state: parity, id allocation, and the pending
//! queue.
//!
//! A channel is not usable for application traffic until both peers
//! have confirmed the other is listening. Each side announces itself
//! with a `__ready` notification carrying `"ping"`; whichever side
//! *receives* a ping answers with `"pong"`. Because the substrate is
//! best effort, a ping posted before the other side is listening is
//! simply lost, and the surviving ping/pong exchange settles both
//! roles:
//!
//! - the ping receiver answers the pong, takes the **odd** id parity,
//!   and tags its identity `-R`;
//! - the pong receiver aligns to the **even** parity and tags `-L`.
//!
//! Both sides then advance their transaction counters by 2, so the two
//! id sequences never collide.

use std::collections::VecDeque;

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};

use crate::frame::Frame;

/// Method name reserved for the handshake.
pub(crate) const READY_METHOD: &str = "__ready";

/// Handshake probe payload.
pub(crate) const PING: &str = "ping";

/// Handshake answer payload.
pub(crate) const PONG: &str = "pong";

/// The parity of a transaction-id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parity {
    /// Ids 1, 3, 5, … — the ping receiver's half.
    Odd,
    /// Ids 0, 2, 4, … — the pong receiver's half.
    Even,
}

impl Parity {
    const fn bit(self) -> u64 {
        match self {
            Self::Odd => 1,
            Self::Even => 0,
        }
    }
}

/// The role a side settles into at handshake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// Received the ping, answered the pong. Odd ids, `-R` tag.
    PingReceiver,
    /// Received the pong. Even ids, `-L` tag.
    PongReceiver,
}

impl Role {
    pub(crate) const fn parity(self) -> Parity {
        match self {
            Self::PingReceiver => Parity::Odd,
            Self::PongReceiver => Parity::Even,
        }
    }

    pub(crate) const fn identity_suffix(self) -> &'static str {
        match self {
            Self::PingReceiver => "-R",
            Self::PongReceiver => "-L",
        }
    }
}

/// Allocates transaction ids with a stride of 2.
///
/// The counter seeds randomly; its parity is aligned once, at
/// handshake, and every allocation advances by 2, keeping the whole
/// sequence on the adopted half of the id space.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Seeds from the same value range the counter has always used.
    pub(crate) fn seeded() -> Self {
        Self {
            next: thread_rng().gen_range(1..=1_000_000),
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Moves the counter onto the given parity, if it is not there
    /// already.
    pub(crate) fn align(&mut self, parity: Parity) {
        if self.next % 2 != parity.bit() {
            self.next += 1;
        }
    }

    /// Hands out the next id and advances by 2.
    pub(crate) fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next += 2;
        id
    }
}

/// Gate between construction and ready.
///
/// Until the handshake completes, every outbound frame except the
/// handshake itself is buffered here; entering ready drains the buffer
/// in FIFO order.
#[derive(Debug)]
pub(crate) struct ReadyGate {
    ready: bool,
    pending: VecDeque<Frame>,
}

impl ReadyGate {
    pub(crate) fn new() -> Self {
        Self {
            ready: false,
            pending: VecDeque::new(),
        }
    }

    pub(crate) const fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn enqueue(&mut self, frame: Frame) {
        self.pending.push_back(frame);
    }

    /// Marks the gate ready and returns the buffered frames, oldest
    /// first.
    pub(crate) fn open(&mut self) -> VecDeque<Frame> {
        self.ready = true;
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// A short random token naming a channel in log output.
///
/// The role suffix (`-R`/`-L`) is appended when the handshake settles.
pub(crate) fn identity_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect()
}
