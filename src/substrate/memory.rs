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

//! In-memory substrate implementation for testing.
//!
//! This module provides an in-process substrate: a pair of linked
//! contexts with per-context inbound queues and an explicit, fully
//! deterministic [`pump`](MemoryContext::pump). It is primarily useful
//! for testing and for single-process hosts that want channel
//! semantics without a real isolation boundary.
//!
//! Like the real thing, delivery is best effort: a payload pumped while
//! no attached channel accepts it is dropped, and a payload posted with
//! a `target_origin` the receiving context does not match is never
//! enqueued at all.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::channel::Channel;
use crate::substrate::{Substrate, SubstrateError};

/// One simulated execution context.
///
/// Contexts come in linked pairs. Each context has an identity
/// (origin), an inbound queue, and a set of attached channels that see
/// pumped payloads.
///
/// # Examples
///
/// ```rust
/// use framechan::substrate::memory::MemoryContext;
///
/// let (parent, child) = MemoryContext::pair("https://parent.example", "https://child.example");
/// assert_eq!(parent.origin(), "https://parent.example");
///
/// // Channels built in `parent` post through `parent.peer()`; frames
/// // land in `child`'s queue and reach `child`'s attached channels on
/// // `child.pump()`.
/// ```
pub struct MemoryContext {
    inner: Rc<RefCell<ContextInner>>,
}

struct ContextInner {
    origin: String,
    peer: Weak<RefCell<ContextInner>>,
    inbox: VecDeque<(String, String)>,
    channels: Vec<Weak<Channel>>,
}

impl MemoryContext {
    /// Creates a linked pair of contexts with the given identities.
    pub fn pair(a_origin: &str, b_origin: &str) -> (Self, Self) {
        let a = Rc::new(RefCell::new(ContextInner {
            origin: a_origin.to_string(),
            peer: Weak::new(),
            inbox: VecDeque::new(),
            channels: Vec::new(),
        }));
        let b = Rc::new(RefCell::new(ContextInner {
            origin: b_origin.to_string(),
            peer: Weak::new(),
            inbox: VecDeque::new(),
            channels: Vec::new(),
        }));
        a.borrow_mut().peer = Rc::downgrade(&b);
        b.borrow_mut().peer = Rc::downgrade(&a);
        (Self { inner: a }, Self { inner: b })
    }

    /// This context's identity, as its peers observe it.
    #[must_use]
    pub fn origin(&self) -> String {
        self.inner.borrow().origin.clone()
    }

    /// Returns a [`Substrate`] handle from this context to its peer.
    ///
    /// This is what a channel built in this context posts through.
    #[must_use]
    pub fn peer(&self) -> MemoryPeer {
        MemoryPeer {
            source: Rc::downgrade(&self.inner),
            target: self.inner.borrow().peer.clone(),
        }
    }

    /// Returns a handle from this context back to itself.
    ///
    /// Useful only to exercise the build-time self-peer check.
    #[must_use]
    pub fn loopback(&self) -> MemoryPeer {
        MemoryPeer {
            source: Rc::downgrade(&self.inner),
            target: Rc::downgrade(&self.inner),
        }
    }

    /// Attaches a channel to this context's inbound dispatch.
    ///
    /// Channels are held weakly; dropped or destroyed channels are
    /// pruned on the next pump.
    pub fn attach(&self, channel: &Rc<Channel>) {
        self.inner.borrow_mut().channels.push(Rc::downgrade(channel));
    }

    /// Delivers every queued payload, one at a time.
    ///
    /// Each payload is offered to the attached channels in attach
    /// order and dispatch stops at the first channel that accepts it
    /// (so a frame has exactly one consumer). Payloads nobody accepts
    /// are dropped. Returns the number of payloads taken off the
    /// queue.
    ///
    /// Accepting a payload may re-entrantly enqueue new payloads (a
    /// handler replying, the handshake answering a ping); those are
    /// picked up before `pump` returns.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.inner.borrow_mut().inbox.pop_front();
            let Some((payload, sender)) = next else {
                break;
            };
            delivered += 1;

            let channels = self.live_channels();
            let mut accepted = false;
            for channel in &channels {
                if channel.deliver(&payload, &sender) {
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                debug!(
                    target: "framechan::memory",
                    sender = %sender,
                    "payload dropped: no attached channel accepted it"
                );
            }
        }
        delivered
    }

    /// Pumps both contexts of a pair until neither has queued
    /// payloads, and returns the total delivered.
    ///
    /// This is the test idiom for "let the message loop run".
    pub fn settle(a: &Self, b: &Self) -> usize {
        let mut delivered = 0;
        loop {
            let step = a.pump() + b.pump();
            if step == 0 {
                return delivered;
            }
            delivered += step;
        }
    }

    /// Collects strong references to live, non-destroyed channels and
    /// prunes the rest.
    fn live_channels(&self) -> Vec<Rc<Channel>> {
        let mut inner = self.inner.borrow_mut();
        inner
            .channels
            .retain(|weak| weak.upgrade().is_some_and(|ch| !ch.is_destroyed()));
        inner
            .channels
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

/// A [`Substrate`] handle from one [`MemoryContext`] to the other.
pub struct MemoryPeer {
    source: Weak<RefCell<ContextInner>>,
    target: Weak<RefCell<ContextInner>>,
}

impl Substrate for MemoryPeer {
    fn post(&self, payload: &str, target_origin: &str) -> Result<(), SubstrateError> {
        let target = self.target.upgrade().ok_or(SubstrateError::PeerGone)?;
        let sender = match self.source.upgrade() {
            Some(source) => source.borrow().origin.clone(),
            None => return Err(SubstrateError::PeerGone),
        };

        let mut target = target.borrow_mut();
        if target_origin != "*" && target_origin != target.origin {
            // The host refuses cross-origin delivery without error;
            // best effort means the payload is simply not handed over.
            debug!(
                target: "framechan::memory",
                requested = %target_origin,
                actual = %target.origin,
                "payload dropped: target origin mismatch"
            );
            return Ok(());
        }
        target.inbox.push_back((payload.to_string(), sender));
        Ok(())
    }

    fn is_loopback(&self) -> bool {
        Weak::ptr_eq(&self.source, &self.target)
    }
}
