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

//! Transaction bookkeeping for in-flight calls, in both directions.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::channel::{Channel, ChannelError};
use crate::params::ProgressCallback;

/// Continuation fired once with the final success payload.
pub type SuccessContinuation = Box<dyn FnOnce(Value)>;

/// Continuation fired once with the final `(code, message)` error.
pub type ErrorContinuation = Box<dyn FnOnce(String, String)>;

/// Bookkeeping for a call this side issued.
pub(crate) struct OutboundCall {
    pub success: SuccessContinuation,
    pub error: Option<ErrorContinuation>,
    pub callbacks: HashMap<String, ProgressCallback>,
}

/// One record in the transaction table.
pub(crate) enum Entry {
    /// We called the peer; continuations wait here.
    Outbound(OutboundCall),
    /// The peer called us; the handler side owns a [`Transaction`]
    /// control handle for it.
    Inbound,
}

/// Which direction a table entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Outbound,
    Inbound,
}

/// The table of in-flight calls, keyed by transaction id.
///
/// An id appears at most once. Entries are removed on the final reply
/// (success or error), never on a progress callback.
#[derive(Default)]
pub(crate) struct TransactionTable {
    entries: HashMap<u64, Entry>,
}

impl TransactionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_outbound(&mut self, id: u64, call: OutboundCall) {
        let previous = self.entries.insert(id, Entry::Outbound(call));
        debug_assert!(previous.is_none(), "transaction id {id} reused");
    }

    pub(crate) fn insert_inbound(&mut self, id: u64) {
        let previous = self.entries.insert(id, Entry::Inbound);
        debug_assert!(previous.is_none(), "transaction id {id} reused");
    }

    pub(crate) fn direction(&self, id: u64) -> Option<Direction> {
        self.entries.get(&id).map(|entry| match entry {
            Entry::Outbound(_) => Direction::Outbound,
            Entry::Inbound => Direction::Inbound,
        })
    }

    /// Looks up the local callable registered for a progress frame.
    /// `None` covers every mismatch: unknown id, inbound direction,
    /// undeclared callback name.
    pub(crate) fn progress_callback(&self, id: u64, name: &str) -> Option<ProgressCallback> {
        match self.entries.get(&id) {
            Some(Entry::Outbound(call)) => call.callbacks.get(name).map(Rc::clone),
            _ => None,
        }
    }

    /// Removes an outbound entry for final-response delivery.
    ///
    /// Leaves inbound entries in place: a final-response frame aimed at
    /// an inbound id has the wrong direction and must be dropped.
    pub(crate) fn take_outbound(&mut self, id: u64) -> Option<OutboundCall> {
        if !matches!(self.entries.get(&id), Some(Entry::Outbound(_))) {
            return None;
        }
        match self.entries.remove(&id) {
            Some(Entry::Outbound(call)) => Some(call),
            _ => None,
        }
    }

    /// Removes an inbound entry for handler-side finalization.
    pub(crate) fn take_inbound(&mut self, id: u64) -> Result<(), ChannelError> {
        match self.entries.get(&id) {
            Some(Entry::Inbound) => {
                self.entries.remove(&id);
                Ok(())
            }
            Some(Entry::Outbound(_)) => Err(ChannelError::NotInbound(id)),
            None => Err(ChannelError::StaleTransaction(id)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Control handle for a request the peer made of us.
///
/// The handler receives one of these per inbound request. It emits
/// progress values under the caller's declared callback paths, and
/// finalizes the transaction exactly once — either implicitly (the
/// handler's return value becomes the success payload) or explicitly
/// via [`complete`](Self::complete) / [`error`](Self::error) after
/// opting out of auto-completion with
/// [`delay_return`](Self::delay_return).
///
/// The handle stays valid across turns of the host event loop, which
/// is what makes asynchronous completion work: store the `Rc`, return
/// from the handler, finalize later.
pub struct Transaction {
    id: u64,
    channel: Weak<Channel>,
    callbacks: Vec<String>,
    delayed: Cell<bool>,
    done: Cell<bool>,
}

impl Transaction {
    pub(crate) fn new(id: u64, channel: Weak<Channel>, callbacks: Vec<String>) -> Rc<Self> {
        Rc::new(Self {
            id,
            channel,
            callbacks,
            delayed: Cell::new(false),
            done: Cell::new(false),
        })
    }

    /// The transaction id, as allocated by the caller.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Emits a progress value under one of the caller's declared
    /// callback paths. The transaction stays open.
    ///
    /// # Errors
    ///
    /// [`ChannelError::UnknownCallback`] when the caller did not
    /// declare `callback`; [`ChannelError::StaleTransaction`] when the
    /// channel is gone.
    pub fn invoke(&self, callback: &str, value: Value) -> Result<(), ChannelError> {
        if !self.callbacks.iter().any(|declared| declared == callback) {
            return Err(ChannelError::UnknownCallback(callback.to_string()));
        }
        let channel = self
            .channel
            .upgrade()
            .ok_or(ChannelError::StaleTransaction(self.id))?;
        channel.post_progress(self.id, callback, value);
        Ok(())
    }

    /// Finalizes the transaction with a success payload.
    ///
    /// # Errors
    ///
    /// [`ChannelError::StaleTransaction`] when the transaction was
    /// already finalized or the channel is gone;
    /// [`ChannelError::NotInbound`] when the id belongs to a call this
    /// side issued.
    pub fn complete(&self, result: Value) -> Result<(), ChannelError> {
        let channel = self
            .channel
            .upgrade()
            .ok_or(ChannelError::StaleTransaction(self.id))?;
        channel.finish_inbound(self.id, Ok(result))?;
        self.done.set(true);
        Ok(())
    }

    /// Finalizes the transaction with an error reply.
    ///
    /// # Errors
    ///
    /// Same conditions as [`complete`](Self::complete).
    pub fn error(&self, code: &str, message: &str) -> Result<(), ChannelError> {
        let channel = self
            .channel
            .upgrade()
            .ok_or(ChannelError::StaleTransaction(self.id))?;
        channel.finish_inbound(self.id, Err((code.to_string(), message.to_string())))?;
        self.done.set(true);
        Ok(())
    }

    /// Opts out of auto-completion: the handler's return value is
    /// discarded and the handler must finalize asynchronously.
    pub fn delay_return(&self, delay: bool) {
        self.delayed.set(delay);
    }

    /// True once the transaction has been finalized through this
    /// handle.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.done.get()
    }

    pub(crate) fn delayed(&self) -> bool {
        self.delayed.get()
    }

    /// The callback paths the caller declared.
    #[must_use]
    pub fn callbacks(&self) -> &[String] {
        &self.callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound_call() -> OutboundCall {
        OutboundCall {
            success: Box::new(|_| {}),
            error: None,
            callbacks: HashMap::new(),
        }
    }

    #[test]
    fn test_table_directions() {
        let mut table = TransactionTable::new();
        table.insert_outbound(2, outbound_call());
        table.insert_inbound(3);

        assert_eq!(table.direction(2), Some(Direction::Outbound));
        assert_eq!(table.direction(3), Some(Direction::Inbound));
        assert_eq!(table.direction(4), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_take_outbound_refuses_inbound_entries() {
        let mut table = TransactionTable::new();
        table.insert_inbound(3);

        assert!(table.take_outbound(3).is_none());
        assert_eq!(table.direction(3), Some(Direction::Inbound));
    }

    #[test]
    fn test_take_inbound_reports_direction_mismatch() {
        let mut table = TransactionTable::new();
        table.insert_outbound(2, outbound_call());

        assert!(matches!(
            table.take_inbound(2),
            Err(ChannelError::NotInbound(2))
        ));
        assert!(matches!(
            table.take_inbound(9),
            Err(ChannelError::StaleTransaction(9))
        ));
        table.take_inbound(2).unwrap_err();
        assert_eq!(table.direction(2), Some(Direction::Outbound));
    }

    #[test]
    fn test_progress_lookup_covers_mismatches() {
        let mut table = TransactionTable::new();
        let mut call = outbound_call();
        call.callbacks
            .insert("cb".to_string(), Rc::new(|_| {}) as ProgressCallback);
        table.insert_outbound(2, call);
        table.insert_inbound(3);

        assert!(table.progress_callback(2, "cb").is_some());
        assert!(table.progress_callback(2, "other").is_none());
        assert!(table.progress_callback(3, "cb").is_none());
        assert!(table.progress_callback(9, "cb").is_none());
    }

    #[test]
    fn test_final_reply_removes_entry() {
        let mut table = TransactionTable::new();
        table.insert_outbound(2, outbound_call());
        assert!(table.take_outbound(2).is_some());
        assert_eq!(table.direction(2), None);
        assert!(table.take_outbound(2).is_none());
    }

    #[test]
    fn test_invoke_requires_declared_callback() {
        let trans = Transaction::new(1, Weak::new(), vec!["cb".to_string()]);
        assert!(matches!(
            trans.invoke("nope", Value::Null),
            Err(ChannelError::UnknownCallback(_))
        ));
        // Declared name, but the channel is gone.
        assert!(matches!(
            trans.invoke("cb", Value::Null),
            Err(ChannelError::StaleTransaction(1))
        ));
    }

    #[test]
    fn test_detached_transaction_is_stale() {
        let trans = Transaction::new(1, Weak::new(), vec![]);
        assert!(matches!(
            trans.complete(Value::Null),
            Err(ChannelError::StaleTransaction(1))
        ));
        assert!(!trans.completed());
    }

    #[test]
    fn test_delay_return_flag() {
        let trans = Transaction::new(1, Weak::new(), vec![]);
        assert!(!trans.delayed());
        trans.delay_return(true);
        assert!(trans.delayed());
        trans.delay_return(false);
        assert!(!trans.delayed());
    }
}
