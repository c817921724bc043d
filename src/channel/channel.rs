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

//! The channel itself: dispatcher, ready gate, and public surface.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error};

use crate::channel::config::{ChannelConfig, FrameObserver, ReadyHook, Scope};
use crate::channel::error::ChannelError;
use crate::channel::handler::{HandlerError, RequestHandler};
use crate::channel::handshake::{
    IdAllocator, PING, PONG, READY_METHOD, ReadyGate, Role, identity_token,
};
use crate::channel::transaction::{
    Direction, ErrorContinuation, OutboundCall, SuccessContinuation, Transaction, TransactionTable,
};
use crate::frame::Frame;
use crate::origin::Origin;
use crate::params::{self, Params, ProgressCallback};
use crate::substrate::Substrate;

/// An outbound call, assembled with the builder idiom.
///
/// The method name and a success continuation are required; parameters
/// (which may carry callables at arbitrary depths) and an error
/// continuation are optional.
///
/// # Example
///
/// ```rust,no_run
/// use framechan::{Call, Params};
/// use serde_json::json;
///
/// let call = Call::new("search")
///     .params(Params::map([
///         ("query", Params::from(json!("rust"))),
///         ("progress", Params::callback(|value| println!("… {value}"))),
///     ]))
///     .on_success(|result| println!("done: {result}"))
///     .on_error(|code, message| eprintln!("{code}: {message}"));
/// # let _ = call;
/// ```
pub struct Call {
    method: String,
    params: Params,
    success: Option<SuccessContinuation>,
    error: Option<ErrorContinuation>,
}

impl Call {
    /// Starts a call to the named method.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Params::default(),
            success: None,
            error: None,
        }
    }

    /// Sets the parameter tree.
    #[must_use]
    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }

    /// Sets the continuation fired once with the final success
    /// payload. Required.
    #[must_use]
    pub fn on_success(mut self, success: impl FnOnce(Value) + 'static) -> Self {
        self.success = Some(Box::new(success));
        self
    }

    /// Sets the continuation fired once with a final `(code, message)`
    /// error reply.
    #[must_use]
    pub fn on_error(mut self, error: impl FnOnce(String, String) + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }
}

/// How an accepted frame routes to its consumer.
enum Route {
    /// Method-routed (request or notification), descoped.
    Method(String),
    /// Id-routed toward one of our outbound transactions.
    Reply,
}

/// Mutable channel state; one borrow at a time, and never held across
/// a user-callback invocation.
struct ChannelState {
    registry: HashMap<String, RequestHandler>,
    table: TransactionTable,
    ids: IdAllocator,
    gate: ReadyGate,
    destroyed: bool,
}

/// One endpoint of an RPC channel between two isolated contexts.
///
/// A channel is built against a substrate handle to its peer context
/// and an expected peer identity. It becomes *ready* once the two-step
/// `__ready` handshake completes; until then, outbound traffic is
/// buffered and flushed in FIFO order. Inbound payloads are pushed in
/// by the host through [`deliver`](Self::deliver), one at a time.
///
/// Channels are single-threaded by design: handlers and continuations
/// are plain closures invoked from the host's event dispatch, and the
/// handle is `Rc`-shared, not `Send`.
///
/// # Example
///
/// ```rust,no_run
/// use framechan::{Call, Channel, ChannelConfig};
/// use framechan::substrate::memory::MemoryContext;
/// use serde_json::json;
///
/// let (local, remote) = MemoryContext::pair("https://a.example", "https://b.example");
///
/// let channel = Channel::build(ChannelConfig::new(local.peer(), "https://b.example"))?;
/// local.attach(&channel);
///
/// channel.bind("greet", |_trans, params| {
///     Ok(json!(format!("hello, {}", params.into_value())))
/// })?;
///
/// channel.call(
///     Call::new("version")
///         .on_success(|result| println!("peer runs {result}")),
/// )?;
/// # Ok::<(), framechan::ChannelError>(())
/// ```
pub struct Channel {
    weak_self: Weak<Channel>,
    peer: Rc<dyn Substrate>,
    origin: Origin,
    scope: Scope,
    debug: bool,
    post_observer: Option<FrameObserver>,
    recv_observer: Option<FrameObserver>,
    on_ready: RefCell<Option<ReadyHook>>,
    identity: RefCell<String>,
    state: RefCell<ChannelState>,
}

impl Channel {
    /// Builds a channel from its configuration and posts the readiness
    /// probe.
    ///
    /// The handshake ping bypasses the pending queue; everything else
    /// waits for ready.
    ///
    /// # Errors
    ///
    /// [`ChannelError::SelfPeer`] when the peer handle loops back to
    /// the local context, [`ChannelError::BadOrigin`] when the
    /// expected identity does not canonicalize, and
    /// [`ChannelError::BadScope`] when the scope label contains the
    /// reserved `::` separator.
    pub fn build(config: ChannelConfig) -> Result<Rc<Self>, ChannelError> {
        if config.peer.is_loopback() {
            return Err(ChannelError::SelfPeer);
        }
        let origin = Origin::parse(&config.origin)?;
        let scope = Scope::new(config.scope)?;

        let channel = Rc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            peer: config.peer,
            origin,
            scope,
            debug: config.debug,
            post_observer: config.post_observer,
            recv_observer: config.recv_observer,
            on_ready: RefCell::new(config.on_ready),
            identity: RefCell::new(identity_token()),
            state: RefCell::new(ChannelState {
                registry: HashMap::new(),
                table: TransactionTable::new(),
                ids: IdAllocator::seeded(),
                gate: ReadyGate::new(),
                destroyed: false,
            }),
        });

        channel.post(
            Frame::Notification {
                method: channel.scope.apply(READY_METHOD),
                params: Value::String(PING.to_string()),
            },
            true,
        );
        Ok(channel)
    }

    /// Binds a handler under a method name.
    ///
    /// At most one handler per name; the reserved `__ready` name is
    /// held by the runtime and reads as already bound. On a destroyed
    /// channel this is a no-op.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidMethod`] for an empty name,
    /// [`ChannelError::MethodBound`] when a handler is already bound.
    pub fn bind(
        &self,
        method: &str,
        handler: impl Fn(Option<Rc<Transaction>>, Params) -> Result<Value, HandlerError> + 'static,
    ) -> Result<(), ChannelError> {
        if self.guard_destroyed("bind") {
            return Ok(());
        }
        if method.is_empty() {
            return Err(ChannelError::InvalidMethod);
        }
        if method == READY_METHOD {
            return Err(ChannelError::MethodBound(method.to_string()));
        }
        let mut state = self.state.borrow_mut();
        if state.registry.contains_key(method) {
            return Err(ChannelError::MethodBound(method.to_string()));
        }
        state.registry.insert(method.to_string(), Rc::new(handler));
        Ok(())
    }

    /// Removes the handler bound under a method name. Returns whether
    /// one was bound.
    pub fn unbind(&self, method: &str) -> bool {
        if self.guard_destroyed("unbind") {
            return false;
        }
        self.state.borrow_mut().registry.remove(method).is_some()
    }

    /// Issues a call to the peer.
    ///
    /// Callables in the parameter tree are marshaled into callback
    /// paths; the success (and optional error) continuation fires
    /// at most once when the peer finalizes the transaction, possibly
    /// after any number of progress callbacks, in the order the peer
    /// emitted them. The channel imposes no timeout; only
    /// [`destroy`](Self::destroy) cancels in-flight calls. On a
    /// destroyed channel this is a no-op and the continuations are
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidMethod`] for an empty method name,
    /// [`ChannelError::MissingSuccess`] when no success continuation
    /// was set.
    pub fn call(&self, call: Call) -> Result<(), ChannelError> {
        if self.guard_destroyed("call") {
            return Ok(());
        }
        if call.method.is_empty() {
            return Err(ChannelError::InvalidMethod);
        }
        let success = call.success.ok_or(ChannelError::MissingSuccess)?;

        let extracted = params::extract(call.params);
        let frame = {
            let mut state = self.state.borrow_mut();
            let id = state.ids.allocate();
            state.table.insert_outbound(
                id,
                OutboundCall {
                    success,
                    error: call.error,
                    callbacks: extracted.callbacks,
                },
            );
            Frame::Request {
                id,
                method: self.scope.apply(&call.method),
                params: extracted.value,
                callbacks: extracted.paths,
            }
        };
        self.post(frame, false);
        Ok(())
    }

    /// Posts a fire-and-forget notification.
    ///
    /// Notifications carry no transaction id, so nothing comes back:
    /// no result, no error, no progress. On a destroyed channel this
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidMethod`] for an empty method name.
    pub fn notify(&self, method: &str, params: Value) -> Result<(), ChannelError> {
        if self.guard_destroyed("notify") {
            return Ok(());
        }
        if method.is_empty() {
            return Err(ChannelError::InvalidMethod);
        }
        self.post(
            Frame::Notification {
                method: self.scope.apply(method),
                params,
            },
            false,
        );
        Ok(())
    }

    /// Tears the channel down.
    ///
    /// Clears the handler registry, the transaction table (in-flight
    /// continuations will never fire), and the pending-send buffer.
    /// After destroy, every operation is a best-effort no-op and
    /// [`deliver`](Self::deliver) ignores all frames, which is how the
    /// substrate listener detaches. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.registry.clear();
            state.table.clear();
            state.gate.clear();
        }
        self.debug_log("channel destroyed");
    }

    /// Feeds one inbound payload into the channel.
    ///
    /// The host's substrate glue calls this for each
    /// `(payload, sender identity)` event, one at a time. The return
    /// value says whether this channel consumed the frame; a host
    /// multiplexing several channels over one substrate should stop
    /// dispatch at the first channel that returns `true`, so every
    /// frame has exactly one consumer.
    ///
    /// Frames that fail the origin check, fail to parse, carry a
    /// foreign scope, or reference no outbound transaction of this
    /// channel are not consumed; mismatches are logged at debug level
    /// and never answered, so a misbehaving peer cannot amplify
    /// traffic.
    pub fn deliver(&self, payload: &str, sender: &str) -> bool {
        if self.state.borrow().destroyed {
            return false;
        }
        if !self.origin.matches(sender) {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                sender,
                "frame dropped: origin mismatch"
            );
            return false;
        }
        let frame = match Frame::parse(payload) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    %err,
                    "frame dropped: unparseable payload"
                );
                return false;
            }
        };

        let route = match &frame {
            Frame::Request { method, .. } | Frame::Notification { method, .. } => {
                match self.scope.strip(method) {
                    Some(local) => Route::Method(local.to_string()),
                    None => {
                        debug!(
                            target: "framechan",
                            channel = %self.identity.borrow(),
                            method,
                            "frame dropped: scope mismatch"
                        );
                        return false;
                    }
                }
            }
            Frame::Progress { id, .. } | Frame::Success { id, .. } | Frame::Failure { id, .. } => {
                if self.state.borrow().table.direction(*id) != Some(Direction::Outbound) {
                    debug!(
                        target: "framechan",
                        channel = %self.identity.borrow(),
                        id,
                        "frame dropped: no matching outbound transaction"
                    );
                    return false;
                }
                Route::Reply
            }
        };

        if let Some(observer) = &self.recv_observer {
            observer(sender, &frame);
        }
        if self.debug {
            self.debug_log(&format!("recv message: {}", frame.encode()));
        }

        match (frame, route) {
            (
                Frame::Request {
                    id,
                    params,
                    callbacks,
                    ..
                },
                Route::Method(method),
            ) => self.dispatch_request(id, &method, params, callbacks),
            (Frame::Notification { params, .. }, Route::Method(method)) => {
                self.dispatch_notification(&method, params);
            }
            (
                Frame::Progress {
                    id,
                    callback,
                    params,
                },
                Route::Reply,
            ) => self.dispatch_progress(id, &callback, params),
            (Frame::Success { id, result }, Route::Reply) => self.dispatch_final(id, Ok(result)),
            (Frame::Failure { id, error, message }, Route::Reply) => {
                self.dispatch_final(id, Err((error, message)));
            }
            _ => {}
        }
        true
    }

    /// The channel's opaque log identity: a random token plus the role
    /// suffix (`-R`/`-L`) once the handshake settles.
    #[must_use]
    pub fn identity(&self) -> String {
        self.identity.borrow().clone()
    }

    /// True once the ready handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().gate.is_ready()
    }

    /// True once [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Number of in-flight transactions, both directions.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.state.borrow().table.len()
    }

    // ---- inbound dispatch ------------------------------------------------

    fn dispatch_request(&self, id: u64, method: &str, params: Value, callback_paths: Vec<String>) {
        let handler = match self.state.borrow().registry.get(method) {
            Some(handler) => Rc::clone(handler),
            None => {
                debug!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    method,
                    "request ignored: no handler bound"
                );
                return;
            }
        };

        if self.state.borrow().table.direction(id).is_some() {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                id,
                "request dropped: transaction id already in flight"
            );
            return;
        }
        self.state.borrow_mut().table.insert_inbound(id);
        let trans = Transaction::new(id, self.weak_self.clone(), callback_paths.clone());

        let proxy_trans = Rc::clone(&trans);
        let params = params::install(params, &callback_paths, move |path| {
            let trans = Rc::clone(&proxy_trans);
            Rc::new(move |value: Value| {
                if let Err(err) = trans.invoke(&path, value) {
                    debug!(target: "framechan", %err, "progress emit dropped");
                }
            }) as ProgressCallback
        });

        match handler(Some(Rc::clone(&trans)), params) {
            Ok(result) => {
                if !trans.delayed() && !trans.completed() {
                    if let Err(err) = trans.complete(result) {
                        debug!(
                            target: "framechan",
                            channel = %self.identity.borrow(),
                            id,
                            %err,
                            "auto-completion skipped"
                        );
                    }
                }
            }
            Err(failure) => {
                if !trans.completed() {
                    let (code, message) = failure.into_wire();
                    if let Err(err) = trans.error(&code, &message) {
                        debug!(
                            target: "framechan",
                            channel = %self.identity.borrow(),
                            id,
                            %err,
                            "error reply skipped"
                        );
                    }
                }
            }
        }
    }

    fn dispatch_notification(&self, method: &str, params: Value) {
        if method == READY_METHOD {
            self.handle_ready(&params);
            return;
        }
        let handler = match self.state.borrow().registry.get(method) {
            Some(handler) => Rc::clone(handler),
            None => {
                debug!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    method,
                    "notification ignored: no handler bound"
                );
                return;
            }
        };
        // Fire and forget: the return value is discarded, and a failure
        // produces no outbound frame.
        if let Err(failure) = handler(None, Params::from(params)) {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                method,
                ?failure,
                "notification handler failed"
            );
        }
    }

    fn dispatch_progress(&self, id: u64, callback: &str, params: Value) {
        let progress = self.state.borrow().table.progress_callback(id, callback);
        match progress {
            Some(progress) => progress(params),
            None => {
                debug!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    id,
                    callback,
                    "progress dropped: callback not registered"
                );
            }
        }
    }

    fn dispatch_final(&self, id: u64, outcome: Result<Value, (String, String)>) {
        let call = self.state.borrow_mut().table.take_outbound(id);
        let Some(call) = call else {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                id,
                "final response dropped: transaction not outbound"
            );
            return;
        };
        match outcome {
            Ok(result) => (call.success)(result),
            Err((code, message)) => match call.error {
                Some(on_error) => on_error(code, message),
                None => {
                    debug!(
                        target: "framechan",
                        channel = %self.identity.borrow(),
                        id,
                        code,
                        message,
                        "error reply discarded: no error continuation"
                    );
                }
            },
        }
    }

    // ---- handshake -------------------------------------------------------

    fn handle_ready(&self, params: &Value) {
        let role = match params.as_str() {
            Some(PING) => Role::PingReceiver,
            Some(PONG) => Role::PongReceiver,
            _ => {
                debug!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    "handshake dropped: unrecognized payload"
                );
                return;
            }
        };

        let queued = {
            let mut state = self.state.borrow_mut();
            if state.gate.is_ready() {
                debug_assert!(false, "second __ready received while ready");
                error!(
                    target: "framechan",
                    channel = %self.identity.borrow(),
                    "protocol violation: __ready received while already ready"
                );
                return;
            }
            state.ids.align(role.parity());
            state.gate.open()
        };

        self.identity.borrow_mut().push_str(role.identity_suffix());
        self.debug_log("handshake complete");

        if role == Role::PingReceiver {
            self.post(
                Frame::Notification {
                    method: self.scope.apply(READY_METHOD),
                    params: Value::String(PONG.to_string()),
                },
                true,
            );
        }
        for frame in queued {
            self.post(frame, false);
        }
        if let Some(hook) = self.on_ready.borrow_mut().take() {
            if let Some(channel) = self.weak_self.upgrade() {
                hook(&channel);
            }
        }
    }

    // ---- outbound path ---------------------------------------------------

    /// Hands a frame to the substrate, or buffers it until ready.
    ///
    /// Only the handshake posts with `force`.
    fn post(&self, frame: Frame, force: bool) {
        let ready = {
            let state = self.state.borrow();
            if state.destroyed {
                return;
            }
            state.gate.is_ready()
        };
        if !force && !ready {
            if self.debug {
                self.debug_log(&format!("queue message: {}", frame.encode()));
            }
            self.state.borrow_mut().gate.enqueue(frame);
            return;
        }

        if let Some(observer) = &self.post_observer {
            observer(self.origin.as_str(), &frame);
        }
        let payload = frame.encode();
        if self.debug {
            self.debug_log(&format!("post message: {payload}"));
        }
        if let Err(err) = self.peer.post(&payload, self.origin.as_str()) {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                %err,
                "post failed; payload lost"
            );
        }
    }

    /// Emits a progress frame for an inbound transaction.
    pub(crate) fn post_progress(&self, id: u64, callback: &str, params: Value) {
        self.post(
            Frame::Progress {
                id,
                callback: callback.to_string(),
                params,
            },
            false,
        );
    }

    /// Finalizes an inbound transaction and posts the response.
    pub(crate) fn finish_inbound(
        &self,
        id: u64,
        outcome: Result<Value, (String, String)>,
    ) -> Result<(), ChannelError> {
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return Err(ChannelError::StaleTransaction(id));
            }
            state.table.take_inbound(id)?;
        }
        let frame = match outcome {
            Ok(result) => Frame::Success { id, result },
            Err((error, message)) => Frame::Failure { id, error, message },
        };
        self.post(frame, false);
        Ok(())
    }

    // ---- logging ---------------------------------------------------------

    fn guard_destroyed(&self, operation: &str) -> bool {
        let destroyed = self.state.borrow().destroyed;
        if destroyed {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                operation,
                "operation ignored: channel is destroyed"
            );
        }
        destroyed
    }

    fn debug_log(&self, message: &str) {
        if self.debug {
            debug!(
                target: "framechan",
                channel = %self.identity.borrow(),
                "{message}"
            );
        }
    }
}
