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

//! Channel configuration.

use std::rc::Rc;

use crate::channel::{Channel, ChannelError};
use crate::frame::Frame;
use crate::substrate::Substrate;

/// An observer tap on frame traffic.
///
/// Receives the relevant identity (the target origin for posts, the
/// sender identity for receives) and an immutable view of the frame.
/// Observers are taps, not filters: they cannot alter the frame.
pub type FrameObserver = Rc<dyn Fn(&str, &Frame)>;

/// Hook invoked once, when the channel enters ready.
pub type ReadyHook = Rc<dyn Fn(&Rc<Channel>)>;

/// Configuration for building a [`Channel`].
///
/// Follows the builder idiom: the two required pieces (peer handle and
/// expected peer identity) go into [`ChannelConfig::new`], everything
/// else is layered on with `with_*` methods, and validation happens in
/// [`Channel::build`].
///
/// # Example
///
/// ```rust,no_run
/// use framechan::{Channel, ChannelConfig};
/// use framechan::substrate::memory::MemoryContext;
///
/// let (local, _remote) = MemoryContext::pair("https://a.example", "https://b.example");
/// let channel = Channel::build(
///     ChannelConfig::new(local.peer(), "https://b.example")
///         .with_scope("search")
///         .with_debug(true)
///         .with_on_ready(|channel| println!("{} is ready", channel.identity())),
/// )?;
/// # Ok::<(), framechan::ChannelError>(())
/// ```
pub struct ChannelConfig {
    pub(crate) peer: Rc<dyn Substrate>,
    pub(crate) origin: String,
    pub(crate) scope: String,
    pub(crate) on_ready: Option<ReadyHook>,
    pub(crate) post_observer: Option<FrameObserver>,
    pub(crate) recv_observer: Option<FrameObserver>,
    pub(crate) debug: bool,
}

impl ChannelConfig {
    /// Creates a configuration with the required fields: the substrate
    /// handle to the peer context and the peer's expected identity
    /// (a specific origin, or the explicit wildcard `"*"`).
    pub fn new(peer: impl Substrate + 'static, origin: impl Into<String>) -> Self {
        Self {
            peer: Rc::new(peer),
            origin: origin.into(),
            scope: String::new(),
            on_ready: None,
            post_observer: None,
            recv_observer: None,
            debug: false,
        }
    }

    /// Sets the scope label multiplexing this channel onto the shared
    /// substrate. Must not contain the reserved separator `::`;
    /// validated at build.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the hook invoked once when the channel enters ready.
    #[must_use]
    pub fn with_on_ready(mut self, hook: impl Fn(&Rc<Channel>) + 'static) -> Self {
        self.on_ready = Some(Rc::new(hook));
        self
    }

    /// Sets the tap fired on every posted frame.
    #[must_use]
    pub fn with_post_observer(mut self, observer: impl Fn(&str, &Frame) + 'static) -> Self {
        self.post_observer = Some(Rc::new(observer));
        self
    }

    /// Sets the tap fired on every accepted inbound frame.
    #[must_use]
    pub fn with_recv_observer(mut self, observer: impl Fn(&str, &Frame) + 'static) -> Self {
        self.recv_observer = Some(Rc::new(observer));
        self
    }

    /// Enables the verbose debug log sink for this channel's traffic.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A validated scope label.
///
/// A scoped channel prepends `"<scope>::"` to outbound method names
/// and requires the same prefix on inbound ones; an empty scope passes
/// methods through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Scope(String);

/// The reserved scope separator.
pub(crate) const SCOPE_SEPARATOR: &str = "::";

impl Scope {
    pub(crate) fn new(label: impl Into<String>) -> Result<Self, ChannelError> {
        let label = label.into();
        if label.contains(SCOPE_SEPARATOR) {
            return Err(ChannelError::BadScope(label));
        }
        Ok(Self(label))
    }

    /// Produces the on-wire form of a method name.
    pub(crate) fn apply(&self, method: &str) -> String {
        if self.0.is_empty() {
            method.to_string()
        } else {
            format!("{}{}{}", self.0, SCOPE_SEPARATOR, method)
        }
    }

    /// Strips this scope from an on-wire method name, or rejects the
    /// frame by returning `None`.
    ///
    /// A scoped wire method must be exactly `<scope>::<method>`; extra
    /// separators are a mismatch.
    pub(crate) fn strip<'a>(&self, wire_method: &'a str) -> Option<&'a str> {
        if self.0.is_empty() {
            return Some(wire_method);
        }
        let (prefix, method) = wire_method.split_once(SCOPE_SEPARATOR)?;
        if prefix != self.0 || method.contains(SCOPE_SEPARATOR) {
            return None;
        }
        Some(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_rejects_separator() {
        assert!(matches!(
            Scope::new("a::b"),
            Err(ChannelError::BadScope(_))
        ));
        assert!(Scope::new("a:b").is_ok());
        assert!(Scope::new("").is_ok());
    }

    #[test]
    fn test_scope_apply_and_strip() {
        let scope = Scope::new("s").unwrap();
        assert_eq!(scope.apply("echo"), "s::echo");
        assert_eq!(scope.strip("s::echo"), Some("echo"));
        assert_eq!(scope.strip("t::echo"), None);
        assert_eq!(scope.strip("echo"), None);
    }

    #[test]
    fn test_empty_scope_passes_through() {
        let scope = Scope::new("").unwrap();
        assert_eq!(scope.apply("echo"), "echo");
        assert_eq!(scope.strip("echo"), Some("echo"));
        // An unscoped channel does not interpret separators.
        assert_eq!(scope.strip("s::echo"), Some("s::echo"));
    }

    #[test]
    fn test_scope_prefix_must_match_exactly() {
        let scope = Scope::new("s").unwrap();
        assert_eq!(scope.strip("ss::echo"), None);
        assert_eq!(scope.strip("s:echo"), None);
        // Exactly one separator: scope::method and nothing deeper.
        assert_eq!(scope.strip("s::a::b"), None);
    }
}
