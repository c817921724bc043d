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

//! Parameter trees and the callback marshaler.
//!
//! Call parameters are JSON-shaped data that may carry live callables
//! at arbitrary depths. The wire format is pure data, so callables are
//! marshaled: on the sending side every callable is pruned out of the
//! tree and recorded under its slash-joined path; on the receiving side
//! a synthetic callable is grafted back at each declared path, wired to
//! emit progress frames toward the caller.
//!
//! Rather than mutating an untyped object graph, [`Params`] models the
//! possibility of a callable explicitly as one variant of a sum type.
//! Handlers receive a `Params` tree and can fetch the synthetic
//! callables with [`Params::callback_at`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// A callable embedded in a parameter tree.
///
/// On the caller's side this is application code receiving progress
/// values; on the callee's side it is a synthetic proxy that posts a
/// progress frame back to the caller.
pub type ProgressCallback = Rc<dyn Fn(Value)>;

/// A JSON-shaped parameter tree that may contain callables.
///
/// # Example
///
/// ```rust
/// use framechan::Params;
/// use serde_json::json;
///
/// let params = Params::map([
///     ("query", Params::from(json!("rust"))),
///     ("progress", Params::callback(|value| println!("{value}"))),
/// ]);
/// assert_eq!(params.callback_paths(), vec!["progress".to_string()]);
/// ```
pub enum Params {
    /// A plain JSON leaf (including nested pure-data objects/arrays).
    Value(Value),
    /// A callable.
    Callback(ProgressCallback),
    /// An object whose members may themselves carry callables.
    Map(BTreeMap<String, Params>),
    /// An array whose elements may themselves carry callables.
    List(Vec<Params>),
}

impl Params {
    /// Wraps a callable as a parameter node.
    pub fn callback(f: impl Fn(Value) + 'static) -> Self {
        Self::Callback(Rc::new(f))
    }

    /// Builds an object node from `(key, value)` entries.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Params)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Builds an array node from elements.
    pub fn list(entries: impl IntoIterator<Item = Params>) -> Self {
        Self::List(entries.into_iter().collect())
    }

    /// Returns the node at a slash-joined path, if any.
    ///
    /// The empty path addresses the root. Only [`Params::Map`] and
    /// [`Params::List`] containers are navigable; a pure-data subtree
    /// is one [`Params::Value`] leaf and is addressed as such.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Params> {
        if path.is_empty() {
            return Some(self);
        }
        let mut node = self;
        for key in path.split('/') {
            node = match node {
                Self::Map(map) => map.get(key)?,
                Self::List(list) => list.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Returns the callable at a slash-joined path, if one is there.
    #[must_use]
    pub fn callback_at(&self, path: &str) -> Option<ProgressCallback> {
        match self.get(path)? {
            Self::Callback(f) => Some(Rc::clone(f)),
            _ => None,
        }
    }

    /// Returns the slash-joined paths of every callable in the tree,
    /// in deterministic (sorted-key) order.
    #[must_use]
    pub fn callback_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(self, String::new(), &mut paths);
        paths
    }

    /// Converts the tree into plain JSON.
    ///
    /// Callables carry no data representation; they become `null`, the
    /// same way they are pruned from the wire form.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Callback(_) => Value::Null,
            Self::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
            Self::List(list) => Value::Array(list.into_iter().map(Params::into_value).collect()),
        }
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::Value(Value::Null)
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Callback(_) => write!(f, "<callback>"),
            Self::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Self::List(list) => f.debug_list().entries(list.iter()).finish(),
        }
    }
}

fn collect_paths(node: &Params, prefix: String, out: &mut Vec<String>) {
    match node {
        Params::Value(_) => {}
        Params::Callback(_) => out.push(prefix),
        Params::Map(map) => {
            for (key, child) in map {
                collect_paths(child, join(&prefix, key), out);
            }
        }
        Params::List(list) => {
            for (index, child) in list.iter().enumerate() {
                collect_paths(child, join(&prefix, &index.to_string()), out);
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

/// Result of pruning the callables out of an outbound parameter tree.
pub(crate) struct Extracted {
    /// The pure-data tree, callables replaced as pruned.
    pub value: Value,
    /// Paths of the pruned callables, in deterministic order.
    pub paths: Vec<String>,
    /// The pruned callables, keyed by path.
    pub callbacks: HashMap<String, ProgressCallback>,
}

/// Walks an outbound tree, pruning callables and recording their paths.
///
/// Object members holding a callable are removed; array slots become
/// `null` (arrays are walked as objects, and JSON arrays have no
/// holes). The root itself being a callable yields the empty path and
/// a `null` wire value.
pub(crate) fn extract(params: Params) -> Extracted {
    let mut extracted = Extracted {
        value: Value::Null,
        paths: Vec::new(),
        callbacks: HashMap::new(),
    };
    extracted.value = prune(params, String::new(), &mut extracted);
    extracted
}

fn prune(node: Params, prefix: String, out: &mut Extracted) -> Value {
    match node {
        Params::Value(value) => value,
        Params::Callback(f) => {
            out.paths.push(prefix.clone());
            out.callbacks.insert(prefix, f);
            Value::Null
        }
        Params::Map(map) => {
            let mut object = serde_json::Map::new();
            for (key, child) in map {
                let path = join(&prefix, &key);
                if let Params::Callback(f) = child {
                    out.paths.push(path.clone());
                    out.callbacks.insert(path, f);
                } else {
                    object.insert(key, prune(child, path, out));
                }
            }
            Value::Object(object)
        }
        Params::List(list) => Value::Array(
            list.into_iter()
                .enumerate()
                .map(|(index, child)| prune(child, join(&prefix, &index.to_string()), out))
                .collect(),
        ),
    }
}

/// Rebuilds an inbound parameter tree, grafting a synthetic callable at
/// each declared path.
///
/// Intermediate objects are created when a declared path points into a
/// part of the tree the pruning removed. `make` receives the path and
/// returns the proxy to install there.
pub(crate) fn install(
    value: Value,
    paths: &[String],
    make: impl Fn(String) -> ProgressCallback,
) -> Params {
    let mut root = from_value(value);
    for path in paths {
        graft(&mut root, path, make(path.clone()));
    }
    root
}

fn from_value(value: Value) -> Params {
    match value {
        Value::Object(map) => Params::Map(
            map.into_iter()
                .map(|(key, child)| (key, from_value(child)))
                .collect(),
        ),
        Value::Array(list) => Params::List(list.into_iter().map(from_value).collect()),
        leaf => Params::Value(leaf),
    }
}

fn graft(node: &mut Params, path: &str, callback: ProgressCallback) {
    if path.is_empty() {
        *node = Params::Callback(callback);
        return;
    }
    let (key, rest) = match path.split_once('/') {
        Some((key, rest)) => (key, rest),
        None => (path, ""),
    };
    match node {
        Params::Map(map) => {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| Params::Map(BTreeMap::new()));
            graft(slot, rest, callback);
        }
        Params::List(list) => {
            if let Some(slot) = key.parse::<usize>().ok().and_then(|i| list.get_mut(i)) {
                graft(slot, rest, callback);
            }
        }
        other => {
            // The pruning left a leaf (typically null) where the path
            // expects a container; replace it and descend.
            *other = Params::Map(BTreeMap::new());
            graft(other, path, callback);
        }
    }
}
