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

//! Origin canonicalization and the inbound identity filter.
//!
//! Every inbound frame arrives with a sender identity supplied by the
//! substrate. A channel only accepts frames whose sender matches its
//! configured expected identity; everything else is dropped before the
//! payload is even parsed. The wildcard identity `"*"` disables the
//! filter and must be opted into explicitly — there is no implicit
//! wildcard default.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Errors produced while canonicalizing a configured origin.
#[derive(Debug, Error)]
pub enum OriginError {
    /// The configured origin was the empty string.
    #[error("origin must not be empty")]
    Empty,

    /// The configured origin did not parse as a URL.
    #[error("origin is not a valid URL: {0}")]
    Parse(#[from] url::ParseError),

    /// The URL has no tuple origin (e.g. `data:` or an opaque scheme),
    /// so it cannot identify a peer trust domain.
    #[error("origin `{0}` is opaque")]
    Opaque(String),
}

/// The expected identity of the peer context.
///
/// Built once from configuration; the input is canonicalized to
/// `scheme://host` plus any non-default port, discarding path, query,
/// and fragment. Sender identities supplied by the substrate are
/// assumed to already be in canonical form (that is what hosts
/// provide) and are compared exactly.
///
/// # Example
///
/// ```rust
/// use framechan::Origin;
///
/// let origin = Origin::parse("https://x.example:443/some/path").unwrap();
/// assert_eq!(origin.as_str(), "https://x.example");
/// assert!(origin.matches("https://x.example"));
/// assert!(!origin.matches("https://y.example"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Accept any sender. Only the literal `"*"` configures this.
    Wildcard,
    /// Accept exactly one canonical origin.
    Exact(String),
}

impl Origin {
    /// Parses and canonicalizes a configured origin string.
    ///
    /// # Errors
    ///
    /// Returns [`OriginError`] when the input is empty, unparseable,
    /// or has no tuple origin.
    pub fn parse(input: &str) -> Result<Self, OriginError> {
        if input.is_empty() {
            return Err(OriginError::Empty);
        }
        if input == "*" {
            return Ok(Self::Wildcard);
        }
        let url = Url::parse(input)?;
        match url.origin() {
            origin @ url::Origin::Tuple(..) => Ok(Self::Exact(origin.ascii_serialization())),
            url::Origin::Opaque(_) => Err(OriginError::Opaque(input.to_string())),
        }
    }

    /// Checks a sender identity against this expected identity.
    #[must_use]
    pub fn matches(&self, sender: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Exact(origin) => origin == sender,
        }
    }

    /// The canonical form, as used for the substrate's target-origin
    /// argument on every post (`"*"` for the wildcard).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wildcard => "*",
            Self::Exact(origin) => origin,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
