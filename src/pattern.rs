// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compiled pattern and dispatch table types.
//!
//! Nothing in this module parses the textual DSL; see [`crate::compiler`] for
//! that. This module only defines the normalized shapes the compiler produces
//! and the matcher consumes.

use crate::constraint::Constraint;
use crate::intern::Atom;

/// One element of a compiled segment pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// An exact byte string the token must equal.
    Literal(Vec<u8>),
    /// Matches any single token, without capturing it.
    AnyOne,
    /// Matches any single token and records it under the given binding name.
    Bind(Atom),
    /// Matches zero or more trailing tokens. Only ever the last element of a
    /// compiled segment list; the compiler guarantees this.
    Rest,
}

/// A compiled host or path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pattern {
    /// Matches everything; incompatible with a non-empty constraint list.
    Any,
    /// Matches only the literal request-target `*` (HTTP `OPTIONS *`). Only
    /// meaningful for path patterns.
    Asterisk,
    /// An ordered sequence of segment patterns, matched token by token.
    Segments(Vec<Segment>),
}

/// A compiled path rule: pattern, constraints, and the opaque handler payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathRule<H, O> {
    pub(crate) pattern: Pattern,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) handler: H,
    pub(crate) opts: O,
}

/// A compiled host rule: pattern, constraints, and its ordered path rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostRule<H, O> {
    pub(crate) pattern: Pattern,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) paths: Vec<PathRule<H, O>>,
}

/// The compiled, immutable dispatch table.
///
/// Built once by [`crate::compiler::compile`], then read concurrently by
/// [`crate::matcher`] without locks: every field here is only ever read after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable<H, O = ()> {
    pub(crate) interner: crate::intern::Interner,
    pub(crate) hosts: Vec<HostRule<H, O>>,
}

impl<H, O> DispatchTable<H, O> {
    /// Returns the number of compiled host rules, after bracket expansion.
    pub fn host_rule_count(&self) -> usize {
        self.hosts.len()
    }
}
