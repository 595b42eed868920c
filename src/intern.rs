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

//! A small string interner for binding names.
//!
//! Binding names written in the routing DSL (`:id`, `:user`, ...) are compared
//! constantly during matching and constraint lookup. Interning them once at
//! compile time turns every later comparison into a cheap integer compare instead
//! of a byte-string compare, and lets one binding name be shared identically
//! between a host pattern and a path pattern in the same authored route.

use std::sync::Arc;

/// An interned binding name.
///
/// Two `Atom`s compare equal if and only if they were interned from
/// byte-identical names by the same [`Interner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Atom(u32);

/// Maps binding names to [`Atom`]s and back, de-duplicating by content.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Interner {
    names: Vec<Arc<str>>,
}

impl Interner {
    /// Creates an empty interner.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning its existing atom if already known.
    pub(crate) fn intern(&mut self, name: &str) -> Atom {
        if let Some(pos) = self.names.iter().position(|existing| &**existing == name) {
            return Atom(pos as u32);
        }
        self.names.push(Arc::from(name));
        Atom((self.names.len() - 1) as u32)
    }

    /// Resolves an atom back to its name.
    ///
    /// Panics if `atom` was not produced by this interner; the router's internal
    /// invariants guarantee this never happens in practice.
    pub(crate) fn name(&self, atom: Atom) -> Arc<str> {
        self.names[atom.0 as usize].clone()
    }
}
