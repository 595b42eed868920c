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

//! Per-binding constraints evaluated after a pattern matches.

use std::fmt;
use std::sync::Arc;

use crate::intern::Atom;

/// A captured binding value.
///
/// Starts out as the raw matched bytes; a constraint may replace it, most
/// commonly with [`Value::Int`] once an `Integer` constraint has parsed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The raw bytes captured from the request, or a function constraint's
    /// byte-string replacement.
    Bytes(Vec<u8>),
    /// A value that has passed through an `Integer` constraint (or a function
    /// constraint that produced an integer).
    Int(i64),
}

impl Value {
    /// Returns the bytes that should be compared against when the same binding
    /// name is matched again later in the same request.
    fn comparison_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            Self::Bytes(bytes) => std::borrow::Cow::Borrowed(bytes),
            Self::Int(n) => std::borrow::Cow::Owned(n.to_string().into_bytes()),
        }
    }
}

/// The outcome a [`ConstraintFn`] reports for a single binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The value is unacceptable; the whole rule is rejected and matching
    /// continues with the next candidate rule.
    Reject,
    /// The value is acceptable, unchanged.
    Accept,
    /// The value is acceptable, replaced by the given value.
    AcceptWith(Value),
}

/// An opaque, user-supplied predicate over a binding value.
///
/// Invoked synchronously on the calling task; implementations must be
/// side-effect free and must not block.
pub trait ConstraintFn: Send + Sync {
    /// Evaluates the predicate against a captured binding value.
    fn check(&self, value: &Value) -> Outcome;
}

impl<F> ConstraintFn for F
where
    F: Fn(&Value) -> Outcome + Send + Sync,
{
    fn check(&self, value: &Value) -> Outcome {
        self(value)
    }
}

/// The predicate half of a [`Constraint`].
#[derive(Clone)]
pub(crate) enum Predicate {
    /// The binding must parse as a signed decimal integer.
    Integer,
    /// An opaque predicate, see [`ConstraintFn`].
    Function(Arc<dyn ConstraintFn>),
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("Predicate::Integer"),
            Self::Function(_) => f.write_str("Predicate::Function(..)"),
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer, Self::Integer) => true,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Predicate {}

/// A compiled `(binding-name, predicate)` pair attached to a host or path rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Constraint {
    pub(crate) name: Atom,
    pub(crate) predicate: Predicate,
}

impl Constraint {
    /// Builds an integer constraint for `name`.
    pub(crate) fn integer(name: Atom) -> Self {
        Self {
            name,
            predicate: Predicate::Integer,
        }
    }

    /// Builds a function constraint for `name`.
    pub(crate) fn function(name: Atom, f: Arc<dyn ConstraintFn>) -> Self {
        Self {
            name,
            predicate: Predicate::Function(f),
        }
    }
}

/// Runs `constraints` in declared order against `bindings`.
///
/// Returns `false` as soon as one constraint rejects the match; bindings may
/// have been partially rewritten in place by constraints that ran before the
/// rejection, but the caller discards them regardless since the whole rule is
/// abandoned.
pub(crate) fn apply(constraints: &[Constraint], bindings: &mut [(Atom, Value)]) -> bool {
    for constraint in constraints {
        let Some(entry) = bindings.iter_mut().find(|(name, _)| *name == constraint.name) else {
            continue;
        };
        match &constraint.predicate {
            Predicate::Integer => {
                let parsed = match &entry.1 {
                    Value::Int(n) => Some(*n),
                    Value::Bytes(bytes) => std::str::from_utf8(bytes)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok()),
                };
                match parsed {
                    Some(n) => entry.1 = Value::Int(n),
                    None => return false,
                }
            }
            Predicate::Function(f) => match f.check(&entry.1) {
                Outcome::Reject => return false,
                Outcome::Accept => {}
                Outcome::AcceptWith(value) => entry.1 = value,
            },
        }
    }
    true
}

/// Compares a freshly captured token against a previously bound value for the
/// same name, per the duplicate-binding-consistency rule.
pub(crate) fn binding_matches_existing(existing: &Value, token: &[u8]) -> bool {
    existing.comparison_bytes().as_ref() == token
}
