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

//! Error types for route compilation, request matching and configuration loading.

use std::fmt;

/// A fatal, programmer-visible failure raised while compiling an authored route.
///
/// The compiler performs no partial compilation: the first malformed construct it
/// encounters aborts the whole call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A `:` was followed immediately by a separator, bracket, or end of input.
    EmptyBindingName {
        /// The route text in which the empty name was found.
        route: String,
    },
    /// A `[` appeared in the interior of a segment, not at a segment boundary.
    MisplacedBracket {
        /// The route text in which the misplaced bracket was found.
        route: String,
    },
    /// A `]` had no matching `[`, or a `[` was never closed.
    UnbalancedBracket {
        /// The route text in which the imbalance was found.
        route: String,
    },
    /// `Rest` (`...`) appeared somewhere other than the final segment of a pattern.
    RestNotTerminal {
        /// The route text in which the misplaced `Rest` was found.
        route: String,
    },
    /// An authored path did not start with `/` and was not the wildcard or `"*"`.
    PathMissingLeadingSlash {
        /// The offending path text.
        path: String,
    },
    /// `AnyPattern` was paired with a non-empty constraint list.
    ConstraintsOnWildcard,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBindingName { route } => {
                write!(f, "empty binding name in route {route:?}")
            }
            Self::MisplacedBracket { route } => {
                write!(f, "misplaced '[' in route {route:?}")
            }
            Self::UnbalancedBracket { route } => {
                write!(f, "unbalanced bracket in route {route:?}")
            }
            Self::RestNotTerminal { route } => {
                write!(f, "'...' is not the final segment in route {route:?}")
            }
            Self::PathMissingLeadingSlash { path } => {
                write!(f, "path {path:?} does not start with '/'")
            }
            Self::ConstraintsOnWildcard => {
                write!(f, "wildcard pattern cannot carry constraints")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// A classified failure returned by the matcher at request time.
///
/// Unlike [`CompileError`] this is never thrown through the matcher; it is a plain
/// return value, mapped to an HTTP status by [`crate::status::status_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    /// No host rule accepted the host (this also covers a malformed host, which
    /// degrades to "no match" rather than a distinct bad-request classification).
    HostNotFound,
    /// A host rule accepted the host but no path rule under it accepted the path.
    PathNotFound,
    /// The path lacked a leading `/` or contained an invalid percent-escape.
    PathBadRequest,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::HostNotFound => "no host rule matched the request host",
            Self::PathNotFound => "no path rule matched the request path",
            Self::PathBadRequest => "the request path is malformed",
        };
        f.write_str(text)
    }
}

impl std::error::Error for MatchError {}

/// An error loading a route table from configuration.
///
/// Wraps the underlying I/O, YAML, or [`CompileError`] failure with a short
/// explanation of which loading step failed.
#[derive(Debug)]
pub struct ConfigError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConfigError {
    /// Builds an error with no underlying cause.
    pub fn explain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying cause, attaching a short explanation of the step that failed.
    pub fn because(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
