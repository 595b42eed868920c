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

//! # Pandora route core
//!
//! Host/path request routing core extracted from Pandora Web Server's module
//! helpers: a textual routing DSL compiler ([`compiler`]) and a
//! binding-aware match engine ([`matcher`]).
//!
//! ```
//! use pandora_route_core::compiler::{compile, ConstraintSpec, Host, Path, PathSpec, Route};
//! use pandora_route_core::matcher::{HostInput, PathInput};
//!
//! let table = compile(vec![Route::new(
//!     "ninenines.eu",
//!     vec![
//!         PathSpec::with_constraints(
//!             "/users/:id/friends",
//!             vec![ConstraintSpec::integer("id")],
//!             "friends_handler",
//!             (),
//!         ),
//!         PathSpec::new(Path::Any, "root_handler", ()),
//!     ],
//! )])
//! .unwrap();
//!
//! let result = table
//!     .dispatch(
//!         HostInput::Raw(b"ninenines.eu"),
//!         PathInput::Raw(b"/users/42/friends"),
//!     )
//!     .unwrap();
//! assert_eq!(*result.handler, "friends_handler");
//! ```
//!
//! The router never performs network I/O and holds no mutable state: once
//! built, a [`DispatchTable`] is immutable and safe to share across any
//! number of concurrent request handlers. Request/response plumbing,
//! middleware chaining and everything above "match this host and path" is
//! out of scope; see [`config`] for the YAML authoring convenience that
//! *is* in scope, and [`status`] for mapping a failed match to an HTTP
//! status code.

pub mod compiler;
pub mod config;
mod constraint;
mod error;
mod intern;
pub mod matcher;
mod pattern;
pub mod status;

pub use constraint::{ConstraintFn, Outcome, Value};
pub use error::{CompileError, ConfigError, MatchError};
pub use matcher::{split_host, split_path, HostInput, Match, PathInput};
pub use pattern::DispatchTable;
