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

//! Demonstration harness for `pandora-route-core`.
//!
//! Loads a YAML route table (see [`pandora_route_core::config`]), compiles
//! it, and performs a single host/path lookup given on the command line,
//! printing the classified result. This binary is outside the library's
//! public API surface: it exists to exercise the crate end to end, not as a
//! network service.

use clap::Parser;
use log::error;

use pandora_route_core::config;
use pandora_route_core::matcher::{HostInput, PathInput};
use pandora_route_core::status::status_for;

/// Compiles a YAML route table and looks up one host/path request against it.
#[derive(Debug, Parser)]
struct Opt {
    /// Route configuration file(s) to load; glob patterns are expanded and
    /// merged in sorted order.
    #[arg(long = "conf", required = true, num_args = 1..)]
    conf: Vec<String>,
    /// Request host to look up, e.g. `ninenines.eu`.
    host: String,
    /// Request path to look up, e.g. `/users/42/friends`.
    path: String,
}

fn main() {
    env_logger::init();
    let opt = Opt::parse();

    let dispatch = match config::compile_from_files::<serde_yaml::Value, _>(&opt.conf) {
        Ok(table) => table,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let result = dispatch.dispatch(
        HostInput::Raw(opt.host.as_bytes()),
        PathInput::Raw(opt.path.as_bytes()),
    );

    match result {
        Ok(m) => {
            println!("matched handler {:?} (opts {:?})", m.handler, m.opts);
            println!("bindings: {:?}", m.bindings);
            if let Some(rest) = &m.host_rest {
                println!("host-rest: {rest:?}");
            }
            if let Some(rest) = &m.path_rest {
                println!("path-rest: {rest:?}");
            }
        }
        Err(err) => {
            println!("no match: {err} (status {})", status_for(err));
            std::process::exit(1);
        }
    }
}
