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

//! Declarative YAML authoring of routes, for deployments that would rather
//! describe a dispatch table in a configuration file than in Rust.
//!
//! Dispatch tables are ordinarily built by handing [`compiler::compile`] a
//! `Vec<Route<H, O>>` built with real handler values. This module covers the
//! common case where `H` is a handler name and `O` is free-form YAML data:
//! it deserializes an ordered list of authored routes from a YAML document
//! (or a glob of documents, merged in sorted file-name order), mirroring
//! this codebase's `FromYaml` configuration loader.
//!
//! Only the `Integer` constraint predicate can be expressed declaratively;
//! [`crate::compiler::PredicateSpec::Function`] constraints are a Rust-side
//! capability and must be attached by editing the compiled [`Vec<Route>`]
//! before calling [`compiler::compile`] directly.

use std::fs::File;
use std::io::BufReader;
use std::path::Path as FsPath;

use log::{info, trace};
use serde::Deserialize;

use crate::compiler::{self, CompileError, ConstraintSpec, Host, Path, PathSpec, Route};
use crate::error::ConfigError;
use crate::pattern::DispatchTable;

/// The predicate an authored YAML constraint names.
///
/// Only `Integer` is representable today; see the module docs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YamlConstraintKind {
    /// The binding must parse as a signed decimal integer.
    #[default]
    Integer,
}

/// One authored YAML constraint: a binding name and its predicate kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct YamlConstraint {
    /// The binding name this constraint applies to.
    pub name: String,
    /// The predicate to evaluate, defaulting to [`YamlConstraintKind::Integer`].
    #[serde(default)]
    pub kind: YamlConstraintKind,
}

impl From<YamlConstraint> for ConstraintSpec {
    fn from(constraint: YamlConstraint) -> Self {
        match constraint.kind {
            YamlConstraintKind::Integer => ConstraintSpec::integer(constraint.name),
        }
    }
}

/// One authored YAML path route.
///
/// `opts` defaults to [`serde_yaml::Value::Null`] when omitted; callers
/// wanting a strongly typed options payload can instantiate [`RoutesFile`]
/// with their own `O: Deserialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct YamlPathRoute<O = serde_yaml::Value> {
    /// The textual path pattern, or the literal `"*"` for `OPTIONS *`.
    pub path: String,
    /// Constraints evaluated after the path pattern matches.
    #[serde(default)]
    pub constraints: Vec<YamlConstraint>,
    /// The handler name returned to the caller on a match.
    pub handler: String,
    /// Free-form options handed to the caller alongside the handler.
    #[serde(default)]
    pub opts: O,
}

/// One authored YAML host route.
///
/// A missing or `null` `host` field compiles to the wildcard host pattern;
/// there is no textual spelling for it, since the wildcard is a distinct
/// marker rather than a pattern (see [`Host::Any`]).
#[derive(Debug, Clone, Deserialize)]
pub struct YamlHostRoute<O = serde_yaml::Value> {
    /// The textual, dot-separated host pattern. `None` matches any host.
    #[serde(default)]
    pub host: Option<String>,
    /// Constraints evaluated after the host pattern matches.
    #[serde(default)]
    pub constraints: Vec<YamlConstraint>,
    /// The path routes tried, in order, once this host matches.
    pub paths: Vec<YamlPathRoute<O>>,
}

/// The top-level shape of a routes YAML document: an ordered list of host
/// routes under a `routes` key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutesFile<O = serde_yaml::Value> {
    /// The authored host routes, in declaration order.
    #[serde(default)]
    pub routes: Vec<YamlHostRoute<O>>,
}

impl<O> RoutesFile<O>
where
    O: Clone,
{
    /// Converts this file's routes into the authored [`Route`] shape
    /// [`compiler::compile`] accepts, with handler values set to the
    /// authored handler name string.
    pub fn into_routes(self) -> Vec<Route<String, O>> {
        self.routes
            .into_iter()
            .map(|host_route| {
                let host = match host_route.host {
                    Some(text) => Host::Pattern(text),
                    None => Host::Any,
                };
                let constraints = host_route
                    .constraints
                    .into_iter()
                    .map(ConstraintSpec::from)
                    .collect();
                let paths = host_route
                    .paths
                    .into_iter()
                    .map(|path_route| {
                        let path_constraints = path_route
                            .constraints
                            .into_iter()
                            .map(ConstraintSpec::from)
                            .collect();
                        PathSpec::with_constraints(
                            Path::from(path_route.path.as_str()),
                            path_constraints,
                            path_route.handler,
                            path_route.opts,
                        )
                    })
                    .collect();
                Route::with_constraints(host, constraints, paths)
            })
            .collect()
    }
}

/// Loads and merges route configuration from a number of YAML files.
///
/// Glob patterns in file names are resolved and the matched paths are sorted
/// before being read, so that authoring order across files is deterministic.
/// Later files' `routes` lists are appended after earlier ones'.
pub fn load_from_files<O, I>(files: I) -> Result<RoutesFile<O>, ConfigError>
where
    O: for<'de> Deserialize<'de>,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut paths = files
        .into_iter()
        .filter_map(|pattern| match glob::glob(pattern.as_ref()) {
            Ok(iter) => Some(iter),
            Err(err) => {
                log::error!("Ignoring invalid glob pattern `{}`: {err}", pattern.as_ref());
                None
            }
        })
        .flatten()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                log::error!("Failed resolving glob pattern: {err}");
                None
            }
        })
        .collect::<Vec<_>>();
    paths.sort();

    let mut merged = RoutesFile::<O>::default();
    for path in paths {
        info!("Loading route configuration file `{}`", path.display());
        let mut file = load_from_yaml_file(&path)?;
        merged.routes.append(&mut file.routes);
    }
    Ok(merged)
}

/// Loads route configuration from a single YAML file.
pub fn load_from_yaml_file<O>(path: impl AsRef<FsPath>) -> Result<RoutesFile<O>, ConfigError>
where
    O: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        ConfigError::because(
            format!("failed opening route configuration file `{}`", path.display()),
            err,
        )
    })?;
    let reader = BufReader::new(file);
    let routes: RoutesFile<O> = serde_yaml::from_reader(reader).map_err(|err| {
        ConfigError::because(
            format!("failed parsing route configuration file `{}`", path.display()),
            err,
        )
    })?;
    trace!("Loaded route configuration file: {routes:#?}");
    Ok(routes)
}

/// Loads route configuration from a YAML string.
pub fn load_from_yaml_str<O>(yaml: &str) -> Result<RoutesFile<O>, ConfigError>
where
    O: for<'de> Deserialize<'de>,
{
    let routes: RoutesFile<O> = serde_yaml::from_str(yaml)
        .map_err(|err| ConfigError::because("failed parsing route configuration", err))?;
    trace!("Loaded route configuration: {routes:#?}");
    Ok(routes)
}

/// Loads, merges and compiles route configuration from a number of YAML
/// files in one step.
pub fn compile_from_files<O, I>(files: I) -> Result<DispatchTable<String, O>, ConfigError>
where
    O: Clone + for<'de> Deserialize<'de>,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let file = load_from_files(files)?;
    let route_count = file.routes.len();
    let table = compiler::compile(file.into_routes())
        .map_err(|err: CompileError| ConfigError::because("failed compiling routes", err))?;
    info!(
        "Compiled {route_count} authored route(s) into {} host rule(s)",
        table.host_rule_count()
    );
    Ok(table)
}
