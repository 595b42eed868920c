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

//! Compiles the textual routing DSL into a [`DispatchTable`].
//!
//! Routes are authored with [`Route`] and [`PathSpec`] values, then handed to
//! [`compile`]. Everything downstream of that call (the [`crate::matcher`]
//! module) only ever sees the normalized [`Pattern`]/[`Segment`] shapes; this
//! module is the only place that understands `:name` bindings, `_`, `[...]`
//! and bracketed optional groups.

use std::fmt;
use std::sync::Arc;

use crate::constraint::{Constraint, ConstraintFn};
use crate::error::CompileError;
use crate::intern::Interner;
use crate::pattern::{DispatchTable, HostRule, Pattern, PathRule, Segment};

/// An authored host pattern, before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// Matches any host; may not carry constraints.
    Any,
    /// A dot-separated textual host pattern, e.g. `"ninenines.eu"` or
    /// `"[...].ninenines.eu"` for a wildcard-subdomain prefix.
    Pattern(String),
}

impl From<&str> for Host {
    fn from(text: &str) -> Self {
        Self::Pattern(text.to_owned())
    }
}

impl From<String> for Host {
    fn from(text: String) -> Self {
        Self::Pattern(text)
    }
}

/// An authored path pattern, before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Path {
    /// Matches any path; may not carry constraints.
    Any,
    /// Matches only the literal request-target `*` used by `OPTIONS *`.
    Asterisk,
    /// A slash-separated textual path pattern, e.g. `"/users/:id/friends"`.
    /// Must begin with `/`.
    Pattern(String),
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        if text == "*" {
            Self::Asterisk
        } else {
            Self::Pattern(text.to_owned())
        }
    }
}

impl From<String> for Path {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

/// The predicate half of an authored [`ConstraintSpec`].
#[derive(Clone)]
pub enum PredicateSpec {
    /// The binding must parse as a signed decimal integer.
    Integer,
    /// An opaque predicate evaluated against the captured binding value.
    Function(Arc<dyn ConstraintFn>),
}

impl fmt::Debug for PredicateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("PredicateSpec::Integer"),
            Self::Function(_) => f.write_str("PredicateSpec::Function(..)"),
        }
    }
}

/// An authored `(binding-name, predicate)` constraint, attached to a [`Route`]
/// or a [`PathSpec`].
///
/// Naming a binding that ends up absent from a given match is not an error;
/// the constraint is simply vacuously satisfied for that match.
#[derive(Debug, Clone)]
pub struct ConstraintSpec {
    name: String,
    predicate: PredicateSpec,
}

impl ConstraintSpec {
    /// Requires `name` to parse as a signed decimal integer, replacing the
    /// bound value with the parsed integer on success.
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: PredicateSpec::Integer,
        }
    }

    /// Evaluates `f` against the binding value captured under `name`.
    pub fn function(name: impl Into<String>, f: impl ConstraintFn + 'static) -> Self {
        Self {
            name: name.into(),
            predicate: PredicateSpec::Function(Arc::new(f)),
        }
    }
}

/// One authored path route: a pattern, its constraints, and the opaque
/// handler payload the matcher returns on success.
#[derive(Debug, Clone)]
pub struct PathSpec<H, O> {
    path: Path,
    constraints: Vec<ConstraintSpec>,
    handler: H,
    opts: O,
}

impl<H, O> PathSpec<H, O> {
    /// Builds a path route with no constraints.
    pub fn new(path: impl Into<Path>, handler: H, opts: O) -> Self {
        Self::with_constraints(path, Vec::new(), handler, opts)
    }

    /// Builds a path route with explicit constraints.
    pub fn with_constraints(
        path: impl Into<Path>,
        constraints: Vec<ConstraintSpec>,
        handler: H,
        opts: O,
    ) -> Self {
        Self {
            path: path.into(),
            constraints,
            handler,
            opts,
        }
    }
}

/// One authored host route: a pattern, its constraints, and the ordered path
/// routes tried once the host matches.
#[derive(Debug, Clone)]
pub struct Route<H, O> {
    host: Host,
    constraints: Vec<ConstraintSpec>,
    paths: Vec<PathSpec<H, O>>,
}

impl<H, O> Route<H, O> {
    /// Builds a host route with no host-level constraints.
    pub fn new(host: impl Into<Host>, paths: Vec<PathSpec<H, O>>) -> Self {
        Self::with_constraints(host, Vec::new(), paths)
    }

    /// Builds a host route with explicit host-level constraints.
    pub fn with_constraints(
        host: impl Into<Host>,
        constraints: Vec<ConstraintSpec>,
        paths: Vec<PathSpec<H, O>>,
    ) -> Self {
        Self {
            host: host.into(),
            constraints,
            paths,
        }
    }
}

/// Compiles authored [`Route`]s into a [`DispatchTable`], in declaration
/// order.
///
/// Each authored route may expand into several compiled host rules (one per
/// bracketed-group subset in its host pattern); the path routes underneath
/// are compiled once and shared across those expansions. See the module docs
/// for what the textual pattern syntax accepts.
///
/// ```
/// use pandora_route_core::compiler::{compile, Host, PathSpec, Route};
///
/// let table = compile(vec![Route::new(
///     Host::Any,
///     vec![PathSpec::new("/", "root", ())],
/// )])
/// .unwrap();
/// assert_eq!(table.host_rule_count(), 1);
/// ```
pub fn compile<H, O>(routes: Vec<Route<H, O>>) -> Result<DispatchTable<H, O>, CompileError>
where
    H: Clone,
    O: Clone,
{
    let mut interner = Interner::new();
    let mut hosts = Vec::new();

    for route in routes {
        let compiled_paths = compile_paths(&route.paths, &mut interner)?;

        match route.host {
            Host::Any => {
                if !route.constraints.is_empty() {
                    return Err(CompileError::ConstraintsOnWildcard);
                }
                hosts.push(HostRule {
                    pattern: Pattern::Any,
                    constraints: Vec::new(),
                    paths: compiled_paths,
                });
            }
            Host::Pattern(text) => {
                let variants = compile_segments(&text, b'.', true, &mut interner, &text)?;
                let constraints = compile_constraints(&route.constraints, &mut interner);
                for segments in variants {
                    hosts.push(HostRule {
                        pattern: Pattern::Segments(segments),
                        constraints: constraints.clone(),
                        paths: compiled_paths.clone(),
                    });
                }
            }
        }
    }

    Ok(DispatchTable { interner, hosts })
}

fn compile_paths<H, O>(
    specs: &[PathSpec<H, O>],
    interner: &mut Interner,
) -> Result<Vec<PathRule<H, O>>, CompileError>
where
    H: Clone,
    O: Clone,
{
    let mut compiled = Vec::new();
    for spec in specs {
        match &spec.path {
            Path::Any => {
                if !spec.constraints.is_empty() {
                    return Err(CompileError::ConstraintsOnWildcard);
                }
                compiled.push(PathRule {
                    pattern: Pattern::Any,
                    constraints: Vec::new(),
                    handler: spec.handler.clone(),
                    opts: spec.opts.clone(),
                });
            }
            Path::Asterisk => {
                let constraints = compile_constraints(&spec.constraints, interner);
                compiled.push(PathRule {
                    pattern: Pattern::Asterisk,
                    constraints,
                    handler: spec.handler.clone(),
                    opts: spec.opts.clone(),
                });
            }
            Path::Pattern(text) => {
                if !text.starts_with('/') {
                    return Err(CompileError::PathMissingLeadingSlash { path: text.clone() });
                }
                let variants = compile_segments(&text[1..], b'/', false, interner, text)?;
                let constraints = compile_constraints(&spec.constraints, interner);
                for segments in variants {
                    compiled.push(PathRule {
                        pattern: Pattern::Segments(segments),
                        constraints: constraints.clone(),
                        handler: spec.handler.clone(),
                        opts: spec.opts.clone(),
                    });
                }
            }
        }
    }
    Ok(compiled)
}

fn compile_constraints(specs: &[ConstraintSpec], interner: &mut Interner) -> Vec<Constraint> {
    specs
        .iter()
        .map(|spec| {
            let atom = interner.intern(&spec.name);
            match &spec.predicate {
                PredicateSpec::Integer => Constraint::integer(atom),
                PredicateSpec::Function(f) => Constraint::function(atom, Arc::clone(f)),
            }
        })
        .collect()
}

/// One element of the pre-expansion parse tree: either a concrete segment or
/// a bracketed optional group holding its own (possibly nested) sequence.
#[derive(Clone)]
enum Part {
    Segment(Segment),
    Group(Vec<Part>),
}

/// Parses `text` on separator `separator` into [`Pattern::Segments`]
/// variants, one per subset of its bracketed optional groups, then (if
/// `reverse`) reverses each variant's segment order.
///
/// `route_text` is only used to identify the offending route in error
/// messages.
fn compile_segments(
    text: &str,
    separator: u8,
    reverse: bool,
    interner: &mut Interner,
    route_text: &str,
) -> Result<Vec<Vec<Segment>>, CompileError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let parts = parse_parts(bytes, &mut pos, separator, None, interner, route_text)?;
    if pos != bytes.len() {
        // A ']' remained unconsumed: it never had a matching '['.
        return Err(CompileError::UnbalancedBracket {
            route: route_text.to_owned(),
        });
    }

    let mut variants = expand(&parts);
    if reverse {
        for variant in &mut variants {
            variant.reverse();
        }
    }
    for variant in &variants {
        validate_rest_terminal(variant, route_text)?;
    }

    Ok(dedup_preserve_order(variants))
}

/// Parses a sequence of segment slots separated by `separator`, stopping at
/// `stop` (the closing `]` of an enclosing group) or at the end of `bytes`.
///
/// Leading separators are collapsed (no empty segment is emitted for them);
/// separators elsewhere in the sequence each still end one slot and begin the
/// next, so a run of separators in the middle produces empty segments.
fn parse_parts(
    bytes: &[u8],
    pos: &mut usize,
    separator: u8,
    stop: Option<u8>,
    interner: &mut Interner,
    route_text: &str,
) -> Result<Vec<Part>, CompileError> {
    while *pos < bytes.len() && bytes[*pos] == separator {
        *pos += 1;
    }

    let mut parts = Vec::new();
    loop {
        if *pos >= bytes.len() {
            break;
        }
        if stop == Some(bytes[*pos]) {
            break;
        }
        parts.push(parse_one_segment(
            bytes, pos, separator, stop, interner, route_text,
        )?);
        if *pos < bytes.len() && bytes[*pos] == separator {
            *pos += 1;
            continue;
        }
        break;
    }
    Ok(parts)
}

fn parse_one_segment(
    bytes: &[u8],
    pos: &mut usize,
    separator: u8,
    stop: Option<u8>,
    interner: &mut Interner,
    route_text: &str,
) -> Result<Part, CompileError> {
    if *pos < bytes.len() && bytes[*pos] == b'[' {
        if bytes[*pos..].starts_with(b"[...]") {
            *pos += 5;
            return Ok(Part::Segment(Segment::Rest));
        }

        *pos += 1;
        let inner = parse_parts(bytes, pos, separator, Some(b']'), interner, route_text)?;
        if bytes.get(*pos) != Some(&b']') {
            return Err(CompileError::UnbalancedBracket {
                route: route_text.to_owned(),
            });
        }
        *pos += 1;
        return Ok(Part::Group(inner));
    }

    if *pos < bytes.len() && bytes[*pos] == b':' {
        *pos += 1;
        let start = *pos;
        while *pos < bytes.len()
            && bytes[*pos] != separator
            && bytes[*pos] != b'['
            && bytes[*pos] != b']'
        {
            *pos += 1;
        }
        if *pos == start {
            return Err(CompileError::EmptyBindingName {
                route: route_text.to_owned(),
            });
        }
        let name = std::str::from_utf8(&bytes[start..*pos])
            .expect("route text is valid UTF-8 and binding names are a substring of it");
        let atom = interner.intern(name);
        return Ok(Part::Segment(Segment::Bind(atom)));
    }

    let start = *pos;
    while *pos < bytes.len() && bytes[*pos] != separator {
        if bytes[*pos] == b'[' {
            return Err(CompileError::MisplacedBracket {
                route: route_text.to_owned(),
            });
        }
        if bytes[*pos] == b']' {
            if stop == Some(b']') {
                break;
            }
            return Err(CompileError::UnbalancedBracket {
                route: route_text.to_owned(),
            });
        }
        *pos += 1;
    }

    let literal = &bytes[start..*pos];
    if literal == b"_" {
        Ok(Part::Segment(Segment::AnyOne))
    } else {
        Ok(Part::Segment(Segment::Literal(literal.to_vec())))
    }
}

/// Expands a parse tree into every subset-of-groups variant, processing the
/// leftmost group first so that, recursively, the variant omitting a group
/// always precedes the variant including it.
fn expand(parts: &[Part]) -> Vec<Vec<Segment>> {
    match parts.iter().position(|part| matches!(part, Part::Group(_))) {
        Some(index) => {
            let prefix = &parts[..index];
            let tail = &parts[index + 1..];
            let group = match &parts[index] {
                Part::Group(inner) => inner,
                Part::Segment(_) => unreachable!(),
            };

            let mut without = prefix.to_vec();
            without.extend_from_slice(tail);

            let mut with = prefix.to_vec();
            with.extend_from_slice(group);
            with.extend_from_slice(tail);

            let mut variants = expand(&without);
            variants.extend(expand(&with));
            variants
        }
        None => {
            let segments = parts
                .iter()
                .map(|part| match part {
                    Part::Segment(segment) => segment.clone(),
                    Part::Group(_) => unreachable!(),
                })
                .collect();
            vec![segments]
        }
    }
}

fn dedup_preserve_order(variants: Vec<Vec<Segment>>) -> Vec<Vec<Segment>> {
    let mut out: Vec<Vec<Segment>> = Vec::with_capacity(variants.len());
    for variant in variants {
        if !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

fn validate_rest_terminal(segments: &[Segment], route_text: &str) -> Result<(), CompileError> {
    if let Some(index) = segments.iter().position(|s| matches!(s, Segment::Rest)) {
        if index != segments.len() - 1 {
            return Err(CompileError::RestNotTerminal {
                route: route_text.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Outcome, Value};

    fn text_segments(text: &str, separator: u8, reverse: bool) -> Vec<Vec<Segment>> {
        let mut interner = Interner::new();
        compile_segments(text, separator, reverse, &mut interner, text).unwrap()
    }

    #[test]
    fn compiles_plain_literal_path() {
        let variants = text_segments("users/friends", b'/', false);
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"users".to_vec()),
                Segment::Literal(b"friends".to_vec()),
            ]]
        );
    }

    #[test]
    fn compiles_anyone_and_bindings() {
        let mut interner = Interner::new();
        let variants =
            compile_segments("users/:id/_", b'/', false, &mut interner, "users/:id/_").unwrap();
        let id = interner.intern("id");
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"users".to_vec()),
                Segment::Bind(id),
                Segment::AnyOne,
            ]]
        );
    }

    #[test]
    fn reverses_host_segments() {
        let variants = text_segments("ninenines.eu", b'.', true);
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"eu".to_vec()),
                Segment::Literal(b"ninenines".to_vec()),
            ]]
        );
    }

    #[test]
    fn leading_rest_becomes_terminal_after_host_reversal() {
        let variants = text_segments("[...].ninenines.eu", b'.', true);
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"eu".to_vec()),
                Segment::Literal(b"ninenines".to_vec()),
                Segment::Rest,
            ]]
        );
    }

    #[test]
    fn trailing_rest_in_path() {
        let variants = text_segments("pathinfo/is/next/[...]", b'/', false);
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"pathinfo".to_vec()),
                Segment::Literal(b"is".to_vec()),
                Segment::Literal(b"next".to_vec()),
                Segment::Rest,
            ]]
        );
    }

    #[test]
    fn rest_not_in_final_position_is_rejected() {
        let mut interner = Interner::new();
        let err = compile_segments("[...]/foo", b'/', false, &mut interner, "[...]/foo")
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::RestNotTerminal {
                route: "[...]/foo".to_owned()
            }
        );
    }

    #[test]
    fn middle_empty_segment_is_preserved() {
        let variants = text_segments("a//b", b'/', false);
        assert_eq!(
            variants,
            vec![vec![
                Segment::Literal(b"a".to_vec()),
                Segment::Literal(Vec::new()),
                Segment::Literal(b"b".to_vec()),
            ]]
        );
    }

    #[test]
    fn leading_separator_is_collapsed() {
        let variants = text_segments("/foo", b'/', false);
        assert_eq!(variants, vec![vec![Segment::Literal(b"foo".to_vec())]]);
    }

    #[test]
    fn empty_binding_name_is_rejected() {
        let mut interner = Interner::new();
        let err = compile_segments("users/:", b'/', false, &mut interner, "users/:").unwrap_err();
        assert_eq!(
            err,
            CompileError::EmptyBindingName {
                route: "users/:".to_owned()
            }
        );
    }

    #[test]
    fn misplaced_bracket_inside_segment_is_rejected() {
        let mut interner = Interner::new();
        let err =
            compile_segments("foo[bar]", b'/', false, &mut interner, "foo[bar]").unwrap_err();
        assert_eq!(
            err,
            CompileError::MisplacedBracket {
                route: "foo[bar]".to_owned()
            }
        );
    }

    #[test]
    fn unbalanced_open_bracket_is_rejected() {
        let mut interner = Interner::new();
        let err = compile_segments("foo/[bar", b'/', false, &mut interner, "foo/[bar").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnbalancedBracket {
                route: "foo/[bar".to_owned()
            }
        );
    }

    #[test]
    fn unbalanced_close_bracket_is_rejected() {
        let mut interner = Interner::new();
        let err = compile_segments("foo]/bar", b'/', false, &mut interner, "foo]/bar").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnbalancedBracket {
                route: "foo]/bar".to_owned()
            }
        );
    }

    #[test]
    fn single_bracket_group_yields_two_variants_without_before_with() {
        let variants = text_segments("foo[/bar]", b'/', false);
        assert_eq!(
            variants,
            vec![
                vec![Segment::Literal(b"foo".to_vec())],
                vec![
                    Segment::Literal(b"foo".to_vec()),
                    Segment::Literal(b"bar".to_vec()),
                ],
            ]
        );
    }

    #[test]
    fn nested_bracket_groups_yield_four_variants() {
        let variants = text_segments("a[/b[/c]]", b'/', false);
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0], vec![Segment::Literal(b"a".to_vec())]);
        assert_eq!(
            variants[3],
            vec![
                Segment::Literal(b"a".to_vec()),
                Segment::Literal(b"b".to_vec()),
                Segment::Literal(b"c".to_vec()),
            ]
        );
        // The variant with the outer group but not the inner one must precede
        // the variant with both, matching the "without precedes with" rule for
        // the inner group specifically.
        let with_outer_only = vec![
            Segment::Literal(b"a".to_vec()),
            Segment::Literal(b"b".to_vec()),
        ];
        let with_both = vec![
            Segment::Literal(b"a".to_vec()),
            Segment::Literal(b"b".to_vec()),
            Segment::Literal(b"c".to_vec()),
        ];
        let pos_outer_only = variants.iter().position(|v| v == &with_outer_only).unwrap();
        let pos_both = variants.iter().position(|v| v == &with_both).unwrap();
        assert!(pos_outer_only < pos_both);
    }

    #[test]
    fn wildcard_host_rejects_constraints() {
        let result = compile(vec![Route::<&str, ()>::with_constraints(
            Host::Any,
            vec![ConstraintSpec::integer("x")],
            vec![PathSpec::new(Path::Any, "h", ())],
        )]);
        assert_eq!(result.unwrap_err(), CompileError::ConstraintsOnWildcard);
    }

    #[test]
    fn wildcard_path_rejects_constraints() {
        let result = compile(vec![Route::new(
            Host::Any,
            vec![PathSpec::with_constraints(
                Path::Any,
                vec![ConstraintSpec::integer("x")],
                "h",
                (),
            )],
        )]);
        assert_eq!(result.unwrap_err(), CompileError::ConstraintsOnWildcard);
    }

    #[test]
    fn path_without_leading_slash_is_rejected() {
        let result = compile(vec![Route::new(
            Host::Any,
            vec![PathSpec::new("users", "h", ())],
        )]);
        assert_eq!(
            result.unwrap_err(),
            CompileError::PathMissingLeadingSlash {
                path: "users".to_owned()
            }
        );
    }

    #[test]
    fn host_bracket_expansion_fans_out_host_rules() {
        let table = compile(vec![Route::new(
            "eu.ninenines[.dev]",
            vec![PathSpec::new(Path::Any, "h", ())],
        )])
        .unwrap();
        assert_eq!(table.host_rule_count(), 2);
    }

    #[test]
    fn function_constraint_round_trips_through_compile() {
        struct NonEmpty;
        impl ConstraintFn for NonEmpty {
            fn check(&self, value: &Value) -> Outcome {
                match value {
                    Value::Bytes(bytes) if !bytes.is_empty() => Outcome::Accept,
                    _ => Outcome::Reject,
                }
            }
        }

        let table = compile(vec![Route::with_constraints(
            Host::Any,
            Vec::new(),
            vec![PathSpec::with_constraints(
                "/users/:id",
                vec![ConstraintSpec::function("id", NonEmpty)],
                "h",
                (),
            )],
        )])
        .unwrap();
        assert_eq!(table.host_rule_count(), 1);
    }

    #[test]
    fn idempotent_recompilation_yields_equal_tables() {
        fn routes() -> Vec<Route<&'static str, ()>> {
            vec![Route::new(
                "ninenines.eu",
                vec![
                    PathSpec::new("/users/:id/friends", "friends", ()),
                    PathSpec::new(Path::Any, "root", ()),
                ],
            )]
        }

        let first = compile(routes()).unwrap();
        let second = compile(routes()).unwrap();
        assert_eq!(first, second);
    }
}
