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

//! Request-time tokenization and matching.
//!
//! Everything here is a pure function over its inputs: no I/O, no shared
//! mutable state, safe to call from any number of request handlers in
//! parallel once the [`DispatchTable`] they share has been built.

use std::sync::Arc;

use crate::constraint::{self, Value};
use crate::error::MatchError;
use crate::intern::Atom;
use crate::pattern::{DispatchTable, Pattern, PathRule, Segment};

/// The host half of a match request.
#[derive(Debug, Clone)]
pub enum HostInput<'a> {
    /// A raw host string, tokenized by [`split_host`] before matching.
    Raw(&'a [u8]),
    /// A host already split into reversed (rightmost-label-first) tokens.
    Tokenized(Vec<Vec<u8>>),
}

/// The path half of a match request.
#[derive(Debug, Clone)]
pub enum PathInput<'a> {
    /// A raw path string, tokenized by [`split_path`] before matching.
    Raw(&'a [u8]),
    /// A path already split into forward-order segment tokens.
    Tokenized(Vec<Vec<u8>>),
    /// The path failed to parse upstream of the router; immediately yields
    /// [`MatchError::PathBadRequest`] regardless of the dispatch table.
    BadRequest,
}

/// A successful match: the handler and options of the winning path rule, the
/// bindings captured along the way, and any tokens absorbed by `Rest`
/// segments.
#[derive(Debug, Clone)]
pub struct Match<'a, H, O> {
    /// The handler payload of the winning path rule.
    pub handler: &'a H,
    /// The options payload of the winning path rule.
    pub opts: &'a O,
    /// Bindings captured from the host and path patterns, in the order they
    /// were first bound.
    pub bindings: Vec<(Arc<str>, Value)>,
    /// Tokens absorbed by a `Rest` segment in the host pattern, in authored
    /// left-to-right order. `None` unless the host pattern ended in `Rest`.
    pub host_rest: Option<Vec<Vec<u8>>>,
    /// Tokens absorbed by a `Rest` segment in the path pattern. `None` unless
    /// the path pattern ended in `Rest`.
    pub path_rest: Option<Vec<Vec<u8>>>,
}

/// Splits a host into reversed, rightmost-label-first tokens.
///
/// `www.example.com` becomes `["com", "example", "www"]`, so a leading `Rest`
/// in an authored host pattern naturally captures subdomain prefixes. An empty
/// host produces an empty token list. A zero-length label anywhere in the
/// host (`a..b`) is rejected by returning `None`, which the caller turns into
/// [`MatchError::HostNotFound`] rather than a crash.
pub fn split_host(host: &[u8]) -> Option<Vec<Vec<u8>>> {
    if host.is_empty() {
        return Some(Vec::new());
    }
    let mut tokens = Vec::new();
    for label in host.split(|&b| b == b'.') {
        if label.is_empty() {
            return None;
        }
        tokens.push(label.to_vec());
    }
    tokens.reverse();
    Some(tokens)
}

/// Splits a path into forward-order, percent-decoded segment tokens.
///
/// Requires a leading `/`, which is stripped before splitting. Empty interior
/// segments are preserved (`/a//b` -> `["a", "", "b"]`); a single trailing
/// slash is tolerated and drops the resulting trailing empty segment
/// (`/a/b/` -> `["a", "b"]`). Any path not starting with `/`, or containing an
/// invalid percent-escape, yields [`MatchError::PathBadRequest`].
pub fn split_path(path: &[u8]) -> Result<Vec<Vec<u8>>, MatchError> {
    if path.first() != Some(&b'/') {
        return Err(MatchError::PathBadRequest);
    }
    let rest = &path[1..];
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let mut parts: Vec<&[u8]> = rest.split(|&b| b == b'/').collect();
    if parts.last().map(|p| p.is_empty()).unwrap_or(false) {
        parts.pop();
    }
    parts.iter().map(|part| percent_decode(part)).collect()
}

fn percent_decode(segment: &[u8]) -> Result<Vec<u8>, MatchError> {
    let mut out = Vec::with_capacity(segment.len());
    let mut i = 0;
    while i < segment.len() {
        match segment[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = segment
                    .get(i + 1)
                    .copied()
                    .and_then(hex_value)
                    .ok_or(MatchError::PathBadRequest)?;
                let lo = segment
                    .get(i + 2)
                    .copied()
                    .and_then(hex_value)
                    .ok_or(MatchError::PathBadRequest)?;
                out.push(hi * 16 + lo);
                i += 3;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Matches `tokens` against `pattern`, seeding and extending `bindings`.
///
/// Returns `None` on failure. Returns `Some(None)` on success with no `Rest`
/// segment consumed, or `Some(Some(rest))` on success with the tokens `Rest`
/// absorbed.
fn list_match(
    mut tokens: &[Vec<u8>],
    mut pattern: &[Segment],
    bindings: &mut Vec<(Atom, Value)>,
) -> Option<Option<Vec<Vec<u8>>>> {
    loop {
        match pattern.split_first() {
            Some((Segment::Rest, _)) => return Some(Some(tokens.to_vec())),
            Some((segment, remaining_pattern)) => {
                let (token, remaining_tokens) = tokens.split_first()?;
                match segment {
                    Segment::AnyOne => {}
                    Segment::Literal(literal) => {
                        if literal.as_slice() != token.as_slice() {
                            return None;
                        }
                    }
                    Segment::Bind(name) => match bindings.iter().find(|(n, _)| n == name) {
                        Some((_, existing)) => {
                            if !constraint::binding_matches_existing(existing, token) {
                                return None;
                            }
                        }
                        None => bindings.push((*name, Value::Bytes(token.clone()))),
                    },
                    Segment::Rest => unreachable!("handled above"),
                }
                tokens = remaining_tokens;
                pattern = remaining_pattern;
            }
            None => return tokens.is_empty().then_some(None),
        }
    }
}

impl<H, O> DispatchTable<H, O> {
    /// Matches a host and path against this table, returning the first
    /// winning rule's handler, options, bindings and rest-tokens, or a
    /// classified error.
    pub fn dispatch<'a>(
        &'a self,
        host: HostInput<'_>,
        path: PathInput<'_>,
    ) -> Result<Match<'a, H, O>, MatchError> {
        let host_tokens = match host {
            HostInput::Raw(bytes) => split_host(bytes).ok_or(MatchError::HostNotFound)?,
            HostInput::Tokenized(tokens) => tokens,
        };

        let mut split_cache: Option<Result<Vec<Vec<u8>>, MatchError>> = None;

        for host_rule in &self.hosts {
            let mut bindings: Vec<(Atom, Value)> = Vec::new();
            let host_rest = match &host_rule.pattern {
                Pattern::Any => None,
                Pattern::Segments(segments) => {
                    match list_match(&host_tokens, segments, &mut bindings) {
                        Some(rest) => {
                            if !constraint::apply(&host_rule.constraints, &mut bindings) {
                                continue;
                            }
                            rest.map(|mut r| {
                                r.reverse();
                                r
                            })
                        }
                        None => continue,
                    }
                }
                Pattern::Asterisk => continue,
            };

            if matches!(path, PathInput::BadRequest) {
                return Err(MatchError::PathBadRequest);
            }

            for path_rule in &host_rule.paths {
                let mut path_bindings = bindings.clone();
                let matched_rest =
                    match_path_rule(path_rule, &path, &mut split_cache, &mut path_bindings)?;

                let Some(rest) = matched_rest else {
                    continue;
                };
                // The "*" literal pattern ignores its constraints, unlike every
                // other pattern kind.
                let ignore_constraints = matches!(path_rule.pattern, Pattern::Asterisk);
                if ignore_constraints || constraint::apply(&path_rule.constraints, &mut path_bindings) {
                    return Ok(self.build_match(path_rule, path_bindings, host_rest, rest));
                }
            }

            return Err(MatchError::PathNotFound);
        }

        Err(MatchError::HostNotFound)
    }

    fn build_match<'a>(
        &'a self,
        path_rule: &'a PathRule<H, O>,
        bindings: Vec<(Atom, Value)>,
        host_rest: Option<Vec<Vec<u8>>>,
        path_rest: Option<Vec<Vec<u8>>>,
    ) -> Match<'a, H, O> {
        let bindings = bindings
            .into_iter()
            .map(|(atom, value)| (self.interner.name(atom), value))
            .collect();
        Match {
            handler: &path_rule.handler,
            opts: &path_rule.opts,
            bindings,
            host_rest,
            path_rest,
        }
    }
}

/// Tries one path rule, returning the same success/failure shape as
/// [`list_match`]. Lazily splits a raw path the first time a [`Segments`]
/// pattern needs tokens, caching the result across later rule attempts for
/// this request. A split failure is returned immediately rather than treated
/// as this rule failing, matching the "no partial path parsing" contract.
///
/// [`Segments`]: Pattern::Segments
fn match_path_rule<H, O>(
    path_rule: &PathRule<H, O>,
    path: &PathInput<'_>,
    split_cache: &mut Option<Result<Vec<Vec<u8>>, MatchError>>,
    path_bindings: &mut Vec<(Atom, Value)>,
) -> Result<Option<Option<Vec<Vec<u8>>>>, MatchError> {
    match &path_rule.pattern {
        Pattern::Any => Ok(Some(None)),
        Pattern::Asterisk => {
            let is_asterisk = matches!(path, PathInput::Raw(bytes) if *bytes == b"*"[..]);
            Ok(is_asterisk.then_some(None))
        }
        Pattern::Segments(segments) => {
            let tokens = match path {
                PathInput::Tokenized(tokens) => tokens.clone(),
                PathInput::Raw(bytes) => {
                    let cached = split_cache.get_or_insert_with(|| split_path(bytes)).clone();
                    cached?
                }
                PathInput::BadRequest => unreachable!("handled by the caller before this point"),
            };
            Ok(list_match(&tokens, segments, path_bindings))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, ConstraintSpec, Host, Path, PathSpec, Route};

    #[test]
    fn host_split_of_empty_string_is_empty_list() {
        assert_eq!(split_host(b""), Some(Vec::new()));
    }

    #[test]
    fn host_split_reverses_labels() {
        assert_eq!(
            split_host(b"a.b.c"),
            Some(vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()])
        );
    }

    #[test]
    fn host_split_rejects_empty_interior_label() {
        assert_eq!(split_host(b"a..b"), None);
    }

    #[test]
    fn path_split_requires_leading_slash() {
        assert_eq!(split_path(b"no-slash"), Err(MatchError::PathBadRequest));
    }

    #[test]
    fn path_split_preserves_empty_interior_segments() {
        assert_eq!(
            split_path(b"/a//b"),
            Ok(vec![b"a".to_vec(), Vec::new(), b"b".to_vec()])
        );
    }

    #[test]
    fn path_split_decodes_percent_and_plus() {
        assert_eq!(split_path(b"/a%21b+c"), Ok(vec![b"a!b c".to_vec()]));
    }

    #[test]
    fn path_split_drops_trailing_empty_segment() {
        assert_eq!(
            split_path(b"/path/to/resource/"),
            Ok(vec![b"path".to_vec(), b"to".to_vec(), b"resource".to_vec()])
        );
    }

    #[test]
    fn path_split_of_root_is_empty_list() {
        assert_eq!(split_path(b"/"), Ok(Vec::new()));
    }

    #[test]
    fn path_split_rejects_invalid_escape() {
        assert_eq!(split_path(b"/%zz"), Err(MatchError::PathBadRequest));
    }

    /// Flattens a match's bindings into owned pairs for easy comparison; see
    /// `module-utils/src/router.rs`'s `routing` test for the same
    /// "lookup helper simplifies the result" table-driven style.
    fn bindings_of(bindings: &[(Arc<str>, Value)]) -> Vec<(String, Value)> {
        bindings
            .iter()
            .map(|(name, value)| (name.as_ref().to_owned(), value.clone()))
            .collect()
    }

    // SPEC_FULL.md §8 scenario 1: the all-wildcard table matches anything
    // with no bindings and no rest tokens.
    #[test]
    fn scenario_any_host_any_path_matches_with_empty_bindings() {
        let table =
            compile(vec![Route::new(Host::Any, vec![PathSpec::new(Path::Any, "h", ())])]).unwrap();

        let m = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/"))
            .unwrap();
        assert_eq!(*m.handler, "h");
        assert!(m.bindings.is_empty());
        assert_eq!(m.host_rest, None);
        assert_eq!(m.path_rest, None);
    }

    // SPEC_FULL.md §8 scenario 2: a specific path route wins over a
    // catch-all declared after it under the same host, and the catch-all is
    // still reachable when the specific route's pattern doesn't match.
    #[test]
    fn scenario_specific_path_then_catchall_in_declared_order() {
        let table = compile(vec![Route::new(
            "ninenines.eu",
            vec![
                PathSpec::new("/users/:id/friends", "friends", ()),
                PathSpec::new(Path::Any, "root", ()),
            ],
        )])
        .unwrap();

        let friends = table
            .dispatch(
                HostInput::Raw(b"ninenines.eu"),
                PathInput::Raw(b"/users/42/friends"),
            )
            .unwrap();
        assert_eq!(*friends.handler, "friends");
        assert_eq!(
            bindings_of(&friends.bindings),
            vec![("id".to_owned(), Value::Bytes(b"42".to_vec()))]
        );
        assert_eq!(friends.host_rest, None);
        assert_eq!(friends.path_rest, None);

        let root = table
            .dispatch(HostInput::Raw(b"ninenines.eu"), PathInput::Raw(b"/"))
            .unwrap();
        assert_eq!(*root.handler, "root");
        assert!(root.bindings.is_empty());
    }

    // SPEC_FULL.md §8 scenario 3: a leading `[...]` in an authored host
    // pattern becomes a terminal `Rest` after reversal, and the captured
    // subdomain prefix is handed back in authored left-to-right order.
    #[test]
    fn scenario_wildcard_subdomain_captures_host_rest_in_authored_order() {
        let table = compile(vec![Route::new(
            "[...].ninenines.eu",
            vec![PathSpec::new(Path::Any, "ha", ())],
        )])
        .unwrap();

        let m = table
            .dispatch(
                HostInput::Raw(b"cowboy.bugs.ninenines.eu"),
                PathInput::Raw(b"/"),
            )
            .unwrap();
        assert_eq!(*m.handler, "ha");
        assert!(m.bindings.is_empty());
        assert_eq!(m.host_rest, Some(vec![b"cowboy".to_vec(), b"bugs".to_vec()]));
        assert_eq!(m.path_rest, None);
    }

    // SPEC_FULL.md §8 scenario 4: a trailing `[...]` in a path pattern
    // captures every remaining segment, or an empty list when none remain.
    #[test]
    fn scenario_path_rest_captures_trailing_segments_or_is_empty() {
        let table = compile(vec![Route::new(
            Host::Any,
            vec![PathSpec::new("/pathinfo/is/next/[...]", "h", ())],
        )])
        .unwrap();

        let with_tail = table
            .dispatch(
                HostInput::Raw(b"any"),
                PathInput::Raw(b"/pathinfo/is/next/foo/bar"),
            )
            .unwrap();
        assert_eq!(with_tail.path_rest, Some(vec![b"foo".to_vec(), b"bar".to_vec()]));

        let without_tail = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/pathinfo/is/next"))
            .unwrap();
        assert_eq!(without_tail.path_rest, Some(Vec::new()));
    }

    // SPEC_FULL.md §8 scenario 5: an `Integer` constraint replaces the bound
    // value on success and rejects the rule (falling through to
    // `PathNotFound`, not an error) on a non-numeric value.
    #[test]
    fn scenario_integer_constraint_accepts_or_rejects() {
        let table = compile(vec![Route::new(
            Host::Any,
            vec![PathSpec::with_constraints(
                "/path/:value",
                vec![ConstraintSpec::integer("value")],
                "h",
                (),
            )],
        )])
        .unwrap();

        let m = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/path/123"))
            .unwrap();
        assert_eq!(
            bindings_of(&m.bindings),
            vec![("value".to_owned(), Value::Int(123))]
        );

        let err = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/path/NaN"))
            .unwrap_err();
        assert_eq!(err, MatchError::PathNotFound);
    }

    // SPEC_FULL.md §8 scenario 6: the same binding name appearing twice in
    // one pattern requires byte-identical captures; a mismatch fails the
    // whole rule and, with no other host rule declared, surfaces as
    // `HostNotFound` rather than a partial match.
    #[test]
    fn scenario_duplicate_binding_must_match_byte_for_byte() {
        let table = compile(vec![Route::new(
            ":same.:same",
            vec![PathSpec::new(Path::Any, "h", ())],
        )])
        .unwrap();

        let m = table
            .dispatch(HostInput::Raw(b"eu.eu"), PathInput::Raw(b"/"))
            .unwrap();
        assert_eq!(
            bindings_of(&m.bindings),
            vec![("same".to_owned(), Value::Bytes(b"eu".to_vec()))]
        );

        let err = table
            .dispatch(HostInput::Raw(b"ninenines.eu"), PathInput::Raw(b"/"))
            .unwrap_err();
        assert_eq!(err, MatchError::HostNotFound);
    }

    // Bracket fan-out, exercised end to end through dispatch rather than
    // just at the compiler's variant-list level: `[[...]]` is an optional
    // group whose only content is the terminal rest marker, so it fans out
    // to `[a]` (declared first) and `[a, Rest]` (declared second). Both
    // patterns can match a bare "/a" (`Rest` happily absorbs zero tokens),
    // so this is the one case where declaration order is actually observable
    // rather than merely a property of the compiled variant list.
    #[test]
    fn bracket_fan_out_without_variant_takes_priority_over_with_variant() {
        let table = compile(vec![Route::new(
            Host::Any,
            vec![PathSpec::new("/a/[[...]]", "h", ())],
        )])
        .unwrap();

        let bare = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/a"))
            .unwrap();
        assert_eq!(*bare.handler, "h");
        assert_eq!(bare.path_rest, None);

        let with_tail = table
            .dispatch(HostInput::Raw(b"any"), PathInput::Raw(b"/a/extra"))
            .unwrap();
        assert_eq!(*with_tail.handler, "h");
        assert_eq!(with_tail.path_rest, Some(vec![b"extra".to_vec()]));
    }
}
