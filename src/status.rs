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

//! Maps classified match failures onto HTTP status codes.

use http::StatusCode;

use crate::error::MatchError;

/// Returns the status code a caller should send for a given [`MatchError`].
///
/// `HostNotFound` and `PathBadRequest` both map to 400: a host the table doesn't
/// recognize and a syntactically invalid path are both treated as a bad request,
/// while a recognized host with no matching path is a 404.
pub fn status_for(error: MatchError) -> StatusCode {
    match error {
        MatchError::HostNotFound => StatusCode::BAD_REQUEST,
        MatchError::PathBadRequest => StatusCode::BAD_REQUEST,
        MatchError::PathNotFound => StatusCode::NOT_FOUND,
    }
}
