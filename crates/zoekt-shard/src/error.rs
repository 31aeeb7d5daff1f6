// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error;
use std::fmt::{self, Display};

/// Typed errors surfaced by match-tree construction and shard reads.
///
/// Cancellation and result bounds are normal termination paths and never
/// produce an error; invariant violations inside the evaluator panic instead.
#[derive(Debug)]
pub enum SearchError {
    /// A regex atom failed to parse or compile.
    InvalidRegex(String),
    /// A language atom names a language the shard does not index.
    UnknownLanguage(String),
    /// A substring atom is shorter than the trigram width.
    PatternTooShort(String),
    /// The query tree contains a shape the factory cannot compile.
    InvalidQuery(String),
    /// An underlying shard read failed.
    Io(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::InvalidRegex(s) => write!(f, "invalid regex: {}", s),
            SearchError::UnknownLanguage(s) => write!(f, "unknown language: {}", s),
            SearchError::PatternTooShort(s) => {
                write!(f, "pattern {:?} shorter than trigram width", s)
            }
            SearchError::InvalidQuery(s) => write!(f, "invalid query: {}", s),
            SearchError::Io(s) => write!(f, "shard read error: {}", s),
        }
    }
}

impl Error for SearchError {}

impl From<regex::Error> for SearchError {
    fn from(e: regex::Error) -> Self {
        SearchError::InvalidRegex(e.to_string())
    }
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        SearchError::Io(e.to_string())
    }
}
