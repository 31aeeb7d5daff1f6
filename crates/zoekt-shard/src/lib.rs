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

//! Shard-level search core.
//!
//! A shard is an immutable index over one or more repositories. This crate
//! evaluates a [`Query`] against a single open shard: it folds the query
//! against shard metadata, compiles it into a tree of match atoms, walks
//! documents with cost-tiered lazy evaluation, and returns scored file
//! matches with line-level positions. Multi-shard aggregation, the on-disk
//! format and the ingest pipeline live elsewhere.

pub mod error;
pub mod ngram;
pub mod query;
pub mod shard;
pub mod types;

mod contentprovider;
mod eval;
mod matchtree;
mod regex_lower;

// Flat re-exports for downstream callers that prefer a small import surface.
pub use crate::error::SearchError;
pub use crate::eval::sort_files_by_score;
pub use crate::query::Query;
pub use crate::shard::{Document, IndexData, ShardBuilder};
pub use crate::types::{
    CancelToken, FileMatch, LineMatch, ListOptions, RepoList, SearchOptions, SearchResult, Stats,
};
