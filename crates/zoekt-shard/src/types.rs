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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One branch of a repository as recorded in the shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoBranch {
    pub name: String,
    pub version: String,
}

/// Repository metadata carried by the shard. Branches are ordered; branch
/// bit `k` in a document's branch mask refers to `branches[k]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub id: u32,
    /// Importance of the repository, bigger is more important. 16-bit range.
    pub rank: u16,
    pub file_url_template: String,
    pub line_fragment_template: String,
    pub branches: Vec<RepoBranch>,
    /// Nested repositories (e.g. submodules) addressed by path.
    pub sub_repo_map: HashMap<String, Repository>,
    pub has_symbols: bool,
}

/// Counters for one repository within the shard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RepoStats {
    pub documents: usize,
    pub content_bytes: u64,
    pub shards: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoListEntry {
    pub repository: Repository,
    pub stats: RepoStats,
}

/// Compact listing payload keyed by repository ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimalRepoListEntry {
    pub has_symbols: bool,
    pub branches: Vec<RepoBranch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoList {
    pub repos: Vec<RepoListEntry>,
    pub minimal: HashMap<u32, MinimalRepoListEntry>,
    pub crashes: usize,
}

/// Performance counters, monotonically increasing over one call. `add`
/// merges counters from another source (a content provider, another shard).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub content_bytes_loaded: u64,
    pub index_bytes_loaded: u64,
    pub crashes: usize,
    pub file_count: usize,
    pub shard_files_considered: usize,
    pub files_considered: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub shards_skipped: usize,
    pub match_count: usize,
    pub ngram_matches: usize,
}

impl Stats {
    pub fn add(&mut self, o: &Stats) {
        self.content_bytes_loaded += o.content_bytes_loaded;
        self.index_bytes_loaded += o.index_bytes_loaded;
        self.crashes += o.crashes;
        self.file_count += o.file_count;
        self.shard_files_considered += o.shard_files_considered;
        self.files_considered += o.files_considered;
        self.files_loaded += o.files_loaded;
        self.files_skipped += o.files_skipped;
        self.shards_skipped += o.shards_skipped;
        self.match_count += o.match_count;
        self.ngram_matches += o.ngram_matches;
    }
}

/// One match fragment within a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFragmentMatch {
    /// Byte offset of the fragment within the document (or file name).
    pub offset: u32,
    /// Byte offset of the fragment within `line`.
    pub line_offset: usize,
    pub match_length: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineMatch {
    pub line: Vec<u8>,
    pub line_start: usize,
    pub line_end: usize,
    /// 1-based.
    pub line_number: usize,
    pub score: f64,
    /// True when the match is against the file name rather than content.
    pub file_name: bool,
    pub line_fragments: Vec<LineFragmentMatch>,
}

/// A position within a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub byte_offset: u32,
    /// 1-based.
    pub line_number: u32,
    /// 1-based character offset within the line.
    pub column: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

/// A contiguous run of lines containing one or more match ranges. Emitted
/// instead of [`LineMatch`] when [`SearchOptions::chunk_matches`] is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub content: Vec<u8>,
    pub content_start: Location,
    pub file_name: bool,
    pub ranges: Vec<Range>,
    pub score: f64,
}

/// A matched document with its line spans and score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMatch {
    pub score: f64,
    /// Score breakdown, filled when [`SearchOptions::debug_score`] is set.
    pub debug: String,
    pub file_name: String,
    pub repository: String,
    pub repository_id: u32,
    pub branches: Vec<String>,
    pub line_matches: Vec<LineMatch>,
    pub chunk_matches: Vec<ChunkMatch>,
    /// Whole-document content, filled when [`SearchOptions::whole`] is set.
    pub content: Option<Vec<u8>>,
    pub checksum: Vec<u8>,
    pub language: String,
    pub sub_repository_name: String,
    pub sub_repository_path: String,
    /// Version (commit) of the matched branch.
    pub version: String,
}

impl FileMatch {
    pub(crate) fn add_score(&mut self, what: &str, s: f64, debug: bool) {
        if debug {
            self.debug.push_str(&format!("{}:{}, ", what, s));
        }
        self.score += s;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub stats: Stats,
    pub files: Vec<FileMatch>,
    /// Repository name to URL template.
    pub repo_urls: HashMap<String, String>,
    /// Repository name to line fragment template.
    pub line_fragments: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Return only an estimate of the number of documents the query would
    /// consider.
    pub estimate_doc_count: bool,
    /// Return whole-document content on each match.
    pub whole: bool,
    /// Return chunk matches instead of line matches.
    pub chunk_matches: bool,
    /// Maximum number of matches to collect from this shard. 0 picks the
    /// default.
    pub shard_max_match_count: usize,
    /// Maximum number of matches across shards; enforced by the aggregator.
    pub total_max_match_count: usize,
    /// Maximum number of important matches to collect from this shard.
    pub shard_max_important_match: usize,
    /// Maximum number of important matches across shards.
    pub total_max_important_match: usize,
    /// Record the score breakdown on each file match.
    pub debug_score: bool,
}

impl SearchOptions {
    /// Fill unset bounds. Overly broad searches are capped so they cannot
    /// exhaust the machine.
    pub fn set_defaults(&mut self) {
        if self.shard_max_match_count == 0 {
            self.shard_max_match_count = 100_000;
        }
        if self.total_max_match_count == 0 {
            self.total_max_match_count = 10 * self.shard_max_match_count;
        }
        if self.shard_max_important_match == 0 {
            self.shard_max_important_match = 10;
        }
        if self.total_max_important_match == 0 {
            self.total_max_important_match = 10 * self.shard_max_important_match;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Return `RepoList::minimal` entries instead of full metadata.
    pub minimal: bool,
}

/// Cooperative cancellation handle. Polled between documents; observing a
/// cancellation yields a partial result, never an error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
