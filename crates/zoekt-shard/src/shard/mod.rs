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

//! Shard data: the read-only arrays and posting maps the evaluator consumes.
//!
//! Search and List are implemented as methods on [`IndexData`] in the
//! evaluator module; everything here is plumbing and accessors.

use memmap2::Mmap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::types::{RepoListEntry, Repository};

mod builder;
pub use builder::{Document, ShardBuilder};

/// Trigram to (document, byte offsets) posting lists.
pub type PostingsMap = HashMap<[u8; 3], BTreeMap<u32, Vec<u32>>>;

/// A byte range covering one symbol definition within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSection {
    pub start: u32,
    pub end: u32,
}

/// Document contents, either owned or sliced out of a mapped shard file.
pub enum DocStore {
    InMemory(Vec<Vec<u8>>),
    Mmap {
        map: Arc<Mmap>,
        /// `boundaries[d]..boundaries[d+1]` is document `d`.
        boundaries: Vec<u32>,
    },
}

impl DocStore {
    pub fn get(&self, doc: u32) -> &[u8] {
        match self {
            DocStore::InMemory(v) => &v[doc as usize],
            DocStore::Mmap { map, boundaries } => {
                let beg = boundaries[doc as usize] as usize;
                let end = boundaries[doc as usize + 1] as usize;
                &map[beg..end]
            }
        }
    }
}

/// An open, immutable shard. All arrays are indexed by document ID except
/// the per-repository tables.
pub struct IndexData {
    pub(crate) repo_meta_data: Vec<Repository>,
    pub(crate) repo_tombstone: Vec<bool>,
    pub(crate) repo_list_entries: Vec<RepoListEntry>,
    /// Document to repository index. Documents of one repository are
    /// contiguous.
    pub(crate) repos: Vec<u32>,
    /// Document to index in `sub_repo_paths[repo]`; 0 means no sub-repo.
    pub(crate) sub_repos: Vec<u32>,
    /// Per repository: "" at index 0, then sorted sub-repository paths.
    pub(crate) sub_repo_paths: Vec<Vec<String>>,
    /// Bit `k` set iff the document belongs to the repo's branch `k`.
    /// Never zero for a live document.
    pub(crate) file_branch_masks: Vec<u64>,
    /// Per repository: branch bit value to branch name.
    pub(crate) branch_names: Vec<HashMap<u64, String>>,
    pub(crate) languages: Vec<u8>,
    pub(crate) language_map: HashMap<String, u8>,
    pub(crate) language_names: HashMap<u8, String>,
    pub(crate) file_names: Vec<Vec<u8>>,
    pub(crate) checksums: Vec<[u8; 32]>,
    pub(crate) doc_sections: Vec<Vec<DocumentSection>>,
    pub(crate) content_postings: PostingsMap,
    pub(crate) name_postings: PostingsMap,
    pub(crate) contents: DocStore,
}

impl IndexData {
    pub fn doc_count(&self) -> u32 {
        self.file_branch_masks.len() as u32
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repo_meta_data
    }

    pub(crate) fn document(&self, doc: u32) -> &[u8] {
        self.contents.get(doc)
    }

    pub(crate) fn file_name(&self, doc: u32) -> &[u8] {
        &self.file_names[doc as usize]
    }

    pub(crate) fn checksum(&self, doc: u32) -> &[u8] {
        &self.checksums[doc as usize]
    }

    pub(crate) fn postings(&self, tri: [u8; 3], file_name: bool) -> Option<&BTreeMap<u32, Vec<u32>>> {
        if file_name {
            self.name_postings.get(&tri)
        } else {
            self.content_postings.get(&tri)
        }
    }

    /// Index of the lowest set branch bit, used to pick the version string.
    pub(crate) fn branch_index(&self, doc: u32) -> Option<usize> {
        let mask = self.file_branch_masks[doc as usize];
        if mask == 0 {
            None
        } else {
            Some(mask.trailing_zeros() as usize)
        }
    }

    /// Documents of `doc`'s repository from `doc` (inclusive) to the end of
    /// that repository's contiguous range.
    pub(crate) fn docs_remaining_in_repo(&self, doc: u32) -> usize {
        let repo = self.repos[doc as usize];
        self.repos[doc as usize..]
            .iter()
            .take_while(|&&r| r == repo)
            .count()
    }
}

pub(crate) fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut i = 0;
    let mut j = 0;
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(a[i]);
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}
