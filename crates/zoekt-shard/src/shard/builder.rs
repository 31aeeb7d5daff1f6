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

use memmap2::Mmap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::{DocStore, DocumentSection, IndexData, PostingsMap};
use crate::error::SearchError;
use crate::ngram::trigrams_with_pos;
use crate::types::{RepoBranch, RepoListEntry, RepoStats, Repository};

/// One file to index. Branch names must appear in the owning repository's
/// branch list; unknown names are dropped. A document with no resolvable
/// branch is placed on the repository's first branch.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub name: String,
    pub content: Vec<u8>,
    pub branches: Vec<String>,
    pub language: String,
    /// Byte ranges of symbol definitions, sorted and non-overlapping.
    pub symbol_ranges: Vec<(u32, u32)>,
    /// Path into the repository's sub-repo map, if the file belongs to one.
    pub sub_repo_path: Option<String>,
}

struct DocEntry {
    repo: u32,
    doc: Document,
}

/// Assembles an immutable [`IndexData`] in memory. Documents are appended to
/// the most recently added repository, which keeps each repository's
/// documents contiguous in document-ID order.
#[derive(Default)]
pub struct ShardBuilder {
    repos: Vec<Repository>,
    tombstones: Vec<bool>,
    docs: Vec<DocEntry>,
}

impl ShardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repository(&mut self, mut repo: Repository, tombstoned: bool) -> &mut Self {
        if repo.branches.is_empty() {
            repo.branches.push(RepoBranch {
                name: "HEAD".to_string(),
                version: String::new(),
            });
        }
        self.repos.push(repo);
        self.tombstones.push(tombstoned);
        self
    }

    pub fn add_document(&mut self, doc: Document) -> &mut Self {
        let repo = self
            .repos
            .len()
            .checked_sub(1)
            .expect("add_repository before add_document") as u32;
        self.docs.push(DocEntry { repo, doc });
        self
    }

    /// Build with document contents held in memory.
    pub fn build(self) -> IndexData {
        let contents: Vec<Vec<u8>> = self.docs.iter().map(|d| d.doc.content.clone()).collect();
        self.assemble(DocStore::InMemory(contents))
    }

    /// Build with document contents concatenated into a file at `path` and
    /// memory-mapped, the way an on-disk shard serves content.
    pub fn build_mapped(self, path: &Path) -> Result<IndexData, SearchError> {
        let mut boundaries: Vec<u32> = Vec::with_capacity(self.docs.len() + 1);
        let mut f = File::create(path)?;
        let mut off = 0u32;
        boundaries.push(0);
        for d in &self.docs {
            f.write_all(&d.doc.content)?;
            off += d.doc.content.len() as u32;
            boundaries.push(off);
        }
        f.flush()?;
        let f = File::open(path)?;
        let map = unsafe { Mmap::map(&f)? };
        Ok(self.assemble(DocStore::Mmap {
            map: Arc::new(map),
            boundaries,
        }))
    }

    fn assemble(self, contents: DocStore) -> IndexData {
        let ShardBuilder {
            mut repos,
            tombstones,
            docs,
        } = self;

        // Per-repo branch bits and sub-repo path tables.
        let mut branch_names: Vec<HashMap<u64, String>> = Vec::with_capacity(repos.len());
        let mut sub_repo_paths: Vec<Vec<String>> = Vec::with_capacity(repos.len());
        for repo in &repos {
            let mut names = HashMap::new();
            for (k, b) in repo.branches.iter().enumerate() {
                names.insert(1u64 << k, b.name.clone());
            }
            branch_names.push(names);

            let mut paths: Vec<String> = repo.sub_repo_map.keys().cloned().collect();
            paths.sort();
            paths.insert(0, String::new());
            sub_repo_paths.push(paths);
        }

        let mut language_map: HashMap<String, u8> = HashMap::new();
        let mut language_names: HashMap<u8, String> = HashMap::new();
        let mut repo_docs: Vec<usize> = vec![0; repos.len()];
        let mut repo_bytes: Vec<u64> = vec![0; repos.len()];

        let mut doc_repos = Vec::with_capacity(docs.len());
        let mut sub_repos = Vec::with_capacity(docs.len());
        let mut file_branch_masks = Vec::with_capacity(docs.len());
        let mut languages = Vec::with_capacity(docs.len());
        let mut file_names = Vec::with_capacity(docs.len());
        let mut checksums = Vec::with_capacity(docs.len());
        let mut doc_sections = Vec::with_capacity(docs.len());
        let mut content_postings: PostingsMap = HashMap::new();
        let mut name_postings: PostingsMap = HashMap::new();

        for (doc_id, entry) in docs.iter().enumerate() {
            let repo_idx = entry.repo as usize;
            let repo = &mut repos[repo_idx];
            let doc = &entry.doc;
            doc_repos.push(entry.repo);
            repo_docs[repo_idx] += 1;
            repo_bytes[repo_idx] += doc.content.len() as u64;

            let mut mask = 0u64;
            for b in &doc.branches {
                if let Some(k) = repo.branches.iter().position(|rb| &rb.name == b) {
                    mask |= 1 << k;
                }
            }
            if mask == 0 {
                mask = 1;
            }
            file_branch_masks.push(mask);

            let sub = doc
                .sub_repo_path
                .as_ref()
                .and_then(|p| sub_repo_paths[repo_idx].iter().position(|s| s == p))
                .unwrap_or(0);
            sub_repos.push(sub as u32);

            let next = language_map.len() as u8;
            let byte = *language_map.entry(doc.language.clone()).or_insert(next);
            language_names.entry(byte).or_insert_with(|| doc.language.clone());
            languages.push(byte);

            file_names.push(doc.name.clone().into_bytes());
            checksums.push(Sha256::digest(&doc.content).into());
            doc_sections.push(
                doc.symbol_ranges
                    .iter()
                    .map(|&(start, end)| DocumentSection { start, end })
                    .collect::<Vec<_>>(),
            );
            if !doc.symbol_ranges.is_empty() {
                repo.has_symbols = true;
            }

            for (tri, pos) in trigrams_with_pos(&doc.content) {
                content_postings
                    .entry(tri)
                    .or_default()
                    .entry(doc_id as u32)
                    .or_default()
                    .push(pos);
            }
            for (tri, pos) in trigrams_with_pos(doc.name.as_bytes()) {
                name_postings
                    .entry(tri)
                    .or_default()
                    .entry(doc_id as u32)
                    .or_default()
                    .push(pos);
            }
        }

        let repo_list_entries = repos
            .iter()
            .enumerate()
            .map(|(i, r)| RepoListEntry {
                repository: r.clone(),
                stats: RepoStats {
                    documents: repo_docs[i],
                    content_bytes: repo_bytes[i],
                    shards: 1,
                },
            })
            .collect();

        IndexData {
            repo_meta_data: repos,
            repo_tombstone: tombstones,
            repo_list_entries,
            repos: doc_repos,
            sub_repos,
            sub_repo_paths,
            file_branch_masks,
            branch_names,
            languages,
            language_map,
            language_names,
            file_names,
            checksums,
            doc_sections,
            content_postings,
            name_postings,
            contents,
        }
    }
}
