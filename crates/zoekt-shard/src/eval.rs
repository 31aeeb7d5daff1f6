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

//! Search and List over one shard: metadata-aware query folding, the
//! document loop with cost-tiered evaluation, candidate gathering and
//! scoring.

use log::{debug, error};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::contentprovider::{
    ContentProvider, SCORE_FACTOR_ATOM_MATCH, SCORE_FILE_ORDER_FACTOR, SCORE_IMPORTANT_THRESHOLD,
    SCORE_LINE_ORDER_FACTOR, SCORE_SHARD_RANK_FACTOR,
};
use crate::error::SearchError;
use crate::matchtree::{
    visit_match_tree, visit_matches, CandidateMatch, MatchTree, TreeBuilder, COST_MAX, COST_MIN,
};
use crate::query::{self, Query};
use crate::shard::IndexData;
use crate::types::{
    CancelToken, FileMatch, ListOptions, MinimalRepoListEntry, RepoList, SearchOptions,
    SearchResult, Stats,
};

const MAX_U16: f64 = 0xffff as f64;

impl IndexData {
    /// Fold a repository-level predicate against the shard. All alive
    /// repositories passing makes the atom vacuous; none passing kills the
    /// whole query.
    fn simplify_multi_repo(&self, q: Query, predicate: impl Fn(&str) -> bool) -> Query {
        let mut count = 0;
        let mut alive = self.repo_meta_data.len();
        for (i, md) in self.repo_meta_data.iter().enumerate() {
            if self.repo_tombstone[i] {
                alive -= 1;
            } else if predicate(&md.name) {
                count += 1;
            }
        }
        if count == alive {
            return Query::Const(true);
        }
        if count > 0 {
            return q;
        }
        Query::Const(false)
    }

    /// Constant-fold query atoms against shard metadata, then apply the
    /// generic boolean simplification.
    pub fn simplify(&self, q: Query) -> Query {
        let folded = query::map(q, &mut |q| match q {
            Query::Repo(ref pattern) => {
                let pattern = pattern.clone();
                self.simplify_multi_repo(q, |name| name.contains(pattern.as_str()))
            }
            Query::RepoSet(ref set) => {
                let set = set.clone();
                self.simplify_multi_repo(q, |name| set.contains(name))
            }
            Query::RepoBranches(ref set) => {
                if self.repo_meta_data.len() == 1 {
                    // Compound shards are too complicated to fold since each
                    // repo may hold different branches.
                    return query::repo_branches_for(set, &self.repo_meta_data[0].name);
                }
                let named = self
                    .repo_meta_data
                    .iter()
                    .any(|md| set.contains_key(&md.name));
                if named {
                    q
                } else {
                    Query::Const(false)
                }
            }
            Query::Language(ref name) => {
                if self.language_map.contains_key(name) {
                    q
                } else {
                    Query::Const(false)
                }
            }
            other => other,
        });
        query::simplify(folded)
    }

    pub fn search(
        &self,
        ctx: &CancelToken,
        q: &Query,
        opts: &SearchOptions,
    ) -> Result<SearchResult, SearchError> {
        let mut opts = opts.clone();
        opts.set_defaults();
        let mut important_match_count = 0usize;

        let mut res = SearchResult::default();
        if self.file_names.is_empty() {
            return Ok(res);
        }
        if ctx.is_cancelled() {
            res.stats.shards_skipped += 1;
            return Ok(res);
        }

        let q = self.simplify(q.clone());
        debug!("shard search, simplified query: {}", q);
        if let Query::Const(false) = q {
            return Ok(res);
        }
        if opts.estimate_doc_count {
            res.stats.shard_files_considered = self.file_branch_masks.len();
            return Ok(res);
        }

        let q = query::map(q, &mut query::expand_file_content);

        let mut builder = TreeBuilder::new(self);
        let mut mt = builder.build(&q)?;

        let mut total_atom_count = 0usize;
        visit_match_tree(&mt, &mut |_| total_atom_count += 1);

        let mut cp = ContentProvider::new(self);
        let doc_count = self.doc_count();
        let mut last_doc: i64 = -1;

        'next_file_match: loop {
            let canceled = ctx.is_cancelled();

            let mut next_doc = mt.next_doc();
            if (next_doc as i64) <= last_doc {
                next_doc = (last_doc + 1) as u32;
            }
            // Skip tombstoned docs.
            while next_doc < doc_count
                && self.repo_tombstone[self.repos[next_doc as usize] as usize]
            {
                next_doc += 1;
            }
            if next_doc >= doc_count {
                break;
            }
            last_doc = next_doc as i64;

            if canceled
                || res.stats.match_count >= opts.shard_max_match_count
                || (opts.shard_max_important_match > 0
                    && important_match_count >= opts.shard_max_important_match)
            {
                res.stats.files_skipped += self.docs_remaining_in_repo(next_doc);
                break;
            }

            res.stats.files_considered += 1;
            mt.prepare(next_doc);
            cp.set_document(next_doc);

            let mut known: HashMap<u32, bool> = HashMap::new();
            let repo_idx = self.repos[next_doc as usize] as usize;
            let md = &self.repo_meta_data[repo_idx];

            for cost in COST_MIN..=COST_MAX {
                match mt.matches(&mut cp, cost, &mut known) {
                    Some(false) => continue 'next_file_match,
                    Some(true) => {}
                    None => {
                        if cost == COST_MAX {
                            error!(
                                "match tree did not decide, repo {}, doc {}, known {:?}",
                                md.name, next_doc, known
                            );
                            panic!(
                                "match tree did not decide, repo {}, doc {}, known {:?}",
                                md.name, next_doc, known
                            );
                        }
                    }
                }
            }

            let mut file_match = FileMatch {
                repository: md.name.clone(),
                repository_id: md.id,
                file_name: String::from_utf8_lossy(self.file_name(next_doc)).into_owned(),
                checksum: self.checksum(next_doc).to_vec(),
                language: self
                    .language_names
                    .get(&self.languages[next_doc as usize])
                    .cloned()
                    .unwrap_or_default(),
                ..Default::default()
            };

            let sub = self.sub_repos[next_doc as usize];
            if sub > 0 {
                if sub as usize >= self.sub_repo_paths[repo_idx].len() {
                    panic!(
                        "corrupt index: subrepo {} beyond {:?}",
                        sub, self.sub_repo_paths[repo_idx]
                    );
                }
                let path = &self.sub_repo_paths[repo_idx][sub as usize];
                file_match.sub_repository_path = path.clone();
                if let Some(sub_repo) = md.sub_repo_map.get(path) {
                    file_match.sub_repository_name = sub_repo.name.clone();
                    if let Some(idx) = self.branch_index(next_doc) {
                        if let Some(b) = sub_repo.branches.get(idx) {
                            file_match.version = b.version.clone();
                        }
                    }
                }
            } else if let Some(idx) = self.branch_index(next_doc) {
                if let Some(b) = md.branches.get(idx) {
                    file_match.version = b.version.clone();
                }
            }

            let mut atom_match_count = 0usize;
            visit_matches(&mt, &known, &mut |_| atom_match_count += 1);

            let mut final_cands = gather_matches(&mt, &known);
            if final_cands.is_empty() {
                // The query matched the document structurally (repo, branch,
                // language); report the file itself.
                let name = self.file_name(next_doc);
                let bytes: Arc<[u8]> = name.into();
                let lowered: Arc<[u8]> = name.to_ascii_lowercase().into();
                final_cands.push(CandidateMatch {
                    file_name: true,
                    case_sensitive: false,
                    substr_bytes: bytes,
                    substr_lowered: lowered,
                    file: next_doc,
                    rune_offset: 0,
                    byte_offset: 0,
                    byte_match_sz: name.len() as u32,
                });
            }

            let mut max_file_score = 0.0f64;
            let match_increment;
            if opts.chunk_matches {
                file_match.chunk_matches = cp.fill_chunk_matches(&final_cands);
                let n = file_match.chunk_matches.len();
                for (i, cm) in file_match.chunk_matches.iter_mut().enumerate() {
                    if max_file_score < cm.score {
                        max_file_score = cm.score;
                    }
                    cm.score += SCORE_LINE_ORDER_FACTOR * (1.0 - (i as f64 / n as f64));
                }
                match_increment = file_match
                    .chunk_matches
                    .iter()
                    .map(|c| c.ranges.len())
                    .sum();
            } else {
                file_match.line_matches = cp.fill_matches(final_cands);
                let n = file_match.line_matches.len();
                for (i, lm) in file_match.line_matches.iter_mut().enumerate() {
                    if max_file_score < lm.score {
                        max_file_score = lm.score;
                    }
                    // Order by ordering in file.
                    lm.score += SCORE_LINE_ORDER_FACTOR * (1.0 - (i as f64 / n as f64));
                }
                match_increment = file_match.line_matches.len();
            }

            // File ordering strictly dominates the in-file ordering of the
            // matches.
            let debug_score = opts.debug_score;
            file_match.add_score("fragment", max_file_score, debug_score);
            file_match.add_score(
                "atom",
                atom_match_count as f64 / total_atom_count as f64 * SCORE_FACTOR_ATOM_MATCH,
                debug_score,
            );
            // Prefer earlier docs.
            file_match.add_score(
                "doc-order",
                SCORE_FILE_ORDER_FACTOR * (1.0 - next_doc as f64 / doc_count as f64),
                debug_score,
            );
            file_match.add_score(
                "shard-order",
                SCORE_SHARD_RANK_FACTOR * md.rank as f64 / MAX_U16,
                debug_score,
            );

            if file_match.score > SCORE_IMPORTANT_THRESHOLD {
                important_match_count += 1;
            }
            file_match.branches = self.gather_branches(next_doc, &mt, &known);
            sort_matches_by_score(&mut file_match.line_matches);
            sort_chunks_by_score(&mut file_match.chunk_matches);
            if opts.whole {
                file_match.content = Some(cp.data(false).to_vec());
            }

            res.stats.match_count += match_increment;
            res.stats.file_count += 1;
            res.files.push(file_match);
        }
        sort_files_by_score(&mut res.files);

        for (i, md) in self.repo_meta_data.iter().enumerate() {
            if self.repo_tombstone[i] {
                continue;
            }
            add_repo(&mut res, md);
            for sub in md.sub_repo_map.values() {
                add_repo(&mut res, sub);
            }
        }

        let mut index_stats = Stats::default();
        visit_match_tree(&mt, &mut |m| match m {
            MatchTree::Substr(s) => {
                index_stats.ngram_matches += s.hits;
                index_stats.index_bytes_loaded += s.index_bytes;
            }
            MatchTree::SymbolSubstr(s) => {
                index_stats.ngram_matches += s.inner.hits;
                index_stats.index_bytes_loaded += s.inner.index_bytes;
            }
            _ => {}
        });
        res.stats.add(&index_stats);
        res.stats.add(&cp.stats);
        Ok(res)
    }

    /// Branch names to report for a matched document: the branches a fired
    /// branch atom selected, or every branch the document is on.
    fn gather_branches(
        &self,
        doc: u32,
        mt: &MatchTree<'_>,
        known: &HashMap<u32, bool>,
    ) -> Vec<String> {
        let repo_idx = self.repos[doc as usize] as usize;
        let mut found_branch_query = false;
        let mut branches = Vec::new();
        visit_matches(mt, known, &mut |m| {
            if let MatchTree::Branch(bq) = m {
                found_branch_query = true;
                let mask = bq.fired_mask(repo_idx);
                let mut bit = 1u64;
                while bit != 0 && bit <= mask {
                    if mask & bit != 0 {
                        if let Some(name) = self.branch_names[repo_idx].get(&bit) {
                            branches.push(name.clone());
                        }
                    }
                    bit <<= 1;
                }
            }
        });

        if !found_branch_query {
            let mask = self.file_branch_masks[doc as usize];
            let mut bit = 1u64;
            while bit != 0 && bit <= mask {
                if mask & bit != 0 {
                    if let Some(name) = self.branch_names[repo_idx].get(&bit) {
                        branches.push(name.clone());
                    }
                }
                bit <<= 1;
            }
        }
        branches
    }

    pub fn list(
        &self,
        ctx: &CancelToken,
        q: &Query,
        opts: &ListOptions,
    ) -> Result<RepoList, SearchError> {
        let q = self.simplify(q.clone());
        debug!("shard list, simplified query: {}", q);

        let include_all = match q {
            Query::Const(false) => return Ok(RepoList::default()),
            Query::Const(true) => true,
            _ => false,
        };

        let mut list = RepoList::default();
        for (i, rle) in self.repo_list_entries.iter().enumerate() {
            if self.repo_tombstone[i] {
                continue;
            }
            let included = if include_all {
                true
            } else {
                // Run a one-match search per repo to decide inclusion.
                let mut set = BTreeSet::new();
                set.insert(rle.repository.name.clone());
                let one_repo = Query::And(vec![Query::RepoSet(set), q.clone()]);
                let sr = self.search(
                    ctx,
                    &one_repo,
                    &SearchOptions {
                        shard_max_match_count: 1,
                        total_max_match_count: 1,
                        ..Default::default()
                    },
                )?;
                !sr.files.is_empty()
            };
            if !included {
                continue;
            }

            let id = rle.repository.id;
            if id != 0 && opts.minimal {
                list.minimal.insert(
                    id,
                    MinimalRepoListEntry {
                        has_symbols: rle.repository.has_symbols,
                        branches: rle.repository.branches.clone(),
                    },
                );
            } else {
                list.repos.push(rle.clone());
            }
        }
        Ok(list)
    }
}

fn add_repo(res: &mut SearchResult, repo: &crate::types::Repository) {
    res.repo_urls
        .insert(repo.name.clone(), repo.file_url_template.clone());
    res.line_fragments
        .insert(repo.name.clone(), repo.line_fragment_template.clone());
}

/// Gather concrete spans from the atoms that fired for this document. Never
/// returns a mixture of file-name and content matches: content matches
/// suppress all file-name matches. The result is offset-sorted and
/// non-overlapping.
fn gather_matches(mt: &MatchTree<'_>, known: &HashMap<u32, bool>) -> Vec<CandidateMatch> {
    let mut cands = Vec::new();
    visit_matches(mt, known, &mut |m| match m {
        MatchTree::Substr(s) => cands.extend(s.current.iter().cloned()),
        MatchTree::SymbolSubstr(s) => cands.extend(s.inner.current.iter().cloned()),
        MatchTree::Regexp(r) => cands.extend(r.found.iter().cloned()),
        MatchTree::SymbolRegexp(r) => cands.extend(r.inner.found.iter().cloned()),
        _ => {}
    });
    merge_candidates(suppress_file_name_matches(cands))
}

fn suppress_file_name_matches(mut cands: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
    let found_content_match = cands.iter().any(|c| !c.file_name);
    if found_content_match {
        cands.retain(|c| !c.file_name);
    }
    cands
}

/// Sort by offset and merge adjacent or overlapping spans in one pass.
fn merge_candidates(mut cands: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
    cands.sort_by_key(|c| c.byte_offset);
    let mut out: Vec<CandidateMatch> = Vec::with_capacity(cands.len());
    for c in cands {
        if let Some(last) = out.last_mut() {
            let last_end = last.byte_offset + last.byte_match_sz;
            let end = c.byte_offset + c.byte_match_sz;
            if last_end >= c.byte_offset {
                if end > last_end {
                    last.byte_match_sz = end - last.byte_offset;
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

pub fn sort_files_by_score(files: &mut [FileMatch]) {
    files.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

pub(crate) fn sort_matches_by_score(matches: &mut [crate::types::LineMatch]) {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

pub(crate) fn sort_chunks_by_score(matches: &mut [crate::types::ChunkMatch]) {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
