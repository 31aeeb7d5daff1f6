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

//! Match trees: the compiled form of a query.
//!
//! Every node advances over documents via `next_doc`/`prepare` and answers
//! `matches` at a given cost tier with a tri-state `Option<bool>`: `None`
//! means the node cannot decide this document at this tier yet. The driver
//! walks tiers from cheap to expensive so that posting-list atoms prune
//! documents before any content is read or a regex runs.

use regex::bytes::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::contentprovider::ContentProvider;
use crate::error::SearchError;
use crate::ngram::{case_variants, trigrams, NGRAM_SIZE};
use crate::query::{repo_branches_for, Query};
use crate::regex_lower::lower_regex;
use crate::shard::{intersect_sorted, IndexData};

pub(crate) const COST_CONST: u32 = 0;
pub(crate) const COST_MEMORY: u32 = 1;
pub(crate) const COST_CONTENT: u32 = 2;
pub(crate) const COST_REGEXP: u32 = 3;
pub(crate) const COST_MIN: u32 = COST_CONST;
pub(crate) const COST_MAX: u32 = COST_REGEXP;

pub(crate) const NO_DOC: u32 = u32::MAX;

/// A concrete match occurrence within one document or file name.
#[derive(Debug, Clone)]
pub(crate) struct CandidateMatch {
    pub file_name: bool,
    pub case_sensitive: bool,
    pub substr_bytes: Arc<[u8]>,
    pub substr_lowered: Arc<[u8]>,
    pub file: u32,
    pub rune_offset: u32,
    pub byte_offset: u32,
    pub byte_match_sz: u32,
}

impl CandidateMatch {
    /// Verify the candidate against the actual bytes. Posting offsets only
    /// prove the first trigram was present.
    fn match_content(&self, data: &[u8]) -> bool {
        let start = self.byte_offset as usize;
        let end = start + self.substr_bytes.len();
        if end > data.len() {
            return false;
        }
        if self.case_sensitive {
            data[start..end] == *self.substr_bytes
        } else {
            data[start..end]
                .iter()
                .zip(self.substr_lowered.iter())
                .all(|(a, b)| a.to_ascii_lowercase() == *b)
        }
    }
}

pub(crate) struct SubstrMatchTree {
    id: u32,
    file_name: bool,
    /// All candidate positions in the shard, sorted by (document, offset).
    cands: Vec<CandidateMatch>,
    pos: usize,
    /// Candidates of the document being evaluated, pruned at content tier.
    pub(crate) current: Vec<CandidateMatch>,
    cont_evaluated: bool,
    /// Posting hits scanned at construction, reported into `Stats`.
    pub(crate) hits: usize,
    pub(crate) index_bytes: u64,
}

pub(crate) struct RegexpMatchTree<'a> {
    id: u32,
    regex: Regex,
    file_name: bool,
    pub(crate) child: Box<MatchTree<'a>>,
    pub(crate) found: Vec<CandidateMatch>,
    re_evaluated: bool,
    doc: u32,
}

pub(crate) struct SymbolSubstrMatchTree {
    pub(crate) inner: SubstrMatchTree,
}

pub(crate) struct SymbolRegexpMatchTree<'a> {
    pub(crate) inner: RegexpMatchTree<'a>,
}

pub(crate) struct BranchQueryMatchTree<'a> {
    id: u32,
    data: &'a IndexData,
    /// Per-repository OR of the branch bits the query names.
    pub(crate) masks: Vec<u64>,
    first_done: bool,
    doc: u32,
}

/// A precomputed sorted document list, backing language and repository atoms.
pub(crate) struct DocMatchTree {
    id: u32,
    docs: Vec<u32>,
    idx: usize,
    current: bool,
}

pub(crate) struct BruteForceMatchTree {
    id: u32,
    first_done: bool,
    doc: u32,
}

pub(crate) struct NoMatchTree {
    id: u32,
    #[allow(dead_code)]
    pub(crate) why: &'static str,
}

pub(crate) struct AndMatchTree<'a> {
    id: u32,
    pub(crate) children: Vec<MatchTree<'a>>,
}

/// AND whose children must additionally match on a shared line. Children are
/// substring atoms by construction; anything else degrades to plain AND.
pub(crate) struct AndLineMatchTree<'a> {
    id: u32,
    pub(crate) children: Vec<MatchTree<'a>>,
}

pub(crate) struct OrMatchTree<'a> {
    id: u32,
    pub(crate) children: Vec<MatchTree<'a>>,
}

pub(crate) struct NotMatchTree<'a> {
    id: u32,
    pub(crate) child: Box<MatchTree<'a>>,
}

pub(crate) enum MatchTree<'a> {
    Substr(SubstrMatchTree),
    SymbolSubstr(SymbolSubstrMatchTree),
    Regexp(RegexpMatchTree<'a>),
    SymbolRegexp(SymbolRegexpMatchTree<'a>),
    Branch(BranchQueryMatchTree<'a>),
    Docs(DocMatchTree),
    BruteForce(BruteForceMatchTree),
    NoMatch(NoMatchTree),
    And(AndMatchTree<'a>),
    AndLine(AndLineMatchTree<'a>),
    Or(OrMatchTree<'a>),
    Not(NotMatchTree<'a>),
}

impl<'a> MatchTree<'a> {
    pub(crate) fn id(&self) -> u32 {
        match self {
            MatchTree::Substr(t) => t.id,
            MatchTree::SymbolSubstr(t) => t.inner.id,
            MatchTree::Regexp(t) => t.id,
            MatchTree::SymbolRegexp(t) => t.inner.id,
            MatchTree::Branch(t) => t.id,
            MatchTree::Docs(t) => t.id,
            MatchTree::BruteForce(t) => t.id,
            MatchTree::NoMatch(t) => t.id,
            MatchTree::And(t) => t.id,
            MatchTree::AndLine(t) => t.id,
            MatchTree::Or(t) => t.id,
            MatchTree::Not(t) => t.id,
        }
    }

    /// Smallest document at or past the internal cursor that could still
    /// match; `NO_DOC` when exhausted.
    pub(crate) fn next_doc(&mut self) -> u32 {
        match self {
            MatchTree::Substr(t) => t.next_doc(),
            MatchTree::SymbolSubstr(t) => t.inner.next_doc(),
            MatchTree::Regexp(t) => t.child.next_doc(),
            MatchTree::SymbolRegexp(t) => t.inner.child.next_doc(),
            MatchTree::Branch(t) => t.next_doc(),
            MatchTree::Docs(t) => t.docs.get(t.idx).copied().unwrap_or(NO_DOC),
            MatchTree::BruteForce(t) => {
                if t.first_done {
                    t.doc + 1
                } else {
                    0
                }
            }
            MatchTree::NoMatch(_) => NO_DOC,
            MatchTree::And(t) => t.children.iter_mut().map(|c| c.next_doc()).max().unwrap_or(NO_DOC),
            MatchTree::AndLine(t) => t.children.iter_mut().map(|c| c.next_doc()).max().unwrap_or(NO_DOC),
            MatchTree::Or(t) => t.children.iter_mut().map(|c| c.next_doc()).min().unwrap_or(NO_DOC),
            // A negation has no posting support; every document is a
            // candidate.
            MatchTree::Not(_) => 0,
        }
    }

    /// Position the node on `doc` and reset per-document state.
    pub(crate) fn prepare(&mut self, doc: u32) {
        match self {
            MatchTree::Substr(t) => t.prepare(doc),
            MatchTree::SymbolSubstr(t) => t.inner.prepare(doc),
            MatchTree::Regexp(t) => t.prepare(doc),
            MatchTree::SymbolRegexp(t) => t.inner.prepare(doc),
            MatchTree::Branch(t) => {
                t.doc = doc;
                t.first_done = true;
            }
            MatchTree::Docs(t) => {
                while t.idx < t.docs.len() && t.docs[t.idx] < doc {
                    t.idx += 1;
                }
                t.current = t.idx < t.docs.len() && t.docs[t.idx] == doc;
                if t.current {
                    t.idx += 1;
                }
            }
            MatchTree::BruteForce(t) => {
                t.doc = doc;
                t.first_done = true;
            }
            MatchTree::NoMatch(_) => {}
            MatchTree::And(t) => t.children.iter_mut().for_each(|c| c.prepare(doc)),
            MatchTree::AndLine(t) => t.children.iter_mut().for_each(|c| c.prepare(doc)),
            MatchTree::Or(t) => t.children.iter_mut().for_each(|c| c.prepare(doc)),
            MatchTree::Not(t) => t.child.prepare(doc),
        }
    }

    /// Decide the prepared document at the given cost tier. `Some(v)` is
    /// final for this document; `None` defers to a higher tier.
    pub(crate) fn matches(
        &mut self,
        cp: &mut ContentProvider<'a>,
        cost: u32,
        known: &mut HashMap<u32, bool>,
    ) -> Option<bool> {
        match self {
            MatchTree::Substr(t) => t.matches(cp, cost),
            MatchTree::SymbolSubstr(t) => {
                let v = t.inner.matches(cp, cost)?;
                if !v {
                    return Some(false);
                }
                let secs = cp.doc_sections();
                t.inner.current.retain(|c| {
                    secs.iter()
                        .any(|s| s.start <= c.byte_offset && c.byte_offset + c.byte_match_sz <= s.end)
                });
                Some(!t.inner.current.is_empty())
            }
            MatchTree::Regexp(t) => t.matches(cp, cost, known),
            MatchTree::SymbolRegexp(t) => {
                let v = t.inner.matches(cp, cost, known)?;
                if !v {
                    return Some(false);
                }
                let secs = cp.doc_sections();
                t.inner.found.retain(|c| {
                    secs.iter()
                        .any(|s| s.start <= c.byte_offset && c.byte_offset + c.byte_match_sz <= s.end)
                });
                Some(!t.inner.found.is_empty())
            }
            MatchTree::Branch(t) => {
                let repo = t.data.repos[t.doc as usize] as usize;
                Some(t.data.file_branch_masks[t.doc as usize] & t.masks[repo] != 0)
            }
            MatchTree::Docs(t) => Some(t.current),
            MatchTree::BruteForce(_) => Some(true),
            MatchTree::NoMatch(_) => Some(false),
            MatchTree::And(t) => and_matches(&mut t.children, cp, cost, known),
            MatchTree::AndLine(t) => {
                let base = and_matches(&mut t.children, cp, cost, known);
                if base != Some(true) {
                    return base;
                }
                and_line_check(&mut t.children, cp)
            }
            MatchTree::Or(t) => {
                let mut matches = false;
                let mut decided = true;
                for ch in &mut t.children {
                    // No short circuit on truth: the undecided children feed
                    // candidate collection and the atom ranking signal.
                    match eval_match_tree(cp, cost, known, ch) {
                        Some(v) => matches = matches || v,
                        None => decided = false,
                    }
                }
                if decided {
                    Some(matches)
                } else {
                    None
                }
            }
            MatchTree::Not(t) => eval_match_tree(cp, cost, known, &mut t.child).map(|v| !v),
        }
    }
}

/// Consult the per-document memo before asking the node, and record any
/// decision so cheaper tiers are not re-evaluated at more expensive ones.
pub(crate) fn eval_match_tree<'a>(
    cp: &mut ContentProvider<'a>,
    cost: u32,
    known: &mut HashMap<u32, bool>,
    mt: &mut MatchTree<'a>,
) -> Option<bool> {
    if let Some(v) = known.get(&mt.id()) {
        return Some(*v);
    }
    let r = mt.matches(cp, cost, known);
    if let Some(v) = r {
        known.insert(mt.id(), v);
    }
    r
}

fn and_matches<'a>(
    children: &mut [MatchTree<'a>],
    cp: &mut ContentProvider<'a>,
    cost: u32,
    known: &mut HashMap<u32, bool>,
) -> Option<bool> {
    let mut sum = 0;
    for ch in children.iter_mut() {
        match eval_match_tree(cp, cost, known, ch) {
            Some(false) => return Some(false),
            Some(true) => sum += 1,
            None => {}
        }
    }
    if sum == children.len() {
        Some(true)
    } else {
        None
    }
}

/// All children matched the document; additionally require a shared line and
/// prune every child's candidates to the lines all of them hit.
fn and_line_check<'a>(children: &mut [MatchTree<'a>], cp: &mut ContentProvider<'a>) -> Option<bool> {
    let mut fewest = 0;
    let mut min = usize::MAX;
    for (i, ch) in children.iter().enumerate() {
        match ch {
            MatchTree::Substr(s) => {
                if s.current.len() < min {
                    min = s.current.len();
                    fewest = i;
                }
            }
            _ => return Some(true),
        }
    }

    // Line ranges hit by the child with the fewest candidates.
    let mut lines: Vec<(u32, u32)> = Vec::new();
    if let MatchTree::Substr(s) = &children[fewest] {
        let mut prev_end = 0;
        for c in &s.current {
            if !lines.is_empty() && c.byte_offset < prev_end {
                continue;
            }
            let (start, end) = cp.line_bounds(c.byte_offset);
            lines.push((start, end));
            prev_end = end;
        }
    }

    // Keep only lines every other child hits as well.
    for (i, ch) in children.iter().enumerate() {
        if i == fewest {
            continue;
        }
        if let MatchTree::Substr(s) = ch {
            lines.retain(|&(start, end)| {
                s.current
                    .iter()
                    .any(|c| c.byte_offset >= start && c.byte_offset < end)
            });
            if lines.is_empty() {
                return Some(false);
            }
        }
    }

    for ch in children.iter_mut() {
        if let MatchTree::Substr(s) = ch {
            s.current.retain(|c| {
                lines
                    .iter()
                    .any(|&(start, end)| c.byte_offset >= start && c.byte_offset < end)
            });
        }
    }
    Some(true)
}

impl SubstrMatchTree {
    fn next_doc(&mut self) -> u32 {
        self.cands.get(self.pos).map(|c| c.file).unwrap_or(NO_DOC)
    }

    fn prepare(&mut self, doc: u32) {
        while self.pos < self.cands.len() && self.cands[self.pos].file < doc {
            self.pos += 1;
        }
        self.current.clear();
        while self.pos < self.cands.len() && self.cands[self.pos].file == doc {
            self.current.push(self.cands[self.pos].clone());
            self.pos += 1;
        }
        self.cont_evaluated = false;
    }

    fn matches(&mut self, cp: &mut ContentProvider<'_>, cost: u32) -> Option<bool> {
        if self.cont_evaluated {
            return Some(!self.current.is_empty());
        }
        if self.current.is_empty() {
            return Some(false);
        }
        let needed = if self.file_name {
            COST_MEMORY
        } else {
            COST_CONTENT
        };
        if cost < needed {
            return None;
        }
        let data = cp.data(self.file_name);
        self.current.retain(|c| c.match_content(data));
        self.cont_evaluated = true;
        Some(!self.current.is_empty())
    }
}

impl<'a> RegexpMatchTree<'a> {
    fn prepare(&mut self, doc: u32) {
        self.doc = doc;
        self.found.clear();
        self.re_evaluated = false;
        self.child.prepare(doc);
    }

    fn matches(
        &mut self,
        cp: &mut ContentProvider<'a>,
        cost: u32,
        known: &mut HashMap<u32, bool>,
    ) -> Option<bool> {
        if self.re_evaluated {
            return Some(!self.found.is_empty());
        }
        if let Some(false) = eval_match_tree(cp, cost, known, &mut self.child) {
            return Some(false);
        }
        if cost < COST_REGEXP {
            return None;
        }
        let data = cp.data(self.file_name);
        let file = self.doc;
        let file_name = self.file_name;
        let empty: Arc<[u8]> = Arc::from(&b""[..]);
        self.found = self
            .regex
            .find_iter(data)
            .map(|m| CandidateMatch {
                file_name,
                case_sensitive: true,
                substr_bytes: empty.clone(),
                substr_lowered: empty.clone(),
                file,
                rune_offset: 0,
                byte_offset: m.start() as u32,
                byte_match_sz: (m.end() - m.start()) as u32,
            })
            .collect();
        self.re_evaluated = true;
        Some(!self.found.is_empty())
    }
}

impl<'a> BranchQueryMatchTree<'a> {
    fn next_doc(&mut self) -> u32 {
        let start = if self.first_done { self.doc + 1 } else { 0 };
        for d in start..self.data.doc_count() {
            let repo = self.data.repos[d as usize] as usize;
            if self.data.file_branch_masks[d as usize] & self.masks[repo] != 0 {
                return d;
            }
        }
        NO_DOC
    }

    pub(crate) fn fired_mask(&self, repo: usize) -> u64 {
        self.masks[repo]
    }
}

/// Visit every leaf of the tree. Regex wrappers are transparent: their
/// prefilter's leaves are the atoms.
pub(crate) fn visit_match_tree<'a, 'b>(
    mt: &'b MatchTree<'a>,
    f: &mut impl FnMut(&'b MatchTree<'a>),
) {
    match mt {
        MatchTree::And(t) => t.children.iter().for_each(|c| visit_match_tree(c, f)),
        MatchTree::AndLine(t) => t.children.iter().for_each(|c| visit_match_tree(c, f)),
        MatchTree::Or(t) => t.children.iter().for_each(|c| visit_match_tree(c, f)),
        MatchTree::Not(t) => visit_match_tree(&t.child, f),
        MatchTree::Regexp(t) => visit_match_tree(&t.child, f),
        MatchTree::SymbolRegexp(t) => visit_match_tree(&t.inner.child, f),
        other => f(other),
    }
}

/// Visit the nodes that fired for the current document, following only
/// branches the decision map recorded as true. Negations contribute no
/// concrete matches and are skipped.
pub(crate) fn visit_matches<'a, 'b>(
    mt: &'b MatchTree<'a>,
    known: &HashMap<u32, bool>,
    f: &mut impl FnMut(&'b MatchTree<'a>),
) {
    match mt {
        MatchTree::And(t) => {
            for ch in &t.children {
                if known.get(&ch.id()) == Some(&true) {
                    visit_matches(ch, known, f);
                }
            }
        }
        MatchTree::AndLine(t) => {
            for ch in &t.children {
                if known.get(&ch.id()) == Some(&true) {
                    visit_matches(ch, known, f);
                }
            }
        }
        MatchTree::Or(t) => {
            for ch in &t.children {
                if known.get(&ch.id()) == Some(&true) {
                    visit_matches(ch, known, f);
                }
            }
        }
        MatchTree::Not(_) => {}
        other => f(other),
    }
}

/// Compiles queries into match trees against one shard. Node IDs key the
/// per-document decision map.
pub(crate) struct TreeBuilder<'a> {
    data: &'a IndexData,
    next_id: u32,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(data: &'a IndexData) -> Self {
        TreeBuilder { data, next_id: 0 }
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn build(&mut self, q: &Query) -> Result<MatchTree<'a>, SearchError> {
        match q {
            Query::Const(true) => Ok(self.brute_force()),
            Query::Const(false) => Ok(self.no_match("const")),
            Query::And(children) => {
                let children = children
                    .iter()
                    .map(|c| self.build(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MatchTree::And(AndMatchTree {
                    id: self.id(),
                    children,
                }))
            }
            Query::Or(children) => {
                let children = children
                    .iter()
                    .map(|c| self.build(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MatchTree::Or(OrMatchTree {
                    id: self.id(),
                    children,
                }))
            }
            Query::Not(child) => {
                let child = Box::new(self.build(child)?);
                Ok(MatchTree::Not(NotMatchTree {
                    id: self.id(),
                    child,
                }))
            }
            // The result type restriction is applied by the caller merging
            // shard results; only the child constrains documents.
            Query::Type { child, .. } => self.build(child),
            Query::Substring {
                pattern,
                case_sensitive,
                file_name,
                ..
            } => self.new_substring(pattern, *case_sensitive, *file_name),
            Query::Regexp {
                regex,
                case_sensitive,
                file_name,
                ..
            } => self.new_regexp(regex, *case_sensitive, *file_name),
            Query::Symbol(child) => {
                let child = self.build(child)?;
                match child {
                    MatchTree::Substr(inner) => {
                        Ok(MatchTree::SymbolSubstr(SymbolSubstrMatchTree { inner }))
                    }
                    MatchTree::Regexp(inner) => {
                        Ok(MatchTree::SymbolRegexp(SymbolRegexpMatchTree { inner }))
                    }
                    _ => Err(SearchError::InvalidQuery(
                        "unexpected child under symbol".to_string(),
                    )),
                }
            }
            Query::Language(name) => {
                let byte = *self
                    .data
                    .language_map
                    .get(name)
                    .ok_or_else(|| SearchError::UnknownLanguage(name.clone()))?;
                let docs = (0..self.data.doc_count())
                    .filter(|&d| self.data.languages[d as usize] == byte)
                    .collect();
                Ok(self.doc_tree(docs))
            }
            Query::Repo(pattern) => {
                let docs = self.repo_docs(|name| name.contains(pattern.as_str()));
                Ok(self.doc_tree(docs))
            }
            Query::RepoSet(set) => {
                let docs = self.repo_docs(|name| set.contains(name));
                Ok(self.doc_tree(docs))
            }
            Query::RepoBranches(set) => {
                // Per-repo branch masks; repos absent from the map get 0.
                let masks: Vec<u64> = self
                    .data
                    .repo_meta_data
                    .iter()
                    .map(|md| match repo_branches_for(set, &md.name) {
                        Query::Const(false) => 0,
                        q => self.branch_mask_for_repo(md, &q),
                    })
                    .collect();
                let docs = (0..self.data.doc_count())
                    .filter(|&d| {
                        let repo = self.data.repos[d as usize] as usize;
                        self.data.file_branch_masks[d as usize] & masks[repo] != 0
                    })
                    .collect();
                Ok(self.doc_tree(docs))
            }
            Query::Branch { pattern, exact } => {
                let masks = self
                    .data
                    .repo_meta_data
                    .iter()
                    .map(|md| {
                        let mut mask = 0u64;
                        for (k, b) in md.branches.iter().enumerate() {
                            let hit = if *exact {
                                b.name == *pattern
                            } else {
                                b.name.contains(pattern.as_str())
                            };
                            if hit {
                                mask |= 1 << k;
                            }
                        }
                        mask
                    })
                    .collect();
                Ok(MatchTree::Branch(BranchQueryMatchTree {
                    id: self.id(),
                    data: self.data,
                    masks,
                    first_done: false,
                    doc: 0,
                }))
            }
        }
    }

    fn branch_mask_for_repo(&self, md: &crate::types::Repository, q: &Query) -> u64 {
        let mut mask = 0u64;
        let mut add = |pattern: &str, exact: bool| {
            for (k, b) in md.branches.iter().enumerate() {
                let hit = if exact {
                    b.name == pattern
                } else {
                    b.name.contains(pattern)
                };
                if hit {
                    mask |= 1 << k;
                }
            }
        };
        match q {
            Query::Branch { pattern, exact } => add(pattern, *exact),
            Query::Or(children) => {
                for c in children {
                    if let Query::Branch { pattern, exact } = c {
                        add(pattern, *exact);
                    }
                }
            }
            _ => {}
        }
        mask
    }

    fn repo_docs(&self, pred: impl Fn(&str) -> bool) -> Vec<u32> {
        (0..self.data.doc_count())
            .filter(|&d| {
                let repo = self.data.repos[d as usize] as usize;
                pred(&self.data.repo_meta_data[repo].name)
            })
            .collect()
    }

    fn doc_tree(&mut self, docs: Vec<u32>) -> MatchTree<'a> {
        MatchTree::Docs(DocMatchTree {
            id: self.id(),
            docs,
            idx: 0,
            current: false,
        })
    }

    pub(crate) fn brute_force(&mut self) -> MatchTree<'a> {
        MatchTree::BruteForce(BruteForceMatchTree {
            id: self.id(),
            first_done: false,
            doc: 0,
        })
    }

    pub(crate) fn no_match(&mut self, why: &'static str) -> MatchTree<'a> {
        MatchTree::NoMatch(NoMatchTree { id: self.id(), why })
    }

    pub(crate) fn and_tree(&mut self, children: Vec<MatchTree<'a>>) -> MatchTree<'a> {
        MatchTree::And(AndMatchTree {
            id: self.id(),
            children,
        })
    }

    pub(crate) fn and_line_tree(&mut self, children: Vec<MatchTree<'a>>) -> MatchTree<'a> {
        MatchTree::AndLine(AndLineMatchTree {
            id: self.id(),
            children,
        })
    }

    pub(crate) fn or_tree(&mut self, children: Vec<MatchTree<'a>>) -> MatchTree<'a> {
        MatchTree::Or(OrMatchTree {
            id: self.id(),
            children,
        })
    }

    /// Build a substring atom from the posting lists: documents must contain
    /// every trigram of the pattern; candidate offsets come from the first
    /// trigram. Content verification happens lazily at match time.
    pub(crate) fn new_substring(
        &mut self,
        pattern: &str,
        case_sensitive: bool,
        file_name: bool,
    ) -> Result<MatchTree<'a>, SearchError> {
        if pattern.len() < NGRAM_SIZE {
            return Err(SearchError::PatternTooShort(pattern.to_string()));
        }
        let substr_bytes: Arc<[u8]> = pattern.as_bytes().into();
        let substr_lowered: Arc<[u8]> = pattern.to_ascii_lowercase().into_bytes().into();

        let tris: Vec<[u8; 3]> = trigrams(pattern.as_bytes()).collect();
        let mut index_bytes = 0u64;
        let mut docs: Option<Vec<u32>> = None;
        for tri in &tris {
            let tri_docs = self.posting_docs(*tri, case_sensitive, file_name, &mut index_bytes);
            docs = Some(match docs {
                None => tri_docs,
                Some(prev) => intersect_sorted(&prev, &tri_docs),
            });
            if docs.as_ref().map(|d| d.is_empty()).unwrap_or(false) {
                break;
            }
        }
        let docs = docs.unwrap_or_default();

        let mut cands = Vec::new();
        for doc in docs {
            for off in self.posting_offsets(tris[0], doc, case_sensitive, file_name) {
                cands.push(CandidateMatch {
                    file_name,
                    case_sensitive,
                    substr_bytes: substr_bytes.clone(),
                    substr_lowered: substr_lowered.clone(),
                    file: doc,
                    rune_offset: 0,
                    byte_offset: off,
                    byte_match_sz: pattern.len() as u32,
                });
            }
        }
        let hits = cands.len();

        Ok(MatchTree::Substr(SubstrMatchTree {
            id: self.id(),
            file_name,
            cands,
            pos: 0,
            current: Vec::new(),
            cont_evaluated: false,
            hits,
            index_bytes,
        }))
    }

    fn posting_docs(
        &self,
        tri: [u8; 3],
        case_sensitive: bool,
        file_name: bool,
        index_bytes: &mut u64,
    ) -> Vec<u32> {
        let mut out: BTreeSet<u32> = BTreeSet::new();
        for v in self.probe_trigrams(tri, case_sensitive) {
            if let Some(postings) = self.data.postings(v, file_name) {
                for (&doc, offs) in postings {
                    out.insert(doc);
                    *index_bytes += 4 * offs.len() as u64;
                }
            }
        }
        out.into_iter().collect()
    }

    fn posting_offsets(
        &self,
        tri: [u8; 3],
        doc: u32,
        case_sensitive: bool,
        file_name: bool,
    ) -> Vec<u32> {
        let mut out = Vec::new();
        for v in self.probe_trigrams(tri, case_sensitive) {
            if let Some(offs) = self.data.postings(v, file_name).and_then(|p| p.get(&doc)) {
                out.extend_from_slice(offs);
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn probe_trigrams(&self, tri: [u8; 3], case_sensitive: bool) -> Vec<[u8; 3]> {
        if case_sensitive {
            vec![tri]
        } else {
            case_variants(tri)
        }
    }

    fn new_regexp(
        &mut self,
        pattern: &str,
        case_sensitive: bool,
        file_name: bool,
    ) -> Result<MatchTree<'a>, SearchError> {
        let hir = regex_syntax::Parser::new()
            .parse(pattern)
            .map_err(|e| SearchError::InvalidRegex(e.to_string()))?;
        let lowered = lower_regex(self, &hir, NGRAM_SIZE, file_name, case_sensitive)?;
        if lowered.is_equal {
            return Ok(lowered.tree);
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(MatchTree::Regexp(RegexpMatchTree {
            id: self.id(),
            regex,
            file_name,
            child: Box::new(lowered.tree),
            found: Vec::new(),
            re_evaluated: false,
            doc: 0,
        }))
    }
}
