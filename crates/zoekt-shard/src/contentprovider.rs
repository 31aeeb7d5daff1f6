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

//! Lazy access to one document at a time: content, newline table, and the
//! conversion of verified candidates into line or chunk matches with their
//! intrinsic scores. Owned by a single search call; not thread-safe.

use crate::matchtree::CandidateMatch;
use crate::shard::{DocumentSection, IndexData};
use crate::types::{ChunkMatch, LineFragmentMatch, LineMatch, Location, Range, Stats};

pub(crate) const SCORE_IMPORTANT_THRESHOLD: f64 = 2000.0;
pub(crate) const SCORE_FACTOR_ATOM_MATCH: f64 = 400.0;
pub(crate) const SCORE_FILE_ORDER_FACTOR: f64 = 10.0;
pub(crate) const SCORE_SHARD_RANK_FACTOR: f64 = 20.0;
pub(crate) const SCORE_LINE_ORDER_FACTOR: f64 = 1.0;

const SCORE_SYMBOL: f64 = 7000.0;
const SCORE_PARTIAL_SYMBOL: f64 = 4000.0;
const SCORE_WORD_MATCH: f64 = 500.0;
const SCORE_PARTIAL_WORD_MATCH: f64 = 50.0;

pub(crate) struct ContentProvider<'a> {
    data: &'a IndexData,
    pub(crate) stats: Stats,
    doc: u32,
    newlines: Option<Vec<u32>>,
    counted: bool,
}

impl<'a> ContentProvider<'a> {
    pub(crate) fn new(data: &'a IndexData) -> Self {
        ContentProvider {
            data,
            stats: Stats::default(),
            doc: 0,
            newlines: None,
            counted: false,
        }
    }

    pub(crate) fn set_document(&mut self, doc: u32) {
        self.doc = doc;
        self.newlines = None;
        self.counted = false;
    }

    /// Raw bytes of the current document, or of its file name.
    pub(crate) fn data(&mut self, file_name: bool) -> &'a [u8] {
        if file_name {
            self.data.file_name(self.doc)
        } else {
            let content = self.data.document(self.doc);
            if !self.counted {
                self.counted = true;
                self.stats.files_loaded += 1;
                self.stats.content_bytes_loaded += content.len() as u64;
            }
            content
        }
    }

    pub(crate) fn doc_sections(&self) -> &'a [DocumentSection] {
        &self.data.doc_sections[self.doc as usize]
    }

    fn newlines(&mut self) -> &[u32] {
        if self.newlines.is_none() {
            let content = self.data(false);
            let nls = content
                .iter()
                .enumerate()
                .filter(|(_, &b)| b == b'\n')
                .map(|(i, _)| i as u32)
                .collect();
            self.newlines = Some(nls);
        }
        self.newlines.as_ref().unwrap()
    }

    /// 1-based line number plus the byte bounds of the line holding
    /// `offset`. The end bound is the start of the next line.
    pub(crate) fn line_at(&mut self, offset: u32) -> (usize, u32, u32) {
        let len = self.data(false).len() as u32;
        let nls = self.newlines();
        let k = nls.partition_point(|&p| p < offset);
        let start = if k == 0 { 0 } else { nls[k - 1] + 1 };
        let end = if k < nls.len() { nls[k] + 1 } else { len };
        (k + 1, start, end)
    }

    pub(crate) fn line_bounds(&mut self, offset: u32) -> (u32, u32) {
        let (_, start, end) = self.line_at(offset);
        (start, end)
    }

    /// 1-based character column of `offset` within its line.
    fn column(&mut self, line_start: u32, offset: u32) -> u32 {
        let content = self.data(false);
        let mut col = 1;
        for &b in &content[line_start as usize..offset as usize] {
            if b & 0xC0 != 0x80 {
                col += 1;
            }
        }
        col
    }

    /// Group verified candidates into per-line matches and score each line.
    pub(crate) fn fill_matches(&mut self, mut ms: Vec<CandidateMatch>) -> Vec<LineMatch> {
        if ms.is_empty() {
            return Vec::new();
        }
        let mut result = if ms[0].file_name {
            // There is only one "line" in a file name.
            let name = self.data(true);
            vec![LineMatch {
                line: name.to_vec(),
                line_start: 0,
                line_end: name.len(),
                line_number: 1,
                score: 0.0,
                file_name: true,
                line_fragments: ms
                    .iter()
                    .map(|m| LineFragmentMatch {
                        offset: m.byte_offset,
                        line_offset: m.byte_offset as usize,
                        match_length: m.byte_match_sz as usize,
                    })
                    .collect(),
            }]
        } else {
            self.fill_content_matches(&mut ms)
        };
        let secs = self.doc_sections();
        for lm in &mut result {
            lm.score = match_score(secs, lm);
        }
        result
    }

    fn fill_content_matches(&mut self, ms: &mut [CandidateMatch]) -> Vec<LineMatch> {
        let content = self.data(false);

        // Candidates are offset-sorted; recover rune offsets in one pass.
        let mut chars = 0u32;
        let mut byte_pos = 0usize;
        for m in ms.iter_mut() {
            while byte_pos < m.byte_offset as usize && byte_pos < content.len() {
                if content[byte_pos] & 0xC0 != 0x80 {
                    chars += 1;
                }
                byte_pos += 1;
            }
            m.rune_offset = chars;
        }

        let mut result = Vec::new();
        let mut i = 0;
        while i < ms.len() {
            let (line_number, line_start, line_end) = self.line_at(ms[i].byte_offset);
            let mut end_match = ms[i].byte_offset + ms[i].byte_match_sz;
            let mut j = i;
            while j < ms.len() && ms[j].byte_offset < line_end {
                let e = ms[j].byte_offset + ms[j].byte_match_sz;
                if e > end_match {
                    end_match = e;
                }
                j += 1;
            }
            // A match may run past the line; the emitted line then covers
            // every line it touches.
            let final_end = if end_match > line_end {
                let (_, _, e) = self.line_at(end_match - 1);
                e
            } else {
                line_end
            };
            result.push(LineMatch {
                line: content[line_start as usize..final_end as usize].to_vec(),
                line_start: line_start as usize,
                line_end: final_end as usize,
                line_number,
                score: 0.0,
                file_name: false,
                line_fragments: ms[i..j]
                    .iter()
                    .map(|m| LineFragmentMatch {
                        offset: m.byte_offset,
                        line_offset: (m.byte_offset - line_start) as usize,
                        match_length: m.byte_match_sz as usize,
                    })
                    .collect(),
            });
            i = j;
        }
        result
    }

    /// Group verified candidates into chunks of adjacent lines.
    pub(crate) fn fill_chunk_matches(&mut self, ms: &[CandidateMatch]) -> Vec<ChunkMatch> {
        if ms.is_empty() {
            return Vec::new();
        }
        if ms[0].file_name {
            let name = self.data(true);
            return vec![ChunkMatch {
                content: name.to_vec(),
                content_start: Location {
                    byte_offset: 0,
                    line_number: 1,
                    column: 1,
                },
                file_name: true,
                ranges: ms
                    .iter()
                    .map(|m| Range {
                        start: Location {
                            byte_offset: m.byte_offset,
                            line_number: 1,
                            column: char_count(&name[..m.byte_offset as usize]) + 1,
                        },
                        end: Location {
                            byte_offset: m.byte_offset + m.byte_match_sz,
                            line_number: 1,
                            column: char_count(&name[..(m.byte_offset + m.byte_match_sz) as usize])
                                + 1,
                        },
                    })
                    .collect(),
                score: 0.0,
            }];
        }

        let content = self.data(false);
        let secs = self.doc_sections();
        let mut out = Vec::new();
        let mut i = 0;
        while i < ms.len() {
            let (first_line, chunk_start, first_end) = self.line_at(ms[i].byte_offset);
            let mut last_line = first_line;
            let mut chunk_end = first_end;
            let mut j = i;
            while j < ms.len() {
                let (line, _, _) = self.line_at(ms[j].byte_offset);
                if j > i && line > last_line {
                    break;
                }
                let e = ms[j].byte_offset + ms[j].byte_match_sz;
                let (end_line, _, end_bound) = self.line_at(e.saturating_sub(1));
                if end_line > last_line {
                    last_line = end_line;
                }
                if end_bound > chunk_end {
                    chunk_end = end_bound;
                }
                j += 1;
            }
            let ranges = ms[i..j]
                .iter()
                .map(|m| {
                    let end_off = m.byte_offset + m.byte_match_sz;
                    let (sl, ss, _) = self.line_at(m.byte_offset);
                    let (el, es, _) = self.line_at(end_off.saturating_sub(1));
                    Range {
                        start: Location {
                            byte_offset: m.byte_offset,
                            line_number: sl as u32,
                            column: self.column(ss, m.byte_offset),
                        },
                        end: Location {
                            byte_offset: end_off,
                            line_number: el as u32,
                            column: self.column(es, end_off),
                        },
                    }
                })
                .collect();
            let score = ms[i..j]
                .iter()
                .map(|m| span_score(content, secs, m.byte_offset, m.byte_match_sz))
                .fold(0.0, f64::max);
            out.push(ChunkMatch {
                content: content[chunk_start as usize..chunk_end as usize].to_vec(),
                content_start: Location {
                    byte_offset: chunk_start,
                    line_number: first_line as u32,
                    column: 1,
                },
                file_name: false,
                ranges,
                score,
            });
            i = j;
        }
        out
    }
}

fn char_count(bytes: &[u8]) -> u32 {
    bytes.iter().filter(|&&b| b & 0xC0 != 0x80).count() as u32
}

fn byte_class(b: u8) -> u8 {
    if b.is_ascii_alphabetic() || b == b'_' {
        0
    } else if b.is_ascii_digit() {
        1
    } else {
        2
    }
}

/// Intrinsic score of a line: symbol-definition hits dominate word-boundary
/// hits, which dominate mid-word hits.
fn match_score(secs: &[DocumentSection], m: &LineMatch) -> f64 {
    let mut max: f64 = 0.0;
    for f in &m.line_fragments {
        let off = f.line_offset;
        let end = off + f.match_length;
        let start_boundary = off < m.line.len()
            && (off == 0 || byte_class(m.line[off - 1]) != byte_class(m.line[off]));
        let end_boundary = end > 0
            && end <= m.line.len()
            && (end == m.line.len() || byte_class(m.line[end - 1]) != byte_class(m.line[end]));
        let (start_sym, end_sym) = if m.file_name {
            (false, false)
        } else {
            let abs_end = f.offset + f.match_length as u32;
            (
                secs.iter().any(|s| s.start == f.offset),
                secs.iter().any(|s| s.end == abs_end),
            )
        };
        let score = if start_sym && end_sym {
            SCORE_SYMBOL
        } else if start_sym || end_sym {
            SCORE_PARTIAL_SYMBOL
        } else if start_boundary && end_boundary {
            SCORE_WORD_MATCH
        } else if start_boundary || end_boundary {
            SCORE_PARTIAL_WORD_MATCH
        } else {
            0.0
        };
        if score > max {
            max = score;
        }
    }
    max
}

fn span_score(content: &[u8], secs: &[DocumentSection], off: u32, len: u32) -> f64 {
    let start = off as usize;
    let end = start + len as usize;
    let start_boundary = start < content.len()
        && (start == 0 || byte_class(content[start - 1]) != byte_class(content[start]));
    let end_boundary = end > 0
        && end <= content.len()
        && (end == content.len() || byte_class(content[end - 1]) != byte_class(content[end]));
    let start_sym = secs.iter().any(|s| s.start == off);
    let end_sym = secs.iter().any(|s| s.end == off + len);
    if start_sym && end_sym {
        SCORE_SYMBOL
    } else if start_sym || end_sym {
        SCORE_PARTIAL_SYMBOL
    } else if start_boundary && end_boundary {
        SCORE_WORD_MATCH
    } else if start_boundary || end_boundary {
        SCORE_PARTIAL_WORD_MATCH
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{Document, ShardBuilder};
    use crate::types::Repository;
    use std::sync::Arc;

    fn provider_fixture() -> IndexData {
        let mut b = ShardBuilder::new();
        b.add_repository(
            Repository {
                name: "r".to_string(),
                ..Default::default()
            },
            false,
        );
        b.add_document(Document {
            name: "a.txt".to_string(),
            content: b"first line\nsecond foo line\nthird\n".to_vec(),
            ..Default::default()
        });
        b.build()
    }

    fn cand(off: u32, len: u32) -> CandidateMatch {
        let pat: Arc<[u8]> = Arc::from(&[][..]);
        CandidateMatch {
            file_name: false,
            case_sensitive: true,
            substr_bytes: pat.clone(),
            substr_lowered: pat,
            file: 0,
            rune_offset: 0,
            byte_offset: off,
            byte_match_sz: len,
        }
    }

    #[test]
    fn line_lookup() {
        let data = provider_fixture();
        let mut cp = ContentProvider::new(&data);
        cp.set_document(0);
        assert_eq!(cp.line_at(0), (1, 0, 11));
        assert_eq!(cp.line_at(11), (2, 11, 27));
        assert_eq!(cp.line_at(30), (3, 27, 33));
    }

    #[test]
    fn fills_line_matches_with_fragments() {
        let data = provider_fixture();
        let mut cp = ContentProvider::new(&data);
        cp.set_document(0);
        // "foo" on line 2 at offset 18.
        let lms = cp.fill_matches(vec![cand(18, 3)]);
        assert_eq!(lms.len(), 1);
        assert_eq!(lms[0].line_number, 2);
        assert_eq!(lms[0].line, b"second foo line\n".to_vec());
        assert_eq!(lms[0].line_fragments[0].line_offset, 7);
        // Whole-word hit.
        assert_eq!(lms[0].score, SCORE_WORD_MATCH);
    }

    #[test]
    fn groups_candidates_on_one_line() {
        let data = provider_fixture();
        let mut cp = ContentProvider::new(&data);
        cp.set_document(0);
        let lms = cp.fill_matches(vec![cand(11, 6), cand(18, 3)]);
        assert_eq!(lms.len(), 1);
        assert_eq!(lms[0].line_fragments.len(), 2);
    }

    #[test]
    fn symbol_hit_outranks_word_hit() {
        let mut b = ShardBuilder::new();
        b.add_repository(
            Repository {
                name: "r".to_string(),
                ..Default::default()
            },
            false,
        );
        b.add_document(Document {
            name: "a.rs".to_string(),
            content: b"fn foo() {}\n".to_vec(),
            symbol_ranges: vec![(3, 6)],
            ..Default::default()
        });
        let data = b.build();
        let mut cp = ContentProvider::new(&data);
        cp.set_document(0);
        let lms = cp.fill_matches(vec![cand(3, 3)]);
        assert_eq!(lms[0].score, SCORE_SYMBOL);
    }

    #[test]
    fn chunks_merge_same_line_candidates() {
        let data = provider_fixture();
        let mut cp = ContentProvider::new(&data);
        cp.set_document(0);
        let cms = cp.fill_chunk_matches(&[cand(11, 6), cand(18, 3), cand(28, 4)]);
        assert_eq!(cms.len(), 2);
        assert_eq!(cms[0].ranges.len(), 2);
        assert_eq!(cms[0].content_start.line_number, 2);
        assert_eq!(cms[1].content_start.line_number, 3);
    }
}
