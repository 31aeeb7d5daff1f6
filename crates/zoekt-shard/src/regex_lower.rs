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

//! Lowering of a parsed regex into a conservative match tree.
//!
//! The produced tree is sound: every document matching the regex also
//! matches the tree, so it can prefilter documents before the regex runs.
//! When `is_equal` is reported the tree is semantically identical to the
//! regex and the caller skips regex execution entirely. `single_line` means
//! every tree match lies within one line, which lets a concatenation become
//! a same-line AND instead of a document-level AND.

use regex_syntax::hir::{Class, Hir, HirKind};

use crate::error::SearchError;
use crate::matchtree::{MatchTree, TreeBuilder};

pub(crate) struct Lowered<'a> {
    pub tree: MatchTree<'a>,
    pub is_equal: bool,
    pub single_line: bool,
}

impl<'a> Lowered<'a> {
    fn brute(b: &mut TreeBuilder<'a>, single_line: bool) -> Self {
        Lowered {
            tree: b.brute_force(),
            is_equal: false,
            single_line,
        }
    }
}

pub(crate) fn lower_regex<'a>(
    b: &mut TreeBuilder<'a>,
    hir: &Hir,
    min_text_size: usize,
    file_name: bool,
    case_sensitive: bool,
) -> Result<Lowered<'a>, SearchError> {
    match hir.kind() {
        HirKind::Literal(lit) => {
            if lit.0.len() >= min_text_size {
                let s = String::from_utf8_lossy(&lit.0);
                let tree = b.new_substring(&s, case_sensitive, file_name)?;
                return Ok(Lowered {
                    tree,
                    is_equal: true,
                    single_line: !lit.0.contains(&b'\n'),
                });
            }
            Ok(Lowered::brute(b, false))
        }
        HirKind::Capture(cap) => lower_regex(b, &cap.sub, min_text_size, file_name, case_sensitive),
        HirKind::Repetition(rep) => {
            // `.*` constrains nothing on this line.
            if rep.min == 0 && rep.max.is_none() && is_any_char_not_nl(&rep.sub) {
                return Ok(Lowered::brute(b, true));
            }
            if rep.min == 1 {
                return lower_regex(b, &rep.sub, min_text_size, file_name, case_sensitive);
            }
            if rep.min > 1 {
                // (x){2,} requires x but the tree cannot count occurrences.
                let mut l = lower_regex(b, &rep.sub, min_text_size, file_name, case_sensitive)?;
                l.is_equal = false;
                return Ok(l);
            }
            Ok(Lowered::brute(b, false))
        }
        HirKind::Concat(subs) => {
            let mut is_eq = true;
            let mut single_line = true;
            let mut qs = Vec::with_capacity(subs.len());
            for sub in subs {
                let l = lower_regex(b, sub, min_text_size, file_name, case_sensitive)?;
                is_eq = is_eq && l.is_equal;
                single_line = single_line && l.single_line;
                qs.push(l.tree);
            }
            if qs.len() > 1 {
                is_eq = false;
            }
            // Brute-force children constrain nothing within a concatenation.
            let kept: Vec<_> = qs
                .into_iter()
                .filter(|q| !matches!(q, MatchTree::BruteForce(_)))
                .collect();
            let tree = match kept.len() {
                0 => b.brute_force(),
                1 => kept.into_iter().next().unwrap(),
                _ => {
                    if single_line {
                        b.and_line_tree(kept)
                    } else {
                        b.and_tree(kept)
                    }
                }
            };
            Ok(Lowered {
                tree,
                is_equal: is_eq,
                single_line,
            })
        }
        HirKind::Alternation(subs) => {
            let mut is_eq = true;
            let mut qs = Vec::with_capacity(subs.len());
            for sub in subs {
                let l = lower_regex(b, sub, min_text_size, file_name, case_sensitive)?;
                is_eq = is_eq && l.is_equal;
                qs.push(l.tree);
            }
            // One unconstrained branch makes the whole alternation
            // unconstrained.
            if let Some(pos) = qs
                .iter()
                .position(|q| matches!(q, MatchTree::BruteForce(_)))
            {
                return Ok(Lowered {
                    tree: qs.swap_remove(pos),
                    is_equal: is_eq,
                    single_line: false,
                });
            }
            if qs.is_empty() {
                return Ok(Lowered {
                    tree: b.no_match("const"),
                    is_equal: is_eq,
                    single_line: false,
                });
            }
            Ok(Lowered {
                tree: b.or_tree(qs),
                is_equal: is_eq,
                single_line: false,
            })
        }
        _ => Ok(Lowered::brute(b, false)),
    }
}

/// True for the class `.` compiles to without the `s` flag: every character
/// except newline.
fn is_any_char_not_nl(h: &Hir) -> bool {
    match h.kind() {
        HirKind::Class(Class::Unicode(cls)) => {
            let r = cls.ranges();
            r.len() == 2
                && r[0].start() == '\0'
                && r[0].end() == '\u{9}'
                && r[1].start() == '\u{b}'
                && r[1].end() == char::MAX
        }
        HirKind::Class(Class::Bytes(cls)) => {
            let r = cls.ranges();
            r.len() == 2
                && r[0].start() == 0
                && r[0].end() == 9
                && r[1].start() == 0x0b
                && r[1].end() == 0xff
        }
        _ => false,
    }
}
