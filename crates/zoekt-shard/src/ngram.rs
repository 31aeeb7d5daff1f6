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

//! Trigram extraction. The index stores exact byte trigrams; case-insensitive
//! probes expand a trigram into its ASCII case variants instead of folding
//! the index.

pub const NGRAM_SIZE: usize = 3;

/// Exact byte trigrams of `text`, one per window position.
pub fn trigrams(text: &[u8]) -> impl Iterator<Item = [u8; 3]> + '_ {
    text.windows(NGRAM_SIZE).map(|w| [w[0], w[1], w[2]])
}

/// Trigrams plus the byte offset of each window.
pub fn trigrams_with_pos(text: &[u8]) -> impl Iterator<Item = ([u8; 3], u32)> + '_ {
    text.windows(NGRAM_SIZE)
        .enumerate()
        .map(|(i, w)| ([w[0], w[1], w[2]], i as u32))
}

/// All ASCII case variants of a trigram. At most 8 entries; the first is the
/// all-lowercase form.
pub fn case_variants(tri: [u8; 3]) -> Vec<[u8; 3]> {
    let mut out = vec![[
        tri[0].to_ascii_lowercase(),
        tri[1].to_ascii_lowercase(),
        tri[2].to_ascii_lowercase(),
    ]];
    for i in 0..NGRAM_SIZE {
        if tri[i].is_ascii_alphabetic() {
            let mut upper = Vec::with_capacity(out.len());
            for v in &out {
                let mut u = *v;
                u[i] = u[i].to_ascii_uppercase();
                upper.push(u);
            }
            out.extend(upper);
        }
    }
    out
}
