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

mod common;

use zoekt_shard::{
    CancelToken, Query, SearchOptions, ShardBuilder,
};

fn search(
    data: &zoekt_shard::IndexData,
    q: Query,
    opts: SearchOptions,
) -> zoekt_shard::SearchResult {
    data.search(&CancelToken::new(), &q, &opts).unwrap()
}

#[test]
fn finds_literal_with_line_positions() -> anyhow::Result<()> {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("hello"), SearchOptions::default());

    let mut names: Vec<&str> = res.files.iter().map(|f| f.file_name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["README.md", "src/main.go"]);

    let readme = res
        .files
        .iter()
        .find(|f| f.file_name == "README.md")
        .unwrap();
    assert_eq!(readme.line_matches.len(), 1);
    let lm = &readme.line_matches[0];
    assert_eq!(lm.line_number, 1);
    assert_eq!(lm.line_fragments[0].line_offset, 0);
    assert_eq!(lm.line_fragments[0].match_length, 5);
    assert!(!lm.file_name);

    assert_eq!(res.stats.file_count, 2);
    assert_eq!(res.stats.match_count, 2);
    assert!(res.stats.files_considered >= res.stats.file_count);
    Ok(())
}

#[test]
fn default_search_is_case_insensitive() {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("HELLO"), SearchOptions::default());
    assert_eq!(res.files.len(), 2);

    let res = search(
        &data,
        Query::Substring {
            pattern: "HELLO".to_string(),
            case_sensitive: true,
            file_name: false,
            content: true,
        },
        SearchOptions::default(),
    );
    assert!(res.files.is_empty());
}

#[test]
fn matches_file_names() {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("util"), SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_name, "src/util.go");
    assert!(res.files[0].line_matches[0].file_name);
}

#[test]
fn content_matches_suppress_file_name_matches() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    b.add_document(common::doc(
        "hello.go",
        b"package hello\n",
        "Go",
        &["main"],
    ));
    let data = b.build();

    let res = search(&data, Query::substring("hello"), SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    for lm in &res.files[0].line_matches {
        assert!(!lm.file_name);
    }
}

#[test]
fn structural_match_reports_the_file_name() {
    let data = common::single_repo_shard();
    let res = search(
        &data,
        Query::Language("Markdown".to_string()),
        SearchOptions::default(),
    );
    assert_eq!(res.files.len(), 1);
    let lm = &res.files[0].line_matches[0];
    assert!(lm.file_name);
    assert_eq!(lm.line, b"README.md".to_vec());
    assert_eq!(lm.line_fragments[0].match_length, "README.md".len());
}

#[test]
fn empty_shard_returns_empty_result() {
    let data = ShardBuilder::new().build();
    let res = search(&data, Query::substring("anything"), SearchOptions::default());
    assert!(res.files.is_empty());
    assert_eq!(res.stats.files_considered, 0);
}

#[test]
fn tombstoned_repository_is_skipped() {
    let data = common::two_repo_shard(true);
    let res = search(&data, Query::substring("contents"), SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].repository, "beta");
    // Tombstoned repositories contribute no URL templates either.
    assert!(!res.repo_urls.contains_key("alpha"));
    assert!(res.repo_urls.contains_key("beta"));
}

#[test]
fn shard_match_bound_accounts_skipped_files() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("big", 1), false);
    for i in 0..5 {
        b.add_document(common::doc(
            &format!("f{}.txt", i),
            b"needle appears here\n",
            "Text",
            &["main"],
        ));
    }
    let data = b.build();

    let res = search(
        &data,
        Query::substring("needle"),
        SearchOptions {
            shard_max_match_count: 1,
            ..Default::default()
        },
    );
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.stats.file_count, 1);
    assert_eq!(res.stats.files_skipped, 4);
}

#[test]
fn fully_tombstoned_shard_returns_nothing() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("gone", 1), true);
    b.add_document(common::doc("a.txt", b"needle\n", "Text", &["main"]));
    let data = b.build();
    let res = search(&data, Query::substring("needle"), SearchOptions::default());
    assert!(res.files.is_empty());
    assert_eq!(res.stats.files_considered, 0);
}

#[test]
fn single_document_gets_full_doc_order_score() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    b.add_document(common::doc("a.txt", b"needle\n", "Text", &["main"]));
    let data = b.build();
    let res = search(
        &data,
        Query::substring("needle"),
        SearchOptions {
            debug_score: true,
            ..Default::default()
        },
    );
    assert_eq!(res.files.len(), 1);
    assert!(res.files[0].debug.contains("doc-order:10"));
}

#[test]
fn cancelled_before_search_skips_the_shard() {
    let data = common::single_repo_shard();
    let ctx = CancelToken::new();
    ctx.cancel();
    let res = data
        .search(&ctx, &Query::substring("hello"), &SearchOptions::default())
        .unwrap();
    assert!(res.files.is_empty());
    assert_eq!(res.stats.shards_skipped, 1);
    assert_eq!(res.stats.file_count, 0);
}

#[test]
fn estimate_doc_count_short_circuits() {
    let data = common::single_repo_shard();
    let res = search(
        &data,
        Query::substring("hello"),
        SearchOptions {
            estimate_doc_count: true,
            ..Default::default()
        },
    );
    assert!(res.files.is_empty());
    assert_eq!(res.stats.shard_files_considered, 3);
}

#[test]
fn whole_returns_document_content() {
    let data = common::single_repo_shard();
    let res = search(
        &data,
        Query::substring("documentation"),
        SearchOptions {
            whole: true,
            ..Default::default()
        },
    );
    assert_eq!(
        res.files[0].content.as_deref(),
        Some(&b"hello documentation\n"[..])
    );
}

#[test]
fn earlier_documents_score_higher() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    b.add_document(common::doc("one.txt", b"same needle\n", "Text", &["main"]));
    b.add_document(common::doc("two.txt", b"same needle\n", "Text", &["main"]));
    let data = b.build();

    let res = search(&data, Query::substring("needle"), SearchOptions::default());
    assert_eq!(res.files.len(), 2);
    assert_eq!(res.files[0].file_name, "one.txt");
    assert!(res.files[0].score > res.files[1].score);
}

#[test]
fn debug_score_records_the_breakdown() {
    let data = common::single_repo_shard();
    let res = search(
        &data,
        Query::substring("hello"),
        SearchOptions {
            debug_score: true,
            ..Default::default()
        },
    );
    assert!(res.files[0].debug.contains("doc-order"));
    assert!(res.files[0].debug.contains("atom"));
}

#[test]
fn file_match_carries_shard_metadata() {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("helper"), SearchOptions::default());
    let fm = &res.files[0];
    assert_eq!(fm.repository, "repo1");
    assert_eq!(fm.repository_id, 1);
    assert_eq!(fm.language, "Go");
    // Lowest branch bit picks the version.
    assert_eq!(fm.version, "v1");
    assert_eq!(fm.checksum.len(), 32);
}

#[test]
fn chunk_matches_replace_line_matches() {
    let data = common::single_repo_shard();
    let res = search(
        &data,
        Query::substring("hello"),
        SearchOptions {
            chunk_matches: true,
            ..Default::default()
        },
    );
    let readme = res
        .files
        .iter()
        .find(|f| f.file_name == "README.md")
        .unwrap();
    assert!(readme.line_matches.is_empty());
    assert_eq!(readme.chunk_matches.len(), 1);
    let cm = &readme.chunk_matches[0];
    assert_eq!(cm.ranges.len(), 1);
    assert_eq!(cm.ranges[0].start.line_number, 1);
    assert_eq!(cm.ranges[0].start.column, 1);
    assert_eq!(cm.ranges[0].end.byte_offset, 5);
}

#[test]
fn search_result_serializes() -> anyhow::Result<()> {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("hello"), SearchOptions::default());
    let json = serde_json::to_value(&res)?;
    assert_eq!(json["stats"]["file_count"], 2);
    assert!(json["files"].as_array().unwrap().len() == 2);
    Ok(())
}

#[test]
fn mapped_content_store_matches_in_memory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    b.add_document(common::doc(
        "a.txt",
        b"alpha needle\n",
        "Text",
        &["main"],
    ));
    b.add_document(common::doc("b.txt", b"beta needle\n", "Text", &["main"]));
    let data = b.build_mapped(&dir.path().join("content.blob"))?;

    let res = search(&data, Query::substring("needle"), SearchOptions::default());
    assert_eq!(res.files.len(), 2);
    assert_eq!(res.files[0].line_matches[0].line, b"alpha needle\n".to_vec());
    Ok(())
}
