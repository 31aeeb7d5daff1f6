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

use zoekt_shard::{CancelToken, Document, Query, SearchOptions, ShardBuilder};

fn search(
    data: &zoekt_shard::IndexData,
    q: Query,
    opts: SearchOptions,
) -> zoekt_shard::SearchResult {
    data.search(&CancelToken::new(), &q, &opts).unwrap()
}

/// Two documents mentioning "handler"; only one defines it as a symbol.
fn symbol_shard() -> zoekt_shard::IndexData {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    // "handler" starts at byte 3.
    b.add_document(Document {
        name: "def.go".to_string(),
        content: b"fn handler() {}\n".to_vec(),
        branches: vec!["main".to_string()],
        language: "Go".to_string(),
        symbol_ranges: vec![(3, 10)],
        ..Default::default()
    });
    b.add_document(Document {
        name: "use.go".to_string(),
        content: b"calls handler somewhere\n".to_vec(),
        branches: vec!["main".to_string()],
        language: "Go".to_string(),
        ..Default::default()
    });
    b.build()
}

#[test]
fn symbol_substring_requires_a_definition() {
    let data = symbol_shard();
    let q = Query::Symbol(Box::new(Query::Substring {
        pattern: "handler".to_string(),
        case_sensitive: false,
        file_name: false,
        content: true,
    }));
    let res = search(&data, q, SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_name, "def.go");
}

#[test]
fn symbol_match_outranks_plain_match() {
    let data = symbol_shard();
    let sym = search(
        &data,
        Query::Symbol(Box::new(Query::Substring {
            pattern: "handler".to_string(),
            case_sensitive: false,
            file_name: false,
            content: true,
        })),
        SearchOptions::default(),
    );
    let plain = search(
        &data,
        Query::Substring {
            pattern: "somewhere".to_string(),
            case_sensitive: false,
            file_name: false,
            content: true,
        },
        SearchOptions::default(),
    );
    assert!(sym.files[0].score > plain.files[0].score);
}

#[test]
fn symbol_regex_requires_a_definition() {
    let data = symbol_shard();
    let q = Query::Symbol(Box::new(Query::Regexp {
        regex: "hand.er".to_string(),
        case_sensitive: true,
        file_name: false,
        content: true,
    }));
    let res = search(&data, q, SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_name, "def.go");
}

#[test]
fn important_match_bound_stops_early() {
    let mut b = ShardBuilder::new();
    b.add_repository(common::repo("r", 1), false);
    for i in 0..3 {
        b.add_document(Document {
            name: format!("d{}.go", i),
            content: b"fn handler() {}\n".to_vec(),
            branches: vec!["main".to_string()],
            language: "Go".to_string(),
            symbol_ranges: vec![(3, 10)],
            ..Default::default()
        });
    }
    let data = b.build();
    let q = Query::Symbol(Box::new(Query::Substring {
        pattern: "handler".to_string(),
        case_sensitive: false,
        file_name: false,
        content: true,
    }));
    let res = search(
        &data,
        q,
        SearchOptions {
            shard_max_important_match: 1,
            ..Default::default()
        },
    );
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.stats.files_skipped, 2);
}

#[test]
fn branch_query_restricts_and_names_the_branch() {
    let data = common::single_repo_shard();
    let q = Query::And(vec![
        Query::Branch {
            pattern: "dev".to_string(),
            exact: true,
        },
        Query::substring("helper"),
    ]);
    let res = search(&data, q, SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_name, "src/util.go");
    assert_eq!(res.files[0].branches, vec!["dev".to_string()]);
}

#[test]
fn branch_query_excludes_other_branches() {
    let data = common::single_repo_shard();
    // README.md lives on dev only.
    let q = Query::And(vec![
        Query::Branch {
            pattern: "main".to_string(),
            exact: true,
        },
        Query::substring("documentation"),
    ]);
    let res = search(&data, q, SearchOptions::default());
    assert!(res.files.is_empty());
}

#[test]
fn without_branch_atom_all_document_branches_are_reported() {
    let data = common::single_repo_shard();
    let res = search(&data, Query::substring("helper"), SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    assert_eq!(
        res.files[0].branches,
        vec!["main".to_string(), "dev".to_string()]
    );
}

#[test]
fn sub_repository_metadata_is_reported() {
    let mut sub = common::repo("r/vendor", 9);
    sub.branches = vec![common::branch("main", "sub-v7")];
    let mut parent = common::repo("r", 1);
    parent.sub_repo_map.insert("vendor/lib".to_string(), sub);

    let mut b = ShardBuilder::new();
    b.add_repository(parent, false);
    b.add_document(Document {
        name: "vendor/lib/x.go".to_string(),
        content: b"vendored needle\n".to_vec(),
        branches: vec!["main".to_string()],
        language: "Go".to_string(),
        sub_repo_path: Some("vendor/lib".to_string()),
        ..Default::default()
    });
    let data = b.build();

    let res = search(&data, Query::substring("needle"), SearchOptions::default());
    assert_eq!(res.files.len(), 1);
    let fm = &res.files[0];
    assert_eq!(fm.sub_repository_path, "vendor/lib");
    assert_eq!(fm.sub_repository_name, "r/vendor");
    assert_eq!(fm.version, "sub-v7");
    // Sub-repositories contribute URL templates too.
    assert!(res.repo_urls.contains_key("r/vendor"));
}
