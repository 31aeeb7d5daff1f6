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

use std::collections::{BTreeMap, BTreeSet};
use zoekt_shard::{CancelToken, Query, SearchOptions};

#[test]
fn repo_atom_folds_against_shard_metadata() {
    let data = common::two_repo_shard(false);

    // Both "alpha" and "beta" contain "a": the atom is vacuous.
    assert_eq!(data.simplify(Query::Repo("a".to_string())), Query::Const(true));
    // No repository matches.
    assert_eq!(
        data.simplify(Query::Repo("zzz".to_string())),
        Query::Const(false)
    );
    // Some but not all match: left for evaluation.
    assert_eq!(
        data.simplify(Query::Repo("alpha".to_string())),
        Query::Repo("alpha".to_string())
    );
}

#[test]
fn unmatched_repo_atom_restricts_documents() {
    let data = common::two_repo_shard(false);
    let q = Query::And(vec![
        Query::Repo("alpha".to_string()),
        Query::substring("contents"),
    ]);
    let res = data
        .search(&CancelToken::new(), &q, &SearchOptions::default())
        .unwrap();
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].repository, "alpha");
}

#[test]
fn repo_set_folds_like_repo() {
    let data = common::two_repo_shard(false);
    let both: BTreeSet<String> = ["alpha", "beta"].iter().map(|s| s.to_string()).collect();
    assert_eq!(data.simplify(Query::RepoSet(both)), Query::Const(true));

    let none: BTreeSet<String> = ["gamma"].iter().map(|s| s.to_string()).collect();
    assert_eq!(data.simplify(Query::RepoSet(none)), Query::Const(false));
}

#[test]
fn tombstones_change_the_fold() {
    // With alpha tombstoned, matching beta alone covers every live repo.
    let data = common::two_repo_shard(true);
    assert_eq!(
        data.simplify(Query::Repo("beta".to_string())),
        Query::Const(true)
    );
}

#[test]
fn repo_branches_on_single_repo_becomes_branch_atom() {
    let data = common::single_repo_shard();
    let mut set = BTreeMap::new();
    set.insert("repo1".to_string(), vec!["main".to_string()]);
    assert_eq!(
        data.simplify(Query::RepoBranches(set)),
        Query::Branch {
            pattern: "main".to_string(),
            exact: true
        }
    );

    // A repository the shard does not hold kills the query.
    let mut other = BTreeMap::new();
    other.insert("elsewhere".to_string(), vec!["main".to_string()]);
    assert_eq!(data.simplify(Query::RepoBranches(other)), Query::Const(false));
}

#[test]
fn repo_branches_search_restricts_to_branch() {
    let data = common::single_repo_shard();
    let mut set = BTreeMap::new();
    set.insert("repo1".to_string(), vec!["main".to_string()]);
    let q = Query::And(vec![
        Query::RepoBranches(set),
        Query::substring("hello"),
    ]);
    let res = data
        .search(&CancelToken::new(), &q, &SearchOptions::default())
        .unwrap();
    // README.md only lives on dev.
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].file_name, "src/main.go");
}

#[test]
fn repo_branches_on_multi_repo_shard_is_conservative() {
    let data = common::two_repo_shard(false);
    let mut set = BTreeMap::new();
    set.insert("alpha".to_string(), vec!["main".to_string()]);
    let q = Query::RepoBranches(set.clone());
    // One of the named repos exists: left unchanged.
    assert_eq!(data.simplify(q.clone()), q);

    let res = data
        .search(&CancelToken::new(), &q, &SearchOptions::default())
        .unwrap();
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].repository, "alpha");
}

#[test]
fn unknown_language_kills_the_query() {
    let data = common::single_repo_shard();
    let q = Query::And(vec![
        Query::substring("hello"),
        Query::Language("Cobol".to_string()),
    ]);
    assert_eq!(data.simplify(q.clone()), Query::Const(false));

    let res = data
        .search(&CancelToken::new(), &q, &SearchOptions::default())
        .unwrap();
    assert!(res.files.is_empty());
    // The document loop never ran.
    assert_eq!(res.stats.files_considered, 0);
}

#[test]
fn search_is_invariant_under_simplification() {
    let data = common::two_repo_shard(false);
    let queries = vec![
        Query::And(vec![Query::Const(true), Query::substring("contents")]),
        Query::Or(vec![Query::Const(false), Query::substring("alpha")]),
        Query::And(vec![
            Query::Repo("alpha".to_string()),
            Query::substring("contents"),
        ]),
        Query::Not(Box::new(Query::Not(Box::new(Query::substring("beta"))))),
    ];
    for q in queries {
        let plain = data
            .search(&CancelToken::new(), &q, &SearchOptions::default())
            .unwrap();
        let simplified = data
            .search(
                &CancelToken::new(),
                &data.simplify(q.clone()),
                &SearchOptions::default(),
            )
            .unwrap();
        let a: Vec<(&str, f64)> = plain
            .files
            .iter()
            .map(|f| (f.file_name.as_str(), f.score))
            .collect();
        let b: Vec<(&str, f64)> = simplified
            .files
            .iter()
            .map(|f| (f.file_name.as_str(), f.score))
            .collect();
        assert_eq!(a, b, "query {} changed under simplification", q);
    }
}
