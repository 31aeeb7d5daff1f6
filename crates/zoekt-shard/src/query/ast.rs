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

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Result type restriction carried by [`Query::Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    FileMatch,
    FileName,
    Repo,
}

/// A query over documents in a shard.
///
/// `Substring` and `Regexp` atoms match the file name, the content, or both:
/// with neither flag set, [`expand_file_content`] rewrites the atom into an
/// `Or` of the two restricted forms before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Const(bool),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Substring {
        pattern: String,
        case_sensitive: bool,
        file_name: bool,
        content: bool,
    },
    Regexp {
        regex: String,
        case_sensitive: bool,
        file_name: bool,
        content: bool,
    },
    /// Restrict the child query to symbol definitions.
    Symbol(Box<Query>),
    Language(String),
    /// Repositories whose name contains the pattern.
    Repo(String),
    /// Repositories whose name is in the set.
    RepoSet(BTreeSet<String>),
    /// Per-repository branch restriction.
    RepoBranches(BTreeMap<String, Vec<String>>),
    Branch {
        pattern: String,
        exact: bool,
    },
    Type {
        kind: TypeKind,
        child: Box<Query>,
    },
}

impl Query {
    /// Convenience constructor for a content/name substring atom.
    pub fn substring(pattern: impl Into<String>) -> Query {
        Query::Substring {
            pattern: pattern.into(),
            case_sensitive: false,
            file_name: false,
            content: false,
        }
    }

    /// Convenience constructor for a content/name regex atom.
    pub fn regexp(regex: impl Into<String>) -> Query {
        Query::Regexp {
            regex: regex.into(),
            case_sensitive: false,
            file_name: false,
            content: false,
        }
    }
}

/// Rewrite the query bottom-up: children first, then `f` on each node.
pub fn map(q: Query, f: &mut impl FnMut(Query) -> Query) -> Query {
    let q = match q {
        Query::And(cs) => Query::And(cs.into_iter().map(|c| map(c, f)).collect()),
        Query::Or(cs) => Query::Or(cs.into_iter().map(|c| map(c, f)).collect()),
        Query::Not(c) => Query::Not(Box::new(map(*c, f))),
        Query::Symbol(c) => Query::Symbol(Box::new(map(*c, f))),
        Query::Type { kind, child } => Query::Type {
            kind,
            child: Box::new(map(*child, f)),
        },
        other => other,
    };
    f(q)
}

/// Expand an unrestricted text atom into name and content alternatives.
pub fn expand_file_content(q: Query) -> Query {
    match q {
        Query::Substring {
            ref pattern,
            case_sensitive,
            file_name: false,
            content: false,
        } => Query::Or(vec![
            Query::Substring {
                pattern: pattern.clone(),
                case_sensitive,
                file_name: true,
                content: false,
            },
            Query::Substring {
                pattern: pattern.clone(),
                case_sensitive,
                file_name: false,
                content: true,
            },
        ]),
        Query::Regexp {
            ref regex,
            case_sensitive,
            file_name: false,
            content: false,
        } => Query::Or(vec![
            Query::Regexp {
                regex: regex.clone(),
                case_sensitive,
                file_name: true,
                content: false,
            },
            Query::Regexp {
                regex: regex.clone(),
                case_sensitive,
                file_name: false,
                content: true,
            },
        ]),
        other => other,
    }
}

/// The branch restriction a `RepoBranches` places on one repository.
pub fn repo_branches_for(set: &BTreeMap<String, Vec<String>>, repo: &str) -> Query {
    let branches = match set.get(repo) {
        Some(b) => b,
        None => return Query::Const(false),
    };
    match branches.len() {
        0 => Query::Const(false),
        1 => Query::Branch {
            pattern: branches[0].clone(),
            exact: true,
        },
        _ => Query::Or(
            branches
                .iter()
                .map(|b| Query::Branch {
                    pattern: b.clone(),
                    exact: true,
                })
                .collect(),
        ),
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Const(v) => write!(f, "const({})", v),
            Query::And(cs) => {
                write!(f, "(and")?;
                for c in cs {
                    write!(f, " {}", c)?;
                }
                write!(f, ")")
            }
            Query::Or(cs) => {
                write!(f, "(or")?;
                for c in cs {
                    write!(f, " {}", c)?;
                }
                write!(f, ")")
            }
            Query::Not(c) => write!(f, "(not {})", c),
            Query::Substring {
                pattern,
                case_sensitive,
                file_name,
                ..
            } => {
                write!(
                    f,
                    "{}substr{}({:?})",
                    if *file_name { "file_" } else { "" },
                    if *case_sensitive { "_cs" } else { "" },
                    pattern
                )
            }
            Query::Regexp {
                regex,
                case_sensitive,
                file_name,
                ..
            } => {
                write!(
                    f,
                    "{}regex{}({:?})",
                    if *file_name { "file_" } else { "" },
                    if *case_sensitive { "_cs" } else { "" },
                    regex
                )
            }
            Query::Symbol(c) => write!(f, "sym({})", c),
            Query::Language(l) => write!(f, "lang:{}", l),
            Query::Repo(r) => write!(f, "repo:{}", r),
            Query::RepoSet(set) => {
                write!(f, "reposet(")?;
                for (i, r) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", r)?;
                }
                write!(f, ")")
            }
            Query::RepoBranches(set) => {
                write!(f, "repobranches(")?;
                for (i, (r, bs)) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}", r, bs.join(","))?;
                }
                write!(f, ")")
            }
            Query::Branch { pattern, exact } => {
                write!(f, "branch{}:{}", if *exact { "=" } else { "" }, pattern)
            }
            Query::Type { kind, child } => write!(f, "type:{:?}({})", kind, child),
        }
    }
}
