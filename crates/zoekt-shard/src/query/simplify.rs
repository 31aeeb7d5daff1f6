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

use super::ast::Query;

/// Shard-independent boolean simplification: flatten nested same-kind
/// AND/OR, drop identity constants, short-circuit absorbing constants and
/// de-duplicate children.
pub fn simplify(q: Query) -> Query {
    match q {
        Query::And(children) => {
            let mut flat: Vec<Query> = Vec::with_capacity(children.len());
            for ch in children {
                match simplify(ch) {
                    Query::Const(true) => {}
                    Query::Const(false) => return Query::Const(false),
                    Query::And(sub) => {
                        for s in sub {
                            if !flat.contains(&s) {
                                flat.push(s);
                            }
                        }
                    }
                    other => {
                        if !flat.contains(&other) {
                            flat.push(other);
                        }
                    }
                }
            }
            match flat.len() {
                0 => Query::Const(true),
                1 => flat.pop().unwrap(),
                _ => Query::And(flat),
            }
        }
        Query::Or(children) => {
            let mut flat: Vec<Query> = Vec::with_capacity(children.len());
            for ch in children {
                match simplify(ch) {
                    Query::Const(false) => {}
                    Query::Const(true) => return Query::Const(true),
                    Query::Or(sub) => {
                        for s in sub {
                            if !flat.contains(&s) {
                                flat.push(s);
                            }
                        }
                    }
                    other => {
                        if !flat.contains(&other) {
                            flat.push(other);
                        }
                    }
                }
            }
            match flat.len() {
                0 => Query::Const(false),
                1 => flat.pop().unwrap(),
                _ => Query::Or(flat),
            }
        }
        Query::Not(child) => match simplify(*child) {
            Query::Const(v) => Query::Const(!v),
            Query::Not(inner) => *inner,
            other => Query::Not(Box::new(other)),
        },
        Query::Symbol(child) => match simplify(*child) {
            c @ Query::Const(_) => c,
            other => Query::Symbol(Box::new(other)),
        },
        Query::Type { kind, child } => match simplify(*child) {
            c @ Query::Const(_) => c,
            other => Query::Type {
                kind,
                child: Box::new(other),
            },
        },
        other => other,
    }
}
