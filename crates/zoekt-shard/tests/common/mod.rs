use zoekt_shard::types::{RepoBranch, Repository};
use zoekt_shard::{Document, IndexData, ShardBuilder};

pub fn branch(name: &str, version: &str) -> RepoBranch {
    RepoBranch {
        name: name.to_string(),
        version: version.to_string(),
    }
}

pub fn repo(name: &str, id: u32) -> Repository {
    Repository {
        name: name.to_string(),
        id,
        file_url_template: format!("https://example.com/{}/blob/{{{{.Version}}}}", name),
        line_fragment_template: "#L{{.LineNumber}}".to_string(),
        branches: vec![branch("main", "v1"), branch("dev", "v2")],
        ..Default::default()
    }
}

pub fn doc(name: &str, content: &[u8], lang: &str, branches: &[&str]) -> Document {
    Document {
        name: name.to_string(),
        content: content.to_vec(),
        branches: branches.iter().map(|b| b.to_string()).collect(),
        language: lang.to_string(),
        ..Default::default()
    }
}

/// One repository, three documents, two branches.
pub fn single_repo_shard() -> IndexData {
    let mut b = ShardBuilder::new();
    b.add_repository(repo("repo1", 1), false);
    b.add_document(doc(
        "src/main.go",
        b"package main\nfunc main() {\n\tprintln(\"hello world\")\n}\n",
        "Go",
        &["main"],
    ));
    b.add_document(doc(
        "src/util.go",
        b"package main\nfunc helper() int {\n\treturn 42\n}\n",
        "Go",
        &["main", "dev"],
    ));
    b.add_document(doc(
        "README.md",
        b"hello documentation\n",
        "Markdown",
        &["dev"],
    ));
    b.build()
}

/// Two repositories with disjoint content.
pub fn two_repo_shard(tombstone_alpha: bool) -> IndexData {
    let mut b = ShardBuilder::new();
    b.add_repository(repo("alpha", 1), tombstone_alpha);
    b.add_document(doc("a.go", b"alpha contents here\n", "Go", &["main"]));
    b.add_repository(repo("beta", 2), false);
    b.add_document(doc("b.rs", b"beta contents here\n", "Rust", &["main"]));
    b.build()
}
