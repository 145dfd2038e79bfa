//! Import group tables and the idempotent import finalizer.
//!
//! Generated files get their `use` lines after formatting. Groups are
//! inserted in the order given, each separated by a blank line. Imports are
//! compared by the names they bring into scope, not by their text, so
//! `use a::{B, c};` already satisfies `use a::{c, B};` and `use a::c;`.
//!
//! ## Examples
//!
//! ```
//! use repogen_lib::imports::{ImportGroup, finalize};
//!
//! let model = ImportGroup::new("model", ["use crate::model::video;"]);
//! let once = finalize("//! Video repository.\n\npub struct VideoRepoMongo;\n", &[&model]);
//! let twice = finalize(&once, &[&model]);
//!
//! assert!(once.contains("use crate::model::video;"));
//! assert_eq!(once, twice);
//! ```

use std::collections::HashSet;

use syn::{Item, ItemUse, UseTree};

use crate::naming::module_alias;

/// An ordered set of `use` lines inserted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportGroup {
    pub name: &'static str,
    pub lines: Vec<String>,
}

impl ImportGroup {
    pub fn new<I, S>(name: &'static str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = Self {
            name,
            lines: Vec::new(),
        };
        for line in lines {
            group.push(line);
        }
        group
    }

    /// Group of `use <path>;` lines for model module paths.
    ///
    /// A module whose last segment is already bound is imported under an
    /// alias built from its parent segment, e.g. `use crate::model::b::video
    /// as b_video;`.
    pub fn models<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut bound: HashSet<String> = HashSet::new();
        let mut group = Self::new("model", Vec::<String>::new());
        for path in paths {
            let alias = module_alias(path);
            if bound.insert(alias.to_string()) {
                group.push(format!("use {path};"));
            } else {
                let alias = free_alias(path, &bound);
                group.push(format!("use {path} as {alias};"));
                bound.insert(alias);
            }
        }
        group
    }

    /// Every name imported by the top-level `use` items of `source`, one
    /// line each.
    pub fn kept_from(name: &'static str, source: &str) -> Self {
        let mut leaves: Vec<String> = Vec::new();
        for item in use_items(source) {
            collect_leaves(&item, &mut leaves);
        }
        Self::new(name, leaves.into_iter().map(|leaf| format!("use {leaf};")))
    }

    /// Appends `line` unless it is already in the group.
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.lines.contains(&line) {
            self.lines.push(line);
        }
    }
}

fn free_alias(path: &str, bound: &HashSet<String>) -> String {
    let segments: Vec<&str> = path.rsplit("::").take(2).collect();
    let base = match segments.as_slice() {
        [last, parent] => format!("{parent}_{last}"),
        _ => format!("{}_model", module_alias(path)),
    };
    let mut alias = base.clone();
    let mut n = 2;
    while bound.contains(&alias) {
        alias = format!("{base}_{n}");
        n += 1;
    }
    alias
}

/// The constant import groups shared by every run.
#[derive(Debug, Clone)]
pub struct ImportTables {
    /// Names every repository implementation uses.
    pub driver: ImportGroup,
    /// Extra names used by `index_models`.
    pub index: ImportGroup,
    /// Names the interface signatures use.
    pub interface: ImportGroup,
    pub base: ImportGroup,
}

impl ImportTables {
    pub fn standard() -> Self {
        const RESULTS: &str =
            "use mongodb::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};";
        Self {
            driver: ImportGroup::new(
                "driver",
                [
                    "use futures::TryStreamExt;",
                    "use mongodb::bson::Document;",
                    "use mongodb::error::Result as MongoResult;",
                    RESULTS,
                    "use mongodb::Collection;",
                ],
            ),
            index: ImportGroup::new(
                "index",
                [
                    "use mongodb::bson::doc;",
                    "use mongodb::options::IndexOptions;",
                    "use mongodb::IndexModel;",
                ],
            ),
            interface: ImportGroup::new(
                "interface",
                [
                    "use mongodb::bson::Document;",
                    "use mongodb::error::Result as MongoResult;",
                    RESULTS,
                ],
            ),
            base: ImportGroup::new("base", ["use mongodb::bson::Document as BaseModel;"]),
        }
    }
}

/// Inserts every missing group import after the file header.
///
/// A group line whose names are all in scope already is skipped. A line
/// that is only partly in scope contributes one `use` per missing name.
/// The header is the leading run of plain comments, inner docs, inner
/// attributes and blank lines; outer doc comments belong to the first item.
/// Applying `finalize` twice gives the same text as applying it once.
pub fn finalize(source: &str, groups: &[&ImportGroup]) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut in_scope: HashSet<String> = HashSet::new();
    for item in use_items(source) {
        in_scope.extend(leaves(&item));
    }
    let present_text: HashSet<&str> = lines.iter().map(|l| l.trim()).collect();

    let mut block: Vec<String> = Vec::new();
    for group in groups {
        let mut missing: Vec<String> = Vec::new();
        for line in &group.lines {
            let Ok(item) = syn::parse_str::<ItemUse>(line) else {
                if !present_text.contains(line.trim()) && !missing.contains(line) {
                    missing.push(line.clone());
                }
                continue;
            };
            let wanted = leaves(&item);
            let absent: Vec<String> = wanted
                .iter()
                .filter(|leaf| !in_scope.contains(*leaf))
                .cloned()
                .collect();
            if absent.len() == wanted.len() {
                missing.push(line.clone());
            } else {
                missing.extend(absent.iter().map(|leaf| format!("use {leaf};")));
            }
            in_scope.extend(absent);
        }
        if missing.is_empty() {
            continue;
        }
        if !block.is_empty() {
            block.push(String::new());
        }
        block.extend(missing);
    }

    if block.is_empty() {
        return source.to_string();
    }

    let split = header_len(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + block.len() + 2);
    out.extend(lines[..split].iter().map(|l| l.to_string()));
    if split > 0 && !lines[split - 1].trim().is_empty() {
        out.push(String::new());
    }
    out.extend(block);
    if lines.get(split).is_some_and(|l| !l.trim().is_empty()) {
        out.push(String::new());
    }
    out.extend(lines[split..].iter().map(|l| l.to_string()));

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Top-level `use` items. Source that does not parse is scanned line by
/// line instead.
fn use_items(source: &str) -> Vec<ItemUse> {
    match syn::parse_file(source) {
        Ok(file) => file
            .items
            .into_iter()
            .filter_map(|item| match item {
                Item::Use(item) => Some(item),
                _ => None,
            })
            .collect(),
        Err(_) => source
            .lines()
            .filter_map(|line| syn::parse_str::<ItemUse>(line.trim()).ok())
            .collect(),
    }
}

fn leaves(item: &ItemUse) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaves(item, &mut out);
    out
}

fn collect_leaves(item: &ItemUse, out: &mut Vec<String>) {
    let prefix = if item.leading_colon.is_some() { "::" } else { "" };
    walk(&item.tree, prefix.to_string(), out);
}

/// Flattens a use tree into `path::Name` and `path::Name as Alias` leaves.
fn walk(tree: &UseTree, prefix: String, out: &mut Vec<String>) {
    match tree {
        UseTree::Path(p) => walk(&p.tree, format!("{prefix}{}::", p.ident), out),
        UseTree::Name(n) if n.ident == "self" => {
            out.push(prefix.trim_end_matches("::").to_string());
        }
        UseTree::Name(n) => out.push(format!("{prefix}{}", n.ident)),
        UseTree::Rename(r) if r.ident == "self" => {
            out.push(format!("{} as {}", prefix.trim_end_matches("::"), r.rename));
        }
        UseTree::Rename(r) => out.push(format!("{prefix}{} as {}", r.ident, r.rename)),
        UseTree::Glob(_) => out.push(format!("{prefix}*")),
        UseTree::Group(g) => {
            for item in &g.items {
                walk(item, prefix.clone(), out);
            }
        }
    }
}

fn header_len(lines: &[&str]) -> usize {
    lines
        .iter()
        .take_while(|line| {
            let t = line.trim();
            t.is_empty() || (t.starts_with("//") && !t.starts_with("///")) || t.starts_with("#![")
        })
        .count()
}
