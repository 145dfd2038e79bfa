//! Recovers declared methods from a previously generated interface file.
//!
//! Only the first `trait` in the file is inspected and only its `fn` items
//! count. Each record keeps the exact source slice of its method so it can
//! be re-emitted untouched. The slice covers doc comments and attributes,
//! plain `//` comment lines directly above the method and a trailing `//`
//! comment on its last line.
//!
//! ## Examples
//!
//! ```
//! use repogen_lib::existing::interface_method_names;
//!
//! let source = r#"
//! pub trait VideoRepository {
//!     const NAME: &'static str;
//!     async fn find_one(&self, filter: Document) -> MongoResult<Option<Video>>;
//!     async fn custom_search(&self, title: String) -> MongoResult<Vec<Video>>;
//! }
//! pub trait Ignored {
//!     fn later(&self);
//! }
//! "#;
//!
//! let names = interface_method_names(source).unwrap();
//! assert_eq!(names, vec!["find_one", "custom_search"]);
//! ```

use proc_macro2::LineColumn;
use quote::ToTokens;
use syn::{Item, ItemTrait, TraitItem, TraitItemFn};
use tracing::debug;

use crate::error::{RepogenError, Result};
use crate::model::InterfaceMethodRecord;

/// Parses `source` and returns the methods of its first trait in order.
///
/// A file without any trait yields an empty list.
///
/// ## Errors
///
/// Returns [`RepogenError::Parse`] when `source` is not valid Rust.
pub fn parse_interface_methods(source: &str) -> Result<Vec<InterfaceMethodRecord>> {
    let file = syn::parse_file(source)
        .map_err(|e| RepogenError::parse("previous interface file", e))?;

    let Some(item_trait) = first_trait(&file.items) else {
        debug!("no trait found in previous interface file");
        return Ok(Vec::new());
    };

    let index = LineIndex::new(source);
    let records = item_trait
        .items
        .iter()
        .filter_map(|item| match item {
            TraitItem::Fn(f) => Some(f),
            _ => None,
        })
        .map(|f| InterfaceMethodRecord::from_trait_fn(f, origin_text(f, source, &index)))
        .collect();

    Ok(records)
}

/// Names of the methods of the first trait in `source`.
pub fn interface_method_names(source: &str) -> Result<Vec<String>> {
    Ok(parse_interface_methods(source)?
        .into_iter()
        .map(|r| r.name)
        .collect())
}

fn first_trait(items: &[Item]) -> Option<&ItemTrait> {
    items.iter().find_map(|item| match item {
        Item::Trait(t) => Some(t),
        _ => None,
    })
}

/// Source slice covering every token of `item`.
fn origin_text(item: &TraitItemFn, source: &str, index: &LineIndex) -> String {
    let tokens = item.to_token_stream();
    let mut spans = tokens.into_iter().map(|tt| tt.span());
    let slice = spans.next().and_then(|first| {
        let last = spans.last().unwrap_or(first);
        let start = index.offset(source, first.start())?;
        let end = index.offset(source, last.end())?;
        let (start, end) = widen_to_comments(source, start, end);
        source.get(start..end)
    });

    match slice {
        Some(text) => text.to_string(),
        // spans unavailable: fall back to the token text
        None => item.to_token_stream().to_string(),
    }
}

/// Grows `start..end` over adjacent line comments.
fn widen_to_comments(source: &str, start: usize, end: usize) -> (usize, usize) {
    let mut start = start;
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    if source[line_start..start].trim().is_empty() {
        let mut cursor = line_start;
        while cursor > 0 {
            let prev_start = source[..cursor - 1].rfind('\n').map_or(0, |i| i + 1);
            let line = &source[prev_start..cursor - 1];
            let trimmed = line.trim_start();
            if !trimmed.starts_with("//") {
                break;
            }
            start = prev_start + (line.len() - trimmed.len());
            cursor = prev_start;
        }
    }

    let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
    let rest = &source[end..line_end];
    let end = if rest.trim_start().starts_with("//") {
        end + rest.trim_end().len()
    } else {
        end
    };
    (start, end)
}

/// Byte offsets of line starts, for turning line/column spans into slices.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// `line` is 1-based, `column` counts chars.
    fn offset(&self, source: &str, at: LineColumn) -> Option<usize> {
        let line_start = *self.starts.get(at.line.checked_sub(1)?)?;
        let line = source[line_start..].split('\n').next().unwrap_or_default();
        let within = line
            .char_indices()
            .nth(at.column)
            .map_or(line.len(), |(i, _)| i);
        Some(line_start + within)
    }
}
