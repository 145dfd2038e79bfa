use std::collections::HashSet;

use crate::error::{RepogenError, Result};

/// Field annotations recognised by the generator.
///
/// Raw tags are `key=value` pairs separated by commas or whitespace. A bare
/// boolean key means `true`.
///
/// ## Examples
///
/// ```
/// use repogen_lib::model::Tag;
///
/// let tag = Tag::parse("index=true, bson=title_text nullable").unwrap();
/// assert!(tag.index);
/// assert!(tag.nullable);
/// assert_eq!(tag.document_key("title"), "title_text");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub index: bool,
    pub unique: bool,
    pub kind: Option<String>,
    pub nullable: bool,
    pub hex: bool,
    pub signable: bool,
    pub bson: Option<String>,
}

impl Tag {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tag = Self::default();
        let mut seen = HashSet::new();

        for pair in raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
        {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k.trim(), Some(unquote(v.trim()))),
                None => (pair, None),
            };
            if !seen.insert(key.to_string()) {
                return Err(tag_error(raw, format!("key '{key}' repeated")));
            }

            match key {
                "index" => tag.index = flag(raw, key, value)?,
                "unique" => tag.unique = flag(raw, key, value)?,
                "nullable" => tag.nullable = flag(raw, key, value)?,
                "hex" => tag.hex = flag(raw, key, value)?,
                "signable" => tag.signable = flag(raw, key, value)?,
                "type" => tag.kind = Some(text(raw, key, value)?),
                "bson" => tag.bson = Some(text(raw, key, value)?),
                other => return Err(tag_error(raw, format!("unknown key '{other}'"))),
            }
        }

        Ok(tag)
    }

    /// Whether the field needs a collection index.
    pub fn is_indexed(&self) -> bool {
        self.index || self.unique
    }

    /// Stored document key: the `bson` override or the field name.
    pub fn document_key<'a>(&'a self, field: &'a str) -> &'a str {
        self.bson.as_deref().unwrap_or(field)
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

fn flag(raw: &str, key: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(tag_error(raw, format!("'{key}' expects a bool, got '{other}'"))),
    }
}

fn text(raw: &str, key: &str, value: Option<&str>) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(tag_error(raw, format!("'{key}' needs a value"))),
    }
}

fn tag_error(raw: &str, message: String) -> RepogenError {
    RepogenError::parse(format!("tag `{raw}`"), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_is_default() {
        assert_eq!(Tag::parse("").unwrap(), Tag::default());
    }

    #[test]
    fn parses_vocabulary() {
        let tag = Tag::parse(r#"index=true unique type="objectid",hex signable=false"#).unwrap();
        assert!(tag.index);
        assert!(tag.unique);
        assert!(tag.hex);
        assert!(!tag.signable);
        assert_eq!(tag.kind.as_deref(), Some("objectid"));
        assert!(tag.is_indexed());
    }

    #[test]
    fn document_key_prefers_override() {
        let tag = Tag::parse("bson=_id").unwrap();
        assert_eq!(tag.document_key("id"), "_id");
        assert_eq!(Tag::default().document_key("id"), "id");
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(Tag::parse("indexed=true").is_err());
        assert!(Tag::parse("index=maybe").is_err());
        assert!(Tag::parse("type").is_err());
        assert!(Tag::parse("index index=false").is_err());
    }
}
