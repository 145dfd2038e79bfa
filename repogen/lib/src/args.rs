//! Table-driven parsing of the flat `key=value` plugin parameters.
//!
//! Every recognised key is listed in [`OPTIONS`] together with its value
//! kind. Parsing fails closed: an unknown key, a key given twice, a boolean
//! that is not `true`/`false` or a malformed map entry is an
//! [`RepogenError::Argument`]. Empty values leave the default in place.
//!
//! ## Examples
//!
//! ```
//! use repogen_lib::args::{Arguments, Formatter};
//!
//! let args = Arguments::unpack(&[
//!     "dao_dir=repo".to_string(),
//!     "gen_base=true".to_string(),
//!     "search_paths=idl;third_party".to_string(),
//!     "model_imports=video=crate::entity::video".to_string(),
//! ])
//! .unwrap();
//!
//! assert!(args.gen_base);
//! assert_eq!(args.search_paths, vec!["idl", "third_party"]);
//! assert_eq!(args.formatter, Formatter::PrettyPlease);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use strum::{Display, EnumString};

use crate::error::{RepogenError, Result};

/// Delimiter between list items and between map entries.
pub const LIST_DELIMITER: char = ';';

/// The value shape accepted by an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Str,
    Path,
    Bool,
    List,
    Map,
    Formatter,
}

/// One recognised parameter key.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: OptionKind,
    pub help: &'static str,
}

/// Every key the generator accepts.
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec { key: "out_dir", kind: OptionKind::Path, help: "root directory for generated files" },
    OptionSpec { key: "model_dir", kind: OptionKind::Path, help: "directory holding the model modules" },
    OptionSpec { key: "dao_dir", kind: OptionKind::Path, help: "directory receiving repository files" },
    OptionSpec { key: "verbose", kind: OptionKind::Bool, help: "log per-struct summaries at info level" },
    OptionSpec { key: "gen_base", kind: OptionKind::Bool, help: "also generate the shared base repository" },
    OptionSpec { key: "use_gen_dir", kind: OptionKind::Bool, help: "place models and repositories in the discovered generated directory" },
    OptionSpec { key: "module", kind: OptionKind::Str, help: "crate path prefix for model imports" },
    OptionSpec { key: "search_paths", kind: OptionKind::List, help: "IDL include paths" },
    OptionSpec { key: "protoc_options", kind: OptionKind::List, help: "pass-through options for protoc" },
    OptionSpec { key: "thrift_options", kind: OptionKind::List, help: "pass-through options for thriftgo" },
    OptionSpec { key: "model_imports", kind: OptionKind::Map, help: "package=import path overrides" },
    OptionSpec { key: "formatter", kind: OptionKind::Formatter, help: "prettyplease or rustfmt" },
];

/// Canonical formatter backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Formatter {
    #[default]
    PrettyPlease,
    Rustfmt,
}

/// Parsed generator options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arguments {
    pub out_dir: PathBuf,
    pub model_dir: PathBuf,
    pub dao_dir: PathBuf,
    pub verbose: bool,
    pub gen_base: bool,
    pub use_gen_dir: bool,
    pub module: String,
    pub search_paths: Vec<String>,
    pub protoc_options: Vec<String>,
    pub thrift_options: Vec<String>,
    pub model_imports: BTreeMap<String, String>,
    pub formatter: Formatter,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            model_dir: PathBuf::from("model"),
            dao_dir: PathBuf::from("dao"),
            verbose: false,
            gen_base: false,
            use_gen_dir: false,
            module: "crate".to_string(),
            search_paths: Vec::new(),
            protoc_options: Vec::new(),
            thrift_options: Vec::new(),
            model_imports: BTreeMap::new(),
            formatter: Formatter::default(),
        }
    }
}

enum Value {
    Str(String),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Formatter(Formatter),
}

impl Arguments {
    /// Parses a list of `key=value` parameters.
    ///
    /// ## Errors
    ///
    /// Returns [`RepogenError::Argument`] for a parameter without `=`, an
    /// unknown or repeated key, or a value that does not fit the key's kind.
    pub fn unpack(params: &[String]) -> Result<Self> {
        let mut args = Self::default();
        let mut seen = HashSet::new();

        for param in params {
            let (key, raw) = param
                .split_once('=')
                .ok_or_else(|| RepogenError::Argument(format!("expected key=value, got '{param}'")))?;
            let key = key.trim();
            let spec = OPTIONS
                .iter()
                .find(|spec| spec.key == key)
                .ok_or_else(|| RepogenError::Argument(format!("unknown parameter '{key}'")))?;

            if !seen.insert(spec.key) {
                return Err(RepogenError::Argument(format!(
                    "parameter '{key}' given more than once"
                )));
            }

            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let value = parse_value(spec, raw)?;
            args.assign(spec.key, value)?;
        }

        Ok(args)
    }

    /// Directory that receives the generated repository files.
    pub fn dao_root(&self) -> PathBuf {
        self.out_dir.join(&self.dao_dir)
    }

    fn assign(&mut self, key: &str, value: Value) -> Result<()> {
        match (key, value) {
            ("out_dir", Value::Str(v)) => self.out_dir = PathBuf::from(v),
            ("model_dir", Value::Str(v)) => self.model_dir = PathBuf::from(v),
            ("dao_dir", Value::Str(v)) => self.dao_dir = PathBuf::from(v),
            ("module", Value::Str(v)) => self.module = rust_path(key, v)?,
            ("verbose", Value::Bool(v)) => self.verbose = v,
            ("gen_base", Value::Bool(v)) => self.gen_base = v,
            ("use_gen_dir", Value::Bool(v)) => self.use_gen_dir = v,
            ("search_paths", Value::List(v)) => self.search_paths = v,
            ("protoc_options", Value::List(v)) => self.protoc_options = v,
            ("thrift_options", Value::List(v)) => self.thrift_options = v,
            ("model_imports", Value::Map(v)) => {
                self.model_imports = v
                    .into_iter()
                    .map(|(package, path)| Ok((package, rust_path(key, path)?)))
                    .collect::<Result<_>>()?;
            }
            ("formatter", Value::Formatter(v)) => self.formatter = v,
            _ => {
                return Err(RepogenError::Argument(format!(
                    "parameter '{key}' has no handler"
                )));
            }
        }
        Ok(())
    }
}

fn parse_value(spec: &OptionSpec, raw: &str) -> Result<Value> {
    let value = match spec.kind {
        OptionKind::Str | OptionKind::Path => Value::Str(raw.to_string()),
        OptionKind::Bool => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => {
                return Err(RepogenError::Argument(format!(
                    "parameter '{}' expects true or false, got '{other}'",
                    spec.key
                )));
            }
        },
        OptionKind::List => Value::List(split_list(raw)),
        OptionKind::Map => {
            let mut map = BTreeMap::new();
            for entry in split_list(raw) {
                let (k, v) = entry.split_once('=').ok_or_else(|| {
                    RepogenError::Argument(format!(
                        "parameter '{}' expects k=v entries, got '{entry}'",
                        spec.key
                    ))
                })?;
                let (k, v) = (k.trim(), v.trim());
                if k.is_empty() || v.is_empty() {
                    return Err(RepogenError::Argument(format!(
                        "parameter '{}' has an empty key or value in '{entry}'",
                        spec.key
                    )));
                }
                map.insert(k.to_string(), v.to_string());
            }
            Value::Map(map)
        }
        OptionKind::Formatter => Value::Formatter(Formatter::from_str(raw).map_err(|_| {
            RepogenError::Argument(format!(
                "parameter '{}' expects prettyplease or rustfmt, got '{raw}'",
                spec.key
            ))
        })?),
    };
    Ok(value)
}

/// Accepts `value` only if it is a Rust path such as `crate::model`.
fn rust_path(key: &str, value: String) -> Result<String> {
    match syn::parse_str::<syn::Path>(&value) {
        Ok(_) => Ok(value),
        Err(e) => Err(RepogenError::Argument(format!(
            "parameter '{key}' expects a Rust path, got '{value}': {e}"
        ))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
