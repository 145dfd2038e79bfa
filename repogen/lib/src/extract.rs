//! Turns raw request structs into validated [`SchemaStruct`] values.
//!
//! Extraction is also where a struct is classified as new or update: when
//! both target files already exist they are loaded, the prior interface is
//! parsed, and the result is frozen into a [`PreviousArtifactState`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};

use syn::{Ident, TraitItemFn};
use tracing::{debug, instrument};

use crate::args::Arguments;
use crate::error::{RepogenError, Result};
use crate::existing::parse_interface_methods;
use crate::model::{
    Field, InterfaceMethodRecord, PreviousArtifactState, SchemaStruct, Tag, TypeExpr,
};
use crate::naming::{ArtifactPaths, artifact_paths, module_alias, to_snake_name};
use crate::planner::Catalogue;
use crate::request::RawStruct;

/// Extracts structs for one run and remembers every model import it saw.
pub struct Extractor<'a> {
    args: &'a Arguments,
    catalogue: &'a Catalogue,
    observed_imports: Vec<String>,
}

impl<'a> Extractor<'a> {
    pub fn new(args: &'a Arguments, catalogue: &'a Catalogue) -> Self {
        Self {
            args,
            catalogue,
            observed_imports: Vec::new(),
        }
    }

    /// Model import paths in first-seen order, without duplicates.
    pub fn observed_imports(&self) -> &[String] {
        &self.observed_imports
    }

    /// Validates `raw` and classifies it against the files on disk.
    ///
    /// ## Errors
    ///
    /// - [`RepogenError::Parse`] for an invalid name, type, tag, method
    ///   signature or model import path, or a prior interface file that is
    ///   not valid Rust
    /// - [`RepogenError::Io`] when a prior file cannot be read
    #[instrument(skip(self, raw), fields(struct_name = %raw.name, package = %raw.package))]
    pub fn extract(&mut self, raw: &RawStruct) -> Result<SchemaStruct> {
        let context = format!("struct {}", raw.name);
        parse_ident(&raw.name, &context)?;
        if raw.package.trim().is_empty() {
            return Err(RepogenError::parse(context, "package name is empty"));
        }

        let fields = raw
            .fields
            .iter()
            .map(|f| {
                let field_context = format!("{context}.{}", f.name);
                parse_ident(&f.name, &field_context)?;
                Ok(Field {
                    name: f.name.clone(),
                    ty: TypeExpr::parse(&f.ty)
                        .map_err(|e| RepogenError::parse(&field_context, e))?,
                    tag: Tag::parse(&f.tag).map_err(|e| RepogenError::parse(&field_context, e))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let declared_methods = raw
            .methods
            .iter()
            .map(|m| parse_declared_method(m, &context))
            .collect::<Result<Vec<_>>>()?;

        let model_import = self.model_import_for(raw);
        syn::parse_str::<syn::Path>(&model_import).map_err(|e| {
            RepogenError::parse(&context, format!("model import `{model_import}` is not a Rust path: {e}"))
        })?;
        self.observe(&model_import);
        let model = TypeExpr::selector(module_alias(&model_import), &raw.name);

        let paths = artifact_paths(&self.args.dao_root(), &raw.package, &raw.name);
        let previous = if paths.both_exist() {
            debug!(interface = %paths.interface.display(), "both artifacts exist, updating");
            Some(self.load_previous(&paths, &context)?)
        } else {
            debug!("no complete artifact pair on disk, generating fresh");
            None
        };

        Ok(SchemaStruct {
            name: raw.name.clone(),
            package: raw.package.clone(),
            model_import: Some(model_import),
            model,
            fields,
            declared_methods,
            paths,
            previous,
        })
    }

    fn model_import_for(&self, raw: &RawStruct) -> String {
        if let Some(explicit) = &raw.model_import {
            return explicit.clone();
        }
        if let Some(mapped) = self.args.model_imports.get(&raw.package) {
            return mapped.clone();
        }

        let mut segments = vec![self.args.module.clone()];
        segments.extend(module_segments(&self.args.model_dir));
        segments.extend(to_snake_name(&raw.package).split('/').map(str::to_string));
        segments.join("::")
    }

    fn observe(&mut self, import: &str) {
        if !self.observed_imports.iter().any(|i| i == import) {
            self.observed_imports.push(import.to_string());
        }
    }

    fn load_previous(&self, paths: &ArtifactPaths, context: &str) -> Result<PreviousArtifactState> {
        let implementation_source = read(&paths.implementation)?;
        let interface_source = read(&paths.interface)?;

        let records = parse_interface_methods(&interface_source).map_err(|e| {
            RepogenError::parse(format!("{context} ({})", paths.interface.display()), e)
        })?;

        let previous_method_names: BTreeSet<String> =
            records.iter().map(|r| r.name.clone()).collect();
        let carried_forward: Vec<InterfaceMethodRecord> = records
            .into_iter()
            .filter(|r| !self.catalogue.contains(&r.name))
            .collect();

        debug!(
            previous = previous_method_names.len(),
            carried = carried_forward.len(),
            "classified previous interface"
        );

        Ok(PreviousArtifactState {
            previous_method_names,
            carried_forward,
            implementation_source,
            interface_source,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| RepogenError::io(path, e))
}

fn parse_ident(name: &str, context: &str) -> Result<()> {
    syn::parse_str::<Ident>(name)
        .map(|_| ())
        .map_err(|e| RepogenError::parse(context, format!("`{name}` is not an identifier: {e}")))
}

/// Parses a declared trait method; a missing trailing `;` is supplied.
fn parse_declared_method(raw: &str, context: &str) -> Result<InterfaceMethodRecord> {
    let trimmed = raw.trim();
    let text = if trimmed.ends_with(';') || trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    };
    let item: TraitItemFn = syn::parse_str(&text)
        .map_err(|e| RepogenError::parse(context, format!("method `{trimmed}`: {e}")))?;
    Ok(InterfaceMethodRecord::from_trait_fn(&item, text))
}

/// Module path segments for a model directory such as `src/model`.
fn module_segments(dir: &Path) -> Vec<String> {
    let mut segments: Vec<String> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.first().is_some_and(|s| s == "src") {
        segments.remove(0);
    }
    segments
}
