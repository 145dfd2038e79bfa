//! Passive data structures shared by every generation stage.
//!
//! Nothing here performs I/O. The extractor builds these values, the
//! planner and renderer only read them.

mod method;
mod tag;
mod type_expr;

use std::collections::BTreeSet;

pub use method::{InterfaceMethodRecord, Operation, OperationKind, Param};
pub use tag::Tag;
pub use type_expr::TypeExpr;

use crate::naming::ArtifactPaths;

/// One annotated schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    pub tag: Tag,
}

/// What the previous run left on disk for a struct.
///
/// Present only when both generated files already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousArtifactState {
    /// Every method name declared by the prior interface.
    pub previous_method_names: BTreeSet<String>,
    /// Prior interface methods outside the catalogue, in source order.
    pub carried_forward: Vec<InterfaceMethodRecord>,
    /// Full text of the prior implementation file.
    pub implementation_source: String,
    /// Full text of the prior interface file.
    pub interface_source: String,
}

/// A struct ready for planning.
///
/// `name` and `package` together pick the output file pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStruct {
    pub name: String,
    pub package: String,
    /// Module path the model type is imported from.
    pub model_import: Option<String>,
    /// Type substituted into catalogue signatures.
    pub model: TypeExpr,
    pub fields: Vec<Field>,
    pub declared_methods: Vec<InterfaceMethodRecord>,
    pub paths: ArtifactPaths,
    pub previous: Option<PreviousArtifactState>,
}

impl SchemaStruct {
    pub fn is_update(&self) -> bool {
        self.previous.is_some()
    }

    /// Fields that carry an `index` or `unique` tag.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.tag.is_indexed())
    }
}
