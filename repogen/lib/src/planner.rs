//! The fixed operation catalogue and per-struct planning.
//!
//! [`Catalogue::standard`] is an explicit, read-only table of the twelve
//! repository operations. Signatures are templates over the struct's model
//! type, so the shape of the catalogue never varies between structs.
//!
//! ## Examples
//!
//! ```
//! use repogen_lib::model::TypeExpr;
//! use repogen_lib::planner::Catalogue;
//!
//! let catalogue = Catalogue::standard();
//! let ops = catalogue.operations(&TypeExpr::selector("video", "Video"));
//!
//! assert_eq!(ops.len(), 12);
//! assert_eq!(ops[0].returns[0].to_string(), "MongoResult<Option<video::Video>>");
//! assert!(catalogue.contains("bulk_update"));
//! ```

use std::collections::HashSet;

use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::model::{InterfaceMethodRecord, Operation, OperationKind, Param, SchemaStruct, TypeExpr};

/// A type expressed in terms of the model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTemplate {
    Fixed(&'static str),
    Model,
    Ref(&'static TypeTemplate),
    List(&'static TypeTemplate),
    Generic(&'static str, &'static TypeTemplate),
}

impl TypeTemplate {
    pub fn resolve(&self, model: &TypeExpr) -> TypeExpr {
        match self {
            Self::Fixed(name) => TypeExpr::ident(*name),
            Self::Model => model.clone(),
            Self::Ref(inner) => TypeExpr::pointer(inner.resolve(model)),
            Self::List(inner) => TypeExpr::slice(inner.resolve(model)),
            Self::Generic(outer, inner) => {
                TypeExpr::ident(format!("{outer}<{}>", inner.resolve(model)))
            }
        }
    }
}

/// Signature template for one catalogue member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTemplate {
    pub kind: OperationKind,
    pub params: &'static [(&'static str, TypeTemplate)],
    pub returns: TypeTemplate,
}

const DOCUMENT: TypeTemplate = TypeTemplate::Fixed("Document");
const DOCUMENTS: TypeTemplate = TypeTemplate::List(&DOCUMENT);

const fn mongo_result(inner: &'static TypeTemplate) -> TypeTemplate {
    TypeTemplate::Generic("MongoResult", inner)
}

fn template_for(kind: OperationKind) -> OperationTemplate {
    use OperationKind::*;
    use TypeTemplate::*;

    let (params, returns): (&'static [(&'static str, TypeTemplate)], TypeTemplate) = match kind {
        FindOne => (
            &[("filter", DOCUMENT)],
            mongo_result(&Generic("Option", &Model)),
        ),
        FindList => (&[("filter", DOCUMENT)], mongo_result(&List(&Model))),
        FindPageList => (
            &[("filter", DOCUMENT), ("page", Fixed("u64")), ("size", Fixed("i64"))],
            mongo_result(&List(&Model)),
        ),
        FindSortPageList => (
            &[
                ("filter", DOCUMENT),
                ("sort", DOCUMENT),
                ("page", Fixed("u64")),
                ("size", Fixed("i64")),
            ],
            mongo_result(&List(&Model)),
        ),
        InsertOne => (&[("data", Ref(&Model))], mongo_result(&Fixed("InsertOneResult"))),
        UpdateOne | UpdateMany => (
            &[("filter", DOCUMENT), ("update", DOCUMENT)],
            mongo_result(&Fixed("UpdateResult")),
        ),
        DeleteOne => (&[("filter", DOCUMENT)], mongo_result(&Fixed("DeleteResult"))),
        BulkInsert => (&[("data", List(&Model))], mongo_result(&Fixed("InsertManyResult"))),
        BulkUpdate => (
            &[("filters", DOCUMENTS), ("updates", DOCUMENTS)],
            mongo_result(&List(&Fixed("UpdateResult"))),
        ),
        Aggregate => (&[("pipeline", DOCUMENTS)], mongo_result(&DOCUMENTS)),
        Count => (&[("filter", DOCUMENT)], mongo_result(&Fixed("u64"))),
    };

    OperationTemplate {
        kind,
        params,
        returns,
    }
}

/// The closed set of operations generated for every struct.
#[derive(Debug, Clone)]
pub struct Catalogue {
    templates: Vec<OperationTemplate>,
}

impl Catalogue {
    pub fn standard() -> Self {
        Self {
            templates: OperationKind::iter().map(template_for).collect(),
        }
    }

    /// Catalogue signatures with `model` substituted.
    pub fn operations(&self, model: &TypeExpr) -> Vec<Operation> {
        self.templates
            .iter()
            .map(|t| Operation {
                kind: t.kind,
                params: t
                    .params
                    .iter()
                    .map(|(name, ty)| Param::new(*name, ty.resolve(model)))
                    .collect(),
                returns: vec![t.returns.resolve(model)],
            })
            .collect()
    }

    pub fn contains(&self, method_name: &str) -> bool {
        self.templates
            .iter()
            .any(|t| t.kind.method_name() == method_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.templates.iter().map(|t| t.kind.method_name())
    }
}

/// What the renderer should emit for one struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// All catalogue operations, in catalogue order.
    pub operations: Vec<Operation>,
    /// Catalogue operations without a body in the prior implementation.
    pub pending_operations: Vec<Operation>,
    /// Prior non-catalogue interface methods, emitted verbatim.
    pub carried: Vec<InterfaceMethodRecord>,
    /// Declared methods never seen before.
    pub fresh: Vec<InterfaceMethodRecord>,
}

/// Plans the catalogue and partitions the struct's declared methods.
pub fn plan(schema: &SchemaStruct, catalogue: &Catalogue) -> Plan {
    let operations = catalogue.operations(&schema.model);
    let previous_names = schema.previous.as_ref().map(|p| &p.previous_method_names);

    let pending_operations = operations
        .iter()
        .filter(|op| previous_names.is_none_or(|names| !names.contains(op.name())))
        .cloned()
        .collect();

    let carried = schema
        .previous
        .as_ref()
        .map(|p| p.carried_forward.clone())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut fresh = Vec::new();
    for method in &schema.declared_methods {
        if catalogue.contains(&method.name) {
            warn!(
                struct_name = %schema.name,
                method = %method.name,
                "declared method shadows a catalogue operation and is skipped"
            );
            continue;
        }
        if !seen.insert(method.name.as_str()) {
            warn!(struct_name = %schema.name, method = %method.name, "duplicate declared method skipped");
            continue;
        }
        if previous_names.is_some_and(|names| names.contains(&method.name)) {
            debug!(method = %method.name, "declared method already present, carried forward");
            continue;
        }
        fresh.push(method.clone());
    }

    Plan {
        operations,
        pending_operations,
        carried,
        fresh,
    }
}
