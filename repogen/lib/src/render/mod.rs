//! Template composition for the implementation and interface files.
//!
//! A [`Template`] owns an ordered list of [`RenderNode`]s and optionally the
//! text of a previous file to build on. Only the nodes go through the
//! canonical formatter: previous text and kept interface methods are
//! emitted byte for byte, comments included. The assembled file is then
//! checked for syntax as a whole.
//!
//! ## Recipes
//!
//! - **New**: the implementation gets module docs, the constructor, the
//!   struct and one method per catalogue operation and declared method. The
//!   interface lists the catalogue followed by declared methods, then an
//!   `impl` of the trait for the repository.
//! - **Update**: the implementation is the previous file with bodies for
//!   methods the previous interface did not know appended after it. The
//!   interface is rebuilt from the catalogue, the carried methods verbatim
//!   and then the fresh ones.

pub mod format;
mod nodes;

use tracing::{debug, instrument};

pub use format::{CanonicalFormatter, PrettyPleaseFormatter, RustfmtFormatter, formatter_for};
pub use nodes::{IndexKey, MethodSource, RenderNode, operation_signature};

use crate::error::{RepogenError, Result};
use crate::model::SchemaStruct;
use crate::naming::to_snake_name;
use crate::planner::Plan;

/// An ordered render pass.
#[derive(Debug, Clone, Default)]
pub struct Template {
    base: Option<String>,
    nodes: Vec<RenderNode>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the full text of a previously generated file.
    pub fn on_top_of(previous: impl Into<String>) -> Self {
        Self {
            base: Some(previous.into()),
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: RenderNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    /// Concatenates the base text and every node, in order.
    pub fn render(&self) -> Result<String> {
        let mut buffer = self.base.clone().unwrap_or_default();
        if !buffer.is_empty() && !self.nodes.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&self.render_nodes()?);
        Ok(buffer)
    }

    fn render_nodes(&self) -> Result<String> {
        let rendered = self
            .nodes
            .iter()
            .map(RenderNode::render)
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n"))
    }

    /// Formats the nodes, appends them to the base text, fills kept-method
    /// slots and checks the result parses.
    ///
    /// ## Errors
    ///
    /// [`RepogenError::Format`] when the nodes or the assembled file are
    /// not valid Rust, or the formatter lost a slot marker.
    pub fn compose(&self, path: &str, formatter: &dyn CanonicalFormatter) -> Result<String> {
        let mut text = match &self.base {
            None => formatter.format(path, &self.render_nodes()?)?,
            Some(base) if self.nodes.is_empty() => base.clone(),
            Some(base) => {
                let appended = formatter.format(path, &self.render_nodes()?)?;
                format!("{}\n\n{appended}", base.trim_end())
            }
        };

        for node in &self.nodes {
            for (marker, kept) in node.kept_slots() {
                text = fill_slot(path, &text, &marker, kept)?;
            }
        }

        format::validate(path, &text)?;
        Ok(text)
    }
}

/// Replaces the line holding `const <marker>: ();` with `kept`, indented
/// like the marker.
fn fill_slot(path: &str, text: &str, marker: &str, kept: &str) -> Result<String> {
    let needle = format!("const {marker}: ();");
    let Some(at) = text.find(&needle) else {
        return Err(RepogenError::Format {
            path: path.to_string(),
            message: format!("formatter dropped slot `{marker}`"),
        });
    };
    let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[at..].find('\n').map_or(text.len(), |i| at + i);
    let indent = &text[line_start..at];

    Ok(format!("{}{indent}{kept}{}", &text[..line_start], &text[line_end..]))
}

/// Name of the generated repository struct.
pub fn repo_struct_name(schema: &SchemaStruct) -> String {
    format!("{}RepoMongo", schema.name)
}

/// Name of the generated interface trait.
pub fn interface_name(schema: &SchemaStruct) -> String {
    format!("{}Repository", schema.name)
}

/// Name of the generated constructor function.
pub fn constructor_name(schema: &SchemaStruct) -> String {
    format!("new_{}_repository", to_snake_name(&schema.name))
}

/// Builds the implementation template for the struct's recipe.
#[instrument(skip_all, fields(struct_name = %schema.name, update = schema.is_update()))]
pub fn implementation_template(schema: &SchemaStruct, plan: &Plan) -> Template {
    let repo = repo_struct_name(schema);

    let mut template = match &schema.previous {
        Some(previous) => Template::on_top_of(previous.implementation_source.clone()),
        None => {
            let mut template = Template::new();
            template
                .push(RenderNode::ImportBlock {
                    doc: format!("MongoDB repository implementation for `{}`.", schema.name),
                })
                .push(RenderNode::ConstructorFunc {
                    func: constructor_name(schema),
                    repo: repo.clone(),
                    model: schema.model.clone(),
                })
                .push(RenderNode::StructDecl {
                    repo: repo.clone(),
                    model: schema.model.clone(),
                    indexes: schema
                        .indexed_fields()
                        .map(|f| IndexKey {
                            key: f.tag.document_key(&f.name).to_string(),
                            unique: f.tag.unique,
                        })
                        .collect(),
                });
            template
        }
    };

    for op in &plan.pending_operations {
        template.push(RenderNode::MethodDecl {
            repo: repo.clone(),
            source: MethodSource::Catalogue(op.clone()),
        });
    }
    for method in &plan.fresh {
        template.push(RenderNode::MethodDecl {
            repo: repo.clone(),
            source: MethodSource::Declared(method.clone()),
        });
    }

    debug!(appended = template.nodes().len(), "implementation template built");
    template
}

/// Builds the interface template: catalogue, carried, then fresh methods.
#[instrument(skip_all, fields(struct_name = %schema.name))]
pub fn interface_template(schema: &SchemaStruct, plan: &Plan) -> Result<Template> {
    let signatures = plan
        .operations
        .iter()
        .map(operation_signature)
        .collect::<Result<Vec<_>>>()?;
    let kept = plan
        .carried
        .iter()
        .chain(&plan.fresh)
        .map(|m| m.origin_token.clone())
        .collect();

    let methods = plan
        .operations
        .iter()
        .cloned()
        .map(MethodSource::Catalogue)
        .chain(plan.carried.iter().chain(&plan.fresh).cloned().map(MethodSource::Declared))
        .collect();

    let mut template = Template::new();
    template
        .push(RenderNode::ImportBlock {
            doc: format!("Repository interface for `{}`.", schema.name),
        })
        .push(RenderNode::InterfaceDecl {
            name: interface_name(schema),
            model: schema.model.clone(),
            signatures,
            kept,
        })
        .push(RenderNode::InterfaceImpl {
            name: interface_name(schema),
            repo: repo_struct_name(schema),
            methods,
        });
    Ok(template)
}
