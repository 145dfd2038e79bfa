use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, Ident, Pat, PatIdent, TraitItemFn};

use crate::error::{RepogenError, Result};
use crate::model::{InterfaceMethodRecord, Operation, OperationKind, Param, TypeExpr};

/// A schema field that needs a collection index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub key: String,
    pub unique: bool,
}

/// Where a method body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSource {
    Catalogue(Operation),
    Declared(InterfaceMethodRecord),
}

/// One fragment of a generated file.
///
/// Nodes are built once and rendered in order into a single buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    /// Module documentation heading the file. `use` lines are added by the
    /// import finalizer after formatting.
    ImportBlock { doc: String },
    /// The repository struct, plus index definitions when any field is
    /// tagged `index` or `unique`.
    StructDecl {
        repo: String,
        model: TypeExpr,
        indexes: Vec<IndexKey>,
    },
    ConstructorFunc {
        func: String,
        repo: String,
        model: TypeExpr,
    },
    /// The interface trait. `signatures` are formatted with the file;
    /// `kept` methods render as slot markers that are replaced with their
    /// exact text after formatting.
    InterfaceDecl {
        name: String,
        model: TypeExpr,
        signatures: Vec<String>,
        kept: Vec<String>,
    },
    /// `impl <trait> for <repo>`, forwarding every method to the inherent
    /// method of the same name.
    InterfaceImpl {
        name: String,
        repo: String,
        methods: Vec<MethodSource>,
    },
    /// One method body in its own inherent `impl` block.
    MethodDecl { repo: String, source: MethodSource },
}

impl RenderNode {
    pub fn render(&self) -> Result<String> {
        match self {
            Self::ImportBlock { doc } => {
                let doc = format!(" {doc}");
                Ok(quote! { #![doc = #doc] }.to_string())
            }
            Self::StructDecl {
                repo,
                model,
                indexes,
            } => render_struct(repo, model, indexes),
            Self::ConstructorFunc { func, repo, model } => {
                let func = ident(func)?;
                let repo = ident(repo)?;
                let model = model.to_token_stream()?;
                Ok(quote! {
                    /// Creates a repository backed by `collection`.
                    pub fn #func(collection: Collection<#model>) -> #repo {
                        #repo { collection }
                    }
                }
                .to_string())
            }
            Self::InterfaceDecl {
                name,
                model,
                signatures,
                kept,
            } => {
                ident(name)?;
                let mut items = signatures.clone();
                items.extend((0..kept.len()).map(|i| format!("const {}: ();", slot_marker(name, i))));
                Ok(format!(
                    "/// Repository operations for `{model}`.\n#[allow(async_fn_in_trait)]\npub trait {name} {{\n{}\n}}\n",
                    items.join("\n")
                ))
            }
            Self::InterfaceImpl {
                name,
                repo,
                methods,
            } => {
                let name = ident(name)?;
                let repo = ident(repo)?;
                let methods = methods
                    .iter()
                    .map(forwarding_method)
                    .collect::<Result<Vec<_>>>()?;
                Ok(quote! {
                    impl #name for #repo {
                        #(#methods)*
                    }
                }
                .to_string())
            }
            Self::MethodDecl { repo, source } => {
                let repo = ident(repo)?;
                let method = match source {
                    MethodSource::Catalogue(op) => catalogue_method(op)?,
                    MethodSource::Declared(record) => declared_method(record)?,
                };
                Ok(quote! {
                    impl #repo {
                        #method
                    }
                }
                .to_string())
            }
        }
    }

    /// Slot markers and the text each one stands for.
    pub fn kept_slots(&self) -> Vec<(String, &str)> {
        match self {
            Self::InterfaceDecl { name, kept, .. } => kept
                .iter()
                .enumerate()
                .map(|(i, text)| (slot_marker(name, i), text.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn slot_marker(interface: &str, index: usize) -> String {
    format!("__REPOGEN_KEEP_{interface}_{index}")
}

/// Trait signature text for a catalogue operation.
pub fn operation_signature(op: &Operation) -> Result<String> {
    let name = ident(op.name())?;
    let params = params(&op.params)?;
    let returns = returns(&op.returns)?;
    Ok(quote! { async fn #name(&self, #(#params),*) #returns; }.to_string())
}

fn render_struct(repo: &str, model: &TypeExpr, indexes: &[IndexKey]) -> Result<String> {
    let doc = format!(" MongoDB-backed repository for `{model}`.");
    let repo = ident(repo)?;
    let model = model.to_token_stream()?;

    let mut tokens = quote! {
        #[doc = #doc]
        #[derive(Clone)]
        pub struct #repo {
            collection: Collection<#model>,
        }
    };

    if !indexes.is_empty() {
        let models = indexes.iter().map(|index| {
            let key = &index.key;
            let unique = index.unique;
            quote! {
                IndexModel::builder()
                    .keys(doc! { #key: 1 })
                    .options(IndexOptions::builder().unique(#unique).build())
                    .build()
            }
        });
        tokens.extend(quote! {
            impl #repo {
                /// Indexes declared by the schema tags.
                pub fn index_models() -> Vec<IndexModel> {
                    Vec::from([#(#models),*])
                }
            }
        });
    }

    Ok(tokens.to_string())
}

fn catalogue_method(op: &Operation) -> Result<TokenStream> {
    let name = ident(op.name())?;
    let params = params(&op.params)?;
    let returns = returns(&op.returns)?;

    let body = match op.kind {
        OperationKind::FindOne => quote! { self.collection.find_one(filter).await },
        OperationKind::FindList => quote! {
            self.collection.find(filter).await?.try_collect().await
        },
        OperationKind::FindPageList => quote! {
            let skip = page.saturating_sub(1).saturating_mul(size.max(0) as u64);
            self.collection
                .find(filter)
                .skip(skip)
                .limit(size)
                .await?
                .try_collect()
                .await
        },
        OperationKind::FindSortPageList => quote! {
            let skip = page.saturating_sub(1).saturating_mul(size.max(0) as u64);
            self.collection
                .find(filter)
                .sort(sort)
                .skip(skip)
                .limit(size)
                .await?
                .try_collect()
                .await
        },
        OperationKind::InsertOne => quote! { self.collection.insert_one(data).await },
        OperationKind::UpdateOne => quote! { self.collection.update_one(filter, update).await },
        OperationKind::UpdateMany => quote! { self.collection.update_many(filter, update).await },
        OperationKind::DeleteOne => quote! { self.collection.delete_one(filter).await },
        OperationKind::BulkInsert => quote! { self.collection.insert_many(data).await },
        OperationKind::BulkUpdate => quote! {
            let mut results = Vec::with_capacity(filters.len());
            for (filter, update) in filters.into_iter().zip(updates) {
                results.push(self.collection.update_one(filter, update).await?);
            }
            Ok(results)
        },
        OperationKind::Aggregate => quote! {
            self.collection.aggregate(pipeline).await?.try_collect().await
        },
        OperationKind::Count => quote! { self.collection.count_documents(filter).await },
    };

    Ok(quote! {
        pub async fn #name(&self, #(#params),*) #returns {
            #body
        }
    })
}

/// An inherent method for a declared signature: its own default body, or
/// a `todo!` stub.
fn declared_method(record: &InterfaceMethodRecord) -> Result<TokenStream> {
    let item: TraitItemFn = syn::parse_str(&record.origin_token)
        .map_err(|e| RepogenError::parse(format!("method `{}`", record.name), e))?;
    let attrs = &item.attrs;
    let sig = &item.sig;

    let body = match &item.default {
        Some(block) => quote! { #block },
        None => {
            let message = format!("{} is not implemented yet", record.name);
            quote! { { todo!(#message) } }
        }
    };

    Ok(quote! {
        #(#attrs)*
        pub #sig #body
    })
}

/// A trait method that calls the inherent method of the same name.
fn forwarding_method(source: &MethodSource) -> Result<TokenStream> {
    match source {
        MethodSource::Catalogue(op) => {
            let name = ident(op.name())?;
            let params = params(&op.params)?;
            let returns = returns(&op.returns)?;
            let args = op
                .params
                .iter()
                .map(|p| ident(&p.name))
                .collect::<Result<Vec<_>>>()?;
            Ok(quote! {
                async fn #name(&self, #(#params),*) #returns {
                    Self::#name(self, #(#args),*).await
                }
            })
        }
        MethodSource::Declared(record) => {
            let item: TraitItemFn = syn::parse_str(&record.origin_token)
                .map_err(|e| RepogenError::parse(format!("method `{}`", record.name), e))?;
            let mut sig = item.sig;
            let mut args = Vec::new();
            for (i, input) in sig.inputs.iter_mut().enumerate() {
                let FnArg::Typed(typed) = input else {
                    continue;
                };
                // bind every pattern to a plain name
                let arg = match typed.pat.as_ref() {
                    Pat::Ident(p) => p.ident.clone(),
                    _ => format_ident!("arg{i}"),
                };
                *typed.pat = Pat::Ident(PatIdent {
                    attrs: Vec::new(),
                    by_ref: None,
                    mutability: None,
                    ident: arg.clone(),
                    subpat: None,
                });
                args.push(arg);
            }

            let name = &sig.ident;
            let receiver = sig.receiver().map(|_| quote! { self, });
            let awaited = sig.asyncness.map(|_| quote! { .await });
            Ok(quote! {
                #sig {
                    Self::#name(#receiver #(#args),*) #awaited
                }
            })
        }
    }
}

fn params(params: &[Param]) -> Result<Vec<TokenStream>> {
    params
        .iter()
        .map(|p| {
            let name = ident(&p.name)?;
            let ty = p.ty.to_token_stream()?;
            Ok(quote! { #name: #ty })
        })
        .collect()
}

fn returns(returns: &[TypeExpr]) -> Result<TokenStream> {
    let types = returns
        .iter()
        .map(TypeExpr::to_token_stream)
        .collect::<Result<Vec<_>>>()?;
    Ok(match types.as_slice() {
        [] => TokenStream::new(),
        [single] => quote! { -> #single },
        many => quote! { -> (#(#many),*) },
    })
}

fn ident(name: &str) -> Result<Ident> {
    syn::parse_str(name)
        .map_err(|e| RepogenError::parse(format!("identifier `{name}`"), e))
}
