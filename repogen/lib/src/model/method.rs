use quote::ToTokens;
use strum::{Display, EnumIter, IntoStaticStr};
use syn::{FnArg, ReturnType, TraitItemFn, Type};

use super::TypeExpr;

/// The twelve repository operations every struct receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    FindOne,
    FindList,
    FindPageList,
    FindSortPageList,
    InsertOne,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    BulkInsert,
    BulkUpdate,
    Aggregate,
    Count,
}

impl OperationKind {
    /// Method name used in generated code.
    pub fn method_name(self) -> &'static str {
        self.into()
    }
}

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// One catalogue operation with the model type substituted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub params: Vec<Param>,
    pub returns: Vec<TypeExpr>,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        self.kind.method_name()
    }
}

/// A method declared on an interface trait.
///
/// `origin_token` holds the exact source text the method came from and is
/// emitted unchanged whenever the method is carried into a new interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMethodRecord {
    pub name: String,
    pub is_async: bool,
    pub params: Vec<Param>,
    pub returns: Vec<TypeExpr>,
    pub origin_token: String,
}

impl InterfaceMethodRecord {
    /// Builds a record from a parsed trait method and its source text.
    pub fn from_trait_fn(item: &TraitItemFn, origin_token: impl Into<String>) -> Self {
        let sig = &item.sig;
        let params = sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Receiver(_) => None,
                FnArg::Typed(pat) => Some(Param::new(
                    pat.pat.to_token_stream().to_string(),
                    TypeExpr::from_syn(&pat.ty),
                )),
            })
            .collect();
        let returns = match &sig.output {
            ReturnType::Default => Vec::new(),
            ReturnType::Type(_, ty) => match ty.as_ref() {
                Type::Tuple(tuple) => tuple.elems.iter().map(TypeExpr::from_syn).collect(),
                other => vec![TypeExpr::from_syn(other)],
            },
        };

        Self {
            name: sig.ident.to_string(),
            is_async: sig.asyncness.is_some(),
            params,
            returns,
            origin_token: origin_token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn kinds_are_snake_case_and_ordered() {
        let names: Vec<&str> = OperationKind::iter().map(OperationKind::method_name).collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "find_one");
        assert_eq!(names[3], "find_sort_page_list");
        assert_eq!(names[11], "count");
    }

    #[test]
    fn record_from_trait_fn() {
        let src = "async fn search(&self, title: String, tags: Vec<String>) -> MongoResult<Vec<video::Video>>;";
        let item: TraitItemFn = syn::parse_str(src).unwrap();
        let record = InterfaceMethodRecord::from_trait_fn(&item, src);

        assert_eq!(record.name, "search");
        assert!(record.is_async);
        assert_eq!(record.params.len(), 2);
        assert_eq!(record.params[1].ty, TypeExpr::slice(TypeExpr::ident("String")));
        assert_eq!(record.returns[0].to_string(), "MongoResult<Vec<video::Video>>");
        assert_eq!(record.origin_token, src);
    }

    #[test]
    fn tuple_returns_are_split() {
        let item: TraitItemFn = syn::parse_str("fn pair(&self) -> (i64, String);").unwrap();
        let record = InterfaceMethodRecord::from_trait_fn(&item, "");
        assert_eq!(record.returns, vec![TypeExpr::ident("i64"), TypeExpr::ident("String")]);
    }
}
