use std::fmt;

use proc_macro2::TokenStream;
use quote::ToTokens;
use syn::{GenericArgument, PathArguments, Type};

use crate::error::{RepogenError, Result};

/// Closed recursive description of a field, parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A plain name or an opaque generic path kept verbatim.
    Identifier(String),
    /// A reference. Lifetimes are not kept; raw pointers are left opaque
    /// as [`TypeExpr::Identifier`].
    Pointer { mutable: bool, inner: Box<TypeExpr> },
    /// A sequence: `Vec<T>`, `[T]` or `[T; N]`.
    Slice(Box<TypeExpr>),
    /// `HashMap<K, V>` or `BTreeMap<K, V>`.
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// A type qualified by its module, `package::Name`.
    Selector { package: String, name: String },
    /// Any trait object.
    InterfaceAny,
}

impl TypeExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        Self::Pointer {
            mutable: false,
            inner: Box::new(inner),
        }
    }

    pub fn pointer_mut(inner: TypeExpr) -> Self {
        Self::Pointer {
            mutable: true,
            inner: Box::new(inner),
        }
    }

    pub fn slice(inner: TypeExpr) -> Self {
        Self::Slice(Box::new(inner))
    }

    pub fn selector(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Selector {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Parses type text such as `Vec<model::Video>`.
    pub fn parse(raw: &str) -> Result<Self> {
        let ty: Type = syn::parse_str(raw)
            .map_err(|e| RepogenError::parse(format!("type `{raw}`"), e))?;
        Ok(Self::from_syn(&ty))
    }

    /// Classifies a `syn` type by structural recursion.
    pub fn from_syn(ty: &Type) -> Self {
        match ty {
            Type::Reference(r) => Self::Pointer {
                mutable: r.mutability.is_some(),
                inner: Box::new(Self::from_syn(&r.elem)),
            },
            Type::Slice(s) => Self::slice(Self::from_syn(&s.elem)),
            Type::Array(a) => Self::slice(Self::from_syn(&a.elem)),
            Type::TraitObject(_) | Type::ImplTrait(_) => Self::InterfaceAny,
            Type::Paren(p) => Self::from_syn(&p.elem),
            Type::Group(g) => Self::from_syn(&g.elem),
            Type::Path(p) if p.qself.is_none() => Self::from_path(&p.path, ty),
            other => Self::Identifier(token_text(other)),
        }
    }

    fn from_path(path: &syn::Path, whole: &Type) -> Self {
        let Some(last) = path.segments.last() else {
            return Self::Identifier(token_text(whole));
        };

        if let PathArguments::AngleBracketed(args) = &last.arguments {
            let types: Vec<&Type> = args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    GenericArgument::Type(t) => Some(t),
                    _ => None,
                })
                .collect();

            return match (last.ident.to_string().as_str(), types.as_slice()) {
                ("Vec", [inner]) => Self::slice(Self::from_syn(inner)),
                ("HashMap" | "BTreeMap", [k, v]) => {
                    Self::Map(Box::new(Self::from_syn(k)), Box::new(Self::from_syn(v)))
                }
                ("Box", [Type::TraitObject(_)]) => Self::InterfaceAny,
                _ => Self::Identifier(token_text(whole)),
            };
        }

        let plain = path
            .segments
            .iter()
            .all(|seg| matches!(seg.arguments, PathArguments::None));
        if !plain {
            return Self::Identifier(token_text(whole));
        }

        let names: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        match names.split_last() {
            Some((name, [])) => Self::Identifier(name.clone()),
            Some((name, package)) => Self::selector(package.join("::"), name.clone()),
            None => Self::Identifier(token_text(whole)),
        }
    }

    /// Renders the type as tokens for `quote!` interpolation.
    pub fn to_token_stream(&self) -> Result<TokenStream> {
        let text = self.to_string();
        text.parse::<TokenStream>()
            .map_err(|e| RepogenError::parse(format!("type `{text}`"), e))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => f.write_str(name),
            Self::Pointer { mutable: false, inner } => write!(f, "&{inner}"),
            Self::Pointer { mutable: true, inner } => write!(f, "&mut {inner}"),
            Self::Slice(inner) => write!(f, "Vec<{inner}>"),
            Self::Map(k, v) => write!(f, "std::collections::HashMap<{k}, {v}>"),
            Self::Selector { package, name } => write!(f, "{package}::{name}"),
            Self::InterfaceAny => f.write_str("Box<dyn std::any::Any + Send + Sync>"),
        }
    }
}

/// Token text of a type with the spacing `to_string` inserts removed.
fn token_text(ty: &Type) -> String {
    let raw = ty.to_token_stream().to_string();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.peek().copied();
            let glue = matches!(prev, Some('<' | ':' | '&' | '(' | '*'))
                || matches!(next, Some('<' | '>' | ':' | ',' | ')'));
            if glue {
                continue;
            }
        }
        out.push(c);
    }
    out
}
