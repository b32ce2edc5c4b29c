//! Semantic type model.
//!
//! Types are resolved from syntax by the [`Loader`](crate::loader::Loader);
//! identity is plain structural equality on these values, with named types
//! identified by defining package path and name.

use std::fmt;

use crate::syntax::{is_exported, ChanDir};

pub mod method_set;
pub mod resolve;

pub use method_set::{satisfies, MethodEntry, MethodOrigin, MethodSet};

/// Package path used for predeclared (universe) named types.
pub const UNIVERSE: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(String),
    Named(NamedType),
    TypeParam(String),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(String, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Func(Signature),
    Struct(Vec<Field>),
    Interface(InterfaceType),
    /// Valid syntax that has no modelled type (cgo names, constraint syntax).
    Invalid(String),
}

impl Type {
    pub fn named(package: &str, name: &str) -> Self {
        Type::Named(NamedType {
            package: package.to_string(),
            name: name.to_string(),
            args: Vec::new(),
        })
    }

    pub fn basic(name: &str) -> Self {
        Type::Basic(name.to_string())
    }

    pub fn pointer_to(self) -> Self {
        Type::Pointer(Box::new(self))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Basic(name) if name == "string")
    }

    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            Type::Named(named) => Some(named),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    /// Import path of the defining package; [`UNIVERSE`] for predeclared names.
    pub package: String,
    pub name: String,
    pub args: Vec<Type>,
}

impl NamedType {
    pub fn is(&self, package: &str, name: &str) -> bool {
        self.package == package && self.name == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// `None` for embedded fields.
    pub name: Option<String>,
    pub ty: Type,
}

impl Field {
    pub fn is_embedded(&self) -> bool {
        self.name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InterfaceType {
    pub methods: Vec<InterfaceMethod>,
    pub embeds: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    pub key: MethodKey,
    pub signature: Signature,
}

/// Method identity: exported names match by name alone, unexported names
/// only within their declaring package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub name: String,
    pub package: Option<String>,
}

impl MethodKey {
    pub fn new(name: &str, package: &str) -> Self {
        Self {
            name: name.to_string(),
            package: (!is_exported(name)).then(|| package.to_string()),
        }
    }

    pub fn is_exported(&self) -> bool {
        self.package.is_none()
    }
}

/// A parameter or result after resolution, one per declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParam {
    /// `None` for unnamed entries.
    pub name: Option<String>,
    pub ty: Type,
    pub variadic: bool,
}

/// Look up a predeclared type name.
pub fn universe_type(name: &str) -> Option<Type> {
    let ty = match name {
        "bool" | "string" | "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8"
        | "uint16" | "uint32" | "uint64" | "uintptr" | "float32" | "float64" | "complex64"
        | "complex128" => Type::basic(name),
        "byte" => Type::basic("uint8"),
        "rune" => Type::basic("int32"),
        "error" | "comparable" => Type::named(UNIVERSE, name),
        "any" => Type::Interface(InterfaceType::default()),
        _ => return None,
    };
    Some(ty)
}

/// Underlying type of a predeclared named type.
pub fn universe_underlying(name: &str) -> Option<Type> {
    match name {
        "error" => Some(Type::Interface(InterfaceType {
            methods: vec![InterfaceMethod {
                key: MethodKey::new("Error", UNIVERSE),
                signature: Signature {
                    params: Vec::new(),
                    results: vec![Type::basic("string")],
                    variadic: false,
                },
            }],
            embeds: Vec::new(),
        })),
        "comparable" => Some(Type::Interface(InterfaceType::default())),
        _ => None,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(name) | Type::TypeParam(name) => write!(f, "{name}"),
            Type::Named(named) => {
                if named.package.is_empty() {
                    write!(f, "{}", named.name)?;
                } else {
                    write!(f, "{}.{}", named.package, named.name)?;
                }
                if !named.args.is_empty() {
                    write!(f, "[{}]", join(&named.args))?;
                }
                Ok(())
            }
            Type::Pointer(inner) => write!(f, "*{inner}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Array(len, elem) => write!(f, "[{len}]{elem}"),
            Type::Map(key, value) => write!(f, "map[{key}]{value}"),
            Type::Chan(ChanDir::Both, elem) => write!(f, "chan {elem}"),
            Type::Chan(ChanDir::Send, elem) => write!(f, "chan<- {elem}"),
            Type::Chan(ChanDir::Recv, elem) => write!(f, "<-chan {elem}"),
            Type::Func(sig) => write!(f, "func{sig}"),
            Type::Struct(fields) => write!(f, "struct{{{} fields}}", fields.len()),
            Type::Interface(iface) => write!(f, "interface{{{} methods}}", iface.methods.len()),
            Type::Invalid(text) => write!(f, "invalid({text})"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param {
                Type::Slice(elem) if self.variadic && i + 1 == self.params.len() => {
                    write!(f, "...{elem}")?
                }
                other => write!(f, "{other}")?,
            }
        }
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {single}"),
            many => write!(f, " ({})", join(many)),
        }
    }
}

fn join(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
