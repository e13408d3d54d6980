//! Declared and canonical type representations.
//!
//! Callers describe types with [`TypeDecl`], an explicit tagged union of the
//! four supported shapes. Canonicalization turns a declaration into a
//! [`Type`]: a cheap-to-clone, hashable and totally ordered form in which two
//! structurally identical declarations compare equal.

use std::any::{TypeId, type_name};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// A nominal (opaque) type, compared by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nominal {
    /// A Rust type, identified by its `TypeId`.
    Rust { id: TypeId, name: &'static str },
    /// A type family declared by name only.
    Named(Arc<str>),
}

/// Canonical type shape.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeShape {
    /// Opaque nominal type.
    Nominal(Nominal),
    /// Homogeneous sequence of the inner type.
    Sequence(Type),
    /// Mapping from key type to value type.
    Mapping(Type, Type),
    /// Function signature: parameter types and return type.
    Function(Vec<Type>, Type),
}

/// Canonical type used as registry key and for every type comparison.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(Arc<TypeShape>);

impl Type {
    /// Nominal type for a Rust type.
    pub fn of<T: 'static>() -> Self {
        Self::from_shape(TypeShape::Nominal(Nominal::Rust {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }))
    }

    /// Nominal type declared by name.
    ///
    /// Names are interned, so textually identical names share one entry.
    pub fn named(name: &str) -> Self {
        Self::from_shape(TypeShape::Nominal(Nominal::Named(intern(name))))
    }

    /// Sequence of `inner`.
    pub fn sequence(inner: Type) -> Self {
        Self::from_shape(TypeShape::Sequence(inner))
    }

    /// Mapping from `key` to `value`.
    pub fn mapping(key: Type, value: Type) -> Self {
        Self::from_shape(TypeShape::Mapping(key, value))
    }

    /// Function signature.
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::from_shape(TypeShape::Function(params, ret))
    }

    fn from_shape(shape: TypeShape) -> Self {
        Self(Arc::new(shape))
    }

    /// The shape of this type.
    pub fn shape(&self) -> &TypeShape {
        &self.0
    }

    /// Parameter and return types if this is a function signature.
    pub fn as_function(&self) -> Option<(&[Type], &Type)> {
        match self.shape() {
            TypeShape::Function(params, ret) => Some((params, ret)),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            TypeShape::Nominal(Nominal::Rust { name, .. }) => {
                let name: &str = name;
                // Strip module paths but keep generic arguments readable.
                let head = name.split('<').next().unwrap_or(name);
                let short = head.rsplit("::").next().unwrap_or(head);
                write!(f, "{short}{}", &name[head.len()..])
            }
            TypeShape::Nominal(Nominal::Named(name)) => write!(f, "{name}"),
            TypeShape::Sequence(inner) => write!(f, "[{inner}]"),
            TypeShape::Mapping(key, value) => write!(f, "{{{key}: {value}}}"),
            TypeShape::Function(params, ret) => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

/// A user-declared type, prior to canonicalization.
#[derive(Debug, Clone)]
pub enum TypeDecl {
    /// Rust type, compared by `TypeId`.
    Rust { id: TypeId, name: &'static str },
    /// Type family declared by name.
    Named(String),
    /// Homogeneous sequence.
    Sequence(Box<TypeDecl>),
    /// Mapping from key to value.
    Mapping(Box<TypeDecl>, Box<TypeDecl>),
    /// Function signature.
    Function(Vec<TypeDecl>, Box<TypeDecl>),
    /// An already canonical type.
    Canonical(Type),
}

impl TypeDecl {
    /// Declaration of a Rust type.
    pub fn of<T: 'static>() -> Self {
        Self::Rust {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Sequence declaration.
    pub fn sequence(inner: impl Into<TypeDecl>) -> Self {
        Self::Sequence(Box::new(inner.into()))
    }

    /// Mapping declaration.
    pub fn mapping(key: impl Into<TypeDecl>, value: impl Into<TypeDecl>) -> Self {
        Self::Mapping(Box::new(key.into()), Box::new(value.into()))
    }

    /// Function signature declaration.
    pub fn function<I, D>(params: I, ret: impl Into<TypeDecl>) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<TypeDecl>,
    {
        Self::Function(
            params.into_iter().map(Into::into).collect(),
            Box::new(ret.into()),
        )
    }

    /// Canonicalize, recursing into composite shapes.
    ///
    /// Canonicalizing an already canonical declaration returns it unchanged.
    pub fn canonicalize(&self) -> Type {
        match self {
            Self::Rust { id, name } => Type::from_shape(TypeShape::Nominal(Nominal::Rust {
                id: *id,
                name: *name,
            })),
            Self::Named(name) => Type::named(name),
            Self::Sequence(inner) => Type::sequence(inner.canonicalize()),
            Self::Mapping(key, value) => Type::mapping(key.canonicalize(), value.canonicalize()),
            Self::Function(params, ret) => Type::function(
                params.iter().map(Self::canonicalize).collect(),
                ret.canonicalize(),
            ),
            Self::Canonical(ty) => ty.clone(),
        }
    }
}

impl From<&str> for TypeDecl {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for TypeDecl {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Type> for TypeDecl {
    fn from(ty: Type) -> Self {
        Self::Canonical(ty)
    }
}

impl From<&Type> for TypeDecl {
    fn from(ty: &Type) -> Self {
        Self::Canonical(ty.clone())
    }
}

/// Intern a type-family name.
fn intern(name: &str) -> Arc<str> {
    static NAMES: OnceLock<Mutex<HashSet<Arc<str>>>> = OnceLock::new();
    let names = NAMES.get_or_init(|| Mutex::new(HashSet::new()));
    match names.lock() {
        Ok(mut names) => {
            if let Some(existing) = names.get(name) {
                return Arc::clone(existing);
            }
            let interned: Arc<str> = Arc::from(name);
            names.insert(Arc::clone(&interned));
            interned
        }
        // Equality is by content, so a fresh allocation is still correct.
        Err(_) => Arc::from(name),
    }
}
