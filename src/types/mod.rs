//! Runtime type descriptors.
//!
//! A [`TypeDescriptor`] describes a possibly generic type, so that "list of
//! Foo" and "list of Bar" negotiate and (de)serialize differently even though
//! both would erase to the same raw shape.
use std::any;
use std::borrow::Cow;
use std::fmt;

pub use resolver::{ClassDecl, Declared, Hierarchy, ResolveError, TypeArg, TypeRef};

pub mod resolver;

/// A raw (non-parameterized) type, identified by its fully qualified name.
///
/// Rust types get their name from [`std::any::type_name`]; declared classes
/// that only exist in a [`Hierarchy`] are named explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawType(Cow<'static, str>);

impl RawType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(any::type_name::<T>()))
    }
    pub fn named<S: Into<Cow<'static, str>>>(name: S) -> Self {
        Self(name.into())
    }
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw type together with its type arguments.
///
/// Two descriptors are equal iff their raw types are equal and their
/// arguments are equal, recursively.
///
/// # Example
/// ```
/// use jbcontent::types::{RawType, TypeDescriptor};
///
/// let list = RawType::named("List");
/// let foo = TypeDescriptor::named("Foo");
/// let bar = TypeDescriptor::named("Bar");
///
/// let list_of_foo = TypeDescriptor::generic(list.clone(), vec![foo.clone()]);
/// assert_eq!(list_of_foo, TypeDescriptor::generic(list.clone(), vec![foo]));
/// assert_ne!(list_of_foo, TypeDescriptor::generic(list, vec![bar]));
/// assert_eq!(list_of_foo.to_string(), "List<Foo>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    raw: RawType,
    args: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    /// Descriptor of a concrete Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::raw(RawType::of::<T>())
    }
    pub fn named<S: Into<Cow<'static, str>>>(name: S) -> Self {
        Self::raw(RawType::named(name))
    }
    pub fn raw(raw: RawType) -> Self {
        Self { raw, args: vec![] }
    }
    pub fn generic(raw: RawType, args: Vec<TypeDescriptor>) -> Self {
        Self { raw, args }
    }
    pub fn raw_type(&self) -> &RawType {
        &self.raw
    }
    pub fn args(&self) -> &[TypeDescriptor] {
        &self.args
    }
    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }
    /// True if this descriptor is exactly the raw descriptor of `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        !self.is_generic() && self.raw == RawType::of::<T>()
    }
}

impl From<RawType> for TypeDescriptor {
    fn from(raw: RawType) -> Self {
        Self::raw(raw)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)?;
        if self.is_generic() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}
