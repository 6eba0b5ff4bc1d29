//! Recovery of concrete type arguments from a declared type hierarchy.
//!
//! A [`Hierarchy`] holds class and interface declarations: each declares its
//! own type parameters and the type arguments it hands to its superclass and
//! to the interfaces it implements. Given a concrete class, a generic
//! supertype and a parameter index, [`Hierarchy::resolve_class`] walks up the
//! lattice depth-first with an explicit stack of [`TypeNode`]s, then walks
//! back down that stack substituting type variables until the argument is
//! concrete.
use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::types::{RawType, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot resolve type parameter {parameter} of {target}: {class} leaves it unbound")]
    Unbound {
        parameter: String,
        target: RawType,
        class: RawType,
    },
    #[error("{class} does not extend or implement {target}")]
    NotASubtype { class: RawType, target: RawType },
    #[error("{target} has no type parameter at index {index} as seen from {class}")]
    IndexOutOfRange {
        class: RawType,
        target: RawType,
        index: usize,
    },
    #[error("{0} is not declared in the type hierarchy")]
    Undeclared(RawType),
    #[error("{class} refers to undeclared type variable {variable}")]
    UnknownVariable { class: RawType, variable: String },
    #[error("{class} passes {found} type arguments to {supertype}, which has {expected}")]
    Arity {
        class: RawType,
        supertype: RawType,
        expected: usize,
        found: usize,
    },
}

type Result<T> = std::result::Result<T, ResolveError>;

/// A type argument as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    /// A type variable of the declaring class.
    Var(String),
    /// A concrete type.
    Type(TypeDescriptor),
    /// A generic type whose arguments may themselves contain variables,
    /// like `List<T>`.
    Generic(RawType, Vec<TypeArg>),
}

impl TypeArg {
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    fn first_var(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Type(_) => None,
            Self::Generic(_, args) => args.iter().find_map(|arg| arg.first_var()),
        }
    }

    fn vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Var(name) => out.push(name),
            Self::Type(_) => (),
            Self::Generic(_, args) => {
                for arg in args {
                    arg.vars(out);
                }
            }
        }
    }

    /// Replace each variable named in `params` by the argument at the same
    /// position in `args`. Fails with the name of the first variable that has
    /// no argument.
    fn substitute(
        &self,
        params: &[String],
        args: &[TypeArg],
    ) -> std::result::Result<TypeArg, String> {
        match self {
            Self::Var(name) => params
                .iter()
                .position(|p| p == name)
                .and_then(|i| args.get(i))
                .cloned()
                .ok_or_else(|| name.clone()),
            Self::Type(_) => Ok(self.clone()),
            Self::Generic(raw, inner) => Ok(Self::Generic(
                raw.clone(),
                inner
                    .iter()
                    .map(|a| a.substitute(params, args))
                    .collect::<std::result::Result<_, _>>()?,
            )),
        }
    }

    fn into_descriptor(self) -> Option<TypeDescriptor> {
        match self {
            Self::Var(_) => None,
            Self::Type(descriptor) => Some(descriptor),
            Self::Generic(raw, args) => {
                let args = args
                    .into_iter()
                    .map(TypeArg::into_descriptor)
                    .collect::<Option<Vec<_>>>()?;
                Some(TypeDescriptor::generic(raw, args))
            }
        }
    }
}

impl From<TypeDescriptor> for TypeArg {
    fn from(descriptor: TypeDescriptor) -> Self {
        Self::Type(descriptor)
    }
}

/// A reference to a supertype together with the arguments passed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    raw: RawType,
    args: Vec<TypeArg>,
}

impl TypeRef {
    pub fn new(raw: RawType, args: Vec<TypeArg>) -> Self {
        Self { raw, args }
    }
    pub fn raw(&self) -> &RawType {
        &self.raw
    }
    pub fn args(&self) -> &[TypeArg] {
        &self.args
    }
}

/// Declaration of a class or interface.
///
/// # Example
/// ```
/// use jbcontent::types::{ClassDecl, Hierarchy, RawType, TypeArg, TypeDescriptor, TypeRef};
///
/// let codec = RawType::named("Codec");
/// let mut hierarchy = Hierarchy::new();
/// hierarchy
///     .declare(ClassDecl::new(codec.clone()).with_params(&["T"]))
///     .unwrap();
/// hierarchy
///     .declare(ClassDecl::new(RawType::named("FooCodec")).implements(TypeRef::new(
///         codec.clone(),
///         vec![TypeDescriptor::named("Foo").into()],
///     )))
///     .unwrap();
///
/// let resolved = hierarchy
///     .resolve_class(&RawType::named("FooCodec"), &codec, 0)
///     .unwrap();
/// assert_eq!(resolved, TypeDescriptor::named("Foo"));
/// ```
#[derive(Debug, Clone)]
pub struct ClassDecl {
    raw: RawType,
    params: Vec<String>,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
}

impl ClassDecl {
    pub fn new(raw: RawType) -> Self {
        Self {
            raw,
            params: vec![],
            superclass: None,
            interfaces: vec![],
        }
    }
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }
    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }
    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }
    pub fn raw(&self) -> &RawType {
        &self.raw
    }
    pub fn params(&self) -> &[String] {
        &self.params
    }
    fn supertypes(&self) -> impl Iterator<Item = &TypeRef> {
        self.interfaces.iter().chain(self.superclass.iter())
    }
}

/// Implemented by values whose concrete class is declared in a [`Hierarchy`].
pub trait Declared {
    fn declared_type(&self) -> RawType;
}

/// One class on the walk from the concrete class up to the target.
struct TypeNode<'a> {
    decl: &'a ClassDecl,
    /// How the node below on the stack refers to this class.
    via: Option<&'a TypeRef>,
    /// Next entry among the interfaces, then the superclass.
    cursor: usize,
}

impl<'a> TypeNode<'a> {
    fn new(decl: &'a ClassDecl, via: Option<&'a TypeRef>) -> Self {
        Self {
            decl,
            via,
            cursor: 0,
        }
    }

    fn next_supertype(&mut self) -> Option<&'a TypeRef> {
        let decl: &'a ClassDecl = self.decl;
        let next = decl.supertypes().nth(self.cursor);
        self.cursor += 1;
        next
    }
}

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    classes: HashMap<RawType, ClassDecl>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a declaration. Every type variable used in the
    /// arguments handed to supertypes must be one of the class' own
    /// parameters, and a declared supertype gets either no arguments (a raw
    /// reference) or one per parameter.
    pub fn declare(&mut self, decl: ClassDecl) -> Result<()> {
        for supertype in decl.supertypes() {
            if let Some(declared) = self.classes.get(&supertype.raw) {
                let expected = declared.params.len();
                let found = supertype.args.len();
                if found != 0 && found != expected {
                    return Err(ResolveError::Arity {
                        class: decl.raw.clone(),
                        supertype: supertype.raw.clone(),
                        expected,
                        found,
                    });
                }
            }
            let mut vars = vec![];
            for arg in &supertype.args {
                arg.vars(&mut vars);
            }
            if let Some(unknown) = vars.into_iter().find(|v| !decl.params.iter().any(|p| p == v)) {
                return Err(ResolveError::UnknownVariable {
                    class: decl.raw.clone(),
                    variable: unknown.to_string(),
                });
            }
        }
        debug!("declared type {}", &decl.raw);
        self.classes.insert(decl.raw.clone(), decl);
        Ok(())
    }

    pub fn get(&self, raw: &RawType) -> Option<&ClassDecl> {
        self.classes.get(raw)
    }

    /// True if `from` is `to`, or (transitively) extends or implements it.
    /// Undeclared types are only assignable to themselves.
    pub fn is_assignable(&self, to: &RawType, from: &RawType) -> bool {
        if to == from {
            return true;
        }
        let mut seen: HashSet<&RawType> = HashSet::new();
        let mut pending: Vec<&RawType> = vec![from];
        while let Some(raw) = pending.pop() {
            if !seen.insert(raw) {
                continue;
            }
            if let Some(decl) = self.classes.get(raw) {
                for supertype in decl.supertypes() {
                    if &supertype.raw == to {
                        return true;
                    }
                    pending.push(&supertype.raw);
                }
            }
        }
        false
    }

    /// Resolve the type bound to parameter `index` of `target` by the
    /// concrete class of `instance`.
    pub fn resolve(
        &self,
        instance: &dyn Declared,
        target: &RawType,
        index: usize,
    ) -> Result<TypeDescriptor> {
        self.resolve_class(&instance.declared_type(), target, index)
    }

    /// Resolve the type bound to parameter `index` of `target` by `class`.
    pub fn resolve_class(
        &self,
        class: &RawType,
        target: &RawType,
        index: usize,
    ) -> Result<TypeDescriptor> {
        let start = self
            .classes
            .get(class)
            .ok_or_else(|| ResolveError::Undeclared(class.clone()))?;
        if class == target {
            return match start.params.get(index) {
                Some(parameter) => Err(ResolveError::Unbound {
                    parameter: parameter.clone(),
                    target: target.clone(),
                    class: class.clone(),
                }),
                None => Err(ResolveError::IndexOutOfRange {
                    class: class.clone(),
                    target: target.clone(),
                    index,
                }),
            };
        }

        let mut on_path: HashSet<&RawType> = HashSet::new();
        on_path.insert(&start.raw);
        let mut stack = vec![TypeNode::new(start, None)];
        while let Some(node) = stack.last_mut() {
            let supertype = match node.next_supertype() {
                Some(supertype) => supertype,
                None => {
                    if let Some(done) = stack.pop() {
                        on_path.remove(&done.decl.raw);
                    }
                    continue;
                }
            };
            if &supertype.raw == target {
                trace!(
                    "found {} at depth {} resolving {}",
                    target,
                    stack.len(),
                    class
                );
                if supertype.args.is_empty() {
                    let parameter = self
                        .classes
                        .get(target)
                        .and_then(|decl| decl.params.get(index));
                    if let Some(parameter) = parameter {
                        return Err(ResolveError::Unbound {
                            parameter: parameter.clone(),
                            target: target.clone(),
                            class: class.clone(),
                        });
                    }
                }
                return Self::substitute(&stack, supertype, class, target, index);
            }
            if on_path.contains(&supertype.raw) {
                continue;
            }
            if let Some(decl) = self.classes.get(&supertype.raw) {
                on_path.insert(&decl.raw);
                stack.push(TypeNode::new(decl, Some(supertype)));
            }
        }
        Err(ResolveError::NotASubtype {
            class: class.clone(),
            target: target.clone(),
        })
    }

    // Walk back down from the class that references the target, rewriting
    // the tracked argument in terms of each lower class' parameters.
    fn substitute(
        stack: &[TypeNode<'_>],
        found: &TypeRef,
        class: &RawType,
        target: &RawType,
        index: usize,
    ) -> Result<TypeDescriptor> {
        let mut term = found
            .args
            .get(index)
            .cloned()
            .ok_or_else(|| ResolveError::IndexOutOfRange {
                class: class.clone(),
                target: target.clone(),
                index,
            })?;
        for node in stack.iter().rev() {
            let var = match term.first_var() {
                Some(var) => var.to_string(),
                None => break,
            };
            let substituted = match node.via {
                Some(via) => term.substitute(&node.decl.params, &via.args),
                None => Err(var),
            };
            term = substituted.map_err(|parameter| ResolveError::Unbound {
                parameter,
                target: target.clone(),
                class: class.clone(),
            })?;
        }
        let parameter = term.first_var().map(str::to_string);
        term.into_descriptor().ok_or_else(|| ResolveError::Unbound {
            parameter: parameter.unwrap_or_default(),
            target: target.clone(),
            class: class.clone(),
        })
    }
}
