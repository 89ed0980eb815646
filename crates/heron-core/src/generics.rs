//! Generic declarations and type parameter inference.
//!
//! Endpoints are declared as a graph of named classes. A class lists its own
//! type parameters and its parameterized bases, for example:
//!
//! ```text
//! Query[T](Generic[T])
//! PagedQuery[S](Query[S])
//! UserController(PagedQuery[UserFilters], Body[UserCreate])
//! ```
//!
//! [`TypeVarInference`] then answers "what is `T` of `Query[T]` when used by
//! `UserController`?" by walking the original bases of the controller.

use crate::error::{HeronError, HeronResult};
use crate::schema::Schema;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;

/// Name of the marker class every generic class may list as a base.
pub const GENERIC: &str = "Generic";

const MAX_DEPTH: usize = 15;

/// An argument of a parameterized base.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeArg {
    /// A type parameter of the declaring class.
    Param(String),
    /// A concrete model.
    Concrete(Schema),
}

impl TypeArg {
    /// Type parameter argument.
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    /// Returns the parameter name, if this is a parameter.
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Self::Param(name) => Some(name),
            Self::Concrete(_) => None,
        }
    }
}

impl From<Schema> for TypeArg {
    fn from(schema: Schema) -> Self {
        Self::Concrete(schema)
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(name) => write!(f, "~{name}"),
            Self::Concrete(schema) => write!(f, "{schema}"),
        }
    }
}

/// A base class reference with its arguments, like `Query[UserFilters]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRef {
    /// Referenced class.
    pub class: String,
    /// Arguments, empty for a bare reference.
    pub args: Vec<TypeArg>,
}

impl BaseRef {
    /// Bare reference to `class`.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            args: Vec::new(),
        }
    }

    /// `Generic[params...]` reference.
    #[must_use]
    pub fn generic<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: GENERIC.to_string(),
            args: params.into_iter().map(TypeArg::param).collect(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<TypeArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a type parameter argument.
    #[must_use]
    pub fn param(self, name: impl Into<String>) -> Self {
        self.arg(TypeArg::param(name))
    }

    /// Type parameters still free in this reference, in order of appearance.
    pub fn free_params(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for arg in &self.args {
            if let TypeArg::Param(name) = arg {
                seen.insert(name.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Returns `true` when the reference has no free type parameters.
    pub fn is_concrete(&self) -> bool {
        self.args.iter().all(|arg| matches!(arg, TypeArg::Concrete(_)))
    }
}

impl fmt::Display for BaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "[{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// Declaration of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Class name, unique in a graph.
    pub name: String,
    /// Type parameters. Derived from the bases when left empty.
    pub params: Vec<String>,
    /// Original bases, in declaration order.
    pub bases: Vec<BaseRef>,
}

impl ClassDecl {
    /// New class without bases.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            bases: Vec::new(),
        }
    }

    /// Sets the type parameters explicitly.
    #[must_use]
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a base.
    #[must_use]
    pub fn base(mut self, base: BaseRef) -> Self {
        self.bases.push(base);
        self
    }
}

/// Immutable-after-startup graph of class declarations.
#[derive(Debug, Clone)]
pub struct ClassGraph {
    classes: IndexMap<String, ClassDecl>,
    mros: HashMap<String, Vec<String>>,
}

impl Default for ClassGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassGraph {
    /// Creates a graph with only the `Generic` marker declared.
    #[must_use]
    pub fn new() -> Self {
        let mut classes = IndexMap::new();
        classes.insert(GENERIC.to_string(), ClassDecl::new(GENERIC));
        let mut mros = HashMap::new();
        mros.insert(GENERIC.to_string(), vec![GENERIC.to_string()]);
        Self { classes, mros }
    }

    /// Declares a class.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names, unknown bases, wrong argument counts,
    /// undeclared type parameters and inconsistent hierarchies.
    pub fn declare(&mut self, decl: ClassDecl) -> HeronResult<&mut Self> {
        if self.classes.contains_key(&decl.name) {
            return Err(HeronError::endpoint_metadata(format!(
                "Class {} is already declared",
                decl.name
            )));
        }

        let mut decl = decl;
        for base in &decl.bases {
            let Some(base_decl) = self.classes.get(&base.class) else {
                return Err(HeronError::endpoint_metadata(format!(
                    "Base {} of {} is not declared",
                    base.class, decl.name
                )));
            };
            if base.class == GENERIC || base.args.is_empty() {
                continue;
            }
            let expected = base_decl.params.len();
            let actual = base.args.len();
            if actual != expected {
                let which = if actual > expected { "many" } else { "few" };
                return Err(HeronError::endpoint_metadata(format!(
                    "Too {which} arguments for {}; actual {actual}, expected {expected}",
                    base.class
                )));
            }
        }

        let free = declared_params(&decl.bases);
        if decl.params.is_empty() {
            decl.params = free;
        } else {
            let missing: Vec<String> = free
                .iter()
                .filter(|param| !decl.params.contains(param))
                .map(|param| format!("~{param}"))
                .collect();
            if !missing.is_empty() {
                let listed: Vec<String> = decl.params.iter().map(|p| format!("~{p}")).collect();
                return Err(HeronError::endpoint_metadata(format!(
                    "Some type variables ({}) are not listed in Generic[{}]",
                    missing.join(", "),
                    listed.join(", ")
                )));
            }
        }

        let mro = self.linearize(&decl)?;
        tracing::trace!(class = %decl.name, mro = ?mro, "Declared class");
        self.mros.insert(decl.name.clone(), mro);
        self.classes.insert(decl.name.clone(), decl);
        Ok(self)
    }

    /// Returns `true` if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Returns the declaration of `name`.
    pub fn get(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name)
    }

    /// Type parameters of `name`.
    pub fn params(&self, name: &str) -> &[String] {
        self.classes.get(name).map_or(&[], |decl| decl.params.as_slice())
    }

    /// Original (parameterized) bases of `name`.
    pub fn original_bases(&self, name: &str) -> &[BaseRef] {
        self.classes.get(name).map_or(&[], |decl| decl.bases.as_slice())
    }

    /// C3 linearisation of `name`, starting with `name` itself.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not declared.
    pub fn mro(&self, name: &str) -> HeronResult<&[String]> {
        self.mros
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| HeronError::endpoint_metadata(format!("Class {name} is not declared")))
    }

    /// Returns `true` when `class` is `base` or inherits from it.
    pub fn is_subclass(&self, class: &str, base: &str) -> bool {
        self.mros
            .get(class)
            .is_some_and(|mro| mro.iter().any(|entry| entry == base))
    }

    fn linearize(&self, decl: &ClassDecl) -> HeronResult<Vec<String>> {
        let mut sequences: Vec<Vec<String>> = Vec::new();
        for base in &decl.bases {
            let mro = self.mros.get(&base.class).cloned().unwrap_or_default();
            sequences.push(mro);
        }
        sequences.push(decl.bases.iter().map(|base| base.class.clone()).collect());

        let mut result = vec![decl.name.clone()];
        loop {
            sequences.retain(|seq| !seq.is_empty());
            if sequences.is_empty() {
                return Ok(result);
            }
            let candidate = sequences
                .iter()
                .map(|seq| &seq[0])
                .find(|head| !sequences.iter().any(|seq| seq[1..].contains(head)))
                .cloned();
            let Some(candidate) = candidate else {
                let bases: Vec<&str> = decl.bases.iter().map(|b| b.class.as_str()).collect();
                return Err(HeronError::endpoint_metadata(format!(
                    "Cannot create a consistent method resolution order (MRO) for bases {}",
                    bases.join(", ")
                )));
            };
            for seq in &mut sequences {
                if seq.first() == Some(&candidate) {
                    seq.remove(0);
                }
            }
            result.push(candidate);
        }
    }
}

/// Parameters a class gets from its bases: `Generic[...]` wins when given.
fn declared_params(bases: &[BaseRef]) -> Vec<String> {
    if let Some(generic) = bases.iter().find(|base| base.class == GENERIC) {
        return generic.free_params();
    }
    let mut seen = IndexSet::new();
    for base in bases {
        seen.extend(base.free_params());
    }
    seen.into_iter().collect()
}

/// Resolves the type parameters of a generic usage against a context class.
///
/// Original bases of the context are collected depth-first in declaration
/// order and applied in reverse, so that declarations closer to the context
/// override deeper ones. Parameters are matched by name.
#[derive(Debug)]
pub struct TypeVarInference<'a> {
    label: String,
    initial: Vec<String>,
    context: &'a str,
    graph: &'a ClassGraph,
}

impl<'a> TypeVarInference<'a> {
    /// Prepares inference of the free parameters of `to_infer`.
    #[must_use]
    pub fn new(to_infer: &BaseRef, context: &'a str, graph: &'a ClassGraph) -> Self {
        Self {
            label: to_infer.to_string(),
            initial: to_infer.free_params(),
            context,
            graph,
        }
    }

    /// Prepares inference of a single type parameter.
    #[must_use]
    pub fn for_param(name: &str, context: &'a str, graph: &'a ClassGraph) -> Self {
        Self {
            label: format!("~{name}"),
            initial: vec![name.to_string()],
            context,
            graph,
        }
    }

    /// Runs the inference.
    ///
    /// # Errors
    ///
    /// Returns [`HeronError::UnsolvableAnnotations`] when a parameter does
    /// not reach a concrete model.
    pub fn infer(&self) -> HeronResult<IndexMap<String, Schema>> {
        let mut type_map: HashMap<String, TypeArg> = self
            .initial
            .iter()
            .map(|name| (name.clone(), TypeArg::Param(name.clone())))
            .collect();

        let mut bases = Vec::new();
        self.collect_bases(self.context, &mut bases, 0);
        for base in bases.iter().rev() {
            self.apply(base, &mut type_map);
        }

        self.initial
            .iter()
            .map(|name| Ok((name.clone(), self.resolve(name, &type_map)?)))
            .collect()
    }

    fn collect_bases(&self, class: &str, out: &mut Vec<BaseRef>, depth: usize) {
        if depth > self.graph.classes.len() {
            return;
        }
        for base in self.graph.original_bases(class) {
            if base.class == GENERIC {
                continue;
            }
            out.push(base.clone());
            self.collect_bases(&base.class, out, depth + 1);
        }
    }

    fn apply(&self, base: &BaseRef, type_map: &mut HashMap<String, TypeArg>) {
        for (param, arg) in self.graph.params(&base.class).iter().zip(&base.args) {
            if type_map.contains_key(param) {
                type_map.insert(param.clone(), arg.clone());
                if let TypeArg::Param(name) = arg {
                    type_map.insert(name.clone(), arg.clone());
                }
            }
        }
    }

    fn resolve(&self, name: &str, type_map: &HashMap<String, TypeArg>) -> HeronResult<Schema> {
        let mut current = TypeArg::Param(name.to_string());
        for _ in 0..MAX_DEPTH {
            match current {
                TypeArg::Concrete(schema) => return Ok(schema),
                TypeArg::Param(param) => {
                    current = type_map
                        .get(&param)
                        .cloned()
                        .unwrap_or(TypeArg::Param(param));
                }
            }
        }
        if let TypeArg::Concrete(schema) = current {
            return Ok(schema);
        }
        Err(HeronError::unsolvable_annotations(format!(
            "Cannot solve type annotations for {current}. Is definition for {} generic? It must be concrete",
            self.label
        )))
    }
}

/// Returns `arg` when concrete, otherwise infers it in `context`.
///
/// # Errors
///
/// Fails like [`TypeVarInference::infer`].
pub fn infer_annotation(arg: &TypeArg, context: &str, graph: &ClassGraph) -> HeronResult<Schema> {
    match arg {
        TypeArg::Concrete(schema) => Ok(schema.clone()),
        TypeArg::Param(name) => {
            let mut inferred = TypeVarInference::for_param(name, context, graph).infer()?;
            inferred.shift_remove(name).ok_or_else(|| {
                HeronError::unsolvable_annotations(format!(
                    "Cannot solve type annotations for ~{name}"
                ))
            })
        }
    }
}
