//! Resolves the components declared by a controller class.

use crate::component::{
    Body, ComponentParser, ComponentParserSpec, Cookies, FileMetadata, Headers, Path, Query,
};
use heron_core::{
    BaseRef, ClassDecl, ClassGraph, HeronError, HeronResult, TypeArg, TypeVarInference,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Root class of every component.
pub const COMPONENT_PARSER: &str = "ComponentParser";

/// Components known to the class graph, by class name.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: IndexMap<String, Arc<dyn ComponentParser>>,
}

impl ComponentRegistry {
    /// Registry without components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `Query`, `Body`, `Headers`, `Path`, `Cookies` and
    /// `FileMetadata`.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .register(Arc::new(Query))
            .register(Arc::new(Body))
            .register(Arc::new(Headers))
            .register(Arc::new(Path))
            .register(Arc::new(Cookies))
            .register(Arc::new(FileMetadata))
    }

    /// Adds `component` under its class name.
    #[must_use]
    pub fn register(mut self, component: Arc<dyn ComponentParser>) -> Self {
        self.components
            .insert(component.class_name().to_string(), component);
        self
    }

    /// Component registered as `class`.
    pub fn get(&self, class: &str) -> Option<&Arc<dyn ComponentParser>> {
        self.components.get(class)
    }

    /// Declares `ComponentParser` and one generic class per component,
    /// `Query[_QueryT]` and so on.
    ///
    /// # Errors
    ///
    /// Fails when a class with the same name is already declared.
    pub fn declare_classes(&self, graph: &mut ClassGraph) -> HeronResult<()> {
        if !graph.contains(COMPONENT_PARSER) {
            graph.declare(ClassDecl::new(COMPONENT_PARSER))?;
        }
        for class in self.components.keys() {
            graph.declare(
                ClassDecl::new(class.as_str())
                    .base(BaseRef::new(COMPONENT_PARSER))
                    .base(BaseRef::generic([format!("_{class}T")])),
            )?;
        }
        Ok(())
    }

    fn resolve(&self, class: &str, graph: &ClassGraph) -> HeronResult<Arc<dyn ComponentParser>> {
        graph
            .mro(class)?
            .iter()
            .find_map(|entry| self.components.get(entry))
            .cloned()
            .ok_or_else(|| {
                HeronError::endpoint_metadata(format!("Component {class} is not registered"))
            })
    }
}

/// Collects the component specs of a blueprint class.
///
/// Walks the MRO of the blueprint and picks every original base that is a
/// component, skipping bases that are subclasses of `ignore`. Free type
/// parameters are inferred in the context of the blueprint. Components
/// with the same context name are deduplicated, the first one wins.
#[derive(Debug)]
pub struct ComponentParserBuilder<'a> {
    blueprint: &'a str,
    ignore: &'a str,
    graph: &'a ClassGraph,
    registry: &'a ComponentRegistry,
}

impl<'a> ComponentParserBuilder<'a> {
    /// Prepares the walk over `blueprint`.
    #[must_use]
    pub fn new(
        blueprint: &'a str,
        ignore: &'a str,
        graph: &'a ClassGraph,
        registry: &'a ComponentRegistry,
    ) -> Self {
        Self {
            blueprint,
            ignore,
            graph,
            registry,
        }
    }

    /// Builds the component specs.
    ///
    /// # Errors
    ///
    /// [`HeronError::UnsolvableAnnotations`] when a component has no type
    /// arguments or a type parameter stays free.
    pub fn build(&self) -> HeronResult<Vec<ComponentParserSpec>> {
        let mut specs: Vec<ComponentParserSpec> = Vec::new();
        for class in self.graph.mro(self.blueprint)? {
            if self.is_component_definition(class) {
                continue;
            }
            for base in self.graph.original_bases(class) {
                if !self.is_component_usage(&base.class) {
                    continue;
                }
                let spec = self.build_spec(base)?;
                let context_name = spec.component.context_name();
                if specs
                    .iter()
                    .any(|known| known.component.context_name() == context_name)
                {
                    tracing::debug!(
                        blueprint = self.blueprint,
                        component = %base,
                        "Skipping shadowed component"
                    );
                    continue;
                }
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    // Component classes and their subclasses only declare generics.
    fn is_component_definition(&self, class: &str) -> bool {
        self.graph.is_subclass(class, COMPONENT_PARSER)
            && !self.graph.is_subclass(class, self.ignore)
    }

    fn is_component_usage(&self, class: &str) -> bool {
        class != COMPONENT_PARSER
            && self.graph.is_subclass(class, COMPONENT_PARSER)
            && !self.graph.is_subclass(class, self.ignore)
    }

    fn build_spec(&self, base: &BaseRef) -> HeronResult<ComponentParserSpec> {
        if base.args.is_empty() {
            return Err(HeronError::unsolvable_annotations(format!(
                "Component {} in {} must have at least 1 type argument, given 0",
                base.class, self.blueprint
            )));
        }
        let component = self.registry.resolve(&base.class, self.graph)?;
        let inferred = if base.is_concrete() {
            IndexMap::new()
        } else {
            TypeVarInference::new(base, self.blueprint, self.graph).infer()?
        };
        let type_args = base
            .args
            .iter()
            .map(|arg| match arg {
                TypeArg::Concrete(schema) => Ok(schema.clone()),
                TypeArg::Param(name) => inferred.get(name).cloned().ok_or_else(|| {
                    HeronError::unsolvable_annotations(format!(
                        "Cannot solve type annotations for ~{name} of {base} in {}",
                        self.blueprint
                    ))
                }),
            })
            .collect::<HeronResult<Vec<_>>>()?;
        Ok(ComponentParserSpec::new(component, type_args))
    }
}
