//! Name → component registries.
//!
//! A [`Registry`] holds [`Component`]s of one kind (transports, layers,
//! protocols or event modifiers). Built-in components are collected from
//! `linkme` distributed slices declared by the crates that define each trait;
//! hosts may register more at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::binding::{BoundArgs, RawArgs, bind};
use crate::error::{ValidationError, ValidationResult};
use crate::service::ServiceMap;
use crate::spec::ClassSpec;

/// Error type returned by component factories.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Builds a live instance from bound arguments and shared services.
pub type Factory<T> =
    Arc<dyn Fn(&BoundArgs, &ServiceMap) -> Result<Arc<T>, FactoryError> + Send + Sync>;

/// A registered component: its description and how to build it.
pub struct Component<T: ?Sized> {
    pub spec: ClassSpec,
    factory: Factory<T>,
}

impl<T: ?Sized> Component<T> {
    pub fn new<F>(spec: ClassSpec, factory: F) -> Self
    where
        F: Fn(&BoundArgs, &ServiceMap) -> Result<Arc<T>, FactoryError> + Send + Sync + 'static,
    {
        Self {
            spec,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Binds `args` against this component's spec and runs its factory.
    ///
    /// Factory failures are wrapped into [`ValidationError::Setup`] naming
    /// the component.
    pub fn build(
        &self,
        kind: &str,
        args: impl Into<RawArgs>,
        services: &ServiceMap,
    ) -> ValidationResult<Arc<T>> {
        let bound = bind(&self.spec, args)?;
        (self.factory)(&bound, services)
            .map_err(|e| ValidationError::setup(&self.spec.name, kind, e))
    }
}

impl<T: ?Sized> Clone for Component<T> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Components of one kind, keyed by lower-cased name.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    components: BTreeMap<String, Component<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            components: BTreeMap::new(),
        }
    }

    /// Collects every component contributed to a distributed slice.
    ///
    /// Duplicate names are logged and skipped; the first one wins.
    pub fn from_slice(kind: &'static str, slice: &[fn() -> Component<T>]) -> Self {
        let mut registry = Self::new(kind);
        for make in slice {
            let component = make();
            let name = component.name().to_string();
            match registry.register(component) {
                Ok(()) => debug!(kind, name = %name, "Registered built-in component"),
                Err(e) => warn!(kind, name = %name, error = %e, "Skipping duplicate component"),
            }
        }
        registry
    }

    /// The kind label used in messages (`transport`, `layer`, ...).
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Registers a component, rejecting duplicate names.
    pub fn register(&mut self, component: Component<T>) -> ValidationResult<()> {
        let key = component.name().to_lowercase();
        if self.components.contains_key(&key) {
            return Err(ValidationError::DuplicateComponent {
                kind: self.kind.to_string(),
                name: component.name().to_string(),
            });
        }
        self.components.insert(key, component);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Component<T>> {
        self.components.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks up `name` and builds it. Returns `None` if no such component.
    pub fn build(
        &self,
        name: &str,
        args: impl Into<RawArgs>,
        services: &ServiceMap,
    ) -> Option<ValidationResult<Arc<T>>> {
        self.get(name)
            .map(|component| component.build(self.kind, args, services))
    }

    /// Specs of all components, sorted by name.
    pub fn specs(&self) -> impl Iterator<Item = &ClassSpec> {
        self.components.values().map(|c| &c.spec)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ParamType, ParameterSpec};

    trait Shape: Send + Sync {
        fn area(&self) -> i64;
    }

    struct Square(i64);

    impl Shape for Square {
        fn area(&self) -> i64 {
            self.0 * self.0
        }
    }

    fn square() -> Component<dyn Shape> {
        Component::new(
            ClassSpec::new("Square").param(ParameterSpec::required("side", ParamType::Int)),
            |args, _| {
                let side = args.int_or("side", 0);
                if side < 0 {
                    return Err("side must not be negative".into());
                }
                Ok(Arc::new(Square(side)) as Arc<dyn Shape>)
            },
        )
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry: Registry<dyn Shape> = Registry::from_slice("shape", &[square]);
        let built = registry
            .build("SQUARE", [("side", "3")], &ServiceMap::new())
            .unwrap()
            .unwrap();
        assert_eq!(built.area(), 9);
        assert!(registry.build("circle", RawArgs::new(), &ServiceMap::new()).is_none());
    }

    #[test]
    fn duplicates_are_rejected_or_skipped() {
        let mut registry: Registry<dyn Shape> = Registry::from_slice("shape", &[square, square]);
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.register(square()),
            Err(ValidationError::DuplicateComponent { .. })
        ));
    }

    #[test]
    fn factory_failure_names_component() {
        let registry: Registry<dyn Shape> = Registry::from_slice("shape", &[square]);
        let err = registry
            .build("square", [("side", "-1")], &ServiceMap::new())
            .unwrap()
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "There was an error setting up the Square shape: side must not be negative"
        );
    }
}
