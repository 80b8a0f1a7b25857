//! Shared services injected into components after construction.
//!
//! Hosts insert `Arc<dyn Trait>` (or `Arc<Concrete>`) values keyed by the
//! type parameter; factories look them up by the same type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::MissingService;

/// Type-erased shared service handle.
///
/// The inner `dyn Any` is actually an `Arc<T>`; consumers downcast it back.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// Map of services available to component factories.
#[derive(Clone, Default)]
pub struct ServiceMap {
    services: HashMap<TypeId, ServiceArc>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a service, replacing any previous one of the same type.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), Arc::new(service));
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.insert(service);
        self
    }

    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|arc| arc.downcast_ref::<Arc<T>>().map(Arc::clone))
    }

    pub fn require<T: ?Sized + 'static>(&self) -> Result<Arc<T>, MissingService> {
        self.get::<T>()
            .ok_or(MissingService(std::any::type_name::<T>()))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMap")
            .field("services", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn trait_objects_round_trip() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let services = ServiceMap::new().with(greeter);

        let found = services.require::<dyn Greeter>().unwrap();
        assert_eq!(found.greet(), "hello");
    }

    #[test]
    fn missing_service_names_the_type() {
        let services = ServiceMap::new();
        let err = services.require::<String>().unwrap_err();
        assert!(err.to_string().contains("String"));
    }
}
