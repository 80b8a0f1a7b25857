//! # Switchyard Core
//!
//! Shared building blocks for the Switchyard message-routing fabric.
//!
//! ## Routing model
//!
//! - **Hops**: [`Source`] describes one point of a message's path and renders
//!   itself through [`HopFormats`].
//! - **Events**: [`RoutableEvent`] carries a payload, an optional
//!   [`Character`] and the hop path.
//! - **Patterns**: [`glob`] provides the case-insensitive matching used for
//!   every route, receiver and style lookup.
//!
//! ## Pluggable components
//!
//! - **Specs**: [`ClassSpec`] and [`ParameterSpec`] describe a component and
//!   its typed parameters.
//! - **Binding**: [`bind`] turns operator supplied `key=value` strings into
//!   [`BoundArgs`].
//! - **Registries**: [`Registry`] maps names to [`Component`] factories that
//!   receive the bound arguments and a [`ServiceMap`].
//! - **Expressions**: [`expression::parse`] reads stacks such as
//!   `websocket(server="ws://host") nadynative()`.
//!
//! ```text
//! "websocket(server=...)" ──parse──▶ ParsedLayer ──bind──▶ BoundArgs ──factory──▶ Arc<dyn Transport>
//! ```

pub mod binding;
pub mod error;
pub mod event;
pub mod expression;
pub mod glob;
pub mod model;
pub mod registry;
pub mod service;
pub mod source;
pub mod spec;

pub use binding::{ArgInput, BoundArgs, RawArgs, bind};
pub use error::{
    DeliveryError, DeliveryResult, MissingService, ParseError, ValidationError, ValidationResult,
};
pub use event::{Character, EventKind, RoutableEvent};
pub use expression::ParsedLayer;
pub use model::{
    HopColor, HopFormat, LayerArgument, RelayConfig, RelayLayer, RouteModifierRecord, RouteRecord,
};
pub use registry::{Component, Factory, FactoryError, Registry};
pub use service::{ServiceArc, ServiceMap};
pub use source::{DEFAULT_DIMENSION, HopFormats, Source, hop};
pub use spec::{ArgValue, ClassSpec, ParamType, ParameterSpec};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        ArgValue, BoundArgs, Character, ClassSpec, Component, DeliveryError, DeliveryResult,
        EventKind, ParamType, ParameterSpec, Registry, RoutableEvent, ServiceMap, Source,
        ValidationError, hop,
    };
}
