//! Built-in relay protocols.

mod nadynative;

pub use nadynative::NadyNative;
