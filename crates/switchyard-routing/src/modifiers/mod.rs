//! Built-in event modifiers.
//!
//! Each one registers itself in [`EVENT_MODIFIERS`](crate::modifier::EVENT_MODIFIERS).

mod matches;
mod prefix;
mod sender;

pub use matches::IfMatches;
pub use prefix::IfHasPrefix;
pub use sender::IfNotBy;
