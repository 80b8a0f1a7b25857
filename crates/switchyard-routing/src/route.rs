//! Compiled routes.

use std::fmt;
use std::sync::Arc;

use switchyard_core::expression::ParsedLayer;
use switchyard_core::{DeliveryError, DeliveryResult, RoutableEvent, RouteRecord};

use crate::modifier::EventModifier;

/// A modifier instance together with the name it was built from.
#[derive(Clone)]
pub struct ConfiguredModifier {
    pub name: String,
    pub modifier: Arc<dyn EventModifier>,
}

/// A routing rule with its live modifier chain.
#[derive(Clone)]
pub struct MessageRoute {
    record: RouteRecord,
    modifiers: Vec<ConfiguredModifier>,
}

impl MessageRoute {
    /// Wraps a record whose modifiers have already been built, in the same
    /// order as `record.modifiers`.
    pub fn new(record: RouteRecord, modifiers: Vec<ConfiguredModifier>) -> Self {
        Self { record, modifiers }
    }

    /// A route without modifiers.
    pub fn simple(id: i64, source: impl Into<String>, destination: impl Into<String>, two_way: bool) -> Self {
        let mut record = RouteRecord::new(source, destination).two_way(two_way);
        record.id = id;
        Self::new(record, Vec::new())
    }

    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn source(&self) -> &str {
        &self.record.source
    }

    pub fn destination(&self) -> &str {
        &self.record.destination
    }

    pub fn two_way(&self) -> bool {
        self.record.two_way
    }

    pub fn record(&self) -> &RouteRecord {
        &self.record
    }

    pub fn modifiers(&self) -> &[ConfiguredModifier] {
        &self.modifiers
    }

    /// Runs the modifier chain. `None` means a modifier dropped the event.
    pub fn modify_event(&self, event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>> {
        let mut current = event.clone();
        for configured in &self.modifiers {
            match configured.modifier.modify(&current) {
                Ok(Some(next)) => current = next,
                Ok(None) => return Ok(None),
                Err(DeliveryError::Modifier { reason, .. }) => {
                    return Err(DeliveryError::modifier(&configured.name, reason));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some(current))
    }

    /// The modifier chain in expression form, e.g. `if-has-prefix(prefix="-")`.
    pub fn render_modifiers(&self) -> String {
        self.record
            .modifiers
            .iter()
            .map(|m| {
                ParsedLayer {
                    name: m.modifier.clone(),
                    arguments: m.key_values(),
                }
                .to_string()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for MessageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.two_way() { "<->" } else { "->" };
        write!(f, "{} {arrow} {}", self.source(), self.destination())?;
        if !self.modifiers.is_empty() {
            write!(f, " {}", self.render_modifiers())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRoute")
            .field("record", &self.record)
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::IfHasPrefix;
    use switchyard_core::{LayerArgument, RouteModifierRecord, Source, hop};

    struct Failing;

    impl EventModifier for Failing {
        fn modify(&self, _event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>> {
            Err(DeliveryError::modifier("?", "boom"))
        }
    }

    fn route_with(modifiers: Vec<ConfiguredModifier>) -> MessageRoute {
        let record = RouteRecord::new("aoorg", "web").with_modifier(RouteModifierRecord::new(
            "if-has-prefix",
            vec![LayerArgument::new("prefix", "-")],
        ));
        MessageRoute::new(record, modifiers)
    }

    #[test]
    fn chain_applies_in_order() {
        let route = route_with(vec![
            ConfiguredModifier {
                name: "if-has-prefix".into(),
                modifier: Arc::new(IfHasPrefix::new("-", true)),
            },
            ConfiguredModifier {
                name: "if-has-prefix".into(),
                modifier: Arc::new(IfHasPrefix::new("!", true)),
            },
        ]);
        let event = RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "- !hi");
        let out = route.modify_event(&event).unwrap().unwrap();
        assert_eq!(out.text(), Some("hi"));
    }

    #[test]
    fn errors_name_the_modifier() {
        let route = route_with(vec![ConfiguredModifier {
            name: "failing".into(),
            modifier: Arc::new(Failing),
        }]);
        let event = RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "x");
        let err = route.modify_event(&event).unwrap_err();
        assert_eq!(err.to_string(), "modifier 'failing' failed: boom");
    }

    #[test]
    fn display_shows_direction_and_modifiers() {
        let route = route_with(Vec::new());
        assert_eq!(route.to_string(), "aoorg -> web");
        assert_eq!(route.render_modifiers(), "if-has-prefix(prefix=\"-\")");
        assert_eq!(MessageRoute::simple(1, "a", "b", true).to_string(), "a <-> b");
    }
}
