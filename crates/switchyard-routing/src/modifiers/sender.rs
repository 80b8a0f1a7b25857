//! `if-not-by`: drop events sent by certain characters.

use std::sync::Arc;

use linkme::distributed_slice;
use switchyard_core::{
    ArgValue, ClassSpec, Component, DeliveryResult, ParamType, ParameterSpec, RoutableEvent,
};

use crate::modifier::{EVENT_MODIFIERS, EventModifier};

pub struct IfNotBy {
    senders: Vec<String>,
    inverse: bool,
}

impl IfNotBy {
    pub fn new(senders: Vec<String>, inverse: bool) -> Self {
        Self { senders, inverse }
    }

    fn is_listed(&self, name: &str) -> bool {
        self.senders.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

impl EventModifier for IfNotBy {
    fn modify(&self, event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>> {
        let listed = event
            .character
            .as_ref()
            .is_some_and(|c| self.is_listed(&c.name));
        Ok((listed == self.inverse).then(|| event.clone()))
    }
}

#[distributed_slice(EVENT_MODIFIERS)]
fn if_not_by() -> Component<dyn EventModifier> {
    Component::new(
        ClassSpec::new("if-not-by")
            .describe("Drop events sent by any of the given characters")
            .param(
                ParameterSpec::required("sender", ParamType::StringList)
                    .describe("Character name; repeat to list several"),
            )
            .param(
                ParameterSpec::optional("inverse", ParamType::Bool)
                    .default_value(ArgValue::Bool(false))
                    .describe("Only route events from the given characters"),
            ),
        |args, _| {
            Ok(Arc::new(IfNotBy::new(args.list("sender"), args.bool_or("inverse", false)))
                as Arc<dyn EventModifier>)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{Character, Source, hop};

    fn from(name: &str) -> RoutableEvent {
        RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "hi")
            .with_character(Character::new(name))
    }

    #[test]
    fn drops_listed_senders() {
        let modifier = IfNotBy::new(vec!["Nady".into(), "Tyrence".into()], false);
        assert!(modifier.modify(&from("nady")).unwrap().is_none());
        assert!(modifier.modify(&from("Someone")).unwrap().is_some());
    }

    #[test]
    fn inverse_keeps_only_listed() {
        let modifier = IfNotBy::new(vec!["Nady".into()], true);
        assert!(modifier.modify(&from("Nady")).unwrap().is_some());
        assert!(modifier.modify(&from("Someone")).unwrap().is_none());

        let anonymous = RoutableEvent::message(vec![Source::new(hop::SYSTEM, "status")], "x");
        assert!(modifier.modify(&anonymous).unwrap().is_none());
    }
}
