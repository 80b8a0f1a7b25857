//! `if-has-prefix`: only pass messages starting with a prefix.

use std::sync::Arc;

use linkme::distributed_slice;
use switchyard_core::{
    ArgValue, ClassSpec, Component, DeliveryResult, ParamType, ParameterSpec, RoutableEvent,
};

use crate::modifier::{EVENT_MODIFIERS, EventModifier};

pub struct IfHasPrefix {
    prefix: String,
    trim: bool,
}

impl IfHasPrefix {
    pub fn new(prefix: impl Into<String>, trim: bool) -> Self {
        Self {
            prefix: prefix.into(),
            trim,
        }
    }
}

impl EventModifier for IfHasPrefix {
    fn modify(&self, event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>> {
        let Some(text) = event.text() else {
            return Ok(Some(event.clone()));
        };
        let Some(rest) = text.strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };
        let mut modified = event.clone();
        if self.trim {
            modified.set_text(rest.trim_start());
        }
        Ok(Some(modified))
    }
}

#[distributed_slice(EVENT_MODIFIERS)]
fn if_has_prefix() -> Component<dyn EventModifier> {
    Component::new(
        ClassSpec::new("if-has-prefix")
            .describe("Only route messages that start with a given prefix")
            .param(
                ParameterSpec::required("prefix", ParamType::String)
                    .describe("The prefix the message must start with"),
            )
            .param(
                ParameterSpec::optional("trim", ParamType::Bool)
                    .default_value(ArgValue::Bool(true))
                    .describe("Remove the prefix and following whitespace before routing"),
            ),
        |args, _| {
            let prefix = args.require_str("prefix")?;
            Ok(Arc::new(IfHasPrefix::new(prefix, args.bool_or("trim", true))) as Arc<dyn EventModifier>)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{Source, hop};

    fn message(text: &str) -> RoutableEvent {
        RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], text)
    }

    #[test]
    fn strips_prefix_when_trimming() {
        let modifier = IfHasPrefix::new("-", true);
        let out = modifier.modify(&message("-  hello")).unwrap().unwrap();
        assert_eq!(out.text(), Some("hello"));
    }

    #[test]
    fn keeps_text_without_trim() {
        let modifier = IfHasPrefix::new("-", false);
        let out = modifier.modify(&message("-hello")).unwrap().unwrap();
        assert_eq!(out.text(), Some("-hello"));
    }

    #[test]
    fn drops_other_messages() {
        let modifier = IfHasPrefix::new("-", true);
        assert!(modifier.modify(&message("hello")).unwrap().is_none());
    }
}
