//! `if-matches`: only pass messages containing a text or matching a regex.

use std::sync::Arc;

use linkme::distributed_slice;
use regex::{Regex, RegexBuilder};
use switchyard_core::{
    ArgValue, ClassSpec, Component, DeliveryResult, ParamType, ParameterSpec, RoutableEvent,
};

use crate::modifier::{EVENT_MODIFIERS, EventModifier};

pub struct IfMatches {
    pattern: Regex,
    inverse: bool,
}

impl IfMatches {
    /// Builds the matcher. Plain text is escaped so it matches literally.
    pub fn new(
        text: &str,
        case_sensitive: bool,
        regexp: bool,
        inverse: bool,
    ) -> Result<Self, regex::Error> {
        let source = if regexp {
            text.to_string()
        } else {
            regex::escape(text)
        };
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self { pattern, inverse })
    }
}

impl EventModifier for IfMatches {
    fn modify(&self, event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>> {
        let Some(text) = event.text() else {
            return Ok(Some(event.clone()));
        };
        let keep = self.pattern.is_match(text) != self.inverse;
        Ok(keep.then(|| event.clone()))
    }
}

#[distributed_slice(EVENT_MODIFIERS)]
fn if_matches() -> Component<dyn EventModifier> {
    Component::new(
        ClassSpec::new("if-matches")
            .describe("Only route messages that contain a text or match a regular expression")
            .param(
                ParameterSpec::required("text", ParamType::String)
                    .describe("The text or regular expression to look for"),
            )
            .param(
                ParameterSpec::optional("case-sensitive", ParamType::Bool)
                    .default_value(ArgValue::Bool(false)),
            )
            .param(
                ParameterSpec::optional("regexp", ParamType::Bool)
                    .default_value(ArgValue::Bool(false))
                    .describe("Treat text as a regular expression"),
            )
            .param(
                ParameterSpec::optional("inverse", ParamType::Bool)
                    .default_value(ArgValue::Bool(false))
                    .describe("Route only messages that do not match"),
            ),
        |args, _| {
            let modifier = IfMatches::new(
                args.require_str("text")?,
                args.bool_or("case-sensitive", false),
                args.bool_or("regexp", false),
                args.bool_or("inverse", false),
            )?;
            Ok(Arc::new(modifier) as Arc<dyn EventModifier>)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{Source, hop};

    fn message(text: &str) -> RoutableEvent {
        RoutableEvent::message(vec![Source::new(hop::PRIV, "Nady")], text)
    }

    #[test]
    fn literal_text_is_case_insensitive_by_default() {
        let modifier = IfMatches::new("Tower", false, false, false).unwrap();
        assert!(modifier.modify(&message("the tower fell")).unwrap().is_some());
        assert!(modifier.modify(&message("nothing here")).unwrap().is_none());
    }

    #[test]
    fn literal_text_is_not_a_regex() {
        let modifier = IfMatches::new("a.c", true, false, false).unwrap();
        assert!(modifier.modify(&message("abc")).unwrap().is_none());
        assert!(modifier.modify(&message("a.c")).unwrap().is_some());
    }

    #[test]
    fn regexp_and_inverse() {
        let modifier = IfMatches::new(r"^\d+$", true, true, true).unwrap();
        assert!(modifier.modify(&message("123")).unwrap().is_none());
        assert!(modifier.modify(&message("abc")).unwrap().is_some());
    }

    #[test]
    fn invalid_regexp_fails_setup() {
        let err = if_matches()
            .build("modifier", [("text", "("), ("regexp", "true")], &Default::default())
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("There was an error setting up the if-matches modifier"));
    }
}
