//! `nadynative`: routable events as JSON.

use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use switchyard_core::{
    ArgValue, ClassSpec, Component, EventKind, ParamType, ParameterSpec, RoutableEvent,
};
use tracing::trace;

use crate::component::{BotIdentity, RELAY_PROTOCOLS, RelayProtocol};
use crate::error::{RelayError, RelayResult};

pub struct NadyNative {
    sync_online: bool,
    bot: Option<String>,
}

impl NadyNative {
    /// `bot` is the name of this bot; events attributed to it that come back
    /// over the relay are dropped.
    pub fn new(sync_online: bool, bot: Option<String>) -> Self {
        Self { sync_online, bot }
    }

    fn relays(&self, event: &RoutableEvent) -> bool {
        event.kind != EventKind::Online || self.sync_online
    }

    fn is_echo(&self, event: &RoutableEvent) -> bool {
        match (&self.bot, &event.character) {
            (Some(bot), Some(character)) => bot.eq_ignore_ascii_case(&character.name),
            _ => false,
        }
    }
}

#[async_trait]
impl RelayProtocol for NadyNative {
    fn encode(&self, event: &RoutableEvent) -> RelayResult<Option<Vec<u8>>> {
        if !self.relays(event) {
            return Ok(None);
        }
        serde_json::to_vec(event).map(Some).map_err(RelayError::codec)
    }

    fn decode(&self, frame: &[u8]) -> RelayResult<Option<RoutableEvent>> {
        let event: RoutableEvent = serde_json::from_slice(frame).map_err(RelayError::codec)?;
        if !self.relays(&event) {
            return Ok(None);
        }
        if self.is_echo(&event) {
            trace!(kind = %event.kind, "Dropping own event");
            return Ok(None);
        }
        Ok(Some(event))
    }
}

#[distributed_slice(RELAY_PROTOCOLS)]
fn nadynative() -> Component<dyn RelayProtocol> {
    Component::new(
        ClassSpec::new("nadynative")
            .describe("Exchange routed events with other bots as JSON")
            .param(
                ParameterSpec::optional("sync-online", ParamType::Bool)
                    .default_value(ArgValue::Bool(true))
                    .describe("Also relay who is online"),
            ),
        |args, services| {
            let bot = services.get::<BotIdentity>().map(|identity| identity.0.name.clone());
            Ok(Arc::new(NadyNative::new(args.bool_or("sync-online", true), bot))
                as Arc<dyn RelayProtocol>)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{Character, ServiceMap, Source, hop};

    fn message() -> RoutableEvent {
        RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "hello")
            .with_character(Character::new("Nady"))
    }

    fn online() -> RoutableEvent {
        RoutableEvent {
            kind: EventKind::Online,
            ..message()
        }
    }

    #[test]
    fn messages_survive_the_wire() {
        let protocol = NadyNative::new(true, Some("Mybot".into()));
        let frame = protocol.encode(&message()).unwrap().unwrap();
        assert_eq!(protocol.decode(&frame).unwrap(), Some(message()));
    }

    #[test]
    fn online_events_follow_sync_online() {
        let quiet = NadyNative::new(false, None);
        assert!(quiet.encode(&online()).unwrap().is_none());

        let frame = NadyNative::new(true, None).encode(&online()).unwrap().unwrap();
        assert!(quiet.decode(&frame).unwrap().is_none());
        assert!(quiet.encode(&message()).unwrap().is_some());
    }

    #[test]
    fn own_events_are_dropped() {
        let protocol = NadyNative::new(true, Some("NADY".into()));
        let frame = protocol.encode(&message()).unwrap().unwrap();
        assert!(protocol.decode(&frame).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let protocol = NadyNative::new(true, None);
        assert!(matches!(protocol.decode(b"{nope"), Err(RelayError::Codec(_))));
    }

    #[test]
    fn factory_reads_identity_from_services() {
        let services =
            ServiceMap::new().with(Arc::new(BotIdentity(Character::new("Nady"))));
        let protocol = nadynative()
            .build("protocol", vec![("sync-online".to_string(), "false".to_string())], &services)
            .unwrap();
        let frame = NadyNative::new(true, None).encode(&message()).unwrap().unwrap();
        assert!(protocol.decode(&frame).unwrap().is_none());
        assert!(protocol.encode(&online()).unwrap().is_none());
    }
}
