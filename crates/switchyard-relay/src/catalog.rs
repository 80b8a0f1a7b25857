//! Text rendering of relay components and stored relays.

use std::fmt;

use serde::Serialize;
use switchyard_core::{ClassSpec, RelayLayer};

use crate::component::{ComponentKind, RelayComponents};
use crate::relay::RelayStatus;

const NO_DESCRIPTION: &str = "No description";

/// Lists components of one kind with their descriptions.
pub fn render_overview(kind: ComponentKind, specs: &[&ClassSpec]) -> String {
    if specs.is_empty() {
        return format!("No {kind}s available.");
    }
    let mut out = format!("Available {kind}s ({})", specs.len());
    for spec in specs {
        out.push_str("\n\n");
        out.push_str(&spec.name);
        for line in description_lines(&spec.description) {
            out.push_str("\n  ");
            out.push_str(line);
        }
    }
    out
}

/// Describes one component and each of its parameters.
pub fn render_details(spec: &ClassSpec) -> String {
    let mut out = format!("{}\n", spec.name);
    for line in description_lines(&spec.description) {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    if spec.params.is_empty() {
        return out;
    }
    out.push_str("\nParameters:");
    for param in &spec.params {
        out.push_str(&format!("\n  {} {}", param.kind, param.name));
        if !param.required {
            match &param.default {
                Some(default) => out.push_str(&format!(" (optional, default={default})")),
                None => out.push_str(" (optional)"),
            }
        }
        let description = if param.description.is_empty() {
            NO_DESCRIPTION
        } else {
            &param.description
        };
        for line in description.lines() {
            out.push_str("\n    ");
            out.push_str(line);
        }
    }
    out
}

fn description_lines(description: &str) -> impl Iterator<Item = &str> {
    let description = description.trim();
    let description = if description.is_empty() {
        NO_DESCRIPTION
    } else {
        description
    };
    description.lines()
}

/// Renders one stored layer with its secrets hidden, or `None` if no such
/// component is registered.
pub(crate) fn render_layer(
    components: &RelayComponents,
    kind: ComponentKind,
    layer: &RelayLayer,
    private: bool,
) -> Option<String> {
    let spec = components.spec(kind, &layer.name)?;
    Some(layer.render(|arg| !private && spec.is_secret(arg)))
}

/// Kind of the layer at `index` in a stack of `len` layers.
pub(crate) fn kind_at(index: usize, len: usize) -> ComponentKind {
    if index == 0 {
        ComponentKind::Transport
    } else if index + 1 == len {
        ComponentKind::Protocol
    } else {
        ComponentKind::Layer
    }
}

/// Summary of a stored relay and its live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayOverview {
    pub id: i64,
    pub name: String,
    pub transport: String,
    pub layers: Vec<String>,
    pub protocol: String,
    /// `None` if the relay is not running.
    pub status: Option<RelayStatus>,
}

impl fmt::Display for RelayOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (#{})", self.name, self.id)?;
        writeln!(f, "  Transport: {}", self.transport)?;
        for layer in &self.layers {
            writeln!(f, "  Layer: {layer}")?;
        }
        writeln!(f, "  Protocol: {}", self.protocol)?;
        match self.status {
            Some(status) => write!(f, "  Status: {status}"),
            None => write!(f, "  Status: error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ArgValue, ParamType, ParameterSpec};

    fn websocket() -> ClassSpec {
        ClassSpec::new("websocket")
            .describe("Connect to a websocket server")
            .param(ParameterSpec::required("server", ParamType::String).describe("The URI"))
            .param(ParameterSpec::optional("authorization", ParamType::Secret))
            .param(
                ParameterSpec::optional("reconnect", ParamType::Bool)
                    .default_value(ArgValue::Bool(true)),
            )
    }

    #[test]
    fn details_show_types_and_defaults() {
        let details = render_details(&websocket());
        assert_eq!(
            details,
            "websocket\n  Connect to a websocket server\n\nParameters:\
             \n  string server\n    The URI\
             \n  string authorization (optional)\n    No description\
             \n  bool reconnect (optional, default=true)\n    No description"
        );
    }

    #[test]
    fn overview_lists_every_spec() {
        let spec = websocket();
        let bare = ClassSpec::new("nadynative");
        let text = render_overview(ComponentKind::Transport, &[&spec, &bare]);
        assert_eq!(
            text,
            "Available transports (2)\n\nwebsocket\n  Connect to a websocket server\n\nnadynative\n  No description"
        );
        assert_eq!(render_overview(ComponentKind::Layer, &[]), "No layers available.");
    }

    #[test]
    fn overview_serializes_for_hosts() {
        let overview = RelayOverview {
            id: 3,
            name: "nady".into(),
            transport: "websocket(server=\"wss://ws.nadybot.org\")".into(),
            layers: Vec::new(),
            protocol: "nadynative()".into(),
            status: Some(RelayStatus::Connected),
        };
        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["status"], "connected");
        assert_eq!(json["protocol"], "nadynative()");

        let stopped = RelayOverview {
            status: None,
            ..overview
        };
        assert!(serde_json::to_value(&stopped).unwrap()["status"].is_null());
    }

    #[test]
    fn stack_positions() {
        assert_eq!(kind_at(0, 3), ComponentKind::Transport);
        assert_eq!(kind_at(1, 3), ComponentKind::Layer);
        assert_eq!(kind_at(2, 3), ComponentKind::Protocol);
        assert_eq!(kind_at(1, 2), ComponentKind::Protocol);
    }
}
