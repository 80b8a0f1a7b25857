//! Persisted record types.
//!
//! These are the inert descriptions stored by `switchyard-storage` and turned
//! into live objects by the routing and relay controllers. Ids are `0` until
//! the record has been written.

use serde::{Deserialize, Serialize};

use crate::expression::render_value;

// =============================================================================
// Relays
// =============================================================================

/// One `key=value` argument of a relay layer or route modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerArgument {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub name: String,
    pub value: String,
}

impl LayerArgument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Renders the argument the way an operator would type it.
    ///
    /// Booleans and unsigned digit strings are written bare, everything else
    /// quoted. Secrets are replaced by `<hidden>`.
    pub fn render(&self, secret: bool) -> String {
        if secret {
            format!("{}=<hidden>", self.name)
        } else {
            format!("{}={}", self.name, render_value(&self.value))
        }
    }
}

/// One element of a relay stack as persisted: a component name plus its
/// ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayLayer {
    #[serde(default, skip_serializing)]
    pub id: i64,
    #[serde(rename = "layer")]
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<LayerArgument>,
}

impl RelayLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push(LayerArgument::new(name, value));
        self
    }

    /// Arguments as ordered `(key, value)` pairs.
    pub fn key_values(&self) -> Vec<(String, String)> {
        self.arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.value.clone()))
            .collect()
    }

    /// Renders `name(arg=value, ...)`, hiding arguments for which `is_secret`
    /// returns `true`.
    pub fn render(&self, is_secret: impl Fn(&str) -> bool) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|arg| arg.render(is_secret(&arg.name)))
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

/// The persisted description of a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub layers: Vec<RelayLayer>,
}

impl RelayConfig {
    pub fn new(name: impl Into<String>, layers: Vec<RelayLayer>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            layers,
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

/// A configured modifier attached to a persisted route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteModifierRecord {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub modifier: String,
    #[serde(default)]
    pub arguments: Vec<LayerArgument>,
}

impl RouteModifierRecord {
    pub fn new(modifier: impl Into<String>, arguments: Vec<LayerArgument>) -> Self {
        Self {
            id: 0,
            modifier: modifier.into(),
            arguments,
        }
    }

    pub fn key_values(&self) -> Vec<(String, String)> {
        self.arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.value.clone()))
            .collect()
    }
}

/// The persisted description of a message route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(default)]
    pub id: i64,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub two_way: bool,
    #[serde(default)]
    pub modifiers: Vec<RouteModifierRecord>,
}

impl RouteRecord {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id: 0,
            source: source.into(),
            destination: destination.into(),
            two_way: false,
            modifiers: Vec::new(),
        }
    }

    pub fn two_way(mut self, two_way: bool) -> Self {
        self.two_way = two_way;
        self
    }

    pub fn with_modifier(mut self, modifier: RouteModifierRecord) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

// =============================================================================
// Hop styles
// =============================================================================

/// How a hop matching `hop` is rendered in a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopFormat {
    #[serde(default)]
    pub id: i64,
    /// `type` or `type(name)` glob.
    pub hop: String,
    /// Literal label or a template containing one `%s`.
    pub format: String,
    /// `false` suppresses the hop entirely.
    #[serde(default = "default_render")]
    pub render: bool,
}

fn default_render() -> bool {
    true
}

impl HopFormat {
    pub fn new(hop: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            id: 0,
            hop: hop.into(),
            format: format.into(),
            render: true,
        }
    }

    pub fn hidden(hop: impl Into<String>) -> Self {
        Self {
            render: false,
            ..Self::new(hop, "")
        }
    }
}

/// Colors applied to a hop tag and to the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopColor {
    #[serde(default)]
    pub id: i64,
    /// `type` or `type(name)` glob.
    pub hop: String,
    /// Where the message is displayed; `None` matches everywhere.
    #[serde(rename = "where", default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub tag_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
}

impl HopColor {
    pub fn tag(hop: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: 0,
            hop: hop.into(),
            scope: None,
            tag_color: Some(color.into()),
            text_color: None,
        }
    }

    pub fn text(hop: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: 0,
            hop: hop.into(),
            scope: None,
            tag_color: None,
            text_color: Some(color.into()),
        }
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_rendering() {
        assert_eq!(LayerArgument::new("n", "12").render(false), "n=12");
        assert_eq!(LayerArgument::new("b", "true").render(false), "b=true");
        assert_eq!(
            LayerArgument::new("server", "ws://host/x").render(false),
            "server=\"ws://host/x\""
        );
        assert_eq!(LayerArgument::new("n", "-1").render(false), "n=\"-1\"");
        assert_eq!(
            LayerArgument::new("password", "hunter2").render(true),
            "password=<hidden>"
        );
    }

    #[test]
    fn layer_rendering_hides_only_secrets() {
        let layer = RelayLayer::new("aes-gcm-encryption")
            .with_argument("password", "s3cr3t")
            .with_argument("rounds", "3");
        assert_eq!(
            layer.render(|name| name == "password"),
            "aes-gcm-encryption(password=<hidden>, rounds=3)"
        );
    }
}
