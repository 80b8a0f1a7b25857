//! Hop descriptors and hop-label rendering.
//!
//! A [`Source`] identifies one point in a message's travel path. The ordered
//! list of sources attached to an event is its *hop path*; the first hop is
//! the origin and determines which routes match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::glob;
use crate::model::HopFormat;

/// Well-known hop types.
pub mod hop {
    pub const RELAY: &str = "relay";
    pub const ORG: &str = "aoorg";
    pub const PUB: &str = "aopub";
    pub const PRIV: &str = "aopriv";
    pub const TELL: &str = "aotell";
    pub const WEB: &str = "web";
    pub const DISCORD_PRIV: &str = "discordpriv";
    pub const DISCORD_MSG: &str = "discordmsg";
    pub const TRADEBOT: &str = "tradebot";
    pub const IRC: &str = "irc";
    pub const SYSTEM: &str = "system";
    pub const CONSOLE: &str = "console";

    /// Hop types that originate inside the game and support user links.
    pub const IN_GAME: [&str; 4] = [ORG, PRIV, PUB, TELL];
}

/// Dimension assumed for sources created without an explicit server id.
pub const DEFAULT_DIMENSION: u32 = 5;

/// Label used for a private-channel hop that directly follows an org hop.
const GUEST_LABEL: &str = "Guest";

/// One hop of a message's path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_dimension")]
    pub server: u32,
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

impl Source {
    /// Creates a hop on the default dimension.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            label: None,
            server: DEFAULT_DIMENSION,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_server(mut self, server: u32) -> Self {
        self.server = server;
        self
    }

    /// The lower-cased `type(name)` key used for route matching.
    pub fn key(&self) -> String {
        format!("{}({})", self.kind, self.name).to_lowercase()
    }

    /// The name shown for this hop, before any format is applied.
    pub fn display_name(&self, last_hop: Option<&Source>) -> &str {
        let guest = self.kind == hop::PRIV && last_hop.is_some_and(|last| last.kind == hop::ORG);
        match (&self.label, guest) {
            (Some(label), _) => label,
            (None, true) => GUEST_LABEL,
            (None, false) => &self.name,
        }
    }

    /// Returns the label to display for this hop, or `None` if the matching
    /// format suppresses it.
    pub fn render(&self, last_hop: Option<&Source>, formats: &HopFormats) -> Option<String> {
        let name = self.display_name(last_hop);
        let Some(format) = formats.find(self) else {
            return Some(name.to_string());
        };
        if !format.render {
            return None;
        }
        if format.format.contains("%s") {
            Some(format.format.replacen("%s", name, 1))
        } else {
            Some(format.format.clone())
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}

// =============================================================================
// Hop formats
// =============================================================================

/// The set of hop formats, kept ordered by precedence.
#[derive(Debug, Clone, Default)]
pub struct HopFormats {
    formats: Vec<HopFormat>,
}

impl HopFormats {
    /// Builds the collection, ordering longer hop patterns first.
    pub fn new(mut formats: Vec<HopFormat>) -> Self {
        formats.sort_by(|a, b| b.hop.len().cmp(&a.hop.len()));
        Self { formats }
    }

    /// Finds the format for a hop.
    ///
    /// Patterns naming both type and name are tried first, then bare-type
    /// patterns; within a tier the longest pattern wins.
    pub fn find(&self, source: &Source) -> Option<&HopFormat> {
        let qualified = format!("{}({})", source.kind, source.name);
        self.formats
            .iter()
            .find(|f| f.hop.contains('(') && glob::matches(&f.hop, &qualified))
            .or_else(|| {
                self.formats
                    .iter()
                    .find(|f| !f.hop.contains('(') && glob::matches(&f.hop, &source.kind))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &HopFormat> {
        self.formats.iter()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_lowercase_type_and_name() {
        assert_eq!(Source::new("aopriv", "MyPriv").key(), "aopriv(mypriv)");
    }

    #[test]
    fn guest_label_after_org_hop() {
        let org = Source::new(hop::ORG, "Troet");
        let private = Source::new(hop::PRIV, "Nadybot");
        assert_eq!(private.display_name(Some(&org)), "Guest");
        assert_eq!(private.display_name(None), "Nadybot");

        let labelled = private.clone().with_label("Guests");
        assert_eq!(labelled.display_name(Some(&org)), "Guests");
    }

    #[test]
    fn render_without_format_uses_raw_name() {
        let formats = HopFormats::default();
        let source = Source::new(hop::WEB, "Web").with_label("Webchat");
        assert_eq!(source.render(None, &formats).as_deref(), Some("Webchat"));
    }

    #[test]
    fn exact_format_outranks_bare_type() {
        let formats = HopFormats::new(vec![
            HopFormat::new("system", "SYS %s"),
            HopFormat::new("system(tower-*)", "TOWER"),
        ]);
        let tower = Source::new(hop::SYSTEM, "tower-attack");
        let other = Source::new(hop::SYSTEM, "status");
        assert_eq!(tower.render(None, &formats).as_deref(), Some("TOWER"));
        assert_eq!(other.render(None, &formats).as_deref(), Some("SYS status"));
    }

    #[test]
    fn format_can_suppress_hop() {
        let formats = HopFormats::new(vec![HopFormat::hidden("AOTELL")]);
        let tell = Source::new(hop::TELL, "Nady");
        assert_eq!(tell.render(None, &formats), None);
    }

    #[test]
    fn longer_patterns_sort_first() {
        let formats = HopFormats::new(vec![
            HopFormat::new("relay(*)", "R"),
            HopFormat::new("relay(nady*)", "N"),
        ]);
        let hop = Source::new(hop::RELAY, "nadyrelay");
        assert_eq!(hop.render(None, &formats).as_deref(), Some("N"));
    }
}
