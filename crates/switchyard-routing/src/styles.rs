//! Hop color lookup.

use switchyard_core::{HopColor, glob};

/// Which color of a [`HopColor`] entry is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorField {
    Tag,
    Text,
}

impl ColorField {
    fn get(self, color: &HopColor) -> Option<&str> {
        match self {
            Self::Tag => color.tag_color.as_deref(),
            Self::Text => color.text_color.as_deref(),
        }
    }
}

/// Hop colors ordered by precedence.
#[derive(Debug, Clone, Default)]
pub struct HopColors {
    colors: Vec<HopColor>,
}

impl HopColors {
    /// Orders longer hop patterns first, then longer scopes.
    pub fn new(mut colors: Vec<HopColor>) -> Self {
        colors.sort_by(|a, b| {
            let scope_len = |c: &HopColor| c.scope.as_deref().map_or(0, str::len);
            b.hop
                .len()
                .cmp(&a.hop.len())
                .then_with(|| scope_len(b).cmp(&scope_len(a)))
        });
        Self { colors }
    }

    /// Finds the entry coloring hop `kind(name)` when displayed in `scope`.
    ///
    /// Entries naming both type and name are tried first, then every entry
    /// against the bare type. Entries without the requested color are
    /// skipped.
    pub fn find(&self, scope: &str, kind: &str, name: &str, field: ColorField) -> Option<&HopColor> {
        let qualified = format!("{kind}({name})");
        let usable = |c: &&HopColor| field.get(c).is_some() && scope_matches(c, scope);

        self.colors
            .iter()
            .filter(|c| c.hop.contains('('))
            .filter(usable)
            .find(|c| glob::matches(&c.hop, &qualified))
            .or_else(|| {
                self.colors
                    .iter()
                    .filter(usable)
                    .find(|c| glob::matches(&c.hop, kind))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &HopColor> {
        self.colors.iter()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

fn scope_matches(color: &HopColor, scope: &str) -> bool {
    let pattern = color.scope.as_deref().unwrap_or("*");
    glob::matches(pattern, scope) || glob::matches(&format!("{pattern}(*)"), scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_outranks_bare_type() {
        let colors = HopColors::new(vec![
            HopColor::tag("system(*)", "AAAAAA"),
            HopColor::tag("system(tower-attack)", "F06AED"),
        ]);
        let found = colors
            .find("aoorg", "system", "tower-attack", ColorField::Tag)
            .unwrap();
        assert_eq!(found.tag_color.as_deref(), Some("F06AED"));

        let other = colors.find("aoorg", "system", "status", ColorField::Tag).unwrap();
        assert_eq!(other.tag_color.as_deref(), Some("AAAAAA"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let colors = HopColors::new(vec![HopColor::tag("SYSTEM(Tower-*)", "F06AED")]);
        assert!(colors.find("web", "system", "tower-attack", ColorField::Tag).is_some());
    }

    #[test]
    fn scope_must_match() {
        let colors = HopColors::new(vec![
            HopColor::tag("aoorg", "111111").scoped("aopriv"),
            HopColor::tag("aoorg", "222222"),
        ]);
        let in_priv = colors.find("aopriv(Nady)", "aoorg", "Troet", ColorField::Tag).unwrap();
        assert_eq!(in_priv.tag_color.as_deref(), Some("111111"));
        let on_web = colors.find("web", "aoorg", "Troet", ColorField::Tag).unwrap();
        assert_eq!(on_web.tag_color.as_deref(), Some("222222"));
    }

    #[test]
    fn entries_without_requested_color_are_skipped() {
        let colors = HopColors::new(vec![
            HopColor::text("aopub(OT OOC)", "00FF00"),
            HopColor::tag("aopub", "FFFFFF"),
        ]);
        let tag = colors.find("web", "aopub", "OT OOC", ColorField::Tag).unwrap();
        assert_eq!(tag.tag_color.as_deref(), Some("FFFFFF"));
        let text = colors.find("web", "aopub", "OT OOC", ColorField::Text).unwrap();
        assert_eq!(text.text_color.as_deref(), Some("00FF00"));
    }
}
