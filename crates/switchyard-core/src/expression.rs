//! Layer expressions.
//!
//! Relay stacks and route modifier chains are written as whitespace separated
//! calls:
//!
//! ```text
//! websocket(server="wss://relay.example/ws") aes-gcm-encryption(password="x") nadynative()
//! ```
//!
//! A call is a name optionally followed by a parenthesized, comma separated
//! list of `key=value` pairs. Values are either double-quoted strings (with
//! backslash escapes) or bare tokens of letters, digits, `.`, `_`, `+` and `-`.
//! Parsing is purely syntactic; whether a name exists or an argument fits is
//! decided later by the registries.

use std::fmt;

use crate::error::ParseError;
use crate::model::{LayerArgument, RelayLayer, RouteModifierRecord};

/// One parsed call of a layer expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLayer {
    pub name: String,
    pub arguments: Vec<(String, String)>,
}

impl ParsedLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ParsedLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (key, value)) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={}", render_value(value))?;
        }
        f.write_str(")")
    }
}

impl From<ParsedLayer> for RelayLayer {
    fn from(layer: ParsedLayer) -> Self {
        Self {
            id: 0,
            name: layer.name,
            arguments: to_arguments(layer.arguments),
        }
    }
}

impl From<ParsedLayer> for RouteModifierRecord {
    fn from(layer: ParsedLayer) -> Self {
        Self::new(layer.name, to_arguments(layer.arguments))
    }
}

impl From<&RelayLayer> for ParsedLayer {
    fn from(layer: &RelayLayer) -> Self {
        Self {
            name: layer.name.clone(),
            arguments: layer.key_values(),
        }
    }
}

fn to_arguments(pairs: Vec<(String, String)>) -> Vec<LayerArgument> {
    pairs
        .into_iter()
        .map(|(k, v)| LayerArgument::new(k, v))
        .collect()
}

/// Renders a value so that parsing it yields the same string.
///
/// `true`, `false` and unsigned integers are written bare; everything else
/// is quoted.
pub fn render_value(value: &str) -> String {
    let bare = value == "true"
        || value == "false"
        || (!value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()));
    if bare {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders a whole chain back into expression form.
pub fn render(layers: &[ParsedLayer]) -> String {
    layers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a layer expression into its ordered calls.
pub fn parse(input: &str) -> Result<Vec<ParsedLayer>, ParseError> {
    let mut parser = Parser { input, pos: 0 };
    let mut layers = Vec::new();
    loop {
        parser.skip_whitespace();
        if parser.at_end() {
            break;
        }
        layers.push(parser.layer()?);
    }
    Ok(layers)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// The rest of the current whitespace-delimited word, for error messages.
    fn fragment_from(&self, start: usize) -> String {
        let rest = &self.input[start..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest[..end].to_string()
    }

    fn error(&self, message: &str, start: usize) -> ParseError {
        ParseError::new(message, start).with_fragment(self.fragment_from(start))
    }

    fn layer(&mut self) -> Result<ParsedLayer, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            self.bump();
        }
        let name = &self.input[start..self.pos];
        if name.is_empty() {
            return Err(match self.peek() {
                Some(')') => self.error("Unexpected closing parenthesis", start),
                _ => self.error("Layer name must not be empty", start),
            });
        }
        let mut layer = ParsedLayer::new(name);
        if self.peek() == Some('(') {
            self.bump();
            layer.arguments = self.arguments(start)?;
        }
        Ok(layer)
    }

    fn arguments(&mut self, layer_start: usize) -> Result<Vec<(String, String)>, ParseError> {
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(arguments);
        }
        loop {
            self.skip_whitespace();
            let key_start = self.pos;
            while self
                .peek()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
            {
                self.bump();
            }
            let key = self.input[key_start..self.pos].to_string();
            if key.is_empty() {
                return Err(match self.peek() {
                    None => self.error("Missing closing parenthesis", layer_start),
                    _ => self.error("Expected an argument name", key_start),
                });
            }
            self.skip_whitespace();
            if self.peek() != Some('=') {
                return Err(self.error("Argument is missing '='", key_start));
            }
            self.bump();
            self.skip_whitespace();
            let value = self.value(key_start)?;
            arguments.push((key, value));

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(arguments),
                None => return Err(self.error("Missing closing parenthesis", layer_start)),
                Some(_) => {
                    return Err(self.error("Expected ',' or ')' after argument", key_start));
                }
            }
        }
    }

    fn value(&mut self, arg_start: usize) -> Result<String, ParseError> {
        if self.peek() == Some('"') {
            self.bump();
            return self.quoted(arg_start);
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
        {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("Argument value is missing", arg_start));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn quoted(&mut self, arg_start: usize) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("Unterminated string", arg_start)),
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    None => return Err(self.error("Unterminated string", arg_start)),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(other) => value.push(other),
                },
                Some(c) => value.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_stack() {
        let layers = parse(
            r#"websocket(server="ws://host/x") aes-gcm-encryption(password="secret") nadynative()"#,
        )
        .unwrap();
        assert_eq!(
            layers,
            vec![
                ParsedLayer::new("websocket").arg("server", "ws://host/x"),
                ParsedLayer::new("aes-gcm-encryption").arg("password", "secret"),
                ParsedLayer::new("nadynative"),
            ]
        );
    }

    #[test]
    fn bare_names_and_values() {
        let layers = parse("tyrbot  if-has-prefix(prefix=-, trim=false)").unwrap();
        assert_eq!(layers[0], ParsedLayer::new("tyrbot"));
        assert_eq!(
            layers[1],
            ParsedLayer::new("if-has-prefix")
                .arg("prefix", "-")
                .arg("trim", "false")
        );
    }

    #[test]
    fn escapes_in_quoted_values() {
        let layers = parse(r#"x(a="say \"hi\"", b="back\\slash")"#).unwrap();
        assert_eq!(layers[0].arguments[0].1, "say \"hi\"");
        assert_eq!(layers[0].arguments[1].1, "back\\slash");
    }

    #[test]
    fn round_trip_preserves_order() {
        let text = r#"layerA(x="1",y=2) layerB()"#;
        let parsed = parse(text).unwrap();
        let rendered = render(&parsed);
        assert_eq!(rendered, "layerA(x=1, y=2) layerB()");
        assert_eq!(parse(&rendered).unwrap(), parsed);

        let tricky = vec![ParsedLayer::new("q").arg("v", "a \"b\" \\ c\n")];
        assert_eq!(parse(&render(&tricky)).unwrap(), tricky);
    }

    #[test]
    fn malformed_inputs() {
        let err = parse(r#"websocket(server="ws://host"#).unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.fragment.as_deref(), Some("server=\"ws://host"));

        let err = parse("websocket(server=1").unwrap_err();
        assert_eq!(err.message, "Missing closing parenthesis");

        let err = parse("websocket(server)").unwrap_err();
        assert_eq!(err.message, "Argument is missing '='");

        let err = parse("(a=1)").unwrap_err();
        assert_eq!(err.message, "Layer name must not be empty");
        assert_eq!(err.position, 0);

        let err = parse("a() )").unwrap_err();
        assert_eq!(err.message, "Unexpected closing parenthesis");

        let err = parse("a(b=)").unwrap_err();
        assert_eq!(err.message, "Argument value is missing");
    }

    #[test]
    fn empty_input_has_no_layers() {
        assert!(parse("   ").unwrap().is_empty());
    }
}
