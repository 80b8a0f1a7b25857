//! Typed parameter binding.
//!
//! Operators configure components with plain `key=value` strings. [`bind`]
//! walks a [`ClassSpec`]'s parameters in declaration order, coerces each
//! supplied value to its declared type and reports anything missing, mistyped
//! or left over. The same algorithm serves relay components and event
//! modifiers.

use crate::error::{ValidationError, ValidationResult};
use crate::spec::{ArgValue, ClassSpec, ParamType};

// =============================================================================
// Raw input
// =============================================================================

/// One raw argument as supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgInput {
    Single(String),
    /// The key was given more than once.
    List(Vec<String>),
}

impl ArgInput {
    fn into_list(self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value],
            Self::List(values) => values,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::List(values) => values.join(", "),
        }
    }
}

/// Ordered raw arguments with repeated keys collapsed into lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArgs {
    entries: Vec<(String, ArgInput)>,
}

impl RawArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => {
                let mut values = std::mem::replace(slot, ArgInput::List(Vec::new())).into_list();
                values.push(value);
                *slot = ArgInput::List(values);
            }
            None => self.entries.push((key, ArgInput::Single(value))),
        }
    }

    fn take(&mut self, key: &str) -> Option<ArgInput> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (key, value) in iter {
            args.push(key, value);
        }
        args
    }
}

// =============================================================================
// Bound output
// =============================================================================

/// The positional result of [`bind`].
///
/// Each slot corresponds to one declared parameter. `None` means the
/// parameter was omitted and has no declared default, so the component
/// should apply its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundArgs {
    plugin: String,
    slots: Vec<(String, Option<ArgValue>)>,
}

impl BoundArgs {
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Values in declaration order.
    pub fn positional(&self) -> Vec<Option<&ArgValue>> {
        self.slots.iter().map(|(_, v)| v.as_ref()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.slots
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    /// A string parameter that must be present.
    pub fn require_str(&self, name: &str) -> ValidationResult<&str> {
        self.str(name).ok_or_else(|| ValidationError::MissingArgument {
            plugin: self.plugin.clone(),
            param: name.to_string(),
        })
    }

    pub fn bool_or(&self, name: &str, fallback: bool) -> bool {
        self.get(name).and_then(ArgValue::as_bool).unwrap_or(fallback)
    }

    pub fn int_or(&self, name: &str, fallback: i64) -> i64 {
        self.get(name).and_then(ArgValue::as_int).unwrap_or(fallback)
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name).map(ArgValue::to_list).unwrap_or_default()
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Binds raw string arguments against a component's declared parameters.
pub fn bind(spec: &ClassSpec, args: impl Into<RawArgs>) -> ValidationResult<BoundArgs> {
    let mut raw = args.into();
    let mut slots = Vec::with_capacity(spec.params.len());

    for param in &spec.params {
        let value = match raw.take(&param.name) {
            Some(input) => Some(coerce(spec, &param.name, param.kind, input)?),
            None if param.required => {
                return Err(ValidationError::MissingArgument {
                    plugin: spec.name.clone(),
                    param: param.name.clone(),
                });
            }
            None => param.default.clone(),
        };
        slots.push((param.name.clone(), value));
    }

    if !raw.is_empty() {
        return Err(ValidationError::UnknownArguments {
            plugin: spec.name.clone(),
            keys: raw.keys().map(str::to_string).collect(),
        });
    }

    Ok(BoundArgs {
        plugin: spec.name.clone(),
        slots,
    })
}

fn coerce(spec: &ClassSpec, param: &str, kind: ParamType, input: ArgInput) -> ValidationResult<ArgValue> {
    match kind {
        ParamType::Bool => match &input {
            ArgInput::Single(v) if v == "true" => Ok(ArgValue::Bool(true)),
            ArgInput::Single(v) if v == "false" => Ok(ArgValue::Bool(false)),
            _ => Err(ValidationError::InvalidBool {
                plugin: spec.name.clone(),
                param: param.to_string(),
                value: input.describe(),
            }),
        },
        ParamType::Int => match &input {
            ArgInput::Single(v) if is_signed_integer(v) => v
                .parse::<i64>()
                .map(ArgValue::Int)
                .map_err(|_| invalid_int(spec, param, &input)),
            _ => Err(invalid_int(spec, param, &input)),
        },
        ParamType::StringList => Ok(ArgValue::List(input.into_list())),
        ParamType::String | ParamType::Secret => match input {
            ArgInput::Single(v) => Ok(ArgValue::String(v)),
            // Repeated keys for a scalar parameter keep the last value.
            ArgInput::List(mut values) => Ok(ArgValue::String(values.pop().unwrap_or_default())),
        },
    }
}

fn invalid_int(spec: &ClassSpec, param: &str, input: &ArgInput) -> ValidationError {
    ValidationError::InvalidInt {
        plugin: spec.name.clone(),
        param: param.to_string(),
        value: input.describe(),
    }
}

fn is_signed_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl From<Vec<(String, String)>> for RawArgs {
    fn from(pairs: Vec<(String, String)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<&[(&str, &str)]> for RawArgs {
    fn from(pairs: &[(&str, &str)]) -> Self {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RawArgs {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}
