use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod message;
pub mod plugin;

pub use message::{
    Body, Button, ButtonStyle, DispatchedAction, LabelInput, Message, OptionGroup, OptionItem, Section, Select, Selects,
};
pub use plugin::{Dependency, ExecuteContext, ExecuteInput, ExecuteOutput, MetadataOutput, SessionIdentity};

/// Flags that only print usage and never reach the UI or the assembled command.
pub const HELP_FLAGS: &[&str] = &["-h", "--help"];

/// The fixed choice set offered for boolean parameters.
pub const BOOLEAN_CHOICES: &[&str] = &["true", "false"];

/// Value type of a parameter as declared by the resource that owns it.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Switch rendered as a `true`/`false` dropdown; contributes the bare flag when true.
    Boolean,
    /// One of a declared, ordered value set.
    Enumerated,
    /// Free text typed by the user.
    Text,
}

impl FromStr for ParameterKind {
    type Err = ParseParameterKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "dropdown" | "enum" | "enumerated" => Ok(Self::Enumerated),
            "text" | "string" => Ok(Self::Text),
            _ => Err(ParseParameterKindError(s.to_string())),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Boolean => "boolean",
            Self::Enumerated => "enumerated",
            Self::Text => "text",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParameterKindError(pub String);

impl fmt::Display for ParseParameterKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter type '{}'; expected bool, dropdown or text", self.0)
    }
}

impl Error for ParseParameterKindError {}

/// One selectable or settable argument of a target resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Primary command-line switch (e.g. `-i`, `--namespace`). Identity within a schema.
    pub flag: String,
    /// Additional spellings of the same switch, kept for display only.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Human-readable label shown next to the control.
    #[serde(default)]
    pub description: String,
    pub kind: ParameterKind,
    /// Ordered value set for enumerated parameters; ignored for other kinds.
    #[serde(default)]
    pub allowed_values: Vec<String>,
    /// Value pre-selected until the user overrides it.
    #[serde(default)]
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(flag: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            flag: flag.into(),
            aliases: Vec::new(),
            description: String::new(),
            kind,
            allowed_values: Vec::new(),
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether this parameter is the usage/help switch.
    pub fn is_help(&self) -> bool {
        HELP_FLAGS.contains(&self.flag.as_str())
    }

    /// The options a dropdown offers for this parameter. Empty for text parameters.
    pub fn choices(&self) -> Vec<String> {
        match self.kind {
            ParameterKind::Boolean => BOOLEAN_CHOICES.iter().map(|choice| choice.to_string()).collect(),
            ParameterKind::Enumerated => self.allowed_values.clone(),
            ParameterKind::Text => Vec::new(),
        }
    }

    /// Raw stored form of a chosen value: the flag followed by the value.
    pub fn format_value(&self, value: &str) -> String {
        format!("{} {}", self.flag, value)
    }

    /// Strips the embedded flag from a raw stored value, returning the bare value.
    pub fn value_component<'a>(&self, raw: &'a str) -> &'a str {
        raw.strip_prefix(self.flag.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
            .unwrap_or(raw)
    }

    /// Composite selection key: `<target>-<flag>`.
    pub fn selection_key(&self, target: &str) -> String {
        format!("{}-{}", target, self.flag)
    }

    /// Whether `value` is acceptable for this parameter.
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            ParameterKind::Boolean => BOOLEAN_CHOICES.contains(&value),
            ParameterKind::Enumerated => self.allowed_values.iter().any(|allowed| allowed == value),
            ParameterKind::Text => !value.trim().is_empty(),
        }
    }
}

/// Ordered parameters belonging to one target resource.
///
/// The declaration order is the canonical order for rendering and for the
/// assembled argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    parameters: Vec<Parameter>,
}

impl ParameterSchema {
    /// Build a schema, enforcing unique flags and non-empty value sets for enumerated parameters.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, SchemaError> {
        for (index, parameter) in parameters.iter().enumerate() {
            if parameter.flag.trim().is_empty() {
                return Err(SchemaError::EmptyFlag { index });
            }
            if parameters[..index].iter().any(|earlier| earlier.flag == parameter.flag) {
                return Err(SchemaError::DuplicateFlag {
                    flag: parameter.flag.clone(),
                });
            }
            if parameter.kind == ParameterKind::Enumerated && parameter.allowed_values.is_empty() {
                return Err(SchemaError::MissingValues {
                    flag: parameter.flag.clone(),
                });
            }
        }
        Ok(Self { parameters })
    }

    /// All parameters in declaration order, help flags included.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameters the user can act on, in declaration order.
    pub fn selectable(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|parameter| !parameter.is_help())
    }

    /// Drop help switches so they never reach the UI layer.
    pub fn without_help(mut self) -> Self {
        self.parameters.retain(|parameter| !parameter.is_help());
        self
    }

    pub fn find(&self, flag: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.flag == flag)
    }

    /// Resolve a composite selection key (`<target>-<flag>`) back to its parameter.
    pub fn find_by_selection_key(&self, target: &str, key: &str) -> Option<&Parameter> {
        self.selectable().find(|parameter| parameter.selection_key(target) == key)
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }
}

/// Reasons a parameter list cannot form a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyFlag { index: usize },
    DuplicateFlag { flag: String },
    MissingValues { flag: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFlag { index } => write!(f, "parameter #{index} declares no flag"),
            Self::DuplicateFlag { flag } => write!(f, "flag '{flag}' is declared more than once"),
            Self::MissingValues { flag } => write!(f, "enumerated flag '{flag}' declares no values"),
        }
    }
}

impl Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_aliases() {
        assert_eq!("bool".parse::<ParameterKind>(), Ok(ParameterKind::Boolean));
        assert_eq!("dropdown".parse::<ParameterKind>(), Ok(ParameterKind::Enumerated));
        assert_eq!("Text".parse::<ParameterKind>(), Ok(ParameterKind::Text));
        assert!("number".parse::<ParameterKind>().is_err());
    }

    #[test]
    fn rejects_duplicate_flags() {
        let err = ParameterSchema::new(vec![
            Parameter::new("-i", ParameterKind::Boolean),
            Parameter::new("-i", ParameterKind::Text),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateFlag { flag: "-i".into() });
    }

    #[test]
    fn rejects_enumerated_without_values() {
        let err = ParameterSchema::new(vec![Parameter::new("-e", ParameterKind::Enumerated)]).unwrap_err();
        assert_eq!(err, SchemaError::MissingValues { flag: "-e".into() });
    }

    #[test]
    fn boolean_choices_are_fixed() {
        let parameter = Parameter::new("-i", ParameterKind::Boolean).with_values(["yes"]);
        assert_eq!(parameter.choices(), vec!["true", "false"]);
        assert!(parameter.accepts("false"));
        assert!(!parameter.accepts("yes"));
    }

    #[test]
    fn value_component_strips_embedded_flag() {
        let parameter = Parameter::new("-n", ParameterKind::Text);
        assert_eq!(parameter.value_component("-n prod"), "prod");
        assert_eq!(parameter.value_component("prod"), "prod");
        assert_eq!(parameter.selection_key("backup-job"), "backup-job--n");
    }

    #[test]
    fn selection_key_lookup_skips_help() {
        let schema = ParameterSchema::new(vec![
            Parameter::new("-h", ParameterKind::Boolean),
            Parameter::new("-n", ParameterKind::Text),
        ])
        .unwrap();
        assert!(schema.find_by_selection_key("job", "job--h").is_none());
        assert_eq!(schema.find_by_selection_key("job", "job--n").map(|p| p.flag.as_str()), Some("-n"));
        assert_eq!(schema.clone().without_help().len(), 1);
    }
}
