//! Turns a selection snapshot into a command.

use std::fmt;

use chatops_types::{ParameterKind, ParameterSchema};
use chatops_util::quote_for_shell;

use crate::selection::SelectionSnapshot;

/// Target plus argument vector, in schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledCommand {
    pub target: String,
    pub args: Vec<String>,
}

impl AssembledCommand {
    /// The preview shown to the user and carried by the Run control.
    pub fn preview(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AssembledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)?;
        for arg in &self.args {
            write!(f, " {}", quote_for_shell(arg))?;
        }
        Ok(())
    }
}

/// Build the command for the selected target.
///
/// Parameters are visited in schema order regardless of the order they were
/// chosen in. A boolean contributes its bare flag only when `true`; other
/// kinds contribute the flag followed by the value. Parameters without a
/// value are skipped. Returns `None` until a target is chosen.
///
/// # Example
/// ```rust
/// use chatops_engine::{assemble::assemble, selection::SelectionState};
/// use chatops_types::{Parameter, ParameterKind, ParameterSchema};
///
/// let schema = ParameterSchema::new(vec![
///     Parameter::new("-n", ParameterKind::Text),
///     Parameter::new("-i", ParameterKind::Boolean),
/// ])
/// .unwrap();
/// let mut state = SelectionState::new();
/// state.set_target("backup-job");
/// state.set_parameter("backup-job--i", "-i false");
/// state.set_parameter("backup-job--n", "-n prod");
///
/// let command = assemble(&schema, &state.snapshot()).unwrap();
/// assert_eq!(command.preview(), "backup-job -n prod");
/// ```
pub fn assemble(schema: &ParameterSchema, snapshot: &SelectionSnapshot) -> Option<AssembledCommand> {
    let target = snapshot.target()?;
    let mut args = Vec::new();
    for parameter in schema.selectable() {
        let Some(raw) = snapshot.get(&parameter.selection_key(target)) else {
            continue;
        };
        let value = parameter.value_component(raw).trim();
        match parameter.kind {
            ParameterKind::Boolean => {
                if value == "true" {
                    args.push(parameter.flag.clone());
                }
            }
            ParameterKind::Enumerated | ParameterKind::Text => {
                if !value.is_empty() {
                    args.push(parameter.flag.clone());
                    args.push(value.to_string());
                }
            }
        }
    }
    Some(AssembledCommand {
        target: target.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionState;
    use chatops_types::Parameter;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("-n", ParameterKind::Text),
            Parameter::new("-e", ParameterKind::Enumerated).with_values(["dev", "prod"]),
            Parameter::new("-i", ParameterKind::Boolean),
        ])
        .unwrap()
    }

    fn state(values: &[(&str, &str)]) -> SelectionState {
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        for (key, value) in values {
            state.set_parameter(*key, *value);
        }
        state
    }

    #[test]
    fn follows_schema_order_not_selection_order() {
        let forward = state(&[("backup-job--n", "-n a"), ("backup-job--e", "-e prod"), ("backup-job--i", "-i true")]);
        let backward = state(&[("backup-job--i", "-i true"), ("backup-job--e", "-e prod"), ("backup-job--n", "-n a")]);

        let first = assemble(&schema(), &forward.snapshot()).unwrap();
        let second = assemble(&schema(), &backward.snapshot()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.args, vec!["-n", "a", "-e", "prod", "-i"]);
    }

    #[test]
    fn false_boolean_contributes_nothing() {
        let selected = state(&[("backup-job--i", "-i false")]);
        assert_eq!(assemble(&schema(), &selected.snapshot()).unwrap().args, Vec::<String>::new());
    }

    #[test]
    fn preview_quotes_free_text() {
        let selected = state(&[("backup-job--n", "-n prod eu; rm -rf /")]);
        let command = assemble(&schema(), &selected.snapshot()).unwrap();
        assert_eq!(command.args, vec!["-n", "prod eu; rm -rf /"]);
        assert_eq!(command.preview(), "backup-job -n 'prod eu; rm -rf /'");
    }

    #[test]
    fn values_without_embedded_flag_are_accepted() {
        let selected = state(&[("backup-job--n", "prod")]);
        assert_eq!(assemble(&schema(), &selected.snapshot()).unwrap().preview(), "backup-job -n prod");
    }

    #[test]
    fn no_target_no_command() {
        assert!(assemble(&schema(), &SelectionState::new().snapshot()).is_none());
    }
}
