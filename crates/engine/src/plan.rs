//! Builds the interactive message for the current selection.
//!
//! The plan is a pure function of the schema, the selection snapshot and the
//! known targets. Layout:
//!
//! 1. a dropdown group with the target selector followed by one dropdown per
//!    boolean or enumerated parameter
//! 2. a section of text inputs, one per text parameter
//! 3. once every parameter has a value, the command preview and a Run button

use chatops_types::{
    Body, Button, ButtonStyle, DispatchedAction, LabelInput, OptionGroup, OptionItem, Parameter, ParameterKind,
    ParameterSchema, Section, Select, Selects,
};

use crate::{
    assemble::assemble,
    command::{ACTION_RUN, ACTION_SELECT_PARAM, ACTION_SELECT_TARGET},
    selection::{SelectionSnapshot, SelectionState},
};

pub const RUN_BUTTON_LABEL: &str = "Run command";
const SELECTS_ID: &str = "select-id-1";
const TEXT_PLACEHOLDER: &str = "Please write parameter value";

/// Rendering inputs that do not depend on the selection.
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    /// Prefix of every control command, e.g. `{{BotName}} job`.
    pub command_prefix: &'a str,
    /// Label of the target dropdown.
    pub target_label: &'a str,
    /// Known targets, in display order.
    pub targets: &'a [String],
}

impl PlanContext<'_> {
    fn command(&self, action: &str) -> String {
        format!("{} {}", self.command_prefix, action)
    }
}

/// Store each parameter's default unless a value is already present.
///
/// Returns how many defaults were written. Does nothing without a target.
pub fn populate_defaults(schema: &ParameterSchema, state: &mut SelectionState) -> usize {
    let Some(target) = state.target().map(str::to_owned) else {
        return 0;
    };
    let mut written = 0;
    for parameter in schema.selectable() {
        if let Some(default) = parameter.default.as_deref()
            && state.set_parameter_if_absent(parameter.selection_key(&target), parameter.format_value(default))
        {
            written += 1;
        }
    }
    written
}

/// Selector for the target alone, used before any target is chosen.
pub fn target_section(context: &PlanContext<'_>, selected: Option<&str>) -> Section {
    Section {
        selects: Some(Selects {
            id: SELECTS_ID.to_string(),
            items: vec![target_select(context, selected)],
        }),
        ..Default::default()
    }
}

/// All sections for `snapshot`. `schema` is the schema of the selected target.
pub fn build_plan(context: &PlanContext<'_>, schema: &ParameterSchema, snapshot: &SelectionSnapshot) -> Vec<Section> {
    let Some(target) = snapshot.target() else {
        return vec![target_section(context, None)];
    };

    let mut dropdowns = vec![target_select(context, Some(target))];
    let mut inputs = Vec::new();
    for parameter in schema.selectable() {
        let key = parameter.selection_key(target);
        let stored = snapshot.get(&key).map(|raw| parameter.value_component(raw));
        match parameter.kind {
            ParameterKind::Boolean | ParameterKind::Enumerated => {
                dropdowns.push(parameter_select(context, parameter, &key, stored));
            }
            ParameterKind::Text => inputs.push(LabelInput {
                command: format!("{} {} ", context.command(ACTION_SELECT_PARAM), key),
                text: label(parameter),
                placeholder: TEXT_PLACEHOLDER.to_string(),
                initial_value: stored.or(parameter.default.as_deref()).map(str::to_owned),
                dispatched_action: DispatchedAction::OnEnterPressed,
            }),
        }
    }

    let mut sections = vec![Section {
        selects: Some(Selects {
            id: SELECTS_ID.to_string(),
            items: dropdowns,
        }),
        ..Default::default()
    }];
    if !inputs.is_empty() {
        sections.push(Section {
            plaintext_inputs: inputs,
            ..Default::default()
        });
    }
    if snapshot.is_complete(schema)
        && let Some(command) = assemble(schema, snapshot)
    {
        let preview = command.preview();
        sections.push(Section {
            body: Body {
                code_block: Some(preview.clone()),
                ..Default::default()
            },
            buttons: vec![Button::for_command(
                RUN_BUTTON_LABEL,
                format!("{} {}", context.command(ACTION_RUN), preview),
                ButtonStyle::Primary,
            )],
            ..Default::default()
        });
    }
    sections
}

fn target_select(context: &PlanContext<'_>, selected: Option<&str>) -> Select {
    let options: Vec<OptionItem> = context
        .targets
        .iter()
        .map(|target| OptionItem::new(target, target))
        .collect();
    Select {
        name: context.target_label.to_string(),
        command: context.command(ACTION_SELECT_TARGET),
        option_groups: vec![OptionGroup {
            name: context.target_label.to_string(),
            options,
        }],
        initial_option: selected.map(|target| OptionItem::new(target, target)),
    }
}

fn parameter_select(context: &PlanContext<'_>, parameter: &Parameter, key: &str, stored: Option<&str>) -> Select {
    let options = parameter
        .choices()
        .into_iter()
        .map(|choice| OptionItem::new(choice.clone(), parameter.format_value(&choice)))
        .collect();
    let initial = stored
        .or(parameter.default.as_deref())
        .map(|value| OptionItem::new(value, parameter.format_value(value)));
    Select {
        name: label(parameter),
        command: format!("{} {}", context.command(ACTION_SELECT_PARAM), key),
        option_groups: vec![OptionGroup {
            name: label(parameter),
            options,
        }],
        initial_option: initial,
    }
}

fn label(parameter: &Parameter) -> String {
    if parameter.description.trim().is_empty() {
        parameter.flag.clone()
    } else {
        parameter.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::new("-n", ParameterKind::Text).with_description("Namespace"),
            Parameter::new("-i", ParameterKind::Boolean)
                .with_description("Incremental")
                .with_default("false"),
            Parameter::new("-e", ParameterKind::Enumerated).with_values(["dev", "prod"]),
        ])
        .unwrap()
    }

    fn targets() -> Vec<String> {
        vec!["backup-job".to_string(), "restore-job".to_string()]
    }

    fn context(targets: &[String]) -> PlanContext<'_> {
        PlanContext {
            command_prefix: "{{BotName}} job",
            target_label: "Job Name",
            targets,
        }
    }

    #[test]
    fn idle_plan_only_offers_targets() {
        let targets = targets();
        let sections = build_plan(&context(&targets), &schema(), &SelectionState::new().snapshot());
        assert_eq!(sections.len(), 1);
        let select = &sections[0].selects.as_ref().unwrap().items[0];
        assert_eq!(select.command, "{{BotName}} job select_target");
        assert_eq!(select.option_groups[0].options.len(), 2);
        assert!(select.initial_option.is_none());
    }

    #[test]
    fn renders_one_control_per_parameter() {
        let targets = targets();
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        populate_defaults(&schema(), &mut state);

        let sections = build_plan(&context(&targets), &schema(), &state.snapshot());
        let selects = &sections[0].selects.as_ref().unwrap().items;
        assert_eq!(selects.len(), 3);
        assert_eq!(selects[1].name, "Incremental");
        assert_eq!(selects[1].command, "{{BotName}} job select_param backup-job--i");
        assert_eq!(selects[1].initial_option, Some(OptionItem::new("false", "-i false")));
        assert_eq!(
            selects[2].option_groups[0].options,
            vec![OptionItem::new("dev", "-e dev"), OptionItem::new("prod", "-e prod")]
        );

        let inputs = &sections[1].plaintext_inputs;
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].command, "{{BotName}} job select_param backup-job--n ");
        assert_eq!(inputs[0].dispatched_action, DispatchedAction::OnEnterPressed);
        assert_eq!(sections.len(), 2, "run section must wait for completion");
    }

    #[test]
    fn complete_selection_adds_run_section() {
        let targets = targets();
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        populate_defaults(&schema(), &mut state);
        state.set_parameter("backup-job--n", "-n prod");
        state.set_parameter("backup-job--e", "-e dev");

        let sections = build_plan(&context(&targets), &schema(), &state.snapshot());
        let run = sections.last().unwrap();
        assert_eq!(run.body.code_block.as_deref(), Some("backup-job -n prod -e dev"));
        assert_eq!(run.buttons[0].command, "{{BotName}} job run backup-job -n prod -e dev");
        assert_eq!(run.buttons[0].style, ButtonStyle::Primary);
    }

    #[test]
    fn defaults_never_override_user_values() {
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        state.set_parameter("backup-job--i", "-i true");
        assert_eq!(populate_defaults(&schema(), &mut state), 0);
        assert_eq!(state.get("backup-job--i"), Some("-i true"));
    }

    #[test]
    fn plan_is_deterministic() {
        let targets = targets();
        let mut state = SelectionState::new();
        state.set_target("backup-job");
        populate_defaults(&schema(), &mut state);
        let snapshot = state.snapshot();
        assert_eq!(
            build_plan(&context(&targets), &schema(), &snapshot),
            build_plan(&context(&targets), &schema(), &snapshot)
        );
    }
}
