//! Platform-neutral description of an outbound chat message.
//!
//! Plugins build these values; the host renders them into the concrete UI of
//! the chat platform (blocks, attachments, cards).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub base_body: Body,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    /// Render as an ephemeral message for the invoking user only.
    #[serde(default)]
    pub only_visible_for_you: bool,
    /// Replace the message that carried the triggering control.
    #[serde(default)]
    pub replace_original: bool,
}

impl Message {
    /// Single code block message.
    pub fn code_block(text: impl Into<String>, only_visible_for_you: bool) -> Self {
        Self {
            base_body: Body {
                code_block: Some(text.into()),
                ..Default::default()
            },
            only_visible_for_you,
            ..Default::default()
        }
    }

    /// Single plaintext message.
    pub fn plaintext(text: impl Into<String>, only_visible_for_you: bool) -> Self {
        Self {
            base_body: Body {
                plaintext: Some(text.into()),
                ..Default::default()
            },
            only_visible_for_you,
            ..Default::default()
        }
    }

    /// Every button across all sections, in render order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.sections.iter().flat_map(|section| section.buttons.iter())
    }

    /// Every dropdown across all sections, in render order.
    pub fn selects(&self) -> impl Iterator<Item = &Select> {
        self.sections
            .iter()
            .filter_map(|section| section.selects.as_ref())
            .flat_map(|selects| selects.items.iter())
    }

    /// Every text input across all sections, in render order.
    pub fn inputs(&self) -> impl Iterator<Item = &LabelInput> {
        self.sections.iter().flat_map(|section| section.plaintext_inputs.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub body: Body,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selects: Option<Selects>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plaintext_inputs: Vec<LabelInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

/// A group of dropdowns rendered side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selects {
    pub id: String,
    pub items: Vec<Select>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Select {
    pub name: String,
    /// Command prefix the host sends back with the chosen option value appended.
    pub command: String,
    pub option_groups: Vec<OptionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_option: Option<OptionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub name: String,
    pub options: Vec<OptionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub name: String,
    pub value: String,
}

impl OptionItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// When the host submits the contents of a text input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchedAction {
    /// Submit once the user confirms the value.
    #[default]
    OnEnterPressed,
    /// Submit after every keystroke.
    OnCharacterEntered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelInput {
    /// Command prefix the host sends back with the typed text appended.
    pub command: String,
    pub text: String,
    pub placeholder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
    #[serde(default)]
    pub dispatched_action: DispatchedAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    #[default]
    Default,
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub style: ButtonStyle,
}

impl Button {
    /// Button that sends `command` without showing it as a description.
    pub fn for_command(name: impl Into<String>, command: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: None,
            style,
        }
    }

    /// Button that also shows its command underneath the label.
    pub fn for_command_with_description(name: impl Into<String>, command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: name.into(),
            description: Some(command.clone()),
            command,
            style: ButtonStyle::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let message = Message::code_block("hello", true);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["baseBody"]["codeBlock"], "hello");
        assert_eq!(json["onlyVisibleForYou"], true);
        assert!(json.get("sections").is_none());
    }

    #[test]
    fn dispatched_action_defaults_to_submit() {
        let yaml = "command: x\ntext: t\nplaceholder: p\n";
        let input: LabelInput = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(input.dispatched_action, DispatchedAction::OnEnterPressed);
    }
}
