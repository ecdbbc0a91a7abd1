//! Parsing of the command text sent back by chat controls.
//!
//! Every control the flow renders carries a command prefix of the form
//! `<bot> <plugin> <action> [payload]`. The host appends the chosen option or
//! the typed text and sends the whole line back.

use chatops_util::{lex_shell_like_ranged, split_words};
use thiserror::Error;

pub const ACTION_SELECT_TARGET: &str = "select_target";
pub const ACTION_SELECT_PARAM: &str = "select_param";
pub const ACTION_RUN: &str = "run";

/// Older spellings still sent by controls rendered before an upgrade.
const LEGACY_SELECT_TARGET: &str = "select_first";
const LEGACY_SELECT_PARAM: &str = "select_dynamic";

/// What the user asked the flow to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Bare invocation: render the initial selector.
    Render,
    SelectTarget(String),
    /// `value` is the verbatim remainder after the key; it may still carry the flag.
    SelectParam { key: String, value: String },
    /// `expected` is the preview the Run button was rendered with.
    Run { expected: Option<String> },
    Unknown { action: String, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    pub plugin: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,
    #[error("Action '{action}' needs {expected}")]
    MissingPayload { action: String, expected: &'static str },
    #[error("Action '{action}' takes a single argument, got '{payload}'")]
    UnexpectedArguments { action: String, payload: String },
}

/// Parse `[@bot] <plugin> [<action> [payload]]`.
///
/// # Example
/// ```rust
/// use chatops_engine::command::{Action, parse_command};
///
/// let command = parse_command("job select_param backup-job--n prod eu").unwrap();
/// assert_eq!(command.plugin, "job");
/// assert_eq!(
///     command.action,
///     Action::SelectParam { key: "backup-job--n".into(), value: "prod eu".into() }
/// );
/// ```
pub fn parse_command(input: &str) -> Result<ChatCommand, CommandParseError> {
    let tokens = lex_shell_like_ranged(input);
    let skip = tokens.first().map_or(0, |token| usize::from(is_bot_mention(token.text)));
    let tokens = &tokens[skip..];

    let Some(plugin) = tokens.first() else {
        return Err(CommandParseError::Empty);
    };
    let plugin = plugin.text.to_string();
    let Some(action_token) = tokens.get(1) else {
        return Ok(ChatCommand {
            plugin,
            action: Action::Render,
        });
    };

    let payload = tokens
        .get(2)
        .map(|token| input[token.start..].trim_end())
        .unwrap_or_default();

    let action = match action_token.text {
        ACTION_SELECT_TARGET | LEGACY_SELECT_TARGET => {
            let mut words = split_words(payload);
            match words.len() {
                0 => {
                    return Err(CommandParseError::MissingPayload {
                        action: ACTION_SELECT_TARGET.into(),
                        expected: "a resource name",
                    });
                }
                1 => Action::SelectTarget(words.remove(0)),
                _ => {
                    return Err(CommandParseError::UnexpectedArguments {
                        action: ACTION_SELECT_TARGET.into(),
                        payload: payload.to_string(),
                    });
                }
            }
        }
        ACTION_SELECT_PARAM | LEGACY_SELECT_PARAM => {
            let missing = || CommandParseError::MissingPayload {
                action: ACTION_SELECT_PARAM.into(),
                expected: "a key and a value",
            };
            let key = tokens.get(2).ok_or_else(missing)?;
            let value = tokens.get(3).ok_or_else(missing)?;
            let value = single_word_or_verbatim(input[value.start..].trim_end());
            Action::SelectParam {
                key: split_words(key.text).concat(),
                value,
            }
        }
        ACTION_RUN => Action::Run {
            expected: (!payload.is_empty()).then(|| payload.to_string()),
        },
        other => Action::Unknown {
            action: other.to_string(),
            payload: payload.to_string(),
        },
    };

    Ok(ChatCommand { plugin, action })
}

/// Split `[@bot] <plugin> [rest]` into the plugin token and the verbatim rest.
///
/// Returns `None` for blank input.
pub fn split_plugin(input: &str) -> Option<(&str, &str)> {
    let tokens = lex_shell_like_ranged(input);
    let skip = tokens.first().map_or(0, |token| usize::from(is_bot_mention(token.text)));
    let plugin = tokens.get(skip)?;
    let rest = tokens
        .get(skip + 1)
        .map(|token| input[token.start..].trim_end())
        .unwrap_or_default();
    Some((plugin.text, rest))
}

/// Leading `@bot` mention or unrendered `{{BotName}}` placeholder.
fn is_bot_mention(token: &str) -> bool {
    token.starts_with('@') || (token.starts_with("{{") && token.ends_with("}}"))
}

/// Text wrapped in one pair of matching quotes is unquoted; anything else,
/// including stray apostrophes, is kept as typed.
fn single_word_or_verbatim(text: &str) -> String {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            && !inner.contains(quote)
        {
            return inner.to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_renders() {
        let command = parse_command("job").unwrap();
        assert_eq!(command.plugin, "job");
        assert_eq!(command.action, Action::Render);
    }

    #[test]
    fn split_plugin_keeps_rest_verbatim() {
        assert_eq!(
            split_plugin("@Botkube snippet echo 'a  b' | wc -c"),
            Some(("snippet", "echo 'a  b' | wc -c"))
        );
        assert_eq!(split_plugin("job"), Some(("job", "")));
        assert_eq!(split_plugin("   "), None);
    }

    #[test]
    fn skips_bot_mention_and_placeholder() {
        assert_eq!(parse_command("@Botkube job").unwrap().plugin, "job");
        assert_eq!(
            parse_command("{{BotName}} job select_target backup-job").unwrap().action,
            Action::SelectTarget("backup-job".into())
        );
    }

    #[test]
    fn dropdown_payload_keeps_embedded_flag() {
        let command = parse_command("job select_param backup-job--i -i true").unwrap();
        assert_eq!(
            command.action,
            Action::SelectParam {
                key: "backup-job--i".into(),
                value: "-i true".into()
            }
        );
    }

    #[test]
    fn quoted_text_payload_is_unquoted() {
        let command = parse_command("job select_param backup-job--n 'prod eu'").unwrap();
        assert_eq!(
            command.action,
            Action::SelectParam {
                key: "backup-job--n".into(),
                value: "prod eu".into()
            }
        );
    }

    #[test]
    fn apostrophes_in_free_text_are_kept() {
        for (input, expected) in [
            ("job select_param backup-job--n don't", "don't"),
            ("job select_param backup-job--n it's prod", "it's prod"),
            ("job select_param backup-job--n \"eu west\"", "eu west"),
            ("job select_param backup-job--n 'a'b'", "'a'b'"),
        ] {
            assert_eq!(
                parse_command(input).unwrap().action,
                Action::SelectParam {
                    key: "backup-job--n".into(),
                    value: expected.into()
                },
                "{input}"
            );
        }
    }

    #[test]
    fn legacy_action_names_are_accepted() {
        assert_eq!(
            parse_command("job select_first backup-job").unwrap().action,
            Action::SelectTarget("backup-job".into())
        );
        assert!(matches!(
            parse_command("job select_dynamic backup-job--n prod").unwrap().action,
            Action::SelectParam { .. }
        ));
    }

    #[test]
    fn run_carries_expected_preview() {
        assert_eq!(
            parse_command("job run backup-job -n prod").unwrap().action,
            Action::Run {
                expected: Some("backup-job -n prod".into())
            }
        );
        assert_eq!(parse_command("job run").unwrap().action, Action::Run { expected: None });
    }

    #[test]
    fn reports_missing_payloads() {
        assert_eq!(parse_command("   "), Err(CommandParseError::Empty));
        assert!(matches!(
            parse_command("job select_param backup-job--n"),
            Err(CommandParseError::MissingPayload { .. })
        ));
        assert!(matches!(
            parse_command("job select_target a b"),
            Err(CommandParseError::UnexpectedArguments { .. })
        ));
    }

    #[test]
    fn unknown_actions_keep_payload() {
        assert_eq!(
            parse_command("job explain backup-job now").unwrap().action,
            Action::Unknown {
                action: "explain".into(),
                payload: "backup-job now".into()
            }
        );
    }
}
