//! Plain-text rendering of plugin messages for the terminal.

use std::fmt::Write;

use chatops_types::{Body, Message, MetadataOutput, Section};

pub fn render_message(message: &Message) -> String {
    let mut out = String::new();
    render_body(&mut out, &message.base_body);
    for section in &message.sections {
        render_section(&mut out, section);
    }
    if message.only_visible_for_you {
        out.push_str("(only visible to you)\n");
    }
    out
}

fn render_body(out: &mut String, body: &Body) {
    if let Some(text) = &body.plaintext {
        let _ = writeln!(out, "{text}");
    }
    if let Some(code) = &body.code_block {
        let _ = writeln!(out, "```\n{}\n```", code.trim_end_matches('\n'));
    }
}

fn render_section(out: &mut String, section: &Section) {
    if let Some(header) = &section.header {
        let _ = writeln!(out, "## {header}");
    }
    if let Some(description) = &section.description {
        let _ = writeln!(out, "{description}");
    }
    render_body(out, &section.body);

    for select in section.selects.iter().flat_map(|selects| selects.items.iter()) {
        let options: Vec<&str> = select
            .option_groups
            .iter()
            .flat_map(|group| group.options.iter())
            .map(|option| option.name.as_str())
            .collect();
        let _ = write!(out, "[select] {}: {}", select.name, options.join(" | "));
        if let Some(initial) = &select.initial_option {
            let _ = write!(out, " (selected: {})", initial.name);
        }
        let _ = writeln!(out, "\n    send: {} <value>", select.command);
    }
    for input in &section.plaintext_inputs {
        let _ = write!(out, "[input] {}", input.text);
        if let Some(initial) = &input.initial_value {
            let _ = write!(out, " (current: {initial})");
        }
        let _ = writeln!(out, "\n    send: {}<text>", input.command);
    }
    for button in &section.buttons {
        let _ = writeln!(out, "[button] {}\n    send: {}", button.name, button.command);
    }
}

pub fn render_metadata(name: &str, metadata: &MetadataOutput) -> String {
    let mut out = format!("{name} {}: {}\n", metadata.version, metadata.description);
    for (binary, dependency) in &metadata.dependencies {
        let _ = writeln!(out, "  requires {binary}");
        for (platform, url) in &dependency.urls {
            let _ = writeln!(out, "    {platform}: {url}");
        }
    }
    out
}
