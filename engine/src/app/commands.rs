//! Slash command processing for the App.

use duet_types::AiTarget;

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub usage: &'static str,
    pub description: &'static str,
}

const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        usage: "/help",
        description: "Show this help",
    },
    CommandSpec {
        usage: "/status",
        description: "Agent session health and history size",
    },
    CommandSpec {
        usage: "/clear",
        description: "Clear conversation history (sessions stay alive)",
    },
    CommandSpec {
        usage: "/copy",
        description: "Copy the last agent reply to the clipboard",
    },
    CommandSpec {
        usage: "/restart [agent]",
        description: "Relaunch agent sessions (all failed, or one by name)",
    },
    CommandSpec {
        usage: "/quit",
        description: "Close both sessions and exit",
    },
];

#[must_use]
pub fn command_specs() -> &'static [CommandSpec] {
    COMMAND_SPECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Help,
    Status,
    Clear,
    Copy,
    Restart,
    Quit,
}

#[derive(Debug, Clone, Copy)]
struct CommandAlias {
    name: &'static str,
    kind: CommandKind,
}

const COMMAND_ALIASES: &[CommandAlias] = &[
    CommandAlias {
        name: "help",
        kind: CommandKind::Help,
    },
    CommandAlias {
        name: "status",
        kind: CommandKind::Status,
    },
    CommandAlias {
        name: "clear",
        kind: CommandKind::Clear,
    },
    CommandAlias {
        name: "copy",
        kind: CommandKind::Copy,
    },
    CommandAlias {
        name: "restart",
        kind: CommandKind::Restart,
    },
    CommandAlias {
        name: "q",
        kind: CommandKind::Quit,
    },
    CommandAlias {
        name: "quit",
        kind: CommandKind::Quit,
    },
];

pub(crate) enum NormalizedCommandName<'a> {
    Blank,
    Known(CommandKind),
    Unrecognized(&'a str),
}

pub(crate) fn normalize_command_name(raw: &str) -> NormalizedCommandName<'_> {
    let token = raw.trim().trim_start_matches('/');
    if token.is_empty() {
        return NormalizedCommandName::Blank;
    }
    if let Some(kind) = COMMAND_ALIASES
        .iter()
        .find(|alias| alias.name.eq_ignore_ascii_case(token))
        .map(|alias| alias.kind)
    {
        NormalizedCommandName::Known(kind)
    } else {
        NormalizedCommandName::Unrecognized(token)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RestartScope<'a> {
    Failed,
    Named(AiTarget),
    Unknown(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParseIssue<'a> {
    BlankInput,
    UnrecognizedCommand(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Help,
    Status,
    Clear,
    Copy,
    Restart(RestartScope<'a>),
    Quit,
    ParseIssue(ParseIssue<'a>),
}

impl<'a> Command<'a> {
    /// Accepts optional leading `/` and is case-insensitive (e.g., `/Clear`, `QUIT`).
    pub(crate) fn parse(raw: &'a str) -> Self {
        let parts: Vec<&str> = raw.split_whitespace().collect();

        let Some(cmd_raw) = parts.first().copied() else {
            return Command::ParseIssue(ParseIssue::BlankInput);
        };

        let kind = match normalize_command_name(cmd_raw) {
            NormalizedCommandName::Blank => return Command::ParseIssue(ParseIssue::BlankInput),
            NormalizedCommandName::Known(kind) => kind,
            NormalizedCommandName::Unrecognized(token) => {
                return Command::ParseIssue(ParseIssue::UnrecognizedCommand(token));
            }
        };

        match kind {
            CommandKind::Help => Command::Help,
            CommandKind::Status => Command::Status,
            CommandKind::Clear => Command::Clear,
            CommandKind::Copy => Command::Copy,
            CommandKind::Restart => Command::Restart(match parts.get(1).copied() {
                None => RestartScope::Failed,
                Some(name) => match AiTarget::parse(name) {
                    Ok(target) => RestartScope::Named(target),
                    Err(_) => RestartScope::Unknown(name),
                },
            }),
            CommandKind::Quit => Command::Quit,
        }
    }
}

pub(crate) fn help_text() -> String {
    let width = COMMAND_SPECS
        .iter()
        .map(|spec| spec.usage.len())
        .max()
        .unwrap_or(0);

    let mut lines = vec!["Commands:".to_string()];
    for spec in COMMAND_SPECS {
        lines.push(format!(
            "  {:<width$}  {}",
            spec.usage, spec.description
        ));
    }
    lines.push(String::new());
    lines.push("Routing:".to_string());
    lines.push(format!(
        "  {:<width$}  Send the message to Claude",
        "@cc, @claude"
    ));
    lines.push(format!(
        "  {:<width$}  Send the message to Gemini",
        "@g, @gemini"
    ));
    lines.push(String::new());
    lines.push("Shell:".to_string());
    lines.push(format!(
        "  {:<width$}  Run a shell command (30s timeout)",
        "!<command>"
    ));
    lines.join("\n")
}

impl super::App {
    pub(crate) fn process_command(&mut self, raw: &str) {
        match Command::parse(raw) {
            Command::Help => {
                self.push_notice(help_text());
            }
            Command::Status => {
                let report = self.status_report();
                self.push_notice(report);
            }
            Command::Clear => {
                self.clear_conversation();
            }
            Command::Copy => {
                self.copy_last_reply();
            }
            Command::Restart(scope) => match scope {
                RestartScope::Failed => self.restart_failed_agents(),
                RestartScope::Named(target) => self.restart_agent(target),
                RestartScope::Unknown(name) => {
                    self.push_error(format!(
                        "Unknown agent '{name}' (expected 'claude' or 'gemini')"
                    ));
                }
            },
            Command::Quit => {
                self.request_quit();
            }
            Command::ParseIssue(issue) => match issue {
                ParseIssue::BlankInput => {}
                ParseIssue::UnrecognizedCommand(cmd) => {
                    self.push_error(format!("Unknown command: /{cmd}"));
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, ParseIssue, RestartScope, help_text};
    use duet_types::AiTarget;

    #[test]
    fn parse_plain_commands() {
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("clear"), Command::Clear);
        assert_eq!(Command::parse("copy"), Command::Copy);
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("q"), Command::Quit);
    }

    #[test]
    fn parse_case_insensitive_and_slash_prefix() {
        assert_eq!(Command::parse("/QUIT"), Command::Quit);
        assert_eq!(Command::parse("/Clear"), Command::Clear);
        assert_eq!(Command::parse("HELP"), Command::Help);
    }

    #[test]
    fn parse_restart_variants() {
        assert_eq!(
            Command::parse("restart"),
            Command::Restart(RestartScope::Failed)
        );
        assert_eq!(
            Command::parse("restart claude"),
            Command::Restart(RestartScope::Named(AiTarget::Claude))
        );
        assert_eq!(
            Command::parse("/restart g"),
            Command::Restart(RestartScope::Named(AiTarget::Gemini))
        );
        assert_eq!(
            Command::parse("restart gpt"),
            Command::Restart(RestartScope::Unknown("gpt"))
        );
    }

    #[test]
    fn parse_blank_and_unknown() {
        assert_eq!(
            Command::parse(""),
            Command::ParseIssue(ParseIssue::BlankInput)
        );
        assert_eq!(
            Command::parse("/"),
            Command::ParseIssue(ParseIssue::BlankInput)
        );
        assert_eq!(
            Command::parse("/frobnicate"),
            Command::ParseIssue(ParseIssue::UnrecognizedCommand("frobnicate"))
        );
    }

    #[test]
    fn extra_arguments_are_ignored() {
        assert_eq!(Command::parse("quit now"), Command::Quit);
        assert_eq!(Command::parse("clear all please"), Command::Clear);
    }

    #[test]
    fn help_text_lists_every_command() {
        let help = help_text();
        assert!(help.contains("/help"));
        assert!(help.contains("/status"));
        assert!(help.contains("/clear"));
        assert!(help.contains("/copy"));
        assert!(help.contains("/restart"));
        assert!(help.contains("/quit"));
        assert!(help.contains("@claude"));
        assert!(help.contains("!<command>"));
    }
}
