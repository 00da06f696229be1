//! Tool activity reconstructed from CLI panes.
//!
//! Both CLIs print tool usage as box-drawn blocks with numbered diff lines.
//! The pane parsers reduce those blocks to a [`ToolAction`], which the UI
//! renders as a collapsible card and the moderator folds back into shared
//! history so the other agent can see what happened.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Tool Kinds
// ============================================================================

/// Tool families both CLIs expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Shell,
    WriteFile,
    Edit,
    ReadFile,
    DeleteFile,
}

impl ToolKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::WriteFile => "write_file",
            Self::Edit => "edit",
            Self::ReadFile => "read_file",
            Self::DeleteFile => "delete_file",
        }
    }

    /// Uppercase form used when an action is summarised into a prompt.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shell => "SHELL",
            Self::WriteFile => "WRITE_FILE",
            Self::Edit => "EDIT",
            Self::ReadFile => "READ_FILE",
            Self::DeleteFile => "DELETE_FILE",
        }
    }

    /// True for the kinds that modify a file and are approved as a
    /// search/replace block rather than raw text.
    #[must_use]
    pub const fn is_file_change(self) -> bool {
        matches!(self, Self::WriteFile | Self::Edit)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diff Lines
// ============================================================================

/// Direction of one diff line as printed by a CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSign {
    Added,
    Removed,
    Context,
}

impl DiffSign {
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Context => ' ',
        }
    }
}

/// One line of a tool diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub sign: DiffSign,
    pub text: String,
}

impl DiffLine {
    #[must_use]
    pub fn added(text: impl Into<String>) -> Self {
        Self {
            sign: DiffSign::Added,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn removed(text: impl Into<String>) -> Self {
        Self {
            sign: DiffSign::Removed,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn context(text: impl Into<String>) -> Self {
        Self {
            sign: DiffSign::Context,
            text: text.into(),
        }
    }
}

// ============================================================================
// Tool Actions
// ============================================================================

/// A tool invocation reconstructed from a CLI pane.
///
/// `target` holds the file path for file tools and the full command line
/// (including any trailing `[cwd ...]` annotation) for shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAction {
    pub kind: ToolKind,
    pub target: String,
    pub description: String,
    pub diff: Vec<DiffLine>,
    pub exit_code: Option<i32>,
    pub shell_output: Option<String>,
    /// Set when the target file did not exist at parse time, so a bare
    /// content listing is treated as all-added rather than context.
    pub is_new_file: bool,
}

impl ToolAction {
    #[must_use]
    pub fn new(kind: ToolKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            description: String::new(),
            diff: Vec::new(),
            exit_code: None,
            shell_output: None,
            is_new_file: false,
        }
    }

    fn file_name(&self) -> &str {
        self.target.rsplit('/').next().unwrap_or(&self.target)
    }

    /// Command line with the CLI's trailing `[cwd ...]` annotation removed.
    /// Only meaningful for shell actions.
    #[must_use]
    pub fn command(&self) -> &str {
        match self.target.find('[') {
            Some(idx) if idx > 0 => self.target[..idx].trim_end(),
            _ => &self.target,
        }
    }

    /// Card headline summarising the outcome.
    #[must_use]
    pub fn headline(&self) -> String {
        match self.kind {
            ToolKind::Shell => match self.exit_code {
                Some(code) if code != 0 => format!("Error (code {code})"),
                _ => "Success".to_owned(),
            },
            ToolKind::WriteFile => {
                if self.is_new_file {
                    format!("Created {}", self.file_name())
                } else {
                    format!("Modified {}", self.file_name())
                }
            }
            ToolKind::Edit => format!("Modified {}", self.file_name()),
            ToolKind::ReadFile => {
                format!("Read {} lines from {}", self.diff.len(), self.file_name())
            }
            ToolKind::DeleteFile => "Completed".to_owned(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ToolKind::Shell && self.exit_code.is_some_and(|code| code != 0)
    }

    /// Render the diff as a search/replace block for the approval pane.
    ///
    /// Removed lines form the search side, added lines the replace side,
    /// and context lines appear on both. Falls back to the description
    /// (or a `kind: target` line) when the CLI printed no diff.
    #[must_use]
    pub fn to_search_replace(&self) -> String {
        let mut search: Vec<&str> = Vec::new();
        let mut replace: Vec<&str> = Vec::new();
        for line in &self.diff {
            match line.sign {
                DiffSign::Removed => search.push(&line.text),
                DiffSign::Added => replace.push(&line.text),
                DiffSign::Context => {
                    search.push(&line.text);
                    replace.push(&line.text);
                }
            }
        }
        if search.is_empty() && replace.is_empty() {
            if self.description.is_empty() {
                return format!("{}: {}", self.kind, self.target);
            }
            return self.description.clone();
        }
        format!(
            "<<<<<<< SEARCH\n{}\n=======\n{}\n>>>>>>> REPLACE",
            search.join("\n"),
            replace.join("\n")
        )
    }

    /// Render the action as plain labelled text, used for shell approvals
    /// and for anything without a structured diff.
    #[must_use]
    pub fn to_raw_context(&self) -> String {
        let mut lines = vec![format!("{}: {}", self.kind.label(), self.target)];
        if !self.description.is_empty() {
            lines.push(self.description.clone());
        }
        if !self.diff.is_empty() {
            lines.push(String::new());
            for line in &self.diff {
                lines.push(format!("{} {}", line.sign.marker(), line.text));
            }
        }
        lines.join("\n")
    }
}

// ============================================================================
// Session Replies
// ============================================================================

/// A completed reply extracted from a CLI pane.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    pub content: String,
    pub exit_code: Option<i32>,
    pub shell_output: Option<String>,
}

impl ParsedResponse {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            exit_code: None,
            shell_output: None,
        }
    }
}

/// A pane stopped on a tool confirmation prompt.
///
/// When one confirmation chains straight into another, `prior_result`
/// carries whatever completed in between so it is not lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfirmation {
    pub context: String,
    pub prior_result: Option<ParsedResponse>,
    pub prior_exit_code: Option<i32>,
    pub prior_shell_output: Option<String>,
}

impl ParsedConfirmation {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            prior_result: None,
            prior_exit_code: None,
            prior_shell_output: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
