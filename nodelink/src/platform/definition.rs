//! Per-platform session settings.

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::privilege_level::PrivilegeLevel;

/// How to drive one device family over an interactive shell.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Registry key, e.g. `cisco_nxos`.
    pub name: String,

    /// Family tag reported by the client, e.g. `nexus`.
    pub tag: String,

    pub privilege_levels: IndexMap<String, PrivilegeLevel>,

    /// Level show commands run from.
    pub exec_privilege: String,

    /// Level configuration lines are entered at.
    pub config_privilege: String,

    /// Output substrings that mark a rejected command.
    pub failed_when_contains: Vec<String>,

    /// Sent once after login, e.g. to disable paging.
    pub on_open_commands: Vec<String>,

    /// Applies staged configuration (two-stage commit platforms only).
    pub commit_command: Option<String>,

    /// Discards staged configuration after a failure.
    pub abort_command: Option<String>,

    pub terminal_width: u32,
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// A platform with no levels, 511x24 terminal.
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            privilege_levels: IndexMap::new(),
            exec_privilege: String::new(),
            config_privilege: String::new(),
            failed_when_contains: Vec::new(),
            on_open_commands: Vec::new(),
            commit_command: None,
            abort_command: None,
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add a privilege level, keyed by its name.
    pub fn with_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_levels.insert(level.name.clone(), level);
        self
    }

    /// Set the level show commands run from.
    pub fn with_exec_privilege(mut self, name: impl Into<String>) -> Self {
        self.exec_privilege = name.into();
        self
    }

    /// Set the level configuration is entered at.
    pub fn with_config_privilege(mut self, name: impl Into<String>) -> Self {
        self.config_privilege = name.into();
        self
    }

    /// Treat output containing `text` as a rejected command.
    pub fn with_failure_pattern(mut self, text: impl Into<String>) -> Self {
        self.failed_when_contains.push(text.into());
        self
    }

    /// Send `command` once after login.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Stage configuration and apply it with `commit`, discarding with `abort`.
    pub fn with_commit(mut self, commit: impl Into<String>, abort: impl Into<String>) -> Self {
        self.commit_command = Some(commit.into());
        self.abort_command = Some(abort.into());
        self
    }

    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Look up a privilege level by name.
    pub fn level(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels.get(name)
    }

    /// One pattern matching the prompt of any level.
    pub fn any_prompt(&self) -> Result<Regex, regex::Error> {
        let alternatives: Vec<String> = self
            .privilege_levels
            .values()
            .map(|level| format!("(?:{})", level.prompt.as_str()))
            .collect();
        Regex::new(&alternatives.join("|"))
    }

    /// The first failure substring present in `output`.
    pub fn failure_in(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .map(String::as_str)
            .find(|pattern| output.contains(*pattern))
    }
}
