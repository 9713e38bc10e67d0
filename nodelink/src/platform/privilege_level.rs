//! One node of a platform's privilege graph.

use regex::bytes::Regex;

/// A CLI mode recognised by its prompt.
///
/// Levels link to a parent; `escalate` moves from the parent into this
/// level and `deescalate` moves back out.
#[derive(Debug, Clone)]
pub struct PrivilegeLevel {
    /// Level name, e.g. `privilege_exec`.
    pub name: String,
    /// Pattern matching this level's prompt line.
    pub prompt: Regex,
    /// Level this one is entered from.
    pub parent: Option<String>,
    /// Command that moves from the parent into this level.
    pub escalate: Option<String>,
    /// Command that returns to the parent.
    pub deescalate: Option<String>,
    /// Prompt asking for a secret while escalating.
    pub auth_prompt: Option<Regex>,
    /// Substrings that rule this level out even when `prompt` matches.
    pub not_contains: Vec<String>,
}

impl PrivilegeLevel {
    /// A root level with no transitions.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: Regex::new(prompt)?,
            parent: None,
            escalate: None,
            deescalate: None,
            auth_prompt: None,
            not_contains: Vec::new(),
        })
    }

    /// Set the level this one is entered from.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the command that enters this level from its parent.
    pub fn with_escalate(mut self, command: impl Into<String>) -> Self {
        self.escalate = Some(command.into());
        self
    }

    /// Set the command that leaves this level for its parent.
    pub fn with_deescalate(mut self, command: impl Into<String>) -> Self {
        self.deescalate = Some(command.into());
        self
    }

    /// Expect a secret prompt matching `prompt` while escalating.
    pub fn with_auth(mut self, prompt: &str) -> Result<Self, regex::Error> {
        self.auth_prompt = Some(Regex::new(prompt)?);
        Ok(self)
    }

    /// Rule the level out when a prompt contains `text`.
    pub fn with_not_contains(mut self, text: impl Into<String>) -> Self {
        self.not_contains.push(text.into());
        self
    }

    /// Whether `prompt` (a single line) belongs to this level.
    pub fn matches(&self, prompt: &str) -> bool {
        !self.not_contains.iter().any(|nc| prompt.contains(nc.as_str()))
            && self.prompt.is_match(prompt.as_bytes())
    }
}
