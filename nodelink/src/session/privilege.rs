//! Navigation between a platform's privilege levels.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::platform::PrivilegeLevel;

/// Undirected graph of levels, each linked to its parent.
#[derive(Debug)]
pub struct PrivilegeGraph {
    levels: IndexMap<String, PrivilegeLevel>,
    neighbours: HashMap<String, Vec<String>>,
}

/// One hop between adjacent levels.
#[derive(Debug, Clone)]
pub struct Transition {
    pub command: String,
    /// Set when the hop may ask for a secret.
    pub auth_prompt: Option<Regex>,
}

impl PrivilegeGraph {
    pub fn new(levels: IndexMap<String, PrivilegeLevel>) -> Self {
        let mut neighbours: HashMap<String, Vec<String>> = HashMap::new();
        for (name, level) in &levels {
            neighbours.entry(name.clone()).or_default();
            if let Some(parent) = &level.parent {
                neighbours.entry(name.clone()).or_default().push(parent.clone());
                neighbours.entry(parent.clone()).or_default().push(name.clone());
            }
        }
        Self { levels, neighbours }
    }

    /// Name of the level whose prompt `prompt` is, in definition order.
    pub fn identify(&self, prompt: &str) -> Option<&str> {
        self.levels
            .values()
            .find(|level| level.matches(prompt))
            .map(|level| level.name.as_str())
    }

    /// Shortest path of level names from `from` to `to`, both included.
    pub fn find_path(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let mut came_from: HashMap<&str, &str> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        came_from.insert(from, from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to.to_string()];
                let mut cursor = to;
                while cursor != from {
                    cursor = came_from[cursor];
                    path.push(cursor.to_string());
                }
                path.reverse();
                return Ok(path);
            }
            for next in self.neighbours.get(node).into_iter().flatten() {
                if !came_from.contains_key(next.as_str()) {
                    came_from.insert(next.as_str(), node);
                    queue.push_back(next.as_str());
                }
            }
        }

        Err(Error::Client(format!(
            "no way to move from privilege level '{from}' to '{to}'"
        )))
    }

    /// The command moving between two adjacent levels.
    pub fn transition(&self, from: &str, to: &str) -> Option<Transition> {
        let source = self.levels.get(from)?;
        let target = self.levels.get(to)?;

        if target.parent.as_deref() == Some(from) {
            return Some(Transition {
                command: target.escalate.clone()?,
                auth_prompt: target.auth_prompt.clone(),
            });
        }
        if source.parent.as_deref() == Some(to) {
            return Some(Transition {
                command: source.deescalate.clone()?,
                auth_prompt: None,
            });
        }
        None
    }
}
