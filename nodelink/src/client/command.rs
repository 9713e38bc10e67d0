//! Command munging shared by the drivers.
//!
//! Context/value normalisation, sub-mode flattening, and batch attribution
//! of device rejections.

use once_cell::sync::Lazy;
use regex::Regex;

static NEGATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*no\s+(.*)$").unwrap());

/// Anything usable as a context or value list: one line or many.
pub trait IntoLines {
    fn into_lines(self) -> Vec<String>;
}

impl IntoLines for &str {
    fn into_lines(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoLines for String {
    fn into_lines(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoLines for &String {
    fn into_lines(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoLines for Vec<String> {
    fn into_lines(self) -> Vec<String> {
        self
    }
}

impl IntoLines for Vec<&str> {
    fn into_lines(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoLines for &[&str] {
    fn into_lines(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoLines for &[String] {
    fn into_lines(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoLines for [&str; N] {
    fn into_lines(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Sub-mode entry commands followed by the value commands.
///
/// For transports that keep per-request mode state.
pub fn context_then_values(context: &[String], values: &[String]) -> Vec<String> {
    context.iter().chain(values).cloned().collect()
}

/// Fold the context into every value command.
///
/// A leading `no` on a value moves to the front of the combined line:
/// context `["router bgp 1"]` and value `"no neighbor 1.1.1.1"` become
/// `"no router bgp 1 neighbor 1.1.1.1"`. With no values, the context
/// itself is the single command.
pub fn nest_in_context(context: &[String], values: &[String]) -> Vec<String> {
    if context.is_empty() {
        return values.to_vec();
    }
    let prefix = context.join(" ");
    if values.is_empty() {
        return vec![prefix];
    }

    values
        .iter()
        .map(|value| match NEGATION.captures(value) {
            Some(caps) => format!("no {} {}", prefix, &caps[1]),
            None => format!("{} {}", prefix, value.trim()),
        })
        .collect()
}

/// Index of the command the device echoed back as `echo`.
///
/// `hint` is where the device says the failure happened. It wins when the
/// command there matches; otherwise the search runs forward from `hint`,
/// then over the whole batch.
pub fn locate_echo(commands: &[String], echo: &str, hint: usize) -> Option<usize> {
    let echo = echo.trim();
    let matches = |cmd: &String| cmd.trim() == echo;

    if commands.get(hint).is_some_and(matches) {
        return Some(hint);
    }
    commands
        .iter()
        .skip(hint)
        .position(matches)
        .map(|i| i + hint)
        .or_else(|| commands.iter().position(matches))
}

/// Split a batch around its rejected commands.
///
/// `rejected` holds command text echoed back by the device, in batch order.
/// Each echo is matched to the first unclaimed copy after the previous
/// match, so repeated lines are attributed to successive copies. Returns the
/// rejected commands in batch order and the commands before the first
/// rejection. `None` if no echoed text could be matched to the batch.
pub fn attribute_rejection(
    commands: &[String],
    rejected: &[String],
) -> Option<(Vec<String>, Vec<String>)> {
    let mut positions: Vec<usize> = Vec::with_capacity(rejected.len());
    let mut next = 0;
    for echo in rejected {
        if let Some(i) = locate_echo(commands, echo, next) {
            if !positions.contains(&i) {
                positions.push(i);
            }
            next = i + 1;
        }
    }
    positions.sort_unstable();

    let first = *positions.first()?;
    Some((
        positions.iter().map(|&i| commands[i].clone()).collect(),
        commands[..first].to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.into_lines()
    }

    #[test]
    fn test_negation_hoisting() {
        let out = nest_in_context(&lines(&["router bgp 1"]), &lines(&["no neighbor 1.1.1.1"]));
        assert_eq!(out, vec!["no router bgp 1 neighbor 1.1.1.1"]);
    }

    #[test]
    fn test_nested_context_without_negation() {
        let out = nest_in_context(
            &lines(&["router bgp 1", "neighbor 1.1.1.1"]),
            &lines(&["remote-as 2", "  no shutdown"]),
        );
        assert_eq!(
            out,
            vec![
                "router bgp 1 neighbor 1.1.1.1 remote-as 2",
                "no router bgp 1 neighbor 1.1.1.1 shutdown",
            ]
        );
    }

    #[test]
    fn test_negation_needs_whole_word() {
        let out = nest_in_context(&lines(&["interface Gi0/0/0/0"]), &lines(&["nonsense"]));
        assert_eq!(out, vec!["interface Gi0/0/0/0 nonsense"]);
    }

    #[test]
    fn test_context_only() {
        assert_eq!(
            nest_in_context(&lines(&["router ospf 1"]), &[]),
            vec!["router ospf 1"]
        );
        assert_eq!(nest_in_context(&[], &lines(&["hostname r1"])), vec!["hostname r1"]);
    }

    #[test]
    fn test_context_then_values() {
        let out = context_then_values(&lines(&["router ospf 1"]), &lines(&["router-id 1.1.1.1"]));
        assert_eq!(out, vec!["router ospf 1", "router-id 1.1.1.1"]);
    }

    #[test]
    fn test_attribute_rejection() {
        let batch = lines(&["c1", "c2", "c3", "c4", "c5"]);
        let (rejected, successful) = attribute_rejection(&batch, &lines(&[" c3 "])).unwrap();
        assert_eq!(rejected, vec!["c3"]);
        assert_eq!(successful, vec!["c1", "c2"]);
    }

    #[test]
    fn test_locate_echo_trusts_hint() {
        let batch = lines(&["interface e1/1", "shutdown", "interface e1/2", "shutdown"]);
        assert_eq!(locate_echo(&batch, "shutdown", 3), Some(3));
        assert_eq!(locate_echo(&batch, "shutdown", 2), Some(3));
        assert_eq!(locate_echo(&batch, " shutdown ", 9), Some(1));
        assert_eq!(locate_echo(&batch, "exit", 0), None);
    }

    #[test]
    fn test_attribute_rejection_repeated_lines() {
        let batch = lines(&["interface e1/1", "bogus", "interface e1/2", "bogus"]);
        let (rejected, successful) =
            attribute_rejection(&batch, &lines(&["bogus", "bogus"])).unwrap();
        assert_eq!(rejected, lines(&["bogus", "bogus"]));
        assert_eq!(successful, lines(&["interface e1/1"]));
    }

    #[test]
    fn test_attribute_rejection_unknown_echo() {
        let batch = lines(&["c1", "c2"]);
        assert!(attribute_rejection(&batch, &lines(&["zz"])).is_none());
    }

    #[test]
    fn test_into_lines_variants() {
        assert_eq!("a".into_lines(), vec!["a"]);
        assert_eq!(["a", "b"].into_lines(), vec!["a", "b"]);
        assert_eq!(vec!["a".to_string()].into_lines(), vec!["a"]);
    }
}
