//! Reply assembly and error-text classification for the EMS service.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::client::command::attribute_rejection;
use crate::error::{CliFailure, Error, RequestFailure, Result};

use super::proto::{ConfigGetReply, ShowCmdJsonReply, ShowCmdTextReply};

/// `---- show clock ----` style banner the device puts ahead of text output.
static BANNER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-{2,}\s.*\s-{2,}\s*$").unwrap());

/// Line holding only a `^` marker under the offending token.
static CARET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\^\s*$").unwrap());

/// Payload kind of one streamed reply message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Json,
    Config,
}

/// One message of a server-streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPart {
    pub kind: PartKind,
    pub output: String,
    pub errors: String,
}

impl ReplyPart {
    pub fn text(output: impl Into<String>) -> Self {
        Self::new(PartKind::Text, output)
    }

    pub fn json(output: impl Into<String>) -> Self {
        Self::new(PartKind::Json, output)
    }

    pub fn config(output: impl Into<String>) -> Self {
        Self::new(PartKind::Config, output)
    }

    fn new(kind: PartKind, output: impl Into<String>) -> Self {
        Self {
            kind,
            output: output.into(),
            errors: String::new(),
        }
    }

    pub fn with_errors(mut self, errors: impl Into<String>) -> Self {
        self.errors = errors.into();
        self
    }
}

impl From<ShowCmdTextReply> for ReplyPart {
    fn from(reply: ShowCmdTextReply) -> Self {
        Self::text(reply.output).with_errors(reply.errors)
    }
}

impl From<ShowCmdJsonReply> for ReplyPart {
    fn from(reply: ShowCmdJsonReply) -> Self {
        Self::json(reply.jsonoutput).with_errors(reply.errors)
    }
}

impl From<ConfigGetReply> for ReplyPart {
    fn from(reply: ConfigGetReply) -> Self {
        Self::config(reply.yangjson).with_errors(reply.errors)
    }
}

/// Concatenated output and error text of a streamed reply.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Assembled {
    pub output: String,
    pub errors: String,
}

/// Join streamed parts in order. Every part must be of `expected` kind.
pub fn assemble(expected: PartKind, parts: Vec<ReplyPart>) -> Result<Assembled> {
    let mut assembled = Assembled::default();
    for part in parts {
        if part.kind != expected {
            return Err(Error::Client(format!(
                "reply stream mixed {:?} and {:?} parts",
                expected, part.kind
            )));
        }
        assembled.output.push_str(&part.output);
        assembled.errors.push_str(&part.errors);
    }
    Ok(assembled)
}

/// Strip the banner from show text and detect rejected commands.
pub fn show_text(command: &str, output: &str) -> Result<String> {
    let mut lines = output.lines().skip_while(|l| l.trim().is_empty()).peekable();
    if lines.peek().is_some_and(|l| BANNER.is_match(l)) {
        lines.next();
    }
    let body = lines.collect::<Vec<_>>().join("\n");

    if is_cli_rejection(&body) {
        return Err(Error::Cli(CliFailure::new(command, body)));
    }
    Ok(body)
}

fn is_cli_rejection(text: &str) -> bool {
    text.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with("% Invalid") || l.starts_with("% Incomplete") || l.starts_with("% Ambiguous")
    }) || CARET.is_match(text)
}

/// Classify the `errors` field of a show or get reply.
pub fn check_show_errors(command: &str, errors: &str) -> Result<()> {
    let errors = errors.trim();
    if errors.is_empty() {
        return Ok(());
    }
    if let Some(messages) = yang_error_messages(errors) {
        return Err(Error::RequestFailed(
            RequestFailure::new(messages.join("; ")).with_rejected(vec![command.to_string()]),
        ));
    }
    if errors.to_lowercase().contains("not supported") {
        return Err(Error::RequestNotSupported(format!("'{command}': {errors}")));
    }
    if is_cli_rejection(errors) {
        return Err(Error::Cli(CliFailure::new(command, errors)));
    }
    Err(Error::RequestFailed(
        RequestFailure::new(errors).with_rejected(vec![command.to_string()]),
    ))
}

/// Classify the `errors` field of a CLI configuration reply.
///
/// The device lists rejected lines after a block of `!!` commentary and
/// closes with `end`. The reply carries no line numbers, so echoes are
/// matched to the batch by text, in order: when a repeated line is rejected
/// only once, the earliest copy is blamed and `successful_input` may stop
/// short of what the device actually applied.
pub fn check_cli_config_errors(commands: &[String], errors: &str) -> Result<()> {
    let trimmed = errors.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.to_lowercase().contains("not supported") {
        return Err(Error::RequestNotSupported(trimmed.to_string()));
    }

    let echoed: Vec<String> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("!!") && *l != "end")
        .map(str::to_string)
        .collect();
    let (rejected, successful) =
        attribute_rejection(commands, &echoed).unwrap_or_else(|| (commands.to_vec(), Vec::new()));

    if trimmed.contains("SYNTAX") || is_cli_rejection(trimmed) {
        Err(Error::Cli(CliFailure {
            rejected_input: rejected,
            clierror: trimmed.to_string(),
            successful_input: successful,
        }))
    } else {
        Err(Error::RequestFailed(
            RequestFailure::new(trimmed)
                .with_rejected(rejected)
                .with_successful(successful),
        ))
    }
}

/// Classify the `errors` field of a YANG configuration reply.
pub fn check_yang_errors(payload: &str, errors: &str) -> Result<()> {
    let errors = errors.trim();
    if errors.is_empty() {
        return Ok(());
    }
    let message = yang_error_messages(errors)
        .map(|m| m.join("; "))
        .unwrap_or_else(|| errors.to_string());
    if message.to_lowercase().contains("not supported") {
        return Err(Error::RequestNotSupported(message));
    }
    Err(Error::RequestFailed(
        RequestFailure::new(message).with_rejected(vec![payload.to_string()]),
    ))
}

/// Pull `error-message`s out of a `cisco-grpc:errors` document.
fn yang_error_messages(errors: &str) -> Option<Vec<String>> {
    let document: Value = serde_json::from_str(errors).ok()?;
    let list = document.pointer("/cisco-grpc:errors/error")?;
    let items = match list {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };
    Some(
        items
            .into_iter()
            .map(|e| {
                e.get("error-message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string())
            })
            .collect(),
    )
}

/// Parse JSON text, treating blank output as no data.
pub fn parse_json(command: &str, text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| Error::Client(format!("malformed JSON reply for '{command}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_assemble_in_order() {
        let parts = vec![ReplyPart::text("abc"), ReplyPart::text("def")];
        let assembled = assemble(PartKind::Text, parts).unwrap();
        assert_eq!(assembled.output, "abcdef");
    }

    #[test]
    fn test_assemble_rejects_mixed_parts() {
        let parts = vec![ReplyPart::text("abc"), ReplyPart::json("{}")];
        assert!(matches!(assemble(PartKind::Text, parts), Err(Error::Client(_))));
    }

    #[test]
    fn test_show_text_drops_banner() {
        let out = show_text("show clock", "\n---- show clock ----\n12:00:00.000 UTC Mon Oct 17 2026\n").unwrap();
        assert_eq!(out, "12:00:00.000 UTC Mon Oct 17 2026");
    }

    #[test]
    fn test_show_text_invalid_input() {
        let raw = "show foo\n     ^\n% Invalid input detected at '^' marker.\n";
        let err = show_text("show foo", raw).unwrap_err();
        assert_eq!(err.rejected_input(), cmds(&["show foo"]));
        assert!(matches!(err, Error::Cli(_)));
    }

    #[test]
    fn test_cli_config_errors_attribution() {
        let commands = cmds(&["c1", "c2", "c3", "c4", "c5"]);
        let errors = "!! SYNTAX/AUTHORIZATION ERRORS: This configuration failed due to\n\
                      !! one or more of the following reasons:\n\
                      !!  - the entered commands do not exist,\n\
                      \n\
                      c3\n\
                      end\n";
        let err = check_cli_config_errors(&commands, errors).unwrap_err();
        assert!(matches!(err, Error::Cli(_)));
        assert_eq!(err.rejected_input(), cmds(&["c3"]));
        assert_eq!(err.successful_input(), cmds(&["c1", "c2"]));
    }

    #[test]
    fn test_cli_config_repeated_rejections() {
        let commands = cmds(&["interface Gi0/0/0/0", "bogus", "interface Gi0/0/0/1", "bogus"]);
        let errors = "!! SYNTAX/AUTHORIZATION ERRORS: This configuration failed due to\n\
                      !! one or more of the following reasons:\n\
                      bogus\n\
                      bogus\n\
                      end\n";
        let err = check_cli_config_errors(&commands, errors).unwrap_err();
        assert!(matches!(err, Error::Cli(_)));
        assert_eq!(err.rejected_input(), cmds(&["bogus", "bogus"]));
        assert_eq!(err.successful_input(), cmds(&["interface Gi0/0/0/0"]));
    }

    #[test]
    fn test_cli_config_semantic_failure() {
        let commands = cmds(&["router ospf 1 area 0 interface Gi0/0/0/0"]);
        let errors = "!! % Failed to commit one or more configuration items\n\
                      router ospf 1 area 0 interface Gi0/0/0/0\n";
        let err = check_cli_config_errors(&commands, errors).unwrap_err();
        assert!(matches!(err, Error::RequestFailed(_)));
        assert_eq!(err.rejected_input(), commands);
    }

    #[test]
    fn test_yang_errors() {
        let errors = r#"{"cisco-grpc:errors": {"error": [
            {"error-type": "application", "error-tag": "operation-failed",
             "error-message": "'YANG framework' detected the 'fatal' condition 'Operation failed'"}
        ]}}"#;
        let err = check_yang_errors("{}", errors).unwrap_err();
        assert!(matches!(err, Error::RequestFailed(_)));
        assert!(err.message().contains("Operation failed"));
    }

    #[test]
    fn test_show_not_supported() {
        let err = check_show_errors("show foo", "JSON output not supported for this command").unwrap_err();
        assert!(matches!(err, Error::RequestNotSupported(_)));
        assert!(check_show_errors("show foo", "  ").is_ok());
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json("x", " \n").unwrap(), None);
        assert!(parse_json("x", "{").is_err());
    }
}
