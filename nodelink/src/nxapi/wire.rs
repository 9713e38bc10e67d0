//! NX-API JSON envelope and per-command result classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::command::locate_echo;
use crate::error::{CliFailure, Error, RequestFailure, Result};

/// Separator NX-API uses between commands of one batch.
pub const COMMAND_SEPARATOR: &str = " ; ";

const API_VERSION: &str = "1.2";

/// Request type carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Configuration commands.
    Config,
    /// Show commands returning raw text.
    ShowAscii,
    /// Show commands returning device-native JSON.
    Show,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "cli_conf",
            Self::ShowAscii => "cli_show_ascii",
            Self::Show => "cli_show",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    ins_api: InsApi<'a>,
}

#[derive(Debug, Serialize)]
struct InsApi<'a> {
    version: &'static str,
    #[serde(rename = "type")]
    message_type: &'static str,
    chunk: &'static str,
    sid: &'static str,
    input: &'a str,
    output_format: &'static str,
}

impl<'a> Envelope<'a> {
    /// Wrap pre-joined command text.
    pub fn new(message_type: MessageType, input: &'a str) -> Self {
        Self {
            ins_api: InsApi {
                version: API_VERSION,
                message_type: message_type.as_str(),
                chunk: "0",
                sid: "1",
                input,
                output_format: "json",
            },
        }
    }
}

/// Result of one command in a batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandOutput {
    /// Status as the device sent it; usually a string such as `"200"`.
    pub code: Value,
    pub msg: String,
    pub body: Option<Value>,
    /// Echo of the command this output belongs to.
    pub input: Option<String>,
    pub clierror: Option<String>,
}

impl CommandOutput {
    pub fn code(&self) -> Option<u16> {
        match &self.code {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        }
    }

    fn reason(&self) -> String {
        self.clierror
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&self.msg)
            .to_string()
    }
}

/// Extract `ins_api.outputs.output`, which is an object for a single
/// command and an array for a batch.
pub fn parse_outputs(document: &Value) -> Result<Vec<CommandOutput>> {
    let output = document
        .pointer("/ins_api/outputs/output")
        .ok_or_else(|| Error::Client("response has no ins_api.outputs.output".into()))?;

    let items = match output {
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| Error::Client(format!("malformed command output: {e}")))
        })
        .collect()
}

/// Check every output of a batch and return the bodies of a fully
/// successful one, in command order.
///
/// On the first failing output, the error names the rejected command and
/// the commands of the batch that ran before it.
pub fn check_outputs(commands: &[String], outputs: Vec<CommandOutput>) -> Result<Vec<Option<Value>>> {
    let mut bodies = Vec::with_capacity(outputs.len());
    for (position, output) in outputs.into_iter().enumerate() {
        match output.code() {
            Some(200) => bodies.push(output.body),
            code => return Err(classify_failure(commands, position, code, &output)),
        }
    }
    Ok(bodies)
}

fn classify_failure(
    commands: &[String],
    position: usize,
    code: Option<u16>,
    output: &CommandOutput,
) -> Error {
    let (rejected, successful) = attribute(commands, position, output);
    let reason = output.reason();

    match code {
        Some(400) => Error::Cli(CliFailure {
            rejected_input: rejected,
            clierror: reason,
            successful_input: successful,
        }),
        Some(413) => Error::RequestNotSupported(format!(
            "request too large for the device: {}",
            output.msg
        )),
        Some(501) => Error::RequestNotSupported(format!(
            "structured output not supported for '{}'",
            rejected.join(COMMAND_SEPARATOR)
        )),
        _ => Error::RequestFailed(
            RequestFailure::new(format!("code {}: {}", output.code, reason))
                .with_rejected(rejected)
                .with_successful(successful),
        ),
    }
}

/// Work out which command failed and which ran before it.
///
/// The failing output's position names the command unless the echoed input
/// points elsewhere.
fn attribute(
    commands: &[String],
    position: usize,
    output: &CommandOutput,
) -> (Vec<String>, Vec<String>) {
    let at_position = (position < commands.len()).then_some(position);
    let located = output
        .input
        .as_deref()
        .and_then(|echo| locate_echo(commands, echo, position))
        .or(at_position);
    match located {
        Some(i) => (vec![commands[i].clone()], commands[..i].to_vec()),
        None => (
            output.input.iter().cloned().collect(),
            commands.to_vec(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope::new(MessageType::Config, "feature bgp ; router bgp 1");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"ins_api": {
                "version": "1.2",
                "type": "cli_conf",
                "chunk": "0",
                "sid": "1",
                "input": "feature bgp ; router bgp 1",
                "output_format": "json"
            }})
        );
    }

    #[test]
    fn test_single_output_object() {
        let doc = json!({"ins_api": {"outputs": {"output": {
            "input": "show hostname", "msg": "Success", "code": "200", "body": "n9k\n"
        }}}});
        let outputs = parse_outputs(&doc).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].code(), Some(200));
        assert_eq!(outputs[0].body, Some(json!("n9k\n")));
    }

    #[test]
    fn test_missing_outputs() {
        assert!(matches!(
            parse_outputs(&json!({"ins_api": {}})),
            Err(Error::Client(_))
        ));
    }

    #[test]
    fn test_batch_attribution_by_position() {
        let commands = cmds(&["c1", "c2", "c3", "c4", "c5"]);
        let outputs = vec![
            CommandOutput { code: json!("200"), ..Default::default() },
            CommandOutput { code: json!("200"), ..Default::default() },
            CommandOutput {
                code: json!("400"),
                msg: "Input CLI command error".into(),
                clierror: Some("% Invalid command\n".into()),
                ..Default::default()
            },
        ];

        let err = check_outputs(&commands, outputs).unwrap_err();
        assert!(matches!(err, Error::Cli(_)));
        assert_eq!(err.rejected_input(), cmds(&["c3"]));
        assert_eq!(err.successful_input(), cmds(&["c1", "c2"]));
    }

    #[test]
    fn test_attribution_prefers_echo() {
        let commands = cmds(&["interface e1/1", "bogus", "shutdown"]);
        let outputs = vec![CommandOutput {
            code: json!("400"),
            input: Some("bogus".into()),
            clierror: Some("% Invalid command".into()),
            ..Default::default()
        }];

        let err = check_outputs(&commands, outputs).unwrap_err();
        assert_eq!(err.rejected_input(), cmds(&["bogus"]));
        assert_eq!(err.successful_input(), cmds(&["interface e1/1"]));
    }

    #[test]
    fn test_attribution_with_repeated_lines() {
        let commands = cmds(&["interface e1/1", "shutdown", "interface e1/2", "shutdown"]);
        let mut outputs: Vec<CommandOutput> = (0..3)
            .map(|_| CommandOutput { code: json!("200"), ..Default::default() })
            .collect();
        outputs.push(CommandOutput {
            code: json!("400"),
            input: Some("shutdown".into()),
            clierror: Some("% Permission denied".into()),
            ..Default::default()
        });

        let err = check_outputs(&commands, outputs).unwrap_err();
        assert_eq!(err.rejected_input(), cmds(&["shutdown"]));
        assert_eq!(
            err.successful_input(),
            cmds(&["interface e1/1", "shutdown", "interface e1/2"])
        );
    }

    #[test]
    fn test_code_mapping() {
        let commands = cmds(&["show version"]);
        let failing = |code: &str| {
            check_outputs(
                &commands,
                vec![CommandOutput {
                    code: json!(code),
                    msg: "nope".into(),
                    ..Default::default()
                }],
            )
            .unwrap_err()
        };

        assert!(matches!(failing("413"), Error::RequestNotSupported(_)));
        assert!(matches!(failing("501"), Error::RequestNotSupported(_)));
        assert!(matches!(failing("500"), Error::RequestFailed(_)));
    }
}
